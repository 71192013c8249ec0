//! Camera side of the liveness client.
//!
//! - [`FrameSource`], [`MediaStream`], [`MediaTrack`]: the media model. A
//!   stream can be cloned into an independent copy on the same source.
//! - [`VideoSurface`]: a shared attach point for a stream (preview or
//!   upload).
//! - [`CameraDevice`]: the seam to the real capture device.
//! - [`CameraController`]: requests the camera once, wires the preview
//!   and streaming surfaces, and releases everything on unmount or drop.

#![allow(async_fn_in_trait)]

mod controller;
mod error;
mod media;
mod surface;

pub use controller::{CameraController, CameraDevice, CameraOutcome, PermissionState, request_camera};
pub use error::CameraError;
pub use media::{
    FacingMode, Frame, FrameReceiver, FrameSource, MediaConstraints, MediaStream, MediaTrack,
    TrackKind,
};
pub use surface::VideoSurface;
