use std::sync::Arc;
use std::time::Duration;

use liveness::prelude::*;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

// ---------------------------------------------------------------------------
// Synthetic camera
// ---------------------------------------------------------------------------

/// A camera that produces placeholder frames at a fixed rate.
struct SyntheticCamera {
    frame_interval: Duration,
    frame_size: usize,
}

impl SyntheticCamera {
    fn new(fps: u32) -> Self {
        Self {
            frame_interval: Duration::from_secs(1) / fps.max(1),
            frame_size: 1024,
        }
    }
}

impl CameraDevice for SyntheticCamera {
    async fn acquire(&self, constraints: &MediaConstraints) -> Result<MediaStream, CameraError> {
        let source = FrameSource::new(32);
        let stream = source.stream(constraints.audio);

        // The preview stream owns the device tracks; capture stops with them.
        let device_tracks = stream.tracks().to_vec();
        let interval = self.frame_interval;
        let size = self.frame_size;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            let mut shade = 0u8;
            while device_tracks.iter().any(MediaTrack::is_live) {
                ticker.tick().await;
                source.push(vec![shade; size]);
                shade = shade.wrapping_add(1);
            }
        });

        Ok(stream)
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .init();
}

fn print_status(orchestrator_state: OrchestratorState, status: DetectionStatus) {
    let mark = |done: bool| if done { "yes" } else { "no" };
    println!(
        "[{orchestrator_state}] face detected: {} | smile detected: {} | repeats: {}",
        mark(status.face_detected),
        mark(status.smile_detected),
        status.repeats,
    );
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();

    let config = LivenessConfig::from_env()?;

    let mut camera = CameraController::with_surfaces(
        SyntheticCamera::new(15),
        config.constraints.clone(),
        VideoSurface::new("preview"),
        VideoSurface::new("streaming"),
    );
    let permission = camera.mount().await;
    if !permission.is_granted() {
        eprintln!("camera unavailable, the liveness check cannot be started");
        return Ok(());
    }

    let auth = Arc::new(AuthClient::new(ReqwestTransport::new(), config.auth));
    let sessions = SessionClient::new(auth, config.session);
    let mut orchestrator = LivenessOrchestrator::new(
        sessions,
        WsLivenessEngine::new(),
        config.orchestrator,
        camera.streaming_surface().clone(),
    );
    orchestrator.on_permission(permission);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        println!("Press Enter to start the liveness check (Ctrl-D to quit)");
        if lines.next_line().await?.is_none() {
            break;
        }

        let outcome = tokio::select! {
            result = orchestrator.start() => Some(result),
            _ = tokio::signal::ctrl_c() => None,
        };

        match outcome {
            Some(Ok(status)) => {
                print_status(orchestrator.state(), status);
                info!(status = %serde_json::to_string(&status)?, "liveness check passed");
            }
            Some(Err(e)) => {
                print_status(orchestrator.state(), orchestrator.status());
                eprintln!("liveness check failed: {e}");
            }
            None => {
                orchestrator.abort().await;
                break;
            }
        }
    }

    camera.unmount();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_synthetic_camera_streams_frames() {
        let camera = SyntheticCamera::new(100);
        let stream = camera.acquire(&MediaConstraints::default()).await.unwrap();
        let mut frames = stream.frames();

        let first = frames.recv().await.expect("camera should produce frames");
        let second = frames.recv().await.expect("camera should keep producing");

        assert!(second.seq > first.seq);
    }

    #[tokio::test]
    async fn test_synthetic_camera_mounts_with_granted_permission() {
        let mut camera = CameraController::new(SyntheticCamera::new(100));

        assert_eq!(camera.mount().await, PermissionState::Granted);
        assert!(camera.streaming_surface().is_live());
        assert!(camera.unmount());
    }
}
