//! Configuration for the liveness client.
//!
//! Base URLs, the API key and the scope have no defaults: they are
//! deployment inputs and must be supplied, normally through the
//! environment.
//!
//! | Variable | Required | Meaning |
//! |---|---|---|
//! | `LIVENESS_AUTH_URL` | yes | OAuth server base URL |
//! | `LIVENESS_STREAMING_URL` | yes | Streaming API base URL (sessions) |
//! | `LIVENESS_ENGINE_URL` | yes | WebSocket URL of the liveness engine |
//! | `LIVENESS_API_KEY` | yes | Pre-encoded Basic credential |
//! | `LIVENESS_SCOPE` | yes | OAuth scope |
//! | `LIVENESS_STEP_BUDGET_SECS` | no | Per-step budget, default 30 |

use std::time::Duration;

use liveness_camera::MediaConstraints;
use liveness_session::{AuthConfig, SessionClientConfig};
use tracing::warn;

pub const ENV_AUTH_URL: &str = "LIVENESS_AUTH_URL";
pub const ENV_STREAMING_URL: &str = "LIVENESS_STREAMING_URL";
pub const ENV_ENGINE_URL: &str = "LIVENESS_ENGINE_URL";
pub const ENV_API_KEY: &str = "LIVENESS_API_KEY";
pub const ENV_SCOPE: &str = "LIVENESS_SCOPE";
pub const ENV_STEP_BUDGET_SECS: &str = "LIVENESS_STEP_BUDGET_SECS";

/// Errors from loading configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// A required variable is unset or blank.
    #[error("missing required configuration: {0}")]
    Missing(&'static str),

    /// A variable is set but cannot be used.
    #[error("invalid value {value:?} for {var}: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

// ---------------------------------------------------------------------------
// OrchestratorConfig
// ---------------------------------------------------------------------------

/// How the orchestrator reaches the engine and how long each step may take.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrchestratorConfig {
    /// WebSocket URL of the liveness engine.
    pub engine_url: String,
    /// Upper bound for one detection step, retry included. Each engine
    /// attempt gets half of it.
    pub step_budget: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            engine_url: String::new(),
            step_budget: Self::DEFAULT_STEP_BUDGET,
        }
    }
}

impl OrchestratorConfig {
    pub const DEFAULT_STEP_BUDGET: Duration = Duration::from_secs(30);

    pub fn new(engine_url: impl Into<String>) -> Self {
        Self {
            engine_url: engine_url.into(),
            ..Self::default()
        }
    }

    pub fn with_step_budget(mut self, step_budget: Duration) -> Self {
        self.step_budget = step_budget;
        self
    }

    /// Fixes values the orchestrator cannot work with.
    ///
    /// A zero budget would abort every step instantly; it falls back to
    /// [`Self::DEFAULT_STEP_BUDGET`].
    pub fn validated(mut self) -> Self {
        if self.step_budget.is_zero() {
            warn!(
                default_secs = Self::DEFAULT_STEP_BUDGET.as_secs(),
                "step budget is zero, using the default"
            );
            self.step_budget = Self::DEFAULT_STEP_BUDGET;
        }
        self
    }
}

// ---------------------------------------------------------------------------
// LivenessConfig
// ---------------------------------------------------------------------------

/// Everything the client needs, gathered in one place.
#[derive(Debug, Clone)]
pub struct LivenessConfig {
    pub auth: AuthConfig,
    pub session: SessionClientConfig,
    pub orchestrator: OrchestratorConfig,
    pub constraints: MediaConstraints,
}

impl LivenessConfig {
    /// Loads configuration from the process environment.
    ///
    /// # Errors
    /// [`ConfigError::Missing`] for the first absent required variable,
    /// [`ConfigError::Invalid`] for an unparsable step budget.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Loads configuration through `lookup`, which maps a variable name to
    /// its value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |var: &'static str| {
            lookup(var)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
                .ok_or(ConfigError::Missing(var))
        };

        let auth = AuthConfig {
            auth_base_url: required(ENV_AUTH_URL)?,
            api_key: required(ENV_API_KEY)?,
            scope: required(ENV_SCOPE)?,
        };
        let session = SessionClientConfig {
            streaming_base_url: required(ENV_STREAMING_URL)?,
        };

        let mut orchestrator = OrchestratorConfig::new(required(ENV_ENGINE_URL)?);
        if let Some(raw) = lookup(ENV_STEP_BUDGET_SECS) {
            let secs: u64 = raw.trim().parse().map_err(|e: std::num::ParseIntError| {
                ConfigError::Invalid {
                    var: ENV_STEP_BUDGET_SECS,
                    value: raw.clone(),
                    reason: e.to_string(),
                }
            })?;
            orchestrator.step_budget = Duration::from_secs(secs);
        }

        Ok(Self {
            auth,
            session,
            orchestrator: orchestrator.validated(),
            constraints: MediaConstraints::default(),
        })
    }
}
