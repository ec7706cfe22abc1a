//! Engine configuration.
//!
//! Defaults, optionally overlaid by a JSON file, then by `CHICORY_*`
//! environment variables.

use crate::artifacts::{default_artifacts_dir, ArtifactStore};
use crate::backend::DEFAULT_BACKEND_URL;
use crate::errors::AutomationError;
use crate::health::LivenessMonitor;
use crate::scroll::ScrollStrategy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

pub const ENV_BACKEND_URL: &str = "CHICORY_BACKEND_URL";
pub const ENV_REQUEST_TIMEOUT_MS: &str = "CHICORY_REQUEST_TIMEOUT_MS";
pub const ENV_SCROLL_STRATEGY: &str = "CHICORY_SCROLL_STRATEGY";
pub const ENV_MAX_SCROLL_CYCLES: &str = "CHICORY_MAX_SCROLL_CYCLES";
pub const ENV_REASONING_URL: &str = "CHICORY_REASONING_URL";
pub const ENV_ARTIFACTS_DIR: &str = "CHICORY_ARTIFACTS_DIR";
pub const ENV_DISABLE_ARTIFACTS: &str = "CHICORY_DISABLE_ARTIFACTS";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub backend_url: String,
    pub request_timeout_ms: u64,
    pub liveness_attempts: u32,
    pub liveness_retry_delay_ms: u64,
    pub action_pacing_ms: u64,
    pub scroll_settle_ms: u64,
    pub max_scroll_cycles: u32,
    pub scroll_strategy: ScrollStrategy,
    /// Skip (rather than fail on) actions whose target cannot be found.
    pub skip_unresolved_targets: bool,
    pub reasoning_url: Option<String>,
    pub artifacts_dir: Option<PathBuf>,
    pub artifacts_enabled: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            backend_url: DEFAULT_BACKEND_URL.to_string(),
            request_timeout_ms: 30_000,
            liveness_attempts: 5,
            liveness_retry_delay_ms: 1_000,
            action_pacing_ms: 100,
            scroll_settle_ms: 500,
            max_scroll_cycles: 5,
            scroll_strategy: ScrollStrategy::default(),
            skip_unresolved_targets: true,
            reasoning_url: None,
            artifacts_dir: None,
            artifacts_enabled: true,
        }
    }
}

fn parse_env<T: FromStr>(key: &str, raw: &str) -> Result<T, AutomationError>
where
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e| AutomationError::Config(format!("{key}: invalid value '{raw}': {e}")))
}

impl EngineConfig {
    /// Read a JSON config file; missing fields take their defaults.
    pub fn load(path: &Path) -> Result<Self, AutomationError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            AutomationError::Config(format!("failed to read {}: {e}", path.display()))
        })?;
        serde_json::from_str(&raw).map_err(|e| {
            AutomationError::Config(format!("failed to parse {}: {e}", path.display()))
        })
    }

    /// Defaults with the process environment applied.
    pub fn from_env() -> Result<Self, AutomationError> {
        let mut config = Self::default();
        config.apply_env()?;
        Ok(config)
    }

    pub fn apply_env(&mut self) -> Result<(), AutomationError> {
        self.apply_env_with(|key| std::env::var(key).ok())
    }

    /// Apply overrides from `lookup`, which maps a variable name to its value.
    pub fn apply_env_with<F>(&mut self, lookup: F) -> Result<(), AutomationError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_BACKEND_URL) {
            self.backend_url = url.trim().to_string();
        }
        if let Some(raw) = lookup(ENV_REQUEST_TIMEOUT_MS) {
            self.request_timeout_ms = parse_env(ENV_REQUEST_TIMEOUT_MS, &raw)?;
        }
        if let Some(raw) = lookup(ENV_SCROLL_STRATEGY) {
            self.scroll_strategy = parse_env(ENV_SCROLL_STRATEGY, &raw)?;
        }
        if let Some(raw) = lookup(ENV_MAX_SCROLL_CYCLES) {
            self.max_scroll_cycles = parse_env(ENV_MAX_SCROLL_CYCLES, &raw)?;
        }
        if let Some(url) = lookup(ENV_REASONING_URL) {
            self.reasoning_url = Some(url.trim().to_string()).filter(|u| !u.is_empty());
        }
        if let Some(dir) = lookup(ENV_ARTIFACTS_DIR) {
            self.artifacts_dir = Some(PathBuf::from(dir));
        }
        if let Some(raw) = lookup(ENV_DISABLE_ARTIFACTS) {
            if raw == "1" || raw.eq_ignore_ascii_case("true") {
                debug!("[config] Artifacts disabled via {}", ENV_DISABLE_ARTIFACTS);
                self.artifacts_enabled = false;
            }
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), AutomationError> {
        let url = reqwest::Url::parse(&self.backend_url).map_err(|e| {
            AutomationError::Config(format!("invalid backend_url '{}': {e}", self.backend_url))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(AutomationError::Config(format!(
                "backend_url must be http(s), got '{}'",
                self.backend_url
            )));
        }
        if self.liveness_attempts == 0 {
            return Err(AutomationError::Config(
                "liveness_attempts must be at least 1".to_string(),
            ));
        }
        if self.max_scroll_cycles == 0 {
            return Err(AutomationError::Config(
                "max_scroll_cycles must be at least 1".to_string(),
            ));
        }
        if self.request_timeout_ms == 0 {
            return Err(AutomationError::Config(
                "request_timeout_ms must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn action_pacing(&self) -> Duration {
        Duration::from_millis(self.action_pacing_ms)
    }

    pub fn scroll_settle(&self) -> Duration {
        Duration::from_millis(self.scroll_settle_ms)
    }

    pub fn liveness_monitor(&self) -> LivenessMonitor {
        LivenessMonitor::new(
            self.liveness_attempts,
            Duration::from_millis(self.liveness_retry_delay_ms),
        )
    }

    pub fn artifact_store(&self) -> ArtifactStore {
        ArtifactStore::new(
            self.artifacts_dir
                .clone()
                .unwrap_or_else(default_artifacts_dir),
            self.artifacts_enabled,
        )
    }
}
