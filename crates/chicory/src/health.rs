//! Backend liveness gate.

use crate::backend::AutomationBackend;
use crate::errors::AutomationError;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub const DEFAULT_ATTEMPTS: u32 = 5;
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Probes the backend's health endpoint until it answers or the attempt
/// budget runs out.
#[derive(Debug, Clone, Copy)]
pub struct LivenessMonitor {
    max_attempts: u32,
    retry_delay: Duration,
}

impl Default for LivenessMonitor {
    fn default() -> Self {
        Self::new(DEFAULT_ATTEMPTS, DEFAULT_RETRY_DELAY)
    }
}

impl LivenessMonitor {
    pub fn new(max_attempts: u32, retry_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            retry_delay,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Returns `Ok(true)` as soon as one probe succeeds and `Ok(false)` once
    /// `max_attempts` probes have failed. There is no delay after the last
    /// attempt.
    pub async fn ensure_ready(
        &self,
        backend: &dyn AutomationBackend,
        cancel: &CancellationToken,
    ) -> Result<bool, AutomationError> {
        for attempt in 1..=self.max_attempts {
            let probe = tokio::select! {
                _ = cancel.cancelled() => return Err(AutomationError::Cancelled { index: None }),
                result = backend.health() => result,
            };

            match probe {
                Ok(()) => {
                    if attempt > 1 {
                        info!("[health] Backend ready after {} attempts", attempt);
                    } else {
                        debug!("[health] Backend ready");
                    }
                    return Ok(true);
                }
                Err(e) => {
                    warn!(
                        "[health] Backend not ready (attempt {}/{}): {}",
                        attempt, self.max_attempts, e
                    );
                }
            }

            if attempt < self.max_attempts {
                tokio::select! {
                    _ = cancel.cancelled() => return Err(AutomationError::Cancelled { index: None }),
                    _ = tokio::time::sleep(self.retry_delay) => {}
                }
            }
        }

        Ok(false)
    }

    /// Like [`ensure_ready`](Self::ensure_ready), but an unreachable backend
    /// is an error.
    pub async fn require_ready(
        &self,
        backend: &dyn AutomationBackend,
        cancel: &CancellationToken,
    ) -> Result<(), AutomationError> {
        if self.ensure_ready(backend, cancel).await? {
            Ok(())
        } else {
            Err(AutomationError::BackendUnavailable {
                attempts: self.max_attempts,
            })
        }
    }
}
