//! Action dispatcher
//!
//! Executes a plan against the automation backend, one action at a time.
//! Each action is resolved to a screen point, sent as one or more backend
//! primitives, and followed by a short pacing delay. The first failure aborts
//! the rest of the plan; nothing already executed is rolled back.

use crate::action::{Action, ActionKind, TargetRef};
use crate::artifacts::ArtifactRun;
use crate::backend::{
    AutomationBackend, KeyRequest, PointerRequest, ScrollRequest, TypeRequest, WindowPayload,
};
use crate::config::EngineConfig;
use crate::display;
use crate::errors::{AutomationError, BackendError};
use crate::geometry::{to_screen_point, window_center};
use crate::health::LivenessMonitor;
use crate::plan::Plan;
use crate::scroll::persist_capture_result;
use crate::types::{Detection, Display, ScreenPoint};
use serde::Serialize;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

pub const DEFAULT_PACING: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    Idle,
    Dispatching(usize),
    Failed(usize),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StepStatus {
    /// Sent to the backend; `point` is absent for keyboard actions.
    Executed { point: Option<ScreenPoint> },
    Skipped { reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepOutcome {
    pub index: usize,
    pub kind: ActionKind,
    pub status: StepStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExecutionReport {
    pub steps: Vec<StepOutcome>,
    pub backend_calls: u32,
    /// Capture results persisted by `scroll_and_capture` actions.
    pub artifacts: Vec<PathBuf>,
}

impl ExecutionReport {
    pub fn executed(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| matches!(s.status, StepStatus::Executed { .. }))
            .count()
    }

    pub fn skipped(&self) -> usize {
        self.steps.len() - self.executed()
    }
}

/// Dry-run result for one action.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlannedStep {
    pub index: usize,
    pub kind: ActionKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub point: Option<ScreenPoint>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<String>,
    pub on_screen: bool,
}

/// Where an action lands once its target is resolved.
enum Resolution<'p> {
    Target {
        point: ScreenPoint,
        detection: &'p Detection,
    },
    WindowCenter(ScreenPoint),
    NoPoint,
    Skip(String),
}

impl Resolution<'_> {
    fn point(&self) -> Option<ScreenPoint> {
        match self {
            Self::Target { point, .. } | Self::WindowCenter(point) => Some(*point),
            Self::NoPoint | Self::Skip(_) => None,
        }
    }
}

async fn guarded<T>(
    index: usize,
    kind: ActionKind,
    cancel: &CancellationToken,
    request: impl Future<Output = Result<T, BackendError>>,
) -> Result<T, AutomationError> {
    tokio::select! {
        _ = cancel.cancelled() => Err(AutomationError::Cancelled { index: Some(index) }),
        result = request => result.map_err(|source| AutomationError::BackendRequestFailed { index, kind, source }),
    }
}

async fn pause(duration: Duration, index: usize, cancel: &CancellationToken) -> Result<(), AutomationError> {
    tokio::select! {
        _ = cancel.cancelled() => Err(AutomationError::Cancelled { index: Some(index) }),
        _ = tokio::time::sleep(duration) => Ok(()),
    }
}

pub struct ActionDispatcher {
    backend: Arc<dyn AutomationBackend>,
    liveness: LivenessMonitor,
    pacing: Duration,
    skip_unresolved_targets: bool,
    state: DispatchState,
}

impl ActionDispatcher {
    pub fn new(backend: Arc<dyn AutomationBackend>) -> Self {
        Self {
            backend,
            liveness: LivenessMonitor::default(),
            pacing: DEFAULT_PACING,
            skip_unresolved_targets: true,
            state: DispatchState::Idle,
        }
    }

    pub fn from_config(backend: Arc<dyn AutomationBackend>, config: &EngineConfig) -> Self {
        Self::new(backend)
            .with_liveness(config.liveness_monitor())
            .with_pacing(config.action_pacing())
            .skip_unresolved_targets(config.skip_unresolved_targets)
    }

    pub fn with_liveness(mut self, liveness: LivenessMonitor) -> Self {
        self.liveness = liveness;
        self
    }

    pub fn with_pacing(mut self, pacing: Duration) -> Self {
        self.pacing = pacing;
        self
    }

    pub fn skip_unresolved_targets(mut self, skip: bool) -> Self {
        self.skip_unresolved_targets = skip;
        self
    }

    pub fn state(&self) -> DispatchState {
        self.state
    }

    pub fn liveness(&self) -> &LivenessMonitor {
        &self.liveness
    }

    pub fn backend(&self) -> &dyn AutomationBackend {
        self.backend.as_ref()
    }

    /// Gate on backend liveness, then execute the whole plan.
    pub async fn execute(
        &mut self,
        plan: Plan,
        displays: &[Display],
        artifacts: &ArtifactRun,
        cancel: &CancellationToken,
    ) -> Result<ExecutionReport, AutomationError> {
        self.state = DispatchState::Idle;
        if let Err(e) = self.liveness.require_ready(self.backend.as_ref(), cancel).await {
            error!("[dispatcher] Plan not started: {}", e);
            return Err(e);
        }
        self.execute_ready(plan, displays, artifacts, cancel).await
    }

    /// Execute a plan whose liveness check has already passed.
    pub(crate) async fn execute_ready(
        &mut self,
        plan: Plan,
        displays: &[Display],
        artifacts: &ArtifactRun,
        cancel: &CancellationToken,
    ) -> Result<ExecutionReport, AutomationError> {
        let total = plan.len();
        let mut report = ExecutionReport::default();

        if let Some(d) = display::resolve(&plan.window.bounds, displays) {
            debug!(
                "[dispatcher] Window '{}' is on display {} ({})",
                plan.window.title, d.id, d.name
            );
        }
        info!("[dispatcher] Executing {} actions", total);

        for (index, action) in plan.actions.iter().enumerate() {
            self.state = DispatchState::Dispatching(index);
            let is_last = index + 1 == total;

            match self
                .run_step(index, action, &plan, displays, artifacts, cancel, is_last, &mut report)
                .await
            {
                Ok(status) => report.steps.push(StepOutcome {
                    index,
                    kind: action.kind(),
                    status,
                }),
                Err(e) => {
                    self.state = DispatchState::Failed(index);
                    error!(
                        "[dispatcher] Aborting plan at action #{} of {}: {}",
                        index, total, e
                    );
                    return Err(e);
                }
            }
        }

        self.state = DispatchState::Idle;
        info!(
            "[dispatcher] Plan complete: {} executed, {} skipped, {} backend calls",
            report.executed(),
            report.skipped(),
            report.backend_calls
        );
        Ok(report)
    }

    #[allow(clippy::too_many_arguments)]
    async fn run_step(
        &self,
        index: usize,
        action: &Action,
        plan: &Plan,
        displays: &[Display],
        artifacts: &ArtifactRun,
        cancel: &CancellationToken,
        is_last: bool,
        report: &mut ExecutionReport,
    ) -> Result<StepStatus, AutomationError> {
        if cancel.is_cancelled() {
            return Err(AutomationError::Cancelled { index: Some(index) });
        }

        let kind = action.kind();
        let resolution = self.resolve_action(index, action, plan, displays)?;
        if let Resolution::Skip(reason) = resolution {
            warn!("[dispatcher] Skipping action #{} ({}): {}", index, kind, reason);
            return Ok(StepStatus::Skipped { reason });
        }
        let point = resolution.point();

        match point {
            Some(p) => info!("[dispatcher] #{} {} at {}", index, kind, p),
            None => info!("[dispatcher] #{} {}", index, kind),
        }

        let window = &plan.window;
        let backend = self.backend.as_ref();

        match (action, resolution) {
            (Action::Click { .. }, Resolution::Target { point, detection }) => {
                let request = PointerRequest::new(point, window, detection);
                report.backend_calls += 1;
                guarded(index, kind, cancel, backend.click(&request)).await?;
            }
            (Action::RightClick { .. }, Resolution::Target { point, detection }) => {
                let request = PointerRequest::new(point, window, detection);
                report.backend_calls += 1;
                guarded(index, kind, cancel, backend.right_click(&request)).await?;
            }
            (
                Action::Type {
                    input_text,
                    key_command,
                    ..
                },
                Resolution::Target { point, detection },
            ) => {
                let focus = PointerRequest::new(point, window, detection);
                report.backend_calls += 1;
                guarded(index, kind, cancel, backend.click(&focus)).await?;
                pause(self.pacing, index, cancel).await?;

                if let Some(text) = input_text {
                    let request = TypeRequest {
                        text: text.clone(),
                        window_info: WindowPayload::from_window(window),
                    };
                    report.backend_calls += 1;
                    guarded(index, kind, cancel, backend.type_text(&request)).await?;
                }
                if let Some(key) = key_command {
                    let request = KeyRequest {
                        key: key.clone(),
                        window_info: WindowPayload::from_window(window),
                    };
                    report.backend_calls += 1;
                    guarded(index, kind, cancel, backend.press_key(&request)).await?;
                }
            }
            (Action::Keyboard { key_command, .. }, _) => {
                let request = KeyRequest {
                    key: key_command.clone(),
                    window_info: WindowPayload::from_window(window),
                };
                report.backend_calls += 1;
                guarded(index, kind, cancel, backend.press_key(&request)).await?;
            }
            (Action::Scroll { direction, .. }, Resolution::WindowCenter(point)) => {
                let request = ScrollRequest::new(point, *direction, window);
                report.backend_calls += 1;
                guarded(index, kind, cancel, backend.scroll(&request)).await?;
            }
            (Action::ScrollAndCapture { direction, .. }, Resolution::WindowCenter(point)) => {
                let request = ScrollRequest::new(point, *direction, window);
                report.backend_calls += 1;
                let result = guarded(index, kind, cancel, backend.scroll_and_capture(&request)).await?;
                report.artifacts.extend(persist_capture_result(
                    artifacts,
                    &format!("scroll_capture_{index}"),
                    &result,
                ));
            }
            _ => {
                return Err(AutomationError::InvalidAction(format!(
                    "action #{index} ({kind}) resolved to an unexpected target"
                )))
            }
        }

        if !is_last {
            pause(self.pacing, index, cancel).await?;
        }
        Ok(StepStatus::Executed { point })
    }

    fn unresolved<'p>(&self, index: usize, kind: ActionKind, reason: String) -> Result<Resolution<'p>, AutomationError> {
        if self.skip_unresolved_targets {
            Ok(Resolution::Skip(reason))
        } else {
            Err(AutomationError::UngroundedAction {
                index,
                kind,
                reason,
            })
        }
    }

    fn resolve_action<'p>(
        &self,
        index: usize,
        action: &Action,
        plan: &'p Plan,
        displays: &[Display],
    ) -> Result<Resolution<'p>, AutomationError> {
        let kind = action.kind();

        let resolution = if kind.is_scroll() {
            Resolution::WindowCenter(window_center(&plan.window))
        } else if !kind.needs_target() {
            Resolution::NoPoint
        } else {
            let Some(target) = action.target() else {
                return self.unresolved(index, kind, "no target element".to_string());
            };
            let Some(detection) = plan.find_detection(target) else {
                let what = match target {
                    TargetRef::Identifier(id) => format!("identifier '{id}'"),
                    TargetRef::Index(i) => format!("index {i}"),
                };
                return self.unresolved(index, kind, format!("no detection with {what}"));
            };
            let Some(window_box) = detection.window_box() else {
                return Err(AutomationError::UngroundedAction {
                    index,
                    kind,
                    reason: format!("detection {} has no window bounding box", detection.label()),
                });
            };
            let point = to_screen_point(&window_box, &plan.window)
                .map_err(|source| AutomationError::InvalidGeometry { index, kind, source })?;
            Resolution::Target { point, detection }
        };

        if let Some(point) = resolution.point() {
            if !display::point_on_any_display(point, displays) {
                warn!(
                    "[dispatcher] Action #{} ({}) point {} is not on any display",
                    index, kind, point
                );
            }
        }
        Ok(resolution)
    }

    /// Resolve every action's screen point without contacting the backend.
    pub fn resolve_plan(
        &self,
        plan: &Plan,
        displays: &[Display],
    ) -> Result<Vec<PlannedStep>, AutomationError> {
        plan.actions
            .iter()
            .enumerate()
            .map(|(index, action)| {
                let resolution = self.resolve_action(index, action, plan, displays)?;
                let point = resolution.point();
                Ok(PlannedStep {
                    index,
                    kind: action.kind(),
                    point,
                    skip_reason: match resolution {
                        Resolution::Skip(reason) => Some(reason),
                        _ => None,
                    },
                    on_screen: point
                        .map(|p| display::point_on_any_display(p, displays))
                        .unwrap_or(true),
                })
            })
            .collect()
    }
}
