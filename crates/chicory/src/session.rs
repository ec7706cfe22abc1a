//! Session: the owned context that ties the collaborators together.
//!
//! A session holds the backend handle, the capture, display and reasoning
//! services, the configuration, the artifact store and the cancellation
//! token. It executes one plan at a time (`&mut self`).

use crate::artifacts::{ArtifactRun, ArtifactStore};
use crate::backend::{AutomationBackend, HttpBackend};
use crate::capture::{CaptureService, XcapCapture};
use crate::config::EngineConfig;
use crate::dispatcher::{ActionDispatcher, ExecutionReport, PlannedStep};
use crate::display::{DisplayProvider, XcapDisplays};
use crate::errors::AutomationError;
use crate::plan::Plan;
use crate::reasoning::{HttpReasoningClient, ReasoningService};
use crate::scroll::{extractor_for, ScrollContext, ScrollExtractor, ScrollReport};
use crate::types::{Display, WindowInfo};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

/// Result of one analyze-window run.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisOutcome {
    pub explanation: Option<String>,
    /// Human-readable summary of the plan that was executed.
    pub description: String,
    pub report: ExecutionReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scroll: Option<ScrollReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifacts_dir: Option<PathBuf>,
}

pub struct Session {
    config: EngineConfig,
    backend: Arc<dyn AutomationBackend>,
    dispatcher: ActionDispatcher,
    capture: Arc<dyn CaptureService>,
    displays: Arc<dyn DisplayProvider>,
    reasoning: Option<Arc<dyn ReasoningService>>,
    scroll: Box<dyn ScrollExtractor>,
    artifacts: ArtifactStore,
    cancel: CancellationToken,
}

impl Session {
    pub fn new(
        config: EngineConfig,
        backend: Arc<dyn AutomationBackend>,
        capture: Arc<dyn CaptureService>,
        displays: Arc<dyn DisplayProvider>,
    ) -> Self {
        Self {
            dispatcher: ActionDispatcher::from_config(backend.clone(), &config),
            scroll: extractor_for(&config),
            artifacts: config.artifact_store(),
            backend,
            capture,
            displays,
            reasoning: None,
            cancel: CancellationToken::new(),
            config,
        }
    }

    /// Session wired to the HTTP backend, `xcap` capture and displays, and
    /// the HTTP reasoning service when one is configured.
    pub fn from_config(config: EngineConfig) -> Result<Self, AutomationError> {
        config.validate()?;
        let backend = HttpBackend::new(&config.backend_url, config.request_timeout())
            .map_err(|e| AutomationError::Config(e.to_string()))?;
        let reasoning = match &config.reasoning_url {
            Some(url) => Some(Arc::new(HttpReasoningClient::new(
                url.clone(),
                config.request_timeout(),
            )?) as Arc<dyn ReasoningService>),
            None => None,
        };

        let mut session = Self::new(
            config,
            Arc::new(backend),
            Arc::new(XcapCapture),
            Arc::new(XcapDisplays),
        );
        session.reasoning = reasoning;
        Ok(session)
    }

    pub fn with_reasoning(mut self, reasoning: Arc<dyn ReasoningService>) -> Self {
        self.reasoning = Some(reasoning);
        self
    }

    pub fn with_scroll_extractor(mut self, extractor: Box<dyn ScrollExtractor>) -> Self {
        self.scroll = extractor;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Token that cancels whatever the session is currently waiting on.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Probe backend liveness with the configured retry budget.
    pub async fn health(&self) -> Result<bool, AutomationError> {
        self.dispatcher
            .liveness()
            .ensure_ready(self.backend.as_ref(), &self.cancel)
            .await
    }

    pub async fn list_windows(&self) -> Result<Vec<WindowInfo>, AutomationError> {
        self.capture.list_windows().await
    }

    pub fn displays(&self) -> Result<Vec<Display>, AutomationError> {
        self.displays.displays()
    }

    /// Displays for diagnostics; enumeration failure only loses the checks.
    fn displays_or_empty(&self) -> Vec<Display> {
        self.displays.displays().unwrap_or_else(|e| {
            warn!("[session] Display enumeration failed: {}", e);
            Vec::new()
        })
    }

    /// Resolve a plan's screen points without touching the backend.
    pub fn dry_run(&self, plan: &Plan) -> Result<Vec<PlannedStep>, AutomationError> {
        self.dispatcher.resolve_plan(plan, &self.displays_or_empty())
    }

    #[instrument(skip(self, plan), fields(actions = plan.len(), window = %plan.window.title))]
    pub async fn execute_plan(&mut self, plan: Plan) -> Result<ExecutionReport, AutomationError> {
        let displays = self.displays_or_empty();
        let needs_artifacts = plan
            .actions
            .iter()
            .any(|a| a.kind() == crate::action::ActionKind::ScrollAndCapture);
        let run = if needs_artifacts {
            self.artifacts.start_run("execute")
        } else {
            ArtifactRun::discard()
        };

        self.dispatcher
            .execute(plan, &displays, &run, &self.cancel)
            .await
    }

    /// Capture a window, ask the reasoning service what to do, and do it.
    ///
    /// Plain `scroll` actions in the resulting plan are not dispatched one by
    /// one; they trigger the configured scroll extraction (in the direction of
    /// the first scroll action) before the remaining actions run.
    /// `scroll_and_capture` actions stay in the plan and reach the backend.
    #[instrument(skip(self, query), fields(query_len = query.len()))]
    pub async fn analyze_window(
        &mut self,
        window_id: u32,
        query: &str,
    ) -> Result<AnalysisOutcome, AutomationError> {
        let reasoning = self.reasoning.clone().ok_or_else(|| {
            AutomationError::Config("no reasoning service configured".to_string())
        })?;

        let capture = tokio::select! {
            _ = self.cancel.cancelled() => return Err(AutomationError::Cancelled { index: None }),
            result = self.capture.capture(window_id) => result?,
        };

        let run = self.artifacts.start_run(&format!("analyze_{window_id}"));
        run.save_png("capture.png", &capture.png);

        let response = tokio::select! {
            _ = self.cancel.cancelled() => return Err(AutomationError::Cancelled { index: None }),
            result = reasoning.reason(&capture.png, query) => result?,
        };
        run.save_json("api_response.json", &response);

        let plan = Plan::from_reasoning(&response, capture.window)?;
        let description = plan.describe();
        info!("[session] {}", description);

        let displays = self.displays_or_empty();
        self.dispatcher
            .liveness()
            .require_ready(self.backend.as_ref(), &self.cancel)
            .await?;

        let (plan, scroll) = if plan.has_scroll() {
            let (scrolls, rest) = plan.split_scrolls();
            let direction = scrolls
                .first()
                .and_then(|a| a.scroll_direction())
                .unwrap_or_default();
            info!(
                "[session] {} scroll action(s) routed through {} extraction",
                scrolls.len(),
                self.scroll.strategy()
            );
            let report = self
                .scroll
                .extract(ScrollContext {
                    backend: self.backend.as_ref(),
                    capture: self.capture.as_ref(),
                    window: &rest.window,
                    direction,
                    artifacts: &run,
                    cancel: &self.cancel,
                })
                .await?;
            (rest, Some(report))
        } else {
            (plan, None)
        };

        let report = self
            .dispatcher
            .execute_ready(plan, &displays, &run, &self.cancel)
            .await?;

        Ok(AnalysisOutcome {
            explanation: response.explanation,
            description,
            report,
            scroll,
            artifacts_dir: run.dir().map(|d| d.to_path_buf()),
        })
    }
}
