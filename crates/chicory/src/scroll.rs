//! Scroll extraction: collect successive views of content that extends past
//! the visible window.
//!
//! Two strategies exist. [`RecaptureLoop`] scrolls through the backend and
//! recaptures through the capture service; [`BackendRoundTrip`] lets the
//! backend do both in one request. Both run a fixed number of cycles and do
//! not try to detect the end of the content.

use crate::action::{ActionKind, ScrollDirection};
use crate::artifacts::ArtifactRun;
use crate::backend::{AutomationBackend, ScrollRequest};
use crate::capture::CaptureService;
use crate::config::EngineConfig;
use crate::errors::AutomationError;
use crate::geometry::window_center;
use crate::types::WindowInfo;
use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub const DEFAULT_MAX_CYCLES: u32 = 5;
pub const DEFAULT_SETTLE: Duration = Duration::from_millis(500);

/// Keys under which a backend capture result may carry a base64 image.
const IMAGE_KEYS: [&str; 4] = ["screenshot", "image", "image_base64", "capture"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScrollStrategy {
    #[default]
    RecaptureLoop,
    BackendRoundTrip,
}

impl ScrollStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RecaptureLoop => "recapture_loop",
            Self::BackendRoundTrip => "backend_round_trip",
        }
    }
}

impl fmt::Display for ScrollStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScrollStrategy {
    type Err = AutomationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "recapture_loop" => Ok(Self::RecaptureLoop),
            "backend_round_trip" => Ok(Self::BackendRoundTrip),
            other => Err(AutomationError::Config(format!(
                "unknown scroll strategy '{other}'"
            ))),
        }
    }
}

/// What a scroll extraction produced.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScrollReport {
    pub cycles: u32,
    pub artifacts: Vec<PathBuf>,
}

/// Everything a scroll extraction needs for one run.
pub struct ScrollContext<'a> {
    pub backend: &'a dyn AutomationBackend,
    pub capture: &'a dyn CaptureService,
    pub window: &'a WindowInfo,
    pub direction: ScrollDirection,
    pub artifacts: &'a ArtifactRun,
    pub cancel: &'a CancellationToken,
}

#[async_trait]
pub trait ScrollExtractor: Send + Sync {
    fn strategy(&self) -> ScrollStrategy;

    async fn extract(&self, ctx: ScrollContext<'_>) -> Result<ScrollReport, AutomationError>;
}

/// Build the extractor selected by the configuration.
pub fn extractor_for(config: &EngineConfig) -> Box<dyn ScrollExtractor> {
    match config.scroll_strategy {
        ScrollStrategy::RecaptureLoop => Box::new(RecaptureLoop {
            max_cycles: config.max_scroll_cycles,
            settle: config.scroll_settle(),
        }),
        ScrollStrategy::BackendRoundTrip => Box::new(BackendRoundTrip {
            max_cycles: config.max_scroll_cycles,
        }),
    }
}

/// Scroll, let the content settle, recapture; `max_cycles` times.
#[derive(Debug, Clone, Copy)]
pub struct RecaptureLoop {
    pub max_cycles: u32,
    pub settle: Duration,
}

impl Default for RecaptureLoop {
    fn default() -> Self {
        Self {
            max_cycles: DEFAULT_MAX_CYCLES,
            settle: DEFAULT_SETTLE,
        }
    }
}

#[async_trait]
impl ScrollExtractor for RecaptureLoop {
    fn strategy(&self) -> ScrollStrategy {
        ScrollStrategy::RecaptureLoop
    }

    async fn extract(&self, ctx: ScrollContext<'_>) -> Result<ScrollReport, AutomationError> {
        let window_id = ctx.window.id.ok_or_else(|| {
            AutomationError::Capture("window has no id to recapture".to_string())
        })?;
        let point = window_center(ctx.window);
        let request = ScrollRequest::new(point, ctx.direction, ctx.window);
        let mut report = ScrollReport::default();

        info!(
            "[scroll] Recapture loop: {} cycles {} at {}",
            self.max_cycles, ctx.direction, point
        );

        for cycle in 0..self.max_cycles {
            let index = cycle as usize;
            tokio::select! {
                _ = ctx.cancel.cancelled() => return Err(AutomationError::Cancelled { index: Some(index) }),
                result = ctx.backend.scroll(&request) => result.map_err(|source| {
                    AutomationError::BackendRequestFailed { index, kind: ActionKind::Scroll, source }
                })?,
            }

            tokio::select! {
                _ = ctx.cancel.cancelled() => return Err(AutomationError::Cancelled { index: Some(index) }),
                _ = tokio::time::sleep(self.settle) => {}
            }

            let capture = tokio::select! {
                _ = ctx.cancel.cancelled() => return Err(AutomationError::Cancelled { index: Some(index) }),
                result = ctx.capture.capture(window_id) => result?,
            };

            if let Some(path) = ctx
                .artifacts
                .save_png(&format!("scroll_{cycle}.png"), &capture.png)
            {
                report.artifacts.push(path);
            }
            report.cycles += 1;
            debug!(
                "[scroll] Cycle {}/{} captured {}x{}",
                cycle + 1,
                self.max_cycles,
                capture.width,
                capture.height
            );
        }

        Ok(report)
    }
}

/// One `scroll_and_capture` backend request per cycle, `max_cycles` times.
#[derive(Debug, Clone, Copy)]
pub struct BackendRoundTrip {
    pub max_cycles: u32,
}

impl Default for BackendRoundTrip {
    fn default() -> Self {
        Self {
            max_cycles: DEFAULT_MAX_CYCLES,
        }
    }
}

#[async_trait]
impl ScrollExtractor for BackendRoundTrip {
    fn strategy(&self) -> ScrollStrategy {
        ScrollStrategy::BackendRoundTrip
    }

    async fn extract(&self, ctx: ScrollContext<'_>) -> Result<ScrollReport, AutomationError> {
        let point = window_center(ctx.window);
        let request = ScrollRequest::new(point, ctx.direction, ctx.window);
        let mut report = ScrollReport::default();

        info!(
            "[scroll] Backend round trip: {} cycles {} at {}",
            self.max_cycles, ctx.direction, point
        );

        for cycle in 0..self.max_cycles {
            let index = cycle as usize;
            let result = tokio::select! {
                _ = ctx.cancel.cancelled() => return Err(AutomationError::Cancelled { index: Some(index) }),
                result = ctx.backend.scroll_and_capture(&request) => result.map_err(|source| {
                    AutomationError::BackendRequestFailed { index, kind: ActionKind::ScrollAndCapture, source }
                })?,
            };
            report
                .artifacts
                .extend(persist_capture_result(ctx.artifacts, &format!("scroll_{cycle}"), &result));
            report.cycles += 1;
        }

        Ok(report)
    }
}

/// Save a backend capture result as `<stem>.json`, plus `<stem>.png` when it
/// carries a base64-encoded image.
pub(crate) fn persist_capture_result(run: &ArtifactRun, stem: &str, result: &Value) -> Vec<PathBuf> {
    let mut saved = Vec::new();
    if run.dir().is_none() {
        return saved;
    }

    saved.extend(run.save_json(&format!("{stem}.json"), result));

    let encoded = IMAGE_KEYS
        .iter()
        .find_map(|key| result.get(key).and_then(Value::as_str));
    if let Some(encoded) = encoded {
        // Accept data URLs as well as bare base64.
        let data = encoded
            .split_once("base64,")
            .map(|(_, d)| d)
            .unwrap_or(encoded);
        match general_purpose::STANDARD.decode(data.trim()) {
            Ok(png) => saved.extend(run.save_png(&format!("{stem}.png"), &png)),
            Err(e) => warn!("[scroll] Capture result for {} has undecodable image: {}", stem, e),
        }
    }
    saved
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::ArtifactStore;
    use crate::backend::endpoints;
    use crate::testing::{window, FakeCapture, RecordingBackend};
    use tokio::time::Instant;

    #[test]
    fn test_strategy_parsing() {
        assert_eq!(
            "backend-round-trip".parse::<ScrollStrategy>().unwrap(),
            ScrollStrategy::BackendRoundTrip
        );
        assert_eq!(
            "Recapture_Loop".parse::<ScrollStrategy>().unwrap(),
            ScrollStrategy::RecaptureLoop
        );
        assert!("auto".parse::<ScrollStrategy>().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_recapture_loop_runs_exactly_max_cycles() {
        let backend = RecordingBackend::new();
        let capture = FakeCapture::new(window(100.0, 0.0, 800.0, 600.0, 2.0));
        let tmp = tempfile::tempdir().unwrap();
        let run = ArtifactStore::new(tmp.path(), true).start_run("scroll");
        let win = window(100.0, 0.0, 800.0, 600.0, 2.0);
        let cancel = CancellationToken::new();

        let start = Instant::now();
        let report = RecaptureLoop::default()
            .extract(ScrollContext {
                backend: &backend,
                capture: &capture,
                window: &win,
                direction: ScrollDirection::Down,
                artifacts: &run,
                cancel: &cancel,
            })
            .await
            .unwrap();

        assert_eq!(report.cycles, 5);
        assert_eq!(backend.endpoints(), vec![endpoints::SCROLL; 5]);
        assert_eq!(capture.captures(), 5);
        assert_eq!(start.elapsed(), Duration::from_millis(2500));

        let names: Vec<String> = report
            .artifacts
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            names,
            vec!["scroll_0.png", "scroll_1.png", "scroll_2.png", "scroll_3.png", "scroll_4.png"]
        );

        let (_, body) = &backend.calls()[0];
        assert_eq!(body["x"], 500);
        assert_eq!(body["y"], 300);
        assert_eq!(body["window_info"]["focus"], true);
    }

    #[tokio::test(start_paused = true)]
    async fn test_backend_round_trip_runs_exactly_max_cycles() {
        let backend = RecordingBackend::new();
        let capture = FakeCapture::new(window(0.0, 0.0, 400.0, 300.0, 1.0));
        let tmp = tempfile::tempdir().unwrap();
        let run = ArtifactStore::new(tmp.path(), true).start_run("scroll");
        let win = window(0.0, 0.0, 400.0, 300.0, 1.0);
        let cancel = CancellationToken::new();

        let report = BackendRoundTrip { max_cycles: 3 }
            .extract(ScrollContext {
                backend: &backend,
                capture: &capture,
                window: &win,
                direction: ScrollDirection::Up,
                artifacts: &run,
                cancel: &cancel,
            })
            .await
            .unwrap();

        assert_eq!(report.cycles, 3);
        assert_eq!(backend.endpoints(), vec![endpoints::SCROLL_AND_CAPTURE; 3]);
        assert_eq!(capture.captures(), 0);
        assert_eq!(report.artifacts.len(), 3);
        assert!(report.artifacts[2].ends_with("scroll_2.json"));
        assert_eq!(backend.calls()[0].1["direction"], "up");
    }

    #[tokio::test(start_paused = true)]
    async fn test_scroll_failure_reports_cycle() {
        let backend = RecordingBackend::new().failing_at(2);
        let capture = FakeCapture::new(window(0.0, 0.0, 400.0, 300.0, 1.0));
        let run = ArtifactRun::discard();
        let win = window(0.0, 0.0, 400.0, 300.0, 1.0);
        let cancel = CancellationToken::new();

        let err = RecaptureLoop::default()
            .extract(ScrollContext {
                backend: &backend,
                capture: &capture,
                window: &win,
                direction: ScrollDirection::Down,
                artifacts: &run,
                cancel: &cancel,
            })
            .await
            .unwrap_err();

        assert_eq!(err.action_index(), Some(2));
        assert_eq!(err.action_kind(), Some(ActionKind::Scroll));
        assert_eq!(backend.endpoints().len(), 3);
        assert_eq!(capture.captures(), 2);
    }

    #[test]
    fn test_persist_capture_result_decodes_image() {
        let tmp = tempfile::tempdir().unwrap();
        let run = ArtifactStore::new(tmp.path(), true).start_run("scroll");
        let encoded = general_purpose::STANDARD.encode(b"\x89PNG fake");
        let result = serde_json::json!({
            "success": true,
            "screenshot": format!("data:image/png;base64,{encoded}")
        });

        let saved = persist_capture_result(&run, "scroll_0", &result);
        assert_eq!(saved.len(), 2);
        assert_eq!(std::fs::read(&saved[1]).unwrap(), b"\x89PNG fake");
    }
}
