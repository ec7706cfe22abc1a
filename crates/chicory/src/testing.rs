//! In-process fakes shared by the unit tests.

use crate::backend::endpoints;
use crate::backend::{AutomationBackend, KeyRequest, PointerRequest, ScrollRequest, TypeRequest};
use crate::capture::{Capture, CaptureService};
use crate::errors::{AutomationError, BackendError, ErrorBody};
use crate::types::{Rect, WindowInfo, WindowOwner};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Mutex;

pub(crate) fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("debug")
        .with_test_writer()
        .try_init();
}

pub(crate) fn window(x: f64, y: f64, w: f64, h: f64, scale: f64) -> WindowInfo {
    WindowInfo {
        id: Some(42),
        owner: WindowOwner {
            name: "TestApp".into(),
            process_id: Some(1234),
            ..Default::default()
        },
        title: "Test Window".into(),
        bounds: Rect::new(x, y, w, h),
        scale_factor: scale,
    }
}

/// Backend that records every non-health call.
#[derive(Default)]
pub(crate) struct RecordingBackend {
    calls: Mutex<Vec<(&'static str, Value)>>,
    health_probes: AtomicU32,
    /// Number of health probes that fail before one succeeds; `u32::MAX`
    /// means the backend never comes up.
    health_failures: u32,
    /// 0-based position of the recorded call that fails.
    fail_call_at: Option<usize>,
    /// 0-based position of the recorded call that never answers.
    stall_call_at: Option<usize>,
    down: AtomicBool,
}

impl RecordingBackend {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_health_failures(mut self, failures: u32) -> Self {
        self.health_failures = failures;
        self
    }

    pub(crate) fn failing_at(mut self, call: usize) -> Self {
        self.fail_call_at = Some(call);
        self
    }

    pub(crate) fn stalling_at(mut self, call: usize) -> Self {
        self.stall_call_at = Some(call);
        self
    }

    /// Fail every health probe from now on.
    pub(crate) fn go_down(&self) {
        self.down.store(true, Ordering::SeqCst);
    }

    pub(crate) fn calls(&self) -> Vec<(&'static str, Value)> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub(crate) fn endpoints(&self) -> Vec<&'static str> {
        self.calls().into_iter().map(|(e, _)| e).collect()
    }

    pub(crate) fn health_probes(&self) -> u32 {
        self.health_probes.load(Ordering::SeqCst)
    }

    async fn record<T: serde::Serialize + Sync>(
        &self,
        endpoint: &'static str,
        request: &T,
    ) -> Result<Value, BackendError> {
        let body = serde_json::to_value(request).unwrap();
        let position = {
            let mut calls = self.calls.lock().unwrap();
            calls.push((endpoint, body));
            calls.len() - 1
        };
        if self.stall_call_at == Some(position) {
            std::future::pending::<()>().await;
        }
        if self.fail_call_at == Some(position) {
            return Err(BackendError::Status {
                endpoint: endpoint.to_string(),
                status: 500,
                body: ErrorBody::parse(r#"{"detail": "injected failure"}"#),
            });
        }
        Ok(json!({"success": true, "screenshot": null, "position": position}))
    }
}

#[async_trait]
impl AutomationBackend for RecordingBackend {
    async fn health(&self) -> Result<(), BackendError> {
        let probe = self.health_probes.fetch_add(1, Ordering::SeqCst);
        if probe < self.health_failures || self.down.load(Ordering::SeqCst) {
            Err(BackendError::Status {
                endpoint: endpoints::HEALTH.to_string(),
                status: 503,
                body: ErrorBody::Empty,
            })
        } else {
            Ok(())
        }
    }

    async fn click(&self, request: &PointerRequest) -> Result<(), BackendError> {
        self.record(endpoints::CLICK, request).await.map(|_| ())
    }

    async fn right_click(&self, request: &PointerRequest) -> Result<(), BackendError> {
        self.record(endpoints::RIGHT_CLICK, request).await.map(|_| ())
    }

    async fn scroll(&self, request: &ScrollRequest) -> Result<(), BackendError> {
        self.record(endpoints::SCROLL, request).await.map(|_| ())
    }

    async fn scroll_and_capture(&self, request: &ScrollRequest) -> Result<Value, BackendError> {
        self.record(endpoints::SCROLL_AND_CAPTURE, request).await
    }

    async fn type_text(&self, request: &TypeRequest) -> Result<(), BackendError> {
        self.record(endpoints::TYPE, request).await.map(|_| ())
    }

    async fn press_key(&self, request: &KeyRequest) -> Result<(), BackendError> {
        self.record(endpoints::KEY, request).await.map(|_| ())
    }
}

/// Capture service that hands out numbered fake PNGs of one window.
pub(crate) struct FakeCapture {
    window: WindowInfo,
    captures: AtomicU32,
}

impl FakeCapture {
    pub(crate) fn new(window: WindowInfo) -> Self {
        Self {
            window,
            captures: AtomicU32::new(0),
        }
    }

    pub(crate) fn captures(&self) -> u32 {
        self.captures.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CaptureService for FakeCapture {
    async fn capture(&self, window_id: u32) -> Result<Capture, AutomationError> {
        if self.window.id != Some(window_id) {
            return Err(AutomationError::Capture(format!(
                "No window with id {window_id}"
            )));
        }
        let n = self.captures.fetch_add(1, Ordering::SeqCst);
        Ok(Capture {
            png: format!("png-{n}").into_bytes(),
            width: (self.window.bounds.width * self.window.scale_factor) as u32,
            height: (self.window.bounds.height * self.window.scale_factor) as u32,
            window: self.window.clone(),
        })
    }

    async fn list_windows(&self) -> Result<Vec<WindowInfo>, AutomationError> {
        Ok(vec![self.window.clone()])
    }
}
