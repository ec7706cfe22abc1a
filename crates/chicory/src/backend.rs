//! Automation backend: the local HTTP service that performs the actual input
//! injection. The engine only computes coordinates and dispatches requests.

use crate::action::ScrollDirection;
use crate::errors::{BackendError, ErrorBody};
use crate::types::{BoundingBox, Detection, Rect, ScreenPoint, WindowInfo, WindowOwner};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_BACKEND_URL: &str = "http://127.0.0.1:8123";

pub mod endpoints {
    pub const HEALTH: &str = "/health";
    pub const CLICK: &str = "/mouse/click";
    pub const RIGHT_CLICK: &str = "/mouse/right_click";
    pub const SCROLL: &str = "/mouse/scroll";
    pub const SCROLL_AND_CAPTURE: &str = "/mouse/scroll_and_capture";
    pub const TYPE: &str = "/keyboard/type";
    pub const KEY: &str = "/keyboard/key";
}

/// Window description attached to every backend request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WindowPayload {
    pub owner: WindowOwner,
    pub bounds: Rect,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub focus: Option<bool>,
}

impl WindowPayload {
    pub fn from_window(window: &WindowInfo) -> Self {
        Self {
            owner: window.owner.clone(),
            bounds: window.bounds,
            title: window.title.clone(),
            focus: None,
        }
    }

    /// Same window, asking the backend to bring it to the front first.
    pub fn focused(window: &WindowInfo) -> Self {
        Self {
            focus: Some(true),
            ..Self::from_window(window)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ElementPayload {
    pub bbox: BoundingBox,
    #[serde(rename = "type")]
    pub element_type: Option<String>,
    pub role: Option<String>,
}

impl From<&Detection> for ElementPayload {
    fn from(detection: &Detection) -> Self {
        Self {
            bbox: detection.bbox,
            element_type: detection.element_type.clone(),
            role: detection.role.clone(),
        }
    }
}

/// Body of `/mouse/click` and `/mouse/right_click`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PointerRequest {
    pub x: i32,
    pub y: i32,
    pub window_info: WindowPayload,
    pub element_info: ElementPayload,
}

impl PointerRequest {
    pub fn new(point: ScreenPoint, window: &WindowInfo, detection: &Detection) -> Self {
        Self {
            x: point.x,
            y: point.y,
            window_info: WindowPayload::from_window(window),
            element_info: ElementPayload::from(detection),
        }
    }
}

/// Body of `/mouse/scroll` and `/mouse/scroll_and_capture`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScrollRequest {
    pub x: i32,
    pub y: i32,
    pub direction: ScrollDirection,
    pub simulate_wheel: bool,
    pub window_info: WindowPayload,
}

impl ScrollRequest {
    pub fn new(point: ScreenPoint, direction: ScrollDirection, window: &WindowInfo) -> Self {
        Self {
            x: point.x,
            y: point.y,
            direction,
            simulate_wheel: true,
            window_info: WindowPayload::focused(window),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TypeRequest {
    pub text: String,
    pub window_info: WindowPayload,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeyRequest {
    /// Normalized, lower-case key or `+`-joined combination.
    pub key: String,
    pub window_info: WindowPayload,
}

/// Primitive operations offered by the automation backend.
///
/// Implementations must not retry; a failed call is reported as-is and the
/// caller decides whether the plan continues.
#[async_trait]
pub trait AutomationBackend: Send + Sync {
    async fn health(&self) -> Result<(), BackendError>;

    async fn click(&self, request: &PointerRequest) -> Result<(), BackendError>;

    async fn right_click(&self, request: &PointerRequest) -> Result<(), BackendError>;

    async fn scroll(&self, request: &ScrollRequest) -> Result<(), BackendError>;

    /// Scroll and let the backend capture the window; returns the capture
    /// result document as sent by the backend.
    async fn scroll_and_capture(&self, request: &ScrollRequest) -> Result<Value, BackendError>;

    async fn type_text(&self, request: &TypeRequest) -> Result<(), BackendError>;

    async fn press_key(&self, request: &KeyRequest) -> Result<(), BackendError>;
}

/// Automation backend reached over HTTP on localhost.
#[derive(Clone)]
pub struct HttpBackend {
    client: Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(base_url: &str, request_timeout: Duration) -> Result<Self, BackendError> {
        let client = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| BackendError::from_reqwest(base_url, e))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn post<T: Serialize + Sync>(&self, endpoint: &str, body: &T) -> Result<Value, BackendError> {
        let url = format!("{}{}", self.base_url, endpoint);
        debug!("[backend] POST {} {}", url, log_preview(body));

        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| BackendError::from_reqwest(endpoint, e))?;

        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| BackendError::from_reqwest(endpoint, e))?;

        interpret_response(endpoint, status, &text)
    }
}

/// Request body as logged: typed text is replaced by its length.
pub(crate) fn log_preview<T: Serialize>(body: &T) -> String {
    let mut value = serde_json::to_value(body).unwrap_or_default();
    if let Some(text) = value.get_mut("text") {
        let chars = text.as_str().map(|t| t.chars().count()).unwrap_or(0);
        *text = Value::String(format!("<{chars} chars>"));
    }
    value.to_string()
}

/// Decide whether a backend response is a success.
///
/// Success is a 2xx status and, when the body is a JSON object carrying a
/// boolean `success`, that flag set to true. Non-JSON 2xx bodies are accepted
/// and returned as `Value::Null`.
pub(crate) fn interpret_response(endpoint: &str, status: u16, text: &str) -> Result<Value, BackendError> {
    if !(200..300).contains(&status) {
        return Err(BackendError::Status {
            endpoint: endpoint.to_string(),
            status,
            body: ErrorBody::parse(text),
        });
    }

    let value = match ErrorBody::parse(text) {
        ErrorBody::Structured(value) => value,
        ErrorBody::Text(_) | ErrorBody::Empty => return Ok(Value::Null),
    };

    if value.get("success").and_then(Value::as_bool) == Some(false) {
        return Err(BackendError::Rejected {
            endpoint: endpoint.to_string(),
            body: ErrorBody::Structured(value),
        });
    }

    Ok(value)
}

#[async_trait]
impl AutomationBackend for HttpBackend {
    async fn health(&self) -> Result<(), BackendError> {
        let url = format!("{}{}", self.base_url, endpoints::HEALTH);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| BackendError::from_reqwest(endpoints::HEALTH, e))?;

        let status = response.status().as_u16();
        let text = response.text().await.unwrap_or_default();
        interpret_response(endpoints::HEALTH, status, &text).map(|_| ())
    }

    async fn click(&self, request: &PointerRequest) -> Result<(), BackendError> {
        self.post(endpoints::CLICK, request).await.map(|_| ())
    }

    async fn right_click(&self, request: &PointerRequest) -> Result<(), BackendError> {
        self.post(endpoints::RIGHT_CLICK, request).await.map(|_| ())
    }

    async fn scroll(&self, request: &ScrollRequest) -> Result<(), BackendError> {
        self.post(endpoints::SCROLL, request).await.map(|_| ())
    }

    async fn scroll_and_capture(&self, request: &ScrollRequest) -> Result<Value, BackendError> {
        self.post(endpoints::SCROLL_AND_CAPTURE, request).await
    }

    async fn type_text(&self, request: &TypeRequest) -> Result<(), BackendError> {
        self.post(endpoints::TYPE, request).await.map(|_| ())
    }

    async fn press_key(&self, request: &KeyRequest) -> Result<(), BackendError> {
        self.post(endpoints::KEY, request).await.map(|_| ())
    }
}
