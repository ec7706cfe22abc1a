//! Client side of the reasoning service.
//!
//! The reasoning service receives a window capture and a natural-language
//! query and answers with detections and a proposed action list. The engine
//! only consumes its output.

use crate::action::RawAction;
use crate::errors::AutomationError;
use crate::types::{BoundingBox, Detection};
use crate::utils::{optional_index, string_or_number, truncate};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Response body of the reasoning service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReasoningResponse {
    #[serde(default)]
    pub boxes: Vec<RawDetection>,
    #[serde(default)]
    pub actions: Vec<RawAction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
    #[serde(
        default,
        deserialize_with = "optional_index",
        skip_serializing_if = "Option::is_none"
    )]
    pub chosen_element_index: Option<usize>,
}

impl ReasoningResponse {
    /// Detections in service order, each tagged with its original index.
    pub fn detections(&self) -> Vec<Detection> {
        self.boxes
            .iter()
            .enumerate()
            .map(|(position, raw)| raw.to_detection(position))
            .collect()
    }
}

/// Detection exactly as the reasoning service emits it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawDetection {
    #[serde(default, deserialize_with = "string_or_number")]
    pub mesh_id: Option<String>,
    #[serde(rename = "originalIndex", default, skip_serializing_if = "Option::is_none")]
    pub original_index: Option<usize>,
    #[serde(default)]
    pub bbox: BoundingBox,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub element_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl RawDetection {
    fn to_detection(&self, position: usize) -> Detection {
        let meta_str = |key: &str| {
            self.metadata
                .get(key)
                .and_then(|v| v.as_str())
                .map(str::to_string)
        };
        Detection {
            identifier: self.mesh_id.clone(),
            original_index: self.original_index.unwrap_or(position),
            bbox: self.bbox,
            element_type: self.element_type.clone(),
            text_content: self
                .text
                .clone()
                .filter(|t| !t.is_empty())
                .or_else(|| meta_str("text_content")),
            role: meta_str("role"),
            confidence: self.confidence,
            metadata: self.metadata.clone(),
        }
    }
}

/// Anything that can turn a capture and a query into detections and actions.
#[async_trait]
pub trait ReasoningService: Send + Sync {
    async fn reason(&self, png: &[u8], query: &str) -> Result<ReasoningResponse, AutomationError>;
}

/// Reasoning service reached over HTTP with a multipart upload.
#[derive(Clone)]
pub struct HttpReasoningClient {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpReasoningClient {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, AutomationError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AutomationError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl ReasoningService for HttpReasoningClient {
    async fn reason(&self, png: &[u8], query: &str) -> Result<ReasoningResponse, AutomationError> {
        info!(
            "[reasoning] Sending {}KB capture to {} (query: {})",
            png.len() / 1024,
            self.endpoint,
            truncate(query, 50)
        );

        let file = Part::bytes(png.to_vec())
            .file_name("screenshot.png")
            .mime_str("image/png")
            .map_err(|e| AutomationError::Reasoning(format!("invalid upload part: {e}")))?;
        let form = Form::new().text("query", query.to_string()).part("file", file);

        let resp = self
            .client
            .post(&self.endpoint)
            .multipart(form)
            .send()
            .await
            .map_err(|e| AutomationError::Reasoning(format!("request failed: {e}")))?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| AutomationError::Reasoning(format!("failed to read response: {e}")))?;

        if !status.is_success() {
            warn!("[reasoning] Service error: {} - {}", status, text);
            return Err(AutomationError::Reasoning(format!(
                "service returned {status}: {text}"
            )));
        }

        debug!("[reasoning] Response: {}", truncate(&text, 500));

        serde_json::from_str(&text)
            .map_err(|e| AutomationError::Reasoning(format!("failed to parse response: {e}")))
    }
}
