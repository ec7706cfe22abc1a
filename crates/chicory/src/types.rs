use serde::{Deserialize, Serialize};

/// Axis-aligned rectangle; units depend on context (raster pixels for
/// detections, screen points for window and display bounds).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Half-open containment: the right and bottom edges are outside.
    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.x && x < self.x + self.width && y >= self.y && y < self.y + self.height
    }

    pub fn center(&self) -> (f64, f64) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }
}

/// Integer screen point, the unit the automation backend is addressed in.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct ScreenPoint {
    pub x: i32,
    pub y: i32,
}

impl ScreenPoint {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

impl std::fmt::Display for ScreenPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Bounding box of a detection in both coordinate spaces reported by the
/// reasoning service.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct BoundingBox {
    /// Window-relative box in raster (capture) pixels.
    #[serde(default)]
    pub window: Option<Rect>,
    /// Absolute box as reported by the reasoning service; informational only.
    #[serde(default)]
    pub screen: Option<Rect>,
}

/// One interactive-element candidate returned by the reasoning service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Detection {
    /// Stable identifier assigned by the reasoning service (`mesh_id`).
    #[serde(rename = "mesh_id", default, skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,
    /// 0-based position in the reasoning service's detection list.
    #[serde(rename = "originalIndex", default)]
    pub original_index: usize,
    #[serde(default)]
    pub bbox: BoundingBox,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub element_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    /// Remaining metadata, kept verbatim for diagnostics.
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub metadata: serde_json::Value,
}

impl Detection {
    /// Window-relative box, if the reasoning service produced one.
    pub fn window_box(&self) -> Option<Rect> {
        self.bbox.window
    }

    /// Short label for logs: identifier when present, else the index.
    pub fn label(&self) -> String {
        match &self.identifier {
            Some(id) => id.clone(),
            None => format!("#{}", self.original_index),
        }
    }
}

/// Process that owns a target window.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct WindowOwner {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub process_id: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bundle_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

/// Snapshot of the target window taken together with its capture.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WindowInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u32>,
    #[serde(default)]
    pub owner: WindowOwner,
    #[serde(default)]
    pub title: String,
    /// Window bounds in screen points.
    pub bounds: Rect,
    /// Device pixels per screen point for the capture of this window.
    #[serde(default = "default_scale_factor")]
    pub scale_factor: f64,
}

fn default_scale_factor() -> f64 {
    1.0
}

/// A physical display as reported by the display enumeration service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Display {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub bounds: Rect,
    /// Screen area excluding taskbars and docks; equals `bounds` when the
    /// platform does not report it.
    pub work_area: Rect,
    pub scale_factor: f64,
    #[serde(default)]
    pub is_primary: bool,
}
