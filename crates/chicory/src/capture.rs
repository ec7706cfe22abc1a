//! Window capture service.

use crate::errors::AutomationError;
use crate::types::{Rect, WindowInfo, WindowOwner};
use async_trait::async_trait;
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder};
use std::io::Cursor;
use tracing::{debug, info};

/// One capture of a window, together with the window snapshot it was taken
/// against.
#[derive(Debug, Clone)]
pub struct Capture {
    /// PNG-encoded capture in raster (device) pixels.
    pub png: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub window: WindowInfo,
}

#[async_trait]
pub trait CaptureService: Send + Sync {
    async fn capture(&self, window_id: u32) -> Result<Capture, AutomationError>;

    async fn list_windows(&self) -> Result<Vec<WindowInfo>, AutomationError>;
}

/// Capture backed by `xcap`. Calls run on the blocking pool.
#[derive(Debug, Default, Clone, Copy)]
pub struct XcapCapture;

fn capture_err(context: &str) -> impl Fn(xcap::XCapError) -> AutomationError + '_ {
    move |e| AutomationError::Capture(format!("{context}: {e}"))
}

fn window_info(window: &xcap::Window) -> xcap::XCapResult<WindowInfo> {
    let bounds = Rect::new(
        window.x()? as f64,
        window.y()? as f64,
        window.width()? as f64,
        window.height()? as f64,
    );
    let scale_factor = window
        .current_monitor()
        .and_then(|m| m.scale_factor())
        .map(|s| s as f64)
        .unwrap_or(1.0);

    Ok(WindowInfo {
        id: Some(window.id()?),
        owner: WindowOwner {
            name: window.app_name()?,
            process_id: window.pid().ok(),
            ..Default::default()
        },
        title: window.title()?,
        bounds,
        scale_factor,
    })
}

fn encode_png(rgba: &[u8], width: u32, height: u32) -> Result<Vec<u8>, AutomationError> {
    let mut png = Vec::new();
    PngEncoder::new(Cursor::new(&mut png))
        .write_image(rgba, width, height, ExtendedColorType::Rgba8)
        .map_err(|e| AutomationError::Capture(format!("Failed to encode capture to PNG: {e}")))?;
    Ok(png)
}

fn capture_blocking(window_id: u32) -> Result<Capture, AutomationError> {
    let windows = xcap::Window::all().map_err(capture_err("Failed to enumerate windows"))?;
    let window = windows
        .into_iter()
        .find(|w| w.id().ok() == Some(window_id))
        .ok_or_else(|| AutomationError::Capture(format!("No window with id {window_id}")))?;

    let mut info = window_info(&window).map_err(capture_err("Failed to read window"))?;
    let image = window
        .capture_image()
        .map_err(capture_err("Failed to capture window"))?;
    let (width, height) = (image.width(), image.height());

    // No monitor information: derive the scale from raster vs. point size.
    if info.scale_factor == 1.0 && info.bounds.width > 0.0 {
        let ratio = width as f64 / info.bounds.width;
        if ratio > 1.0 {
            info.scale_factor = ratio;
        }
    }

    debug!(
        "[capture] window bounds (points)=({:.0},{:.0},{:.0},{:.0}), capture (pixels)={}x{}, scale={:.2}",
        info.bounds.x, info.bounds.y, info.bounds.width, info.bounds.height, width, height, info.scale_factor
    );

    let png = encode_png(image.as_raw(), width, height)?;
    info!(
        "[capture] Captured '{}' ({}x{}, {}KB)",
        info.title,
        width,
        height,
        png.len() / 1024
    );

    Ok(Capture {
        png,
        width,
        height,
        window: info,
    })
}

fn list_windows_blocking() -> Result<Vec<WindowInfo>, AutomationError> {
    let windows = xcap::Window::all().map_err(capture_err("Failed to enumerate windows"))?;
    Ok(windows
        .iter()
        .filter(|w| !w.is_minimized().unwrap_or(true))
        .filter_map(|w| window_info(w).ok())
        .filter(|info| !info.title.is_empty() && !info.owner.name.is_empty())
        .collect())
}

#[async_trait]
impl CaptureService for XcapCapture {
    async fn capture(&self, window_id: u32) -> Result<Capture, AutomationError> {
        tokio::task::spawn_blocking(move || capture_blocking(window_id))
            .await
            .map_err(|e| AutomationError::Capture(format!("Capture task failed: {e}")))?
    }

    async fn list_windows(&self) -> Result<Vec<WindowInfo>, AutomationError> {
        tokio::task::spawn_blocking(list_windows_blocking)
            .await
            .map_err(|e| AutomationError::Capture(format!("Window listing task failed: {e}")))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_png_signature() {
        let rgba = vec![255u8; 2 * 2 * 4];
        let png = encode_png(&rgba, 2, 2).unwrap();
        assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n");
    }
}
