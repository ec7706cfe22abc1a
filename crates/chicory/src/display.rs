//! Display resolution for multi-monitor layouts.
//!
//! The resolved display is used for diagnostics and the off-screen check
//! only; coordinate conversion never depends on it.

use crate::errors::AutomationError;
use crate::types::{Display, Rect, ScreenPoint};
use tracing::debug;

/// Pick the display that contains the window's top-left corner.
///
/// Falls back to the primary display, then to the first one listed. Returns
/// `None` only when `displays` is empty.
pub fn resolve<'a>(window_bounds: &Rect, displays: &'a [Display]) -> Option<&'a Display> {
    displays
        .iter()
        .find(|d| d.bounds.contains(window_bounds.x, window_bounds.y))
        .or_else(|| displays.iter().find(|d| d.is_primary))
        .or_else(|| displays.first())
}

/// Whether a computed point lands on any known display. An empty display
/// list cannot disprove anything, so it counts as on-screen.
pub fn point_on_any_display(point: ScreenPoint, displays: &[Display]) -> bool {
    displays.is_empty()
        || displays
            .iter()
            .any(|d| d.bounds.contains(point.x as f64, point.y as f64))
}

/// Source of the current display layout. Read fresh on every call.
pub trait DisplayProvider: Send + Sync {
    fn displays(&self) -> Result<Vec<Display>, AutomationError>;
}

/// Displays enumerated through `xcap`.
#[derive(Debug, Default, Clone, Copy)]
pub struct XcapDisplays;

impl DisplayProvider for XcapDisplays {
    fn displays(&self) -> Result<Vec<Display>, AutomationError> {
        let monitors = xcap::Monitor::all()
            .map_err(|e| AutomationError::Capture(format!("Failed to enumerate monitors: {e}")))?;

        let mut displays = Vec::with_capacity(monitors.len());
        for monitor in monitors {
            let resolved = (|| -> xcap::XCapResult<Display> {
                let bounds = Rect::new(
                    monitor.x()? as f64,
                    monitor.y()? as f64,
                    monitor.width()? as f64,
                    monitor.height()? as f64,
                );
                Ok(Display {
                    id: monitor.id()?.to_string(),
                    name: monitor.name()?,
                    bounds,
                    work_area: bounds,
                    scale_factor: monitor.scale_factor()? as f64,
                    is_primary: monitor.is_primary()?,
                })
            })()
            .map_err(|e| AutomationError::Capture(format!("Failed to read monitor: {e}")))?;

            debug!(
                "[display] {} '{}' at ({}, {}) {}x{} scale {:.2}{}",
                resolved.id,
                resolved.name,
                resolved.bounds.x,
                resolved.bounds.y,
                resolved.bounds.width,
                resolved.bounds.height,
                resolved.scale_factor,
                if resolved.is_primary { " (primary)" } else { "" }
            );
            displays.push(resolved);
        }
        Ok(displays)
    }
}

/// A static display layout, for dry runs and tests.
#[derive(Debug, Default, Clone)]
pub struct FixedDisplays(pub Vec<Display>);

impl DisplayProvider for FixedDisplays {
    fn displays(&self) -> Result<Vec<Display>, AutomationError> {
        Ok(self.0.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn display(id: &str, x: f64, y: f64, w: f64, h: f64, primary: bool) -> Display {
        let bounds = Rect::new(x, y, w, h);
        Display {
            id: id.into(),
            name: id.into(),
            bounds,
            work_area: bounds,
            scale_factor: 1.0,
            is_primary: primary,
        }
    }

    fn layout() -> Vec<Display> {
        vec![
            display("left", -1920.0, 0.0, 1920.0, 1080.0, false),
            display("main", 0.0, 0.0, 2560.0, 1440.0, true),
        ]
    }

    #[test]
    fn test_window_on_secondary_display() {
        let displays = layout();
        let found = resolve(&Rect::new(-1000.0, 100.0, 400.0, 300.0), &displays).unwrap();
        assert_eq!(found.id, "left");
    }

    #[test]
    fn test_shared_edge_belongs_to_the_right_display() {
        let displays = layout();
        let found = resolve(&Rect::new(0.0, 10.0, 400.0, 300.0), &displays).unwrap();
        assert_eq!(found.id, "main");
    }

    #[test]
    fn test_off_screen_window_falls_back_to_primary() {
        let displays = layout();
        let found = resolve(&Rect::new(9000.0, 9000.0, 10.0, 10.0), &displays).unwrap();
        assert_eq!(found.id, "main");
    }

    #[test]
    fn test_no_primary_falls_back_to_first() {
        let displays = vec![
            display("a", 0.0, 0.0, 100.0, 100.0, false),
            display("b", 100.0, 0.0, 100.0, 100.0, false),
        ];
        let found = resolve(&Rect::new(-50.0, -50.0, 10.0, 10.0), &displays).unwrap();
        assert_eq!(found.id, "a");
        assert!(resolve(&Rect::default(), &[]).is_none());
    }

    #[test]
    fn test_point_on_any_display() {
        let displays = layout();
        assert!(point_on_any_display(ScreenPoint::new(-5, 5), &displays));
        assert!(!point_on_any_display(ScreenPoint::new(2560, 5), &displays));
        assert!(point_on_any_display(ScreenPoint::new(99999, 5), &[]));
    }

    #[test]
    fn test_fixed_displays_provider() {
        let provider = FixedDisplays(layout());
        assert_eq!(provider.displays().unwrap().len(), 2);
    }
}
