//! Coordinate conversion from capture space to screen space.
//!
//! Detections arrive as window-relative boxes in raster pixels of the window
//! capture. The backend is addressed in absolute screen points, so every box
//! is de-scaled by the window's scale factor and then offset by the window's
//! screen origin. Coordinates are always window-relative then globalized,
//! never display-relative.

use crate::types::{Rect, ScreenPoint, WindowInfo};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum GeometryError {
    #[error("bounding box has non-positive size {width}x{height}")]
    NonPositiveSize { width: f64, height: f64 },

    #[error("scale factor must be positive and finite, got {0}")]
    InvalidScaleFactor(f64),

    #[error("bounding box has non-finite coordinates")]
    NonFinite,
}

/// Round to the nearest integer screen point, ties toward positive infinity.
pub fn round_point(value: f64) -> i32 {
    (value + 0.5).floor() as i32
}

fn check_scale(scale_factor: f64) -> Result<f64, GeometryError> {
    if scale_factor.is_finite() && scale_factor > 0.0 {
        Ok(scale_factor)
    } else {
        Err(GeometryError::InvalidScaleFactor(scale_factor))
    }
}

fn check_box(window_box: &Rect) -> Result<(), GeometryError> {
    let Rect {
        x,
        y,
        width,
        height,
    } = *window_box;
    if !(x.is_finite() && y.is_finite() && width.is_finite() && height.is_finite()) {
        return Err(GeometryError::NonFinite);
    }
    if width <= 0.0 || height <= 0.0 {
        return Err(GeometryError::NonPositiveSize { width, height });
    }
    Ok(())
}

/// Convert a window-relative box (raster pixels) into the absolute box it
/// covers on screen (screen points).
pub fn screen_rect(window_box: &Rect, window: &WindowInfo) -> Result<Rect, GeometryError> {
    check_box(window_box)?;
    let scale = check_scale(window.scale_factor)?;

    // Device pixels -> screen points
    let scaled_x = window_box.x / scale;
    let scaled_y = window_box.y / scale;
    let scaled_width = window_box.width / scale;
    let scaled_height = window_box.height / scale;

    Ok(Rect::new(
        window.bounds.x + scaled_x,
        window.bounds.y + scaled_y,
        scaled_width,
        scaled_height,
    ))
}

/// Screen point at the centre of a window-relative box.
pub fn to_screen_point(window_box: &Rect, window: &WindowInfo) -> Result<ScreenPoint, GeometryError> {
    let rect = screen_rect(window_box, window)?;
    let (cx, cy) = rect.center();
    Ok(ScreenPoint::new(round_point(cx), round_point(cy)))
}

/// Centre of the window's own bounds; scroll actions always aim here.
pub fn window_center(window: &WindowInfo) -> ScreenPoint {
    let (cx, cy) = window.bounds.center();
    ScreenPoint::new(round_point(cx), round_point(cy))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::WindowOwner;

    fn window(x: f64, y: f64, w: f64, h: f64, scale: f64) -> WindowInfo {
        WindowInfo {
            id: Some(1),
            owner: WindowOwner::default(),
            title: "test".to_string(),
            bounds: Rect::new(x, y, w, h),
            scale_factor: scale,
        }
    }

    #[test]
    fn test_unit_scale_is_offset_plus_center() {
        let win = window(100.0, 50.0, 800.0, 600.0, 1.0);
        let bbox = Rect::new(200.0, 100.0, 100.0, 40.0);
        let p = to_screen_point(&bbox, &win).unwrap();
        assert_eq!(p, ScreenPoint::new(100 + 250, 50 + 120));
    }

    #[test]
    fn test_retina_scenario() {
        let win = window(100.0, 50.0, 800.0, 600.0, 2.0);
        let bbox = Rect::new(200.0, 100.0, 100.0, 40.0);
        assert_eq!(to_screen_point(&bbox, &win).unwrap(), ScreenPoint::new(225, 110));
    }

    #[test]
    fn test_scale_invariance() {
        let base = Rect::new(37.0, 91.0, 64.0, 18.0);
        for s in [1.25, 1.5, 2.0, 3.0] {
            let scaled = Rect::new(base.x * s, base.y * s, base.width * s, base.height * s);
            let at_one = to_screen_point(&base, &window(-1280.0, 40.0, 900.0, 700.0, 1.0)).unwrap();
            let at_s = to_screen_point(&scaled, &window(-1280.0, 40.0, 900.0, 700.0, s)).unwrap();
            assert_eq!(at_one, at_s, "scale {s}");
        }
    }

    #[test]
    fn test_negative_origin_on_left_monitor() {
        let win = window(-1920.0, 0.0, 1000.0, 800.0, 1.0);
        let bbox = Rect::new(10.0, 10.0, 20.0, 20.0);
        assert_eq!(to_screen_point(&bbox, &win).unwrap(), ScreenPoint::new(-1900, 20));
    }

    #[test]
    fn test_rounding_ties_toward_positive_infinity() {
        assert_eq!(round_point(2.5), 3);
        assert_eq!(round_point(-2.5), -2);
        assert_eq!(round_point(2.49), 2);
    }

    #[test]
    fn test_zero_size_box_is_rejected() {
        let win = window(0.0, 0.0, 800.0, 600.0, 1.0);
        let err = to_screen_point(&Rect::new(10.0, 10.0, 0.0, 5.0), &win).unwrap_err();
        assert_eq!(
            err,
            GeometryError::NonPositiveSize {
                width: 0.0,
                height: 5.0
            }
        );
        assert!(to_screen_point(&Rect::new(10.0, 10.0, 5.0, -1.0), &win).is_err());
    }

    #[test]
    fn test_invalid_scale_is_rejected() {
        let bbox = Rect::new(10.0, 10.0, 5.0, 5.0);
        for s in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            let err = to_screen_point(&bbox, &window(0.0, 0.0, 10.0, 10.0, s)).unwrap_err();
            assert!(matches!(err, GeometryError::InvalidScaleFactor(_)));
        }
    }

    #[test]
    fn test_window_center_ignores_scale() {
        let win = window(100.0, 0.0, 800.0, 600.0, 2.0);
        assert_eq!(window_center(&win), ScreenPoint::new(500, 300));
    }

    #[test]
    fn test_screen_rect() {
        let win = window(100.0, 50.0, 800.0, 600.0, 2.0);
        let r = screen_rect(&Rect::new(200.0, 100.0, 100.0, 40.0), &win).unwrap();
        assert_eq!(r, Rect::new(200.0, 100.0, 50.0, 20.0));
    }
}
