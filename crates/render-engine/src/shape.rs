//! Path and color helpers shared by the overlay renderer and the compositor.

use tiny_skia::{Color, Path, PathBuilder, Rect};

use shotcraft_project_model::Rgba;

use crate::geometry::LayoutRect;

/// Cubic Bézier approximation constant for a quarter circle.
const KAPPA: f32 = 0.552_284_8;

pub fn to_skia_rect(rect: LayoutRect) -> Option<Rect> {
    Rect::from_xywh(
        rect.x as f32,
        rect.y as f32,
        rect.width as f32,
        rect.height as f32,
    )
}

pub fn to_skia_color(color: Rgba) -> Color {
    Color::from_rgba(
        color.r.clamp(0.0, 1.0),
        color.g.clamp(0.0, 1.0),
        color.b.clamp(0.0, 1.0),
        color.a.clamp(0.0, 1.0),
    )
    .unwrap_or(Color::BLACK)
}

/// Rounded rectangle path. The radius is clamped to half the shorter side.
pub fn rounded_rect_path(rect: LayoutRect, radius: f64) -> Option<Path> {
    if rect.is_empty() {
        return None;
    }
    let r = radius.max(0.0).min(rect.width / 2.0).min(rect.height / 2.0) as f32;
    if r <= 0.0 {
        return Some(PathBuilder::from_rect(to_skia_rect(rect)?));
    }

    let (x, y) = (rect.x as f32, rect.y as f32);
    let (right, bottom) = (rect.max_x() as f32, rect.max_y() as f32);
    let k = r * KAPPA;

    let mut pb = PathBuilder::new();
    pb.move_to(x + r, y);
    pb.line_to(right - r, y);
    pb.cubic_to(right - r + k, y, right, y + r - k, right, y + r);
    pb.line_to(right, bottom - r);
    pb.cubic_to(right, bottom - r + k, right - r + k, bottom, right - r, bottom);
    pb.line_to(x + r, bottom);
    pb.cubic_to(x + r - k, bottom, x, bottom - r + k, x, bottom - r);
    pb.line_to(x, y + r);
    pb.cubic_to(x, y + r - k, x + r - k, y, x + r, y);
    pb.close();
    pb.finish()
}

/// Pill shape whose ends are semicircles.
pub fn capsule_path(rect: LayoutRect) -> Option<Path> {
    rounded_rect_path(rect, rect.width.min(rect.height) / 2.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rounded_rect_bounds() {
        let path = rounded_rect_path(LayoutRect::new(10.0, 20.0, 100.0, 50.0), 16.0).unwrap();
        let bounds = path.bounds();
        assert!((bounds.left() - 10.0).abs() < 1e-3);
        assert!((bounds.top() - 20.0).abs() < 1e-3);
        assert!((bounds.right() - 110.0).abs() < 1e-3);
        assert!((bounds.bottom() - 70.0).abs() < 1e-3);
    }

    #[test]
    fn test_empty_rect_has_no_path() {
        assert!(rounded_rect_path(LayoutRect::ZERO, 16.0).is_none());
    }

    #[test]
    fn test_zero_radius_is_plain_rect() {
        assert!(rounded_rect_path(LayoutRect::new(0.0, 0.0, 4.0, 4.0), 0.0).is_some());
    }
}
