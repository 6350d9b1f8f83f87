//! Layout geometry for the screenshot area.
//!
//! Both the still-image path and the video path place content through
//! [`ScreenLayout`], so they always agree on where the content window is.
//! All rectangles here use a top-left origin; [`to_buffer_space`] is the only
//! place a rectangle is converted to a pixel buffer's convention.

use serde::Serialize;

use shotcraft_project_model::{
    layout_scale_factor, DeviceFrameSpec, DeviceSize, LayoutPreset, Screen,
};

/// Fraction of the canvas occupied by the screenshot box.
pub const SCREENSHOT_BOX_RATIO: f64 = 0.7;

/// Corner radius of the screenshot area when no device frame is drawn.
pub const DEFAULT_CORNER_RADIUS: f64 = 16.0;

/// Smallest caption size after scaling.
pub const MINIMUM_FONT_SIZE: f64 = 12.0;

/// Padding between the canvas edge and the frame, before scaling.
const OUTER_PADDING: f64 = 32.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct CanvasSize {
    pub width: u32,
    pub height: u32,
}

impl CanvasSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    pub fn is_positive(&self) -> bool {
        self.width > 0.0 && self.height > 0.0
    }
}

/// Axis-aligned rectangle. `y` grows downwards unless stated otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct LayoutRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl LayoutRect {
    pub const ZERO: LayoutRect = LayoutRect {
        x: 0.0,
        y: 0.0,
        width: 0.0,
        height: 0.0,
    };

    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }

    pub fn max_x(&self) -> f64 {
        self.x + self.width
    }

    pub fn max_y(&self) -> f64 {
        self.y + self.height
    }

    pub fn mid_x(&self) -> f64 {
        self.x + self.width / 2.0
    }

    pub fn mid_y(&self) -> f64 {
        self.y + self.height / 2.0
    }

    /// Grow on every side by `amount`.
    pub fn outset(&self, amount: f64) -> Self {
        Self::new(
            self.x - amount,
            self.y - amount,
            self.width + amount * 2.0,
            self.height + amount * 2.0,
        )
    }
}

/// Row ordering of a pixel buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferOrigin {
    /// Row 0 is the top of the image.
    TopLeft,
    /// Row 0 is the bottom of the image.
    BottomLeft,
}

/// Convert a top-left-origin rectangle into a buffer's coordinate convention.
pub fn to_buffer_space(rect: LayoutRect, canvas_height: f64, origin: BufferOrigin) -> LayoutRect {
    match origin {
        BufferOrigin::TopLeft => rect,
        BufferOrigin::BottomLeft => LayoutRect {
            y: canvas_height - rect.y - rect.height,
            ..rect
        },
    }
}

pub fn scaled_font_size(size: f64, factor: f64) -> f64 {
    (size * factor).max(MINIMUM_FONT_SIZE)
}

pub fn scaled_padding(padding: f64, factor: f64) -> f64 {
    padding * factor
}

pub fn scaled_corner_radius(radius: f64, factor: f64) -> f64 {
    radius * factor
}

/// Size of the screenshot area inside a `box_width × box_height` box.
///
/// When `fit_to_content` is set and `native` is known, one axis is kept at the
/// box maximum and the other shrinks to the content aspect ratio.
pub fn frame_fitting_size(
    native: Option<Size>,
    box_width: f64,
    box_height: f64,
    fit_to_content: bool,
) -> Size {
    let native = match native {
        Some(n) if fit_to_content && n.is_positive() => n,
        _ => return Size::new(box_width, box_height),
    };

    let aspect = native.width / native.height;
    let box_aspect = box_width / box_height;
    if aspect > box_aspect {
        Size::new(box_width, box_width / aspect)
    } else {
        Size::new(box_height * aspect, box_height)
    }
}

/// Resolved placement of every layout element for one (screen, device) pair.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScreenLayout {
    pub canvas: CanvasSize,
    pub preset_has_screenshot: bool,
    /// Scale of this device relative to its category reference.
    pub scale_factor: f64,
    pub outer_padding: f64,
    /// Inner screen area. Zero for text-only layouts.
    pub screenshot_rect: LayoutRect,
    pub corner_radius: f64,
    pub bezel: f64,
    /// Effective frame spec when a device frame is drawn.
    #[serde(skip)]
    pub frame: Option<DeviceFrameSpec>,
}

impl ScreenLayout {
    /// Compute the layout. `native` is the display size of the assigned video
    /// or image, used only when the screen fits its frame to content.
    pub fn compute(screen: &Screen, device: &DeviceSize, native: Option<Size>) -> Self {
        let (width, height) = device.effective_size(screen.is_landscape);
        let canvas = CanvasSize::new(width, height);
        let sf = layout_scale_factor(device);
        let frame = frame_spec_for(screen, device);

        Self {
            canvas,
            preset_has_screenshot: screen.layout_preset.has_screenshot(),
            scale_factor: sf,
            outer_padding: scaled_padding(OUTER_PADDING, sf),
            screenshot_rect: screenshot_area_rect(screen, device, native),
            corner_radius: screenshot_corner_radius(screen, device, native),
            bezel: fitted_size(screen, device, native).width
                * frame.map(|f| f.bezel_ratio).unwrap_or(0.0),
            frame,
        }
    }

    /// Outer rectangle of the device frame (screen area plus bezel).
    pub fn frame_rect(&self) -> LayoutRect {
        self.screenshot_rect.outset(self.bezel)
    }
}

fn frame_spec_for(screen: &Screen, device: &DeviceSize) -> Option<DeviceFrameSpec> {
    if !screen.show_device_frame {
        return None;
    }
    device
        .category
        .frame_spec()
        .map(|spec| spec.applying(&screen.device_frame_config))
}

fn fitted_size(screen: &Screen, device: &DeviceSize, native: Option<Size>) -> Size {
    let (width, height) = device.effective_size(screen.is_landscape);
    frame_fitting_size(
        native,
        width as f64 * SCREENSHOT_BOX_RATIO,
        height as f64 * SCREENSHOT_BOX_RATIO,
        screen.fit_frame_to_content,
    )
}

/// Inner screen rectangle in top-left canvas coordinates.
pub fn screenshot_area_rect(screen: &Screen, device: &DeviceSize, native: Option<Size>) -> LayoutRect {
    if !screen.layout_preset.has_screenshot() {
        return LayoutRect::ZERO;
    }

    let (width, height) = device.effective_size(screen.is_landscape);
    let (canvas_w, canvas_h) = (width as f64, height as f64);
    let fitted = fitted_size(screen, device, native);
    let bezel = frame_spec_for(screen, device)
        .map(|spec| fitted.width * spec.bezel_ratio)
        .unwrap_or(0.0);
    let outer_pad = scaled_padding(OUTER_PADDING, layout_scale_factor(device));

    let x = (canvas_w - fitted.width) / 2.0;
    let y = match screen.layout_preset {
        // Frame bottom sits on the outer padding; the screen starts one bezel inside.
        LayoutPreset::TextTop => canvas_h - outer_pad - fitted.height - bezel,
        LayoutPreset::TextBottom => outer_pad + bezel,
        LayoutPreset::TextOverlay | LayoutPreset::ScreenshotOnly => {
            (canvas_h - fitted.height) / 2.0
        }
        LayoutPreset::TextOnly => return LayoutRect::ZERO,
    };

    LayoutRect::new(x, y, fitted.width, fitted.height)
}

/// Corner radius of the inner screen area.
pub fn screenshot_corner_radius(screen: &Screen, device: &DeviceSize, native: Option<Size>) -> f64 {
    match frame_spec_for(screen, device) {
        Some(spec) => {
            let fitted_w = fitted_size(screen, device, native).width;
            let bezel = fitted_w * spec.bezel_ratio;
            let outer_corner = fitted_w * spec.corner_radius_ratio;
            (outer_corner - bezel).max(0.0)
        }
        None => DEFAULT_CORNER_RADIUS,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use shotcraft_project_model::DeviceCategory;

    const EPS: f64 = 1e-9;

    fn iphone_61() -> DeviceSize {
        DeviceSize::find("iPhone 6.1\"").unwrap()
    }

    fn screen(preset: LayoutPreset) -> Screen {
        Screen {
            layout_preset: preset,
            ..Screen::new("s")
        }
    }

    #[test]
    fn test_text_top_iphone_scenario() {
        let rect = screenshot_area_rect(&screen(LayoutPreset::TextTop), &iphone_61(), None);
        assert!((rect.width - 819.0).abs() < EPS);
        assert!((rect.height - 1772.4).abs() < 1e-6);
        assert!((rect.x - 175.5).abs() < 1e-6);

        let sf = 2532.0 / 2868.0;
        let bezel = 819.0 * 0.03;
        let expected_y = 2532.0 - 32.0 * sf - 1772.4 - bezel;
        assert!((rect.y - expected_y).abs() < 1e-6);
        // Frame bottom rests on the outer padding.
        assert!((rect.max_y() + bezel - (2532.0 - 32.0 * sf)).abs() < 1e-6);
    }

    #[test]
    fn test_text_bottom_anchors_to_top() {
        let rect = screenshot_area_rect(&screen(LayoutPreset::TextBottom), &iphone_61(), None);
        let sf = 2532.0 / 2868.0;
        assert!((rect.y - (32.0 * sf + 819.0 * 0.03)).abs() < 1e-6);
    }

    #[test]
    fn test_centered_presets() {
        for preset in [LayoutPreset::TextOverlay, LayoutPreset::ScreenshotOnly] {
            let rect = screenshot_area_rect(&screen(preset), &iphone_61(), None);
            assert!((rect.mid_y() - 2532.0 / 2.0).abs() < 1e-6);
            assert!((rect.mid_x() - 1170.0 / 2.0).abs() < 1e-6);
        }
    }

    #[test]
    fn test_text_only_is_empty() {
        let rect = screenshot_area_rect(&screen(LayoutPreset::TextOnly), &iphone_61(), None);
        assert_eq!(rect, LayoutRect::ZERO);
        assert!(rect.is_empty());
    }

    #[test]
    fn test_wide_video_in_portrait_box_is_width_constrained() {
        // 1920/1080 ≈ 1.78 exceeds the box aspect ≈ 0.46.
        let fitted = frame_fitting_size(Some(Size::new(1920.0, 1080.0)), 819.0, 1772.4, true);
        assert_eq!(fitted.width, 819.0);
        assert!((fitted.height - 819.0 * 1080.0 / 1920.0).abs() < EPS);
        assert!(fitted.height < 1772.4);
    }

    #[test]
    fn test_narrow_content_is_height_constrained() {
        let fitted = frame_fitting_size(Some(Size::new(600.0, 2000.0)), 819.0, 1772.4, true);
        assert_eq!(fitted.height, 1772.4);
        assert!((fitted.width - 1772.4 * 0.3).abs() < 1e-9);
        assert!(fitted.width < 819.0);
    }

    #[test]
    fn test_fit_disabled_or_unknown_native_keeps_box() {
        let fitted = frame_fitting_size(Some(Size::new(1920.0, 1080.0)), 819.0, 1772.4, false);
        assert_eq!(fitted, Size::new(819.0, 1772.4));
        let fitted = frame_fitting_size(None, 819.0, 1772.4, true);
        assert_eq!(fitted, Size::new(819.0, 1772.4));
        let fitted = frame_fitting_size(Some(Size::new(0.0, 1080.0)), 819.0, 1772.4, true);
        assert_eq!(fitted, Size::new(819.0, 1772.4));
    }

    #[test]
    fn test_corner_radius_with_and_without_frame() {
        let s = screen(LayoutPreset::TextTop);
        let radius = screenshot_corner_radius(&s, &iphone_61(), None);
        assert!((radius - (819.0 * 0.08 - 819.0 * 0.03)).abs() < 1e-9);

        let mut frameless = s.clone();
        frameless.show_device_frame = false;
        assert_eq!(
            screenshot_corner_radius(&frameless, &iphone_61(), None),
            DEFAULT_CORNER_RADIUS
        );

        let watch = DeviceSize::sizes_for(DeviceCategory::AppleWatch)[0].clone();
        assert_eq!(screenshot_corner_radius(&s, &watch, None), DEFAULT_CORNER_RADIUS);
    }

    #[test]
    fn test_frame_config_bezel_multiplier_moves_rect() {
        let mut s = screen(LayoutPreset::TextBottom);
        let base = screenshot_area_rect(&s, &iphone_61(), None);
        s.device_frame_config.bezel_width_ratio = 2.0;
        let wide = screenshot_area_rect(&s, &iphone_61(), None);
        assert!((wide.y - base.y - 819.0 * 0.03).abs() < 1e-6);
        assert_eq!(wide.width, base.width);
    }

    #[test]
    fn test_custom_device_uses_unit_scale() {
        let device = DeviceSize::custom("Banner", 1000, 2000);
        let layout = ScreenLayout::compute(&screen(LayoutPreset::TextBottom), &device, None);
        assert_eq!(layout.scale_factor, 1.0);
        assert_eq!(layout.outer_padding, 32.0);
        assert_eq!(layout.bezel, 0.0);
        assert!(layout.frame.is_none());
    }

    #[test]
    fn test_buffer_space_conversion() {
        let rect = LayoutRect::new(10.0, 20.0, 100.0, 50.0);
        assert_eq!(to_buffer_space(rect, 500.0, BufferOrigin::TopLeft), rect);
        let flipped = to_buffer_space(rect, 500.0, BufferOrigin::BottomLeft);
        assert_eq!(flipped.y, 430.0);
        assert_eq!(
            to_buffer_space(flipped, 500.0, BufferOrigin::BottomLeft),
            rect
        );
    }

    #[test]
    fn test_scaling_helpers() {
        assert_eq!(scaled_font_size(10.0, 0.5), MINIMUM_FONT_SIZE);
        assert_eq!(scaled_font_size(96.0, 0.5), 48.0);
        assert_eq!(scaled_padding(32.0, 0.5), 16.0);
        assert_eq!(scaled_corner_radius(16.0, 2.0), 32.0);
    }

    fn any_preset() -> impl Strategy<Value = LayoutPreset> {
        prop_oneof![
            Just(LayoutPreset::TextTop),
            Just(LayoutPreset::TextBottom),
            Just(LayoutPreset::TextOverlay),
            Just(LayoutPreset::ScreenshotOnly),
        ]
    }

    /// Catalogue devices whose category draws a bezel.
    fn framed_devices() -> Vec<DeviceSize> {
        DeviceSize::all()
            .into_iter()
            .filter(|d| d.category.frame_spec().is_some())
            .collect()
    }

    proptest! {
        #[test]
        fn prop_unfitted_rect_has_box_dimensions(
            device in prop::sample::select(framed_devices()),
            preset in any_preset(),
            framed in any::<bool>(),
            bezel_multiplier in 0.5f64..3.0,
            nw in 1.0f64..4000.0,
            nh in 1.0f64..4000.0,
        ) {
            let mut s = screen(preset);
            s.show_device_frame = framed;
            s.device_frame_config.bezel_width_ratio = bezel_multiplier;
            let (w, h) = device.effective_size(s.is_landscape);
            let layout = ScreenLayout::compute(&s, &device, Some(Size::new(nw, nh)));
            let rect = layout.screenshot_rect;
            prop_assert!((rect.width - w as f64 * 0.7).abs() < 1e-6);
            prop_assert!((rect.height - h as f64 * 0.7).abs() < 1e-6);
            prop_assert_eq!(layout.frame.is_some(), framed);
            prop_assert_eq!(layout.bezel > 0.0, framed);
        }

        #[test]
        fn prop_fitting_shrinks_exactly_one_axis(
            bw in 10.0f64..4000.0,
            bh in 10.0f64..4000.0,
            nw in 1.0f64..8000.0,
            nh in 1.0f64..8000.0,
        ) {
            let fitted = frame_fitting_size(Some(Size::new(nw, nh)), bw, bh, true);
            prop_assert!(fitted.width <= bw + EPS);
            prop_assert!(fitted.height <= bh + EPS);
            let width_at_max = (fitted.width - bw).abs() < 1e-6;
            let height_at_max = (fitted.height - bh).abs() < 1e-6;
            prop_assert!(width_at_max || height_at_max);
            if nw / nh > bw / bh {
                prop_assert!(width_at_max);
            } else {
                prop_assert!(height_at_max);
            }
        }

        #[test]
        fn prop_layout_is_reproducible(
            w in 100u32..4000,
            h in 100u32..4000,
            preset in any_preset(),
            fit in any::<bool>(),
        ) {
            let device = DeviceSize::custom("c", w, h);
            let mut s = screen(preset);
            s.fit_frame_to_content = fit;
            let native = Some(Size::new(1080.0, 1920.0));
            let a = ScreenLayout::compute(&s, &device, native);
            let b = ScreenLayout::compute(&s, &device, native);
            prop_assert_eq!(a, b);
        }
    }
}
