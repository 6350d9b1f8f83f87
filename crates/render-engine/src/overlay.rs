//! Overlay renderer.
//!
//! Draws everything that does not change from frame to frame: background,
//! captions and device-frame chrome. The screen area is left as a white
//! placeholder for the compositor to cover with content.

use std::path::Path;
use std::sync::Arc;

use fontdue::layout::{
    CoordinateSystem, HorizontalAlign, Layout, LayoutSettings, TextStyle as GlyphRun, WrapStyle,
};
use fontdue::Font;
use tiny_skia::{
    FillRule, FilterQuality, GradientStop, LinearGradient, Paint, Pixmap, PixmapPaint, Point,
    Rect, Shader, SpreadMode, Transform,
};

use shotcraft_common::{ShotcraftError, ShotcraftResult};
use shotcraft_project_model::{
    BackgroundStyle, DeviceSize, HexColor, LayoutPreset, Rgba, Screen, TextAlignment, TextStyle,
};

use crate::compositor::content_draw_rect;
use crate::fonts::{FontBook, FontLibrary};
use crate::geometry::{
    scaled_corner_radius, scaled_font_size, scaled_padding, LayoutRect, ScreenLayout,
};
use crate::pixel::PixelBuffer;
use crate::shape::{capsule_path, rounded_rect_path, to_skia_color, to_skia_rect};

const SUBTITLE_SCALE: f64 = 0.6;
const SUBTITLE_OPACITY: f32 = 0.8;
const CAPTION_LINE_GAP: f64 = 12.0;
const TEXT_ONLY_PADDING: f64 = 48.0;
/// Inner padding of the caption plate and its inset from the canvas edge.
const PLATE_PADDING: f64 = 16.0;
const PLATE_CORNER_RADIUS: f64 = 16.0;
const PLATE_OPACITY: f32 = 0.5;

const ISLAND_WIDTH: f64 = 0.25;
const ISLAND_HEIGHT: f64 = 0.03;
const ISLAND_TOP_OFFSET: f64 = 0.015;
const HOME_INDICATOR_WIDTH: f64 = 0.3;
const HOME_INDICATOR_HEIGHT: f64 = 0.005;
const HOME_INDICATOR_BOTTOM_OFFSET: f64 = 0.01;
const HOME_INDICATOR_OPACITY: f32 = 0.3;

/// Renders per-item overlays. Cheap to share across a batch.
#[derive(Clone)]
pub struct OverlayRenderer {
    fonts: Arc<FontLibrary>,
}

impl OverlayRenderer {
    pub fn new(fonts: Arc<FontLibrary>) -> Self {
        Self { fonts }
    }

    /// Render the overlay for one job item into a canvas-sized pixmap.
    pub fn render(
        &self,
        screen: &Screen,
        device: &DeviceSize,
        language: &str,
        layout: &ScreenLayout,
    ) -> ShotcraftResult<Pixmap> {
        let canvas = layout.canvas;
        let mut pixmap = Pixmap::new(canvas.width, canvas.height).ok_or_else(|| {
            ShotcraftError::render(format!(
                "cannot allocate a {}x{} overlay",
                canvas.width, canvas.height
            ))
        })?;

        draw_background(&mut pixmap, &screen.background);

        if layout.preset_has_screenshot {
            draw_device_chrome(&mut pixmap, layout);
        }

        if screen.layout_preset.has_text() {
            let book = self.fonts.book(&screen.font_family);
            draw_captions(&mut pixmap, &book, screen, device, language, layout);
        }

        tracing::debug!(
            screen = %screen.name,
            device = %device.name,
            language,
            width = canvas.width,
            height = canvas.height,
            "Rendered overlay"
        );
        Ok(pixmap)
    }

    /// Render and encode the overlay as PNG.
    pub fn render_png(
        &self,
        screen: &Screen,
        device: &DeviceSize,
        language: &str,
        layout: &ScreenLayout,
    ) -> ShotcraftResult<Vec<u8>> {
        let pixmap = self.render(screen, device, language, layout)?;
        pixmap
            .encode_png()
            .map_err(|e| ShotcraftError::render(format!("overlay PNG encode failed: {e}")))
    }
}

/// Decode an encoded overlay back into a pixmap.
pub fn decode_overlay(png: &[u8]) -> ShotcraftResult<Pixmap> {
    Pixmap::decode_png(png)
        .map_err(|e| ShotcraftError::render(format!("overlay PNG decode failed: {e}")))
}

fn fill_paint(color: Rgba) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color(to_skia_color(color));
    paint.anti_alias = true;
    paint
}

fn canvas_rect(pixmap: &Pixmap) -> Option<Rect> {
    Rect::from_xywh(0.0, 0.0, pixmap.width() as f32, pixmap.height() as f32)
}

// ---------------------------------------------------------------------------
// Background
// ---------------------------------------------------------------------------

fn draw_background(pixmap: &mut Pixmap, background: &BackgroundStyle) {
    let Some(full) = canvas_rect(pixmap) else {
        return;
    };
    match background {
        BackgroundStyle::SolidColor { color } => {
            pixmap.fill_rect(full, &fill_paint(color.to_rgba()), Transform::identity(), None);
        }
        BackgroundStyle::Gradient { start, end } => {
            let shader = LinearGradient::new(
                Point::from_xy(0.0, 0.0),
                Point::from_xy(0.0, full.height()),
                vec![
                    GradientStop::new(0.0, to_skia_color(start.to_rgba())),
                    GradientStop::new(1.0, to_skia_color(end.to_rgba())),
                ],
                SpreadMode::Pad,
                Transform::identity(),
            );
            let paint = match shader {
                Some(shader) => Paint {
                    shader,
                    ..Paint::default()
                },
                // Degenerate gradient (zero height): fall back to the start color.
                None => fill_paint(start.to_rgba()),
            };
            pixmap.fill_rect(full, &paint, Transform::identity(), None);
        }
        BackgroundStyle::Image { path } => match load_image(path) {
            Ok(image) => draw_image_fill(pixmap, &image),
            Err(e) => {
                tracing::warn!(path = %path.display(), "Background image unavailable: {e}");
                let grey = Rgba::from_white(0.5).with_opacity(0.3);
                pixmap.fill_rect(full, &fill_paint(grey), Transform::identity(), None);
            }
        },
    }
}

/// Load a still image (PNG or JPEG) into a premultiplied pixmap.
pub(crate) fn load_image(path: &Path) -> ShotcraftResult<Pixmap> {
    let decoded = image::open(path)
        .map_err(|e| ShotcraftError::asset_access(format!("{}: {e}", path.display())))?
        .to_rgba8();
    let (width, height) = decoded.dimensions();
    PixelBuffer::from_straight_rgba(width, height, decoded.into_raw())
        .and_then(|buffer| buffer.to_pixmap())
        .ok_or_else(|| ShotcraftError::asset_access(format!("{}: empty image", path.display())))
}

/// Scale to fill the canvas and centre-crop.
fn draw_image_fill(pixmap: &mut Pixmap, image: &Pixmap) {
    let target = LayoutRect::new(0.0, 0.0, pixmap.width() as f64, pixmap.height() as f64);
    let size = crate::geometry::Size::new(image.width() as f64, image.height() as f64);
    let draw = content_draw_rect(size, target, shotcraft_project_model::ContentMode::Fill);
    let transform = Transform::from_row(
        (draw.width / size.width) as f32,
        0.0,
        0.0,
        (draw.height / size.height) as f32,
        draw.x as f32,
        draw.y as f32,
    );
    let paint = PixmapPaint {
        quality: FilterQuality::Bilinear,
        ..PixmapPaint::default()
    };
    pixmap.draw_pixmap(0, 0, image.as_ref(), &paint, transform, None);
}

// ---------------------------------------------------------------------------
// Device chrome
// ---------------------------------------------------------------------------

fn draw_device_chrome(pixmap: &mut Pixmap, layout: &ScreenLayout) {
    let screen_rect = layout.screenshot_rect;
    if screen_rect.is_empty() {
        return;
    }

    let Some(spec) = layout.frame else {
        fill_path(pixmap, rounded_rect_path(screen_rect, layout.corner_radius), Rgba::WHITE);
        return;
    };

    let w = screen_rect.width;
    let bezel = layout.bezel;
    let frame = layout.frame_rect();

    fill_path(
        pixmap,
        rounded_rect_path(frame, w * spec.corner_radius_ratio),
        spec.frame_color,
    );
    fill_path(pixmap, rounded_rect_path(screen_rect, layout.corner_radius), Rgba::WHITE);

    if spec.has_notch {
        let island_w = w * ISLAND_WIDTH * spec.notch_width_ratio;
        let island_h = w * ISLAND_HEIGHT * spec.notch_height_ratio;
        let island = LayoutRect::new(
            frame.mid_x() - island_w / 2.0,
            frame.y + bezel + w * ISLAND_TOP_OFFSET,
            island_w,
            island_h,
        );
        fill_path(pixmap, capsule_path(island), Rgba::BLACK);
    }

    if spec.has_home_indicator {
        let bar_w = w * HOME_INDICATOR_WIDTH;
        let bar_h = w * HOME_INDICATOR_HEIGHT;
        let bar = LayoutRect::new(
            frame.mid_x() - bar_w / 2.0,
            frame.max_y() - bezel - w * HOME_INDICATOR_BOTTOM_OFFSET - bar_h,
            bar_w,
            bar_h,
        );
        fill_path(
            pixmap,
            capsule_path(bar),
            Rgba::WHITE.with_opacity(HOME_INDICATOR_OPACITY),
        );
    }
}

fn fill_path(pixmap: &mut Pixmap, path: Option<tiny_skia::Path>, color: Rgba) {
    if let Some(path) = path {
        pixmap.fill_path(
            &path,
            &fill_paint(color),
            FillRule::Winding,
            Transform::identity(),
            None,
        );
    }
}

// ---------------------------------------------------------------------------
// Captions
// ---------------------------------------------------------------------------

struct CaptionLine<'a> {
    font: &'a Font,
    layout: Layout,
    color: Rgba,
}

/// Title and subtitle laid out at the origin; positioned when drawn.
struct CaptionBlock<'a> {
    lines: Vec<CaptionLine<'a>>,
    gap: f32,
}

impl<'a> CaptionBlock<'a> {
    fn height(&self) -> f32 {
        let text: f32 = self.lines.iter().map(|line| line.layout.height()).sum();
        let gaps = self.lines.len().saturating_sub(1) as f32 * self.gap;
        text + gaps
    }

    fn draw(&self, pixmap: &mut Pixmap, left: f32, top: f32) {
        let mut y = top;
        for line in &self.lines {
            for glyph in line.layout.glyphs() {
                if glyph.width == 0 || glyph.height == 0 {
                    continue;
                }
                let (metrics, coverage) = line.font.rasterize_config(glyph.key);
                blend_coverage(
                    pixmap,
                    (left + glyph.x).round() as i32,
                    (y + glyph.y).round() as i32,
                    metrics.width,
                    metrics.height,
                    &coverage,
                    line.color,
                );
            }
            y += line.layout.height() + self.gap;
        }
    }
}

fn horizontal_align(alignment: TextAlignment) -> HorizontalAlign {
    match alignment {
        TextAlignment::Leading => HorizontalAlign::Left,
        TextAlignment::Center => HorizontalAlign::Center,
        TextAlignment::Trailing => HorizontalAlign::Right,
    }
}

fn layout_line<'a>(
    book: &'a FontBook,
    text: &str,
    style: TextStyle,
    px: f64,
    max_width: f32,
    color: Rgba,
) -> Option<CaptionLine<'a>> {
    if text.is_empty() {
        return None;
    }
    let font = book.face(style.bold, style.italic)?;
    let mut layout = Layout::new(CoordinateSystem::PositiveYDown);
    layout.reset(&LayoutSettings {
        max_width: Some(max_width.max(1.0)),
        horizontal_align: horizontal_align(style.alignment),
        wrap_style: WrapStyle::Word,
        ..LayoutSettings::default()
    });
    layout.append(&[font], &GlyphRun::new(text, px as f32, 0));
    Some(CaptionLine {
        font,
        layout,
        color,
    })
}

fn draw_captions(
    pixmap: &mut Pixmap,
    book: &FontBook,
    screen: &Screen,
    device: &DeviceSize,
    language: &str,
    layout: &ScreenLayout,
) {
    let text = screen.text_for(language);
    if text.is_empty() {
        return;
    }
    if book.is_empty() {
        tracing::warn!(screen = %screen.name, "Skipping captions: no font available");
        return;
    }

    let sf = layout.scale_factor;
    let canvas_w = layout.canvas.width as f64;
    let canvas_h = layout.canvas.height as f64;
    let preset = screen.layout_preset;

    let side_padding = match preset {
        LayoutPreset::TextOnly => scaled_padding(TEXT_ONLY_PADDING, sf),
        LayoutPreset::TextOverlay => PLATE_PADDING * 2.0,
        _ => layout.outer_padding,
    };
    let text_width = (canvas_w - side_padding * 2.0).max(1.0) as f32;

    let base_size = screen.font_size_for(device.category);
    let color = HexColor::new(screen.text_color_hex.clone()).to_rgba();
    let lines: Vec<CaptionLine<'_>> = [
        layout_line(
            book,
            &text.title,
            screen.title_style,
            scaled_font_size(base_size, sf),
            text_width,
            color,
        ),
        layout_line(
            book,
            &text.subtitle,
            screen.subtitle_style,
            scaled_font_size(base_size * SUBTITLE_SCALE, sf),
            text_width,
            color.with_opacity(SUBTITLE_OPACITY),
        ),
    ]
    .into_iter()
    .flatten()
    .collect();

    let block = CaptionBlock {
        lines,
        gap: scaled_padding(CAPTION_LINE_GAP, sf) as f32,
    };
    let height = block.height() as f64;
    let spacing = screen.text_to_image_spacing * sf;

    let top = match preset {
        LayoutPreset::TextTop => layout.frame_rect().y - spacing - height,
        LayoutPreset::TextBottom => layout.frame_rect().max_y() + spacing,
        LayoutPreset::TextOnly => (canvas_h - height) / 2.0,
        LayoutPreset::TextOverlay => {
            let plate = LayoutRect::new(
                PLATE_PADDING,
                canvas_h - PLATE_PADDING - height - PLATE_PADDING * 2.0,
                canvas_w - PLATE_PADDING * 2.0,
                height + PLATE_PADDING * 2.0,
            );
            fill_path(
                pixmap,
                rounded_rect_path(plate, scaled_corner_radius(PLATE_CORNER_RADIUS, sf)),
                Rgba::BLACK.with_opacity(PLATE_OPACITY),
            );
            plate.y + PLATE_PADDING
        }
        LayoutPreset::ScreenshotOnly => return,
    };

    block.draw(pixmap, side_padding as f32, top as f32);
}

/// Source-over blend of a glyph coverage mask in `color` into premultiplied pixels.
fn blend_coverage(
    pixmap: &mut Pixmap,
    x0: i32,
    y0: i32,
    width: usize,
    height: usize,
    coverage: &[u8],
    color: Rgba,
) {
    let (pw, ph) = (pixmap.width() as i32, pixmap.height() as i32);
    let data = pixmap.data_mut();
    let rgb = [color.r, color.g, color.b].map(|c| c.clamp(0.0, 1.0));

    for gy in 0..height {
        let py = y0 + gy as i32;
        if py < 0 || py >= ph {
            continue;
        }
        for gx in 0..width {
            let px = x0 + gx as i32;
            if px < 0 || px >= pw {
                continue;
            }
            let cov = coverage[gy * width + gx];
            if cov == 0 {
                continue;
            }
            let alpha = color.a.clamp(0.0, 1.0) * cov as f32 / 255.0;
            let inv = 1.0 - alpha;
            let idx = (py as usize * pw as usize + px as usize) * 4;
            for (channel, value) in rgb.iter().enumerate() {
                let dst = data[idx + channel] as f32;
                data[idx + channel] = (value * alpha * 255.0 + dst * inv).round().min(255.0) as u8;
            }
            let dst_a = data[idx + 3] as f32;
            data[idx + 3] = (alpha * 255.0 + dst_a * inv).round().min(255.0) as u8;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shotcraft_project_model::{DeviceFrameConfig, LocalizedText};

    fn renderer() -> OverlayRenderer {
        OverlayRenderer::new(Arc::new(FontLibrary::empty()))
    }

    fn iphone() -> DeviceSize {
        DeviceSize::find("iPhone 6.1\"").unwrap()
    }

    fn solid_screen(preset: LayoutPreset) -> Screen {
        Screen {
            layout_preset: preset,
            background: BackgroundStyle::SolidColor {
                color: HexColor::new("#FF0000"),
            },
            ..Screen::new("Home")
        }
    }

    fn pixel(pixmap: &Pixmap, x: f64, y: f64) -> [u8; 4] {
        let c = pixmap
            .pixel(x as u32, y as u32)
            .unwrap()
            .demultiply();
        [c.red(), c.green(), c.blue(), c.alpha()]
    }

    #[test]
    fn test_overlay_has_canvas_size() {
        let screen = solid_screen(LayoutPreset::TextTop);
        let device = iphone();
        let layout = ScreenLayout::compute(&screen, &device, None);
        let pixmap = renderer().render(&screen, &device, "en", &layout).unwrap();
        assert_eq!((pixmap.width(), pixmap.height()), (1170, 2532));
    }

    #[test]
    fn test_solid_background_and_frame_chrome() {
        let screen = solid_screen(LayoutPreset::TextTop);
        let device = iphone();
        let layout = ScreenLayout::compute(&screen, &device, None);
        let pixmap = renderer().render(&screen, &device, "en", &layout).unwrap();

        assert_eq!(pixel(&pixmap, 5.0, 5.0), [255, 0, 0, 255]);

        let rect = layout.screenshot_rect;
        // Placeholder between island and home indicator.
        assert_eq!(pixel(&pixmap, rect.mid_x(), rect.mid_y()), [255, 255, 255, 255]);

        // Bezel is the dark frame color.
        let frame = layout.frame_rect();
        let bezel_px = pixel(&pixmap, frame.x + layout.bezel / 2.0, rect.mid_y());
        assert_eq!(bezel_px, [31, 31, 31, 255]);

        // Island is black.
        let island_y = frame.y + layout.bezel + rect.width * (ISLAND_TOP_OFFSET + 0.015);
        assert_eq!(pixel(&pixmap, rect.mid_x(), island_y), [0, 0, 0, 255]);
    }

    #[test]
    fn test_island_hidden_by_config() {
        let mut screen = solid_screen(LayoutPreset::ScreenshotOnly);
        screen.device_frame_config = DeviceFrameConfig {
            show_dynamic_island: false,
            ..DeviceFrameConfig::default()
        };
        let device = iphone();
        let layout = ScreenLayout::compute(&screen, &device, None);
        let pixmap = renderer().render(&screen, &device, "en", &layout).unwrap();

        let rect = layout.screenshot_rect;
        let island_y = layout.frame_rect().y + layout.bezel + rect.width * 0.03;
        assert_eq!(pixel(&pixmap, rect.mid_x(), island_y), [255, 255, 255, 255]);
    }

    #[test]
    fn test_frameless_placeholder() {
        let mut screen = solid_screen(LayoutPreset::ScreenshotOnly);
        screen.show_device_frame = false;
        let device = iphone();
        let layout = ScreenLayout::compute(&screen, &device, None);
        let pixmap = renderer().render(&screen, &device, "en", &layout).unwrap();

        let rect = layout.screenshot_rect;
        assert_eq!(pixel(&pixmap, rect.x + 1.0, rect.mid_y()), [255, 255, 255, 255]);
        assert_eq!(pixel(&pixmap, rect.x - 2.0, rect.mid_y()), [255, 0, 0, 255]);
        // Corner is rounded off.
        assert_eq!(pixel(&pixmap, rect.x + 0.5, rect.y + 0.5), [255, 0, 0, 255]);
    }

    #[test]
    fn test_gradient_runs_top_to_bottom() {
        let screen = Screen {
            layout_preset: LayoutPreset::TextOnly,
            background: BackgroundStyle::Gradient {
                start: HexColor::new("#000000"),
                end: HexColor::new("#FFFFFF"),
            },
            ..Screen::new("g")
        };
        let device = iphone();
        let layout = ScreenLayout::compute(&screen, &device, None);
        let pixmap = renderer().render(&screen, &device, "en", &layout).unwrap();

        let top = pixel(&pixmap, 10.0, 1.0)[0];
        let bottom = pixel(&pixmap, 10.0, 2530.0)[0];
        assert!(top < 8, "top = {top}");
        assert!(bottom > 247, "bottom = {bottom}");
    }

    #[test]
    fn test_missing_background_image_falls_back_to_grey() {
        let screen = Screen {
            layout_preset: LayoutPreset::TextOnly,
            background: BackgroundStyle::Image {
                path: "/nonexistent/background.png".into(),
            },
            ..Screen::new("b")
        };
        let device = iphone();
        let layout = ScreenLayout::compute(&screen, &device, None);
        let pixmap = renderer().render(&screen, &device, "en", &layout).unwrap();
        let alpha = pixmap.pixel(0, 0).unwrap().alpha();
        assert!((75..=78).contains(&alpha), "alpha = {alpha}");
    }

    #[test]
    fn test_missing_fonts_do_not_fail_render() {
        let mut screen = solid_screen(LayoutPreset::TextOverlay);
        screen.set_text("en", LocalizedText::new("Title", "Subtitle"));
        let device = iphone();
        let layout = ScreenLayout::compute(&screen, &device, None);
        assert!(renderer().render(&screen, &device, "en", &layout).is_ok());
    }

    #[test]
    fn test_png_round_trip_preserves_opaque_pixels() {
        let screen = solid_screen(LayoutPreset::TextBottom);
        let device = iphone();
        let layout = ScreenLayout::compute(&screen, &device, None);
        let r = renderer();
        let pixmap = r.render(&screen, &device, "en", &layout).unwrap();
        let png = r.render_png(&screen, &device, "en", &layout).unwrap();
        let decoded = decode_overlay(&png).unwrap();
        assert_eq!(decoded.width(), pixmap.width());
        assert_eq!(decoded.pixel(5, 5), pixmap.pixel(5, 5));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(decode_overlay(b"not a png").is_err());
    }

    #[test]
    fn test_blend_coverage_full_and_clipped() {
        let mut pixmap = Pixmap::new(4, 4).unwrap();
        pixmap.fill(tiny_skia::Color::BLACK);
        let coverage = [255u8; 4];
        blend_coverage(&mut pixmap, 3, 3, 2, 2, &coverage, Rgba::WHITE);
        let c = pixmap.pixel(3, 3).unwrap();
        assert_eq!((c.red(), c.alpha()), (255, 255));
        assert_eq!(pixmap.pixel(2, 2).unwrap().red(), 0);
    }
}
