//! Frame compositor: draws one content frame into the overlay's screenshot area.
//!
//! This is the per-frame hot path of a video export and the single content
//! path of a still export, which keeps both outputs framed identically.

use std::borrow::Cow;

use tiny_skia::{
    FillRule, FilterQuality, Mask, Pixmap, PixmapPaint, PixmapRef, Transform,
};

use shotcraft_project_model::ContentMode;

use crate::geometry::{to_buffer_space, BufferOrigin, CanvasSize, LayoutRect, Size};
use crate::pixel::{PixelBuffer, SourceTransform};
use crate::shape::rounded_rect_path;

/// Row ordering of the raster backend's buffers.
const RASTER_ORIGIN: BufferOrigin = BufferOrigin::TopLeft;

/// Where and how content is drawn on the canvas.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    /// Screenshot area in top-left canvas coordinates.
    pub rect: LayoutRect,
    pub corner_radius: f64,
    pub content_mode: ContentMode,
}

/// Per-frame failure. The caller drops the frame and carries on.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CompositeError {
    #[error("failed to allocate a {width}x{height} buffer")]
    Allocation { width: u32, height: u32 },

    #[error("source frame is empty after orientation")]
    EmptyFrame,
}

/// Rectangle covered by `content` when mapped into `target`.
///
/// Fit scales by the smaller axis ratio (letterbox), fill by the larger (crop).
/// The result is centered on `target`.
pub fn content_draw_rect(content: Size, target: LayoutRect, mode: ContentMode) -> LayoutRect {
    let sx = target.width / content.width;
    let sy = target.height / content.height;
    let scale = match mode {
        ContentMode::Fit => sx.min(sy),
        ContentMode::Fill => sx.max(sy),
    };
    let width = content.width * scale;
    let height = content.height * scale;
    LayoutRect::new(
        target.mid_x() - width / 2.0,
        target.mid_y() - height / 2.0,
        width,
        height,
    )
}

/// Rounded-rect clip of a placement in raster coordinates.
///
/// It depends only on the placement and the canvas, so a video item builds
/// it once and reuses it for every frame.
#[derive(Clone)]
pub struct ContentClip {
    area: LayoutRect,
    /// `None` when the placement has no screenshot area.
    mask: Option<Mask>,
}

impl ContentClip {
    pub fn new(placement: &Placement, canvas: CanvasSize) -> Result<Self, CompositeError> {
        let area = to_buffer_space(placement.rect, canvas.height as f64, RASTER_ORIGIN);
        if placement.rect.is_empty() {
            return Ok(Self { area, mask: None });
        }

        let mut mask = Mask::new(canvas.width, canvas.height).ok_or(CompositeError::Allocation {
            width: canvas.width,
            height: canvas.height,
        })?;
        if let Some(path) = rounded_rect_path(area, placement.corner_radius) {
            mask.fill_path(&path, FillRule::Winding, true, Transform::identity());
        }
        Ok(Self {
            area,
            mask: Some(mask),
        })
    }

    pub fn is_empty(&self) -> bool {
        self.mask.is_none()
    }
}

/// Composite `frame` over `overlay` into a new canvas-sized buffer.
pub fn composite(
    frame: &PixelBuffer,
    overlay: PixmapRef<'_>,
    placement: &Placement,
    transform: SourceTransform,
    canvas: CanvasSize,
) -> Result<PixelBuffer, CompositeError> {
    let clip = ContentClip::new(placement, canvas)?;
    composite_clipped(frame, overlay, placement.content_mode, &clip, transform, canvas)
}

/// [`composite`] with a clip built ahead of time by [`ContentClip::new`].
pub fn composite_clipped(
    frame: &PixelBuffer,
    overlay: PixmapRef<'_>,
    content_mode: ContentMode,
    clip: &ContentClip,
    transform: SourceTransform,
    canvas: CanvasSize,
) -> Result<PixelBuffer, CompositeError> {
    let mut output = Pixmap::new(canvas.width, canvas.height).ok_or(CompositeError::Allocation {
        width: canvas.width,
        height: canvas.height,
    })?;

    draw_overlay(&mut output, overlay);

    let Some(mask) = clip.mask.as_ref() else {
        return Ok(PixelBuffer::from_pixmap(output));
    };

    let upright: Cow<'_, PixelBuffer> = if transform.is_identity() {
        Cow::Borrowed(frame)
    } else {
        Cow::Owned(frame.transformed(transform))
    };
    if upright.is_empty() {
        return Err(CompositeError::EmptyFrame);
    }

    let packed: Cow<'_, [u8]> = if upright.stride == upright.width as usize * 4 {
        Cow::Borrowed(&upright.data[..upright.stride * upright.height as usize])
    } else {
        Cow::Owned(upright.packed_data())
    };
    let source = PixmapRef::from_bytes(&packed, upright.width, upright.height).ok_or(
        CompositeError::Allocation {
            width: upright.width,
            height: upright.height,
        },
    )?;

    let draw = content_draw_rect(upright.size(), clip.area, content_mode);
    let to_canvas = Transform::from_row(
        (draw.width / upright.width as f64) as f32,
        0.0,
        0.0,
        (draw.height / upright.height as f64) as f32,
        draw.x as f32,
        draw.y as f32,
    );
    let paint = PixmapPaint {
        quality: FilterQuality::Bilinear,
        ..PixmapPaint::default()
    };
    output.draw_pixmap(0, 0, source, &paint, to_canvas, Some(mask));

    Ok(PixelBuffer::from_pixmap(output))
}

fn draw_overlay(output: &mut Pixmap, overlay: PixmapRef<'_>) {
    if overlay.width() == output.width() && overlay.height() == output.height() {
        output.data_mut().copy_from_slice(overlay.data());
        return;
    }
    let scale = Transform::from_scale(
        output.width() as f32 / overlay.width() as f32,
        output.height() as f32 / overlay.height() as f32,
    );
    let paint = PixmapPaint {
        quality: FilterQuality::Bilinear,
        ..PixmapPaint::default()
    };
    output.draw_pixmap(0, 0, overlay, &paint, scale, None);
}
