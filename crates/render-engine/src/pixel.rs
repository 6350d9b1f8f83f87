//! Pixel buffers and source-track orientation.

use serde::Serialize;
use tiny_skia::{IntSize, Pixmap};

use crate::geometry::Size;

const BYTES_PER_PIXEL: usize = 4;

/// Row-major RGBA8 pixels, premultiplied alpha, with an explicit stride.
#[derive(Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    pub width: u32,
    pub height: u32,
    /// Bytes between the starts of consecutive rows.
    pub stride: usize,
    pub data: Vec<u8>,
}

impl std::fmt::Debug for PixelBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PixelBuffer")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("stride", &self.stride)
            .field("bytes", &self.data.len())
            .finish()
    }
}

impl PixelBuffer {
    /// Transparent buffer with tightly packed rows.
    pub fn new(width: u32, height: u32) -> Self {
        let stride = width as usize * BYTES_PER_PIXEL;
        Self {
            width,
            height,
            stride,
            data: vec![0; stride * height as usize],
        }
    }

    /// Wrap existing premultiplied RGBA data. Returns `None` if `data` is too
    /// short for the given geometry or `stride` cannot hold a row.
    pub fn from_raw(width: u32, height: u32, stride: usize, data: Vec<u8>) -> Option<Self> {
        let row_bytes = width as usize * BYTES_PER_PIXEL;
        if stride < row_bytes {
            return None;
        }
        let needed = match height as usize {
            0 => 0,
            h => stride * (h - 1) + row_bytes,
        };
        if data.len() < needed {
            return None;
        }
        Some(Self {
            width,
            height,
            stride,
            data,
        })
    }

    /// Build from straight (non-premultiplied) tightly packed RGBA.
    pub fn from_straight_rgba(width: u32, height: u32, mut data: Vec<u8>) -> Option<Self> {
        for px in data.chunks_exact_mut(BYTES_PER_PIXEL) {
            let a = px[3] as u16;
            if a < 255 {
                for c in &mut px[..3] {
                    *c = ((*c as u16 * a + 127) / 255) as u8;
                }
            }
        }
        Self::from_raw(width, height, width as usize * BYTES_PER_PIXEL, data)
    }

    /// Solid opaque fill, mostly useful for synthetic sources.
    pub fn filled(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let mut buffer = Self::new(width, height);
        for px in buffer.data.chunks_exact_mut(BYTES_PER_PIXEL) {
            px.copy_from_slice(&rgba);
        }
        buffer
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn size(&self) -> Size {
        Size::new(self.width as f64, self.height as f64)
    }

    pub fn row(&self, y: u32) -> &[u8] {
        let start = y as usize * self.stride;
        &self.data[start..start + self.width as usize * BYTES_PER_PIXEL]
    }

    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let offset = y as usize * self.stride + x as usize * BYTES_PER_PIXEL;
        [
            self.data[offset],
            self.data[offset + 1],
            self.data[offset + 2],
            self.data[offset + 3],
        ]
    }

    /// Tightly packed copy of the pixel rows, dropping stride padding.
    pub fn packed_data(&self) -> Vec<u8> {
        let row_bytes = self.width as usize * BYTES_PER_PIXEL;
        if self.stride == row_bytes {
            return self.data[..row_bytes * self.height as usize].to_vec();
        }
        let mut out = Vec::with_capacity(row_bytes * self.height as usize);
        for y in 0..self.height {
            out.extend_from_slice(self.row(y));
        }
        out
    }

    /// Straight-alpha packed RGBA, for encoders that expect it.
    pub fn to_straight_rgba(&self) -> Vec<u8> {
        let mut data = self.packed_data();
        for px in data.chunks_exact_mut(BYTES_PER_PIXEL) {
            let a = px[3] as u16;
            if a > 0 && a < 255 {
                for c in &mut px[..3] {
                    *c = ((*c as u16 * 255 + a / 2) / a).min(255) as u8;
                }
            }
        }
        data
    }

    pub fn to_pixmap(&self) -> Option<Pixmap> {
        let size = IntSize::from_wh(self.width, self.height)?;
        Pixmap::from_vec(self.packed_data(), size)
    }

    pub fn from_pixmap(pixmap: Pixmap) -> Self {
        let (width, height) = (pixmap.width(), pixmap.height());
        Self {
            width,
            height,
            stride: width as usize * BYTES_PER_PIXEL,
            data: pixmap.take(),
        }
    }

    /// Apply a track orientation, producing an upright buffer whose origin is (0, 0).
    pub fn transformed(&self, transform: SourceTransform) -> PixelBuffer {
        if transform.is_identity() {
            return self.clone();
        }

        let (out_w, out_h) = transform.apply_to_dimensions(self.width, self.height);
        let mut out = PixelBuffer::new(out_w, out_h);
        for y in 0..self.height {
            let row = self.row(y);
            for x in 0..self.width {
                let (dx, dy) = transform.map_pixel(x, y, self.width, self.height);
                let src = x as usize * BYTES_PER_PIXEL;
                let dst = dy as usize * out.stride + dx as usize * BYTES_PER_PIXEL;
                out.data[dst..dst + BYTES_PER_PIXEL]
                    .copy_from_slice(&row[src..src + BYTES_PER_PIXEL]);
            }
        }
        out
    }
}

/// Clockwise rotation in quarter turns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum Rotation {
    #[default]
    None,
    Cw90,
    Cw180,
    Cw270,
}

/// Orientation of a source video track: an optional horizontal mirror
/// followed by a clockwise rotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub struct SourceTransform {
    pub mirrored: bool,
    pub rotation: Rotation,
}

impl SourceTransform {
    pub const IDENTITY: SourceTransform = SourceTransform {
        mirrored: false,
        rotation: Rotation::None,
    };

    pub fn rotate(rotation: Rotation) -> Self {
        Self {
            mirrored: false,
            rotation,
        }
    }

    pub fn is_identity(&self) -> bool {
        *self == Self::IDENTITY
    }

    /// Decode a container display matrix (3x3, 16.16 fixed point for the
    /// rotation/scale part). Angles snap to the nearest quarter turn.
    pub fn from_display_matrix(matrix: &[i32; 9]) -> Self {
        let fixed = |v: i32| v as f64 / 65536.0;
        let (a, b, c, d) = (
            fixed(matrix[0]),
            fixed(matrix[1]),
            fixed(matrix[3]),
            fixed(matrix[4]),
        );
        let scale0 = a.hypot(c);
        let scale1 = b.hypot(d);
        if scale0 == 0.0 || scale1 == 0.0 {
            return Self::IDENTITY;
        }

        let mirrored = a * d - b * c < 0.0;
        // A mirrored matrix carries a sign flip on the first column.
        let a = if mirrored { -a } else { a };
        let degrees = (b / scale1).atan2(a / scale0).to_degrees();
        let quarter_turns = ((degrees / 90.0).round() as i64).rem_euclid(4);
        let rotation = match quarter_turns {
            1 => Rotation::Cw90,
            2 => Rotation::Cw180,
            3 => Rotation::Cw270,
            _ => Rotation::None,
        };
        Self { mirrored, rotation }
    }

    pub fn swaps_axes(&self) -> bool {
        matches!(self.rotation, Rotation::Cw90 | Rotation::Cw270)
    }

    pub fn apply_to_dimensions(&self, width: u32, height: u32) -> (u32, u32) {
        if self.swaps_axes() {
            (height, width)
        } else {
            (width, height)
        }
    }

    /// Display size of a track with coded size `coded`.
    pub fn display_size(&self, coded: Size) -> Size {
        if self.swaps_axes() {
            Size::new(coded.height, coded.width)
        } else {
            coded
        }
    }

    /// Destination of source pixel `(x, y)` in a `width × height` frame.
    fn map_pixel(&self, x: u32, y: u32, width: u32, height: u32) -> (u32, u32) {
        let x = if self.mirrored { width - 1 - x } else { x };
        match self.rotation {
            Rotation::None => (x, y),
            Rotation::Cw90 => (height - 1 - y, x),
            Rotation::Cw180 => (width - 1 - x, height - 1 - y),
            Rotation::Cw270 => (y, width - 1 - x),
        }
    }
}
