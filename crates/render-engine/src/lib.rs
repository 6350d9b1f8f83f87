//! Shotcraft Render Engine
//!
//! Turns a project's screens into store-ready stills and videos. Stills and
//! video frames go through the same overlay and compositor, so a poster frame
//! matches the streamed video at the same timestamp.
//!
//! # Pipeline Architecture
//!
//! ```text
//! Screen + Device ──► ScreenLayout ──► OverlayRenderer ──► overlay.png
//!                                                              │
//! source.mov ──► VideoTrackReader ──► Compositor ◄─────────────┘
//!      │                                  │
//!      │                                  ▼
//!      └──────► AudioTrackReader ──► MediaSink (H.264 + passthrough audio)
//!                                         │
//!                                         ▼
//!                               <lang>/<device>/<screen>.mp4
//! ```

pub mod backend;
pub mod compositor;
pub mod export;
#[cfg(feature = "ffmpeg")]
pub mod ffmpeg;
pub mod fonts;
pub mod geometry;
pub mod overlay;
pub mod pipeline;
pub mod pixel;
pub mod progress;
pub mod shape;

pub use backend::{MediaBackend, SourceInfo, TimeBase};
pub use compositor::{composite, composite_clipped, ContentClip, Placement};
pub use export::*;
#[cfg(feature = "ffmpeg")]
pub use ffmpeg::FfmpegBackend;
pub use fonts::FontLibrary;
pub use geometry::{CanvasSize, LayoutRect, ScreenLayout, Size};
pub use overlay::OverlayRenderer;
pub use pipeline::{run_pipeline, PipelineJob, PipelineReport, PipelineState};
pub use pixel::{PixelBuffer, Rotation, SourceTransform};
pub use progress::{CancellationFlag, ExportProgress, ProgressSnapshot};
