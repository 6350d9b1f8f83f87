//! Media backend seam.
//!
//! The pipeline only talks to these traits. The FFmpeg implementation lives in
//! [`crate::ffmpeg`]; tests drive the pipeline with an in-memory backend.

use std::path::Path;

use serde::Serialize;

use shotcraft_common::ShotcraftResult;

use crate::geometry::{CanvasSize, Size};
use crate::pixel::{PixelBuffer, SourceTransform};

/// Rational time base of a track (seconds per tick = num / den).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimeBase {
    pub num: i32,
    pub den: i32,
}

impl TimeBase {
    pub const fn new(num: i32, den: i32) -> Self {
        Self { num, den }
    }

    pub fn to_secs(self, ticks: i64) -> f64 {
        if self.den == 0 {
            return 0.0;
        }
        ticks as f64 * self.num as f64 / self.den as f64
    }

    pub fn from_secs(self, secs: f64) -> i64 {
        if self.num == 0 {
            return 0;
        }
        (secs * self.den as f64 / self.num as f64).round() as i64
    }
}

/// Track facts read once when a source is opened.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceInfo {
    /// Decoded frame size before orientation.
    pub coded_width: u32,
    pub coded_height: u32,
    pub transform: SourceTransform,
    /// Nominal frames per second.
    pub frame_rate: f64,
    pub duration_secs: f64,
    pub time_base: TimeBase,
    pub has_audio: bool,
}

impl SourceInfo {
    /// Size as displayed, after the track transform.
    pub fn display_size(&self) -> Size {
        self.transform
            .display_size(Size::new(self.coded_width as f64, self.coded_height as f64))
    }

    /// Frame count used for progress reporting only.
    pub fn estimated_frames(&self) -> u64 {
        let estimate = (self.frame_rate * self.duration_secs).round();
        if estimate.is_finite() && estimate >= 1.0 {
            estimate as u64
        } else {
            1
        }
    }
}

/// A decoded frame with its source presentation timestamp (in track time base).
#[derive(Debug, Clone)]
pub struct VideoSample {
    pub pts: i64,
    pub frame: PixelBuffer,
}

/// Parameters the sink is created with.
#[derive(Debug, Clone, PartialEq)]
pub struct SinkSpec {
    pub canvas: CanvasSize,
    pub time_base: TimeBase,
    pub frame_rate: f64,
    pub with_audio: bool,
    pub crf: u8,
    pub preset: String,
}

/// Pull side of the video track. Frames come out in presentation order.
pub trait VideoTrackReader: Send {
    /// `Ok(None)` once the track is exhausted.
    fn next_frame(&mut self) -> ShotcraftResult<Option<VideoSample>>;
}

/// Pull side of the audio track. Packets stay compressed.
pub trait AudioTrackReader<P>: Send {
    fn next_packet(&mut self) -> ShotcraftResult<Option<P>>;
}

/// Encoder plus muxer for one output file.
pub trait MediaSink<P>: Send {
    /// Encode one composited canvas frame at the given source PTS.
    fn write_video(&mut self, sample: VideoSample) -> ShotcraftResult<()>;

    /// Mux one passthrough audio packet.
    fn write_audio(&mut self, packet: P) -> ShotcraftResult<()>;

    /// Flush the video encoder; no more video follows.
    fn finish_video(&mut self) -> ShotcraftResult<()>;

    /// Write the container trailer and close the file.
    fn finalize(self: Box<Self>) -> ShotcraftResult<()>;

    /// Drop the output without finalizing.
    fn abandon(self: Box<Self>);
}

/// An opened source: track info plus independent readers.
pub struct OpenedSource<P> {
    pub info: SourceInfo,
    pub video: Box<dyn VideoTrackReader>,
    pub audio: Option<Box<dyn AudioTrackReader<P>>>,
}

/// Decoding, encoding and muxing services the export needs.
pub trait MediaBackend: Send + Sync + 'static {
    /// Compressed audio packet forwarded from reader to sink.
    type AudioPacket: Send + 'static;

    /// Backend name for logs.
    fn name(&self) -> &str;

    /// Open a source. Fails with `NoVideoTrack` if it has no video.
    fn open(&self, source: &Path) -> ShotcraftResult<OpenedSource<Self::AudioPacket>>;

    /// Create a sink writing to `destination`. `source` supplies the audio
    /// stream parameters when `spec.with_audio` is set.
    fn create_sink(
        &self,
        destination: &Path,
        source: &Path,
        spec: &SinkSpec,
    ) -> ShotcraftResult<Box<dyn MediaSink<Self::AudioPacket>>>;

    /// Decode the frame displayed at `seconds`, or the last decodable frame
    /// when `seconds` is past the end.
    fn decode_frame_at(
        &self,
        source: &Path,
        seconds: f64,
    ) -> ShotcraftResult<(PixelBuffer, SourceInfo)>;

    /// Read track info without decoding.
    fn probe(&self, source: &Path) -> ShotcraftResult<SourceInfo>;
}
