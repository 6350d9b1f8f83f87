//! In-memory media backend for pipeline and export tests.
//!
//! A "video" is a JSON file describing its frames. Sinks record what they
//! receive and write the record as JSON on finalize.

#![allow(dead_code)]

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use shotcraft_common::{ShotcraftError, ShotcraftResult};
use shotcraft_project_model::{DeviceSize, Screen};
use shotcraft_render_engine::backend::{
    AudioTrackReader, MediaBackend, MediaSink, OpenedSource, SinkSpec, SourceInfo, TimeBase,
    VideoSample, VideoTrackReader,
};
use shotcraft_render_engine::compositor::Placement;
use shotcraft_render_engine::fonts::FontLibrary;
use shotcraft_render_engine::geometry::ScreenLayout;
use shotcraft_render_engine::overlay::OverlayRenderer;
use shotcraft_render_engine::pipeline::PipelineJob;
use shotcraft_render_engine::pixel::{PixelBuffer, Rotation, SourceTransform};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClipSpec {
    pub width: u32,
    pub height: u32,
    /// Frame PTS in decode order, in units of `1 / time_base_den`.
    pub pts: Vec<i64>,
    pub time_base_den: i32,
    pub frame_rate: f64,
    pub audio_packets: u32,
    pub has_video: bool,
    /// Index of the frame whose decode fails.
    pub fail_at_frame: Option<usize>,
    /// Clockwise quarter turns from the track's display matrix.
    pub quarter_turns: u8,
}

impl Default for ClipSpec {
    fn default() -> Self {
        Self {
            width: 40,
            height: 80,
            pts: vec![0, 20, 40, 60],
            time_base_den: 600,
            frame_rate: 30.0,
            audio_packets: 0,
            has_video: true,
            fail_at_frame: None,
            quarter_turns: 0,
        }
    }
}

impl ClipSpec {
    fn time_base(&self) -> TimeBase {
        TimeBase::new(1, self.time_base_den)
    }

    fn transform(&self) -> SourceTransform {
        match self.quarter_turns % 4 {
            1 => SourceTransform::rotate(Rotation::Cw90),
            2 => SourceTransform::rotate(Rotation::Cw180),
            3 => SourceTransform::rotate(Rotation::Cw270),
            _ => SourceTransform::IDENTITY,
        }
    }

    fn info(&self) -> SourceInfo {
        let last = self.pts.iter().copied().max().unwrap_or(0);
        SourceInfo {
            coded_width: self.width,
            coded_height: self.height,
            transform: self.transform(),
            frame_rate: self.frame_rate,
            duration_secs: self.time_base().to_secs(last) + 1.0 / self.frame_rate,
            time_base: self.time_base(),
            has_audio: self.audio_packets > 0,
        }
    }

    fn frame(&self, pts: i64) -> PixelBuffer {
        PixelBuffer::filled(self.width, self.height, frame_color(pts))
    }
}

/// Distinct opaque colour per timestamp.
pub fn frame_color(pts: i64) -> [u8; 4] {
    [(pts.rem_euclid(251)) as u8, 80, 160, 255]
}

/// What a sink received, as written on finalize.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SinkRecord {
    pub width: u32,
    pub height: u32,
    pub with_audio: bool,
    pub video_pts: Vec<i64>,
    pub frame_hashes: Vec<u64>,
    pub audio: Vec<u32>,
    pub video_finished: bool,
}

impl SinkRecord {
    pub fn read(path: &Path) -> SinkRecord {
        let bytes = std::fs::read(path).unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }
}

pub fn hash_rgba(bytes: &[u8]) -> u64 {
    let mut hasher = DefaultHasher::new();
    bytes.hash(&mut hasher);
    hasher.finish()
}

fn load_clip(source: &Path) -> ShotcraftResult<ClipSpec> {
    let bytes = std::fs::read(source)
        .map_err(|e| ShotcraftError::asset_access(format!("{}: {e}", source.display())))?;
    let clip: ClipSpec = serde_json::from_slice(&bytes)?;
    if !clip.has_video {
        return Err(ShotcraftError::NoVideoTrack {
            path: source.to_path_buf(),
        });
    }
    Ok(clip)
}

struct SyntheticVideo {
    clip: ClipSpec,
    index: usize,
}

impl VideoTrackReader for SyntheticVideo {
    fn next_frame(&mut self) -> ShotcraftResult<Option<VideoSample>> {
        if self.clip.fail_at_frame == Some(self.index) {
            return Err(ShotcraftError::stream("synthetic decode failure"));
        }
        let Some(&pts) = self.clip.pts.get(self.index) else {
            return Ok(None);
        };
        self.index += 1;
        Ok(Some(VideoSample {
            pts,
            frame: self.clip.frame(pts),
        }))
    }
}

struct SyntheticAudio {
    next: u32,
    total: u32,
}

impl AudioTrackReader<u32> for SyntheticAudio {
    fn next_packet(&mut self) -> ShotcraftResult<Option<u32>> {
        if self.next >= self.total {
            return Ok(None);
        }
        self.next += 1;
        Ok(Some(self.next - 1))
    }
}

struct RecordingSink {
    path: PathBuf,
    record: SinkRecord,
}

impl MediaSink<u32> for RecordingSink {
    fn write_video(&mut self, sample: VideoSample) -> ShotcraftResult<()> {
        if sample.frame.width != self.record.width || sample.frame.height != self.record.height {
            return Err(ShotcraftError::stream("frame does not match canvas"));
        }
        self.record.video_pts.push(sample.pts);
        self.record
            .frame_hashes
            .push(hash_rgba(&sample.frame.to_straight_rgba()));
        Ok(())
    }

    fn write_audio(&mut self, packet: u32) -> ShotcraftResult<()> {
        self.record.audio.push(packet);
        Ok(())
    }

    fn finish_video(&mut self) -> ShotcraftResult<()> {
        self.record.video_finished = true;
        Ok(())
    }

    fn finalize(self: Box<Self>) -> ShotcraftResult<()> {
        std::fs::write(&self.path, serde_json::to_vec(&self.record)?)?;
        Ok(())
    }

    fn abandon(self: Box<Self>) {}
}

#[derive(Debug, Default)]
pub struct SyntheticBackend;

impl MediaBackend for SyntheticBackend {
    type AudioPacket = u32;

    fn name(&self) -> &str {
        "synthetic"
    }

    fn open(&self, source: &Path) -> ShotcraftResult<OpenedSource<u32>> {
        let clip = load_clip(source)?;
        let audio: Option<Box<dyn AudioTrackReader<u32>>> = if clip.audio_packets > 0 {
            Some(Box::new(SyntheticAudio {
                next: 0,
                total: clip.audio_packets,
            }))
        } else {
            None
        };
        Ok(OpenedSource {
            info: clip.info(),
            video: Box::new(SyntheticVideo { clip, index: 0 }),
            audio,
        })
    }

    fn create_sink(
        &self,
        destination: &Path,
        _source: &Path,
        spec: &SinkSpec,
    ) -> ShotcraftResult<Box<dyn MediaSink<u32>>> {
        // The partial file exists for the whole run, like a real muxer's.
        std::fs::write(destination, b"partial")?;
        Ok(Box::new(RecordingSink {
            path: destination.to_path_buf(),
            record: SinkRecord {
                width: spec.canvas.width,
                height: spec.canvas.height,
                with_audio: spec.with_audio,
                ..SinkRecord::default()
            },
        }))
    }

    fn decode_frame_at(
        &self,
        source: &Path,
        seconds: f64,
    ) -> ShotcraftResult<(PixelBuffer, SourceInfo)> {
        let clip = load_clip(source)?;
        let target = clip.time_base().from_secs(seconds);
        let pts = clip
            .pts
            .iter()
            .copied()
            .find(|&pts| pts >= target)
            .or_else(|| clip.pts.last().copied())
            .ok_or_else(|| ShotcraftError::stream("clip has no frames"))?;
        Ok((clip.frame(pts), clip.info()))
    }

    fn probe(&self, source: &Path) -> ShotcraftResult<SourceInfo> {
        load_clip(source).map(|clip| clip.info())
    }
}

/// Fresh, empty scratch directory for one test.
pub fn scratch_dir(label: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("shotcraft_test_{label}_{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

pub fn write_clip(dir: &Path, name: &str, clip: &ClipSpec) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, serde_json::to_vec(clip).unwrap()).unwrap();
    path
}

pub fn tiny_device() -> DeviceSize {
    DeviceSize::custom("Tiny", 60, 120)
}

pub fn renderer() -> OverlayRenderer {
    OverlayRenderer::new(Arc::new(FontLibrary::empty()))
}

/// Build a pipeline job the way the exporter does.
pub fn job_for(screen: &Screen, device: &DeviceSize, source: &Path, destination: &Path) -> PipelineJob {
    let native = SyntheticBackend.probe(source).ok().map(|info| info.display_size());
    let layout = ScreenLayout::compute(screen, device, native);
    let overlay_png = renderer()
        .render_png(screen, device, "en", &layout)
        .unwrap();
    PipelineJob {
        source: source.to_path_buf(),
        destination: destination.to_path_buf(),
        overlay_png,
        placement: Placement {
            rect: layout.screenshot_rect,
            corner_radius: layout.corner_radius,
            content_mode: screen.content_mode,
        },
        canvas: layout.canvas,
    }
}

/// Every file under `dir`, recursively.
pub fn files_under(dir: &Path) -> Vec<PathBuf> {
    let mut out = Vec::new();
    let Ok(entries) = std::fs::read_dir(dir) else {
        return out;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            out.extend(files_under(&path));
        } else {
            out.push(path);
        }
    }
    out.sort();
    out
}
