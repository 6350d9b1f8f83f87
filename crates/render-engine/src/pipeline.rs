//! Streaming pipeline controller.
//!
//! One video export item runs as three blocking tasks:
//!
//! ```text
//!  video reader ─► composite ─┐
//!                             ├─► bounded channel ─► writer (sink) ─► <dest>.part
//!  audio reader ──────────────┘                                           │
//!                                          join both pumps + writer ◄─────┘
//!                                          finalize, rename to <dest>
//! ```
//!
//! The writer finalizes the container only after the channel closes and both
//! tracks reported completion. Any failure sets a shared abort flag so the
//! writer abandons the output instead.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tiny_skia::Pixmap;
use tokio::sync::mpsc;

use shotcraft_common::{ShotcraftError, ShotcraftResult, VideoEncodeSettings};
use shotcraft_project_model::ContentMode;

use crate::backend::{
    AudioTrackReader, MediaBackend, MediaSink, SinkSpec, SourceInfo, VideoSample,
    VideoTrackReader,
};
use crate::compositor::{composite_clipped, ContentClip, Placement};
use crate::geometry::CanvasSize;
use crate::overlay::decode_overlay;
use crate::pixel::SourceTransform;
use crate::progress::CancellationFlag;

/// Everything needed to export one video item.
#[derive(Debug, Clone)]
pub struct PipelineJob {
    pub source: PathBuf,
    pub destination: PathBuf,
    /// Encoded overlay; decoded once before streaming.
    pub overlay_png: Vec<u8>,
    pub placement: Placement,
    pub canvas: CanvasSize,
}

/// Lifecycle of one pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    Idle,
    Opened,
    Streaming,
    Finalizing,
    Completed,
    Failed,
}

/// Outcome of a successful run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineReport {
    pub frames_written: u64,
    pub frames_dropped: u64,
    pub audio_packets: u64,
    pub total_frames_estimate: u64,
    pub state: PipelineState,
    pub output: PathBuf,
}

enum WriterInput<P> {
    Video(VideoSample),
    Audio(P),
    VideoFinished,
    AudioFinished,
}

#[derive(Debug, Default)]
struct VideoPumpStats {
    pulled: u64,
    dropped: u64,
}

enum WriterOutcome {
    Finalized { frames: u64, audio_packets: u64 },
    Abandoned,
}

/// Sibling temp path the sink writes to until finalize succeeds.
pub fn temp_path(destination: &Path) -> PathBuf {
    let mut name = destination.as_os_str().to_owned();
    name.push(".part");
    PathBuf::from(name)
}

fn transition(state: PipelineState, destination: &Path) {
    tracing::debug!(?state, output = %destination.display(), "Pipeline state");
}

/// Export one video item: stream every source frame through the compositor
/// into a new file, passing audio through untouched.
///
/// `on_frame_progress(done, total)` is called for every pulled frame,
/// including dropped ones. `total` is an estimate from nominal frame rate
/// and duration.
pub async fn run_pipeline<B, F>(
    backend: Arc<B>,
    job: PipelineJob,
    settings: &VideoEncodeSettings,
    cancel: CancellationFlag,
    on_frame_progress: F,
) -> ShotcraftResult<PipelineReport>
where
    B: MediaBackend,
    F: Fn(u64, u64) + Send + 'static,
{
    let destination = job.destination.clone();
    let temp = temp_path(&destination);
    transition(PipelineState::Idle, &destination);

    let result = stream_to_temp(backend, job, settings, cancel, on_frame_progress, &temp).await;

    match result {
        Ok(mut report) => {
            if let Err(e) = tokio::fs::rename(&temp, &destination).await {
                discard(&temp).await;
                transition(PipelineState::Failed, &destination);
                return Err(ShotcraftError::stream(format!(
                    "cannot move finished export into place: {e}"
                )));
            }
            report.state = PipelineState::Completed;
            transition(report.state, &destination);
            tracing::info!(
                output = %destination.display(),
                frames = report.frames_written,
                dropped = report.frames_dropped,
                audio_packets = report.audio_packets,
                "Video export completed"
            );
            Ok(report)
        }
        Err(e) => {
            discard(&temp).await;
            transition(PipelineState::Failed, &destination);
            if e.is_cancelled() {
                tracing::info!(output = %destination.display(), "Video export cancelled");
            } else {
                tracing::error!(output = %destination.display(), error = %e, "Video export failed");
            }
            Err(e)
        }
    }
}

async fn discard(temp: &Path) {
    match tokio::fs::remove_file(temp).await {
        Ok(()) => tracing::debug!(path = %temp.display(), "Removed partial output"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(path = %temp.display(), "Cannot remove partial output: {e}"),
    }
}

struct Prepared<P> {
    info: SourceInfo,
    video: Box<dyn VideoTrackReader>,
    audio: Option<Box<dyn AudioTrackReader<P>>>,
    sink: Box<dyn MediaSink<P>>,
    overlay: Pixmap,
}

fn prepare<B: MediaBackend>(
    backend: &B,
    job: &PipelineJob,
    settings: &VideoEncodeSettings,
    temp: &Path,
) -> ShotcraftResult<Prepared<B::AudioPacket>> {
    for stale in [job.destination.as_path(), temp] {
        match std::fs::remove_file(stale) {
            Ok(()) => tracing::debug!(path = %stale.display(), "Removed previous output"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(ShotcraftError::pipeline_setup(format!(
                    "cannot remove existing {}: {e}",
                    stale.display()
                )))
            }
        }
    }

    let overlay = decode_overlay(&job.overlay_png)
        .map_err(|e| ShotcraftError::pipeline_setup(e.to_string()))?;

    let opened = backend.open(&job.source)?;
    let info = opened.info;
    transition(PipelineState::Opened, &job.destination);
    tracing::debug!(
        source = %job.source.display(),
        width = info.coded_width,
        height = info.coded_height,
        fps = info.frame_rate,
        duration = info.duration_secs,
        transform = ?info.transform,
        has_audio = opened.audio.is_some(),
        "Opened source"
    );

    let spec = SinkSpec {
        canvas: job.canvas,
        time_base: info.time_base,
        frame_rate: info.frame_rate,
        with_audio: opened.audio.is_some(),
        crf: settings.crf,
        preset: settings.preset.clone(),
    };
    let sink = backend
        .create_sink(temp, &job.source, &spec)
        .map_err(|e| match e {
            ShotcraftError::PipelineSetup { .. } => e,
            other => ShotcraftError::pipeline_setup(other.to_string()),
        })?;

    Ok(Prepared {
        info,
        video: opened.video,
        audio: opened.audio,
        sink,
        overlay,
    })
}

async fn stream_to_temp<B, F>(
    backend: Arc<B>,
    job: PipelineJob,
    settings: &VideoEncodeSettings,
    cancel: CancellationFlag,
    on_frame_progress: F,
    temp: &Path,
) -> ShotcraftResult<PipelineReport>
where
    B: MediaBackend,
    F: Fn(u64, u64) + Send + 'static,
{
    let destination = job.destination.clone();
    let placement = job.placement;
    let canvas = job.canvas;
    let clip = ContentClip::new(&placement, canvas)
        .map_err(|e| ShotcraftError::pipeline_setup(e.to_string()))?;

    let prepared = {
        let backend = Arc::clone(&backend);
        let settings = settings.clone();
        let temp = temp.to_path_buf();
        tokio::task::spawn_blocking(move || prepare(backend.as_ref(), &job, &settings, &temp))
            .await
            .map_err(|e| ShotcraftError::pipeline_setup(format!("setup task failed: {e}")))??
    };

    let Prepared {
        info,
        video,
        audio,
        sink,
        overlay,
    } = prepared;
    let total_frames = info.estimated_frames();
    let expects_audio = audio.is_some();

    transition(PipelineState::Streaming, &destination);
    let (tx, rx) = mpsc::channel(settings.channel_capacity.max(1));
    let abort = Arc::new(AtomicBool::new(false));

    let video_task = {
        let tx = tx.clone();
        let abort = Arc::clone(&abort);
        let overlay = Arc::new(overlay);
        tokio::task::spawn_blocking(move || {
            video_pump(
                video,
                VideoPumpContext {
                    overlay,
                    content_mode: placement.content_mode,
                    clip,
                    transform: info.transform,
                    canvas,
                    total_frames,
                },
                tx,
                abort,
                cancel,
                on_frame_progress,
            )
        })
    };

    let audio_task = audio.map(|reader| {
        let tx = tx.clone();
        let abort = Arc::clone(&abort);
        tokio::task::spawn_blocking(move || audio_pump(reader, tx, abort))
    });

    // The writer sees the channel close once both pumps drop their senders.
    drop(tx);

    let writer_task = {
        let abort = Arc::clone(&abort);
        let destination = destination.clone();
        tokio::task::spawn_blocking(move || writer(sink, rx, abort, expects_audio, &destination))
    };

    let video_result = video_task
        .await
        .map_err(|e| ShotcraftError::stream(format!("video pump panicked: {e}")))
        .and_then(|r| r);
    let audio_result = match audio_task {
        Some(task) => task
            .await
            .map_err(|e| ShotcraftError::stream(format!("audio pump panicked: {e}")))
            .and_then(|r| r),
        None => Ok(0),
    };
    let writer_result = writer_task
        .await
        .map_err(|e| ShotcraftError::stream(format!("writer panicked: {e}")))
        .and_then(|r| r);

    let video_stats = video_result?;
    audio_result?;
    match writer_result? {
        WriterOutcome::Finalized {
            frames,
            audio_packets,
        } => Ok(PipelineReport {
            frames_written: frames,
            frames_dropped: video_stats.dropped,
            audio_packets,
            total_frames_estimate: total_frames,
            state: PipelineState::Finalizing,
            output: destination,
        }),
        WriterOutcome::Abandoned => Err(ShotcraftError::stream(
            "pipeline stopped before all tracks finished",
        )),
    }
}

struct VideoPumpContext {
    overlay: Arc<Pixmap>,
    content_mode: ContentMode,
    clip: ContentClip,
    transform: SourceTransform,
    canvas: CanvasSize,
    total_frames: u64,
}

fn video_pump<P, F>(
    mut reader: Box<dyn VideoTrackReader>,
    ctx: VideoPumpContext,
    tx: mpsc::Sender<WriterInput<P>>,
    abort: Arc<AtomicBool>,
    cancel: CancellationFlag,
    on_frame_progress: F,
) -> ShotcraftResult<VideoPumpStats>
where
    F: Fn(u64, u64),
{
    let fail = |e: ShotcraftError| {
        abort.store(true, Ordering::SeqCst);
        e
    };

    let mut stats = VideoPumpStats::default();
    let mut last_pts: Option<i64> = None;

    loop {
        if abort.load(Ordering::SeqCst) {
            return Ok(stats);
        }
        if cancel.is_cancelled() {
            return Err(fail(ShotcraftError::Cancelled));
        }

        let Some(sample) = reader.next_frame().map_err(fail)? else {
            break;
        };
        stats.pulled += 1;
        on_frame_progress(stats.pulled, ctx.total_frames.max(stats.pulled));

        if last_pts.is_some_and(|last| sample.pts <= last) {
            stats.dropped += 1;
            tracing::trace!(pts = sample.pts, "Dropping frame with non-increasing PTS");
            continue;
        }
        last_pts = Some(sample.pts);

        let frame = match composite_clipped(
            &sample.frame,
            Pixmap::as_ref(&ctx.overlay),
            ctx.content_mode,
            &ctx.clip,
            ctx.transform,
            ctx.canvas,
        ) {
            Ok(frame) => frame,
            Err(e) => {
                stats.dropped += 1;
                tracing::warn!(pts = sample.pts, error = %e, "Dropping frame that failed to composite");
                continue;
            }
        };

        let composed = VideoSample {
            pts: sample.pts,
            frame,
        };
        if tx.blocking_send(WriterInput::Video(composed)).is_err() {
            // Writer stopped; it reports its own error.
            return Ok(stats);
        }
    }

    tracing::debug!(frames = stats.pulled, dropped = stats.dropped, "Video track exhausted");
    let _ = tx.blocking_send(WriterInput::VideoFinished);
    Ok(stats)
}

fn audio_pump<P>(
    mut reader: Box<dyn AudioTrackReader<P>>,
    tx: mpsc::Sender<WriterInput<P>>,
    abort: Arc<AtomicBool>,
) -> ShotcraftResult<u64> {
    let mut forwarded = 0u64;
    loop {
        if abort.load(Ordering::SeqCst) {
            return Ok(forwarded);
        }
        let packet = match reader.next_packet() {
            Ok(Some(packet)) => packet,
            Ok(None) => break,
            Err(e) => {
                abort.store(true, Ordering::SeqCst);
                return Err(e);
            }
        };
        if tx.blocking_send(WriterInput::Audio(packet)).is_err() {
            return Ok(forwarded);
        }
        forwarded += 1;
    }

    tracing::debug!(packets = forwarded, "Audio track exhausted");
    let _ = tx.blocking_send(WriterInput::AudioFinished);
    Ok(forwarded)
}

fn writer<P>(
    mut sink: Box<dyn MediaSink<P>>,
    mut rx: mpsc::Receiver<WriterInput<P>>,
    abort: Arc<AtomicBool>,
    expects_audio: bool,
    destination: &Path,
) -> ShotcraftResult<WriterOutcome> {
    let mut frames = 0u64;
    let mut audio_packets = 0u64;
    let mut video_done = false;
    let mut audio_done = !expects_audio;

    while let Some(input) = rx.blocking_recv() {
        // After an abort keep draining so blocked pumps can observe it.
        if abort.load(Ordering::SeqCst) {
            continue;
        }
        let step = match input {
            WriterInput::Video(sample) => sink.write_video(sample).map(|()| frames += 1),
            WriterInput::Audio(packet) => sink.write_audio(packet).map(|()| audio_packets += 1),
            WriterInput::VideoFinished => {
                video_done = true;
                sink.finish_video()
            }
            WriterInput::AudioFinished => {
                audio_done = true;
                Ok(())
            }
        };
        if let Err(e) = step {
            abort.store(true, Ordering::SeqCst);
            drop(rx);
            sink.abandon();
            return Err(e);
        }
    }

    if abort.load(Ordering::SeqCst) || !video_done || !audio_done {
        sink.abandon();
        return Ok(WriterOutcome::Abandoned);
    }

    transition(PipelineState::Finalizing, destination);
    sink.finalize()?;
    Ok(WriterOutcome::Finalized {
        frames,
        audio_packets,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_temp_path_is_sibling_with_suffix() {
        let temp = temp_path(Path::new("/out/en/iPhone/Home.mp4"));
        assert_eq!(temp, PathBuf::from("/out/en/iPhone/Home.mp4.part"));
    }

    #[test]
    fn test_report_serializes_state() {
        let report = PipelineReport {
            frames_written: 3,
            frames_dropped: 1,
            audio_packets: 0,
            total_frames_estimate: 4,
            state: PipelineState::Completed,
            output: PathBuf::from("a.mp4"),
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["state"], "completed");
        assert_eq!(json["frames_dropped"], 1);
    }
}
