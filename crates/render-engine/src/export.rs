//! Export orchestration: batch jobs, single video items, stills and posters.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder};
use serde::{Deserialize, Serialize};

use shotcraft_common::{ExportDefaults, ShotcraftError, ShotcraftResult};
use shotcraft_project_model::{DeviceSize, Language, Project, Screen};

use crate::backend::MediaBackend;
use crate::compositor::{composite, Placement};
use crate::fonts::FontLibrary;
use crate::geometry::{ScreenLayout, Size};
use crate::overlay::{decode_overlay, load_image, OverlayRenderer};
use crate::pipeline::{run_pipeline, temp_path, PipelineJob, PipelineReport};
use crate::pixel::{PixelBuffer, SourceTransform};
use crate::progress::{CancellationFlag, ExportProgress};

/// Still image encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    #[default]
    Png,
    Jpeg,
}

impl ImageFormat {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpeg",
        }
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ImageFormat {
    type Err = ShotcraftError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "png" => Ok(Self::Png),
            "jpeg" | "jpg" => Ok(Self::Jpeg),
            other => Err(ShotcraftError::config(format!(
                "unknown image format '{other}' (expected png or jpeg)"
            ))),
        }
    }
}

/// What to produce for items that have a video assigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VideoPolicy {
    /// Full re-encode with the overlay on every frame.
    #[default]
    Stream,
    /// A single still at the poster time.
    PosterFrame,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportOutcome {
    Succeeded,
    PartiallyFailed,
    Cancelled,
}

/// Result of a batch. Item failures are collected, never raised.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportSummary {
    pub outcome: ExportOutcome,
    pub completed: u64,
    pub total: u64,
    pub errors: Vec<String>,
    pub outputs: Vec<PathBuf>,
}

/// One batch: every screen for every device and language.
#[derive(Debug, Clone)]
pub struct ExportRequest {
    pub project: Project,
    pub devices: Vec<DeviceSize>,
    pub languages: Vec<Language>,
    pub output_root: PathBuf,
    pub format: ImageFormat,
    pub video_policy: VideoPolicy,
}

/// Replace path separators so names cannot escape their directory.
pub fn sanitize_component(name: &str) -> String {
    name.replace(['/', '\\'], "-")
}

/// `output_root/<lang>/<device>/<screen>.<ext>`
pub fn output_path(
    output_root: &Path,
    language: &str,
    device: &DeviceSize,
    screen: &Screen,
    extension: &str,
) -> PathBuf {
    output_root
        .join(sanitize_component(language))
        .join(sanitize_component(&device.name))
        .join(format!("{}.{extension}", sanitize_component(&screen.name)))
}

/// Encode a canvas buffer as PNG or JPEG.
pub fn encode_image(buffer: &PixelBuffer, format: ImageFormat, jpeg_quality: u8) -> ShotcraftResult<Vec<u8>> {
    let rgba = buffer.to_straight_rgba();
    let mut out = Vec::new();
    let result = match format {
        ImageFormat::Png => PngEncoder::new(&mut out).write_image(
            &rgba,
            buffer.width,
            buffer.height,
            ExtendedColorType::Rgba8,
        ),
        ImageFormat::Jpeg => {
            let rgb: Vec<u8> = rgba
                .chunks_exact(4)
                .flat_map(|px| [px[0], px[1], px[2]])
                .collect();
            JpegEncoder::new_with_quality(&mut out, jpeg_quality.clamp(1, 100)).write_image(
                &rgb,
                buffer.width,
                buffer.height,
                ExtendedColorType::Rgb8,
            )
        }
    };
    result.map_err(|e| ShotcraftError::render(format!("{format} encode failed: {e}")))?;
    Ok(out)
}

/// Write `bytes` to a sibling temp file and rename it over `path`.
pub async fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let temp = temp_path(path);
    if let Err(e) = tokio::fs::write(&temp, bytes).await {
        let _ = tokio::fs::remove_file(&temp).await;
        return Err(e);
    }
    if let Err(e) = tokio::fs::rename(&temp, path).await {
        let _ = tokio::fs::remove_file(&temp).await;
        return Err(e);
    }
    Ok(())
}

/// Frame content placed into the screenshot area of a still.
struct StillContent {
    frame: PixelBuffer,
    transform: SourceTransform,
}

/// Overlay plus compositor, shared by stills and posters.
fn compose_still(
    renderer: &OverlayRenderer,
    screen: &Screen,
    device: &DeviceSize,
    language: &str,
    content: Option<StillContent>,
) -> ShotcraftResult<PixelBuffer> {
    let native = content
        .as_ref()
        .map(|c| c.transform.display_size(c.frame.size()));
    let layout = ScreenLayout::compute(screen, device, native);

    // Round-trip through PNG so stills see exactly the overlay a video gets.
    let png = renderer.render_png(screen, device, language, &layout)?;
    let overlay = decode_overlay(&png)?;

    let Some(content) = content else {
        return Ok(PixelBuffer::from_pixmap(overlay));
    };
    let placement = Placement {
        rect: layout.screenshot_rect,
        corner_radius: layout.corner_radius,
        content_mode: screen.content_mode,
    };
    composite(
        &content.frame,
        overlay.as_ref(),
        &placement,
        content.transform,
        layout.canvas,
    )
    .map_err(|e| ShotcraftError::render(e.to_string()))
}

/// Drives exports against one media backend.
pub struct Exporter<B: MediaBackend> {
    backend: Arc<B>,
    renderer: OverlayRenderer,
    settings: ExportDefaults,
}

impl<B: MediaBackend> Exporter<B> {
    pub fn new(backend: Arc<B>, fonts: Arc<FontLibrary>, settings: ExportDefaults) -> Self {
        Self {
            backend,
            renderer: OverlayRenderer::new(fonts),
            settings,
        }
    }

    /// Display size of the content assigned to a slot, if it can be read.
    pub fn native_content_size(
        &self,
        screen: &Screen,
        device: &DeviceSize,
        language: &str,
    ) -> Option<Size> {
        if let Some(video) = screen.video_for(language, device.category) {
            return match self.backend.probe(video) {
                Ok(info) => Some(info.display_size()),
                Err(e) => {
                    tracing::warn!(path = %video.display(), "Cannot probe video: {e}");
                    None
                }
            };
        }
        let image = screen.image_for(language, device.category)?;
        image::image_dimensions(image)
            .ok()
            .map(|(w, h)| Size::new(w as f64, h as f64))
    }

    /// Compute the layout for one item, probing its content when needed.
    pub fn layout_for(&self, screen: &Screen, device: &DeviceSize, language: &str) -> ScreenLayout {
        let native = if screen.fit_frame_to_content {
            self.native_content_size(screen, device, language)
        } else {
            None
        };
        ScreenLayout::compute(screen, device, native)
    }

    /// Export one screen's video for one device and language.
    pub async fn export_video_item<F>(
        &self,
        screen: &Screen,
        device: &DeviceSize,
        language: &str,
        destination: &Path,
        cancel: CancellationFlag,
        on_frame_progress: F,
    ) -> ShotcraftResult<PipelineReport>
    where
        F: Fn(u64, u64) + Send + 'static,
    {
        let source = screen
            .video_for(language, device.category)
            .ok_or_else(|| {
                ShotcraftError::project(format!(
                    "no video assigned to {} for {} / {language}",
                    screen.name, device.name
                ))
            })?
            .to_path_buf();

        let job = {
            let backend = Arc::clone(&self.backend);
            let renderer = self.renderer.clone();
            let screen = screen.clone();
            let device = device.clone();
            let language = language.to_string();
            let destination = destination.to_path_buf();
            tokio::task::spawn_blocking(move || -> ShotcraftResult<PipelineJob> {
                let native = backend.probe(&source)?.display_size();
                let layout = ScreenLayout::compute(&screen, &device, Some(native));
                let overlay_png = renderer.render_png(&screen, &device, &language, &layout)?;
                Ok(PipelineJob {
                    source,
                    destination,
                    overlay_png,
                    placement: Placement {
                        rect: layout.screenshot_rect,
                        corner_radius: layout.corner_radius,
                        content_mode: screen.content_mode,
                    },
                    canvas: layout.canvas,
                })
            })
            .await
            .map_err(|e| ShotcraftError::render(format!("overlay task failed: {e}")))??
        };

        run_pipeline(
            Arc::clone(&self.backend),
            job,
            &self.settings.video,
            cancel,
            on_frame_progress,
        )
        .await
    }

    /// Render one still item (image content or placeholder) to encoded bytes.
    pub async fn render_still(
        &self,
        screen: &Screen,
        device: &DeviceSize,
        language: &str,
        format: ImageFormat,
    ) -> ShotcraftResult<Vec<u8>> {
        let renderer = self.renderer.clone();
        let screen = screen.clone();
        let device = device.clone();
        let language = language.to_string();
        let quality = self.settings.jpeg_quality;

        tokio::task::spawn_blocking(move || {
            let content = screen
                .image_for(&language, device.category)
                .and_then(|path| match load_image(path) {
                    Ok(pixmap) => Some(StillContent {
                        frame: PixelBuffer::from_pixmap(pixmap),
                        transform: SourceTransform::IDENTITY,
                    }),
                    Err(e) => {
                        tracing::warn!(path = %path.display(), "Screenshot unavailable: {e}");
                        None
                    }
                });
            let buffer = compose_still(&renderer, &screen, &device, &language, content)?;
            encode_image(&buffer, format, quality)
        })
        .await
        .map_err(|e| ShotcraftError::render(format!("render task failed: {e}")))?
    }

    /// Render a video item as a still at its poster time.
    ///
    /// Uses the same overlay and compositor as the streaming path, so the
    /// result matches the exported video's frame at that timestamp.
    pub async fn export_poster_frame(
        &self,
        screen: &Screen,
        device: &DeviceSize,
        language: &str,
        format: ImageFormat,
    ) -> ShotcraftResult<Vec<u8>> {
        let source = screen
            .video_for(language, device.category)
            .ok_or_else(|| {
                ShotcraftError::project(format!("no video assigned to {}", screen.name))
            })?
            .to_path_buf();
        let seconds = screen.poster_time(language, device.category);

        let backend = Arc::clone(&self.backend);
        let renderer = self.renderer.clone();
        let screen = screen.clone();
        let device = device.clone();
        let language = language.to_string();
        let quality = self.settings.jpeg_quality;

        tokio::task::spawn_blocking(move || {
            let (frame, info) = backend.decode_frame_at(&source, seconds)?;
            let content = StillContent {
                frame,
                transform: info.transform,
            };
            let buffer = compose_still(&renderer, &screen, &device, &language, Some(content))?;
            encode_image(&buffer, format, quality)
        })
        .await
        .map_err(|e| ShotcraftError::render(format!("poster task failed: {e}")))?
    }

    /// Export every (screen, device, language) item of the request.
    ///
    /// Videos go first, then stills. Item failures are recorded in the
    /// summary and on `progress`; the batch always runs to completion or
    /// cancellation.
    pub async fn batch_export(
        &self,
        request: &ExportRequest,
        progress: Arc<ExportProgress>,
    ) -> ExportSummary {
        let screens = &request.project.screens;
        let total = (screens.len() * request.devices.len() * request.languages.len()) as u64;
        progress.begin(total);
        tracing::info!(
            project = %request.project.name,
            total,
            output = %request.output_root.display(),
            format = %request.format,
            policy = ?request.video_policy,
            "Starting batch export"
        );

        for language in &request.languages {
            for device in &request.devices {
                let dir = request
                    .output_root
                    .join(sanitize_component(&language.code))
                    .join(sanitize_component(&device.name));
                if let Err(e) = tokio::fs::create_dir_all(&dir).await {
                    tracing::warn!(dir = %dir.display(), "Cannot create output directory: {e}");
                }
            }
        }

        let mut outputs = Vec::new();

        // Pass 1: items with a video.
        'videos: for language in &request.languages {
            for device in &request.devices {
                for screen in screens {
                    if progress.is_cancelled() {
                        break 'videos;
                    }
                    if !screen.has_video(&language.code, device.category) {
                        continue;
                    }
                    progress.set_current_item(item_label(screen, device, language));
                    let result = match request.video_policy {
                        VideoPolicy::Stream => {
                            self.stream_item(request, screen, device, language, &progress)
                                .await
                        }
                        VideoPolicy::PosterFrame => {
                            self.poster_item(request, screen, device, language, &progress)
                                .await
                        }
                    };
                    if let Some(path) = result {
                        outputs.push(path);
                    }
                    progress.item_completed();
                }
            }
        }

        // Pass 2: stills.
        'stills: for language in &request.languages {
            for device in &request.devices {
                for screen in screens {
                    if progress.is_cancelled() {
                        break 'stills;
                    }
                    if screen.has_video(&language.code, device.category) {
                        continue;
                    }
                    progress.set_current_item(item_label(screen, device, language));
                    if let Some(path) = self
                        .still_item(request, screen, device, language, &progress)
                        .await
                    {
                        outputs.push(path);
                    }
                    progress.item_completed();
                }
            }
        }

        let errors = progress.errors();
        let outcome = if progress.is_cancelled() {
            ExportOutcome::Cancelled
        } else if errors.is_empty() {
            ExportOutcome::Succeeded
        } else {
            ExportOutcome::PartiallyFailed
        };
        progress.finish();

        let summary = ExportSummary {
            outcome,
            completed: progress.completed(),
            total,
            errors,
            outputs,
        };
        tracing::info!(
            outcome = ?summary.outcome,
            completed = summary.completed,
            total = summary.total,
            errors = summary.errors.len(),
            "Batch export finished"
        );
        summary
    }

    async fn stream_item(
        &self,
        request: &ExportRequest,
        screen: &Screen,
        device: &DeviceSize,
        language: &Language,
        progress: &Arc<ExportProgress>,
    ) -> Option<PathBuf> {
        let path = output_path(&request.output_root, &language.code, device, screen, "mp4");
        if let Some(parent) = path.parent() {
            if let Err(e) = tokio::fs::create_dir_all(parent).await {
                progress.push_error(format!(
                    "Video export failed: {} / {} – {e}",
                    screen.name, device.name
                ));
                return None;
            }
        }

        progress.reset_frame_progress();
        let frame_progress = Arc::clone(progress);
        let result = self
            .export_video_item(
                screen,
                device,
                &language.code,
                &path,
                progress.cancellation(),
                move |done, total| frame_progress.set_frame_progress(done, total),
            )
            .await;
        progress.reset_frame_progress();

        match result {
            Ok(_) => Some(path),
            Err(e) if e.is_cancelled() => None,
            Err(e) => {
                progress.push_error(format!(
                    "Video export failed: {} / {} – {e}",
                    screen.name, device.name
                ));
                None
            }
        }
    }

    async fn poster_item(
        &self,
        request: &ExportRequest,
        screen: &Screen,
        device: &DeviceSize,
        language: &Language,
        progress: &ExportProgress,
    ) -> Option<PathBuf> {
        match self
            .export_poster_frame(screen, device, &language.code, request.format)
            .await
        {
            Ok(bytes) => self.write_item(request, screen, device, language, &bytes, progress).await,
            Err(e) => {
                tracing::warn!(screen = %screen.name, device = %device.name, "Poster decode failed: {e}");
                progress.push_error(format!(
                    "Video poster frame unavailable: {} / {}",
                    screen.name, device.name
                ));
                None
            }
        }
    }

    async fn still_item(
        &self,
        request: &ExportRequest,
        screen: &Screen,
        device: &DeviceSize,
        language: &Language,
        progress: &ExportProgress,
    ) -> Option<PathBuf> {
        match self
            .render_still(screen, device, &language.code, request.format)
            .await
        {
            Ok(bytes) => self.write_item(request, screen, device, language, &bytes, progress).await,
            Err(e) => {
                tracing::warn!(screen = %screen.name, device = %device.name, "Render failed: {e}");
                progress.push_error(format!(
                    "Failed to render: {} / {}",
                    screen.name, device.name
                ));
                None
            }
        }
    }

    async fn write_item(
        &self,
        request: &ExportRequest,
        screen: &Screen,
        device: &DeviceSize,
        language: &Language,
        bytes: &[u8],
        progress: &ExportProgress,
    ) -> Option<PathBuf> {
        let path = output_path(
            &request.output_root,
            &language.code,
            device,
            screen,
            request.format.extension(),
        );
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let written = async {
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            write_atomic(&path, bytes).await
        }
        .await;

        match written {
            Ok(()) => {
                tracing::debug!(output = %path.display(), bytes = bytes.len(), "Wrote still");
                Some(path)
            }
            Err(e) => {
                progress.push_error(format!("Failed to write: {file_name} - {e}"));
                None
            }
        }
    }
}

fn item_label(screen: &Screen, device: &DeviceSize, language: &Language) -> String {
    format!("{} / {} / {}", screen.name, device.name, language.label())
}
