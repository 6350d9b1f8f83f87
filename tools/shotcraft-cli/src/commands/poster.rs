//! Render one screen as a poster-frame still.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;

use shotcraft_common::config::AppConfig;
use shotcraft_render_engine::export::{write_atomic, Exporter, ImageFormat};
use shotcraft_render_engine::fonts::FontLibrary;
use shotcraft_render_engine::FfmpegBackend;

use super::{load_project, select_devices};

pub async fn run(
    project: PathBuf,
    screen: String,
    device: String,
    language: String,
    output: PathBuf,
    config: &AppConfig,
) -> anyhow::Result<()> {
    let file = load_project(&project)?;
    let screen = file
        .project
        .screen(&screen)
        .cloned()
        .ok_or_else(|| anyhow::anyhow!("No screen named '{screen}'"))?;
    let device = select_devices(&file, &[device])?
        .into_iter()
        .next()
        .ok_or_else(|| anyhow::anyhow!("No device selected"))?;

    let format = match output.extension().and_then(|e| e.to_str()) {
        Some(ext) => ext.parse::<ImageFormat>()?,
        None => config.export.image_format.parse::<ImageFormat>()?,
    };

    let backend = Arc::new(FfmpegBackend::new().context("FFmpeg is not available")?);
    let fonts = Arc::new(FontLibrary::new(config.fonts.clone()));
    let exporter = Exporter::new(backend, fonts, config.export.clone());

    let bytes = if screen.has_video(&language, device.category) {
        println!(
            "Rendering poster frame at {:.2}s",
            screen.poster_time(&language, device.category)
        );
        exporter
            .export_poster_frame(&screen, &device, &language, format)
            .await?
    } else {
        println!("No video assigned; rendering the still instead");
        exporter
            .render_still(&screen, &device, &language, format)
            .await?
    };

    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    write_atomic(&output, &bytes)
        .await
        .with_context(|| format!("Failed to write {}", output.display()))?;

    println!(
        "Wrote {} ({} / {} / {language})",
        output.display(),
        screen.name,
        device.name
    );
    Ok(())
}
