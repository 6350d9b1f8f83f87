//! Print computed layouts as JSON.

use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;

use shotcraft_common::config::AppConfig;
use shotcraft_render_engine::export::Exporter;
use shotcraft_render_engine::fonts::FontLibrary;
use shotcraft_render_engine::geometry::{LayoutRect, ScreenLayout};
use shotcraft_render_engine::FfmpegBackend;

use super::{load_project, select_devices};

#[derive(Serialize)]
struct LayoutEntry<'a> {
    screen: &'a str,
    device: &'a str,
    language: &'a str,
    frame_rect: LayoutRect,
    #[serde(flatten)]
    layout: ScreenLayout,
}

pub fn run(
    project: PathBuf,
    devices: Vec<String>,
    language: String,
    config: &AppConfig,
) -> anyhow::Result<()> {
    let file = load_project(&project)?;
    let devices = select_devices(&file, &devices)?;

    // Probing is best effort; without FFmpeg video slots use the unfitted box.
    let backend = match FfmpegBackend::new() {
        Ok(backend) => backend,
        Err(e) => {
            tracing::warn!("FFmpeg unavailable, video content will not be probed: {e}");
            FfmpegBackend
        }
    };
    let exporter = Exporter::new(
        Arc::new(backend),
        Arc::new(FontLibrary::empty()),
        config.export.clone(),
    );

    let mut entries = Vec::new();
    for device in &devices {
        for screen in &file.project.screens {
            let layout = exporter.layout_for(screen, device, &language);
            entries.push(LayoutEntry {
                screen: &screen.name,
                device: &device.name,
                language: &language,
                frame_rect: layout.frame_rect(),
                layout,
            });
        }
    }

    println!("{}", serde_json::to_string_pretty(&entries)?);
    Ok(())
}
