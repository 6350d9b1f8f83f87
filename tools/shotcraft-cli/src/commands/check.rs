//! Check export prerequisites.

use std::path::PathBuf;

use shotcraft_common::config::{config_file_path, AppConfig};
use shotcraft_render_engine::backend::MediaBackend;
use shotcraft_render_engine::ffmpeg;
use shotcraft_render_engine::fonts::FontLibrary;
use shotcraft_render_engine::FfmpegBackend;

pub fn run(font: String, probe: Option<PathBuf>, config: &AppConfig) -> anyhow::Result<()> {
    println!("Shotcraft System Check");
    println!("{}", "=".repeat(50));

    let config_path = config_file_path();
    if config_path.exists() {
        println!("[OK] Config: {}", config_path.display());
    } else {
        println!("[OK] Config: defaults ({} not found)", config_path.display());
    }

    let mut ready = true;

    let backend = match FfmpegBackend::new() {
        Ok(backend) => {
            println!("[OK] FFmpeg: {}", ffmpeg::library_versions());
            Some(backend)
        }
        Err(e) => {
            println!("[FAIL] FFmpeg: {e}");
            ready = false;
            None
        }
    };

    if backend.is_some() {
        if ffmpeg::h264_encoder_available() {
            println!("[OK] H.264 encoder available");
        } else {
            println!("[FAIL] No H.264 encoder; video export will fail");
            ready = false;
        }
    }

    let fonts = FontLibrary::new(config.fonts.clone());
    let book = fonts.book(&font);
    if book.is_empty() {
        println!("[WARN] No font found for '{font}'; captions will be skipped");
        println!("       Set fonts.search_dirs or fonts.regular in the config");
    } else {
        println!(
            "[OK] Font '{font}': regular={} bold={} italic={}",
            book.face(false, false).is_some(),
            book.face(true, false).is_some(),
            book.face(false, true).is_some()
        );
    }

    if let (Some(backend), Some(path)) = (backend.as_ref(), probe) {
        match backend.probe(&path) {
            Ok(info) => {
                let size = info.display_size();
                println!("[OK] Probe {}:", path.display());
                println!(
                    "     {}x{} coded, {}x{} displayed, {:.2} fps, {:.2}s, audio: {}",
                    info.coded_width,
                    info.coded_height,
                    size.width,
                    size.height,
                    info.frame_rate,
                    info.duration_secs,
                    info.has_audio
                );
            }
            Err(e) => {
                println!("[FAIL] Probe {}: {e}", path.display());
                ready = false;
            }
        }
    }

    println!();
    if ready {
        println!("Video export is ready.");
    } else {
        println!("Some prerequisites are missing. See above for fixes.");
    }

    Ok(())
}
