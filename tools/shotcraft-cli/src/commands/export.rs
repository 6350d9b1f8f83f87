//! Batch-export a project.

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::Serialize;

use shotcraft_common::config::AppConfig;
use shotcraft_render_engine::export::{
    sanitize_component, ExportOutcome, ExportRequest, ExportSummary, Exporter, ImageFormat,
    VideoPolicy,
};
use shotcraft_render_engine::fonts::FontLibrary;
use shotcraft_render_engine::progress::ExportProgress;
use shotcraft_render_engine::FfmpegBackend;

use super::{load_project, select_devices};

pub struct ExportArgs {
    pub project: PathBuf,
    pub output: Option<PathBuf>,
    pub format: Option<String>,
    pub posters: bool,
    pub devices: Vec<String>,
    pub languages: Vec<String>,
}

/// Written next to the outputs as `export-report.json`.
#[derive(Serialize)]
struct ExportReport<'a> {
    project: &'a str,
    manifest: &'a PathBuf,
    started_at: DateTime<Utc>,
    finished_at: DateTime<Utc>,
    format: ImageFormat,
    video_policy: VideoPolicy,
    #[serde(flatten)]
    summary: &'a ExportSummary,
}

pub async fn run(args: ExportArgs, config: &AppConfig) -> anyhow::Result<ExitCode> {
    let file = load_project(&args.project)?;
    let devices = select_devices(&file, &args.devices)?;
    let languages = if args.languages.is_empty() {
        file.project.languages.clone()
    } else {
        args.languages
            .iter()
            .map(|code| {
                file.project
                    .language(code)
                    .cloned()
                    .ok_or_else(|| anyhow::anyhow!("Language '{code}' is not part of this project"))
            })
            .collect::<anyhow::Result<Vec<_>>>()?
    };

    let format: ImageFormat = args
        .format
        .as_deref()
        .unwrap_or(config.export.image_format.as_str())
        .parse()?;
    let video_policy = if args.posters {
        VideoPolicy::PosterFrame
    } else {
        VideoPolicy::Stream
    };
    let output_root = args
        .output
        .unwrap_or_else(|| config.output_dir.join(sanitize_component(&file.project.name)));

    println!("Exporting project: {}", file.project.name);
    println!("  Output: {}", output_root.display());
    println!("  Devices: {}", devices.len());
    println!("  Languages: {}", languages.len());
    println!("  Format: {format}");
    if args.posters {
        println!("  Videos: poster frames");
    }

    let backend = Arc::new(FfmpegBackend::new().context("FFmpeg is not available")?);
    let fonts = Arc::new(FontLibrary::new(config.fonts.clone()));
    let exporter = Exporter::new(backend, fonts, config.export.clone());

    let progress = Arc::new(ExportProgress::new());
    let cancel = progress.cancellation();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received; finishing current frame and stopping");
            cancel.cancel();
        }
    });

    let printer = {
        let progress = Arc::clone(&progress);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_millis(250));
            loop {
                ticker.tick().await;
                let snap = progress.snapshot();
                if snap.frames_total > 0 {
                    print!(
                        "\r  [{}/{}] {} ({}/{} frames)        ",
                        snap.completed,
                        snap.total,
                        snap.current_item,
                        snap.frames_completed,
                        snap.frames_total
                    );
                } else {
                    print!("\r  [{}/{}] {}        ", snap.completed, snap.total, snap.current_item);
                }
                let _ = std::io::stdout().flush();
            }
        })
    };

    let request = ExportRequest {
        project: file.project.clone(),
        devices,
        languages,
        output_root: output_root.clone(),
        format,
        video_policy,
    };

    let started_at = Utc::now();
    let summary = exporter.batch_export(&request, Arc::clone(&progress)).await;
    let finished_at = Utc::now();
    printer.abort();
    println!();

    let report = ExportReport {
        project: &file.project.name,
        manifest: &file.path,
        started_at,
        finished_at,
        format,
        video_policy,
        summary: &summary,
    };
    std::fs::create_dir_all(&output_root)
        .with_context(|| format!("Failed to create {}", output_root.display()))?;
    let report_path = output_root.join("export-report.json");
    std::fs::write(&report_path, serde_json::to_string_pretty(&report)?)
        .with_context(|| format!("Failed to write {}", report_path.display()))?;

    for error in &summary.errors {
        println!("  [FAIL] {error}");
    }
    let elapsed = (finished_at - started_at).num_milliseconds() as f64 / 1000.0;
    match summary.outcome {
        ExportOutcome::Succeeded => {
            println!(
                "Export complete: {} files in {elapsed:.1}s ({})",
                summary.outputs.len(),
                output_root.display()
            );
            Ok(ExitCode::SUCCESS)
        }
        ExportOutcome::PartiallyFailed => {
            println!(
                "Export finished with {} error(s): {} of {} files written",
                summary.errors.len(),
                summary.outputs.len(),
                summary.total
            );
            Ok(ExitCode::from(2))
        }
        ExportOutcome::Cancelled => {
            println!(
                "Export cancelled after {} of {} items",
                summary.completed, summary.total
            );
            Ok(ExitCode::from(130))
        }
    }
}
