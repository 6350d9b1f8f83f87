//! Streaming pipeline behaviour against the synthetic backend.

mod support;

use std::sync::Arc;

use shotcraft_common::{ShotcraftError, VideoEncodeSettings};
use shotcraft_project_model::Screen;
use shotcraft_render_engine::pipeline::{run_pipeline, temp_path, PipelineState};
use shotcraft_render_engine::progress::CancellationFlag;

use support::{files_under, job_for, scratch_dir, tiny_device, write_clip, ClipSpec, SinkRecord, SyntheticBackend};

fn settings() -> VideoEncodeSettings {
    VideoEncodeSettings {
        channel_capacity: 2,
        ..VideoEncodeSettings::default()
    }
}

#[tokio::test]
async fn test_non_increasing_pts_are_dropped() {
    let dir = scratch_dir("pts_guard");
    let source = write_clip(
        &dir,
        "clip.json",
        &ClipSpec {
            pts: vec![0, 20, 20, 40, 30, 60],
            ..ClipSpec::default()
        },
    );
    let dest = dir.join("out.mp4");
    let job = job_for(&Screen::new("Home"), &tiny_device(), &source, &dest);

    let report = run_pipeline(
        Arc::new(SyntheticBackend),
        job,
        &settings(),
        CancellationFlag::new(),
        |_, _| {},
    )
    .await
    .unwrap();

    assert_eq!(report.state, PipelineState::Completed);
    assert_eq!(report.frames_written, 4);
    assert_eq!(report.frames_dropped, 2);

    let record = SinkRecord::read(&dest);
    assert_eq!(record.video_pts, vec![0, 20, 40, 60]);
    assert!(record.video_pts.windows(2).all(|w| w[0] < w[1]));
    assert_eq!((record.width, record.height), (60, 120));
    assert!(record.video_finished);
    assert!(!temp_path(&dest).exists());
}

#[tokio::test]
async fn test_audio_is_passed_through_in_order() {
    let dir = scratch_dir("audio_passthrough");
    let source = write_clip(
        &dir,
        "clip.json",
        &ClipSpec {
            audio_packets: 50,
            ..ClipSpec::default()
        },
    );
    let dest = dir.join("out.mp4");
    let job = job_for(&Screen::new("Home"), &tiny_device(), &source, &dest);

    let report = run_pipeline(
        Arc::new(SyntheticBackend),
        job,
        &settings(),
        CancellationFlag::new(),
        |_, _| {},
    )
    .await
    .unwrap();

    assert_eq!(report.audio_packets, 50);
    let record = SinkRecord::read(&dest);
    assert!(record.with_audio);
    assert_eq!(record.audio, (0..50).collect::<Vec<u32>>());
    assert_eq!(record.video_pts.len(), 4);
}

#[tokio::test]
async fn test_short_audio_does_not_truncate_video() {
    let dir = scratch_dir("short_audio");
    let source = write_clip(
        &dir,
        "clip.json",
        &ClipSpec {
            pts: (0..30).map(|i| i * 20).collect(),
            audio_packets: 1,
            ..ClipSpec::default()
        },
    );
    let dest = dir.join("out.mp4");
    let job = job_for(&Screen::new("Home"), &tiny_device(), &source, &dest);

    run_pipeline(
        Arc::new(SyntheticBackend),
        job,
        &settings(),
        CancellationFlag::new(),
        |_, _| {},
    )
    .await
    .unwrap();

    let record = SinkRecord::read(&dest);
    assert_eq!(record.video_pts.len(), 30);
    assert_eq!(record.audio, vec![0]);
}

#[tokio::test]
async fn test_frame_progress_is_reported() {
    let dir = scratch_dir("frame_progress");
    let source = write_clip(&dir, "clip.json", &ClipSpec::default());
    let dest = dir.join("out.mp4");
    let job = job_for(&Screen::new("Home"), &tiny_device(), &source, &dest);

    let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    run_pipeline(
        Arc::new(SyntheticBackend),
        job,
        &settings(),
        CancellationFlag::new(),
        move |done, total| sink.lock().unwrap().push((done, total)),
    )
    .await
    .unwrap();

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 4);
    assert_eq!(seen.last().unwrap().0, 4);
    assert!(seen.iter().all(|&(done, total)| done <= total));
}

#[tokio::test]
async fn test_missing_video_track_fails_without_output() {
    let dir = scratch_dir("no_video");
    let source = write_clip(
        &dir,
        "audio_only.json",
        &ClipSpec {
            has_video: false,
            audio_packets: 5,
            ..ClipSpec::default()
        },
    );
    let dest = dir.join("out.mp4");
    let job = job_for(&Screen::new("Home"), &tiny_device(), &source, &dest);

    let err = run_pipeline(
        Arc::new(SyntheticBackend),
        job,
        &settings(),
        CancellationFlag::new(),
        |_, _| {},
    )
    .await
    .unwrap_err();

    assert!(matches!(err, ShotcraftError::NoVideoTrack { .. }));
    assert_eq!(files_under(&dir), vec![source]);
}

#[tokio::test]
async fn test_decode_failure_abandons_output() {
    let dir = scratch_dir("decode_failure");
    let source = write_clip(
        &dir,
        "clip.json",
        &ClipSpec {
            pts: (0..10).map(|i| i * 20).collect(),
            audio_packets: 20,
            fail_at_frame: Some(3),
            ..ClipSpec::default()
        },
    );
    let dest = dir.join("out.mp4");
    let job = job_for(&Screen::new("Home"), &tiny_device(), &source, &dest);

    let err = run_pipeline(
        Arc::new(SyntheticBackend),
        job,
        &settings(),
        CancellationFlag::new(),
        |_, _| {},
    )
    .await
    .unwrap_err();

    assert!(matches!(err, ShotcraftError::Stream { .. }));
    assert!(!dest.exists());
    assert!(!temp_path(&dest).exists());
}

#[tokio::test]
async fn test_cancellation_discards_partial_output() {
    let dir = scratch_dir("cancel_mid_item");
    let source = write_clip(
        &dir,
        "clip.json",
        &ClipSpec {
            pts: (0..100).map(|i| i * 20).collect(),
            ..ClipSpec::default()
        },
    );
    let dest = dir.join("out.mp4");
    let job = job_for(&Screen::new("Home"), &tiny_device(), &source, &dest);

    let cancel = CancellationFlag::new();
    let trigger = cancel.clone();
    let err = run_pipeline(
        Arc::new(SyntheticBackend),
        job,
        &settings(),
        cancel,
        move |done, _| {
            if done == 2 {
                trigger.cancel();
            }
        },
    )
    .await
    .unwrap_err();

    assert!(err.is_cancelled());
    assert!(!dest.exists());
    assert!(!temp_path(&dest).exists());
}

#[tokio::test]
async fn test_reexport_replaces_previous_output() {
    let dir = scratch_dir("reexport");
    let source = write_clip(&dir, "clip.json", &ClipSpec::default());
    let dest = dir.join("out.mp4");
    std::fs::write(&dest, b"stale").unwrap();
    std::fs::write(temp_path(&dest), b"stale partial").unwrap();

    for _ in 0..2 {
        let job = job_for(&Screen::new("Home"), &tiny_device(), &source, &dest);
        run_pipeline(
            Arc::new(SyntheticBackend),
            job,
            &settings(),
            CancellationFlag::new(),
            |_, _| {},
        )
        .await
        .unwrap();
    }

    let record = SinkRecord::read(&dest);
    assert_eq!(record.video_pts, vec![0, 20, 40, 60]);
    assert_eq!(files_under(&dir), vec![source, dest]);
}
