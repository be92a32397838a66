use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Context;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde_json::json;

use termsnap::{
    CaptureArchiveExpander, FileSystem, ImageExpander, MemoryFileSystem, PeriodicJob,
    RenderOptions, ScreenRenderer,
};

const ARCHIVE: &str = "/U423/zos3270/terminals/term1/term1-1.gz";

fn one_screen_archive() -> Vec<u8> {
    let capture = json!({
        "id": "term1",
        "images": [{
            "id": "term1-1",
            "sequence": 1,
            "inbound": true,
            "imageSize": { "rows": 24, "columns": 80 },
            "cursorRow": 0,
            "cursorColumn": 0,
            "fields": [{
                "row": 5,
                "column": 10,
                "contents": [{ "chars": ["R", "E", "A", "D", "Y"] }],
                "foregroundColour": "y"
            }]
        }]
    });
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(&serde_json::to_vec(&capture).unwrap())
        .unwrap();
    encoder.finish().unwrap()
}

fn watched_expander() -> (Arc<MemoryFileSystem>, Arc<CaptureArchiveExpander>) {
    let fs = Arc::new(MemoryFileSystem::new());
    fs.mkdir_all(Path::new("/U423")).unwrap();
    let renderer = Arc::new(ScreenRenderer::builtin(RenderOptions::default()));
    let expander = Arc::new(CaptureArchiveExpander::new(fs.clone(), renderer, false));
    (fs, expander)
}

fn expansion_job(expander: &Arc<CaptureArchiveExpander>, interval: Duration) -> PeriodicJob {
    let expander = Arc::clone(expander);
    PeriodicJob::new("image-expander", interval, move || {
        expander
            .expand_images(Path::new("/U423"))
            .context("expansion pass failed")
    })
}

#[test]
fn final_pass_on_stop_picks_up_late_archives() {
    let (fs, expander) = watched_expander();
    let job = expansion_job(&expander, Duration::from_secs(60));
    job.start().unwrap();

    fs.write_binary_file(Path::new(ARCHIVE), &one_screen_archive())
        .unwrap();
    assert_eq!(expander.expanded_image_file_count(), 0);

    job.stop();
    assert_eq!(expander.expanded_image_file_count(), 1);
    assert!(fs.exists(Path::new("/U423/zos3270/images/term1/term1-00001.png")));

    job.stop();
    assert_eq!(expander.expanded_image_file_count(), 1);
}

#[test]
fn ticks_expand_archives_while_running() {
    let (fs, expander) = watched_expander();
    let job = expansion_job(&expander, Duration::from_millis(20));
    job.start().unwrap();
    fs.write_binary_file(Path::new(ARCHIVE), &one_screen_archive())
        .unwrap();

    let deadline = Instant::now() + Duration::from_secs(10);
    while expander.expanded_image_file_count() == 0 && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(10));
    }
    assert_eq!(expander.expanded_image_file_count(), 1);

    // Later passes find the image already written.
    job.stop();
    assert_eq!(expander.expanded_image_file_count(), 1);
}

#[test]
fn failing_passes_do_not_stop_the_job() {
    let attempts = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&attempts);
    let (fs, expander) = watched_expander();
    fs.write_binary_file(Path::new(ARCHIVE), b"not gzip").unwrap();

    let job_expander = Arc::clone(&expander);
    let job = PeriodicJob::new("image-expander", Duration::from_millis(10), move || {
        counter.fetch_add(1, Ordering::SeqCst);
        job_expander
            .expand_images(Path::new("/U423"))
            .context("expansion pass failed")
    });
    job.start().unwrap();

    let deadline = Instant::now() + Duration::from_secs(10);
    while attempts.load(Ordering::SeqCst) < 3 && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(10));
    }
    assert!(job.is_running());
    job.stop();
    assert!(attempts.load(Ordering::SeqCst) >= 4);
}
