// HR/LR synchronization checker
//
// Pairs the videos of two directories, samples the first, middle and last
// frame of each pair, and writes side-by-side comparison JPEGs so temporal
// alignment can be checked by eye.

pub mod compose;
pub mod pairing;
pub mod report;
pub mod sampling;

use crate::video::{open_reader, Backend, VideoReader};
use anyhow::{Context, Result};
use chrono::Utc;
use indicatif::{ProgressBar, ProgressStyle};
use opencv::core::Mat;
use std::fs;
use std::path::{Path, PathBuf};

use compose::{comparison_label, compose_comparison, output_file_name, write_jpeg};
use pairing::{pair_videos, VideoPair};
use report::{write_report, PairReport, SampleOutcome, SyncReport, VideoInfo};
use sampling::{sample_points, SamplePoint};

pub const DEFAULT_JPEG_QUALITY: u8 = 95;

#[derive(Debug, Clone)]
pub struct SyncCheckConfig {
    pub hr_dir: PathBuf,
    pub lr_dir: PathBuf,
    pub output_dir: PathBuf,
    pub backend: Backend,
    pub jpeg_quality: u8,
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn video_info(path: &Path, reader: &dyn VideoReader) -> Result<VideoInfo> {
    Ok(VideoInfo {
        path: path.to_path_buf(),
        frames: reader.frame_count()?,
        fps: reader.source_fps()?,
    })
}

fn read_at(reader: &mut dyn VideoReader, frame_index: usize) -> Result<Mat> {
    reader.seek_to_frame(frame_index)?;
    reader.read_frame()
}

/// Why a sample produced no image.
#[derive(Debug)]
enum SampleError {
    Read(anyhow::Error),
    Compose(anyhow::Error),
    Write(PathBuf, anyhow::Error),
}

impl SampleError {
    fn describe(&self, point: &SamplePoint) -> String {
        match self {
            SampleError::Read(e) => format!(
                "Could not read {} frame (#{}): {:#}",
                point.position, point.frame_index, e
            ),
            SampleError::Compose(e) => format!(
                "Could not compose {} frame (#{}) comparison: {:#}",
                point.position, point.frame_index, e
            ),
            SampleError::Write(path, e) => format!(
                "Could not write {} frame comparison to {}: {:#}",
                point.position,
                path.display(),
                e
            ),
        }
    }
}

/// Render and save one comparison image, returning where it was written.
fn render_sample(
    hr_reader: &mut dyn VideoReader,
    lr_reader: &mut dyn VideoReader,
    point: &SamplePoint,
    pair_index: usize,
    output_dir: &Path,
    jpeg_quality: u8,
) -> std::result::Result<PathBuf, SampleError> {
    let hr_frame = read_at(hr_reader, point.frame_index)
        .context("HR decode failed")
        .map_err(SampleError::Read)?;
    let lr_frame = read_at(lr_reader, point.frame_index)
        .context("LR decode failed")
        .map_err(SampleError::Read)?;

    let label = comparison_label(pair_index, point);
    let comparison =
        compose_comparison(&hr_frame, &lr_frame, &label).map_err(SampleError::Compose)?;

    let output_path = output_dir.join(output_file_name(pair_index, point));
    if let Err(e) = write_jpeg(&output_path, &comparison, jpeg_quality) {
        return Err(SampleError::Write(output_path, e));
    }
    Ok(output_path)
}

/// Sample one HR/LR pair.
///
/// Fails only when either video cannot be opened; per-sample failures are
/// logged and recorded in the returned report.
pub fn check_pair(
    pair: &VideoPair,
    pair_index: usize,
    output_dir: &Path,
    backend: Backend,
    jpeg_quality: u8,
) -> Result<PairReport> {
    let mut hr_reader = open_reader(&pair.hr, backend)
        .with_context(|| format!("Could not open HR video {}", pair.hr.display()))?;
    let mut lr_reader = open_reader(&pair.lr, backend)
        .with_context(|| format!("Could not open LR video {}", pair.lr.display()))?;

    let hr = video_info(&pair.hr, hr_reader.as_ref())?;
    let lr = video_info(&pair.lr, lr_reader.as_ref())?;

    tracing::info!(
        "Pair {}: {} / {}",
        pair_index,
        file_label(&pair.hr),
        file_label(&pair.lr)
    );
    tracing::info!("  HR: {} frames @ {:.3} FPS", hr.frames, hr.fps);
    tracing::info!("  LR: {} frames @ {:.3} FPS", lr.frames, lr.fps);

    let mut warnings = Vec::new();
    if hr.frames != lr.frames {
        warnings.push(format!(
            "frame count mismatch: HR {} vs LR {}",
            hr.frames, lr.frames
        ));
    }
    if (hr.fps - lr.fps).abs() > 1e-3 {
        warnings.push(format!("fps mismatch: HR {:.3} vs LR {:.3}", hr.fps, lr.fps));
    }

    let points = sample_points(hr.frames, lr.frames);
    if points.is_empty() {
        warnings.push("no frames reported by at least one video".to_string());
    }
    for warning in &warnings {
        tracing::warn!("  {}", warning);
    }

    let mut samples = Vec::with_capacity(points.len());
    for point in &points {
        match render_sample(
            hr_reader.as_mut(),
            lr_reader.as_mut(),
            point,
            pair_index,
            output_dir,
            jpeg_quality,
        ) {
            Ok(path) => {
                tracing::info!(
                    "  Saved {} frame comparison to {}",
                    point.position,
                    path.display()
                );
                samples.push(SampleOutcome::written(point, path));
            }
            Err(e) => {
                let reason = e.describe(point);
                tracing::warn!("  {}", reason);
                samples.push(SampleOutcome::skipped(point, reason));
            }
        }
    }

    Ok(PairReport {
        hr_path: pair.hr.clone(),
        lr_path: pair.lr.clone(),
        pair_index: Some(pair_index),
        hr: Some(hr),
        lr: Some(lr),
        samples,
        warnings,
        error: None,
    })
}

/// Check every pair found in the configured directories.
pub fn check_all_pairs(config: &SyncCheckConfig) -> Result<SyncReport> {
    fs::create_dir_all(&config.output_dir).with_context(|| {
        format!(
            "Failed to create output directory {}",
            config.output_dir.display()
        )
    })?;

    let (pairing_mode, pairs) = pair_videos(&config.hr_dir, &config.lr_dir)?;

    let pb = ProgressBar::new(pairs.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} pairs ({eta})")?
            .progress_chars("#>-"),
    );

    let mut pair_reports = Vec::with_capacity(pairs.len());
    let mut pair_count = 0;
    for pair in &pairs {
        // Skipped pairs do not consume an index
        let result = pb.suspend(|| {
            check_pair(
                pair,
                pair_count,
                &config.output_dir,
                config.backend,
                config.jpeg_quality,
            )
        });
        match result {
            Ok(report) => {
                pair_count += 1;
                pair_reports.push(report);
            }
            Err(e) => {
                tracing::warn!(
                    "Could not open video pair: {}, {}: {:#}",
                    pair.hr.display(),
                    pair.lr.display(),
                    e
                );
                pair_reports.push(PairReport::failed(&pair.hr, &pair.lr, format!("{:#}", e)));
            }
        }
        pb.inc(1);
    }
    pb.finish_and_clear();

    let report = SyncReport {
        created_at: Utc::now(),
        hr_dir: config.hr_dir.clone(),
        lr_dir: config.lr_dir.clone(),
        output_dir: config.output_dir.clone(),
        pairing_mode,
        pairs: pair_reports,
    };
    let report_path = write_report(&config.output_dir, &report)?;

    tracing::info!("Processed {} video pairs", report.processed_pairs());
    tracing::info!("Report written to {}", report_path.display());

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use opencv::core::{self, Scalar, Size, Vec3b};
    use opencv::prelude::*;
    use opencv::{imgcodecs, videoio};
    use pairing::PairingMode;

    fn write_clip(path: &Path, width: i32, height: i32, frames: usize) {
        let fourcc = videoio::VideoWriter::fourcc('M', 'J', 'P', 'G').unwrap();
        let mut writer = videoio::VideoWriter::new(
            path.to_str().unwrap(),
            fourcc,
            10.0,
            Size::new(width, height),
            true,
        )
        .unwrap();
        assert!(writer.is_opened().unwrap());

        for i in 0..frames {
            let frame = Mat::new_rows_cols_with_default(
                height,
                width,
                core::CV_8UC3,
                Scalar::all((i * 20) as f64),
            )
            .unwrap();
            writer.write(&frame).unwrap();
        }
        writer.release().unwrap();
    }

    fn config(hr: &Path, lr: &Path, out: &Path, backend: Backend) -> SyncCheckConfig {
        SyncCheckConfig {
            hr_dir: hr.to_path_buf(),
            lr_dir: lr.to_path_buf(),
            output_dir: out.to_path_buf(),
            backend,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
        }
    }

    /// Mean of the B, G, R channels at (`row`, `col`).
    fn gray_at(img: &Mat, row: i32, col: i32) -> i32 {
        let px = img.at_2d::<Vec3b>(row, col).unwrap();
        (px[0] as i32 + px[1] as i32 + px[2] as i32) / 3
    }

    /// Clips whose frame `i` is a flat gray of `i * 20`, sampled end to end.
    fn assert_pair_sampled(backend: Backend) {
        let hr = tempfile::tempdir().unwrap();
        let lr = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();

        // Tall enough that the bottom rows sit well clear of the label
        write_clip(&hr.path().join("clip.avi"), 64, 96, 9);
        write_clip(&lr.path().join("clip.avi"), 32, 48, 7);

        let report = check_all_pairs(&config(hr.path(), lr.path(), out.path(), backend)).unwrap();
        assert_eq!(report.pairing_mode, PairingMode::ByName);
        assert_eq!(report.processed_pairs(), 1);
        assert_eq!(report.written_images(), 3);

        // min(9, 7) = 7 -> 0, 3, 6
        for (name, level) in [
            ("pair00_first_frame000000.jpg", 0),
            ("pair00_middle_frame000003.jpg", 60),
            ("pair00_last_frame000006.jpg", 120),
        ] {
            let path = out.path().join(name);
            assert!(path.exists(), "missing {}", name);
            let img =
                imgcodecs::imread(path.to_str().unwrap(), imgcodecs::IMREAD_COLOR).unwrap();
            assert_eq!(img.size().unwrap(), Size::new(128, 96));

            // Below the label, one point in each half
            let hr_level = gray_at(&img, 84, 20);
            let lr_level = gray_at(&img, 84, 100);
            assert!(
                (hr_level - level).abs() <= 12,
                "{}: HR half is {}, expected about {}",
                name,
                hr_level,
                level
            );
            assert!(
                (lr_level - level).abs() <= 12,
                "{}: LR half is {}, expected about {}",
                name,
                lr_level,
                level
            );
        }

        assert!(out.path().join(report::REPORT_FILE_NAME).exists());
        assert_eq!(report.pairs[0].warnings.len(), 1);
    }

    #[test]
    fn test_three_images_per_pair() {
        assert_pair_sampled(Backend::Opencv);
    }

    #[test]
    fn test_three_images_per_pair_ffmpeg() {
        assert_pair_sampled(Backend::Ffmpeg);
    }

    struct FailingReader;

    impl VideoReader for FailingReader {
        fn frame_count(&self) -> Result<usize> {
            Ok(10)
        }
        fn source_fps(&self) -> Result<f64> {
            Ok(25.0)
        }
        fn seek_to_frame(&mut self, _frame_num: usize) -> Result<()> {
            Ok(())
        }
        fn read_frame(&mut self) -> Result<Mat> {
            Err(anyhow::anyhow!("corrupt packet"))
        }
    }

    #[test]
    fn test_decode_failure_is_reported_as_read() {
        let out = tempfile::tempdir().unwrap();
        let point = SamplePoint {
            position: sampling::SamplePosition::Middle,
            frame_index: 5,
        };

        let err = render_sample(
            &mut FailingReader,
            &mut FailingReader,
            &point,
            0,
            out.path(),
            DEFAULT_JPEG_QUALITY,
        )
        .unwrap_err();
        assert!(matches!(err, SampleError::Read(_)));
        let reason = err.describe(&point);
        assert!(reason.starts_with("Could not read middle frame (#5)"), "{}", reason);
        assert!(reason.contains("corrupt packet"), "{}", reason);
    }

    #[test]
    fn test_write_failure_is_reported_as_write() {
        let hr = tempfile::tempdir().unwrap();
        let lr = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        write_clip(&hr.path().join("clip.avi"), 32, 24, 4);
        write_clip(&lr.path().join("clip.avi"), 16, 12, 4);

        let pair = VideoPair {
            hr: hr.path().join("clip.avi"),
            lr: lr.path().join("clip.avi"),
        };
        // Output directory never created
        let missing = out.path().join("missing");
        let report = check_pair(&pair, 0, &missing, Backend::Opencv, DEFAULT_JPEG_QUALITY).unwrap();

        assert_eq!(report.written_images(), 0);
        assert_eq!(report.samples.len(), 3);
        for sample in &report.samples {
            let reason = sample.error.as_deref().unwrap();
            assert!(reason.starts_with("Could not write"), "{}", reason);
        }
    }

    #[test]
    fn test_unreadable_pair_is_skipped_without_consuming_index() {
        let hr = tempfile::tempdir().unwrap();
        let lr = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();

        // Sorts before "clip.avi"
        fs::write(hr.path().join("broken.mp4"), b"not a video").unwrap();
        fs::write(lr.path().join("broken.mp4"), b"not a video").unwrap();
        write_clip(&hr.path().join("clip.avi"), 32, 24, 4);
        write_clip(&lr.path().join("clip.avi"), 16, 12, 4);

        let report = check_all_pairs(&config(hr.path(), lr.path(), out.path(), Backend::Opencv)).unwrap();
        assert_eq!(report.pairs.len(), 2);
        assert_eq!(report.skipped_pairs(), 1);
        assert!(report.pairs[0].error.is_some());
        assert_eq!(report.pairs[1].pair_index, Some(0));
        assert!(out.path().join("pair00_first_frame000000.jpg").exists());
        assert!(out.path().join("pair00_middle_frame000002.jpg").exists());
        assert!(out.path().join("pair00_last_frame000003.jpg").exists());
    }

    #[test]
    fn test_missing_input_dir_is_an_error() {
        let lr = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let missing = out.path().join("nope");

        assert!(check_all_pairs(&config(&missing, lr.path(), out.path(), Backend::Opencv)).is_err());
    }
}
