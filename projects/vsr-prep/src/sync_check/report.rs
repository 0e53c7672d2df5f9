// Sync check report
//
// Persisted as sync_report.json in the output directory so a run can be
// audited after the console output is gone.

use crate::sync_check::pairing::PairingMode;
use crate::sync_check::sampling::{SamplePoint, SamplePosition};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const REPORT_FILE_NAME: &str = "sync_report.json";

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SampleOutcome {
    pub position: SamplePosition,
    pub frame_index: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SampleOutcome {
    pub fn written(point: &SamplePoint, output: PathBuf) -> Self {
        Self {
            position: point.position,
            frame_index: point.frame_index,
            output: Some(output),
            error: None,
        }
    }

    pub fn skipped(point: &SamplePoint, error: String) -> Self {
        Self {
            position: point.position,
            frame_index: point.frame_index,
            output: None,
            error: Some(error),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct VideoInfo {
    pub path: PathBuf,
    pub frames: usize,
    pub fps: f64,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct PairReport {
    pub hr_path: PathBuf,
    pub lr_path: PathBuf,
    /// Index used in output names; absent when the pair could not be opened.
    #[serde(default)]
    pub pair_index: Option<usize>,
    #[serde(default)]
    pub hr: Option<VideoInfo>,
    #[serde(default)]
    pub lr: Option<VideoInfo>,
    #[serde(default)]
    pub samples: Vec<SampleOutcome>,
    #[serde(default)]
    pub warnings: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PairReport {
    pub fn failed(hr_path: &Path, lr_path: &Path, error: String) -> Self {
        Self {
            hr_path: hr_path.to_path_buf(),
            lr_path: lr_path.to_path_buf(),
            pair_index: None,
            hr: None,
            lr: None,
            samples: Vec::new(),
            warnings: Vec::new(),
            error: Some(error),
        }
    }

    pub fn written_images(&self) -> usize {
        self.samples.iter().filter(|s| s.output.is_some()).count()
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SyncReport {
    pub created_at: DateTime<Utc>,
    pub hr_dir: PathBuf,
    pub lr_dir: PathBuf,
    pub output_dir: PathBuf,
    pub pairing_mode: PairingMode,
    pub pairs: Vec<PairReport>,
}

impl SyncReport {
    pub fn processed_pairs(&self) -> usize {
        self.pairs.iter().filter(|p| p.pair_index.is_some()).count()
    }

    pub fn skipped_pairs(&self) -> usize {
        self.pairs.len() - self.processed_pairs()
    }

    pub fn written_images(&self) -> usize {
        self.pairs.iter().map(PairReport::written_images).sum()
    }

    pub fn skipped_samples(&self) -> usize {
        self.pairs
            .iter()
            .flat_map(|p| &p.samples)
            .filter(|s| s.error.is_some())
            .count()
    }
}

pub fn write_report(output_dir: &Path, report: &SyncReport) -> Result<PathBuf> {
    let path = output_dir.join(REPORT_FILE_NAME);
    let content = serde_json::to_string_pretty(report)?;
    fs::write(&path, content).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(path)
}
