// Frame renamer
//
// Turns `<video>_frame<digits>[_suffix].png` into `<video>.<digits>.png`,
// the layout the training data loader expects.

use anyhow::{anyhow, Context, Result};
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use walkdir::WalkDir;

lazy_static! {
    static ref FRAME_NAME_RE: Regex =
        Regex::new(r"^(?P<video>.+?)_frame(?P<frame>\d+)(?:_.*)?\.png$")
            .expect("Invalid frame name regex");
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RenameSummary {
    pub renamed: usize,
    /// Target name already taken.
    pub skipped: usize,
    /// Not a frame file, or already renamed.
    pub ignored: usize,
}

/// New name for a frame file, or `None` when the name does not follow the
/// `<video>_frame<digits>` convention.
pub fn target_name(file_name: &str) -> Option<String> {
    let caps = FRAME_NAME_RE.captures(file_name)?;
    Some(format!("{}.{}.png", &caps["video"], &caps["frame"]))
}

/// Rename every frame file directly inside `dir`.
///
/// Existing targets are never overwritten. With `dry_run` the plan is only
/// logged.
pub fn rename_frames(dir: &Path, dry_run: bool) -> Result<RenameSummary> {
    if !dir.is_dir() {
        return Err(anyhow!("Not a directory: {}", dir.display()));
    }

    let mut entries: Vec<_> = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .collect::<std::result::Result<_, _>>()
        .with_context(|| format!("Failed to list {}", dir.display()))?;
    entries.sort_by(|a, b| a.file_name().cmp(b.file_name()));

    let mut summary = RenameSummary::default();
    // Targets claimed by a dry run, which never touches the disk
    let mut planned = HashSet::new();

    for entry in entries {
        if !entry.file_type().is_file() {
            continue;
        }

        let Some(fname) = entry.file_name().to_str() else {
            summary.ignored += 1;
            continue;
        };
        let Some(new_name) = target_name(fname) else {
            summary.ignored += 1;
            continue;
        };

        let dst = dir.join(&new_name);
        if dst.exists() || planned.contains(&new_name) {
            tracing::info!("Skipping {}: {} already exists", fname, new_name);
            summary.skipped += 1;
            continue;
        }

        tracing::info!("Renaming {} → {}", fname, new_name);
        if dry_run {
            planned.insert(new_name);
        } else {
            fs::rename(entry.path(), &dst)
                .with_context(|| format!("Failed to rename {} to {}", fname, new_name))?;
        }
        summary.renamed += 1;
    }

    Ok(summary)
}
