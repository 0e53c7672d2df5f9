use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

const VIDEO_EXTENSIONS: [&str; 3] = ["mov", "mp4", "avi"];

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PairingMode {
    /// Files with identical names in both directories.
    ByName,
    /// Sorted listings zipped positionally. Only used when no name matches.
    ByIndex,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoPair {
    pub hr: PathBuf,
    pub lr: PathBuf,
}

/// Video files directly inside `dir`, sorted by file name.
pub fn list_videos(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(anyhow!("Not a directory: {}", dir.display()));
    }

    let mut videos: Vec<PathBuf> = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| {
            e.path()
                .extension()
                .and_then(|s| s.to_str())
                .map(|s| VIDEO_EXTENSIONS.contains(&s.to_lowercase().as_str()))
                .unwrap_or(false)
        })
        .map(|e| e.path().to_path_buf())
        .collect();

    videos.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(videos)
}

fn file_names(paths: &[PathBuf]) -> BTreeSet<&str> {
    paths
        .iter()
        .filter_map(|p| p.file_name().and_then(|s| s.to_str()))
        .collect()
}

/// Pair already-sorted HR and LR listings.
pub fn pair_listings(
    hr_dir: &Path,
    lr_dir: &Path,
    hr_files: &[PathBuf],
    lr_files: &[PathBuf],
) -> (PairingMode, Vec<VideoPair>) {
    let hr_names = file_names(hr_files);
    let lr_names = file_names(lr_files);
    let common: Vec<&str> = hr_names.intersection(&lr_names).copied().collect();

    if common.is_empty() {
        let pairs = hr_files
            .iter()
            .zip(lr_files.iter())
            .map(|(hr, lr)| VideoPair {
                hr: hr.clone(),
                lr: lr.clone(),
            })
            .collect();
        return (PairingMode::ByIndex, pairs);
    }

    let pairs = common
        .into_iter()
        .map(|name| VideoPair {
            hr: hr_dir.join(name),
            lr: lr_dir.join(name),
        })
        .collect();
    (PairingMode::ByName, pairs)
}

/// Discover and pair the videos of an HR and an LR directory.
pub fn pair_videos(hr_dir: &Path, lr_dir: &Path) -> Result<(PairingMode, Vec<VideoPair>)> {
    let hr_files = list_videos(hr_dir)?;
    let lr_files = list_videos(lr_dir)?;

    tracing::info!(
        "Found {} HR videos and {} LR videos",
        hr_files.len(),
        lr_files.len()
    );

    let (mode, pairs) = pair_listings(hr_dir, lr_dir, &hr_files, &lr_files);
    match mode {
        PairingMode::ByName => tracing::info!("Found {} matching filenames", pairs.len()),
        PairingMode::ByIndex => tracing::warn!(
            "No matching filenames found, pairing {} videos by sorted position",
            pairs.len()
        ),
    }

    Ok((mode, pairs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn touch(dir: &Path, name: &str) {
        fs::write(dir.join(name), b"").unwrap();
    }

    #[test]
    fn test_list_videos_filters_and_sorts() {
        let tmp = tempfile::tempdir().unwrap();
        touch(tmp.path(), "b.mp4");
        touch(tmp.path(), "a.MOV");
        touch(tmp.path(), "c.avi");
        touch(tmp.path(), "notes.txt");
        touch(tmp.path(), "frame.png");
        fs::create_dir(tmp.path().join("d.mp4")).unwrap();

        let names: Vec<String> = list_videos(tmp.path())
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.MOV", "b.mp4", "c.avi"]);
    }

    #[test]
    fn test_list_videos_is_not_recursive() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir(tmp.path().join("nested")).unwrap();
        touch(&tmp.path().join("nested"), "deep.mp4");
        touch(tmp.path(), "top.mp4");

        assert_eq!(list_videos(tmp.path()).unwrap().len(), 1);
    }

    #[test]
    fn test_list_videos_missing_dir() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(list_videos(&tmp.path().join("missing")).is_err());
    }

    #[test]
    fn test_pairs_by_name_when_any_name_matches() {
        let hr = tempfile::tempdir().unwrap();
        let lr = tempfile::tempdir().unwrap();
        for name in ["clip2.mp4", "clip1.mp4", "only_hr.mp4"] {
            touch(hr.path(), name);
        }
        for name in ["clip1.mp4", "clip2.mp4", "only_lr.mov"] {
            touch(lr.path(), name);
        }

        let (mode, pairs) = pair_videos(hr.path(), lr.path()).unwrap();
        assert_eq!(mode, PairingMode::ByName);
        assert_eq!(
            pairs,
            vec![
                VideoPair {
                    hr: hr.path().join("clip1.mp4"),
                    lr: lr.path().join("clip1.mp4"),
                },
                VideoPair {
                    hr: hr.path().join("clip2.mp4"),
                    lr: lr.path().join("clip2.mp4"),
                },
            ]
        );
    }

    #[test]
    fn test_falls_back_to_index_pairing() {
        let hr = tempfile::tempdir().unwrap();
        let lr = tempfile::tempdir().unwrap();
        for name in ["b_2x.mp4", "a_2x.mp4", "c_2x.mp4"] {
            touch(hr.path(), name);
        }
        for name in ["b_1x.mp4", "a_1x.mp4"] {
            touch(lr.path(), name);
        }

        let (mode, pairs) = pair_videos(hr.path(), lr.path()).unwrap();
        assert_eq!(mode, PairingMode::ByIndex);
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0].hr, hr.path().join("a_2x.mp4"));
        assert_eq!(pairs[0].lr, lr.path().join("a_1x.mp4"));
        assert_eq!(pairs[1].hr, hr.path().join("b_2x.mp4"));
        assert_eq!(pairs[1].lr, lr.path().join("b_1x.mp4"));
    }

    #[test]
    fn test_index_pairing_includes_upper_case_extensions() {
        let hr = tempfile::tempdir().unwrap();
        let lr = tempfile::tempdir().unwrap();
        for name in ["b.mp4", "A.MOV", "c.mkv"] {
            touch(hr.path(), name);
        }
        for name in ["x.mp4", "Y.AVI"] {
            touch(lr.path(), name);
        }

        let (mode, pairs) = pair_videos(hr.path(), lr.path()).unwrap();
        assert_eq!(mode, PairingMode::ByIndex);
        assert_eq!(pairs.len(), 2);
        // Byte order: upper case sorts first
        assert_eq!(pairs[0].hr, hr.path().join("A.MOV"));
        assert_eq!(pairs[0].lr, lr.path().join("Y.AVI"));
        assert_eq!(pairs[1].hr, hr.path().join("b.mp4"));
        assert_eq!(pairs[1].lr, lr.path().join("x.mp4"));
    }

    #[test]
    fn test_empty_directories_yield_no_pairs() {
        let hr = tempfile::tempdir().unwrap();
        let lr = tempfile::tempdir().unwrap();

        let (mode, pairs) = pair_videos(hr.path(), lr.path()).unwrap();
        assert_eq!(mode, PairingMode::ByIndex);
        assert!(pairs.is_empty());
    }
}
