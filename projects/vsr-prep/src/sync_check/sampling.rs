use serde::{Deserialize, Serialize};
use std::fmt;

/// Where in the clip a sample is taken.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SamplePosition {
    First,
    Middle,
    Last,
}

impl SamplePosition {
    pub fn as_str(&self) -> &'static str {
        match self {
            SamplePosition::First => "first",
            SamplePosition::Middle => "middle",
            SamplePosition::Last => "last",
        }
    }
}

impl fmt::Display for SamplePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplePoint {
    pub position: SamplePosition,
    pub frame_index: usize,
}

/// First, middle and last frame of the shorter clip.
///
/// Indices are taken from `min(hr_frames, lr_frames)` so every point is in
/// bounds for both videos. Returns nothing when either clip reports no frames.
pub fn sample_points(hr_frames: usize, lr_frames: usize) -> Vec<SamplePoint> {
    let shortest = hr_frames.min(lr_frames);
    if shortest == 0 {
        return Vec::new();
    }

    vec![
        SamplePoint {
            position: SamplePosition::First,
            frame_index: 0,
        },
        SamplePoint {
            position: SamplePosition::Middle,
            frame_index: shortest / 2,
        },
        SamplePoint {
            position: SamplePosition::Last,
            frame_index: shortest - 1,
        },
    ]
}
