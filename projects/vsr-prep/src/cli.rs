use crate::checkpoint::{DEFAULT_EXCLUDE, DEFAULT_PARAMS_KEY};
use crate::sync_check::DEFAULT_JPEG_QUALITY;
use crate::video::Backend;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about = "Dataset preparation tools for video super-resolution", long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Render HR/LR side-by-side frames to check temporal alignment
    SyncCheck {
        /// Directory of high-resolution videos
        #[arg(long, env = "VSR_PREP_HR_DIR")]
        hr_dir: PathBuf,

        /// Directory of low-resolution videos
        #[arg(long, env = "VSR_PREP_LR_DIR")]
        lr_dir: PathBuf,

        /// Where comparison images and the report are written
        #[arg(long, env = "VSR_PREP_OUTPUT_DIR")]
        output_dir: PathBuf,

        /// Video decoding backend
        #[arg(long, value_enum, env = "VSR_PREP_BACKEND", default_value_t = Backend::Opencv)]
        backend: Backend,

        /// JPEG quality of the comparison images
        #[arg(long, default_value_t = DEFAULT_JPEG_QUALITY, value_parser = clap::value_parser!(u8).range(1..=100))]
        jpeg_quality: u8,
    },

    /// Rename <video>_frame<N>[_…].png to <video>.<N>.png
    RenameFrames {
        /// Directory containing frames
        #[arg(default_value = ".")]
        dir: PathBuf,

        /// Log the planned renames without touching any file
        #[arg(long)]
        dry_run: bool,
    },

    /// Strip incompatible layers from a checkpoint so it can initialize another model
    AdaptCheckpoint {
        /// Source checkpoint (.pth or .safetensors)
        #[arg(long)]
        input: PathBuf,

        /// Destination checkpoint (.safetensors)
        #[arg(long)]
        output: PathBuf,

        /// Drop every parameter whose name contains this substring (repeatable)
        #[arg(long, default_value = DEFAULT_EXCLUDE)]
        exclude: Vec<String>,

        /// Key the parameter mapping is wrapped under
        #[arg(long, default_value = DEFAULT_PARAMS_KEY)]
        params_key: String,
    },
}

impl Args {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
