pub mod ffmpeg_reader;
pub mod opencv_reader;

use anyhow::Result;
use clap::ValueEnum;
use opencv::core::Mat;
use std::path::Path;

use ffmpeg_reader::FfmpegReader;
use opencv_reader::OpencvReader;

/// Random-access frame source used by the sync checker.
pub trait VideoReader {
    fn frame_count(&self) -> Result<usize>;
    fn source_fps(&self) -> Result<f64>;
    /// Position the reader so the next `read_frame` returns `frame_num`.
    fn seek_to_frame(&mut self, frame_num: usize) -> Result<()>;
    /// Decode the frame at the current position as a BGR `Mat`.
    fn read_frame(&mut self) -> Result<Mat>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Backend {
    Opencv,
    Ffmpeg,
}

pub fn open_reader(path: &Path, backend: Backend) -> Result<Box<dyn VideoReader>> {
    let reader: Box<dyn VideoReader> = match backend {
        Backend::Opencv => Box::new(OpencvReader::new(path)?),
        Backend::Ffmpeg => Box::new(FfmpegReader::new(path)?),
    };
    Ok(reader)
}
