use super::VideoReader;
use anyhow::{anyhow, Context, Result};
use opencv::core::{self, Mat, Scalar};
use opencv::prelude::*;
use std::path::Path;

use ffmpeg_next::ffi;
use ffmpeg_next::software::scaling;
use ffmpeg_next::util::frame::Video as VideoFrame;

/// Video reader backed by FFmpeg via ffmpeg-next.
///
/// Seeking lands on the keyframe at or before the requested frame and then
/// decodes forward, dropping frames until the presentation timestamp reaches
/// the target. This gives frame-accurate reads even for long-GOP sources
/// where container-level seeking is only keyframe-accurate.
pub struct FfmpegReader {
    input_ctx: ffmpeg_next::format::context::Input,
    decoder: ffmpeg_next::codec::decoder::Video,
    video_stream_index: usize,
    /// Lazily created on first frame (source format is only known then).
    scaler: Option<scaling::Context>,
    time_base: f64,
    start_pts: i64,
    source_fps: f64,
    total_frames: usize,
    /// Frame the next `read_frame` should return after a seek.
    pending_target: Option<usize>,
    packet: ffmpeg_next::codec::packet::Packet,
    eof_sent: bool,
}

impl FfmpegReader {
    pub fn new(path: &Path) -> Result<Self> {
        ffmpeg_next::init().context("Failed to initialize FFmpeg")?;

        if !path.exists() {
            return Err(anyhow!("Video file not found: {}", path.display()));
        }

        let input_ctx = ffmpeg_next::format::input(&path)
            .with_context(|| format!("Failed to open video file {}", path.display()))?;

        let video_stream = input_ctx
            .streams()
            .best(ffmpeg_next::media::Type::Video)
            .ok_or_else(|| anyhow!("No video stream found in {}", path.display()))?;

        let video_stream_index = video_stream.index();

        let rational_fps = video_stream.avg_frame_rate();
        let source_fps = if rational_fps.numerator() > 0 && rational_fps.denominator() > 0 {
            rational_fps.numerator() as f64 / rational_fps.denominator() as f64
        } else {
            tracing::warn!("FfmpegReader: could not determine FPS, defaulting to 30.0");
            30.0
        };

        let rational_tb = video_stream.time_base();
        let time_base = if rational_tb.denominator() > 0 {
            rational_tb.numerator() as f64 / rational_tb.denominator() as f64
        } else {
            1.0 / ffi::AV_TIME_BASE as f64
        };

        let start_pts = if video_stream.start_time() == ffi::AV_NOPTS_VALUE {
            0
        } else {
            video_stream.start_time()
        };

        let stream_frames = video_stream.frames().max(0) as usize;
        let duration_secs = input_ctx.duration().max(0) as f64 / ffi::AV_TIME_BASE as f64;
        let total_frames = if stream_frames == 0 {
            (duration_secs * source_fps).round() as usize
        } else {
            stream_frames
        };

        let decoder = ffmpeg_next::codec::context::Context::from_parameters(
            video_stream.parameters(),
        )
        .context("Failed to create decoder context")?
        .decoder()
        .video()
        .context("Failed to open video decoder")?;

        tracing::debug!(
            "FfmpegReader: opened {}, duration={:.2}s, fps={:.2}, stream_frames={}, estimated_total={}, size={}x{}",
            path.display(),
            duration_secs,
            source_fps,
            stream_frames,
            total_frames,
            decoder.width(),
            decoder.height()
        );

        Ok(Self {
            input_ctx,
            decoder,
            video_stream_index,
            scaler: None,
            time_base,
            start_pts,
            source_fps,
            total_frames,
            pending_target: None,
            packet: ffmpeg_next::codec::packet::Packet::empty(),
            eof_sent: false,
        })
    }

    /// Frame index of a presentation timestamp expressed in stream time base.
    fn frame_index_of(&self, pts: i64) -> usize {
        let secs = (pts - self.start_pts) as f64 * self.time_base;
        (secs * self.source_fps).round().max(0.0) as usize
    }

    /// Pull the next decoded frame, feeding packets until one is available.
    fn decode_next(&mut self, target_frame: &mut VideoFrame) -> Result<()> {
        loop {
            match self.decoder.receive_frame(target_frame) {
                Ok(()) => return Ok(()),
                Err(ffmpeg_next::Error::Other { errno: ffi::EAGAIN }) => {
                    if self.eof_sent {
                        return Err(anyhow!("End of stream"));
                    }
                }
                Err(ffmpeg_next::Error::Eof) => {
                    return Err(anyhow!("End of stream"));
                }
                Err(e) => return Err(anyhow!("Decoder error: {}", e)),
            }

            let mut found_packet = false;
            while self.packet.read(&mut self.input_ctx).is_ok() {
                if self.packet.stream() == self.video_stream_index {
                    self.decoder
                        .send_packet(&self.packet)
                        .context("Failed to send packet to decoder")?;
                    found_packet = true;
                    break;
                }
            }

            if !found_packet {
                // Input exhausted; flush whatever the decoder still buffers
                self.decoder
                    .send_eof()
                    .context("Failed to send EOF to decoder")?;
                self.eof_sent = true;
            }
        }
    }

    fn to_bgr(&mut self, frame: &VideoFrame) -> Result<VideoFrame> {
        let needs_new = match &self.scaler {
            Some(scaler) => {
                scaler.input().format != frame.format()
                    || scaler.input().width != frame.width()
                    || scaler.input().height != frame.height()
            }
            None => true,
        };
        if needs_new {
            self.scaler = Some(
                scaling::Context::get(
                    frame.format(),
                    frame.width(),
                    frame.height(),
                    ffmpeg_next::format::Pixel::BGR24,
                    frame.width(),
                    frame.height(),
                    scaling::Flags::BILINEAR,
                )
                .context("Failed to create scaler")?,
            );
        }

        let scaler = self
            .scaler
            .as_mut()
            .ok_or_else(|| anyhow!("Scaler not initialized"))?;
        let mut bgr = VideoFrame::empty();
        scaler.run(frame, &mut bgr).context("Scaler failed")?;
        Ok(bgr)
    }
}

/// Copy a BGR24 ffmpeg frame into an owned OpenCV Mat, dropping row padding.
/// What `read_frame` does with a decoded frame while a seek is pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SeekStep {
    /// Still before the target.
    Skip,
    Accept,
    /// No timestamp to compare against the target.
    AcceptUnverified(usize),
}

fn seek_step(pending_target: Option<usize>, frame_index: Option<usize>) -> SeekStep {
    match (pending_target, frame_index) {
        (Some(target), Some(index)) if index < target => SeekStep::Skip,
        (Some(target), None) => SeekStep::AcceptUnverified(target),
        _ => SeekStep::Accept,
    }
}

fn bgr_frame_to_mat(frame: &VideoFrame) -> Result<Mat> {
    let width = frame.width() as usize;
    let height = frame.height() as usize;
    let row_bytes = width * 3;
    let data = frame.data(0);
    let stride = frame.stride(0);

    let mut mat = Mat::new_rows_cols_with_default(
        height as i32,
        width as i32,
        core::CV_8UC3,
        Scalar::all(0.0),
    )?;
    let dst = mat.data_bytes_mut()?;

    for y in 0..height {
        let src_row = &data[y * stride..y * stride + row_bytes];
        dst[y * row_bytes..(y + 1) * row_bytes].copy_from_slice(src_row);
    }

    Ok(mat)
}

impl VideoReader for FfmpegReader {
    fn frame_count(&self) -> Result<usize> {
        Ok(self.total_frames)
    }

    fn source_fps(&self) -> Result<f64> {
        Ok(self.source_fps)
    }

    fn seek_to_frame(&mut self, frame_num: usize) -> Result<()> {
        let secs = frame_num as f64 / self.source_fps + self.start_pts as f64 * self.time_base;
        let timestamp = (secs * ffi::AV_TIME_BASE as f64) as i64;
        self.input_ctx
            .seek(timestamp, ..timestamp)
            .with_context(|| format!("Failed to seek to frame {}", frame_num))?;
        self.decoder.flush();
        self.eof_sent = false;
        self.pending_target = Some(frame_num);
        Ok(())
    }

    fn read_frame(&mut self) -> Result<Mat> {
        let mut raw = VideoFrame::empty();
        loop {
            self.decode_next(&mut raw)?;
            let index = raw.timestamp().map(|pts| self.frame_index_of(pts));
            match seek_step(self.pending_target, index) {
                SeekStep::Skip => continue,
                SeekStep::Accept => break,
                SeekStep::AcceptUnverified(target) => {
                    tracing::warn!(
                        "FfmpegReader: decoded frame has no timestamp after seeking to frame {}, \
                         returning the keyframe position instead",
                        target
                    );
                    break;
                }
            }
        }
        self.pending_target = None;

        let bgr = self.to_bgr(&raw)?;
        bgr_frame_to_mat(&bgr)
    }
}
