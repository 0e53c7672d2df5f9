use crate::sync_check::sampling::SamplePoint;
use anyhow::{anyhow, Result};
use opencv::core::{self, Mat, Point, Scalar, Size, Vector};
use opencv::prelude::*;
use opencv::{imgcodecs, imgproc};
use std::path::Path;

const LABEL_ORIGIN: (i32, i32) = (10, 30);
const LABEL_SCALE: f64 = 1.0;
const LABEL_THICKNESS: i32 = 2;

pub fn comparison_label(pair_index: usize, point: &SamplePoint) -> String {
    format!(
        "Pair {}, {} frame (#{}): HR (left) vs LR (right)",
        pair_index, point.position, point.frame_index
    )
}

pub fn output_file_name(pair_index: usize, point: &SamplePoint) -> String {
    format!(
        "pair{:02}_{}_frame{:06}.jpg",
        pair_index, point.position, point.frame_index
    )
}

/// HR on the left, LR upscaled to the HR size on the right, label on top.
pub fn compose_comparison(hr: &Mat, lr: &Mat, label: &str) -> Result<Mat> {
    let hr_size = hr.size()?;
    if hr_size.width <= 0 || hr_size.height <= 0 {
        anyhow::bail!("HR frame is empty");
    }

    let lr_resized = if lr.size()? == hr_size {
        lr.clone()
    } else {
        let mut resized = Mat::default();
        imgproc::resize(
            lr,
            &mut resized,
            Size::new(hr_size.width, hr_size.height),
            0.0,
            0.0,
            imgproc::INTER_LINEAR,
        )?;
        resized
    };

    let mut comparison = Mat::default();
    core::hconcat2(hr, &lr_resized, &mut comparison)?;

    imgproc::put_text(
        &mut comparison,
        label,
        Point::new(LABEL_ORIGIN.0, LABEL_ORIGIN.1),
        imgproc::FONT_HERSHEY_SIMPLEX,
        LABEL_SCALE,
        Scalar::new(0.0, 255.0, 0.0, 0.0), // Green
        LABEL_THICKNESS,
        imgproc::LINE_AA,
        false,
    )?;

    Ok(comparison)
}

pub fn write_jpeg(path: &Path, image: &Mat, quality: u8) -> Result<()> {
    let path_str = path
        .to_str()
        .ok_or_else(|| anyhow!("Output path is not valid UTF-8: {}", path.display()))?;

    let mut params = Vector::<i32>::new();
    params.push(imgcodecs::IMWRITE_JPEG_QUALITY);
    params.push(i32::from(quality.min(100)));

    if !imgcodecs::imwrite(path_str, image, &params)? {
        return Err(anyhow!("Encoder rejected {}", path.display()));
    }
    Ok(())
}
