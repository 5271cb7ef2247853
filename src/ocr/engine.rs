use anyhow::{anyhow, Result};
use image::GrayImage;
use std::path::Path;
use std::process::Command;
use tempfile::NamedTempFile;

use super::setup::resolve_tesseract;

/// Runs Tesseract on a preprocessed grayscale image and returns the raw
/// recognized text blob. Korean plus English matches the POS UI, which
/// mixes Hangul labels with Latin digits.
pub fn recognize_image(img: &GrayImage, tesseract_path: &str) -> Result<String> {
    let tesseract = resolve_tesseract(tesseract_path)
        .ok_or_else(|| anyhow!("Tesseract executable not found"))?;

    let temp_input = NamedTempFile::with_suffix(".png")?;
    img.save(temp_input.path())?;

    let output = run_tesseract(&tesseract, temp_input.path())?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(anyhow!("Tesseract failed: {}", stderr));
    }

    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}

fn run_tesseract(tesseract: &Path, input: &Path) -> Result<std::process::Output> {
    Ok(Command::new(tesseract)
        .arg(input)
        .arg("stdout")
        .arg("-l")
        .arg("kor+eng")
        .arg("--psm")
        .arg("6") // Assume single uniform block of text
        .output()?)
}
