use std::path::{Path, PathBuf};
use std::process::Command;

use crate::errors::MonitorError;
use crate::log;

/// Resolves the Tesseract executable: the configured path if it exists,
/// otherwise `tesseract` on PATH.
pub fn resolve_tesseract(configured: &str) -> Option<PathBuf> {
    if !configured.is_empty() && Path::new(configured).exists() {
        return Some(PathBuf::from(configured));
    }
    let candidate = PathBuf::from("tesseract");
    match Command::new(&candidate).arg("--version").output() {
        Ok(out) if out.status.success() => Some(candidate),
        _ => None,
    }
}

/// Verifies the recognition engine answers at startup. A missing engine
/// is fatal here rather than a per-cycle failure: without it, every OCR
/// fallback would silently miss for the lifetime of the process.
pub fn verify_tesseract(configured: &str) -> Result<(), MonitorError> {
    let tesseract = resolve_tesseract(configured).ok_or_else(|| {
        MonitorError::FatalDependencyMissing(format!(
            "Tesseract not found at \"{}\" or on PATH. \
             Install from https://github.com/UB-Mannheim/tesseract/wiki \
             (check Korean under additional language data)",
            configured
        ))
    })?;

    let output = Command::new(&tesseract)
        .arg("--version")
        .output()
        .map_err(|e| {
            MonitorError::FatalDependencyMissing(format!(
                "Tesseract at {} did not run: {}",
                tesseract.display(),
                e
            ))
        })?;

    let version = String::from_utf8_lossy(&output.stdout);
    let first_line = version.lines().next().unwrap_or("unknown");
    log(&format!("Tesseract available: {}", first_line));
    Ok(())
}
