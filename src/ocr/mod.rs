pub mod engine;
pub mod preprocess;
pub mod setup;

pub use engine::recognize_image;
pub use preprocess::{preprocess, Variant};
pub use setup::verify_tesseract;

use image::{ImageBuffer, Rgba};

use crate::extract::{extract_from_image, ImageExtraction};
use crate::log;

/// High-level visual path: preprocess a captured window and run
/// recognition over the variants in order until one yields delivery rows.
/// Returns `None` only after every variant has been tried.
pub fn recognize_window(
    img: &ImageBuffer<Rgba<u8>, Vec<u8>>,
    tesseract_path: &str,
) -> Option<ImageExtraction> {
    for variant in preprocess(img) {
        let blob = match recognize_image(&variant.image, tesseract_path) {
            Ok(blob) => blob,
            Err(e) => {
                log(&format!("OCR failed on {} variant: {}", variant.name, e));
                continue;
            }
        };

        if let Some(extraction) = extract_from_image(&blob) {
            log(&format!(
                "OCR match on {} variant: {} active delivery rows",
                variant.name, extraction.count
            ));
            for row in &extraction.unmatched {
                log(&format!("Unmatched delivery row: \"{}\"", row));
            }
            return Some(extraction);
        }
    }

    None
}
