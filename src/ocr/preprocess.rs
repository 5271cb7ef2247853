use image::imageops::{self, FilterType};
use image::{GrayImage, ImageBuffer, Luma, Rgba};

/// Luminance threshold for binarization. Chosen for the compressed,
/// low-contrast rendering of the POS order list.
const BINARIZE_THRESHOLD: u8 = 160;

/// One preprocessed rendering of a capture, handed to recognition.
pub struct Variant {
    pub name: &'static str,
    pub image: GrayImage,
}

/// Produces the recognition variants of a captured window, in the order
/// they should be tried.
///
/// 1. `upscaled` — grayscale of a 2x upscale; the POS list font is too
///    small to recognize reliably at native resolution.
/// 2. `grayscale` — native resolution, for captures that are already big.
/// 3. `binarized` — upscaled, thresholded to black text on white.
/// 4. `binarized-inverted` — opposite polarity, for the UI states where
///    the application renders light-on-dark.
pub fn preprocess(img: &ImageBuffer<Rgba<u8>, Vec<u8>>) -> Vec<Variant> {
    let (w, h) = img.dimensions();
    let upscaled = imageops::resize(img, w * 2, h * 2, FilterType::Lanczos3);

    let upscaled_gray = imageops::grayscale(&upscaled);
    let native_gray = imageops::grayscale(img);
    let binarized = binarize(&upscaled_gray, BINARIZE_THRESHOLD, false);
    let inverted = binarize(&upscaled_gray, BINARIZE_THRESHOLD, true);

    vec![
        Variant { name: "upscaled", image: upscaled_gray },
        Variant { name: "grayscale", image: native_gray },
        Variant { name: "binarized", image: binarized },
        Variant { name: "binarized-inverted", image: inverted },
    ]
}

/// Converts a grayscale image to pure black/white at a fixed threshold.
/// With `inverted`, pixels at or above the threshold become black instead,
/// recovering light-on-dark text.
fn binarize(img: &GrayImage, threshold: u8, inverted: bool) -> GrayImage {
    let (width, height) = img.dimensions();
    let mut output = ImageBuffer::new(width, height);

    for (x, y, pixel) in img.enumerate_pixels() {
        let bright = pixel[0] >= threshold;
        let value = if bright != inverted { 255u8 } else { 0u8 };
        output.put_pixel(x, y, Luma([value]));
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ImageBuffer<Rgba<u8>, Vec<u8>> {
        let mut img = ImageBuffer::new(2, 1);
        img.put_pixel(0, 0, Rgba([250, 250, 250, 255])); // bright
        img.put_pixel(1, 0, Rgba([20, 20, 20, 255])); // dark
        img
    }

    #[test]
    fn test_variant_order_and_dimensions() {
        let variants = preprocess(&sample());
        let names: Vec<_> = variants.iter().map(|v| v.name).collect();
        assert_eq!(
            names,
            vec!["upscaled", "grayscale", "binarized", "binarized-inverted"]
        );
        assert_eq!(variants[0].image.dimensions(), (4, 2));
        assert_eq!(variants[1].image.dimensions(), (2, 1));
        assert_eq!(variants[2].image.dimensions(), (4, 2));
    }

    #[test]
    fn test_binarize_polarity() {
        let gray = imageops::grayscale(&sample());
        let normal = binarize(&gray, 160, false);
        assert_eq!(normal.get_pixel(0, 0)[0], 255, "bright pixel stays white");
        assert_eq!(normal.get_pixel(1, 0)[0], 0, "dark pixel becomes black");

        let inverted = binarize(&gray, 160, true);
        assert_eq!(inverted.get_pixel(0, 0)[0], 0, "bright pixel becomes black");
        assert_eq!(inverted.get_pixel(1, 0)[0], 255, "dark pixel becomes white");
    }
}
