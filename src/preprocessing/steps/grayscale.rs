use crate::error::OcrError;
use image::{DynamicImage, GrayImage, Luma};

/// Collapse to a single BT.601 luminance channel
///
/// Scanners and most OCR tooling weight channels with BT.601 rather than the
/// Rec. 709 weights `image` uses by default. Alpha is dropped.
pub fn apply(image: DynamicImage) -> Result<DynamicImage, OcrError> {
    if let DynamicImage::ImageLuma8(_) = image {
        return Ok(image);
    }

    let rgb = image.to_rgb8();
    let gray = GrayImage::from_fn(rgb.width(), rgb.height(), |x, y| {
        let [r, g, b] = rgb.get_pixel(x, y).0;
        Luma([bt601(r, g, b)])
    });

    Ok(DynamicImage::ImageLuma8(gray))
}

fn bt601(r: u8, g: u8, b: u8) -> u8 {
    // Fixed-point 0.299 / 0.587 / 0.114
    ((r as u32 * 4899 + g as u32 * 9617 + b as u32 * 1868 + 8192) >> 14) as u8
}
