use crate::error::OcrError;
use image::{imageops::FilterType, DynamicImage, GenericImageView};

/// Default magnification applied before denoising and binarization
pub const DEFAULT_SCALE: f32 = 2.0;

/// Magnify (or shrink) the image by `scale` using cubic interpolation
/// Upscaling first gives small glyphs enough pixels to survive thresholding
pub fn apply(image: DynamicImage, scale: f32) -> Result<DynamicImage, OcrError> {
    if !scale.is_finite() || scale <= 0.0 {
        return Err(OcrError::InvalidOption(format!(
            "resize scale must be positive, got {}",
            scale
        )));
    }

    let (width, height) = image.dimensions();
    let new_width = (width as f32 * scale) as u32;
    let new_height = (height as f32 * scale) as u32;

    if new_width == 0 || new_height == 0 {
        return Err(OcrError::InvalidOption(format!(
            "resize scale {} collapses {}x{} image to nothing",
            scale, width, height
        )));
    }

    if (new_width, new_height) == (width, height) {
        return Ok(image);
    }

    Ok(image.resize_exact(new_width, new_height, FilterType::CatmullRom))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::GrayImage;

    #[test]
    fn test_resize_doubles_dimensions() {
        let img = GrayImage::new(100, 40);
        let result = apply(DynamicImage::ImageLuma8(img), DEFAULT_SCALE).unwrap();
        assert_eq!(result.width(), 200);
        assert_eq!(result.height(), 80);
    }

    #[test]
    fn test_resize_truncates_fractional_size() {
        let img = GrayImage::new(15, 15);
        let result = apply(DynamicImage::ImageLuma8(img), 1.5).unwrap();
        assert_eq!(result.width(), 22);
        assert_eq!(result.height(), 22);
    }

    #[test]
    fn test_resize_rejects_non_positive_scale() {
        let img = DynamicImage::ImageLuma8(GrayImage::new(10, 10));
        assert!(matches!(
            apply(img.clone(), 0.0),
            Err(OcrError::InvalidOption(_))
        ));
        assert!(matches!(apply(img, -1.0), Err(OcrError::InvalidOption(_))));
    }

    #[test]
    fn test_resize_rejects_collapse() {
        let img = DynamicImage::ImageLuma8(GrayImage::new(3, 3));
        assert!(matches!(apply(img, 0.1), Err(OcrError::InvalidOption(_))));
    }
}
