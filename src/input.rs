//! Image loading boundary
//!
//! Every core operation takes a decoded `DynamicImage`. Files and byte
//! buffers are turned into one here, and nowhere else.

use crate::error::OcrError;
use image::DynamicImage;
use std::path::Path;

/// Where an image comes from
#[derive(Debug, Clone, Copy)]
pub enum ImageSource<'a> {
    Path(&'a Path),
    Bytes(&'a [u8]),
}

/// Decode an image from a path or an in-memory buffer
pub fn load_image(source: ImageSource<'_>) -> Result<DynamicImage, OcrError> {
    let image = match source {
        ImageSource::Path(path) => image::open(path).map_err(|e| {
            OcrError::InvalidImage(format!("Failed to open {}: {}", path.display(), e))
        })?,
        ImageSource::Bytes(data) => image::load_from_memory(data)
            .map_err(|e| OcrError::InvalidImage(format!("Failed to decode image: {}", e)))?,
    };

    ensure_not_empty(&image)?;

    tracing::debug!(
        "Loaded image {}x{} ({:?})",
        image.width(),
        image.height(),
        image.color()
    );

    Ok(image)
}

pub fn load_from_path(path: impl AsRef<Path>) -> Result<DynamicImage, OcrError> {
    load_image(ImageSource::Path(path.as_ref()))
}

pub fn load_from_memory(data: &[u8]) -> Result<DynamicImage, OcrError> {
    load_image(ImageSource::Bytes(data))
}

/// Persist an image; the format follows the file extension
pub fn save_image(image: &DynamicImage, path: impl AsRef<Path>) -> Result<(), OcrError> {
    let path = path.as_ref();
    image.save(path).map_err(|e| {
        OcrError::InvalidImage(format!("Failed to write {}: {}", path.display(), e))
    })
}

/// Reject zero-width or zero-height images
pub fn ensure_not_empty(image: &DynamicImage) -> Result<(), OcrError> {
    if image.width() == 0 || image.height() == 0 {
        return Err(OcrError::InvalidImage(format!(
            "Image has no pixels ({}x{})",
            image.width(),
            image.height()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, ImageFormat, Luma};
    use std::io::Cursor;

    #[test]
    fn test_load_from_memory_decodes_png() {
        let img = GrayImage::from_pixel(12, 7, Luma([200]));
        let mut bytes = Vec::new();
        DynamicImage::ImageLuma8(img)
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();

        let loaded = load_from_memory(&bytes).unwrap();
        assert_eq!(loaded.width(), 12);
        assert_eq!(loaded.height(), 7);
    }

    #[test]
    fn test_garbage_bytes_are_invalid_image() {
        let err = load_from_memory(b"definitely not an image").unwrap_err();
        assert!(matches!(err, OcrError::InvalidImage(_)));
    }

    #[test]
    fn test_missing_file_is_invalid_image() {
        let err = load_from_path("/nonexistent/scan.png").unwrap_err();
        assert!(matches!(err, OcrError::InvalidImage(_)));
    }

    #[test]
    fn test_zero_dimension_rejected() {
        let empty = DynamicImage::ImageLuma8(GrayImage::new(0, 10));
        assert!(matches!(
            ensure_not_empty(&empty),
            Err(OcrError::InvalidImage(_))
        ));
    }
}
