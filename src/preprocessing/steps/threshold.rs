use crate::error::OcrError;
use image::{DynamicImage, GrayImage, Luma};
use imageproc::contrast::otsu_level;
use imageproc::filter::separable_filter_equal;
use std::fmt;
use std::str::FromStr;

/// Gaussian-weighted neighbourhood size for adaptive thresholding
pub const DEFAULT_BLOCK_SIZE: u32 = 11;
/// Offset subtracted from the local mean
pub const DEFAULT_OFFSET: i32 = 2;
/// Cutoff for the fixed strategy
pub const DEFAULT_FIXED_VALUE: u8 = 150;

const MAX_VALUE: u8 = 255;

/// Binarization strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThresholdMethod {
    /// Per-pixel cutoff: Gaussian-weighted local mean minus `offset`
    Adaptive { block_size: u32, offset: i32 },
    /// Single global cutoff maximizing inter-class variance (Otsu)
    Otsu,
    /// Single caller-supplied cutoff
    Fixed(u8),
}

impl Default for ThresholdMethod {
    fn default() -> Self {
        Self::Adaptive {
            block_size: DEFAULT_BLOCK_SIZE,
            offset: DEFAULT_OFFSET,
        }
    }
}

impl ThresholdMethod {
    /// Build a method from its tag, using `fixed_value` when the tag is `fixed`
    pub fn from_name(name: &str, fixed_value: u8) -> Result<Self, OcrError> {
        match name.to_lowercase().as_str() {
            "adaptive" => Ok(Self::default()),
            "otsu" => Ok(Self::Otsu),
            "fixed" => Ok(Self::Fixed(fixed_value)),
            _ => Err(OcrError::UnknownThresholdMethod(name.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Adaptive { .. } => "adaptive",
            Self::Otsu => "otsu",
            Self::Fixed(_) => "fixed",
        }
    }
}

impl FromStr for ThresholdMethod {
    type Err = OcrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s, DEFAULT_FIXED_VALUE)
    }
}

impl fmt::Display for ThresholdMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Binarize the image; every output pixel is either 0 or 255
pub fn apply(image: DynamicImage, method: ThresholdMethod) -> Result<DynamicImage, OcrError> {
    let gray = image.to_luma8();

    let binary = match method {
        ThresholdMethod::Adaptive { block_size, offset } => {
            adaptive_gaussian(&gray, block_size, offset)?
        }
        ThresholdMethod::Otsu => {
            let level = otsu_level(&gray);
            tracing::debug!("Otsu threshold level: {}", level);
            binarize(&gray, level)
        }
        ThresholdMethod::Fixed(value) => binarize(&gray, value),
    };

    Ok(DynamicImage::ImageLuma8(binary))
}

/// Pixels strictly above `level` become white
fn binarize(img: &GrayImage, level: u8) -> GrayImage {
    GrayImage::from_fn(img.width(), img.height(), |x, y| {
        if img.get_pixel(x, y).0[0] > level {
            Luma([MAX_VALUE])
        } else {
            Luma([0u8])
        }
    })
}

/// Adaptive thresholding against a Gaussian-weighted local mean
///
/// The kernel spans `block_size` pixels with the sigma OpenCV derives for
/// that size, so a block of 11 uses sigma 2.0.
fn adaptive_gaussian(img: &GrayImage, block_size: u32, offset: i32) -> Result<GrayImage, OcrError> {
    if block_size < 3 || block_size % 2 == 0 {
        return Err(OcrError::InvalidOption(format!(
            "adaptive block size must be odd and at least 3, got {}",
            block_size
        )));
    }

    let kernel = gaussian_kernel(block_size);
    let local_mean = separable_filter_equal(img, &kernel);

    Ok(GrayImage::from_fn(img.width(), img.height(), |x, y| {
        let pixel = img.get_pixel(x, y).0[0] as i32;
        let mean = local_mean.get_pixel(x, y).0[0] as i32;
        if pixel > mean - offset {
            Luma([MAX_VALUE])
        } else {
            Luma([0u8])
        }
    }))
}

/// Normalized 1-D Gaussian kernel of odd length `size`
fn gaussian_kernel(size: u32) -> Vec<f32> {
    let sigma = 0.3 * ((size as f32 - 1.0) * 0.5 - 1.0) + 0.8;
    let half = (size / 2) as i32;
    let mut kernel: Vec<f32> = (-half..=half)
        .map(|i| (-((i * i) as f32) / (2.0 * sigma * sigma)).exp())
        .collect();
    let sum: f32 = kernel.iter().sum();
    for k in kernel.iter_mut() {
        *k /= sum;
    }
    kernel
}
