use crate::error::OcrError;
use image::{DynamicImage, GrayImage, Luma};
use std::str::FromStr;

/// Structuring element side length used by the pipeline cleanup
pub const DEFAULT_KERNEL_SIZE: u32 = 2;
/// Structuring element side length for standalone morphology
pub const STANDALONE_KERNEL_SIZE: u32 = 3;

/// Square structuring element and repeat count
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MorphologyOptions {
    pub kernel_size: u32,
    pub iterations: u32,
}

impl Default for MorphologyOptions {
    fn default() -> Self {
        Self {
            kernel_size: DEFAULT_KERNEL_SIZE,
            iterations: 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MorphOperation {
    /// Dilate then erode: fills small gaps inside strokes
    Close,
    /// Erode then dilate: removes isolated speckle
    Open,
    Dilate,
    Erode,
}

impl FromStr for MorphOperation {
    type Err = OcrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "close" => Ok(Self::Close),
            "open" => Ok(Self::Open),
            "dilate" => Ok(Self::Dilate),
            "erode" => Ok(Self::Erode),
            _ => Err(OcrError::InvalidOption(format!(
                "unknown morphology operation: {} (expected close, open, dilate or erode)",
                s
            ))),
        }
    }
}

/// Pipeline cleanup: close, then open, with the same element
/// Closing first keeps broken strokes connected before opening strips speckle
pub fn apply(image: DynamicImage, options: MorphologyOptions) -> Result<DynamicImage, OcrError> {
    let closed = run(image, MorphOperation::Close, options)?;
    run(closed, MorphOperation::Open, options)
}

/// Apply a single morphological operation to the grayscale image
pub fn run(
    image: DynamicImage,
    operation: MorphOperation,
    options: MorphologyOptions,
) -> Result<DynamicImage, OcrError> {
    if options.kernel_size == 0 {
        return Err(OcrError::InvalidOption(
            "morphology kernel size must be at least 1".to_string(),
        ));
    }

    let mut gray = image.to_luma8();
    let n = options.iterations;
    let k = options.kernel_size;

    match operation {
        MorphOperation::Dilate => gray = repeat(&gray, n, |g| dilate(g, k)),
        MorphOperation::Erode => gray = repeat(&gray, n, |g| erode(g, k)),
        MorphOperation::Close => {
            gray = repeat(&gray, n, |g| dilate(g, k));
            gray = repeat(&gray, n, |g| erode(g, k));
        }
        MorphOperation::Open => {
            gray = repeat(&gray, n, |g| erode(g, k));
            gray = repeat(&gray, n, |g| dilate(g, k));
        }
    }

    Ok(DynamicImage::ImageLuma8(gray))
}

fn repeat(img: &GrayImage, times: u32, f: impl Fn(&GrayImage) -> GrayImage) -> GrayImage {
    let mut current = img.clone();
    for _ in 0..times {
        current = f(&current);
    }
    current
}

/// Window offsets covered by a `size`-wide element anchored at `size / 2`.
/// Dilation uses the reflected element so close/open do not shift content
/// when the size is even.
fn window(size: u32, reflected: bool) -> (i64, i64) {
    let anchor = (size / 2) as i64;
    let lo = -anchor;
    let hi = size as i64 - 1 - anchor;
    if reflected {
        (-hi, -lo)
    } else {
        (lo, hi)
    }
}

fn dilate(img: &GrayImage, size: u32) -> GrayImage {
    rank_filter(img, window(size, true), u8::max, 0)
}

fn erode(img: &GrayImage, size: u32) -> GrayImage {
    rank_filter(img, window(size, false), u8::min, 255)
}

/// Separable min/max over a square window; out-of-bounds pixels are ignored
fn rank_filter(
    img: &GrayImage,
    (lo, hi): (i64, i64),
    pick: fn(u8, u8) -> u8,
    identity: u8,
) -> GrayImage {
    let (width, height) = img.dimensions();
    let (w, h) = (width as i64, height as i64);

    let horizontal = GrayImage::from_fn(width, height, |x, y| {
        let mut acc = identity;
        for dx in lo..=hi {
            let sx = x as i64 + dx;
            if (0..w).contains(&sx) {
                acc = pick(acc, img.get_pixel(sx as u32, y).0[0]);
            }
        }
        Luma([acc])
    });

    GrayImage::from_fn(width, height, |x, y| {
        let mut acc = identity;
        for dy in lo..=hi {
            let sy = y as i64 + dy;
            if (0..h).contains(&sy) {
                acc = pick(acc, horizontal.get_pixel(x, sy as u32).0[0]);
            }
        }
        Luma([acc])
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn white_with(points: &[(u32, u32)], size: u32) -> GrayImage {
        let mut img = GrayImage::from_pixel(size, size, Luma([255]));
        for &(x, y) in points {
            img.put_pixel(x, y, Luma([0]));
        }
        img
    }

    #[test]
    fn test_open_removes_isolated_speckle() {
        // A lone white pixel in a black field is speckle for opening
        let mut img = GrayImage::new(10, 10);
        img.put_pixel(5, 5, Luma([255]));

        let result = run(
            DynamicImage::ImageLuma8(img),
            MorphOperation::Open,
            MorphologyOptions::default(),
        )
        .unwrap()
        .to_luma8();
        assert!(result.pixels().all(|p| p.0[0] == 0));
    }

    #[test]
    fn test_close_fills_pinhole() {
        let mut img = GrayImage::from_pixel(10, 10, Luma([255]));
        img.put_pixel(4, 4, Luma([0]));

        let result = run(
            DynamicImage::ImageLuma8(img),
            MorphOperation::Close,
            MorphologyOptions::default(),
        )
        .unwrap()
        .to_luma8();
        assert_eq!(result.get_pixel(4, 4).0[0], 255);
    }

    #[test]
    fn test_cleanup_keeps_thick_strokes_in_place() {
        // 4px-wide dark bar on white survives close+open without shifting
        let bar: Vec<(u32, u32)> = (2..18).flat_map(|x| (8..12).map(move |y| (x, y))).collect();
        let img = white_with(&bar, 20);

        let result = apply(DynamicImage::ImageLuma8(img.clone()), MorphologyOptions::default())
            .unwrap()
            .to_luma8();
        assert_eq!(result, img);
    }

    #[test]
    fn test_dilate_and_erode_grow_and_shrink() {
        let mut img = GrayImage::new(9, 9);
        img.put_pixel(4, 4, Luma([255]));
        let options = MorphologyOptions {
            kernel_size: 3,
            iterations: 1,
        };

        let dilated = run(DynamicImage::ImageLuma8(img), MorphOperation::Dilate, options)
            .unwrap()
            .to_luma8();
        assert_eq!(dilated.pixels().filter(|p| p.0[0] == 255).count(), 9);

        let eroded = run(DynamicImage::ImageLuma8(dilated), MorphOperation::Erode, options)
            .unwrap()
            .to_luma8();
        assert_eq!(eroded.pixels().filter(|p| p.0[0] == 255).count(), 1);
        assert_eq!(eroded.get_pixel(4, 4).0[0], 255);
    }

    #[test]
    fn test_operation_names() {
        assert_eq!("close".parse::<MorphOperation>().unwrap(), MorphOperation::Close);
        assert_eq!("Erode".parse::<MorphOperation>().unwrap(), MorphOperation::Erode);
        assert!(matches!(
            "tophat".parse::<MorphOperation>(),
            Err(OcrError::InvalidOption(_))
        ));
    }

    #[test]
    fn test_zero_kernel_rejected() {
        let img = DynamicImage::ImageLuma8(GrayImage::new(4, 4));
        let options = MorphologyOptions {
            kernel_size: 0,
            iterations: 1,
        };
        assert!(matches!(
            run(img, MorphOperation::Dilate, options),
            Err(OcrError::InvalidOption(_))
        ));
    }
}
