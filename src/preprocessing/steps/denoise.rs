use crate::error::OcrError;
use image::{DynamicImage, GrayImage, RgbImage};

/// Non-local means parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DenoiseOptions {
    /// Filter strength; larger removes more noise and more detail
    pub h: f32,
    /// Side of the patch compared between pixels (odd)
    pub template_window: u32,
    /// Side of the area searched for similar patches (odd)
    pub search_window: u32,
}

impl Default for DenoiseOptions {
    fn default() -> Self {
        Self {
            h: 10.0,
            template_window: 7,
            search_window: 21,
        }
    }
}

/// Non-local means denoising
///
/// Every pixel becomes a weighted average of the pixels in its search window,
/// weighted by how similar their surrounding patches are. Grayscale images
/// stay single-channel; anything else is filtered as RGB with the patch
/// distance taken over all three channels.
pub fn apply(image: DynamicImage, options: DenoiseOptions) -> Result<DynamicImage, OcrError> {
    if options.template_window % 2 == 0 || options.search_window % 2 == 0 {
        return Err(OcrError::InvalidOption(format!(
            "denoise windows must be odd, got template {} / search {}",
            options.template_window, options.search_window
        )));
    }
    if options.h <= 0.0 {
        return Err(OcrError::InvalidOption(format!(
            "denoise strength must be positive, got {}",
            options.h
        )));
    }

    match image {
        DynamicImage::ImageLuma8(gray) => {
            let (width, height) = gray.dimensions();
            let filtered = nl_means(gray.as_raw(), width, height, 1, &options);
            let out = GrayImage::from_raw(width, height, filtered).ok_or_else(|| {
                OcrError::InvalidImage("denoised buffer size mismatch".to_string())
            })?;
            Ok(DynamicImage::ImageLuma8(out))
        }
        other => {
            let rgb = other.to_rgb8();
            let (width, height) = rgb.dimensions();
            let filtered = nl_means(rgb.as_raw(), width, height, 3, &options);
            let out = RgbImage::from_raw(width, height, filtered).ok_or_else(|| {
                OcrError::InvalidImage("denoised buffer size mismatch".to_string())
            })?;
            Ok(DynamicImage::ImageRgb8(out))
        }
    }
}

fn nl_means(
    src: &[u8],
    width: u32,
    height: u32,
    channels: usize,
    options: &DenoiseOptions,
) -> Vec<u8> {
    // A flat image is its own denoised version
    if src.len() < channels || src.chunks_exact(channels).all(|px| px == &src[..channels]) {
        return src.to_vec();
    }

    let (w, h) = (width as usize, height as usize);
    let template_radius = (options.template_window / 2) as i64;
    let search_radius = (options.search_window / 2) as i64;
    let inv_h2 = 1.0 / (options.h as f64 * options.h as f64);

    let mut weight_sum = vec![0f64; w * h];
    let mut acc = vec![0f64; w * h * channels];
    let mut integral = vec![0f64; (w + 1) * (h + 1)];

    let clamp = |v: i64, max: usize| v.clamp(0, max as i64 - 1) as usize;

    for oy in -search_radius..=search_radius {
        for ox in -search_radius..=search_radius {
            // Integral image of the squared difference between each pixel
            // and its neighbour at offset (ox, oy)
            for y in 0..h {
                let ny = clamp(y as i64 + oy, h);
                let mut row_sum = 0f64;
                for x in 0..w {
                    let nx = clamp(x as i64 + ox, w);
                    let a = (y * w + x) * channels;
                    let b = (ny * w + nx) * channels;
                    let mut d = 0f64;
                    for c in 0..channels {
                        let diff = src[a + c] as f64 - src[b + c] as f64;
                        d += diff * diff;
                    }
                    row_sum += d;
                    integral[(y + 1) * (w + 1) + x + 1] = integral[y * (w + 1) + x + 1] + row_sum;
                }
            }

            for y in 0..h {
                let y0 = (y as i64 - template_radius).max(0) as usize;
                let y1 = (y as i64 + template_radius).min(h as i64 - 1) as usize + 1;
                for x in 0..w {
                    let x0 = (x as i64 - template_radius).max(0) as usize;
                    let x1 = (x as i64 + template_radius).min(w as i64 - 1) as usize + 1;

                    let patch = integral[y1 * (w + 1) + x1] - integral[y0 * (w + 1) + x1]
                        - integral[y1 * (w + 1) + x0]
                        + integral[y0 * (w + 1) + x0];
                    let area = ((x1 - x0) * (y1 - y0) * channels) as f64;
                    let weight = (-(patch / area) * inv_h2).exp();

                    let ny = clamp(y as i64 + oy, h);
                    let nx = clamp(x as i64 + ox, w);
                    let p = y * w + x;
                    let q = (ny * w + nx) * channels;

                    weight_sum[p] += weight;
                    for c in 0..channels {
                        acc[p * channels + c] += weight * src[q + c] as f64;
                    }
                }
            }
        }
    }

    acc.iter()
        .enumerate()
        .map(|(i, &v)| {
            let total = weight_sum[i / channels];
            (v / total).round().clamp(0.0, 255.0) as u8
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Luma, Rgb};

    #[test]
    fn test_denoise_reduces_salt_pepper_noise() {
        let mut img = GrayImage::from_pixel(16, 16, Luma([128]));
        img.put_pixel(5, 5, Luma([0])); // "pepper" noise
        img.put_pixel(10, 8, Luma([255])); // "salt" noise

        let result = apply(DynamicImage::ImageLuma8(img.clone()), DenoiseOptions::default())
            .unwrap();
        let result_gray = result.to_luma8();

        let original_variance = calculate_variance(&img);
        let result_variance = calculate_variance(&result_gray);

        assert!(result_variance < original_variance);
    }

    #[test]
    fn test_denoise_preserves_strong_edges() {
        let img = GrayImage::from_fn(24, 12, |x, _| if x < 12 { Luma([20]) } else { Luma([230]) });

        let result = apply(DynamicImage::ImageLuma8(img), DenoiseOptions::default())
            .unwrap()
            .to_luma8();

        assert!(result.get_pixel(2, 6).0[0] < 40);
        assert!(result.get_pixel(21, 6).0[0] > 210);
    }

    #[test]
    fn test_uniform_image_unchanged() {
        let img = GrayImage::from_pixel(30, 30, Luma([255]));
        let result = apply(DynamicImage::ImageLuma8(img.clone()), DenoiseOptions::default())
            .unwrap();
        assert_eq!(result.to_luma8(), img);
    }

    #[test]
    fn test_color_image_stays_color() {
        let img = RgbImage::from_fn(12, 12, |x, y| Rgb([(x * 20) as u8, (y * 20) as u8, 90]));
        let result = apply(DynamicImage::ImageRgb8(img), DenoiseOptions::default()).unwrap();
        assert!(matches!(result, DynamicImage::ImageRgb8(_)));
        assert_eq!(result.width(), 12);
    }

    #[test]
    fn test_even_window_rejected() {
        let options = DenoiseOptions {
            template_window: 6,
            ..Default::default()
        };
        let img = DynamicImage::ImageLuma8(GrayImage::new(4, 4));
        assert!(matches!(apply(img, options), Err(OcrError::InvalidOption(_))));
    }

    fn calculate_variance(img: &GrayImage) -> f64 {
        let pixels: Vec<f64> = img.pixels().map(|p| p.0[0] as f64).collect();
        let mean = pixels.iter().sum::<f64>() / pixels.len() as f64;
        pixels.iter().map(|p| (p - mean).powi(2)).sum::<f64>() / pixels.len() as f64
    }
}
