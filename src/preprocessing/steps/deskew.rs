use crate::error::OcrError;
use crate::geometry::{foreground_points, min_area_rect_angle};
use image::{DynamicImage, GrayImage, ImageBuffer, Pixel};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeskewOptions {
    /// Pixels brighter than this count as foreground
    pub foreground_threshold: u8,
    /// Below this many foreground pixels the image is treated as upright
    pub min_foreground_pixels: usize,
    /// Corrections smaller than this (degrees) are skipped
    pub min_angle_degrees: f32,
}

impl Default for DeskewOptions {
    fn default() -> Self {
        Self {
            foreground_threshold: 0,
            min_foreground_pixels: 5,
            min_angle_degrees: 0.1,
        }
    }
}

/// Deskew image by rotating it upright
/// The angle comes from the minimum-area rectangle around the foreground mass
pub fn apply(image: DynamicImage, options: DeskewOptions) -> Result<DynamicImage, OcrError> {
    let gray = image.to_luma8();

    let Some(angle) = detect_skew_angle(&gray, &options) else {
        tracing::warn!("Too few foreground pixels to estimate skew, leaving image as is");
        return Ok(image);
    };

    if angle.abs() < options.min_angle_degrees {
        tracing::debug!("Skew angle {:.2}° is negligible, skipping rotation", angle);
        return Ok(image);
    }

    tracing::debug!("Correcting {:.2}° skew", angle);

    let rotated = match image {
        DynamicImage::ImageLuma8(img) => DynamicImage::ImageLuma8(rotate_reflect(&img, angle)),
        DynamicImage::ImageRgb8(img) => DynamicImage::ImageRgb8(rotate_reflect(&img, angle)),
        DynamicImage::ImageRgba8(img) => DynamicImage::ImageRgba8(rotate_reflect(&img, angle)),
        other => DynamicImage::ImageRgb8(rotate_reflect(&other.to_rgb8(), angle)),
    };

    Ok(rotated)
}

/// Correction angle in degrees within `[-45, 45)`; positive means the
/// content must turn counter-clockwise. `None` when the foreground is too
/// sparse to trust.
pub fn detect_skew_angle(img: &GrayImage, options: &DeskewOptions) -> Option<f32> {
    let foreground = foreground_points(img, options.foreground_threshold);
    if foreground.count < options.min_foreground_pixels {
        return None;
    }

    let angle = min_area_rect_angle(&foreground.points)?;

    // The rectangle angle wraps at 90°; past -45° it describes the other edge
    Some(if angle < -45.0 { 90.0 + angle } else { angle })
}

/// Rotate counter-clockwise by `angle_degrees` about the image center,
/// keeping the canvas size. Samples falling outside the image are mirrored
/// back in (`fedcba|abcdef|fedcba`) instead of filled with a flat color.
fn rotate_reflect<P>(img: &ImageBuffer<P, Vec<u8>>, angle_degrees: f32) -> ImageBuffer<P, Vec<u8>>
where
    P: Pixel<Subpixel = u8>,
{
    let (width, height) = img.dimensions();
    let channels = P::CHANNEL_COUNT as usize;
    let src = img.as_raw();
    let stride = width as usize * channels;

    let (sin, cos) = angle_degrees.to_radians().sin_cos();
    let cx = (width / 2) as f32;
    let cy = (height / 2) as f32;

    let mut out = ImageBuffer::<P, Vec<u8>>::new(width, height);

    for (x, y, pixel) in out.enumerate_pixels_mut() {
        let dx = x as f32 - cx;
        let dy = y as f32 - cy;
        let sx = cx + dx * cos - dy * sin;
        let sy = cy + dx * sin + dy * cos;

        let fx = sx - sx.floor();
        let fy = sy - sy.floor();
        let x0 = reflect(sx.floor() as i64, width);
        let x1 = reflect(sx.floor() as i64 + 1, width);
        let y0 = reflect(sy.floor() as i64, height);
        let y1 = reflect(sy.floor() as i64 + 1, height);

        for (c, value) in pixel.channels_mut().iter_mut().enumerate() {
            let at = |xx: usize, yy: usize| src[yy * stride + xx * channels + c] as f32;
            let top = at(x0, y0) * (1.0 - fx) + at(x1, y0) * fx;
            let bottom = at(x0, y1) * (1.0 - fx) + at(x1, y1) * fx;
            *value = (top * (1.0 - fy) + bottom * fy).round().clamp(0.0, 255.0) as u8;
        }
    }

    out
}

/// Mirror an out-of-range index back into `0..len` (edge pixel repeated)
fn reflect(mut i: i64, len: u32) -> usize {
    let n = len as i64;
    if n == 1 {
        return 0;
    }
    loop {
        if i < 0 {
            i = -i - 1;
        } else if i >= n {
            i = 2 * n - i - 1;
        } else {
            return i as usize;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;
    use imageproc::drawing::draw_polygon_mut;
    use imageproc::point::Point;

    /// White rectangle rotated by `degrees` (clockwise on screen) on black
    fn tilted_block(degrees: f32) -> GrayImage {
        let mut img = GrayImage::new(400, 400);
        let (sin, cos) = degrees.to_radians().sin_cos();
        let corners: Vec<Point<i32>> = [(-120.0f32, -40.0f32), (120.0, -40.0), (120.0, 40.0), (-120.0, 40.0)]
            .iter()
            .map(|&(x, y)| {
                Point::new(
                    (200.0 + x * cos - y * sin).round() as i32,
                    (200.0 + x * sin + y * cos).round() as i32,
                )
            })
            .collect();
        draw_polygon_mut(&mut img, &corners, Luma([255]));
        img
    }

    #[test]
    fn test_upright_block_has_zero_angle() {
        let angle = detect_skew_angle(&tilted_block(0.0), &DeskewOptions::default()).unwrap();
        assert!(angle.abs() < 0.5, "Expected near-zero angle, got {}", angle);
    }

    #[test]
    fn test_detects_tilt_magnitude() {
        for tilt in [8.0f32, -8.0] {
            let angle = detect_skew_angle(&tilted_block(tilt), &DeskewOptions::default()).unwrap();
            assert!(
                (angle - tilt).abs() < 1.0,
                "tilt {} detected as {}",
                tilt,
                angle
            );
        }
    }

    #[test]
    fn test_deskew_straightens_tilted_block() {
        let options = DeskewOptions::default();
        let corrected = apply(DynamicImage::ImageLuma8(tilted_block(8.0)), options)
            .unwrap()
            .to_luma8();
        // Re-threshold: interpolation leaves soft edges
        let binary = GrayImage::from_fn(400, 400, |x, y| {
            Luma([if corrected.get_pixel(x, y).0[0] > 127 { 255 } else { 0 }])
        });
        let residual = detect_skew_angle(&binary, &options).unwrap();
        assert!(residual.abs() < 1.0, "residual skew {}", residual);
    }

    #[test]
    fn test_upright_image_unchanged() {
        let mut img = GrayImage::from_pixel(120, 60, Luma([255]));
        for x in 10..110 {
            img.put_pixel(x, 30, Luma([0]));
        }
        let result = apply(DynamicImage::ImageLuma8(img.clone()), DeskewOptions::default())
            .unwrap();
        assert_eq!(result.to_luma8(), img);
    }

    #[test]
    fn test_blank_image_is_noop() {
        let img = GrayImage::new(50, 50);
        assert_eq!(detect_skew_angle(&img, &DeskewOptions::default()), None);

        let result = apply(DynamicImage::ImageLuma8(img.clone()), DeskewOptions::default())
            .unwrap();
        assert_eq!(result.to_luma8(), img);
    }

    #[test]
    fn test_too_few_foreground_pixels_is_noop() {
        let mut img = GrayImage::new(50, 50);
        img.put_pixel(3, 3, Luma([255]));
        img.put_pixel(40, 20, Luma([255]));
        assert_eq!(detect_skew_angle(&img, &DeskewOptions::default()), None);
    }

    #[test]
    fn test_deskew_preserves_dimensions_and_color() {
        let img = image::RgbImage::from_fn(100, 50, |x, y| image::Rgb([x as u8, y as u8, 0]));
        let result = apply(DynamicImage::ImageRgb8(img), DeskewOptions::default()).unwrap();
        assert!(matches!(result, DynamicImage::ImageRgb8(_)));
        assert_eq!(result.width(), 100);
        assert_eq!(result.height(), 50);
    }

    #[test]
    fn test_reflect_index() {
        assert_eq!(reflect(-1, 5), 0);
        assert_eq!(reflect(-2, 5), 1);
        assert_eq!(reflect(5, 5), 4);
        assert_eq!(reflect(6, 5), 3);
        assert_eq!(reflect(3, 5), 3);
        assert_eq!(reflect(7, 1), 0);
    }
}
