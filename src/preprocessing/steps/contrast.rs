use crate::error::OcrError;
use image::{DynamicImage, GrayImage, Luma, Rgb, RgbImage, Rgba, RgbaImage};

/// Contrast-limited adaptive histogram equalization settings
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContrastOptions {
    /// Histogram bins are clipped at `clip_limit` times the mean bin height
    pub clip_limit: f32,
    /// Tiles per side of the equalization grid
    pub tile_size: u32,
}

impl Default for ContrastOptions {
    fn default() -> Self {
        Self {
            clip_limit: 2.0,
            tile_size: 8,
        }
    }
}

impl ContrastOptions {
    /// Stronger clipping used by the optimal pipeline
    pub fn strong() -> Self {
        Self {
            clip_limit: 3.0,
            ..Self::default()
        }
    }
}

// BT.601 luma weights
const KR: f32 = 0.299;
const KG: f32 = 0.587;
const KB: f32 = 0.114;

/// Equalize the luminance channel tile by tile, leaving chrominance alone
pub fn apply(image: DynamicImage, options: ContrastOptions) -> Result<DynamicImage, OcrError> {
    if options.tile_size == 0 {
        return Err(OcrError::InvalidOption(
            "contrast tile grid must be at least 1x1".to_string(),
        ));
    }
    if !options.clip_limit.is_finite() || options.clip_limit < 0.0 {
        return Err(OcrError::InvalidOption(format!(
            "contrast clip limit must be non-negative, got {}",
            options.clip_limit
        )));
    }

    let enhanced = match image {
        DynamicImage::ImageLuma8(gray) => DynamicImage::ImageLuma8(clahe(&gray, &options)),
        DynamicImage::ImageRgba8(rgba) => DynamicImage::ImageRgba8(enhance_rgba(&rgba, &options)),
        other => DynamicImage::ImageRgb8(enhance_rgb(&other.to_rgb8(), &options)),
    };

    Ok(enhanced)
}

fn luma_of(r: f32, g: f32, b: f32) -> f32 {
    KR * r + KG * g + KB * b
}

/// Rebuild RGB from a new luma and the original red/blue offsets from luma
fn recombine(y: f32, dr: f32, db: f32) -> [u8; 3] {
    let r = y + dr;
    let b = y + db;
    let g = (y - KR * r - KB * b) / KG;
    [r, g, b].map(|v| v.round().clamp(0.0, 255.0) as u8)
}

fn enhance_rgb(img: &RgbImage, options: &ContrastOptions) -> RgbImage {
    let luma = GrayImage::from_fn(img.width(), img.height(), |x, y| {
        let [r, g, b] = img.get_pixel(x, y).0.map(f32::from);
        Luma([luma_of(r, g, b).round() as u8])
    });
    let equalized = clahe(&luma, options);

    RgbImage::from_fn(img.width(), img.height(), |x, y| {
        let [r, g, b] = img.get_pixel(x, y).0.map(f32::from);
        let y_old = luma_of(r, g, b);
        let y_new = equalized.get_pixel(x, y).0[0] as f32;
        Rgb(recombine(y_new, r - y_old, b - y_old))
    })
}

fn enhance_rgba(img: &RgbaImage, options: &ContrastOptions) -> RgbaImage {
    let luma = GrayImage::from_fn(img.width(), img.height(), |x, y| {
        let [r, g, b, _] = img.get_pixel(x, y).0.map(f32::from);
        Luma([luma_of(r, g, b).round() as u8])
    });
    let equalized = clahe(&luma, options);

    RgbaImage::from_fn(img.width(), img.height(), |x, y| {
        let [r, g, b, a] = img.get_pixel(x, y).0;
        let [r, g, b] = [r, g, b].map(f32::from);
        let y_old = luma_of(r, g, b);
        let y_new = equalized.get_pixel(x, y).0[0] as f32;
        let [r2, g2, b2] = recombine(y_new, r - y_old, b - y_old);
        Rgba([r2, g2, b2, a])
    })
}

/// Contrast-limited adaptive histogram equalization on a single channel
///
/// Each tile gets its own clipped-histogram lookup table; every pixel is
/// mapped through the four nearest tables and blended bilinearly so tile
/// seams do not show.
fn clahe(img: &GrayImage, options: &ContrastOptions) -> GrayImage {
    let (width, height) = img.dimensions();
    if width == 0 || height == 0 {
        return img.clone();
    }

    let tiles_x = options.tile_size.min(width);
    let tiles_y = options.tile_size.min(height);
    let tile_w = width.div_ceil(tiles_x);
    let tile_h = height.div_ceil(tiles_y);
    // Ceil-sized tiles may cover the image with fewer columns/rows
    let tiles_x = width.div_ceil(tile_w);
    let tiles_y = height.div_ceil(tile_h);

    let mut luts = Vec::with_capacity((tiles_x * tiles_y) as usize);
    for ty in 0..tiles_y {
        for tx in 0..tiles_x {
            let x0 = tx * tile_w;
            let y0 = ty * tile_h;
            let x1 = (x0 + tile_w).min(width);
            let y1 = (y0 + tile_h).min(height);

            let mut hist = [0u32; 256];
            for y in y0..y1 {
                for x in x0..x1 {
                    hist[img.get_pixel(x, y).0[0] as usize] += 1;
                }
            }
            let area = (x1 - x0) * (y1 - y0);
            luts.push(tile_lut(&mut hist, area, options.clip_limit));
        }
    }

    let lut_at = |tx: u32, ty: u32| &luts[(ty * tiles_x + tx) as usize];

    GrayImage::from_fn(width, height, |x, y| {
        let v = img.get_pixel(x, y).0[0] as usize;

        // Position relative to tile centers
        let gx = (x as f32 + 0.5) / tile_w as f32 - 0.5;
        let gy = (y as f32 + 0.5) / tile_h as f32 - 0.5;
        let tx0 = gx.floor().clamp(0.0, (tiles_x - 1) as f32) as u32;
        let ty0 = gy.floor().clamp(0.0, (tiles_y - 1) as f32) as u32;
        let tx1 = (tx0 + 1).min(tiles_x - 1);
        let ty1 = (ty0 + 1).min(tiles_y - 1);
        let ax = (gx - tx0 as f32).clamp(0.0, 1.0);
        let ay = (gy - ty0 as f32).clamp(0.0, 1.0);

        let top = lut_at(tx0, ty0)[v] as f32 * (1.0 - ax) + lut_at(tx1, ty0)[v] as f32 * ax;
        let bottom = lut_at(tx0, ty1)[v] as f32 * (1.0 - ax) + lut_at(tx1, ty1)[v] as f32 * ax;
        Luma([(top * (1.0 - ay) + bottom * ay).round().clamp(0.0, 255.0) as u8])
    })
}

/// Clip the histogram, spread the excess over all bins, and build the
/// cumulative mapping for one tile
fn tile_lut(hist: &mut [u32; 256], area: u32, clip_limit: f32) -> [u8; 256] {
    if clip_limit > 0.0 {
        let limit = ((clip_limit * area as f32 / 256.0) as u32).max(1);

        let mut excess = 0u32;
        for bin in hist.iter_mut() {
            if *bin > limit {
                excess += *bin - limit;
                *bin = limit;
            }
        }

        let batch = excess / 256;
        let residual = excess % 256;
        for bin in hist.iter_mut() {
            *bin += batch;
        }
        if residual > 0 {
            let step = (256 / residual).max(1) as usize;
            for bin in hist.iter_mut().step_by(step).take(residual as usize) {
                *bin += 1;
            }
        }
    }

    let scale = 255.0 / area as f32;
    let mut lut = [0u8; 256];
    let mut cumulative = 0u32;
    for (i, &count) in hist.iter().enumerate() {
        cumulative += count;
        lut[i] = (cumulative as f32 * scale).round().clamp(0.0, 255.0) as u8;
    }
    lut
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spread(img: &GrayImage) -> u8 {
        let min = img.pixels().map(|p| p.0[0]).min().unwrap_or(0);
        let max = img.pixels().map(|p| p.0[0]).max().unwrap_or(0);
        max - min
    }

    #[test]
    fn test_clahe_stretches_low_contrast() {
        let img = GrayImage::from_fn(64, 64, |x, y| Luma([100 + ((x + y) % 20) as u8]));
        let result = apply(DynamicImage::ImageLuma8(img.clone()), ContrastOptions::default())
            .unwrap()
            .to_luma8();
        assert!(spread(&result) > spread(&img));
    }

    #[test]
    fn test_uniform_image_stays_uniform() {
        let img = GrayImage::from_pixel(40, 40, Luma([255]));
        let result = apply(DynamicImage::ImageLuma8(img.clone()), ContrastOptions::default())
            .unwrap()
            .to_luma8();
        assert_eq!(result, img);
    }

    #[test]
    fn test_neutral_colors_stay_neutral() {
        // Gray pixels carry no chrominance, so they must stay gray
        let img = RgbImage::from_fn(32, 32, |x, _| {
            let v = 90 + (x % 16) as u8;
            Rgb([v, v, v])
        });
        let result = apply(DynamicImage::ImageRgb8(img), ContrastOptions::default())
            .unwrap()
            .to_rgb8();
        for p in result.pixels() {
            let [r, g, b] = p.0;
            assert!(r.abs_diff(g) <= 1 && g.abs_diff(b) <= 1, "{:?}", p);
        }
    }

    #[test]
    fn test_alpha_untouched() {
        let img = RgbaImage::from_fn(16, 16, |x, y| Rgba([x as u8 * 10, y as u8 * 10, 50, 77]));
        let result = apply(DynamicImage::ImageRgba8(img), ContrastOptions::default())
            .unwrap()
            .to_rgba8();
        assert!(result.pixels().all(|p| p.0[3] == 77));
    }

    #[test]
    fn test_image_smaller_than_grid() {
        let img = GrayImage::from_fn(3, 5, |x, y| Luma([(x * 40 + y * 10) as u8]));
        let result = apply(DynamicImage::ImageLuma8(img), ContrastOptions::default()).unwrap();
        assert_eq!((result.width(), result.height()), (3, 5));
    }

    #[test]
    fn test_clip_limit_bounds_amplification() {
        let img = GrayImage::from_fn(256, 256, |x, _| Luma([120 + (x % 4) as u8]));
        let with_clip = |clip_limit| {
            let options = ContrastOptions {
                clip_limit,
                tile_size: 2,
            };
            apply(DynamicImage::ImageLuma8(img.clone()), options)
                .unwrap()
                .to_luma8()
        };
        assert!(spread(&with_clip(1.0)) < spread(&with_clip(3.0)));
    }

    #[test]
    fn test_zero_grid_rejected() {
        let options = ContrastOptions {
            clip_limit: 2.0,
            tile_size: 0,
        };
        let img = DynamicImage::ImageLuma8(GrayImage::new(8, 8));
        assert!(matches!(apply(img, options), Err(OcrError::InvalidOption(_))));
    }
}
