//! Point-set geometry shared by the deskew step and italic detection

use image::GrayImage;
use imageproc::geometry::{convex_hull, min_area_rect};
use imageproc::point::Point;

/// Outline of the pixels brighter than a threshold
#[derive(Debug, Clone, Default)]
pub struct Foreground {
    /// Leftmost and rightmost foreground pixel of every row that has one.
    /// Their convex hull equals the hull of the full foreground set.
    pub points: Vec<Point<i32>>,
    /// Number of foreground pixels in the whole image
    pub count: usize,
}

/// Collect the foreground outline of `img` (pixels with intensity `> threshold`)
pub fn foreground_points(img: &GrayImage, threshold: u8) -> Foreground {
    let width = img.width() as usize;
    let raw = img.as_raw();
    let mut foreground = Foreground::default();

    if width == 0 {
        return foreground;
    }

    for (y, row) in raw.chunks_exact(width).enumerate() {
        let first = row.iter().position(|&v| v > threshold);
        let last = row.iter().rposition(|&v| v > threshold);

        if let (Some(first), Some(last)) = (first, last) {
            foreground.count += row.iter().filter(|&&v| v > threshold).count();
            foreground.points.push(Point::new(first as i32, y as i32));
            if last != first {
                foreground.points.push(Point::new(last as i32, y as i32));
            }
        }
    }

    foreground
}

/// Rotation of the minimum-area rectangle around `points`, in degrees.
///
/// Uses the `[-90, 0)` convention: an axis-aligned rectangle reports `-90`.
/// Returns `None` for an empty point set.
pub fn min_area_rect_angle(points: &[Point<i32>]) -> Option<f32> {
    if points.is_empty() {
        return None;
    }

    let corners = min_area_rect(points);
    let edge = (0..4)
        .map(|i| (corners[i], corners[(i + 1) % 4]))
        .find(|(a, b)| a != b);

    let raw = match edge {
        Some((a, b)) => ((b.y - a.y) as f32).atan2((b.x - a.x) as f32).to_degrees(),
        // All corners coincide: a single point has no orientation
        None => 0.0,
    };

    Some(fold_angle(raw))
}

/// Map any angle onto `[-90, 0)`. Rectangle edges are 90° apart, so both
/// edges of the same rectangle fold to the same value.
fn fold_angle(mut degrees: f32) -> f32 {
    while degrees >= 0.0 {
        degrees -= 90.0;
    }
    while degrees < -90.0 {
        degrees += 90.0;
    }
    degrees
}

/// Convex hull of a point set
pub fn hull(points: &[Point<i32>]) -> Vec<Point<i32>> {
    if points.is_empty() {
        return Vec::new();
    }
    convex_hull(points.to_vec())
}

/// Major-axis direction of the ellipse fitted to `points`, in degrees from
/// the x axis, within `(-90, 90]`. Image coordinates, y pointing down.
///
/// Returns `None` when the points are isotropic (circle-like) or coincide,
/// since no major axis exists then.
pub fn ellipse_major_axis(points: &[Point<i32>]) -> Option<f64> {
    if points.len() < 2 {
        return None;
    }

    let n = points.len() as f64;
    let mean_x = points.iter().map(|p| p.x as f64).sum::<f64>() / n;
    let mean_y = points.iter().map(|p| p.y as f64).sum::<f64>() / n;

    let (mut sxx, mut syy, mut sxy) = (0.0f64, 0.0f64, 0.0f64);
    for p in points {
        let dx = p.x as f64 - mean_x;
        let dy = p.y as f64 - mean_y;
        sxx += dx * dx;
        syy += dy * dy;
        sxy += dx * dy;
    }
    sxx /= n;
    syy /= n;
    sxy /= n;

    let half_diff = (sxx - syy) / 2.0;
    let spread = (half_diff * half_diff + sxy * sxy).sqrt();
    let major = (sxx + syy) / 2.0 + spread;

    if major <= f64::EPSILON || spread <= major * 1e-6 {
        return None;
    }

    let theta = 0.5 * (2.0 * sxy).atan2(sxx - syy);
    let mut degrees = theta.to_degrees();
    if degrees <= -90.0 {
        degrees += 180.0;
    }
    Some(degrees)
}
