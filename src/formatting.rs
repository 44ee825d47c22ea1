//! Layout and emphasis signals derived from recognizer tokens
//!
//! Everything here is a heuristic over token geometry plus one global shape
//! measurement of the image. Thresholds live in [`AnalyzerConfig`].

use crate::engine::Token;
use crate::geometry::{ellipse_major_axis, foreground_points, hull};
use image::DynamicImage;
use serde::{Deserialize, Serialize};

/// Horizontal placement of the text body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Alignment {
    #[default]
    Left,
    Center,
    Right,
}

/// Heuristic thresholds used by [`FormattingAnalyzer`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnalyzerConfig {
    /// Tokens at or below this confidence are ignored
    pub min_confidence: i32,
    /// Mean token height (px) above which text counts as bold
    pub bold_height: f64,
    /// Deviation from vertical (degrees) above which text counts as italic
    pub italic_angle: f64,
    /// Pixels brighter than this feed the italic shape fit
    pub italic_foreground_threshold: u8,
    /// Fewer foreground pixels than this means "not italic"
    pub min_italic_points: usize,
    /// Vertical jump (px) between consecutive tokens that starts a paragraph
    pub paragraph_gap: i32,
    /// Fractions of the image width bounding the left and right zones
    pub left_boundary: f64,
    pub right_boundary: f64,
    /// Reported when no token survives filtering
    pub default_font_size: i32,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            min_confidence: 30,
            bold_height: 25.0,
            italic_angle: 10.0,
            italic_foreground_threshold: 128,
            min_italic_points: 5,
            paragraph_gap: 20,
            left_boundary: 0.25,
            right_boundary: 0.75,
            default_font_size: 12,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TextProperties {
    pub is_bold: bool,
    pub is_italic: bool,
    pub font_size_estimate: i32,
}

/// Consecutive tokens separated by small vertical gaps
pub type ParagraphGroup = Vec<Token>;

#[derive(Debug, Clone, Serialize)]
pub struct FormattingResult {
    pub alignment: Alignment,
    pub text_blocks: Vec<ParagraphGroup>,
    pub formatting: TextProperties,
    /// Mean confidence of all raw tokens with a positive score; NaN (null in
    /// JSON) when there is none
    pub confidence: f64,
}

#[derive(Debug, Clone, Default)]
pub struct FormattingAnalyzer {
    config: AnalyzerConfig,
}

impl FormattingAnalyzer {
    pub fn new(config: AnalyzerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    /// Classify alignment, emphasis, font size and paragraphs.
    ///
    /// `tokens` is the recognizer's raw output. Low-confidence tokens are
    /// dropped before any geometric reasoning but still count toward the
    /// overall confidence.
    ///
    /// `image` must be non-empty; [`crate::input::load_image`] guarantees
    /// that for decoded inputs.
    pub fn analyze(&self, image: &DynamicImage, tokens: &[Token]) -> FormattingResult {
        debug_assert!(
            image.width() > 0 && image.height() > 0,
            "formatting analysis needs a non-empty image"
        );

        let kept: Vec<&Token> = tokens
            .iter()
            .filter(|t| t.confidence > self.config.min_confidence)
            .collect();

        tracing::debug!(
            "Analyzing formatting of {} tokens ({} above confidence {})",
            tokens.len(),
            kept.len(),
            self.config.min_confidence
        );

        let formatting = TextProperties {
            is_bold: self.is_bold(&kept),
            is_italic: self.is_italic(image),
            font_size_estimate: self.font_size(&kept),
        };

        FormattingResult {
            alignment: self.alignment(image.width(), &kept),
            text_blocks: self.paragraphs(&kept),
            formatting,
            confidence: overall_confidence(tokens),
        }
    }

    fn alignment(&self, image_width: u32, tokens: &[&Token]) -> Alignment {
        let Some(mean_x) = mean(tokens.iter().map(|t| t.x as f64)) else {
            return Alignment::Left;
        };

        let width = image_width as f64;
        if mean_x < width * self.config.left_boundary {
            Alignment::Left
        } else if mean_x > width * self.config.right_boundary {
            Alignment::Right
        } else {
            Alignment::Center
        }
    }

    /// Tall glyphs read as bold. Depends on scan resolution, not stroke width.
    fn is_bold(&self, tokens: &[&Token]) -> bool {
        mean(tokens.iter().map(|t| t.height as f64))
            .is_some_and(|height| height > self.config.bold_height)
    }

    /// Orientation of the ellipse fitted to the whole image's foreground
    /// hull. Any leftover skew or noise shows up here too.
    fn is_italic(&self, image: &DynamicImage) -> bool {
        let gray = image.to_luma8();
        let foreground = foreground_points(&gray, self.config.italic_foreground_threshold);
        if foreground.count < self.config.min_italic_points {
            return false;
        }

        let Some(axis) = ellipse_major_axis(&hull(&foreground.points)) else {
            return false;
        };

        let deviation = 90.0 - axis.abs();
        tracing::debug!("Foreground major axis {:.1}°, {:.1}° off vertical", axis, deviation);
        deviation > self.config.italic_angle
    }

    fn font_size(&self, tokens: &[&Token]) -> i32 {
        mean(tokens.iter().filter(|t| t.height > 0).map(|t| t.height as f64))
            .map_or(self.config.default_font_size, |h| h.round() as i32)
    }

    /// Split at every consecutive pair whose top edges are more than the
    /// paragraph gap apart. Token order is preserved.
    fn paragraphs(&self, tokens: &[&Token]) -> Vec<ParagraphGroup> {
        let mut groups: Vec<ParagraphGroup> = Vec::new();
        let mut prev_y: Option<i32> = None;

        for &token in tokens {
            let same_paragraph =
                prev_y.is_some_and(|py| token.y - py <= self.config.paragraph_gap);
            prev_y = Some(token.y);

            match groups.last_mut() {
                Some(group) if same_paragraph => group.push(token.clone()),
                _ => groups.push(vec![token.clone()]),
            }
        }

        groups
    }
}

fn overall_confidence(tokens: &[Token]) -> f64 {
    mean(
        tokens
            .iter()
            .filter(|t| t.confidence > 0)
            .map(|t| t.confidence as f64),
    )
    .unwrap_or(f64::NAN)
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    (count > 0).then(|| sum / count as f64)
}
