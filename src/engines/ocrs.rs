//! OCRS engine implementation
//!
//! Pure Rust OCR engine using the ocrs library. No system dependencies required.
//! Downloads neural network models automatically on first use.

use super::download::{cache_dir, ensure_downloaded};
use crate::config::Config;
use crate::engine::{OcrEngine, Recognition, Token};
use crate::error::OcrError;
use image::DynamicImage;
use ocrs::{DecodeMethod, ImageSource, OcrEngine as OcrsOcrEngine, OcrEngineParams, TextItem};
use rten::Model;

/// Default model URLs from the ocrs project
const DETECTION_MODEL_URL: &str =
    "https://ocrs-models.s3-accelerate.amazonaws.com/text-detection.rten";
const RECOGNITION_MODEL_URL: &str =
    "https://ocrs-models.s3-accelerate.amazonaws.com/text-recognition.rten";

/// OCR Engine wrapping the ocrs library
pub struct OcrsEngine {
    engine: OcrsOcrEngine,
}

impl OcrsEngine {
    /// Create a new OCR processor, downloading models if needed
    pub fn new(config: &Config) -> Result<Self, OcrError> {
        tracing::info!("Initializing ocrs OCR engine...");

        let dir = cache_dir(config.model_dir.as_deref())?;
        let detection_model_path =
            ensure_downloaded(DETECTION_MODEL_URL, &dir, "text-detection.rten")?;
        let recognition_model_path =
            ensure_downloaded(RECOGNITION_MODEL_URL, &dir, "text-recognition.rten")?;

        let detection_model = Model::load_file(&detection_model_path).map_err(|e| {
            OcrError::InitializationError(format!("Failed to load detection model: {}", e))
        })?;
        let recognition_model = Model::load_file(&recognition_model_path).map_err(|e| {
            OcrError::InitializationError(format!("Failed to load recognition model: {}", e))
        })?;

        let engine = OcrsOcrEngine::new(OcrEngineParams {
            detection_model: Some(detection_model),
            recognition_model: Some(recognition_model),
            decode_method: DecodeMethod::Greedy,
            ..Default::default()
        })
        .map_err(|e| {
            OcrError::InitializationError(format!("Failed to create OCR engine: {}", e))
        })?;

        tracing::info!("ocrs engine initialized successfully");

        Ok(Self { engine })
    }
}

impl OcrEngine for OcrsEngine {
    fn name(&self) -> &'static str {
        "ocrs"
    }

    fn description(&self) -> &'static str {
        "Pure Rust OCR engine - fast, no system dependencies required"
    }

    fn recognize(&self, image: &DynamicImage, language: &str) -> Result<Recognition, OcrError> {
        if language != "eng" {
            tracing::warn!("ocrs only reads Latin script, ignoring language '{}'", language);
        }

        // HWC layout, which is what ImageSource::from_bytes expects
        let rgb_img = image.to_rgb8();
        let dimensions = rgb_img.dimensions();

        let img_source = ImageSource::from_bytes(rgb_img.as_raw(), dimensions).map_err(|e| {
            OcrError::Recognition(format!("Failed to create image source: {}", e))
        })?;

        let ocr_input = self
            .engine
            .prepare_input(img_source)
            .map_err(|e| OcrError::Recognition(format!("Failed to prepare input: {}", e)))?;

        let word_rects = self
            .engine
            .detect_words(&ocr_input)
            .map_err(|e| OcrError::Recognition(format!("Failed to detect words: {}", e)))?;

        let line_rects = self.engine.find_text_lines(&ocr_input, &word_rects);

        let line_texts = self
            .engine
            .recognize_text(&ocr_input, &line_rects)
            .map_err(|e| OcrError::Recognition(format!("Failed to recognize text: {}", e)))?;

        let mut lines = Vec::new();
        let mut tokens = Vec::new();

        for line in line_texts.iter().flatten() {
            let words: Vec<String> = line.words().map(|word| word.to_string()).collect();
            let line_text = words.join(" ");
            // ocrs has no per-word scores; every word inherits its line's
            let confidence = (calculate_confidence(&line_text) * 100.0).round() as i32;

            for word in line.words() {
                let rect = word.bounding_rect();
                tokens.push(Token::new(
                    word.to_string(),
                    rect.left(),
                    rect.top(),
                    rect.width(),
                    rect.height(),
                    confidence,
                ));
            }
            lines.push(line_text);
        }

        tracing::debug!("ocrs recognized {} lines, {} words", lines.len(), tokens.len());

        Ok(Recognition {
            full_text: lines.join("\n"),
            tokens,
        })
    }

    fn supported_languages(&self) -> Vec<String> {
        // ocrs currently only supports English/Latin alphabet
        vec!["eng".to_string()]
    }
}

// ============================================================================
// Confidence scoring heuristics
// ============================================================================

/// Calculate confidence score based on text quality heuristics.
///
/// Since ocrs doesn't provide per-character confidence scores, we analyze
/// the recognized text for patterns that indicate OCR quality.
fn calculate_confidence(text: &str) -> f32 {
    if text.is_empty() {
        return 0.0;
    }
    if text.len() < 5 {
        return 0.5; // Too short to judge accurately
    }

    let char_score = analyze_char_frequency(text);
    let word_score = analyze_word_lengths(text);
    let whitespace_score = analyze_whitespace(text);
    let repetition_score = detect_repetition(text);

    let confidence =
        0.40 * char_score + 0.30 * word_score + 0.15 * whitespace_score + 0.15 * repetition_score;

    confidence.clamp(0.0, 1.0)
}

/// Penalizes text with too many special/control characters or too few letters.
fn analyze_char_frequency(text: &str) -> f32 {
    let total = text.chars().count();
    if total == 0 {
        return 0.0;
    }

    let letters = text.chars().filter(|c| c.is_alphabetic()).count();
    let special = text
        .chars()
        .filter(|c| !c.is_alphanumeric() && !c.is_whitespace() && !c.is_ascii_punctuation())
        .count();

    let special_ratio = special as f32 / total as f32;
    let special_penalty = 1.0 - (special_ratio * 10.0).min(1.0);

    // Numeric-heavy lines still get partial credit
    let letter_ratio = letters as f32 / total as f32;
    let letter_score = (letter_ratio * 1.5).min(1.0);

    special_penalty * 0.6 + letter_score * 0.4
}

/// Garbled OCR often produces single-character "words" or very long runs.
fn analyze_word_lengths(text: &str) -> f32 {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.is_empty() {
        return 0.5;
    }

    let total_len: usize = words.iter().map(|w| w.len()).sum();
    let avg_len = total_len as f32 / words.len() as f32;

    let avg_score = match avg_len as usize {
        0..=1 => 0.3,
        2..=3 => 0.7,
        4..=8 => 1.0,
        9..=12 => 0.8,
        _ => 0.4,
    };

    let single_count = words.iter().filter(|w| w.len() == 1).count();
    let single_ratio = single_count as f32 / words.len() as f32;
    let single_penalty = 1.0 - (single_ratio * 1.5).min(0.5);

    avg_score * single_penalty
}

/// Normal text has ~10-25% whitespace.
fn analyze_whitespace(text: &str) -> f32 {
    let total = text.chars().count();
    if total == 0 {
        return 0.0;
    }

    let whitespace = text.chars().filter(|c| c.is_whitespace()).count();
    let ratio = (whitespace as f32 / total as f32) * 100.0;

    match ratio as usize {
        0..=5 => 0.5,
        6..=10 => 0.8,
        11..=25 => 1.0,
        26..=40 => 0.7,
        _ => 0.3,
    }
}

/// Runs like "aaaa" or "####" usually mean the recognizer lost track.
fn detect_repetition(text: &str) -> f32 {
    let mut max_repeat = 1;
    let mut current = 1;
    let mut prev: Option<char> = None;

    for c in text.chars() {
        if Some(c) == prev && !c.is_whitespace() {
            current += 1;
            max_repeat = max_repeat.max(current);
        } else {
            current = 1;
        }
        prev = Some(c);
    }

    match max_repeat {
        1..=3 => 1.0,
        4..=5 => 0.8,
        6..=10 => 0.5,
        _ => 0.2,
    }
}
