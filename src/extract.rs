//! Text extraction on top of any [`OcrEngine`]

use crate::engine::OcrEngine;
use crate::error::OcrError;
use crate::formatting::{FormattingAnalyzer, FormattingResult};
use image::DynamicImage;
use serde::Serialize;

/// Words at or below this confidence are left out of confidence extraction
pub const DEFAULT_MIN_CONFIDENCE: i32 = 30;

#[derive(Debug, Clone, Serialize)]
pub struct FormattedExtraction {
    pub text: String,
    pub formatting: FormattingResult,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WordConfidence {
    pub word: String,
    pub confidence: i32,
    /// Top-left corner of the word box
    pub position: (i32, i32),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfidenceExtraction {
    /// Surviving words joined by single spaces
    pub text: String,
    pub words: Vec<WordConfidence>,
    /// 0.0 when no word survives
    pub average_confidence: f64,
}

/// Plain recognized text, trimmed
pub fn extract_text(
    engine: &dyn OcrEngine,
    image: &DynamicImage,
    language: &str,
) -> Result<String, OcrError> {
    let recognition = engine.recognize(image, language)?;
    Ok(recognition.full_text.trim().to_string())
}

/// Recognized text together with the layout analysis of its tokens
pub fn extract_text_with_formatting(
    engine: &dyn OcrEngine,
    image: &DynamicImage,
    language: &str,
    analyzer: &FormattingAnalyzer,
) -> Result<FormattedExtraction, OcrError> {
    let recognition = engine.recognize(image, language)?;
    let formatting = analyzer.analyze(image, &recognition.tokens);

    Ok(FormattedExtraction {
        text: recognition.full_text.trim().to_string(),
        formatting,
    })
}

/// Words above `min_confidence` with their scores and positions
pub fn extract_text_with_confidence(
    engine: &dyn OcrEngine,
    image: &DynamicImage,
    language: &str,
    min_confidence: i32,
) -> Result<ConfidenceExtraction, OcrError> {
    let recognition = engine.recognize(image, language)?;

    let words: Vec<WordConfidence> = recognition
        .tokens
        .into_iter()
        .filter(|t| t.confidence > min_confidence)
        .map(|t| WordConfidence {
            word: t.text,
            confidence: t.confidence,
            position: (t.x, t.y),
        })
        .collect();

    let average_confidence = if words.is_empty() {
        0.0
    } else {
        words.iter().map(|w| w.confidence as f64).sum::<f64>() / words.len() as f64
    };

    let text = words
        .iter()
        .map(|w| w.word.as_str())
        .collect::<Vec<_>>()
        .join(" ");

    tracing::debug!(
        "{} words above confidence {}, average {:.1}",
        words.len(),
        min_confidence,
        average_confidence
    );

    Ok(ConfidenceExtraction {
        text,
        words,
        average_confidence,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{Recognition, Token};
    use image::GrayImage;

    struct Canned(Result<Recognition, String>);

    impl OcrEngine for Canned {
        fn name(&self) -> &'static str {
            "canned"
        }

        fn description(&self) -> &'static str {
            "returns a fixed recognition"
        }

        fn recognize(&self, _: &DynamicImage, _: &str) -> Result<Recognition, OcrError> {
            self.0.clone().map_err(OcrError::Recognition)
        }

        fn supported_languages(&self) -> Vec<String> {
            vec!["eng".to_string()]
        }
    }

    fn receipt() -> Canned {
        Canned(Ok(Recognition {
            full_text: "  Total 12.50\n".to_string(),
            tokens: vec![
                Token::new("Total", 20, 40, 60, 18, 92),
                Token::new("12.50", 100, 41, 50, 18, 84),
                Token::new("~~", 300, 90, 10, 5, 12),
            ],
        }))
    }

    fn image() -> DynamicImage {
        DynamicImage::ImageLuma8(GrayImage::new(400, 120))
    }

    #[test]
    fn test_extract_text_trims() {
        assert_eq!(extract_text(&receipt(), &image(), "eng").unwrap(), "Total 12.50");
    }

    #[test]
    fn test_confidence_extraction_filters_words() {
        let result =
            extract_text_with_confidence(&receipt(), &image(), "eng", DEFAULT_MIN_CONFIDENCE)
                .unwrap();
        assert_eq!(result.text, "Total 12.50");
        assert_eq!(result.words.len(), 2);
        assert_eq!(result.words[1].position, (100, 41));
        assert!((result.average_confidence - 88.0).abs() < 1e-9);
    }

    #[test]
    fn test_confidence_extraction_without_survivors() {
        let result = extract_text_with_confidence(&receipt(), &image(), "eng", 95).unwrap();
        assert!(result.words.is_empty());
        assert_eq!(result.text, "");
        assert_eq!(result.average_confidence, 0.0);
    }

    #[test]
    fn test_formatting_extraction() {
        let result = extract_text_with_formatting(
            &receipt(),
            &image(),
            "eng",
            &FormattingAnalyzer::default(),
        )
        .unwrap();
        assert_eq!(result.text, "Total 12.50");
        assert_eq!(result.formatting.text_blocks.len(), 1);
        assert_eq!(result.formatting.formatting.font_size_estimate, 18);
    }

    #[test]
    fn test_recognition_error_surfaces_unchanged() {
        let broken = Canned(Err("model crashed".to_string()));
        let err = extract_text(&broken, &image(), "eng").unwrap_err();
        assert!(matches!(err, OcrError::Recognition(ref msg) if msg == "model crashed"));
    }
}
