use crate::error::OcrError;
use image::DynamicImage;
use serde::{Deserialize, Serialize};

/// Confidence reported for a box the recognizer found but could not read
pub const NO_RECOGNITION: i32 = -1;

/// One recognized text unit with its bounding box
///
/// Deserialized tokens go through [`Token::new`], so the confidence bounds
/// hold for recognizer output read from JSON as well.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawToken")]
pub struct Token {
    pub text: String,
    /// Left edge in pixels
    pub x: i32,
    /// Top edge in pixels
    pub y: i32,
    pub width: i32,
    pub height: i32,
    /// 0..=100, or [`NO_RECOGNITION`]
    pub confidence: i32,
}

impl Token {
    /// Build a token, clamping the confidence into `0..=100`. Any negative
    /// value collapses to the [`NO_RECOGNITION`] sentinel.
    pub fn new(
        text: impl Into<String>,
        x: i32,
        y: i32,
        width: i32,
        height: i32,
        confidence: i32,
    ) -> Self {
        Self {
            text: text.into(),
            x,
            y,
            width,
            height,
            confidence: if confidence < 0 {
                NO_RECOGNITION
            } else {
                confidence.min(100)
            },
        }
    }
}

/// Token as it appears on the wire, before clamping
#[derive(Deserialize)]
struct RawToken {
    text: String,
    x: i32,
    y: i32,
    width: i32,
    height: i32,
    confidence: i32,
}

impl From<RawToken> for Token {
    fn from(raw: RawToken) -> Self {
        Token::new(
            raw.text,
            raw.x,
            raw.y,
            raw.width,
            raw.height,
            raw.confidence,
        )
    }
}

/// Everything a recognizer returns for one image
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Recognition {
    pub full_text: String,
    /// Tokens in recognition order (top to bottom)
    pub tokens: Vec<Token>,
}

/// Trait that all OCR engines must implement
pub trait OcrEngine: Send + Sync {
    /// Returns the engine identifier (e.g., "ocrs", "leptess")
    fn name(&self) -> &'static str;

    /// Returns a human-readable description of the engine
    fn description(&self) -> &'static str;

    /// Recognize the text of an already-decoded image
    fn recognize(&self, image: &DynamicImage, language: &str) -> Result<Recognition, OcrError>;

    /// Get supported languages
    fn supported_languages(&self) -> Vec<String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confidence_is_clamped() {
        assert_eq!(Token::new("a", 0, 0, 1, 1, 250).confidence, 100);
        assert_eq!(Token::new("a", 0, 0, 1, 1, 57).confidence, 57);
        assert_eq!(Token::new("a", 0, 0, 1, 1, -40).confidence, NO_RECOGNITION);
    }

    #[test]
    fn test_token_json_shape() {
        let token = Token::new("Invoice", 12, 30, 80, 22, 91);
        let json = serde_json::to_value(&token).unwrap();
        assert_eq!(json["text"], "Invoice");
        assert_eq!(json["x"], 12);
        assert_eq!(json["confidence"], 91);

        let back: Token = serde_json::from_value(json).unwrap();
        assert_eq!(back, token);
    }

    #[test]
    fn test_deserialized_confidence_is_clamped() {
        let high: Token = serde_json::from_str(
            r#"{"text":"a","x":0,"y":0,"width":1,"height":1,"confidence":250}"#,
        )
        .unwrap();
        assert_eq!(high.confidence, 100);

        let negative: Token = serde_json::from_str(
            r#"{"text":"a","x":0,"y":0,"width":1,"height":1,"confidence":-7}"#,
        )
        .unwrap();
        assert_eq!(negative.confidence, NO_RECOGNITION);
    }

    #[test]
    fn test_recognition_tokens_are_clamped() {
        let recognition: Recognition = serde_json::from_str(
            r#"{"full_text":"a","tokens":[{"text":"a","x":0,"y":0,"width":1,"height":1,"confidence":101}]}"#,
        )
        .unwrap();
        assert_eq!(recognition.tokens[0].confidence, 100);
    }
}
