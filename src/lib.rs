//! Document scan normalization for OCR and formatting analysis of the
//! recognized tokens.
//!
//! Images go through [`preprocessing`] before recognition; the recognizer's
//! tokens go through [`formatting::FormattingAnalyzer`] afterwards.

pub mod cli;
pub mod config;
pub mod engine;
pub mod engines;
pub mod error;
pub mod extract;
pub mod formatting;
pub mod geometry;
pub mod input;
pub mod preprocessing;

pub use engine::{OcrEngine, Recognition, Token};
pub use error::OcrError;
pub use extract::{
    extract_text, extract_text_with_confidence, extract_text_with_formatting,
    ConfidenceExtraction, FormattedExtraction, WordConfidence,
};
pub use formatting::{
    Alignment, AnalyzerConfig, FormattingAnalyzer, FormattingResult, ParagraphGroup,
    TextProperties,
};
pub use input::{load_from_memory, load_from_path, load_image, save_image, ImageSource};
