//! Leptess/Tesseract engine implementation
//!
//! Tesseract-based OCR engine. Better for noisy/messy images like phone photos.
//! Uses tesseract-static crate for static linking (no system dependencies).
//! Downloads tessdata (training data) automatically on first use.

use super::download::{cache_dir, ensure_downloaded};
use crate::config::Config;
use crate::engine::{OcrEngine, Recognition, Token};
use crate::error::OcrError;
use image::DynamicImage;
use std::path::PathBuf;
use tesseract_static::tesseract::Tesseract;

/// Tesseract's result level for single words
const WORD_LEVEL: i32 = 5;

/// Tesseract OCR Engine
pub struct LeptessEngine {
    /// Directory holding `<lang>.traineddata` files
    tessdata_dir: PathBuf,
}

impl LeptessEngine {
    /// Create a new Tesseract-based OCR engine
    pub fn new(config: &Config) -> Result<Self, OcrError> {
        let tessdata_dir = match &config.tessdata_path {
            Some(path) => path.clone(),
            None => cache_dir(config.model_dir.as_deref())?.join("tessdata"),
        };
        std::fs::create_dir_all(&tessdata_dir)?;

        let engine = Self { tessdata_dir };

        // Validate that tessdata is accessible by doing a test initialization
        engine.tesseract(&config.default_language)?;

        tracing::info!(
            "Leptess engine initialized (tessdata: {:?}, language: {})",
            engine.tessdata_dir,
            config.default_language
        );

        Ok(engine)
    }

    /// A fresh Tesseract handle for `language`, fetching its training data
    /// on first use
    fn tesseract(&self, language: &str) -> Result<Tesseract, OcrError> {
        let filename = format!("{}.traineddata", language);
        ensure_downloaded(&tessdata_url(language), &self.tessdata_dir, &filename)?;

        let datapath = self
            .tessdata_dir
            .to_str()
            .ok_or_else(|| OcrError::InitializationError("Invalid tessdata path".to_string()))?;

        Tesseract::new(Some(datapath), Some(language)).map_err(|e| {
            OcrError::InitializationError(format!("Failed to initialize Tesseract: {}", e))
        })
    }
}

impl OcrEngine for LeptessEngine {
    fn name(&self) -> &'static str {
        "leptess"
    }

    fn description(&self) -> &'static str {
        "Tesseract OCR engine - better for noisy/messy images like phone photos"
    }

    fn recognize(&self, image: &DynamicImage, language: &str) -> Result<Recognition, OcrError> {
        let rgb_img = image.to_rgb8();
        let (width, height) = rgb_img.dimensions();

        // BMP is always supported by leptonica
        let mut bmp_data = Vec::new();
        rgb_img
            .write_to(&mut std::io::Cursor::new(&mut bmp_data), image::ImageFormat::Bmp)
            .map_err(|e| OcrError::Recognition(format!("Failed to convert to BMP: {}", e)))?;

        tracing::debug!(
            "Processing image: {}x{}, BMP size: {} bytes",
            width,
            height,
            bmp_data.len()
        );

        let mut tess = self
            .tesseract(language)
            .map_err(|e| OcrError::Recognition(e.to_string()))?
            .set_image_from_mem(&bmp_data)
            .map_err(|e| {
                OcrError::Recognition(format!("Failed to set image ({}x{}): {}", width, height, e))
            })?
            .recognize()
            .map_err(|e| OcrError::Recognition(format!("Failed to recognize text: {}", e)))?;

        let full_text = tess
            .get_text()
            .map_err(|e| OcrError::Recognition(format!("Failed to get text: {}", e)))?;
        let tsv = tess
            .get_tsv_text(0)
            .map_err(|e| OcrError::Recognition(format!("Failed to get word boxes: {}", e)))?;

        Ok(Recognition {
            full_text: full_text.trim().to_string(),
            tokens: parse_tsv(&tsv),
        })
    }

    fn supported_languages(&self) -> Vec<String> {
        // Any tessdata_fast language works; these are the common ones
        [
            "eng", "deu", "fra", "spa", "ita", "por", "nld", "jpn", "chi_sim", "chi_tra", "kor",
            "ara", "rus",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect()
    }
}

/// Word tokens from Tesseract's TSV output, in reading order.
///
/// Columns: level, page, block, paragraph, line, word, left, top, width,
/// height, conf, text. Header and non-word rows are skipped.
fn parse_tsv(tsv: &str) -> Vec<Token> {
    tsv.lines()
        .filter_map(|row| {
            let cols: Vec<&str> = row.split('\t').collect();
            if cols.len() < 12 || cols[0].parse::<i32>().ok()? != WORD_LEVEL {
                return None;
            }

            let text = cols[11].trim();
            if text.is_empty() {
                return None;
            }

            let int = |i: usize| cols[i].trim().parse::<i32>().ok();
            let confidence = cols[10].trim().parse::<f32>().ok()?.round() as i32;

            Some(Token::new(text, int(6)?, int(7)?, int(8)?, int(9)?, confidence))
        })
        .collect()
}

/// Get tessdata download URL for a language
fn tessdata_url(language: &str) -> String {
    // Use tessdata_fast for smaller, faster downloads
    format!(
        "https://github.com/tesseract-ocr/tessdata_fast/raw/main/{}.traineddata",
        language
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    const TSV: &str = "level\tpage_num\tblock_num\tpar_num\tline_num\tword_num\tleft\ttop\twidth\theight\tconf\ttext
1\t1\t0\t0\t0\t0\t0\t0\t640\t480\t-1\t
4\t1\t1\t1\t1\t0\t36\t92\t310\t24\t-1\t
5\t1\t1\t1\t1\t1\t36\t92\t120\t24\t96.412\tInvoice
5\t1\t1\t1\t1\t2\t170\t93\t98\t23\t88.9\t#2024
5\t1\t1\t1\t1\t3\t280\t92\t10\t24\t95\t
5\t1\t1\t1\t2\t1\t36\t140\t60\t20\t-1\t~";

    #[test]
    fn test_parse_tsv_keeps_words_only() {
        let tokens = parse_tsv(TSV);
        assert_eq!(tokens.len(), 3);
        assert_eq!(tokens[0], Token::new("Invoice", 36, 92, 120, 24, 96));
        assert_eq!(tokens[1].text, "#2024");
        assert_eq!(tokens[1].confidence, 89);
    }

    #[test]
    fn test_unread_word_keeps_sentinel() {
        let tokens = parse_tsv(TSV);
        assert_eq!(tokens[2].text, "~");
        assert_eq!(tokens[2].confidence, crate::engine::NO_RECOGNITION);
    }

    #[test]
    fn test_tessdata_url() {
        assert!(tessdata_url("deu").ends_with("/deu.traineddata"));
    }
}
