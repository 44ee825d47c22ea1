//! Command-line surface
//!
//! Every command reads its inputs from disk, runs one library operation and
//! prints a JSON report on stdout. Images are written where `output` points.

use crate::config::Config;
use crate::engine::{OcrEngine, Token};
use crate::engines::EngineRegistry;
use crate::error::OcrError;
use crate::extract::{
    extract_text, extract_text_with_confidence, extract_text_with_formatting,
    DEFAULT_MIN_CONFIDENCE,
};
use crate::formatting::FormattingAnalyzer;
use crate::input::{load_from_path, save_image};
use crate::preprocessing::steps::morphology::STANDALONE_KERNEL_SIZE;
use crate::preprocessing::steps::threshold::DEFAULT_FIXED_VALUE;
use crate::preprocessing::{
    apply_morphology, deskew, enhance_contrast, ContrastOptions, MorphOperation,
    MorphologyOptions, Pipeline, PipelineOptions, ThresholdMethod,
};
use clap::{Parser, Subcommand, ValueEnum};
use image::DynamicImage;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Instant;

#[derive(Parser, Debug)]
#[command(name = "docscan-ocr")]
#[command(about = "Prepare document scans for OCR and analyze the recognized layout")]
#[command(version)]
pub struct Args {
    /// Default language for OCR (e.g., "eng", "deu", "fra")
    #[arg(long, global = true, env = "OCR_DEFAULT_LANGUAGE", default_value = "eng")]
    pub default_language: String,

    /// OCR engine to use (defaults to the first one compiled in)
    #[arg(long, global = true, env = "OCR_ENGINE")]
    pub engine: Option<String>,

    /// Directory for downloaded recognition models
    #[arg(long, global = true, env = "OCR_MODEL_DIR")]
    pub model_dir: Option<PathBuf>,

    /// Path to tessdata directory
    #[arg(long, global = true, env = "TESSDATA_PREFIX")]
    pub tessdata_path: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "RUST_LOG", default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Resize, denoise, binarize and clean up an image
    Preprocess {
        input: PathBuf,
        output: PathBuf,
        /// Magnification factor
        #[arg(long, default_value_t = 2.0)]
        scale: f32,
        /// Skip non-local means denoising
        #[arg(long)]
        no_denoise: bool,
        /// adaptive, otsu or fixed
        #[arg(long, default_value = "adaptive")]
        threshold: String,
        /// Cutoff for the fixed threshold
        #[arg(long, default_value_t = DEFAULT_FIXED_VALUE)]
        fixed_value: u8,
        /// Run the deskew + contrast + default pipeline instead
        #[arg(long, conflicts_with_all = ["scale", "no_denoise", "threshold", "fixed_value"])]
        optimal: bool,
    },
    /// Rotate a skewed scan upright
    Deskew { input: PathBuf, output: PathBuf },
    /// Contrast-limited local histogram equalization of the luminance
    Enhance {
        input: PathBuf,
        output: PathBuf,
        #[arg(long, default_value_t = 2.0)]
        clip_limit: f32,
        /// Tiles per side of the equalization grid
        #[arg(long, default_value_t = 8)]
        tile_size: u32,
    },
    /// A single morphological operation
    Morphology {
        input: PathBuf,
        output: PathBuf,
        /// close, open, dilate or erode
        #[arg(long, default_value = "close")]
        operation: String,
        #[arg(long, default_value_t = STANDALONE_KERNEL_SIZE)]
        kernel_size: u32,
        #[arg(long, default_value_t = 1)]
        iterations: u32,
    },
    /// Formatting analysis of an image and its recognized tokens (JSON array)
    Analyze { image: PathBuf, tokens: PathBuf },
    /// Recognize text with an OCR engine
    Extract {
        input: PathBuf,
        #[arg(long, value_enum, default_value_t = ExtractMode::Plain)]
        mode: ExtractMode,
        /// Run the optimal preprocessing pipeline first
        #[arg(long)]
        preprocess: bool,
        /// Override the default language
        #[arg(long)]
        language: Option<String>,
        /// Confidence cutoff for `--mode confidence`
        #[arg(long, default_value_t = DEFAULT_MIN_CONFIDENCE)]
        min_confidence: i32,
    },
    /// List the available OCR engines
    Engines,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExtractMode {
    Plain,
    Formatting,
    Confidence,
}

/// Report for commands that write an image
#[derive(Serialize)]
pub struct ImageReport {
    pub output: String,
    pub width: u32,
    pub height: u32,
    pub processing_time_ms: u64,
}

/// Extraction report
#[derive(Serialize)]
pub struct ExtractResponse<T: Serialize> {
    pub engine: String,
    pub language: String,
    pub processing_time_ms: u64,
    #[serde(flatten)]
    pub result: T,
}

#[derive(Serialize)]
struct PlainText {
    text: String,
}

#[derive(Serialize)]
struct EnginesResponse {
    version: String,
    default_engine: String,
    available_engines: Vec<crate::engines::EngineInfo>,
    default_language: String,
}

/// Run the parsed command
pub fn run(args: &Args) -> Result<(), OcrError> {
    let config = Config::from(args);

    match &args.command {
        Command::Preprocess {
            input,
            output,
            scale,
            no_denoise,
            threshold,
            fixed_value,
            optimal,
        } => {
            let pipeline = if *optimal {
                Pipeline::optimal()
            } else {
                let options = PipelineOptions::default()
                    .with_scale(*scale)
                    .with_denoise(!no_denoise)
                    .with_threshold(ThresholdMethod::from_name(threshold, *fixed_value)?);
                Pipeline::new(options)
            };

            let image = load_from_path(input)?;
            let result = pipeline.process(image)?;
            save_image(&result.image, output)?;
            print_json(&result)
        }
        Command::Deskew { input, output } => transform(input, output, deskew),
        Command::Enhance {
            input,
            output,
            clip_limit,
            tile_size,
        } => {
            let options = ContrastOptions {
                clip_limit: *clip_limit,
                tile_size: *tile_size,
            };
            transform(input, output, |image| enhance_contrast(image, options))
        }
        Command::Morphology {
            input,
            output,
            operation,
            kernel_size,
            iterations,
        } => {
            let operation: MorphOperation = operation.parse()?;
            let options = MorphologyOptions {
                kernel_size: *kernel_size,
                iterations: *iterations,
            };
            transform(input, output, |image| {
                apply_morphology(image, operation, options)
            })
        }
        Command::Analyze { image, tokens } => {
            let image = load_from_path(image)?;
            let tokens: Vec<Token> = serde_json::from_str(&std::fs::read_to_string(tokens)?)?;
            let result = FormattingAnalyzer::default().analyze(&image, &tokens);
            print_json(&result)
        }
        Command::Extract {
            input,
            mode,
            preprocess,
            language,
            min_confidence,
        } => {
            let registry = EngineRegistry::new(&config)?;
            let engine = registry.default().ok_or_else(|| {
                OcrError::InitializationError("No default OCR engine".to_string())
            })?;
            let language = language
                .clone()
                .unwrap_or_else(|| config.default_language.clone());

            let mut image = load_from_path(input)?;
            if *preprocess {
                image = Pipeline::optimal().process(image)?.image;
            }

            extract(
                engine.as_ref(),
                &image,
                &language,
                *mode,
                *min_confidence,
            )
        }
        Command::Engines => {
            let registry = EngineRegistry::new(&config)?;
            print_json(&EnginesResponse {
                version: env!("CARGO_PKG_VERSION").to_string(),
                default_engine: registry.default_name().to_string(),
                available_engines: registry.info(),
                default_language: config.default_language.clone(),
            })
        }
    }
}

fn extract(
    engine: &dyn OcrEngine,
    image: &DynamicImage,
    language: &str,
    mode: ExtractMode,
    min_confidence: i32,
) -> Result<(), OcrError> {
    let start = Instant::now();

    match mode {
        ExtractMode::Plain => {
            let text = extract_text(engine, image, language)?;
            tracing::info!("OCR completed, text length: {}", text.len());
            print_json(&respond(engine, language, start, PlainText { text }))
        }
        ExtractMode::Formatting => {
            let analyzer = FormattingAnalyzer::default();
            let result = extract_text_with_formatting(engine, image, language, &analyzer)?;
            tracing::info!(
                "OCR completed, {} paragraphs, alignment {:?}",
                result.formatting.text_blocks.len(),
                result.formatting.alignment
            );
            print_json(&respond(engine, language, start, result))
        }
        ExtractMode::Confidence => {
            let result = extract_text_with_confidence(engine, image, language, min_confidence)?;
            tracing::info!(
                "OCR completed, {} words, average confidence {:.1}",
                result.words.len(),
                result.average_confidence
            );
            print_json(&respond(engine, language, start, result))
        }
    }
}

fn respond<T: Serialize>(
    engine: &dyn OcrEngine,
    language: &str,
    start: Instant,
    result: T,
) -> ExtractResponse<T> {
    ExtractResponse {
        engine: engine.name().to_string(),
        language: language.to_string(),
        processing_time_ms: start.elapsed().as_millis() as u64,
        result,
    }
}

/// Load, apply one operation, save, report
fn transform<F>(input: &Path, output: &Path, op: F) -> Result<(), OcrError>
where
    F: FnOnce(DynamicImage) -> Result<DynamicImage, OcrError>,
{
    let start = Instant::now();
    let result = op(load_from_path(input)?)?;
    save_image(&result, output)?;

    print_json(&ImageReport {
        output: output.display().to_string(),
        width: result.width(),
        height: result.height(),
        processing_time_ms: start.elapsed().as_millis() as u64,
    })
}

fn print_json<T: Serialize>(value: &T) -> Result<(), OcrError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_global_options_after_subcommand() {
        let args = Args::try_parse_from([
            "docscan-ocr",
            "deskew",
            "in.png",
            "out.png",
            "--default-language",
            "deu",
        ])
        .unwrap();
        assert_eq!(Config::from(&args).default_language, "deu");
        assert!(matches!(args.command, Command::Deskew { .. }));
    }

    #[test]
    fn test_optimal_conflicts_with_threshold() {
        let parsed = Args::try_parse_from([
            "docscan-ocr",
            "preprocess",
            "in.png",
            "out.png",
            "--optimal",
            "--threshold",
            "otsu",
        ]);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_extract_mode_values() {
        let args = Args::try_parse_from([
            "docscan-ocr",
            "extract",
            "scan.png",
            "--mode",
            "confidence",
        ])
        .unwrap();
        match args.command {
            Command::Extract {
                mode,
                min_confidence,
                ..
            } => {
                assert_eq!(mode, ExtractMode::Confidence);
                assert_eq!(min_confidence, 30);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }
}
