use crate::error::OcrError;
use crate::input::ensure_not_empty;
use image::DynamicImage;
use serde::Serialize;
use std::time::Instant;

use super::steps;
use super::steps::contrast::ContrastOptions;
use super::steps::denoise::DenoiseOptions;
use super::steps::deskew::DeskewOptions;
use super::steps::morphology::{MorphOperation, MorphologyOptions};
use super::steps::threshold::ThresholdMethod;

/// Caller-tunable part of the pipeline
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PipelineOptions {
    /// Magnification applied first (cubic interpolation)
    pub resize_scale: f32,
    /// Run non-local means denoising after resizing
    pub denoise: bool,
    pub denoise_options: DenoiseOptions,
    pub threshold: ThresholdMethod,
    pub morphology: MorphologyOptions,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            resize_scale: steps::resize::DEFAULT_SCALE,
            denoise: true,
            denoise_options: DenoiseOptions::default(),
            threshold: ThresholdMethod::default(),
            morphology: MorphologyOptions::default(),
        }
    }
}

impl PipelineOptions {
    pub fn with_threshold(mut self, threshold: ThresholdMethod) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_scale(mut self, resize_scale: f32) -> Self {
        self.resize_scale = resize_scale;
        self
    }

    pub fn with_denoise(mut self, denoise: bool) -> Self {
        self.denoise = denoise;
        self
    }
}

/// Timing information for a single preprocessing step
#[derive(Debug, Clone, Serialize)]
pub struct StepTiming {
    pub name: String,
    pub time_ms: u64,
}

/// Result of preprocessing including timing stats
#[derive(Debug, Clone, Serialize)]
pub struct PreprocessingResult {
    /// Preprocessed image (not serialized)
    #[serde(skip)]
    pub image: DynamicImage,
    /// Total preprocessing time in milliseconds
    pub total_time_ms: u64,
    /// Pipeline used
    pub pipeline: String,
    /// Individual step timings
    pub steps: Vec<StepTiming>,
}

/// Preprocessing pipeline
///
/// Stage order is fixed: [deskew] → [contrast] → resize → [denoise] →
/// grayscale → threshold → close/open cleanup. Deskew and contrast only run
/// in the optimal composition.
#[derive(Debug, Clone)]
pub struct Pipeline {
    name: &'static str,
    options: PipelineOptions,
    deskew: Option<DeskewOptions>,
    contrast: Option<ContrastOptions>,
}

impl Pipeline {
    pub fn new(options: PipelineOptions) -> Self {
        Self {
            name: "custom",
            options,
            deskew: None,
            contrast: None,
        }
    }

    /// Deskew, then contrast enhancement, then the default adaptive pipeline
    ///
    /// Rotation must come before binarization or its border artifacts get
    /// baked in as noise; adaptive thresholding expects equalized contrast.
    pub fn optimal() -> Self {
        Self {
            name: "optimal",
            options: PipelineOptions::default(),
            deskew: Some(DeskewOptions::default()),
            contrast: Some(ContrastOptions::strong()),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    /// Process an image through every configured stage
    pub fn process(&self, image: DynamicImage) -> Result<PreprocessingResult, OcrError> {
        ensure_not_empty(&image)?;

        let start = Instant::now();
        let mut steps_timing = Vec::new();
        let options = self.options;
        let mut img = image;

        if let Some(deskew) = self.deskew {
            img = self.run_step("deskew", img, &mut steps_timing, |i| {
                steps::deskew::apply(i, deskew)
            })?;
        }

        if let Some(contrast) = self.contrast {
            img = self.run_step("contrast", img, &mut steps_timing, |i| {
                steps::contrast::apply(i, contrast)
            })?;
        }

        img = self.run_step("resize", img, &mut steps_timing, |i| {
            steps::resize::apply(i, options.resize_scale)
        })?;

        if options.denoise {
            img = self.run_step("denoise", img, &mut steps_timing, |i| {
                steps::denoise::apply(i, options.denoise_options)
            })?;
        }

        img = self.run_step("grayscale", img, &mut steps_timing, steps::grayscale::apply)?;

        img = self.run_step("threshold", img, &mut steps_timing, |i| {
            steps::threshold::apply(i, options.threshold)
        })?;

        img = self.run_step("morphology", img, &mut steps_timing, |i| {
            steps::morphology::apply(i, options.morphology)
        })?;

        let total_time_ms = start.elapsed().as_millis() as u64;
        tracing::info!(
            "Preprocessing ({}) finished in {}ms: {}x{}, threshold={}",
            self.name,
            total_time_ms,
            img.width(),
            img.height(),
            options.threshold
        );

        Ok(PreprocessingResult {
            image: img,
            total_time_ms,
            pipeline: self.name.to_string(),
            steps: steps_timing,
        })
    }

    fn run_step<F>(
        &self,
        name: &str,
        img: DynamicImage,
        timings: &mut Vec<StepTiming>,
        step_fn: F,
    ) -> Result<DynamicImage, OcrError>
    where
        F: FnOnce(DynamicImage) -> Result<DynamicImage, OcrError>,
    {
        let step_start = Instant::now();
        let result = step_fn(img)?;
        let time_ms = step_start.elapsed().as_millis() as u64;
        tracing::debug!("Step {} took {}ms", name, time_ms);
        timings.push(StepTiming {
            name: name.to_string(),
            time_ms,
        });
        Ok(result)
    }
}

/// Resize, optionally denoise, binarize and clean up an image
pub fn preprocess(image: DynamicImage, options: &PipelineOptions) -> Result<DynamicImage, OcrError> {
    Pipeline::new(*options).process(image).map(|r| r.image)
}

/// Best average recognition accuracy: deskew, contrast, then [`preprocess`]
/// with default options
pub fn optimal_pipeline(image: DynamicImage) -> Result<DynamicImage, OcrError> {
    Pipeline::optimal().process(image).map(|r| r.image)
}

/// Rotate the image upright
pub fn deskew(image: DynamicImage) -> Result<DynamicImage, OcrError> {
    ensure_not_empty(&image)?;
    steps::deskew::apply(image, DeskewOptions::default())
}

/// Luminance-only tiled histogram equalization
pub fn enhance_contrast(image: DynamicImage, options: ContrastOptions) -> Result<DynamicImage, OcrError> {
    ensure_not_empty(&image)?;
    steps::contrast::apply(image, options)
}

/// A single morphological operation on the grayscale image
pub fn apply_morphology(
    image: DynamicImage,
    operation: MorphOperation,
    options: MorphologyOptions,
) -> Result<DynamicImage, OcrError> {
    ensure_not_empty(&image)?;
    steps::morphology::run(image, operation, options)
}
