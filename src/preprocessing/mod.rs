//! Image preprocessing module for OCR enhancement
//!
//! Provides configurable preprocessing pipelines to improve OCR accuracy.

pub mod pipeline;
pub mod steps;

pub use pipeline::{
    apply_morphology, deskew, enhance_contrast, optimal_pipeline, preprocess, Pipeline,
    PipelineOptions, PreprocessingResult, StepTiming,
};
pub use steps::contrast::ContrastOptions;
pub use steps::denoise::DenoiseOptions;
pub use steps::deskew::DeskewOptions;
pub use steps::morphology::{MorphOperation, MorphologyOptions};
pub use steps::threshold::ThresholdMethod;
