use crate::cli::Args;
use std::path::PathBuf;

/// Runtime configuration shared by the commands
#[derive(Debug, Clone)]
pub struct Config {
    /// Language code passed to the recognizer (e.g. "eng", "deu")
    pub default_language: String,
    /// Engine to use instead of the registry default
    pub engine: Option<String>,
    /// Where downloaded models are cached
    pub model_dir: Option<PathBuf>,
    /// Directory with Tesseract `.traineddata` files
    pub tessdata_path: Option<PathBuf>,
}

impl From<&Args> for Config {
    fn from(args: &Args) -> Self {
        Self {
            default_language: args.default_language.clone(),
            engine: args.engine.clone(),
            model_dir: args.model_dir.clone(),
            tessdata_path: args.tessdata_path.clone(),
        }
    }
}
