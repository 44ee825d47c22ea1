//! Model and training-data cache shared by the engines

use crate::error::OcrError;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

const CACHE_DIR_NAME: &str = "docscan-ocr";

/// Directory holding downloaded models. `override_dir` wins over the
/// platform cache directory.
pub fn cache_dir(override_dir: Option<&Path>) -> Result<PathBuf, OcrError> {
    let dir = match override_dir {
        Some(dir) => dir.to_path_buf(),
        None => dirs::cache_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join(CACHE_DIR_NAME),
    };

    std::fs::create_dir_all(&dir).map_err(|e| {
        OcrError::InitializationError(format!(
            "Failed to create cache directory {}: {}",
            dir.display(),
            e
        ))
    })?;

    Ok(dir)
}

/// Return the cached copy of `filename` inside `dir`, downloading it first
/// when missing
pub fn ensure_downloaded(url: &str, dir: &Path, filename: &str) -> Result<PathBuf, OcrError> {
    let path = dir.join(filename);

    if path.exists() {
        tracing::info!("Using cached {} from {:?}", filename, path);
        return Ok(path);
    }

    tracing::info!("Downloading {} (this may take a moment)...", filename);
    download_file(url, &path)?;
    tracing::info!("Downloaded {} to {:?}", filename, path);

    Ok(path)
}

/// Download a file from URL to path using ureq
fn download_file(url: &str, path: &Path) -> Result<(), OcrError> {
    let response = ureq::get(url)
        .call()
        .map_err(|e| OcrError::InitializationError(format!("Failed to download {}: {}", url, e)))?;

    let buffer = response.into_body().read_to_vec().map_err(|e| {
        OcrError::InitializationError(format!("Failed to read response body: {}", e))
    })?;

    // Write under a temporary name so an interrupted download is not cached
    let partial = path.with_extension("part");
    let mut file = File::create(&partial).map_err(|e| {
        OcrError::InitializationError(format!("Failed to create {}: {}", partial.display(), e))
    })?;
    file.write_all(&buffer).map_err(|e| {
        OcrError::InitializationError(format!("Failed to write {}: {}", partial.display(), e))
    })?;
    std::fs::rename(&partial, path)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_override_dir_is_created() {
        let tmp = tempfile::tempdir().unwrap();
        let wanted = tmp.path().join("models");
        let dir = cache_dir(Some(&wanted)).unwrap();
        assert_eq!(dir, wanted);
        assert!(dir.is_dir());
    }

    #[test]
    fn test_cached_file_is_not_downloaded_again() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("model.rten"), b"weights").unwrap();

        // The URL is unreachable; success proves no request was made
        let path = ensure_downloaded("http://127.0.0.1:9/model.rten", tmp.path(), "model.rten")
            .unwrap();
        assert_eq!(std::fs::read(path).unwrap(), b"weights");
    }
}
