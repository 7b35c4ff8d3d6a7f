//! Training data provisioning
//!
//! Resolves the datapath a session will use and fetches missing
//! `<lang>.traineddata` files from tessdata_fast on request.

use crate::error::OcrError;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

// Best-quality models run well past the client's default body limit
const MAX_TRAINEDDATA_BYTES: u64 = 256 * 1024 * 1024;

/// Default download location when no datapath is configured
pub fn cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("ocr-session")
        .join("tessdata")
}

/// Individual models named by a language spec such as `eng+deu`
pub fn languages(spec: &str) -> Vec<&str> {
    spec.split('+')
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect()
}

/// Languages of `spec` with no traineddata file in `dir`
pub fn missing_languages<'a>(dir: &Path, spec: &'a str) -> Vec<&'a str> {
    languages(spec)
        .into_iter()
        .filter(|lang| !traineddata_path(dir, lang).exists())
        .collect()
}

fn traineddata_path(dir: &Path, language: &str) -> PathBuf {
    dir.join(format!("{}.traineddata", language))
}

/// Ensure every language of `spec` is present in `dir`, downloading if needed
pub fn ensure_available(dir: &Path, spec: &str) -> Result<(), OcrError> {
    std::fs::create_dir_all(dir).map_err(|e| {
        OcrError::InitializationError(format!("Failed to create tessdata directory: {}", e))
    })?;

    for language in missing_languages(dir, spec) {
        let target = traineddata_path(dir, language);
        tracing::info!(
            "Downloading tessdata for '{}' (this may take a moment)...",
            language
        );
        download_file(&tessdata_url(language), &target)?;
        tracing::info!("Downloaded tessdata to {:?}", target);
    }

    Ok(())
}

fn tessdata_url(language: &str) -> String {
    format!(
        "https://github.com/tesseract-ocr/tessdata_fast/raw/main/{}.traineddata",
        language
    )
}

fn download_file(url: &str, path: &Path) -> Result<(), OcrError> {
    let response = ureq::get(url)
        .call()
        .map_err(|e| OcrError::InitializationError(format!("Failed to download tessdata: {}", e)))?;

    let buffer = response
        .into_body()
        .with_config()
        .limit(MAX_TRAINEDDATA_BYTES)
        .read_to_vec()
        .map_err(|e| {
            OcrError::InitializationError(format!("Failed to read tessdata response: {}", e))
        })?;

    // Write beside the target first so an interrupted download never looks complete
    let partial = path.with_extension("traineddata.part");
    let mut file = File::create(&partial).map_err(|e| {
        OcrError::InitializationError(format!("Failed to create tessdata file: {}", e))
    })?;
    file.write_all(&buffer).map_err(|e| {
        OcrError::InitializationError(format!("Failed to write tessdata file: {}", e))
    })?;
    std::fs::rename(&partial, path)?;

    Ok(())
}
