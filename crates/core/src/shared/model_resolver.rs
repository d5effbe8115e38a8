use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::shared::constants::APP_CACHE_DIR;

#[derive(Error, Debug)]
pub enum ModelResolveError {
    #[error("model file not found: {0}")]
    NotFound(PathBuf),
    #[error("cannot derive a file name from model URL {0}")]
    BadUrl(String),
    #[error("failed to create cache directory: {0}")]
    CacheDir(#[source] std::io::Error),
    #[error("download failed for {url}: {source}")]
    Download {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("failed to write model to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not determine cache directory")]
    NoCacheDir,
}

/// Progress callback: `(bytes_downloaded, total_bytes)`.
/// `total_bytes` is 0 if the server didn't provide Content-Length.
pub type ProgressFn = Box<dyn Fn(u64, u64) + Send>;

/// Resolve a model artifact reference to a local file.
///
/// Local paths must already exist. `http://` and `https://` references are
/// downloaded once into the model cache and reused on later runs. Cache
/// entries are keyed by the full URL, so two models that share a file name
/// never share an entry.
pub fn resolve(reference: &str, progress: Option<ProgressFn>) -> Result<PathBuf, ModelResolveError> {
    if !is_url(reference) {
        let path = PathBuf::from(reference);
        return if path.is_file() {
            Ok(path)
        } else {
            Err(ModelResolveError::NotFound(path))
        };
    }

    resolve_url_into(&model_cache_dir()?, reference, progress)
}

fn resolve_url_into(
    cache_dir: &Path,
    url: &str,
    progress: Option<ProgressFn>,
) -> Result<PathBuf, ModelResolveError> {
    let cached_path = cache_dir.join(cache_file_name(url)?);
    if cached_path.exists() {
        log::debug!("Using cached model {}", cached_path.display());
        return Ok(cached_path);
    }

    fs::create_dir_all(cache_dir).map_err(ModelResolveError::CacheDir)?;
    log::info!("Downloading {url} to {}", cached_path.display());
    download(url, &cached_path, progress)?;
    Ok(cached_path)
}

pub fn is_url(reference: &str) -> bool {
    reference.starts_with("http://") || reference.starts_with("https://")
}

/// `<first 16 hex digits of sha256(url)>-<file name>`.
fn cache_file_name(url: &str) -> Result<String, ModelResolveError> {
    let name = file_name_from_url(url)?;
    let digest = hex::encode(Sha256::digest(url.as_bytes()));
    Ok(format!("{}-{name}", &digest[..16]))
}

/// Last non-empty path segment of a URL, ignoring query and fragment.
fn file_name_from_url(url: &str) -> Result<String, ModelResolveError> {
    let without_query = url.split(['?', '#']).next().unwrap_or(url);
    let after_scheme = without_query
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(without_query);
    match after_scheme.split_once('/') {
        Some((_, path)) => path
            .rsplit('/')
            .find(|segment| !segment.is_empty())
            .map(str::to_string)
            .ok_or_else(|| ModelResolveError::BadUrl(url.to_string())),
        None => Err(ModelResolveError::BadUrl(url.to_string())),
    }
}

/// Platform-specific model cache directory.
///
/// - macOS: `~/Library/Application Support/CashSight/models/`
/// - Linux: `$XDG_CACHE_HOME/CashSight/models/` or `~/.cache/CashSight/models/`
/// - Windows: `%LOCALAPPDATA%/CashSight/models/`
pub fn model_cache_dir() -> Result<PathBuf, ModelResolveError> {
    #[cfg(target_os = "macos")]
    {
        dirs::data_dir()
            .map(|d| d.join(APP_CACHE_DIR).join("models"))
            .ok_or(ModelResolveError::NoCacheDir)
    }
    #[cfg(not(target_os = "macos"))]
    {
        dirs::cache_dir()
            .map(|d| d.join(APP_CACHE_DIR).join("models"))
            .ok_or(ModelResolveError::NoCacheDir)
    }
}

fn download(url: &str, dest: &Path, progress: Option<ProgressFn>) -> Result<(), ModelResolveError> {
    let temp_path = dest.with_extension("part");

    let result = download_inner(url, dest, &temp_path, progress);

    // Never leave a truncated .part behind
    if result.is_err() {
        let _ = fs::remove_file(&temp_path);
    }

    result
}

fn download_inner(
    url: &str,
    dest: &Path,
    temp_path: &Path,
    progress: Option<ProgressFn>,
) -> Result<(), ModelResolveError> {
    let mut response = reqwest::blocking::get(url)
        .and_then(|r| r.error_for_status())
        .map_err(|e| ModelResolveError::Download {
            url: url.to_string(),
            source: e,
        })?;

    let total = response.content_length().unwrap_or(0);
    let mut downloaded: u64 = 0;

    let write_err = |e: std::io::Error| ModelResolveError::Write {
        path: temp_path.to_path_buf(),
        source: e,
    };

    let mut file = fs::File::create(temp_path).map_err(write_err)?;

    let mut buf = vec![0u8; 1024 * 1024];
    loop {
        let n = response.read(&mut buf).map_err(write_err)?;
        if n == 0 {
            break;
        }
        file.write_all(&buf[..n]).map_err(write_err)?;
        downloaded += n as u64;
        if let Some(ref cb) = progress {
            cb(downloaded, total);
        }
    }

    file.flush().map_err(write_err)?;
    drop(file);

    fs::rename(temp_path, dest).map_err(|e| ModelResolveError::Write {
        path: dest.to_path_buf(),
        source: e,
    })?;

    Ok(())
}
