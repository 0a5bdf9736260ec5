use crate::errors::{AppError, Result};
use url::Url;
use std::path::Path;

const MAX_URL_LENGTH: usize = 2048;

#[derive(Debug, Clone, Default)]
pub struct InputValidator;

impl InputValidator {
    pub fn new() -> Self {
        Self
    }

    /// Local checks only. Whether the site is supported is yt-dlp's call.
    pub fn validate_url(&self, url: &str) -> Result<Url> {
        let url = url.trim();
        if url.is_empty() {
            return Err(AppError::Validation("URL is required".to_string()));
        }

        if url.len() > MAX_URL_LENGTH {
            return Err(AppError::Validation(format!(
                "URL too long (max {} characters)",
                MAX_URL_LENGTH
            )));
        }

        let parsed_url = Url::parse(url)
            .map_err(|e| AppError::Validation(format!("Invalid URL: {}", e)))?;

        if !matches!(parsed_url.scheme(), "http" | "https") {
            return Err(AppError::Validation(format!(
                "Unsupported URL scheme '{}'. Only http and https links can be downloaded",
                parsed_url.scheme()
            )));
        }

        match parsed_url.host_str() {
            Some(host) if !host.is_empty() => Ok(parsed_url),
            _ => Err(AppError::Validation("URL must have a host".to_string())),
        }
    }

    /// The destination must be an existing, writable directory. Failing here
    /// is a server problem, not the user's.
    pub fn validate_download_path(&self, path: &Path) -> Result<()> {
        let metadata = std::fs::metadata(path).map_err(|e| {
            AppError::Environment(format!("Download path {:?} is not accessible: {}", path, e))
        })?;

        if !metadata.is_dir() {
            return Err(AppError::Environment(format!(
                "Download path {:?} is not a directory",
                path
            )));
        }

        if metadata.permissions().readonly() {
            return Err(AppError::Environment(format!(
                "Download path {:?} is read-only",
                path
            )));
        }

        Ok(())
    }
}
