use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP server error: {0}")]
    Http(#[from] hyper::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    /// yt-dlp refused or failed the URL: unsupported site, missing format,
    /// geo restriction and so on. The message comes straight from yt-dlp.
    #[error("{0}")]
    Extraction(String),

    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("Environment error: {0}")]
    Environment(String),
}

/// The three failure classes a browser can tell apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Validation,
    Extraction,
    Environment,
}

impl AppError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            AppError::Validation(_) | AppError::Json(_) => ErrorCategory::Validation,
            AppError::Extraction(_) => ErrorCategory::Extraction,
            AppError::Config(_)
            | AppError::Io(_)
            | AppError::Http(_)
            | AppError::ToolNotFound(_)
            | AppError::Environment(_) => ErrorCategory::Environment,
        }
    }

    /// Message safe to show in the browser. Environment failures stay generic,
    /// the details only go to the log.
    pub fn user_message(&self) -> String {
        match self {
            AppError::Validation(msg) => msg.clone(),
            AppError::Json(e) => format!("Invalid request body: {}", e),
            AppError::Extraction(msg) => msg.clone(),
            _ => "The download failed on the server. Check the server log for details.".to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
