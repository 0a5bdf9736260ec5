pub mod format;
pub mod manager;
pub mod progress;
pub mod ytdlp;

use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use crate::errors::{AppError, Result};

pub use format::FormatSelection;
pub use manager::DownloadManager;
pub use progress::{JobState, ProgressRegistry, ProgressSink};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaType {
    Video,
    Audio,
}

impl MediaType {
    pub fn default_quality(&self) -> Quality {
        match self {
            MediaType::Video => Quality::Video(VideoQuality::P720),
            MediaType::Audio => Quality::Audio(AudioBitrate::Kbps192),
        }
    }

    pub fn qualities(&self) -> Vec<Quality> {
        match self {
            MediaType::Video => VideoQuality::ALL.iter().copied().map(Quality::Video).collect(),
            MediaType::Audio => AudioBitrate::ALL.iter().copied().map(Quality::Audio).collect(),
        }
    }
}

impl FromStr for MediaType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "video" => Ok(MediaType::Video),
            "audio" => Ok(MediaType::Audio),
            other => Err(AppError::Validation(format!(
                "Unknown media type '{}'. Expected 'video' or 'audio'",
                other
            ))),
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaType::Video => write!(f, "video"),
            MediaType::Audio => write!(f, "audio"),
        }
    }
}

/// Height ceiling for video downloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoQuality {
    P1080,
    P720,
    P480,
    P360,
}

impl VideoQuality {
    pub const ALL: [VideoQuality; 4] = [
        VideoQuality::P1080,
        VideoQuality::P720,
        VideoQuality::P480,
        VideoQuality::P360,
    ];

    pub fn height(&self) -> u32 {
        match self {
            VideoQuality::P1080 => 1080,
            VideoQuality::P720 => 720,
            VideoQuality::P480 => 480,
            VideoQuality::P360 => 360,
        }
    }
}

/// MP3 target bitrate for audio downloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioBitrate {
    Kbps320,
    Kbps192,
    Kbps128,
}

impl AudioBitrate {
    pub const ALL: [AudioBitrate; 3] = [
        AudioBitrate::Kbps320,
        AudioBitrate::Kbps192,
        AudioBitrate::Kbps128,
    ];

    pub fn kbps(&self) -> u32 {
        match self {
            AudioBitrate::Kbps320 => 320,
            AudioBitrate::Kbps192 => 192,
            AudioBitrate::Kbps128 => 128,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quality {
    Video(VideoQuality),
    Audio(AudioBitrate),
}

impl Quality {
    /// Parses a dropdown value ("720p", "192kbps") for the given media type.
    /// Values belonging to the other media type are rejected.
    pub fn parse(media_type: MediaType, value: &str) -> Result<Self> {
        let value = value.trim().to_lowercase();
        let found = media_type
            .qualities()
            .into_iter()
            .find(|q| q.to_string() == value);

        found.ok_or_else(|| {
            let allowed: Vec<String> = media_type.qualities().iter().map(|q| q.to_string()).collect();
            AppError::Validation(format!(
                "Unsupported {} quality '{}'. Choose one of: {}",
                media_type,
                value,
                allowed.join(", ")
            ))
        })
    }

    pub fn media_type(&self) -> MediaType {
        match self {
            Quality::Video(_) => MediaType::Video,
            Quality::Audio(_) => MediaType::Audio,
        }
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Quality::Video(v) => write!(f, "{}p", v.height()),
            Quality::Audio(a) => write!(f, "{}kbps", a.kbps()),
        }
    }
}

/// A validated download request. Only `DownloadManager::validate` builds one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRequest {
    pub url: String,
    pub quality: Quality,
}

impl DownloadRequest {
    pub fn media_type(&self) -> MediaType {
        self.quality.media_type()
    }
}

#[derive(Debug, Clone)]
pub struct DownloadOutcome {
    pub job_id: String,
    pub destination: PathBuf,
}

/// What the info endpoint shows about a URL before downloading it.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct VideoSummary {
    pub title: String,
    pub duration: String,
    pub uploader: String,
    pub view_count: String,
    pub upload_date: String,
    pub description: String,
}

/// The yt-dlp seam. Everything that touches the network or spawns a process
/// lives behind this trait.
#[async_trait::async_trait]
pub trait Extractor: Send + Sync {
    fn name(&self) -> &str;

    async fn fetch_info(&self, url: &str) -> Result<VideoSummary>;

    /// Downloads `url` into `destination` and returns the path of the
    /// written file.
    async fn download(
        &self,
        url: &str,
        selection: &FormatSelection,
        destination: &Path,
        progress: ProgressSink,
    ) -> Result<PathBuf>;
}
