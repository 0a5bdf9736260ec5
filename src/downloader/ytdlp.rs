use regex::Regex;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::OnceLock;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use async_trait::async_trait;

use crate::config::AppConfig;
use crate::downloader::progress::{
    final_path_template, parse_final_path, parse_progress_line, progress_template,
};
use crate::downloader::{Extractor, FormatSelection, ProgressSink, VideoSummary};
use crate::errors::{AppError, Result};

const DESCRIPTION_LIMIT: usize = 200;

/// Runs the `yt-dlp` executable as a child process.
pub struct YtDlpExtractor {
    ytdlp_path: String,
    ffmpeg_location: Option<PathBuf>,
    retries: u32,
    concurrent_fragments: u32,
    socket_timeout_secs: u64,
}

/// What came out of one of the child's output streams.
#[derive(Debug, Default)]
struct StreamSummary {
    final_path: Option<PathBuf>,
    other_lines: Vec<String>,
}

impl YtDlpExtractor {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            ytdlp_path: config.ytdlp_path.clone(),
            ffmpeg_location: config.ffmpeg_location.clone(),
            retries: config.retries,
            concurrent_fragments: config.concurrent_fragments,
            socket_timeout_secs: config.socket_timeout_secs,
        }
    }

    pub fn build_download_args(
        &self,
        url: &str,
        selection: &FormatSelection,
        destination: &Path,
        job_id: &str,
    ) -> Vec<String> {
        // Concurrent jobs for the same video must not share .part or final files.
        let output_template = destination.join(format!("%(title)s [{}].%(ext)s", job_id));
        let mut args = vec![
            "--no-playlist".to_string(),
            "--quiet".to_string(),
            "--no-warnings".to_string(),
            "--no-simulate".to_string(),
            "--force-overwrites".to_string(),
            "--newline".to_string(),
            "--progress".to_string(),
            "--progress-template".to_string(),
            progress_template(),
            "--print".to_string(),
            final_path_template(),
            "--output".to_string(),
            output_template.to_string_lossy().to_string(),
            "--concurrent-fragments".to_string(),
            self.concurrent_fragments.to_string(),
            "--retries".to_string(),
            self.retries.to_string(),
            "--fragment-retries".to_string(),
            self.retries.to_string(),
            "--file-access-retries".to_string(),
            self.retries.to_string(),
            "--socket-timeout".to_string(),
            self.socket_timeout_secs.to_string(),
        ];

        args.extend(selection.to_args());

        if let Some(location) = &self.ffmpeg_location {
            args.push("--ffmpeg-location".to_string());
            args.push(location.to_string_lossy().to_string());
        }

        // The URL is user input; keep it from ever being read as an option.
        args.push("--".to_string());
        args.push(url.to_string());
        args
    }

    fn build_info_args(&self, url: &str) -> Vec<String> {
        vec![
            "--dump-json".to_string(),
            "--skip-download".to_string(),
            "--no-playlist".to_string(),
            "--no-warnings".to_string(),
            "--socket-timeout".to_string(),
            self.socket_timeout_secs.to_string(),
            "--".to_string(),
            url.to_string(),
        ]
    }

    /// Finds ffmpeg: the configured location first, then PATH.
    pub fn locate_transcoder(&self) -> Result<PathBuf> {
        let binary = if cfg!(windows) { "ffmpeg.exe" } else { "ffmpeg" };

        if let Some(location) = &self.ffmpeg_location {
            if location.is_file() {
                return Ok(location.clone());
            }
            let candidate = location.join(binary);
            if candidate.is_file() {
                return Ok(candidate);
            }
            return Err(AppError::ToolNotFound(format!(
                "ffmpeg not found at configured location {:?}",
                location
            )));
        }

        std::env::var_os("PATH")
            .and_then(|paths| {
                std::env::split_paths(&paths)
                    .map(|dir| dir.join(binary))
                    .find(|candidate| candidate.is_file())
            })
            .ok_or_else(|| AppError::ToolNotFound("ffmpeg not found on PATH".to_string()))
    }

    fn spawn_error(&self, err: std::io::Error) -> AppError {
        if err.kind() == std::io::ErrorKind::NotFound {
            AppError::ToolNotFound(format!("yt-dlp executable '{}' not found", self.ytdlp_path))
        } else {
            AppError::Io(err)
        }
    }
}

fn ansi_escapes() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\x1b\[[0-9;]*[A-Za-z]").expect("valid ANSI regex"))
}

fn clean_line(line: &str) -> String {
    ansi_escapes().replace_all(line, "").trim().to_string()
}

/// Reads a child stream line by line, forwarding progress to the sink.
async fn drain<R: AsyncRead + Unpin>(
    reader: R,
    progress: &ProgressSink,
) -> std::io::Result<StreamSummary> {
    let mut summary = StreamSummary::default();
    let mut lines = BufReader::new(reader).lines();

    while let Some(line) = lines.next_line().await? {
        let line = clean_line(&line);
        if line.is_empty() {
            continue;
        }
        if let Some(state) = parse_progress_line(&line) {
            progress.update(state).await;
        } else if let Some(path) = parse_final_path(&line) {
            summary.final_path = Some(path);
        } else {
            log::debug!("[yt-dlp {}] {}", progress.job_id(), line);
            summary.other_lines.push(line);
        }
    }

    Ok(summary)
}

/// Maps yt-dlp's stderr onto the error classes the UI distinguishes.
pub fn classify_failure(stderr_lines: &[String], exit: &str) -> AppError {
    let errors: Vec<&str> = stderr_lines
        .iter()
        .map(String::as_str)
        .filter(|l| l.starts_with("ERROR:"))
        .collect();

    let message = if errors.is_empty() {
        stderr_lines.join("\n")
    } else {
        errors.join("\n")
    };
    let lower = message.to_lowercase();

    if (lower.contains("ffmpeg") || lower.contains("ffprobe"))
        && (lower.contains("not found") || lower.contains("not installed"))
    {
        return AppError::ToolNotFound(message);
    }

    let environment_markers = [
        "permission denied",
        "read-only file system",
        "no space left on device",
        "unable to open for writing",
    ];
    if environment_markers.iter().any(|m| lower.contains(m)) {
        return AppError::Environment(message);
    }

    if message.trim().is_empty() {
        return AppError::Environment(format!("yt-dlp exited with {} and printed no error", exit));
    }

    AppError::Extraction(message)
}

fn field_or_na(info: &Value, key: &str) -> String {
    match &info[key] {
        Value::String(s) if !s.is_empty() => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => "N/A".to_string(),
    }
}

/// "1234567" -> "1,234,567"
pub fn group_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Builds the info-panel summary from yt-dlp's `--dump-json` output.
pub fn summarize(info: &Value) -> VideoSummary {
    let duration = match info["duration"].as_f64() {
        Some(secs) if secs > 0.0 => {
            if secs.fract() == 0.0 {
                format!("{} seconds", secs as u64)
            } else {
                format!("{} seconds", secs)
            }
        }
        _ => "N/A".to_string(),
    };

    let view_count = match info["view_count"].as_u64() {
        Some(views) if views > 0 => group_thousands(views),
        _ => "N/A".to_string(),
    };

    let description = match info["description"].as_str() {
        Some(text) if !text.is_empty() => {
            let truncated: String = text.chars().take(DESCRIPTION_LIMIT).collect();
            format!("{}...", truncated)
        }
        _ => "N/A".to_string(),
    };

    VideoSummary {
        title: field_or_na(info, "title"),
        duration,
        uploader: field_or_na(info, "uploader"),
        view_count,
        upload_date: field_or_na(info, "upload_date"),
        description,
    }
}

#[async_trait]
impl Extractor for YtDlpExtractor {
    fn name(&self) -> &str {
        "yt-dlp"
    }

    async fn fetch_info(&self, url: &str) -> Result<VideoSummary> {
        log::info!("Fetching info for {}", url);

        let output = Command::new(&self.ytdlp_path)
            .args(self.build_info_args(url))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| self.spawn_error(e))?;

        if !output.status.success() {
            let stderr: Vec<String> = String::from_utf8_lossy(&output.stderr)
                .lines()
                .map(clean_line)
                .filter(|l| !l.is_empty())
                .collect();
            let err = classify_failure(&stderr, &output.status.to_string());
            log::error!("yt-dlp info lookup failed for {}: {}", url, err);
            return Err(err);
        }

        // --dump-json prints one object per line; without a playlist there is one.
        let stdout = String::from_utf8_lossy(&output.stdout);
        let first = stdout
            .lines()
            .find(|l| !l.trim().is_empty())
            .ok_or_else(|| AppError::Extraction("Could not fetch video information".to_string()))?;
        let info: Value = serde_json::from_str(first).map_err(|e| {
            AppError::Environment(format!("Unreadable yt-dlp JSON output: {}", e))
        })?;

        Ok(summarize(&info))
    }

    async fn download(
        &self,
        url: &str,
        selection: &FormatSelection,
        destination: &Path,
        progress: ProgressSink,
    ) -> Result<PathBuf> {
        if selection.needs_transcoder() {
            let ffmpeg = self.locate_transcoder()?;
            log::debug!("Using transcoder at {:?}", ffmpeg);
        }

        let args = self.build_download_args(url, selection, destination, progress.job_id());
        log::info!("Running {} for job {}: {:?}", self.ytdlp_path, progress.job_id(), args);

        let mut child = Command::new(&self.ytdlp_path)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| self.spawn_error(e))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| AppError::Environment("yt-dlp stdout was not captured".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| AppError::Environment("yt-dlp stderr was not captured".to_string()))?;

        let (out, err) = tokio::join!(drain(stdout, &progress), drain(stderr, &progress));
        let status = child.wait().await?;
        let (out, err) = (out?, err?);

        if !status.success() {
            let failure = classify_failure(&err.other_lines, &status.to_string());
            log::error!("yt-dlp failed for job {}: {}", progress.job_id(), failure);
            return Err(failure);
        }

        out.final_path
            .or(err.final_path)
            .ok_or_else(|| {
                AppError::Environment("yt-dlp finished without reporting an output file".to_string())
            })
    }
}
