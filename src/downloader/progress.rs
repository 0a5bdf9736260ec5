use moka::future::Cache;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Marker yt-dlp prints in front of every progress line we ask it for.
pub const PROGRESS_MARKER: &str = "[ytdl-web:progress]";
/// Marker in front of the final file path, printed after yt-dlp moved the file.
pub const FILE_MARKER: &str = "[ytdl-web:file]";

/// `--progress-template` value. Fields are `|` separated; the filename goes
/// last because it may itself contain `|`.
pub fn progress_template() -> String {
    format!(
        "download:{}%(progress.status)s|%(progress.downloaded_bytes)s|%(progress.total_bytes)s|%(progress.total_bytes_estimate)s|%(progress.speed)s|%(progress.eta)s|%(progress.filename)s",
        PROGRESS_MARKER
    )
}

/// `--print` value reporting where the finished file ended up.
pub fn final_path_template() -> String {
    format!("after_move:{}%(filepath)s", FILE_MARKER)
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum JobState {
    Starting,
    Downloading {
        downloaded_bytes: u64,
        total_bytes: Option<u64>,
        speed: Option<f64>,
        eta: Option<u64>,
        percent: String,
    },
    /// Transfer done; ffmpeg may still be merging or transcoding.
    Finished { filename: String },
    Completed { filename: String },
    Error { error: String },
    Unknown,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed { .. } | JobState::Error { .. })
    }
}

fn parse_number(field: &str) -> Option<f64> {
    let field = field.trim();
    if field.is_empty() || field == "NA" || field == "None" {
        return None;
    }
    field.parse::<f64>().ok().filter(|v| v.is_finite() && *v >= 0.0)
}

fn format_percent(downloaded: u64, total: Option<u64>) -> String {
    match total {
        Some(total) if total > 0 => {
            let pct = (downloaded as f64 / total as f64 * 100.0).min(100.0);
            format!("{:.1}%", pct)
        }
        _ => "0%".to_string(),
    }
}

/// Parses one line of yt-dlp output produced by [`progress_template`].
pub fn parse_progress_line(line: &str) -> Option<JobState> {
    let rest = line.trim().strip_prefix(PROGRESS_MARKER)?;
    let fields: Vec<&str> = rest.splitn(7, '|').collect();
    if fields.len() != 7 {
        return None;
    }

    match fields[0] {
        "downloading" => {
            let downloaded_bytes = parse_number(fields[1]).unwrap_or(0.0) as u64;
            let total_bytes = parse_number(fields[2])
                .or_else(|| parse_number(fields[3]))
                .map(|v| v as u64);
            Some(JobState::Downloading {
                downloaded_bytes,
                total_bytes,
                speed: parse_number(fields[4]),
                eta: parse_number(fields[5]).map(|v| v as u64),
                percent: format_percent(downloaded_bytes, total_bytes),
            })
        }
        "finished" => Some(JobState::Finished {
            filename: fields[6].trim().to_string(),
        }),
        _ => None,
    }
}

/// Parses the line produced by [`final_path_template`].
pub fn parse_final_path(line: &str) -> Option<PathBuf> {
    let path = line.trim().strip_prefix(FILE_MARKER)?.trim();
    if path.is_empty() || path == "NA" {
        None
    } else {
        Some(PathBuf::from(path))
    }
}

/// Job id → latest state. Entries expire after the configured TTL.
#[derive(Clone)]
pub struct ProgressRegistry {
    jobs: Cache<String, JobState>,
}

impl ProgressRegistry {
    pub fn new(ttl: Duration, max_jobs: u64) -> Self {
        Self {
            jobs: Cache::builder()
                .max_capacity(max_jobs)
                .time_to_live(ttl)
                .build(),
        }
    }

    pub async fn set(&self, job_id: &str, state: JobState) {
        self.jobs.insert(job_id.to_string(), state).await;
    }

    pub async fn get(&self, job_id: &str) -> JobState {
        self.jobs.get(job_id).await.unwrap_or(JobState::Unknown)
    }

    pub fn sink(&self, job_id: &str) -> ProgressSink {
        ProgressSink {
            registry: self.clone(),
            job_id: job_id.to_string(),
        }
    }
}

/// Write handle for a single job, handed to the extractor.
#[derive(Clone)]
pub struct ProgressSink {
    registry: ProgressRegistry,
    job_id: String,
}

impl ProgressSink {
    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub async fn update(&self, state: JobState) {
        // Completed and Error are final.
        if self.registry.get(&self.job_id).await.is_terminal() {
            return;
        }
        self.registry.set(&self.job_id, state).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_downloading_line() {
        let line = "[ytdl-web:progress]downloading|1048576|4194304|NA|524288.5|6|/tmp/a.mp4.part";
        match parse_progress_line(line) {
            Some(JobState::Downloading {
                downloaded_bytes,
                total_bytes,
                speed,
                eta,
                percent,
            }) => {
                assert_eq!(downloaded_bytes, 1_048_576);
                assert_eq!(total_bytes, Some(4_194_304));
                assert_eq!(speed, Some(524_288.5));
                assert_eq!(eta, Some(6));
                assert_eq!(percent, "25.0%");
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn falls_back_to_estimated_total() {
        let line = "[ytdl-web:progress]downloading|500|NA|1000.0|NA|NA|clip.webm";
        assert_eq!(
            parse_progress_line(line),
            Some(JobState::Downloading {
                downloaded_bytes: 500,
                total_bytes: Some(1000),
                speed: None,
                eta: None,
                percent: "50.0%".to_string(),
            })
        );
    }

    #[test]
    fn parses_finished_line_with_pipe_in_name() {
        let line = "[ytdl-web:progress]finished|10|10|NA|NA|NA|/dl/a | b.mp4";
        assert_eq!(
            parse_progress_line(line),
            Some(JobState::Finished {
                filename: "/dl/a | b.mp4".to_string()
            })
        );
    }

    #[test]
    fn ignores_foreign_lines() {
        assert_eq!(parse_progress_line("[download] Destination: a.mp4"), None);
        assert_eq!(parse_progress_line("[ytdl-web:progress]downloading|1|2"), None);
        assert_eq!(parse_progress_line("[ytdl-web:progress]error|1|2|3|4|5|x"), None);
    }

    #[test]
    fn parses_final_path() {
        assert_eq!(
            parse_final_path("[ytdl-web:file]/home/u/Downloads/Song.mp3\n"),
            Some(PathBuf::from("/home/u/Downloads/Song.mp3"))
        );
        assert_eq!(parse_final_path("[ytdl-web:file]NA"), None);
        assert_eq!(parse_final_path("Song.mp3"), None);
    }

    #[test]
    fn serializes_with_status_tag() {
        let json = serde_json::to_value(JobState::Error { error: "boom".to_string() }).unwrap();
        assert_eq!(json["status"], "error");
        assert_eq!(json["error"], "boom");
        let json = serde_json::to_value(JobState::Unknown).unwrap();
        assert_eq!(json, serde_json::json!({ "status": "unknown" }));
    }

    #[tokio::test]
    async fn registry_tracks_jobs() {
        let registry = ProgressRegistry::new(Duration::from_secs(60), 10);
        assert_eq!(registry.get("missing").await, JobState::Unknown);

        let sink = registry.sink("job-1");
        sink.update(JobState::Starting).await;
        assert_eq!(registry.get("job-1").await, JobState::Starting);

        sink.update(JobState::Completed { filename: "a.mp4".to_string() }).await;
        assert!(registry.get("job-1").await.is_terminal());
    }
}
