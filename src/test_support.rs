// Fake extractor shared by the manager and server tests.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use async_trait::async_trait;

use crate::downloader::{
    DownloadManager, Extractor, FormatSelection, JobState, ProgressRegistry, ProgressSink,
    VideoSummary,
};
use crate::errors::{AppError, Result};

/// Accepts youtube.com / youtu.be URLs, fails everything else the way yt-dlp
/// does. Successful downloads write a small file into the destination.
#[derive(Default)]
pub struct FakeExtractor {
    pub calls: Mutex<Vec<(String, String)>>,
    counter: AtomicUsize,
}

impl FakeExtractor {
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    fn supported(url: &str) -> bool {
        url.contains("youtube.com") || url.contains("youtu.be")
    }
}

#[async_trait]
impl Extractor for FakeExtractor {
    fn name(&self) -> &str {
        "fake"
    }

    async fn fetch_info(&self, url: &str) -> Result<VideoSummary> {
        self.calls.lock().unwrap().push((url.to_string(), "info".to_string()));
        if !Self::supported(url) {
            return Err(AppError::Extraction(format!("ERROR: Unsupported URL: {}", url)));
        }
        Ok(VideoSummary {
            title: "Fake clip".to_string(),
            duration: "10 seconds".to_string(),
            uploader: "Tester".to_string(),
            view_count: "1,000".to_string(),
            upload_date: "20240101".to_string(),
            description: "N/A".to_string(),
        })
    }

    async fn download(
        &self,
        url: &str,
        selection: &FormatSelection,
        destination: &Path,
        progress: ProgressSink,
    ) -> Result<PathBuf> {
        self.calls.lock().unwrap().push((url.to_string(), selection.selector.clone()));
        if !Self::supported(url) {
            return Err(AppError::Extraction(format!("ERROR: Unsupported URL: {}", url)));
        }

        progress
            .update(JobState::Downloading {
                downloaded_bytes: 5,
                total_bytes: Some(10),
                speed: Some(1.0),
                eta: Some(5),
                percent: "50.0%".to_string(),
            })
            .await;

        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        let ext = if selection.needs_transcoder() { "mp3" } else { "mp4" };
        let path = destination.join(format!("clip-{}.{}", n, ext));
        tokio::fs::write(&path, b"media").await?;
        Ok(path)
    }
}

pub fn manager_with_fake(download_path: &Path) -> (DownloadManager, Arc<FakeExtractor>) {
    let fake = Arc::new(FakeExtractor::default());
    let registry = ProgressRegistry::new(Duration::from_secs(60), 100);
    let manager = DownloadManager::new(fake.clone(), registry, download_path.to_path_buf());
    (manager, fake)
}

/// Polls until the job reaches a terminal state.
pub async fn wait_for_job(manager: &DownloadManager, job_id: &str) -> JobState {
    for _ in 0..500 {
        let state = manager.progress(job_id).await;
        if state.is_terminal() {
            return state;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("job {} did not finish", job_id);
}
