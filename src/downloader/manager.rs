use crate::downloader::{
    DownloadOutcome, DownloadRequest, Extractor, FormatSelection, JobState, MediaType,
    ProgressRegistry, Quality, VideoSummary,
};
use crate::errors::{AppError, Result};
use crate::security::InputValidator;
use crate::utils::{ensure_dir_exists, generate_download_id};
use std::path::PathBuf;
use std::sync::Arc;

/// Validates requests, runs them through the extractor and keeps the job
/// registry current. Cheap to clone; clones share the registry.
#[derive(Clone)]
pub struct DownloadManager {
    extractor: Arc<dyn Extractor>,
    registry: ProgressRegistry,
    download_path: PathBuf,
    validator: InputValidator,
}

impl DownloadManager {
    pub fn new(
        extractor: Arc<dyn Extractor>,
        registry: ProgressRegistry,
        download_path: PathBuf,
    ) -> Self {
        log::info!(
            "Download manager using {} extractor, writing to {:?}",
            extractor.name(),
            download_path
        );
        Self {
            extractor,
            registry,
            download_path,
            validator: InputValidator::new(),
        }
    }

    /// Turns raw form/JSON fields into a request. A missing media type means
    /// video; a missing quality means the media type's default.
    pub fn validate(
        &self,
        url: &str,
        media_type: Option<&str>,
        quality: Option<&str>,
    ) -> Result<DownloadRequest> {
        let url = self.validator.validate_url(url)?;

        let media_type = match media_type.map(str::trim).filter(|s| !s.is_empty()) {
            Some(value) => value.parse::<MediaType>()?,
            None => MediaType::Video,
        };

        let quality = match quality.map(str::trim).filter(|s| !s.is_empty()) {
            Some(value) => Quality::parse(media_type, value)?,
            None => media_type.default_quality(),
        };

        Ok(DownloadRequest {
            url: url.to_string(),
            quality,
        })
    }

    pub async fn fetch_info(&self, url: &str) -> Result<VideoSummary> {
        let url = self.validator.validate_url(url)?;
        self.extractor.fetch_info(url.as_str()).await
    }

    async fn prepare_destination(&self) -> Result<()> {
        ensure_dir_exists(&self.download_path).await.map_err(|e| {
            AppError::Environment(format!(
                "Could not create download path {:?}: {}",
                self.download_path, e
            ))
        })?;
        self.validator.validate_download_path(&self.download_path)
    }

    /// Runs a registered job to completion and records its terminal state.
    async fn run_job(&self, job_id: &str, request: &DownloadRequest) -> Result<DownloadOutcome> {
        let result = self.execute(job_id, request).await;

        match &result {
            Ok(outcome) => {
                log::info!("Job {} completed: {:?}", job_id, outcome.destination);
                self.registry
                    .set(
                        job_id,
                        JobState::Completed {
                            filename: outcome.destination.to_string_lossy().to_string(),
                        },
                    )
                    .await;
            }
            Err(e) => {
                log::error!("Job {} failed: {}", job_id, e);
                self.registry
                    .set(job_id, JobState::Error { error: e.user_message() })
                    .await;
            }
        }

        result
    }

    async fn execute(&self, job_id: &str, request: &DownloadRequest) -> Result<DownloadOutcome> {
        self.prepare_destination().await?;

        let selection = FormatSelection::for_quality(request.quality);
        log::info!(
            "Job {}: {} {} as '{}'",
            job_id,
            request.media_type(),
            request.url,
            selection.selector
        );

        let destination = self
            .extractor
            .download(
                &request.url,
                &selection,
                &self.download_path,
                self.registry.sink(job_id),
            )
            .await?;

        Ok(DownloadOutcome {
            job_id: job_id.to_string(),
            destination,
        })
    }

    /// Downloads in the caller's task and returns once the file is written.
    pub async fn download(&self, request: &DownloadRequest) -> Result<DownloadOutcome> {
        let job_id = generate_download_id();
        self.registry.set(&job_id, JobState::Starting).await;
        self.run_job(&job_id, request).await
    }

    /// Registers a job, runs it on a background task and returns its id.
    pub async fn start(&self, request: DownloadRequest) -> Result<String> {
        let job_id = generate_download_id();
        self.registry.set(&job_id, JobState::Starting).await;

        let manager = self.clone();
        let id = job_id.clone();
        tokio::spawn(async move {
            // The outcome is recorded in the registry by run_job.
            let _ = manager.run_job(&id, &request).await;
        });

        Ok(job_id)
    }

    pub async fn progress(&self, job_id: &str) -> JobState {
        self.registry.get(job_id).await
    }
}
