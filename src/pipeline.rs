//! Pipeline façade: the entry point used by the upload flow.
//!
//! Ingestion persists a `Pending` record and enqueues the transcode; the
//! caller gets its response immediately instead of blocking on the full
//! transcode (the job runs in a background task on the bounded pool).

use std::sync::Arc;

use crate::coordinator::{EnqueueOutcome, JobCoordinator};
use crate::error::VideoError;
use crate::transcode::TranscodeWorker;
use crate::video::{ProcessingState, VideoRecord, VideoRepository};

pub struct VideoPipeline {
    repo: Arc<dyn VideoRepository>,
    coordinator: Arc<JobCoordinator>,
    worker: Arc<TranscodeWorker>,
}

impl VideoPipeline {
    pub fn new(
        repo: Arc<dyn VideoRepository>,
        coordinator: Arc<JobCoordinator>,
        worker: Arc<TranscodeWorker>,
    ) -> Self {
        Self {
            repo,
            coordinator,
            worker,
        }
    }

    /// Accept a stored upload: persist its metadata, register it with the
    /// coordinator, and enqueue transcoding.
    ///
    /// Returns the record in its initial `Pending` state; processing
    /// progress is observed through [`status`](Self::status).
    pub async fn ingest(
        &self,
        file_path: std::path::PathBuf,
        title: String,
        description: String,
        content_type: String,
    ) -> Result<VideoRecord, VideoError> {
        let record = VideoRecord::new(title, description, content_type, file_path);
        let record = self.repo.save(record).await?;
        self.coordinator.register(&record.video_id);
        tracing::info!(video_id = %record.video_id, title = %record.title, "video ingested");

        self.enqueue(&record.video_id).await?;
        Ok(record)
    }

    /// Idempotent enqueue: at most one job per video runs at a time.
    ///
    /// A `Failed` video passed here again counts as a fresh submission;
    /// there is no automatic retry.
    pub async fn enqueue(&self, video_id: &str) -> Result<EnqueueOutcome, VideoError> {
        let record = self
            .repo
            .find_by_id(video_id)
            .await?
            .ok_or_else(|| VideoError::NotFound(video_id.to_string()))?;

        match self.coordinator.try_start(video_id) {
            EnqueueOutcome::Started => {}
            outcome => return Ok(outcome),
        }

        persist_state(&self.repo, video_id, ProcessingState::Processing).await?;
        self.spawn_job(record);
        Ok(EnqueueOutcome::Started)
    }

    /// Current processing state; the coordinator is authoritative for
    /// anything it has seen, the persisted record covers the rest.
    pub async fn status(&self, video_id: &str) -> Result<ProcessingState, VideoError> {
        if let Some(state) = self.coordinator.status(video_id) {
            return Ok(state);
        }
        self.repo
            .find_by_id(video_id)
            .await?
            .map(|record| record.state)
            .ok_or_else(|| VideoError::NotFound(video_id.to_string()))
    }

    fn spawn_job(&self, record: VideoRecord) {
        let coordinator = self.coordinator.clone();
        let worker = self.worker.clone();
        let repo = self.repo.clone();

        tokio::spawn(async move {
            // FIFO admission: jobs past the pool bound wait here.
            let _slot = coordinator.acquire_slot().await;

            let result = worker.run(&record.video_id, &record.file_path).await;
            let succeeded = match &result {
                Ok(()) => true,
                Err(err) => {
                    tracing::error!(video_id = %record.video_id, error = %err, "transcode job failed");
                    false
                }
            };

            if coordinator.complete(&record.video_id, succeeded) {
                let state = if succeeded {
                    ProcessingState::Ready
                } else {
                    ProcessingState::Failed
                };
                if let Err(err) = persist_state(&repo, &record.video_id, state).await {
                    tracing::error!(video_id = %record.video_id, error = %err, "failed to persist state transition");
                }
            }
        });
    }
}

async fn persist_state(
    repo: &Arc<dyn VideoRepository>,
    video_id: &str,
    state: ProcessingState,
) -> Result<(), VideoError> {
    if let Some(mut record) = repo.find_by_id(video_id).await? {
        record.state = state;
        repo.save(record).await?;
    }
    Ok(())
}
