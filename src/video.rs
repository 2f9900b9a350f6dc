//! Video metadata records and the repository port backing them.
//!
//! Metadata persistence is an external collaborator; this module only
//! defines the port plus an in-memory adapter used by the binary and tests.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::RwLock;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::VideoError;

/// Lifecycle of a video inside the processing pipeline.
///
/// Transitions only along `Pending -> Processing -> Ready | Failed`.
/// A `Failed` video may be re-enqueued, which counts as a fresh `Pending`
/// submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingState {
    Pending,
    Processing,
    Ready,
    Failed,
}

impl fmt::Display for ProcessingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ProcessingState::Pending => "pending",
            ProcessingState::Processing => "processing",
            ProcessingState::Ready => "ready",
            ProcessingState::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// Persisted metadata for one uploaded video.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoRecord {
    /// Opaque unique ID, generated at ingestion and immutable afterwards.
    pub video_id: String,
    pub title: String,
    pub description: String,
    pub content_type: String,
    /// Absolute path of the stored original file.
    pub file_path: PathBuf,
    pub state: ProcessingState,
}

impl VideoRecord {
    pub fn new(
        title: String,
        description: String,
        content_type: String,
        file_path: PathBuf,
    ) -> Self {
        Self {
            video_id: Uuid::new_v4().to_string(),
            title,
            description,
            content_type,
            file_path,
            state: ProcessingState::Pending,
        }
    }
}

/// Port to the external metadata store.
#[async_trait]
pub trait VideoRepository: Send + Sync {
    /// Insert or replace a record, returning the stored copy.
    async fn save(&self, record: VideoRecord) -> Result<VideoRecord, VideoError>;

    async fn find_by_id(&self, video_id: &str) -> Result<Option<VideoRecord>, VideoError>;

    /// First record whose title matches exactly.
    async fn find_by_title(&self, title: &str) -> Result<Option<VideoRecord>, VideoError>;

    async fn find_all(&self) -> Result<Vec<VideoRecord>, VideoError>;
}

/// In-memory adapter for the repository port.
#[derive(Default)]
pub struct InMemoryVideoStore {
    records: RwLock<HashMap<String, VideoRecord>>,
}

impl InMemoryVideoStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VideoRepository for InMemoryVideoStore {
    async fn save(&self, record: VideoRecord) -> Result<VideoRecord, VideoError> {
        let mut records = self.records.write().expect("video store lock poisoned");
        records.insert(record.video_id.clone(), record.clone());
        Ok(record)
    }

    async fn find_by_id(&self, video_id: &str) -> Result<Option<VideoRecord>, VideoError> {
        let records = self.records.read().expect("video store lock poisoned");
        Ok(records.get(video_id).cloned())
    }

    async fn find_by_title(&self, title: &str) -> Result<Option<VideoRecord>, VideoError> {
        let records = self.records.read().expect("video store lock poisoned");
        Ok(records.values().find(|r| r.title == title).cloned())
    }

    async fn find_all(&self) -> Result<Vec<VideoRecord>, VideoError> {
        let records = self.records.read().expect("video store lock poisoned");
        let mut all: Vec<_> = records.values().cloned().collect();
        all.sort_by(|a, b| a.title.cmp(&b.title).then(a.video_id.cmp(&b.video_id)));
        Ok(all)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(title: &str) -> VideoRecord {
        VideoRecord::new(
            title.to_string(),
            String::from("a description"),
            String::from("video/mp4"),
            PathBuf::from("/tmp/clip.mp4"),
        )
    }

    #[tokio::test]
    async fn new_records_start_pending_with_unique_ids() {
        let a = record("a");
        let b = record("b");
        assert_eq!(a.state, ProcessingState::Pending);
        assert_ne!(a.video_id, b.video_id);
    }

    #[tokio::test]
    async fn save_then_find_by_id() {
        let store = InMemoryVideoStore::new();
        let saved = store.save(record("clip")).await.unwrap();

        let found = store.find_by_id(&saved.video_id).await.unwrap().unwrap();
        assert_eq!(found.title, "clip");
        assert_eq!(found.state, ProcessingState::Pending);
    }

    #[tokio::test]
    async fn find_by_title_matches_exactly() {
        let store = InMemoryVideoStore::new();
        store.save(record("lecture one")).await.unwrap();
        store.save(record("lecture two")).await.unwrap();

        let found = store.find_by_title("lecture two").await.unwrap();
        assert_eq!(found.unwrap().title, "lecture two");
        assert!(store.find_by_title("lecture").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn find_all_returns_every_record() {
        let store = InMemoryVideoStore::new();
        store.save(record("b")).await.unwrap();
        store.save(record("a")).await.unwrap();

        let all = store.find_all().await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].title, "a");
    }

    #[tokio::test]
    async fn save_replaces_existing_record() {
        let store = InMemoryVideoStore::new();
        let mut saved = store.save(record("clip")).await.unwrap();

        saved.state = ProcessingState::Ready;
        store.save(saved.clone()).await.unwrap();

        let found = store.find_by_id(&saved.video_id).await.unwrap().unwrap();
        assert_eq!(found.state, ProcessingState::Ready);
    }
}
