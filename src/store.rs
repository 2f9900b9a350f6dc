//! Filesystem layout for transcoded output.
//!
//! Everything a transcode produces lives under `<hls_root>/<video_id>/`:
//! a `master.m3u8` manifest next to its `segment_NNN.ts` files. Names that
//! reach the filesystem are validated against an allowlist first, so a
//! crafted video ID or segment name can never escape the root.

use std::path::{Path, PathBuf};

use crate::error::VideoError;

/// Manifest filename inside each per-video directory.
pub const MANIFEST_NAME: &str = "master.m3u8";

/// Returns true when `name` is safe to use as a single path component.
///
/// Allowlist: ASCII alphanumerics plus `-`, `_` and `.`; `.` and `..`
/// themselves are rejected, as is anything empty. Separators are not in
/// the allowlist, so absolute paths and nested components fail too.
pub fn safe_component(name: &str) -> bool {
    if name.is_empty() || name == "." || name == ".." {
        return false;
    }
    name.chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

#[derive(Clone, Debug)]
pub struct SegmentStore {
    hls_root: PathBuf,
}

impl SegmentStore {
    pub fn new(hls_root: impl Into<PathBuf>) -> Self {
        Self {
            hls_root: hls_root.into(),
        }
    }

    /// Per-video output directory. Fails with a not-found signal when the
    /// ID is not a safe path component.
    pub fn video_dir(&self, video_id: &str) -> Result<PathBuf, VideoError> {
        if !safe_component(video_id) {
            return Err(VideoError::NotFound(video_id.to_string()));
        }
        Ok(self.hls_root.join(video_id))
    }

    pub fn manifest_path(&self, video_id: &str) -> Result<PathBuf, VideoError> {
        Ok(self.video_dir(video_id)?.join(MANIFEST_NAME))
    }

    pub fn segment_path(&self, video_id: &str, segment: &str) -> Result<PathBuf, VideoError> {
        if !safe_component(segment) {
            return Err(VideoError::NotFound(format!("{video_id}/{segment}")));
        }
        Ok(self.video_dir(video_id)?.join(segment))
    }

    /// True when the video has a completed transcode on disk: its directory
    /// exists and the manifest inside it is non-empty.
    pub async fn exists(&self, video_id: &str) -> bool {
        let Ok(manifest) = self.manifest_path(video_id) else {
            return false;
        };
        match tokio::fs::metadata(&manifest).await {
            Ok(meta) => meta.is_file() && meta.len() > 0,
            Err(_) => false,
        }
    }

    pub fn root(&self) -> &Path {
        &self.hls_root
    }
}
