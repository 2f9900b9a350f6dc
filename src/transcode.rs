//! External transcoder invocation and the per-video transcode worker.
//!
//! The transcoder is an injected capability so tests can substitute a
//! fake; the production adapter shells out to `ffmpeg` with a fixed,
//! shell-free argument list and reads nothing back but the exit status
//! and stderr.

use std::io;
use std::path::Path;
use std::process::Output;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::process::Command;

use crate::error::VideoError;
use crate::store::{SegmentStore, MANIFEST_NAME};

/// Captured stderr carried in failure detail is truncated to this many
/// characters.
const STDERR_LIMIT: usize = 4096;

#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub trait Transcoder: Send + Sync {
    /// Run the external encoder over `source`, writing the manifest and
    /// segment files into `output_dir`. Blocks until the child process
    /// terminates; the exit status is the sole success signal.
    async fn run(&self, source: &Path, output_dir: &Path) -> io::Result<Output>;
}

/// ffmpeg-backed [`Transcoder`] producing H.264/AAC HLS output.
pub struct FfmpegTranscoder {
    segment_seconds: u32,
}

impl FfmpegTranscoder {
    pub fn new(segment_seconds: u32) -> Self {
        Self { segment_seconds }
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn run(&self, source: &Path, output_dir: &Path) -> io::Result<Output> {
        // Deterministic argument list, never a shell-interpreted string.
        Command::new("ffmpeg")
            .arg("-y")
            .arg("-i")
            .arg(source)
            .arg("-c:v")
            .arg("libx264")
            .arg("-c:a")
            .arg("aac")
            .arg("-f")
            .arg("hls")
            .arg("-hls_time")
            .arg(self.segment_seconds.to_string())
            .arg("-hls_list_size")
            .arg("0")
            .arg("-hls_segment_filename")
            .arg(output_dir.join("segment_%03d.ts"))
            .arg(output_dir.join(MANIFEST_NAME))
            .output()
            .await
    }
}

/// Runs one transcode job to completion against the segment store layout.
pub struct TranscodeWorker {
    transcoder: Arc<dyn Transcoder>,
    store: SegmentStore,
}

impl TranscodeWorker {
    pub fn new(transcoder: Arc<dyn Transcoder>, store: SegmentStore) -> Self {
        Self { transcoder, store }
    }

    /// Transcode `source` into the video's output directory.
    ///
    /// The directory is created idempotently before the encoder starts.
    /// Any non-zero exit maps to a failure carrying the exit code and
    /// truncated stderr; partial output stays on disk for diagnostics.
    pub async fn run(&self, video_id: &str, source: &Path) -> Result<(), VideoError> {
        let output_dir = self.store.video_dir(video_id)?;
        if !output_dir.is_dir() {
            tokio::fs::create_dir_all(&output_dir).await?;
        }

        tracing::info!(video_id, source = %source.display(), "starting transcode");
        let output = self.transcoder.run(source, &output_dir).await?;

        if !output.status.success() {
            return Err(VideoError::Transcode {
                exit_code: output.status.code(),
                stderr: truncate_stderr(&output.stderr),
            });
        }

        tracing::info!(video_id, "transcode finished");
        Ok(())
    }
}

fn truncate_stderr(stderr: &[u8]) -> String {
    String::from_utf8_lossy(stderr)
        .chars()
        .take(STDERR_LIMIT)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::process::ExitStatusExt;
    use std::process::ExitStatus;
    use tempfile::tempdir;

    fn mock_output(stdout: &str, stderr: &str, success: bool) -> io::Result<Output> {
        Ok(Output {
            status: if success {
                ExitStatus::from_raw(0)
            } else {
                // Raw wait status: exit code lives in the high byte.
                ExitStatus::from_raw(1 << 8)
            },
            stdout: stdout.as_bytes().to_vec(),
            stderr: stderr.as_bytes().to_vec(),
        })
    }

    #[tokio::test]
    async fn successful_run_creates_output_dir() {
        let root = tempdir().unwrap();
        let store = SegmentStore::new(root.path());

        let mut transcoder = MockTranscoder::new();
        transcoder
            .expect_run()
            .times(1)
            .returning(|_, _| Box::pin(async { mock_output("", "", true) }));

        let worker = TranscodeWorker::new(Arc::new(transcoder), store);
        worker
            .run("vid-1", Path::new("/tmp/source.mp4"))
            .await
            .unwrap();

        assert!(root.path().join("vid-1").is_dir());
    }

    #[tokio::test]
    async fn run_is_idempotent_when_dir_exists() {
        let root = tempdir().unwrap();
        let store = SegmentStore::new(root.path());
        std::fs::create_dir_all(root.path().join("vid-1")).unwrap();

        let mut transcoder = MockTranscoder::new();
        transcoder
            .expect_run()
            .times(1)
            .returning(|_, _| Box::pin(async { mock_output("", "", true) }));

        let worker = TranscodeWorker::new(Arc::new(transcoder), store);
        assert!(worker.run("vid-1", Path::new("/tmp/source.mp4")).await.is_ok());
    }

    #[tokio::test]
    async fn worker_passes_store_layout_to_transcoder() {
        let root = tempdir().unwrap();
        let store = SegmentStore::new(root.path());
        let expected_dir = root.path().join("vid-1");

        let mut transcoder = MockTranscoder::new();
        transcoder
            .expect_run()
            .withf(move |source, output_dir| {
                source == Path::new("/tmp/source.mp4") && output_dir == expected_dir
            })
            .times(1)
            .returning(|_, _| Box::pin(async { mock_output("", "", true) }));

        let worker = TranscodeWorker::new(Arc::new(transcoder), store);
        worker
            .run("vid-1", Path::new("/tmp/source.mp4"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn non_zero_exit_carries_code_and_stderr() {
        let root = tempdir().unwrap();
        let store = SegmentStore::new(root.path());

        let mut transcoder = MockTranscoder::new();
        transcoder
            .expect_run()
            .times(1)
            .returning(|_, _| {
                Box::pin(async { mock_output("", "unknown codec: h265_fake", false) })
            });

        let worker = TranscodeWorker::new(Arc::new(transcoder), store);
        let err = worker
            .run("vid-1", Path::new("/tmp/source.mp4"))
            .await
            .unwrap_err();

        let VideoError::Transcode { exit_code, stderr } = err else {
            panic!("expected Transcode error, got {err:?}");
        };
        assert_eq!(exit_code, Some(1));
        assert!(stderr.contains("unknown codec"));
    }

    #[tokio::test]
    async fn spawn_failure_surfaces_as_error() {
        let root = tempdir().unwrap();
        let store = SegmentStore::new(root.path());

        let mut transcoder = MockTranscoder::new();
        transcoder.expect_run().times(1).returning(|_, _| {
            Box::pin(async {
                Err(io::Error::new(io::ErrorKind::NotFound, "ffmpeg not found"))
            })
        });

        let worker = TranscodeWorker::new(Arc::new(transcoder), store);
        let err = worker
            .run("vid-1", Path::new("/tmp/source.mp4"))
            .await
            .unwrap_err();
        assert!(matches!(err, VideoError::Io(_)));
    }

    #[tokio::test]
    async fn unsafe_video_id_never_reaches_the_transcoder() {
        let root = tempdir().unwrap();
        let store = SegmentStore::new(root.path());

        let mut transcoder = MockTranscoder::new();
        transcoder.expect_run().times(0);

        let worker = TranscodeWorker::new(Arc::new(transcoder), store);
        let err = worker
            .run("../escape", Path::new("/tmp/source.mp4"))
            .await
            .unwrap_err();
        assert!(matches!(err, VideoError::NotFound(_)));
    }

    #[test]
    fn stderr_is_truncated() {
        let long = "x".repeat(STDERR_LIMIT * 2);
        assert_eq!(truncate_stderr(long.as_bytes()).len(), STDERR_LIMIT);
    }
}
