//! HTTP Range parsing and partial-content file serving.
//!
//! Only the single-range `bytes=<start>-[<end>]` form is supported.
//! Responses stream straight from the file in fixed-size buffers; the
//! requested window is never materialized in one allocation.

use std::io::SeekFrom;
use std::path::Path;

use axum::body::Body;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use futures::TryStreamExt;
use regex::Regex;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_util::io::ReaderStream;

use crate::error::VideoError;

/// Buffer size for file-to-response copies.
const STREAM_BUF_SIZE: usize = 64 * 1024;

/// Resolved byte window for one request. Ephemeral, never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeWindow {
    pub start: u64,
    pub end: u64,
    pub total_len: u64,
}

impl RangeWindow {
    /// Number of bytes in the window (always at least 1).
    pub fn byte_len(&self) -> u64 {
        self.end - self.start + 1
    }

    fn content_range(&self) -> String {
        format!("bytes {}-{}/{}", self.start, self.end, self.total_len)
    }
}

fn invalid(reason: &str, total_len: u64) -> VideoError {
    VideoError::InvalidRange {
        reason: reason.to_string(),
        total_len,
    }
}

/// Parse a `Range` header value and resolve it against a file of
/// `total_len` bytes.
///
/// An omitted end offset yields a window of `chunk_size` bytes: the client
/// is handed one chunk at a time, not the whole file remainder. The end is
/// clamped to the last byte of the file.
pub fn resolve_range(
    header: &str,
    total_len: u64,
    chunk_size: u64,
) -> Result<RangeWindow, VideoError> {
    if header.contains(',') {
        return Err(invalid("multi-range requests are not supported", total_len));
    }

    let re = Regex::new(r"^bytes=(\d+)-(\d*)$").unwrap();
    let caps = re
        .captures(header.trim())
        .ok_or_else(|| invalid("malformed Range header", total_len))?;

    let start: u64 = caps[1]
        .parse()
        .map_err(|_| invalid("range start is not a valid offset", total_len))?;
    if start >= total_len {
        return Err(invalid("range start beyond end of file", total_len));
    }

    let end = match &caps[2] {
        "" => start.saturating_add(chunk_size.saturating_sub(1)),
        text => {
            let end: u64 = text
                .parse()
                .map_err(|_| invalid("range end is not a valid offset", total_len))?;
            if end < start {
                return Err(invalid("range end precedes range start", total_len));
            }
            end
        }
    };

    Ok(RangeWindow {
        start,
        end: end.min(total_len - 1),
        total_len,
    })
}

/// Serve the whole file: status 200 with `Content-Type` and
/// `Content-Length` from file metadata.
pub async fn serve_whole(path: &Path, content_type: &str) -> Result<Response, VideoError> {
    let meta = metadata(path).await?;
    let file = open(path).await?;

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (header::CONTENT_LENGTH, meta.len().to_string()),
            (header::ACCEPT_RANGES, String::from("bytes")),
        ],
        body_stream(file, path),
    )
        .into_response())
}

/// Serve a byte window of the file per the optional `Range` header.
///
/// Absent header falls back to [`serve_whole`]. A present header yields
/// 206 with `Content-Range` and a body of exactly the resolved window,
/// or a 416-equivalent error for anything malformed or out of bounds.
pub async fn serve_range(
    path: &Path,
    content_type: &str,
    range_header: Option<&str>,
    chunk_size: u64,
) -> Result<Response, VideoError> {
    let Some(range_header) = range_header else {
        return serve_whole(path, content_type).await;
    };

    let meta = metadata(path).await?;
    let window = resolve_range(range_header, meta.len(), chunk_size)?;

    let mut file = open(path).await?;
    file.seek(SeekFrom::Start(window.start)).await?;
    let limited = file.take(window.byte_len());

    Ok((
        StatusCode::PARTIAL_CONTENT,
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (header::CONTENT_RANGE, window.content_range()),
            (header::CONTENT_LENGTH, window.byte_len().to_string()),
            (header::ACCEPT_RANGES, String::from("bytes")),
        ],
        body_stream(limited, path),
    )
        .into_response())
}

async fn metadata(path: &Path) -> Result<std::fs::Metadata, VideoError> {
    tokio::fs::metadata(path).await.map_err(|e| not_found(e, path))
}

async fn open(path: &Path) -> Result<File, VideoError> {
    File::open(path).await.map_err(|e| not_found(e, path))
}

fn not_found(err: std::io::Error, path: &Path) -> VideoError {
    if err.kind() == std::io::ErrorKind::NotFound {
        VideoError::FileNotFound(path.to_path_buf())
    } else {
        VideoError::Io(err)
    }
}

/// Body backed by fixed-size reads. Read failures mid-stream cannot be
/// retracted from the client, so they are logged before the response aborts.
fn body_stream<R>(reader: R, path: &Path) -> Body
where
    R: tokio::io::AsyncRead + Send + 'static,
{
    let path = path.to_path_buf();
    let stream = ReaderStream::with_capacity(reader, STREAM_BUF_SIZE).inspect_err(move |err| {
        tracing::error!(file = %path.display(), error = %err, "read failed mid-stream, aborting response");
    });
    Body::from_stream(stream)
}
