//! HTTP surface: upload intake, metadata queries, and media delivery.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, Multipart, Path as UrlPath, State};
use axum::http::{header, HeaderMap};
use axum::response::Response;
use axum::routing::{get, post};
use axum::{BoxError, Json, Router};
use futures::{Stream, TryStreamExt};
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio_util::io::StreamReader;

use crate::error::VideoError;
use crate::pipeline::VideoPipeline;
use crate::range;
use crate::store::{safe_component, SegmentStore};
use crate::video::{ProcessingState, VideoRecord, VideoRepository};

/// Media type for HLS manifests.
const MANIFEST_CONTENT_TYPE: &str = "application/vnd.apple.mpegurl";

/// Media type for MPEG transport stream segments.
const SEGMENT_CONTENT_TYPE: &str = "video/mp2t";

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<VideoPipeline>,
    pub repo: Arc<dyn VideoRepository>,
    pub store: SegmentStore,
    pub video_root: PathBuf,
    pub chunk_size: u64,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/videos", post(upload_video).get(list_videos))
        .route("/api/v1/videos/:video_id", get(get_video))
        .route("/api/v1/videos/stream/:video_id", get(stream_video))
        .route(
            "/api/v1/videos/stream/range/:video_id",
            get(stream_video_range),
        )
        .route("/api/v1/videos/:video_id/master.m3u8", get(serve_manifest))
        .route("/api/v1/videos/:video_id/:segment", get(serve_segment))
        .layer(DefaultBodyLimit::disable())
        .with_state(state)
}

/// Accepts a multipart upload (`file`, `title`, `description`), streams the
/// file into the video root, and hands the stored path to the pipeline.
///
/// The response carries the new record in `Pending` state; it does not wait
/// for the transcode.
async fn upload_video(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<VideoRecord>, VideoError> {
    let mut title = String::new();
    let mut description = String::new();
    let mut stored: Option<(PathBuf, String)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| VideoError::InvalidUpload(e.to_string()))?
    {
        let name = field.name().map(|n| n.to_string());
        match name.as_deref() {
            Some("title") => {
                title = field
                    .text()
                    .await
                    .map_err(|e| VideoError::InvalidUpload(e.to_string()))?;
            }
            Some("description") => {
                description = field
                    .text()
                    .await
                    .map_err(|e| VideoError::InvalidUpload(e.to_string()))?;
            }
            Some("file") => {
                let file_name = field
                    .file_name()
                    .ok_or_else(|| VideoError::InvalidUpload("file part has no filename".into()))?;
                let file_name = sanitize_filename(file_name)?;
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_owned();

                let path = state.video_root.join(&file_name);
                tracing::info!(path = %path.display(), "saving uploaded file");
                stream_to_file(&path, field).await?;
                stored = Some((path, content_type));
            }
            _ => continue,
        }
    }

    let (path, content_type) =
        stored.ok_or_else(|| VideoError::InvalidUpload("missing file part".into()))?;
    let record = state
        .pipeline
        .ingest(path, title, description, content_type)
        .await?;
    Ok(Json(record))
}

async fn list_videos(State(state): State<AppState>) -> Result<Json<Vec<VideoRecord>>, VideoError> {
    Ok(Json(state.repo.find_all().await?))
}

async fn get_video(
    State(state): State<AppState>,
    UrlPath(video_id): UrlPath<String>,
) -> Result<Json<VideoRecord>, VideoError> {
    Ok(Json(fetch_record(&state, &video_id).await?))
}

/// Whole original file, status 200.
async fn stream_video(
    State(state): State<AppState>,
    UrlPath(video_id): UrlPath<String>,
) -> Result<Response, VideoError> {
    let record = fetch_record(&state, &video_id).await?;
    range::serve_whole(&record.file_path, &record.content_type).await
}

/// Partial content per the optional `Range` header.
async fn stream_video_range(
    State(state): State<AppState>,
    UrlPath(video_id): UrlPath<String>,
    headers: HeaderMap,
) -> Result<Response, VideoError> {
    let record = fetch_record(&state, &video_id).await?;
    let range_header = headers.get(header::RANGE).and_then(|v| v.to_str().ok());
    range::serve_range(
        &record.file_path,
        &record.content_type,
        range_header,
        state.chunk_size,
    )
    .await
}

async fn serve_manifest(
    State(state): State<AppState>,
    UrlPath(video_id): UrlPath<String>,
) -> Result<Response, VideoError> {
    ensure_ready(&state, &video_id).await?;
    let path = state.store.manifest_path(&video_id)?;
    range::serve_whole(&path, MANIFEST_CONTENT_TYPE).await
}

async fn serve_segment(
    State(state): State<AppState>,
    UrlPath((video_id, segment)): UrlPath<(String, String)>,
) -> Result<Response, VideoError> {
    ensure_ready(&state, &video_id).await?;
    let path = state.store.segment_path(&video_id, &segment)?;
    range::serve_whole(&path, SEGMENT_CONTENT_TYPE).await
}

async fn fetch_record(state: &AppState, video_id: &str) -> Result<VideoRecord, VideoError> {
    state
        .repo
        .find_by_id(video_id)
        .await?
        .ok_or_else(|| VideoError::NotFound(video_id.to_string()))
}

/// Transcoded output is only visible once the video is `Ready`; anything
/// else (unknown, in flight, failed) reads as not found.
async fn ensure_ready(state: &AppState, video_id: &str) -> Result<(), VideoError> {
    let record = fetch_record(state, video_id).await?;
    if record.state != ProcessingState::Ready {
        return Err(VideoError::NotFound(video_id.to_string()));
    }
    Ok(())
}

/// Reduce an uploaded filename to its final component and refuse anything
/// outside the safe-character allowlist.
fn sanitize_filename(raw: &str) -> Result<String, VideoError> {
    let name = raw.rsplit(['/', '\\']).next().unwrap_or("");
    if !safe_component(name) {
        return Err(VideoError::InvalidUpload(format!(
            "unacceptable filename: {raw}"
        )));
    }
    Ok(name.to_string())
}

/// Save a `Stream` of body chunks to a file.
async fn stream_to_file<S, E>(path: &Path, stream: S) -> Result<(), VideoError>
where
    S: Stream<Item = Result<Bytes, E>>,
    E: Into<BoxError>,
{
    let body_with_io_error = stream.map_err(|err| io::Error::new(io::ErrorKind::Other, err));
    let body_reader = StreamReader::new(body_with_io_error);
    futures::pin_mut!(body_reader);

    let mut file = BufWriter::new(File::create(path).await?);
    tokio::io::copy(&mut body_reader, &mut file).await?;
    file.flush().await?;

    Ok(())
}
