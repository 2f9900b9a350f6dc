use std::sync::Arc;

use melies::config::Config;
use melies::coordinator::JobCoordinator;
use melies::pipeline::VideoPipeline;
use melies::routes::{self, AppState};
use melies::store::SegmentStore;
use melies::transcode::{FfmpegTranscoder, TranscodeWorker, Transcoder};
use melies::video::{InMemoryVideoStore, VideoRepository};

#[tokio::main]
async fn main() {
    let config = Config::from_env();

    tracing_subscriber::fmt::init();

    // Make sure both media roots exist before accepting uploads.
    tokio::fs::create_dir_all(&config.video_root)
        .await
        .expect("Failed to create video root");
    tokio::fs::create_dir_all(&config.hls_root)
        .await
        .expect("Failed to create HLS root");

    let store = SegmentStore::new(config.hls_root.clone());
    let transcoder: Arc<dyn Transcoder> = Arc::new(FfmpegTranscoder::new(config.segment_seconds));
    let worker = Arc::new(TranscodeWorker::new(transcoder, store.clone()));
    let coordinator = Arc::new(JobCoordinator::new(config.max_concurrent_transcodes));
    let repo: Arc<dyn VideoRepository> = Arc::new(InMemoryVideoStore::new());
    let pipeline = Arc::new(VideoPipeline::new(repo.clone(), coordinator, worker));

    let app = routes::router(AppState {
        pipeline,
        repo,
        store,
        video_root: config.video_root.clone(),
        chunk_size: config.chunk_size,
    });

    let listener = tokio::net::TcpListener::bind(format!("{}:{}", config.addr, config.port))
        .await
        .expect("Failed to bind TCP listener");
    tracing::info!("listening at {}:{}", config.addr, config.port);
    axum::serve(listener, app)
        .await
        .expect("Server failed to start");
}
