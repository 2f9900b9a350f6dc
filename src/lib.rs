//! Melies - video ingestion and streaming service.
//!
//! Uploaded videos are stored as-is, transcoded into HLS by an external
//! encoder on a bounded worker pool, and served back either whole, as
//! partial content via HTTP Range requests, or as manifest + segments.
//!
//! Module map:
//! - `config`: environment configuration
//! - `video`: metadata records and the repository port
//! - `coordinator`: per-video processing state, idempotent enqueue
//! - `transcode`: external encoder port + ffmpeg adapter + worker
//! - `store`: on-disk layout for transcoded output
//! - `range`: Range header handling and bounded-memory file serving
//! - `pipeline`: the façade gluing ingestion to transcoding
//! - `routes`: the axum HTTP surface

pub mod config;
pub mod coordinator;
pub mod error;
pub mod pipeline;
pub mod range;
pub mod routes;
pub mod store;
pub mod transcode;
pub mod video;

// Re-exports for convenience
pub use config::Config;
pub use coordinator::{EnqueueOutcome, JobCoordinator};
pub use error::VideoError;
pub use pipeline::VideoPipeline;
pub use store::SegmentStore;
pub use video::{ProcessingState, VideoRecord};
