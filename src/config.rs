//! Process configuration, loaded once from the environment at startup and
//! passed to constructors. Nothing here is ambient global state.

use std::env;
use std::path::PathBuf;

/// Default window handed out when a Range request omits its end offset.
pub const DEFAULT_CHUNK_SIZE: u64 = 1024 * 1024;

/// Default target duration of each HLS segment, in seconds.
pub const DEFAULT_SEGMENT_SECONDS: u32 = 10;

/// Default cap on transcodes running at the same time.
pub const DEFAULT_MAX_CONCURRENT_TRANSCODES: usize = 2;

#[derive(Clone, Debug)]
pub struct Config {
    /// HTTP server bind address
    pub addr: String,
    /// HTTP server port
    pub port: String,
    /// Directory holding uploaded originals
    pub video_root: PathBuf,
    /// Directory holding per-video HLS output
    pub hls_root: PathBuf,
    /// Byte window served for open-ended Range requests
    pub chunk_size: u64,
    /// Target HLS segment duration handed to the transcoder
    pub segment_seconds: u32,
    /// Bound on concurrently running transcode jobs
    pub max_concurrent_transcodes: usize,
}

impl Config {
    /// Load configuration from environment variables, falling back to
    /// defaults for anything unset or unparsable.
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();

        Self {
            addr: env::var("ADDR").unwrap_or_else(|_| String::from("127.0.0.1")),
            port: env::var("PORT").unwrap_or_else(|_| String::from("3000")),
            video_root: env::var("VIDEO_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./videos")),
            hls_root: env::var("HLS_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./videos_hls")),
            chunk_size: env_parse("CHUNK_SIZE", DEFAULT_CHUNK_SIZE),
            segment_seconds: env_parse("SEGMENT_SECONDS", DEFAULT_SEGMENT_SECONDS),
            max_concurrent_transcodes: env_parse(
                "MAX_CONCURRENT_TRANSCODES",
                DEFAULT_MAX_CONCURRENT_TRANSCODES,
            ),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_parse_falls_back_on_missing_var() {
        assert_eq!(env_parse("MELIES_TEST_UNSET_VAR", 42u64), 42);
    }

    #[test]
    fn env_parse_falls_back_on_garbage() {
        env::set_var("MELIES_TEST_GARBAGE_VAR", "not a number");
        assert_eq!(env_parse("MELIES_TEST_GARBAGE_VAR", 7usize), 7);
    }

    #[test]
    fn env_parse_reads_valid_value() {
        env::set_var("MELIES_TEST_VALID_VAR", "123");
        assert_eq!(env_parse("MELIES_TEST_VALID_VAR", 0u64), 123);
    }
}
