//! Subtitle Media Downloader - Core Library
//!
//! Downloads a video (best mp4) or its audio (mp3) together with English
//! subtitles by driving yt-dlp, either as a child process or as a linked
//! library, while a single-threaded front-end shows live progress.

pub mod commands;
pub mod core;
pub mod utils;

// Re-export commonly used types
pub use core::{
    config::{AppConfig, BackendKind},
    host::{JobHost, Presentation, Submission, UiCommand, UiDispatcher},
    models::{AppError, AppResult, DownloadMode, DownloadRequest, JobOutcome, ProgressEvent},
    runner::DownloadBackend,
    tool_locator::{ToolLocation, ToolLocator},
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Initialize the library with default settings
pub fn init() -> anyhow::Result<()> {
    // 忽略重复初始化
    utils::logging::init_tracing("info");

    tracing::info!("📚 {} v{} initialized", NAME, VERSION);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init() {
        assert!(init().is_ok());
        // a second call must not fail either
        assert!(init().is_ok());
    }

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
        assert_eq!(NAME, "subtitle-media-downloader");
    }
}
