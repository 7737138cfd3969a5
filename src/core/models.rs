//! Core data models for the downloader application

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Width of the separator rules printed around job output
pub const RULE_WIDTH: usize = 80;

/// What the user wants to get out of a media URL
#[derive(
    Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum DownloadMode {
    /// Best mp4 video merged with m4a audio
    #[default]
    Video,
    /// Audio only, converted to mp3
    Audio,
}

impl DownloadMode {
    /// Window/application title for this mode
    pub fn app_title(self) -> &'static str {
        match self {
            Self::Video => "YT-DLP Video Downloader",
            Self::Audio => "YT-DLP MP3 Extractor with English Subtitles",
        }
    }

    /// Trigger label while no job is running
    pub fn idle_label(self) -> &'static str {
        match self {
            Self::Video => "Download Video",
            Self::Audio => "Extract MP3",
        }
    }

    /// Trigger label while a job is running
    pub fn busy_label(self) -> &'static str {
        match self {
            Self::Video => "Downloading...",
            Self::Audio => "Extracting Audio...",
        }
    }

    pub fn start_banner(self, url: &str) -> String {
        match self {
            Self::Video => format!("Starting download for: {}", url),
            Self::Audio => format!("Starting MP3 extraction for: {}", url),
        }
    }

    pub fn success_message(self) -> &'static str {
        match self {
            Self::Video => "Download completed successfully!",
            Self::Audio => "MP3 extraction completed successfully!",
        }
    }

    /// Prefix used when a job dies with an error rather than an exit code
    pub fn error_prefix(self) -> &'static str {
        match self {
            Self::Video => "Error during download",
            Self::Audio => "Error during MP3 extraction",
        }
    }
}

impl fmt::Display for DownloadMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Video => write!(f, "video"),
            Self::Audio => write!(f, "audio"),
        }
    }
}

/// A validated request for one download job.
///
/// The URL is trimmed and guaranteed non-empty; nothing else about it is
/// checked; malformed URLs are reported by the downloader itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRequest {
    url: String,
    mode: DownloadMode,
}

impl DownloadRequest {
    pub fn new(url: impl AsRef<str>, mode: DownloadMode) -> AppResult<Self> {
        let url = url.as_ref().trim();
        if url.is_empty() {
            return Err(AppError::Validation("Please enter a video URL".to_string()));
        }

        Ok(Self {
            url: url.to_string(),
            mode,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn mode(&self) -> DownloadMode {
        self.mode
    }
}

/// Progress reported by a running job, in arrival order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum ProgressEvent {
    /// Structured transfer progress; fields are the downloader's own strings
    Downloading {
        percent: String,
        speed: String,
        eta: String,
    },
    /// A phase change such as post-processing
    Stage { message: String },
    /// One line of downloader output, forwarded verbatim
    RawLine { text: String },
}

impl fmt::Display for ProgressEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Downloading {
                percent,
                speed,
                eta,
            } => write!(f, "Downloading: {} at {} ETA: {}", percent, speed, eta),
            Self::Stage { message } => write!(f, "{}", message),
            Self::RawLine { text } => write!(f, "{}", text),
        }
    }
}

/// Terminal result of a job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobOutcome {
    Success {
        summary: String,
    },
    Failure {
        reason: String,
        exit_code: Option<i32>,
    },
}

impl JobOutcome {
    pub fn success(summary: impl Into<String>) -> Self {
        Self::Success {
            summary: summary.into(),
        }
    }

    pub fn failure(reason: impl Into<String>, exit_code: Option<i32>) -> Self {
        Self::Failure {
            reason: reason.into(),
            exit_code,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Self::Success { .. } => Some(0),
            Self::Failure { exit_code, .. } => *exit_code,
        }
    }

    /// The single user-facing message describing this outcome
    pub fn message(&self, mode: DownloadMode) -> String {
        match self {
            Self::Success { .. } => mode.success_message().to_string(),
            Self::Failure {
                exit_code: Some(code),
                ..
            } => format!("Download failed with error code: {}", code),
            Self::Failure {
                reason,
                exit_code: None,
            } => format!("{}: {}", mode.error_prefix(), reason),
        }
    }

    /// The one notification shown when a job ends
    pub fn notification(&self, mode: DownloadMode) -> Notification {
        let message = self.message(mode);
        match self {
            Self::Success { .. } => Notification::info("Success", message),
            Self::Failure {
                exit_code: Some(_),
                ..
            } => Notification::error("Error", message),
            Self::Failure { exit_code: None, .. } => Notification::error("Download Error", message),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotificationLevel {
    Info,
    Warning,
    Error,
}

/// A modal message for the presentation layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub level: NotificationLevel,
    pub title: String,
    pub message: String,
}

impl Notification {
    pub fn info(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self::with_level(NotificationLevel::Info, title, message)
    }

    pub fn warning(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self::with_level(NotificationLevel::Warning, title, message)
    }

    pub fn error(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self::with_level(NotificationLevel::Error, title, message)
    }

    fn with_level(level: NotificationLevel, title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level,
            title: title.into(),
            message: message.into(),
        }
    }
}

/// Application error types

#[derive(Debug, thiserror::Error)]

pub enum AppError {
    #[error("Elevation error: {0}")]
    Elevation(String),

    #[error("{tool} not found in {} or its subdirectories", .searched.display())]
    ToolNotFound { tool: String, searched: PathBuf },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Job in progress: {0}")]
    Busy(String),

    #[error("Download error: {0}")]
    Download(String),

    #[error("Unexpected error: {0}")]
    Unexpected(String),

    #[error("Downloader library unavailable: {0}")]
    LibraryUnavailable(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AppError {
    /// Notification for an error that aborts startup
    pub fn fatal_notification(&self) -> Notification {
        match self {
            Self::Elevation(message) => Notification::error(
                "Elevation Failed",
                format!("Could not elevate privileges. {}", message),
            ),
            Self::ToolNotFound { tool, .. } => Notification::error(
                "YT-DLP Not Found",
                format!(
                    "{} not found in the current working directory or _internal subdirectory",
                    tool
                ),
            ),
            Self::LibraryUnavailable(message) => {
                Notification::error("YT-DLP Library Missing", message.clone())
            }
            other => Notification::error("Startup Error", other.to_string()),
        }
    }
}

/// Result type alias for application operations

pub type AppResult<T> = Result<T, AppError>;
