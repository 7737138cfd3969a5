//! Runs jobs through a linked downloader library
//!
//! The library reports progress through a hook; each call becomes a
//! `Downloading` event, and the end of a transfer becomes a post-processing
//! stage event. Library errors never escape: they turn into a failure
//! outcome carrying the library's message.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info};

use crate::core::models::{AppError, AppResult, DownloadRequest, JobOutcome, ProgressEvent};
use crate::core::options::DownloadOptions;
use crate::core::runner::{emit, DownloadBackend, ProgressSender};

/// Placeholder the library uses when a value is not known yet
const UNKNOWN: &str = "N/A";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookState {
    Downloading,
    Finished,
    Error,
}

/// One progress report from the library
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookStatus {
    pub state: HookState,
    pub percent: Option<String>,
    pub speed: Option<String>,
    pub eta: Option<String>,
}

impl HookStatus {
    pub fn downloading(percent: &str, speed: &str, eta: &str) -> Self {
        Self {
            state: HookState::Downloading,
            percent: Some(percent.to_string()),
            speed: Some(speed.to_string()),
            eta: Some(eta.to_string()),
        }
    }

    pub fn finished() -> Self {
        Self {
            state: HookState::Finished,
            percent: None,
            speed: None,
            eta: None,
        }
    }
}

pub type ProgressHook = Arc<dyn Fn(HookStatus) + Send + Sync>;

/// Translate a hook call into the event shown to the user
pub fn hook_event(status: &HookStatus) -> Option<ProgressEvent> {
    let field = |value: &Option<String>| {
        value
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .unwrap_or(UNKNOWN)
            .to_string()
    };

    match status.state {
        HookState::Downloading => Some(ProgressEvent::Downloading {
            percent: field(&status.percent),
            speed: field(&status.speed),
            eta: field(&status.eta),
        }),
        HookState::Finished => Some(ProgressEvent::Stage {
            message: "Download finished, now processing...".to_string(),
        }),
        HookState::Error => None,
    }
}

/// What the library produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedMedia {
    pub title: String,
    pub id: String,
}

const HOOK_TAG: &str = "[hook] ";
const MEDIA_TAG: &str = "[media] ";

/// Flags that make yt-dlp report hook calls and the finished media as
/// tagged lines, read back by [`parse_hook_line`] and [`parse_media_line`]
pub fn hook_args() -> Vec<String> {
    vec![
        "--progress".to_string(),
        "--progress-template".to_string(),
        format!(
            "download:{}%(progress.status)s|%(progress._percent_str)s|%(progress._speed_str)s|%(progress._eta_str)s",
            HOOK_TAG
        ),
        "--print".to_string(),
        format!("after_move:{}%(id)s|%(title)s", MEDIA_TAG),
        "--no-simulate".to_string(),
    ]
}

/// A progress template line as a hook call
pub fn parse_hook_line(line: &str) -> Option<HookStatus> {
    let fields = line.trim().strip_prefix(HOOK_TAG)?;
    let mut parts = fields.splitn(4, '|');

    let state = match parts.next()?.trim() {
        "downloading" => HookState::Downloading,
        "finished" => HookState::Finished,
        "error" => HookState::Error,
        _ => return None,
    };
    // yt-dlp fills unknown template fields with "NA"
    let mut field = || {
        parts
            .next()
            .map(str::trim)
            .filter(|v| !v.is_empty() && *v != "NA")
            .map(str::to_string)
    };

    Some(HookStatus {
        state,
        percent: field(),
        speed: field(),
        eta: field(),
    })
}

/// The line printed once the final file is in place
pub fn parse_media_line(line: &str) -> Option<ExtractedMedia> {
    let fields = line.trim().strip_prefix(MEDIA_TAG)?;
    let (id, title) = fields.split_once('|')?;
    Some(ExtractedMedia {
        title: title.to_string(),
        id: id.to_string(),
    })
}

#[async_trait]
pub trait MediaExtractor: Send + Sync {
    /// Version of the linked library; an error means it cannot be used
    async fn probe(&self) -> AppResult<String>;

    async fn extract(
        &self,
        url: &str,
        options: &DownloadOptions,
        output_dir: &Path,
        hook: ProgressHook,
    ) -> anyhow::Result<ExtractedMedia>;
}

pub struct LibraryBackend {
    extractor: Arc<dyn MediaExtractor>,
    output_dir: PathBuf,
    version: String,
}

impl std::fmt::Debug for LibraryBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LibraryBackend")
            .field("output_dir", &self.output_dir)
            .field("version", &self.version)
            .finish()
    }
}

impl LibraryBackend {
    /// Probe the library once and keep it for the rest of the run.
    ///
    /// Fails fast with `LibraryUnavailable` so a missing library is reported
    /// at startup instead of on the first job.
    pub async fn connect(
        extractor: Arc<dyn MediaExtractor>,
        output_dir: impl Into<PathBuf>,
    ) -> AppResult<Self> {
        let version = extractor.probe().await?;
        info!("Using yt-dlp library version: {}", version);

        Ok(Self {
            extractor,
            output_dir: output_dir.into(),
            version,
        })
    }
}

#[async_trait]
impl DownloadBackend for LibraryBackend {
    fn name(&self) -> &'static str {
        "library"
    }

    fn describe(&self) -> String {
        format!("YT-DLP: linked library {}", self.version)
    }

    async fn run(&self, request: &DownloadRequest, sink: ProgressSender) -> JobOutcome {
        let options = DownloadOptions::for_mode(request.mode());
        let hook: ProgressHook = {
            let sink = sink.clone();
            Arc::new(move |status: HookStatus| {
                if let Some(event) = hook_event(&status) {
                    emit(&sink, event);
                }
            })
        };

        match self
            .extractor
            .extract(request.url(), &options, &self.output_dir, hook)
            .await
        {
            Ok(media) => {
                info!("Extracted \"{}\" [{}]", media.title, media.id);
                JobOutcome::success(media.title)
            }
            Err(e) => {
                let reason = format!("{:#}", e);
                error!("Library download failed: {}", reason);
                JobOutcome::failure(reason, None)
            }
        }
    }
}

/// The extractor compiled into this build
#[cfg(feature = "ytdlp-crate")]
pub fn linked_extractor(libraries_dir: &Path) -> AppResult<Arc<dyn MediaExtractor>> {
    Ok(Arc::new(super::ytdlp_crate::YtDlpCrateExtractor::new(libraries_dir)))
}

/// The extractor compiled into this build
#[cfg(not(feature = "ytdlp-crate"))]
pub fn linked_extractor(_libraries_dir: &Path) -> AppResult<Arc<dyn MediaExtractor>> {
    Err(AppError::LibraryUnavailable(
        "this build does not link the yt-dlp library; rebuild with the `ytdlp-crate` feature or use the subprocess backend"
            .to_string(),
    ))
}
