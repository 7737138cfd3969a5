//! Download backends
//!
//! Two interchangeable implementations of [`DownloadBackend`](crate::core::runner::DownloadBackend): one spawns the
//! yt-dlp executable, the other calls a linked library in-process.

pub mod library;
pub mod subprocess;

#[cfg(feature = "ytdlp-crate")]
pub mod ytdlp_crate;

pub use library::{linked_extractor, LibraryBackend, MediaExtractor};
pub use subprocess::{Invocation, LaunchedProcess, ProcessLauncher, SubprocessBackend, TokioProcessLauncher};
