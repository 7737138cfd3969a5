//! Extractor backed by the `yt-dlp` crate
//!
//! The crate lays out its yt-dlp and ffmpeg binaries under a libraries
//! directory. Jobs run that yt-dlp with the mode's complete option set
//! (subtitles, mp3 extraction, retry and pacing policy), point it at the
//! ffmpeg next to it, and read hook calls back from a progress template.

use anyhow::{anyhow, bail, Context};
use async_trait::async_trait;
use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;
use yt_dlp::fetcher::deps::Libraries;

use super::library::{
    hook_args, parse_hook_line, parse_media_line, ExtractedMedia, MediaExtractor, ProgressHook,
};
use super::subprocess::{
    is_error_line, Invocation, LaunchedProcess, ProcessLauncher, TokioProcessLauncher,
};
use crate::core::models::{AppError, AppResult};
use crate::core::options::DownloadOptions;

pub struct YtDlpCrateExtractor {
    libraries_dir: PathBuf,
    launcher: Arc<dyn ProcessLauncher>,
}

impl YtDlpCrateExtractor {
    pub fn new(libraries_dir: &Path) -> Self {
        Self {
            libraries_dir: libraries_dir.to_path_buf(),
            launcher: Arc::new(TokioProcessLauncher),
        }
    }

    pub fn with_launcher(mut self, launcher: impl ProcessLauncher + 'static) -> Self {
        self.launcher = Arc::new(launcher);
        self
    }

    fn libraries(&self) -> Libraries {
        let (ytdlp, ffmpeg) = if cfg!(windows) {
            ("yt-dlp.exe", "ffmpeg.exe")
        } else {
            ("yt-dlp", "ffmpeg")
        };
        Libraries::new(self.libraries_dir.join(ytdlp), self.libraries_dir.join(ffmpeg))
    }

    /// The yt-dlp run for one job
    pub fn invocation(&self, url: &str, options: &DownloadOptions, output_dir: &Path) -> Invocation {
        let libraries = self.libraries();
        let mut extra = vec![
            "--ffmpeg-location".to_string(),
            libraries.ffmpeg.to_string_lossy().into_owned(),
        ];
        extra.extend(hook_args());

        Invocation {
            program: libraries.youtube,
            args: options.to_cli_args_with(&extra, url),
            working_dir: output_dir.to_path_buf(),
        }
    }

    fn unavailable(&self, reason: impl std::fmt::Display) -> AppError {
        AppError::LibraryUnavailable(format!("{} ({})", reason, self.libraries_dir.display()))
    }
}

#[async_trait]
impl MediaExtractor for YtDlpCrateExtractor {
    /// Both binaries must be present: mp3 extraction and srt conversion
    /// need ffmpeg
    async fn probe(&self) -> AppResult<String> {
        let libraries = self.libraries();
        for (name, path) in [("yt-dlp", &libraries.youtube), ("ffmpeg", &libraries.ffmpeg)] {
            if !path.is_file() {
                return Err(self.unavailable(format!("{} binary missing", name)));
            }
        }

        let invocation = Invocation {
            program: libraries.youtube.clone(),
            args: vec!["--version".to_string()],
            working_dir: self.libraries_dir.clone(),
        };
        let LaunchedProcess { mut output, exit } = self
            .launcher
            .launch(&invocation)
            .map_err(|e| self.unavailable(format!("cannot run yt-dlp: {}", e)))?;

        let mut version = None;
        while let Some(line) = output.next().await {
            match line {
                Ok(text) if version.is_none() && !text.trim().is_empty() => {
                    version = Some(text.trim().to_string());
                }
                Ok(_) => {}
                Err(e) => return Err(self.unavailable(format!("cannot read yt-dlp version: {}", e))),
            }
        }
        drop(output);

        match exit.await {
            Ok(Some(0)) => version.ok_or_else(|| self.unavailable("yt-dlp reported no version")),
            Ok(code) => Err(self.unavailable(format!("yt-dlp --version failed with {:?}", code))),
            Err(e) => Err(self.unavailable(format!("cannot run yt-dlp: {}", e))),
        }
    }

    async fn extract(
        &self,
        url: &str,
        options: &DownloadOptions,
        output_dir: &Path,
        hook: ProgressHook,
    ) -> anyhow::Result<ExtractedMedia> {
        let invocation = self.invocation(url, options, output_dir);
        debug!("Running linked yt-dlp: {}", invocation.command_line());

        let LaunchedProcess { mut output, exit } = self
            .launcher
            .launch(&invocation)
            .with_context(|| format!("failed to start {}", invocation.program.display()))?;

        let mut media = None;
        let mut last_error = None;
        while let Some(line) = output.next().await {
            let line = line.context("failed to read yt-dlp output")?;
            if let Some(status) = parse_hook_line(&line) {
                hook(status);
            } else if let Some(found) = parse_media_line(&line) {
                media = Some(found);
            } else if is_error_line(&line) {
                last_error = Some(line.trim().to_string());
            } else if !line.trim().is_empty() {
                debug!("yt-dlp: {}", line);
            }
        }
        drop(output);

        match exit.await.context("failed to wait for yt-dlp")? {
            Some(0) => media.ok_or_else(|| anyhow!("yt-dlp finished without reporting the saved file")),
            Some(code) => Err(anyhow!(
                last_error.unwrap_or_else(|| format!("yt-dlp exited with code {}", code))
            )),
            None => bail!("yt-dlp terminated without an exit code"),
        }
    }
}
