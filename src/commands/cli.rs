//! Command-line arguments
//!
//! Flags override the configuration file for this run only.

use clap::Parser;
use std::path::PathBuf;

use crate::core::config::{AppConfig, BackendKind};
use crate::core::models::DownloadMode;

/// Download videos or MP3s with English subtitles through yt-dlp
#[derive(Debug, Clone, Parser)]
#[command(name = "subtitle-media-downloader")]
#[command(version)]
pub struct Cli {
    /// What to download
    #[arg(long, value_enum)]
    pub mode: Option<DownloadMode>,

    /// How yt-dlp is driven
    #[arg(long, value_enum)]
    pub backend: Option<BackendKind>,

    /// Read configuration from this file instead of the default location
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Download this URL, then exit
    #[arg(long)]
    pub url: Option<String>,

    /// Skip the administrator check
    #[arg(long = "no-elevate")]
    pub no_elevate: bool,

    /// Write downloads here
    #[arg(long = "output-dir")]
    pub output_dir: Option<PathBuf>,
}

impl Cli {
    pub fn apply_overrides(&self, config: &mut AppConfig) {
        if let Some(mode) = self.mode {
            config.download.default_mode = mode;
        }
        if let Some(backend) = self.backend {
            config.download.backend = backend;
        }
        if let Some(dir) = &self.output_dir {
            config.download.output_directory = Some(dir.clone());
        }
        if self.no_elevate {
            config.startup.require_elevation = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_parser_builds() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_overrides_apply_to_config() {
        let cli = Cli::parse_from([
            "subtitle-media-downloader",
            "--mode",
            "audio",
            "--backend",
            "library",
            "--no-elevate",
            "--output-dir",
            "media",
        ]);

        let mut config = AppConfig::default();
        cli.apply_overrides(&mut config);

        assert_eq!(config.download.default_mode, DownloadMode::Audio);
        assert_eq!(config.download.backend, BackendKind::Library);
        assert_eq!(config.download.output_directory, Some(PathBuf::from("media")));
        assert!(!config.startup.require_elevation);
    }

    #[test]
    fn test_no_flags_leave_config_alone() {
        let cli = Cli::parse_from(["subtitle-media-downloader"]);
        let mut config = AppConfig::default();
        cli.apply_overrides(&mut config);
        assert_eq!(config, AppConfig::default());
    }
}
