//! Application configuration management

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::models::DownloadMode;
use super::tool_locator::{default_tool_name, INTERNAL_DIR};

/// Which download backend runs the jobs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Spawn the yt-dlp executable and stream its output
    #[default]
    Subprocess,
    /// Drive a linked downloader library in-process
    Library,
}

/// Main application configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub download: DownloadSettings,
    pub tool: ToolSettings,
    pub startup: StartupSettings,
    pub advanced: AdvancedConfig,
}

/// Job-related configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadSettings {
    pub backend: BackendKind,
    pub default_mode: DownloadMode,
    /// Where files land; the working directory when unset
    pub output_directory: Option<PathBuf>,
    /// Binaries used by the library backend
    pub libraries_dir: PathBuf,
}

/// How the yt-dlp executable is found
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolSettings {
    /// Executable file name, platform default when unset
    pub executable_name: Option<String>,
    /// Root of the search; the working directory when unset
    pub search_root: Option<PathBuf>,
    /// Directory an installer unpacked bundled files into
    pub bundle_dir: Option<PathBuf>,
    /// Use the application's own directory as bundle dir when none is set
    pub search_executable_dir: bool,
    pub internal_dir_name: String,
    pub recursive_scan: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StartupSettings {
    pub require_elevation: bool,
    pub log_directory_overview: bool,
    pub overview_depth: usize,
    pub overview_max_files: usize,
}

/// Advanced configuration options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdvancedConfig {
    pub log_level: String, // "error", "warn", "info", "debug", "trace"
}

impl Default for DownloadSettings {
    fn default() -> Self {
        Self {
            backend: BackendKind::Subprocess,
            default_mode: DownloadMode::Video,
            output_directory: None,
            libraries_dir: PathBuf::from("libs"),
        }
    }
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            executable_name: None,
            search_root: None,
            bundle_dir: None,
            search_executable_dir: true,
            internal_dir_name: INTERNAL_DIR.to_string(),
            recursive_scan: true,
        }
    }
}

impl Default for StartupSettings {
    fn default() -> Self {
        Self {
            require_elevation: cfg!(windows),
            log_directory_overview: true,
            overview_depth: 2,
            overview_max_files: 10,
        }
    }
}

impl Default for AdvancedConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

impl ToolSettings {
    pub fn tool_name(&self) -> String {
        self.executable_name
            .clone()
            .unwrap_or_else(|| default_tool_name().to_string())
    }
}

impl AppConfig {
    /// Load configuration from the default location, creating it if missing
    pub fn load() -> Result<Self> {
        let config_path = Self::get_config_path()?;

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            let config = Self::default();
            config.save_to(&config_path)?;
            tracing::info!("Created default configuration at: {:?}", config_path);
            Ok(config)
        }
    }

    /// Load and validate configuration from an explicit file
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let config: AppConfig =
            serde_json::from_str(&content).with_context(|| "Failed to parse config file")?;
        config
            .validate()
            .with_context(|| format!("Invalid configuration in {:?}", path))?;

        tracing::info!("Loaded configuration from: {:?}", path);
        Ok(config)
    }

    /// Configuration for this run; any problem falls back to defaults
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let loaded = match path {
            Some(path) => Self::load_from(path),
            None => Self::load(),
        };

        loaded.unwrap_or_else(|err| {
            tracing::warn!("Using default configuration: {:#}", err);
            Self::default()
        })
    }

    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let content =
            serde_json::to_string_pretty(self).with_context(|| "Failed to serialize config")?;

        std::fs::write(config_path, content)
            .with_context(|| format!("Failed to write config file: {:?}", config_path))?;

        tracing::info!("Saved configuration to: {:?}", config_path);
        Ok(())
    }

    /// Get the path to the configuration file
    pub fn get_config_path() -> Result<PathBuf> {
        let project_dirs = ProjectDirs::from("com", "subtitlemedia", "downloader")
            .with_context(|| "Failed to get project directories")?;

        Ok(project_dirs.config_dir().join("config.json"))
    }

    /// Directory downloads are written to
    pub fn output_directory(&self, cwd: &Path) -> PathBuf {
        match &self.download.output_directory {
            Some(dir) if dir.is_absolute() => dir.clone(),
            Some(dir) => cwd.join(dir),
            None => cwd.to_path_buf(),
        }
    }

    pub fn libraries_dir(&self, cwd: &Path) -> PathBuf {
        if self.download.libraries_dir.is_absolute() {
            self.download.libraries_dir.clone()
        } else {
            cwd.join(&self.download.libraries_dir)
        }
    }

    /// Root the tool search starts from
    pub fn search_root(&self, cwd: &Path) -> PathBuf {
        match &self.tool.search_root {
            Some(dir) if dir.is_absolute() => dir.clone(),
            Some(dir) => cwd.join(dir),
            None => cwd.to_path_buf(),
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if let Some(name) = &self.tool.executable_name {
            if name.trim().is_empty() {
                anyhow::bail!("Tool executable name must not be empty");
            }
            if name.contains(['/', '\\']) {
                anyhow::bail!("Tool executable name must be a file name, not a path: {}", name);
            }
        }

        if self.tool.internal_dir_name.trim().is_empty() {
            anyhow::bail!("Internal directory name must not be empty");
        }

        if self.startup.overview_depth > 10 {
            anyhow::bail!("Directory overview depth should not exceed 10");
        }

        let valid_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_levels.contains(&self.advanced.log_level.as_str()) {
            anyhow::bail!(
                "Invalid log level: must be 'error', 'warn', 'info', 'debug', or 'trace'"
            );
        }

        Ok(())
    }
}
