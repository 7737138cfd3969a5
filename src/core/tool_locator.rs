//! Finding the yt-dlp executable
//!
//! Search order, first match wins:
//! 1. the bundle directory (when the application ships one) and its
//!    `_internal` subfolder
//! 2. the search root and its `_internal` subfolder
//! 3. a recursive walk of the search root, matching the file name without
//!    regard to case
//!
//! The walk visits files before subdirectories at every level and sorts by
//! name, so an unchanged tree always yields the same path.

use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::core::config::ToolSettings;
use crate::core::models::{AppError, AppResult};

/// Name of the folder bundlers put resources in
pub const INTERNAL_DIR: &str = "_internal";

/// File name of the yt-dlp executable on this platform
pub fn default_tool_name() -> &'static str {
    if cfg!(windows) {
        "yt-dlp.exe"
    } else {
        "yt-dlp"
    }
}

#[derive(Debug, Clone)]
pub struct ToolLocator {
    tool_name: String,
    bundle_dir: Option<PathBuf>,
    internal_dir: String,
    recursive_scan: bool,
}

impl Default for ToolLocator {
    fn default() -> Self {
        Self::new(default_tool_name())
    }
}

impl ToolLocator {
    pub fn new(tool_name: impl Into<String>) -> Self {
        Self {
            tool_name: tool_name.into(),
            bundle_dir: None,
            internal_dir: INTERNAL_DIR.to_string(),
            recursive_scan: true,
        }
    }

    pub fn with_bundle_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.bundle_dir = Some(dir.into());
        self
    }

    pub fn with_internal_dir(mut self, name: impl Into<String>) -> Self {
        self.internal_dir = name.into();
        self
    }

    pub fn with_recursive_scan(mut self, enabled: bool) -> Self {
        self.recursive_scan = enabled;
        self
    }

    /// Build a locator from the `tool` configuration section
    pub fn from_config(settings: &ToolSettings) -> Self {
        let bundle_dir = settings.bundle_dir.clone().or_else(|| {
            if settings.search_executable_dir {
                executable_dir()
            } else {
                None
            }
        });

        let locator = Self::new(settings.tool_name())
            .with_internal_dir(settings.internal_dir_name.clone())
            .with_recursive_scan(settings.recursive_scan);

        match bundle_dir {
            Some(dir) => locator.with_bundle_dir(dir),
            None => locator,
        }
    }

    pub fn tool_name(&self) -> &str {
        &self.tool_name
    }

    /// Exact paths checked before any directory walk, in priority order
    pub fn candidates(&self, root: &Path) -> Vec<PathBuf> {
        let mut dirs = Vec::with_capacity(4);
        if let Some(bundle) = &self.bundle_dir {
            dirs.push(bundle.clone());
            dirs.push(bundle.join(&self.internal_dir));
        }
        dirs.push(root.to_path_buf());
        dirs.push(root.join(&self.internal_dir));

        dirs.into_iter().map(|dir| dir.join(&self.tool_name)).collect()
    }

    /// First matching executable, or `None`
    pub fn locate(&self, root: &Path) -> Option<PathBuf> {
        debug!("Searching for {} from {}", self.tool_name, root.display());

        for candidate in self.candidates(root) {
            if candidate.is_file() {
                info!("Found {} at: {}", self.tool_name, candidate.display());
                return Some(candidate);
            }
        }

        if !self.recursive_scan {
            return None;
        }

        let found = self.scan(root);
        if let Some(path) = &found {
            // any same-named file deeper in the tree is accepted as-is
            warn!(
                "Found {} by recursive search at: {}",
                self.tool_name,
                path.display()
            );
        }
        found
    }

    fn scan(&self, root: &Path) -> Option<PathBuf> {
        let walker = WalkDir::new(root)
            .min_depth(1)
            .sort_by(|a, b| {
                let a_dir = a.file_type().is_dir();
                let b_dir = b.file_type().is_dir();
                a_dir
                    .cmp(&b_dir)
                    .then_with(|| a.file_name().cmp(b.file_name()))
            })
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(err) => {
                    debug!("Skipping unreadable entry: {}", err);
                    None
                }
            });

        walker
            .filter(|entry| entry.file_type().is_file())
            .find(|entry| {
                entry
                    .file_name()
                    .to_string_lossy()
                    .eq_ignore_ascii_case(&self.tool_name)
            })
            .map(|entry| entry.into_path())
    }
}

/// A located executable; holding one means the search succeeded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolLocation {
    path: PathBuf,
}

impl ToolLocation {
    /// Locate the tool or fail with `ToolNotFound`
    pub fn resolve(locator: &ToolLocator, root: &Path) -> AppResult<Self> {
        match locator.locate(root) {
            Some(path) => Ok(Self { path }),
            None => Err(AppError::ToolNotFound {
                tool: locator.tool_name().to_string(),
                searched: root.to_path_buf(),
            }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn into_path(self) -> PathBuf {
        self.path
    }
}

fn executable_dir() -> Option<PathBuf> {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
}
