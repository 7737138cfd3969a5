//! Application startup
//!
//! Order matters: the privilege check runs first because a relaunch makes
//! everything else pointless in this process. Then the downloader is found
//! (or the library probed), the job runtime is started and the ready banner
//! is queued for the UI.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};

use crate::commands::cli::Cli;
use crate::core::backends::{linked_extractor, LibraryBackend, SubprocessBackend};
use crate::core::config::{AppConfig, BackendKind};
use crate::core::host::{ui_channel, JobHost, UiDispatcher, UiHandle};
use crate::core::models::{AppError, AppResult, DownloadMode, Notification, RULE_WIDTH};
use crate::core::privilege::{ElevationDecision, ElevationGate, PrivilegeControl, SystemPrivileges};
use crate::core::runner::DownloadBackend;
use crate::core::runtime::JobRuntime;
use crate::core::tool_locator::{ToolLocation, ToolLocator};
use crate::utils::file_utils::{ensure_dir_exists, log_directory_overview};

/// A running application, ready to accept URLs
pub struct App {
    pub config: AppConfig,
    pub mode: DownloadMode,
    pub working_dir: PathBuf,
    pub host: JobHost,
    pub dispatcher: UiDispatcher,
    /// Keeps the job runtime alive for as long as the app
    pub runtime: JobRuntime,
}

pub enum Startup {
    Ready(App),
    /// An elevated copy took over; exit quietly
    Relaunched,
}

/// A fatal startup error, shown once before exiting with code 1
#[derive(Debug)]
pub struct StartupFailure {
    pub error: AppError,
}

impl StartupFailure {
    pub fn notification(&self) -> Notification {
        self.error.fatal_notification()
    }

    /// Process status for a failed startup
    pub fn exit_status(&self) -> u8 {
        1
    }

    pub fn exit_code(&self) -> ExitCode {
        ExitCode::from(self.exit_status())
    }
}

impl From<AppError> for StartupFailure {
    fn from(error: AppError) -> Self {
        error!("Startup failed: {}", error);
        Self { error }
    }
}

/// Start the application for this process
pub async fn bootstrap(cli: &Cli, config: AppConfig) -> Result<Startup, StartupFailure> {
    let args: Vec<OsString> = std::env::args_os().skip(1).collect();
    let cwd = std::env::current_dir().map_err(AppError::from)?;
    bootstrap_with(cli, config, SystemPrivileges, &args, &cwd).await
}

pub async fn bootstrap_with<P: PrivilegeControl>(
    cli: &Cli,
    mut config: AppConfig,
    privileges: P,
    args: &[OsString],
    cwd: &Path,
) -> Result<Startup, StartupFailure> {
    cli.apply_overrides(&mut config);

    let gate = ElevationGate::new(privileges, config.startup.require_elevation);
    if gate.check(args)? == ElevationDecision::Relaunched {
        return Ok(Startup::Relaunched);
    }

    if config.startup.log_directory_overview {
        log_directory_overview(
            cwd,
            config.startup.overview_depth,
            config.startup.overview_max_files,
        );
    }

    let output_dir = config.output_directory(cwd);
    ensure_dir_exists(&output_dir).map_err(|e| AppError::Config(format!("{:#}", e)))?;

    let backend = build_backend(&config, cwd, &output_dir).await?;
    info!("Using {} backend", backend.name());

    let runtime = JobRuntime::dedicated()?;
    let (ui, dispatcher) = ui_channel();
    let mode = config.download.default_mode;

    queue_ready_banner(&ui, mode, cwd, &backend.describe());
    ui.set_trigger(true, mode.idle_label());

    let host = JobHost::new(backend, ui, runtime.handle(), output_dir);

    Ok(Startup::Ready(App {
        config,
        mode,
        working_dir: cwd.to_path_buf(),
        host,
        dispatcher,
        runtime,
    }))
}

async fn build_backend(
    config: &AppConfig,
    cwd: &Path,
    output_dir: &Path,
) -> AppResult<Arc<dyn DownloadBackend>> {
    match config.download.backend {
        BackendKind::Subprocess => {
            let locator = ToolLocator::from_config(&config.tool);
            let location = ToolLocation::resolve(&locator, &config.search_root(cwd))?;
            Ok(Arc::new(SubprocessBackend::new(
                location.into_path(),
                output_dir,
            )))
        }
        BackendKind::Library => {
            let extractor = linked_extractor(&config.libraries_dir(cwd))?;
            let backend = LibraryBackend::connect(extractor, output_dir).await?;
            Ok(Arc::new(backend))
        }
    }
}

fn queue_ready_banner(ui: &UiHandle, mode: DownloadMode, cwd: &Path, backend: &str) {
    ui.append_line(format!("{} Ready", mode.app_title()));
    ui.append_line("=".repeat(RULE_WIDTH));
    ui.append_line(format!("Working Directory: {}", cwd.display()));
    ui.append_line(backend);
    ui.append_line("=".repeat(RULE_WIDTH));
    ui.append_line(match mode {
        DownloadMode::Video => "Enter a video URL and press Enter to download.",
        DownloadMode::Audio => "Enter a video URL and press Enter to extract MP3 with English subtitles.",
    });
    ui.scroll_to_end();
}
