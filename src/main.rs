use clap::Parser;
use std::process::ExitCode;
use tracing::{info, warn};

use subtitle_media_downloader::commands::{
    bootstrap, run_console, run_once, Cli, ConsolePresentation, Startup, StartupFailure,
};
use subtitle_media_downloader::core::models::Notification;
use subtitle_media_downloader::utils::logging::init_tracing;
use subtitle_media_downloader::{AppConfig, NAME, VERSION};

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // logging depends on the configured level, so load first and report later
    let loaded = match cli.config.as_deref() {
        Some(path) => AppConfig::load_from(path),
        None => AppConfig::load(),
    };
    let level = loaded
        .as_ref()
        .map(|config| config.advanced.log_level.clone())
        .unwrap_or_else(|_| "info".to_string());
    init_tracing(&level);
    info!("🚀 Starting {} v{}", NAME, VERSION);

    let config = loaded.unwrap_or_else(|err| {
        warn!("Failed to load configuration: {:#}. Using defaults", err);
        AppConfig::default()
    });

    let mut app = match bootstrap(&cli, config).await {
        Ok(Startup::Ready(app)) => app,
        Ok(Startup::Relaunched) => return ExitCode::SUCCESS,
        Err(failure) => return report_fatal(failure),
    };

    let mut presentation = ConsolePresentation::new(std::io::stdout());

    if let Some(url) = cli.url.as_deref() {
        app.dispatcher.drain_pending(&mut presentation);
        return if run_once(&mut app, url, &mut presentation).await {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        };
    }

    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    match run_console(&mut app, stdin, &mut presentation).await {
        Ok(()) => {
            info!("Console closed");
            ExitCode::SUCCESS
        }
        Err(e) => {
            warn!("Console stopped: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn report_fatal(failure: StartupFailure) -> ExitCode {
    let notification = failure.notification();
    eprintln!("{}: {}", notification.title, notification.message);
    show_error_dialog(&notification);
    failure.exit_code()
}

#[cfg(windows)]
fn show_error_dialog(notification: &Notification) {
    use std::ffi::OsStr;
    use std::iter::once;
    use std::os::windows::ffi::OsStrExt;
    use std::ptr;
    use winapi::um::winuser::{MessageBoxW, MB_ICONERROR, MB_OK};

    let wide = |text: &str| -> Vec<u16> { OsStr::new(text).encode_wide().chain(once(0)).collect() };
    let title = wide(&notification.title);
    let message = wide(&notification.message);

    unsafe {
        MessageBoxW(ptr::null_mut(), message.as_ptr(), title.as_ptr(), MB_OK | MB_ICONERROR);
    }
}

#[cfg(not(windows))]
fn show_error_dialog(_notification: &Notification) {}
