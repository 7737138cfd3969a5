//! Terminal front-end
//!
//! Reads one URL per line from standard input and prints everything the job
//! host queues for the UI. `clear` empties the screen, `exit` or `quit`
//! leaves once the running job (if any) has finished.

use std::io::Write;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{debug, info, warn};

use crate::commands::startup::App;
use crate::core::host::{JobHandle, Presentation, Submission, UiDispatcher};
use crate::core::models::{AppResult, Notification, NotificationLevel};

/// Prints display lines and notifications to a writer
pub struct ConsolePresentation<W: Write> {
    out: W,
    trigger_enabled: bool,
    trigger_label: String,
}

impl<W: Write> ConsolePresentation<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            trigger_enabled: true,
            trigger_label: String::new(),
        }
    }

    pub fn trigger_enabled(&self) -> bool {
        self.trigger_enabled
    }

    pub fn trigger_label(&self) -> &str {
        &self.trigger_label
    }

    pub fn clear(&mut self) {
        // ANSI: erase screen, cursor home
        self.write_line("\x1b[2J\x1b[H");
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn write_line(&mut self, line: &str) {
        if let Err(e) = writeln!(self.out, "{}", line) {
            debug!("Console write failed: {}", e);
        }
    }
}

impl<W: Write> Presentation for ConsolePresentation<W> {
    fn append_line(&mut self, line: &str) {
        self.write_line(line);
    }

    fn scroll_to_end(&mut self) {
        let _ = self.out.flush();
    }

    fn notify(&mut self, notification: &Notification) {
        let tag = match notification.level {
            NotificationLevel::Info => "INFO",
            NotificationLevel::Warning => "WARNING",
            NotificationLevel::Error => "ERROR",
        };
        self.write_line(&format!("[{}] {}: {}", tag, notification.title, notification.message));
        let _ = self.out.flush();
    }

    fn set_trigger(&mut self, enabled: bool, label: &str) {
        self.trigger_enabled = enabled;
        self.trigger_label = label.to_string();
        if enabled {
            self.write_line(&format!("[{}] Enter a URL:", label));
        } else {
            self.write_line(&format!("[{}]", label));
        }
        let _ = self.out.flush();
    }
}

enum ConsoleInput {
    Url(String),
    Clear,
    Quit,
}

fn parse_input(line: &str) -> ConsoleInput {
    match line.trim() {
        "clear" | "cls" => ConsoleInput::Clear,
        "exit" | "quit" => ConsoleInput::Quit,
        other => ConsoleInput::Url(other.to_string()),
    }
}

/// Run the interactive loop until input ends or the user quits
pub async fn run_console<R, W>(
    app: &mut App,
    input: R,
    presentation: &mut ConsolePresentation<W>,
) -> AppResult<()>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let mut lines = input.lines();
    let mut current: Option<JobHandle> = None;

    loop {
        app.dispatcher.drain_pending(presentation);

        tokio::select! {
            command = app.dispatcher.next() => match command {
                Some(command) => UiDispatcher::apply(command, presentation),
                None => break,
            },
            line = lines.next_line() => match line? {
                None => {
                    debug!("Console input closed");
                    break;
                }
                Some(text) => match parse_input(&text) {
                    ConsoleInput::Quit => break,
                    ConsoleInput::Clear => presentation.clear(),
                    ConsoleInput::Url(url) => {
                        if let Submission::Started(job) = app.host.submit(&url, app.mode) {
                            current = Some(job);
                        }
                    }
                },
            },
        }
    }

    finish_current(app, current, presentation).await;
    Ok(())
}

/// Download one URL and report it, without reading input
pub async fn run_once<W: Write>(
    app: &mut App,
    url: &str,
    presentation: &mut ConsolePresentation<W>,
) -> bool {
    let submission = app.host.submit(url, app.mode);
    let job = match submission {
        Submission::Started(job) => job,
        Submission::Rejected(e) => {
            warn!("Nothing to download: {}", e);
            app.dispatcher.drain_pending(presentation);
            return false;
        }
    };

    let waiting = job.wait();
    tokio::pin!(waiting);

    // keep printing progress while the job runs
    let success = loop {
        app.dispatcher.drain_pending(presentation);
        tokio::select! {
            Some(command) = app.dispatcher.next() => UiDispatcher::apply(command, presentation),
            report = &mut waiting => break match report {
                Ok(report) => report.outcome.is_success(),
                Err(e) => {
                    warn!("{}", e);
                    false
                }
            },
        }
    };
    app.dispatcher.drain_pending(presentation);
    success
}

async fn finish_current<W: Write>(
    app: &mut App,
    current: Option<JobHandle>,
    presentation: &mut ConsolePresentation<W>,
) {
    if let Some(job) = current.filter(|job| !job.is_finished()) {
        info!("Waiting for the current download to finish...");
        presentation.append_line("Waiting for the current download to finish...");
        if let Err(e) = job.wait().await {
            warn!("{}", e);
        }
    }
    app.dispatcher.drain_pending(presentation);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::AppConfig;
    use crate::core::host::{ui_channel, JobHost};
    use crate::core::models::{DownloadMode, DownloadRequest, JobOutcome, ProgressEvent};
    use crate::core::runner::{emit, DownloadBackend, ProgressSender};
    use crate::core::runtime::JobRuntime;
    use async_trait::async_trait;
    use std::io;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::Notify;

    struct EchoBackend;

    #[async_trait]
    impl DownloadBackend for EchoBackend {
        fn name(&self) -> &'static str {
            "echo"
        }

        fn describe(&self) -> String {
            "YT-DLP: echo".to_string()
        }

        async fn run(&self, request: &DownloadRequest, sink: ProgressSender) -> JobOutcome {
            emit(&sink, ProgressEvent::RawLine { text: format!("[echo] {}", request.url()) });
            if request.url().contains("fail") {
                JobOutcome::failure("ERROR: nope", Some(2))
            } else {
                JobOutcome::success(request.url())
            }
        }
    }

    /// Prints one line, then holds the job until released
    struct GatedBackend {
        gate: Arc<Notify>,
    }

    #[async_trait]
    impl DownloadBackend for GatedBackend {
        fn name(&self) -> &'static str {
            "gated"
        }

        fn describe(&self) -> String {
            "YT-DLP: gated".to_string()
        }

        async fn run(&self, _request: &DownloadRequest, sink: ProgressSender) -> JobOutcome {
            emit(&sink, ProgressEvent::RawLine { text: "[download]  42.0%".to_string() });
            self.gate.notified().await;
            JobOutcome::success("done")
        }
    }

    /// Writer that releases the gate once a marker has been printed
    struct ReleaseOnMarker {
        written: Vec<u8>,
        marker: &'static str,
        gate: Arc<Notify>,
    }

    impl Write for ReleaseOnMarker {
        fn write(&mut self, data: &[u8]) -> io::Result<usize> {
            self.written.extend_from_slice(data);
            if String::from_utf8_lossy(&self.written).contains(self.marker) {
                self.gate.notify_one();
            }
            Ok(data.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn app(mode: DownloadMode) -> App {
        app_with(Arc::new(EchoBackend), mode)
    }

    fn app_with(backend: Arc<dyn DownloadBackend>, mode: DownloadMode) -> App {
        let runtime = JobRuntime::current_or_dedicated().unwrap();
        let (ui, dispatcher) = ui_channel();
        let host = JobHost::new(backend, ui, runtime.handle(), "/downloads");
        App {
            config: AppConfig::default(),
            mode,
            working_dir: "/downloads".into(),
            host,
            dispatcher,
            runtime,
        }
    }

    fn output(presentation: ConsolePresentation<Vec<u8>>) -> String {
        String::from_utf8(presentation.into_inner()).unwrap()
    }

    #[test]
    fn test_parse_input_commands() {
        assert!(matches!(parse_input(" quit "), ConsoleInput::Quit));
        assert!(matches!(parse_input("exit"), ConsoleInput::Quit));
        assert!(matches!(parse_input("clear"), ConsoleInput::Clear));
        assert!(matches!(parse_input("https://x"), ConsoleInput::Url(u) if u == "https://x"));
    }

    #[test]
    fn test_notification_format() {
        let mut presentation = ConsolePresentation::new(Vec::new());
        presentation.notify(&Notification::warning("No URL", "Please enter a video URL"));
        presentation.set_trigger(false, "Downloading...");
        assert!(!presentation.trigger_enabled());
        assert_eq!(presentation.trigger_label(), "Downloading...");

        assert_eq!(
            output(presentation),
            "[WARNING] No URL: Please enter a video URL\n[Downloading...]\n"
        );
    }

    #[tokio::test]
    async fn test_console_session_waits_for_job_before_quitting() {
        let mut app = app(DownloadMode::Video);
        let mut presentation = ConsolePresentation::new(Vec::new());
        let input: &[u8] = b"   \nhttps://youtu.be/abc\nquit\n";

        run_console(&mut app, input, &mut presentation).await.unwrap();

        let text = output(presentation);
        assert!(text.contains("[WARNING] No URL: Please enter a video URL"));
        assert!(text.contains("Starting download for: https://youtu.be/abc"));
        assert!(text.contains("[echo] https://youtu.be/abc"));
        assert!(text.contains("[INFO] Success: Download completed successfully!"));
        assert!(text.trim_end().ends_with("[Download Video] Enter a URL:"));
    }

    #[tokio::test]
    async fn test_run_once_reports_failure() {
        let mut app = app(DownloadMode::Audio);
        let mut presentation = ConsolePresentation::new(Vec::new());

        assert!(!run_once(&mut app, "https://fail.example", &mut presentation).await);
        let text = output(presentation);
        assert!(text.contains("[ERROR] Error: Download failed with error code: 2"));
        assert!(text.contains("[Extract MP3] Enter a URL:"));
    }

    #[tokio::test]
    async fn test_run_once_prints_progress_while_job_runs() {
        let gate = Arc::new(Notify::new());
        let mut app = app_with(Arc::new(GatedBackend { gate: gate.clone() }), DownloadMode::Video);
        let mut presentation = ConsolePresentation::new(ReleaseOnMarker {
            written: Vec::new(),
            marker: "[download]  42.0%",
            gate,
        });

        // the job only ends after its progress line has been printed
        let finished = tokio::time::timeout(
            Duration::from_secs(5),
            run_once(&mut app, "https://youtu.be/abc", &mut presentation),
        )
        .await;
        assert!(matches!(finished, Ok(true)));

        let text = String::from_utf8(presentation.into_inner().written).unwrap();
        let progress = text.find("[download]  42.0%").unwrap();
        let success = text.find("[INFO] Success").unwrap();
        assert!(progress < success);
    }

    #[tokio::test]
    async fn test_run_once_rejects_blank_url() {
        let mut app = app(DownloadMode::Video);
        let mut presentation = ConsolePresentation::new(Vec::new());

        assert!(!run_once(&mut app, "  ", &mut presentation).await);
        assert!(output(presentation).contains("[WARNING] No URL"));
    }
}
