//! Integration tests for JobHost
//!
//! Drives the host with scripted backends and checks what reaches the UI:
//! - trigger disabled on accept and re-enabled exactly once
//! - exactly one notification per outcome or rejection
//! - progress relayed in order before the end banner
//! - a panicking backend is contained

#[cfg(test)]
mod tests {
    use super::super::host::*;
    use super::super::models::*;
    use super::super::runner::{emit, DownloadBackend, ProgressSender};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::runtime::Handle;
    use tokio::sync::Notify;

    enum Script {
        Succeed(Vec<&'static str>),
        ExitWith(i32),
        Raise(&'static str),
        Panic,
        WaitFor(Arc<Notify>),
    }

    struct ScriptedBackend {
        script: Script,
        runs: AtomicUsize,
    }

    impl ScriptedBackend {
        fn new(script: Script) -> Arc<Self> {
            Arc::new(Self {
                script,
                runs: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl DownloadBackend for ScriptedBackend {
        fn name(&self) -> &'static str {
            "scripted"
        }

        fn describe(&self) -> String {
            "YT-DLP: scripted".to_string()
        }

        async fn run(&self, request: &DownloadRequest, sink: ProgressSender) -> JobOutcome {
            self.runs.fetch_add(1, Ordering::SeqCst);
            match &self.script {
                Script::Succeed(lines) => {
                    for line in lines {
                        emit(&sink, ProgressEvent::RawLine { text: line.to_string() });
                    }
                    JobOutcome::success(request.url())
                }
                Script::ExitWith(code) => {
                    emit(&sink, ProgressEvent::RawLine { text: "ERROR: unavailable".into() });
                    JobOutcome::failure("ERROR: unavailable", Some(*code))
                }
                Script::Raise(message) => JobOutcome::failure(*message, None),
                Script::Panic => panic!("backend exploded"),
                Script::WaitFor(gate) => {
                    gate.notified().await;
                    JobOutcome::success(request.url())
                }
            }
        }
    }

    #[derive(Default)]
    struct Recorder {
        lines: Vec<String>,
        notes: Vec<Notification>,
        triggers: Vec<(bool, String)>,
    }

    impl Presentation for Recorder {
        fn append_line(&mut self, line: &str) {
            self.lines.push(line.to_string());
        }
        fn scroll_to_end(&mut self) {}
        fn notify(&mut self, notification: &Notification) {
            self.notes.push(notification.clone());
        }
        fn set_trigger(&mut self, enabled: bool, label: &str) {
            self.triggers.push((enabled, label.to_string()));
        }
    }

    fn host_with(backend: Arc<ScriptedBackend>) -> (JobHost, UiDispatcher) {
        let (ui, dispatcher) = ui_channel();
        let host = JobHost::new(backend, ui, Handle::current(), "/downloads");
        (host, dispatcher)
    }

    async fn run_to_end(host: &JobHost, url: &str, mode: DownloadMode) -> JobReport {
        match host.submit(url, mode) {
            Submission::Started(job) => job.wait().await.unwrap(),
            Submission::Rejected(e) => panic!("unexpected rejection: {}", e),
        }
    }

    fn toggled_once(recorder: &Recorder, mode: DownloadMode) -> bool {
        recorder.triggers
            == vec![
                (false, mode.busy_label().to_string()),
                (true, mode.idle_label().to_string()),
            ]
    }

    #[tokio::test]
    async fn test_success_relays_lines_then_banner() {
        let backend = ScriptedBackend::new(Script::Succeed(vec!["[download]  10.0%", "[download] 100%"]));
        let (host, mut dispatcher) = host_with(backend.clone());

        let report = run_to_end(&host, "  https://youtu.be/abc  ", DownloadMode::Video).await;
        assert!(report.outcome.is_success());
        assert_eq!(report.url, "https://youtu.be/abc");
        assert!(report.finished_at >= report.started_at);
        assert!(!host.is_busy());

        let mut recorder = Recorder::default();
        dispatcher.drain_pending(&mut recorder);

        assert!(toggled_once(&recorder, DownloadMode::Video));
        assert_eq!(
            recorder.lines,
            vec![
                "Starting download for: https://youtu.be/abc".to_string(),
                "Download directory: /downloads".to_string(),
                "-".repeat(RULE_WIDTH),
                "[download]  10.0%".to_string(),
                "[download] 100%".to_string(),
                "=".repeat(RULE_WIDTH),
                "Download completed successfully!".to_string(),
                "=".repeat(RULE_WIDTH),
            ]
        );
        assert_eq!(recorder.notes, vec![Notification::info("Success", "Download completed successfully!")]);
    }

    #[tokio::test]
    async fn test_nonzero_exit_notifies_once_and_releases_trigger() {
        let (host, mut dispatcher) = host_with(ScriptedBackend::new(Script::ExitWith(1)));

        let report = run_to_end(&host, "https://youtu.be/abc", DownloadMode::Audio).await;
        assert_eq!(report.outcome.exit_code(), Some(1));

        let mut recorder = Recorder::default();
        dispatcher.drain_pending(&mut recorder);

        assert!(toggled_once(&recorder, DownloadMode::Audio));
        assert_eq!(recorder.notes.len(), 1);
        assert_eq!(recorder.notes[0].title, "Error");
        assert_eq!(recorder.notes[0].message, "Download failed with error code: 1");
        assert_eq!(recorder.lines.last().unwrap(), "Download failed with error code: 1");
    }

    #[tokio::test]
    async fn test_library_error_uses_download_error_title() {
        let (host, mut dispatcher) = host_with(ScriptedBackend::new(Script::Raise("Unsupported URL")));

        run_to_end(&host, "not-a-url", DownloadMode::Video).await;

        let mut recorder = Recorder::default();
        dispatcher.drain_pending(&mut recorder);
        assert_eq!(
            recorder.notes,
            vec![Notification::error("Download Error", "Error during download: Unsupported URL")]
        );
        assert!(toggled_once(&recorder, DownloadMode::Video));
    }

    #[tokio::test]
    async fn test_panicking_backend_still_releases_trigger() {
        let (host, mut dispatcher) = host_with(ScriptedBackend::new(Script::Panic));

        let report = run_to_end(&host, "https://youtu.be/abc", DownloadMode::Video).await;
        assert_eq!(report.outcome, JobOutcome::failure("backend exploded", None));
        assert!(!host.is_busy());

        let mut recorder = Recorder::default();
        dispatcher.drain_pending(&mut recorder);
        assert!(toggled_once(&recorder, DownloadMode::Video));
        assert_eq!(recorder.notes.len(), 1);
        assert_eq!(recorder.notes[0].level, NotificationLevel::Error);
    }

    #[tokio::test]
    async fn test_blank_url_starts_nothing() {
        let backend = ScriptedBackend::new(Script::Succeed(vec![]));
        let (host, mut dispatcher) = host_with(backend.clone());

        for url in ["", "   ", "\t"] {
            let submission = host.submit(url, DownloadMode::Video);
            assert!(matches!(submission, Submission::Rejected(AppError::Validation(_))));
        }
        tokio::task::yield_now().await;

        let mut recorder = Recorder::default();
        dispatcher.drain_pending(&mut recorder);

        assert_eq!(backend.runs.load(Ordering::SeqCst), 0);
        assert!(recorder.triggers.is_empty());
        assert!(recorder.lines.is_empty());
        assert_eq!(recorder.notes.len(), 3);
        assert!(recorder
            .notes
            .iter()
            .all(|n| n.title == "No URL" && n.message == "Please enter a video URL"));
    }

    #[tokio::test]
    async fn test_second_submission_rejected_while_busy() {
        let gate = Arc::new(Notify::new());
        let backend = ScriptedBackend::new(Script::WaitFor(gate.clone()));
        let (host, mut dispatcher) = host_with(backend.clone());

        let first = host.submit("https://youtu.be/one", DownloadMode::Video);
        assert!(first.is_started());
        assert!(host.is_busy());

        let second = host.submit("https://youtu.be/two", DownloadMode::Video);
        assert!(matches!(second, Submission::Rejected(AppError::Busy(_))));

        gate.notify_one();
        match first {
            Submission::Started(job) => assert!(job.wait().await.unwrap().outcome.is_success()),
            Submission::Rejected(e) => panic!("unexpected rejection: {}", e),
        }
        assert!(!host.is_busy());
        assert_eq!(backend.runs.load(Ordering::SeqCst), 1);

        let mut recorder = Recorder::default();
        dispatcher.drain_pending(&mut recorder);
        assert!(toggled_once(&recorder, DownloadMode::Video));
        let titles: Vec<&str> = recorder.notes.iter().map(|n| n.title.as_str()).collect();
        assert_eq!(titles, vec!["Download in progress", "Success"]);

        // the host accepts work again once the job is done
        assert!(host.submit("https://youtu.be/three", DownloadMode::Video).is_started());
    }
}
