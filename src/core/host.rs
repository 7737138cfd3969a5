//! Job host: accepts submissions and keeps the UI in step with the job.
//!
//! The host never touches presentation state itself. Everything the user
//! should see is queued as a [`UiCommand`] and applied by a [`UiDispatcher`]
//! on the UI side, which may poll it from a frame loop or await it.
//!
//! At most one job runs at a time. Once a job has been accepted the trigger
//! is disabled, and it is re-enabled exactly once when the job ends, however
//! it ends.

use std::any::Any;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::core::models::{
    AppError, AppResult, DownloadMode, DownloadRequest, JobOutcome, Notification, ProgressEvent,
    RULE_WIDTH,
};
use crate::core::runner::{progress_channel, DownloadBackend};

/// A change the presentation layer should apply
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiCommand {
    AppendLine(String),
    ScrollToEnd,
    Notify(Notification),
    SetTrigger { enabled: bool, label: String },
}

/// The UI surface the dispatcher drives
pub trait Presentation {
    fn append_line(&mut self, line: &str);
    fn scroll_to_end(&mut self);
    fn notify(&mut self, notification: &Notification);
    fn set_trigger(&mut self, enabled: bool, label: &str);
}

/// Sending side of the UI queue; cheap to clone, usable from any thread
#[derive(Debug, Clone)]
pub struct UiHandle {
    sender: mpsc::UnboundedSender<UiCommand>,
}

impl UiHandle {
    pub fn send(&self, command: UiCommand) {
        if self.sender.send(command).is_err() {
            debug!("UI dispatcher is gone, dropping command");
        }
    }

    pub fn append_line(&self, line: impl Into<String>) {
        self.send(UiCommand::AppendLine(line.into()));
    }

    pub fn scroll_to_end(&self) {
        self.send(UiCommand::ScrollToEnd);
    }

    pub fn notify(&self, notification: Notification) {
        self.send(UiCommand::Notify(notification));
    }

    pub fn set_trigger(&self, enabled: bool, label: &str) {
        self.send(UiCommand::SetTrigger {
            enabled,
            label: label.to_string(),
        });
    }
}

/// Receiving side of the UI queue, owned by the UI thread
#[derive(Debug)]
pub struct UiDispatcher {
    receiver: mpsc::UnboundedReceiver<UiCommand>,
}

impl UiDispatcher {
    /// Apply everything queued so far without waiting; returns how many
    pub fn drain_pending(&mut self, presentation: &mut dyn Presentation) -> usize {
        let mut applied = 0;
        while let Ok(command) = self.receiver.try_recv() {
            Self::apply(command, presentation);
            applied += 1;
        }
        applied
    }

    /// Wait for the next command; `None` once every handle is dropped
    pub async fn next(&mut self) -> Option<UiCommand> {
        self.receiver.recv().await
    }

    pub fn apply(command: UiCommand, presentation: &mut dyn Presentation) {
        match command {
            UiCommand::AppendLine(line) => presentation.append_line(&line),
            UiCommand::ScrollToEnd => presentation.scroll_to_end(),
            UiCommand::Notify(notification) => presentation.notify(&notification),
            UiCommand::SetTrigger { enabled, label } => presentation.set_trigger(enabled, &label),
        }
    }
}

pub fn ui_channel() -> (UiHandle, UiDispatcher) {
    let (sender, receiver) = mpsc::unbounded_channel();
    (UiHandle { sender }, UiDispatcher { receiver })
}

/// Result of asking the host to start a job
#[derive(Debug)]
pub enum Submission {
    Started(JobHandle),
    Rejected(AppError),
}

impl Submission {
    pub fn is_started(&self) -> bool {
        matches!(self, Self::Started(_))
    }
}

/// Everything known about a finished job
#[derive(Debug, Clone)]
pub struct JobReport {
    pub id: Uuid,
    pub url: String,
    pub mode: DownloadMode,
    pub outcome: JobOutcome,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct JobHandle {
    id: Uuid,
    join: JoinHandle<JobReport>,
}

impl JobHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Wait for the job and its UI updates to complete
    pub async fn wait(self) -> AppResult<JobReport> {
        self.join
            .await
            .map_err(|e| AppError::Unexpected(format!("job {} did not complete: {}", self.id, e)))
    }
}

/// Re-enables the trigger when dropped, which happens exactly once per job
struct TriggerRelease {
    ui: UiHandle,
    busy: Arc<AtomicBool>,
    mode: DownloadMode,
}

impl Drop for TriggerRelease {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::SeqCst);
        self.ui.set_trigger(true, self.mode.idle_label());
    }
}

pub struct JobHost {
    backend: Arc<dyn DownloadBackend>,
    ui: UiHandle,
    runtime: Handle,
    output_dir: PathBuf,
    busy: Arc<AtomicBool>,
}

impl JobHost {
    pub fn new(
        backend: Arc<dyn DownloadBackend>,
        ui: UiHandle,
        runtime: Handle,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            backend,
            ui,
            runtime,
            output_dir: output_dir.into(),
            busy: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    /// Validate the URL and start a job on the background runtime.
    ///
    /// A rejected submission produces exactly one warning notification and
    /// leaves the trigger untouched.
    pub fn submit(&self, url: &str, mode: DownloadMode) -> Submission {
        let request = match DownloadRequest::new(url, mode) {
            Ok(request) => request,
            Err(e) => {
                warn!("Rejected submission: {}", e);
                self.ui
                    .notify(Notification::warning("No URL", "Please enter a video URL"));
                return Submission::Rejected(e);
            }
        };

        if self
            .busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            let message = "A download is already running. Please wait for it to finish.";
            warn!("Rejected submission for {}: job already running", request.url());
            self.ui
                .notify(Notification::warning("Download in progress", message));
            return Submission::Rejected(AppError::Busy(message.to_string()));
        }

        self.ui.set_trigger(false, mode.busy_label());
        let release = TriggerRelease {
            ui: self.ui.clone(),
            busy: self.busy.clone(),
            mode,
        };

        let id = Uuid::new_v4();
        info!("Starting job {} ({}) for {}", id, mode, request.url());

        let join = self.runtime.spawn(run_job(
            id,
            self.backend.clone(),
            self.ui.clone(),
            request,
            self.output_dir.clone(),
            release,
        ));

        Submission::Started(JobHandle { id, join })
    }
}

#[instrument(skip_all, fields(job = %id, mode = %request.mode()))]
async fn run_job(
    id: Uuid,
    backend: Arc<dyn DownloadBackend>,
    ui: UiHandle,
    request: DownloadRequest,
    output_dir: PathBuf,
    release: TriggerRelease,
) -> JobReport {
    let mode = request.mode();
    let started_at = Utc::now();

    ui.append_line(mode.start_banner(request.url()));
    ui.append_line(format!("Download directory: {}", output_dir.display()));
    ui.append_line("-".repeat(RULE_WIDTH));
    ui.scroll_to_end();

    let relay = |event: ProgressEvent| {
        ui.append_line(event.to_string());
        ui.scroll_to_end();
    };

    let (sink, mut events) = progress_channel();
    let mut worker = {
        let backend = backend.clone();
        let request = request.clone();
        tokio::spawn(async move { backend.run(&request, sink).await })
    };

    // relay progress while the backend runs; a panic in the backend only
    // ends its own task
    let joined = loop {
        tokio::select! {
            biased;
            Some(event) = events.recv() => relay(event),
            result = &mut worker => break result,
        }
    };
    while let Ok(event) = events.try_recv() {
        relay(event);
    }

    let outcome = match joined {
        Ok(outcome) => outcome,
        Err(e) => unexpected_outcome(e),
    };

    match &outcome {
        JobOutcome::Success { summary } => {
            info!("Job finished: {}", summary);
            ui.append_line("=".repeat(RULE_WIDTH));
            ui.append_line(mode.success_message());
            ui.append_line("=".repeat(RULE_WIDTH));
        }
        JobOutcome::Failure { reason, exit_code } => {
            error!("Job failed (exit code {:?}): {}", exit_code, reason);
            ui.append_line("");
            ui.append_line(outcome.message(mode));
        }
    }
    ui.scroll_to_end();
    ui.notify(outcome.notification(mode));
    drop(release);

    JobReport {
        id,
        url: request.url().to_string(),
        mode,
        outcome,
        started_at,
        finished_at: Utc::now(),
    }
}

fn unexpected_outcome(err: JoinError) -> JobOutcome {
    if err.is_panic() {
        let message = panic_message(err.into_panic());
        error!("Download backend panicked: {}", message);
        JobOutcome::failure(message, None)
    } else {
        error!("Download task was cancelled: {}", err);
        JobOutcome::failure("the download task was cancelled", None)
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
