//! Runs jobs by spawning the yt-dlp executable
//!
//! Standard output and standard error are merged and forwarded line by line
//! while the process runs. Output is decoded lossily so a stray byte in a
//! title cannot break the stream, and carriage-return progress updates are
//! split into separate lines.

use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::stream::{self, BoxStream};
use futures::{FutureExt, StreamExt, TryStreamExt};
use std::io;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tracing::{debug, error, info, warn};

use crate::core::models::{DownloadRequest, JobOutcome, ProgressEvent};
use crate::core::options::DownloadOptions;
use crate::core::runner::{emit, DownloadBackend, ProgressSender};

#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

/// Everything needed to start the downloader once
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub working_dir: PathBuf,
}

impl Invocation {
    /// Shell-like rendering for logs
    pub fn command_line(&self) -> String {
        let mut parts = vec![display_arg(&self.program.to_string_lossy())];
        parts.extend(self.args.iter().map(|arg| display_arg(arg)));
        parts.join(" ")
    }
}

fn display_arg(arg: &str) -> String {
    if arg.is_empty() || arg.contains(char::is_whitespace) {
        format!("\"{}\"", arg)
    } else {
        arg.to_string()
    }
}

/// A started process: its merged output lines and its eventual exit code
pub struct LaunchedProcess {
    pub output: BoxStream<'static, io::Result<String>>,
    /// `None` when the process ended without an exit code (killed by a signal)
    pub exit: BoxFuture<'static, io::Result<Option<i32>>>,
}

pub trait ProcessLauncher: Send + Sync {
    fn launch(&self, invocation: &Invocation) -> io::Result<LaunchedProcess>;
}

/// Spawns real processes through `tokio::process`.
///
/// Standard output and standard error arrive on two pipes and are
/// interleaved as lines become ready. Order within each stream is kept, but
/// a progress line and an error line written at nearly the same moment may
/// appear in either order.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioProcessLauncher;

impl ProcessLauncher for TokioProcessLauncher {
    fn launch(&self, invocation: &Invocation) -> io::Result<LaunchedProcess> {
        let mut cmd = Command::new(&invocation.program);
        cmd.args(&invocation.args)
            .current_dir(&invocation.working_dir)
            .env("PYTHONIOENCODING", "utf-8")
            .env("PYTHONUNBUFFERED", "1")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        #[cfg(windows)]
        cmd.creation_flags(CREATE_NO_WINDOW);

        let mut child = cmd.spawn()?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "missing stdout pipe"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "missing stderr pipe"))?;

        let output = stream::select(line_stream(stdout), line_stream(stderr)).boxed();
        let exit = async move {
            let status = child.wait().await?;
            Ok::<_, io::Error>(status.code())
        }
        .boxed();

        Ok(LaunchedProcess { output, exit })
    }
}

fn line_stream<R>(reader: R) -> BoxStream<'static, io::Result<String>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    stream::try_unfold(BufReader::new(reader), read_chunk::<R>)
        .map_ok(|lines| stream::iter(lines.into_iter().map(Ok::<String, io::Error>)))
        .try_flatten()
        .boxed()
}

async fn read_chunk<R>(mut reader: BufReader<R>) -> io::Result<Option<(Vec<String>, BufReader<R>)>>
where
    R: AsyncRead + Unpin,
{
    let mut buf = Vec::new();
    if reader.read_until(b'\n', &mut buf).await? == 0 {
        return Ok(None);
    }
    Ok(Some((split_output_lines(&buf), reader)))
}

/// Split raw output on `\r` and `\n`, dropping empty pieces
pub fn split_output_lines(bytes: &[u8]) -> Vec<String> {
    String::from_utf8_lossy(bytes)
        .split(['\r', '\n'])
        .filter(|line| !line.trim().is_empty())
        .map(str::to_string)
        .collect()
}

pub(crate) fn is_error_line(line: &str) -> bool {
    line.trim_start().starts_with("ERROR:")
}

pub struct SubprocessBackend {
    tool: PathBuf,
    output_dir: PathBuf,
    launcher: Arc<dyn ProcessLauncher>,
}

impl SubprocessBackend {
    pub fn new(tool: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            tool: tool.into(),
            output_dir: output_dir.into(),
            launcher: Arc::new(TokioProcessLauncher),
        }
    }

    pub fn with_launcher(mut self, launcher: impl ProcessLauncher + 'static) -> Self {
        self.launcher = Arc::new(launcher);
        self
    }

    pub fn invocation(&self, request: &DownloadRequest) -> Invocation {
        let options = DownloadOptions::for_mode(request.mode());
        Invocation {
            program: self.tool.clone(),
            args: options.to_cli_args(request.url()),
            working_dir: self.output_dir.clone(),
        }
    }
}

#[async_trait]
impl DownloadBackend for SubprocessBackend {
    fn name(&self) -> &'static str {
        "subprocess"
    }

    fn describe(&self) -> String {
        format!("YT-DLP Path: {}", self.tool.display())
    }

    async fn run(&self, request: &DownloadRequest, sink: ProgressSender) -> JobOutcome {
        let invocation = self.invocation(request);
        info!("Running command: {}", invocation.command_line());

        let LaunchedProcess { mut output, exit } = match self.launcher.launch(&invocation) {
            Ok(process) => process,
            Err(e) => {
                error!("Failed to start {}: {}", self.tool.display(), e);
                return JobOutcome::failure(
                    format!("failed to start {}: {}", self.tool.display(), e),
                    None,
                );
            }
        };

        let mut last_error: Option<String> = None;
        while let Some(line) = output.next().await {
            match line {
                Ok(text) if text.trim().is_empty() => continue,
                Ok(text) => {
                    debug!("yt-dlp: {}", text);
                    if is_error_line(&text) {
                        last_error = Some(text.trim().to_string());
                    }
                    emit(&sink, ProgressEvent::RawLine { text });
                }
                Err(e) => {
                    warn!("Stopped reading downloader output: {}", e);
                    break;
                }
            }
        }
        // close our ends of the pipes before waiting
        drop(output);

        match exit.await {
            Ok(Some(0)) => {
                info!("Download finished for {}", request.url());
                JobOutcome::success(format!("Saved to {}", self.output_dir.display()))
            }
            Ok(Some(code)) => {
                let reason = last_error
                    .unwrap_or_else(|| format!("yt-dlp exited with code {}", code));
                error!("Download failed with error code {}: {}", code, reason);
                JobOutcome::failure(reason, Some(code))
            }
            Ok(None) => {
                error!("yt-dlp terminated without an exit code");
                JobOutcome::failure("yt-dlp terminated without an exit code", None)
            }
            Err(e) => {
                error!("Failed to wait for yt-dlp: {}", e);
                JobOutcome::failure(format!("failed to wait for yt-dlp: {}", e), None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::DownloadMode;
    use crate::core::runner::progress_channel;
    use futures::channel::{mpsc, oneshot};
    use std::sync::Mutex;

    enum FakeExit {
        Code(Option<i32>),
        WaitError,
    }

    /// Replays canned output and exit status
    struct ScriptedLauncher {
        lines: Vec<&'static str>,
        exit: Mutex<Option<FakeExit>>,
        spawn_fails: bool,
        seen: Arc<Mutex<Vec<Invocation>>>,
    }

    impl ScriptedLauncher {
        fn new(lines: Vec<&'static str>, exit: FakeExit) -> Self {
            Self {
                lines,
                exit: Mutex::new(Some(exit)),
                spawn_fails: false,
                seen: Arc::new(Mutex::new(Vec::new())),
            }
        }
    }

    impl ProcessLauncher for ScriptedLauncher {
        fn launch(&self, invocation: &Invocation) -> io::Result<LaunchedProcess> {
            self.seen.lock().unwrap().push(invocation.clone());
            if self.spawn_fails {
                return Err(io::Error::new(io::ErrorKind::NotFound, "program not found"));
            }

            let lines: Vec<io::Result<String>> =
                self.lines.iter().map(|l| Ok(l.to_string())).collect();
            let exit = self.exit.lock().unwrap().take().unwrap_or(FakeExit::Code(Some(0)));
            Ok(LaunchedProcess {
                output: stream::iter(lines).boxed(),
                exit: async move {
                    match exit {
                        FakeExit::Code(code) => Ok(code),
                        FakeExit::WaitError => Err(io::Error::new(io::ErrorKind::Other, "wait failed")),
                    }
                }
                .boxed(),
            })
        }
    }

    /// Hands out a process driven by the test through channels
    struct ManualLauncher {
        process: Mutex<Option<LaunchedProcess>>,
    }

    impl ProcessLauncher for ManualLauncher {
        fn launch(&self, _invocation: &Invocation) -> io::Result<LaunchedProcess> {
            self.process
                .lock()
                .unwrap()
                .take()
                .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "already launched"))
        }
    }

    fn request(mode: DownloadMode) -> DownloadRequest {
        DownloadRequest::new("https://youtu.be/abc", mode).unwrap()
    }

    async fn collect(mut rx: crate::core::runner::ProgressReceiver) -> Vec<String> {
        let mut lines = Vec::new();
        while let Some(event) = rx.recv().await {
            lines.push(event.to_string());
        }
        lines
    }

    #[test]
    fn test_split_output_lines_handles_carriage_returns() {
        let lines = split_output_lines(b"[download]  10.0%\r[download]  20.0%\r\n");
        assert_eq!(lines, vec!["[download]  10.0%", "[download]  20.0%"]);
        assert!(split_output_lines(b"\r\n").is_empty());
    }

    #[test]
    fn test_split_output_lines_is_lossy() {
        let lines = split_output_lines(b"title: caf\xe9\n");
        assert_eq!(lines, vec!["title: caf\u{FFFD}"]);
    }

    #[test]
    fn test_invocation_for_audio_request() {
        let backend = SubprocessBackend::new("/tools/yt-dlp", "/downloads");
        let invocation = backend.invocation(&request(DownloadMode::Audio));

        assert_eq!(invocation.program, PathBuf::from("/tools/yt-dlp"));
        assert_eq!(invocation.working_dir, PathBuf::from("/downloads"));
        assert!(invocation.args.contains(&"--audio-format".to_string()));
        assert_eq!(invocation.args.last().unwrap(), "https://youtu.be/abc");
        assert!(invocation.command_line().starts_with("/tools/yt-dlp -f bestaudio/best"));
    }

    #[tokio::test]
    async fn test_success_forwards_every_line() {
        let launcher = ScriptedLauncher::new(
            vec!["[download]  10.0% of 3.00MiB", "[download] 100% of 3.00MiB", ""],
            FakeExit::Code(Some(0)),
        );
        let seen = launcher.seen.clone();
        let backend = SubprocessBackend::new("yt-dlp", ".").with_launcher(launcher);

        let (tx, rx) = progress_channel();
        let outcome = backend.run(&request(DownloadMode::Video), tx).await;

        assert!(outcome.is_success());
        assert_eq!(
            collect(rx).await,
            vec!["[download]  10.0% of 3.00MiB", "[download] 100% of 3.00MiB"]
        );
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_nonzero_exit_reports_code_and_last_error() {
        let launcher = ScriptedLauncher::new(
            vec!["ERROR: first", "WARNING: noise", "ERROR: [youtube] abc: Video unavailable"],
            FakeExit::Code(Some(1)),
        );
        let backend = SubprocessBackend::new("yt-dlp", ".").with_launcher(launcher);

        let (tx, _rx) = progress_channel();
        let outcome = backend.run(&request(DownloadMode::Video), tx).await;

        assert_eq!(
            outcome,
            JobOutcome::failure("ERROR: [youtube] abc: Video unavailable", Some(1))
        );
        assert_eq!(
            outcome.message(DownloadMode::Video),
            "Download failed with error code: 1"
        );
    }

    #[tokio::test]
    async fn test_spawn_failure_is_an_unexpected_failure() {
        let mut launcher = ScriptedLauncher::new(vec![], FakeExit::Code(Some(0)));
        launcher.spawn_fails = true;
        let backend = SubprocessBackend::new("missing-dl", ".").with_launcher(launcher);

        let (tx, rx) = progress_channel();
        let outcome = backend.run(&request(DownloadMode::Video), tx).await;

        assert_eq!(outcome.exit_code(), None);
        assert!(!outcome.is_success());
        assert!(collect(rx).await.is_empty());
    }

    #[tokio::test]
    async fn test_signal_and_wait_errors_have_no_exit_code() {
        for exit in [FakeExit::Code(None), FakeExit::WaitError] {
            let launcher = ScriptedLauncher::new(vec![], exit);
            let backend = SubprocessBackend::new("yt-dlp", ".").with_launcher(launcher);
            let (tx, _rx) = progress_channel();
            let outcome = backend.run(&request(DownloadMode::Audio), tx).await;
            assert!(matches!(outcome, JobOutcome::Failure { exit_code: None, .. }));
        }
    }

    #[tokio::test]
    async fn test_lines_arrive_before_process_exits() {
        let (line_tx, line_rx) = mpsc::unbounded::<io::Result<String>>();
        let (exit_tx, exit_rx) = oneshot::channel::<Option<i32>>();
        let process = LaunchedProcess {
            output: line_rx.boxed(),
            exit: async move {
                exit_rx
                    .await
                    .map_err(|_| io::Error::new(io::ErrorKind::Other, "exit dropped"))
            }
            .boxed(),
        };
        let backend = Arc::new(SubprocessBackend::new("yt-dlp", ".").with_launcher(ManualLauncher {
            process: Mutex::new(Some(process)),
        }));

        let (tx, mut rx) = progress_channel();
        let job = {
            let backend = backend.clone();
            tokio::spawn(async move { backend.run(&request(DownloadMode::Video), tx).await })
        };

        line_tx.unbounded_send(Ok("[download]   5.0%".to_string())).unwrap();
        let first = rx.recv().await.unwrap();
        assert_eq!(first.to_string(), "[download]   5.0%");
        assert!(!job.is_finished());

        drop(line_tx);
        exit_tx.send(Some(0)).unwrap();
        assert!(job.await.unwrap().is_success());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_tokio_launcher_merges_streams() {
        let dir = tempfile::tempdir().unwrap();
        let invocation = Invocation {
            program: PathBuf::from("sh"),
            args: vec![
                "-c".to_string(),
                "printf 'one\\rtwo\\n'; echo three 1>&2; exit 3".to_string(),
            ],
            working_dir: dir.path().to_path_buf(),
        };

        let LaunchedProcess { output, exit } = TokioProcessLauncher.launch(&invocation).unwrap();
        let mut lines: Vec<String> = output.try_collect().await.unwrap();
        lines.sort();

        assert_eq!(lines, vec!["one", "three", "two"]);
        assert_eq!(exit.await.unwrap(), Some(3));
    }
}
