//! The download job runner seam
//!
//! A backend executes exactly one request at a time and reports progress
//! through a channel in the order it happens. It never returns an error:
//! every way a job can end is folded into a [`JobOutcome`].

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::core::models::{DownloadRequest, JobOutcome, ProgressEvent};

pub type ProgressSender = mpsc::UnboundedSender<ProgressEvent>;
pub type ProgressReceiver = mpsc::UnboundedReceiver<ProgressEvent>;

pub fn progress_channel() -> (ProgressSender, ProgressReceiver) {
    mpsc::unbounded_channel()
}

/// Send an event, ignoring a receiver that has gone away
pub fn emit(sink: &ProgressSender, event: ProgressEvent) {
    if sink.send(event).is_err() {
        tracing::trace!("Progress receiver dropped");
    }
}

#[async_trait]
pub trait DownloadBackend: Send + Sync {
    /// Short identifier used in logs
    fn name(&self) -> &'static str;

    /// Human readable description for the ready banner
    fn describe(&self) -> String;

    /// Run one job to completion
    async fn run(&self, request: &DownloadRequest, sink: ProgressSender) -> JobOutcome;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emit_ignores_dropped_receiver() {
        let (tx, rx) = progress_channel();
        drop(rx);
        emit(&tx, ProgressEvent::RawLine { text: "late".into() });
    }

    #[test]
    fn test_events_keep_arrival_order() {
        tokio_test::block_on(async {
            let (tx, mut rx) = progress_channel();
            for i in 0..3 {
                emit(&tx, ProgressEvent::RawLine { text: format!("line {}", i) });
            }
            drop(tx);

            let mut seen = Vec::new();
            while let Some(event) = rx.recv().await {
                seen.push(event.to_string());
            }
            assert_eq!(seen, vec!["line 0", "line 1", "line 2"]);
        });
    }
}
