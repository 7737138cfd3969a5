//! Background runtime for download jobs.
//!
//! The presentation layer owns its own (single-threaded) loop; jobs run on a
//! separate multi-thread tokio runtime so a long download never stalls it.
//! When a runtime already exists it is reused instead.

use std::sync::mpsc as std_mpsc;
use std::thread::JoinHandle;

use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::core::models::{AppError, AppResult};

pub struct JobRuntime {
    handle: Handle,
    shutdown: Option<oneshot::Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl JobRuntime {
    /// Reuse the ambient tokio runtime, or start a dedicated one
    pub fn current_or_dedicated() -> AppResult<Self> {
        match Handle::try_current() {
            Ok(handle) => {
                info!("[RUNTIME] Using existing tokio runtime for jobs");
                Ok(Self {
                    handle,
                    shutdown: None,
                    thread: None,
                })
            }
            Err(_) => {
                warn!("[RUNTIME] No tokio runtime found, creating dedicated thread with new runtime");
                Self::dedicated()
            }
        }
    }

    /// Start a multi-thread runtime on its own thread
    pub fn dedicated() -> AppResult<Self> {
        let (handle_tx, handle_rx) = std_mpsc::channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let thread = std::thread::Builder::new()
            .name("download-runtime".into())
            .spawn(move || {
                let runtime = match tokio::runtime::Builder::new_multi_thread()
                    .enable_all()
                    .thread_name("download-runtime-worker")
                    .build()
                {
                    Ok(runtime) => runtime,
                    Err(e) => {
                        let _ = handle_tx.send(Err(e));
                        return;
                    }
                };

                let _ = handle_tx.send(Ok(runtime.handle().clone()));
                runtime.block_on(async {
                    let _ = shutdown_rx.await;
                });
                debug!("[RUNTIME] Download runtime shutting down");
            })?;

        let handle = handle_rx
            .recv()
            .map_err(|_| AppError::Unexpected("download runtime thread exited early".into()))??;

        info!("[RUNTIME] Started dedicated download runtime");
        Ok(Self {
            handle,
            shutdown: Some(shutdown_tx),
            thread: Some(thread),
        })
    }

    pub fn handle(&self) -> Handle {
        self.handle.clone()
    }

    pub fn is_dedicated(&self) -> bool {
        self.thread.is_some()
    }
}

impl Drop for JobRuntime {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("[RUNTIME] Download runtime thread panicked");
            }
        }
    }
}
