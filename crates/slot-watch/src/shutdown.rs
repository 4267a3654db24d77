//! Withdraws every outstanding alert when the process is told to stop.

use std::future::Future;
use std::io;
use std::sync::Arc;
use tokio::task::{AbortHandle, JoinError, JoinHandle};

use crate::sources::NotificationSink;
use crate::state::SlotTable;

pub struct ShutdownHandler<S> {
    table: SlotTable,
    sink: Arc<S>,
}

impl<S: NotificationSink> ShutdownHandler<S> {
    pub fn new(table: SlotTable, sink: Arc<S>) -> Self {
        Self { table, sink }
    }

    /// Delete every tracked alert. Returns the number of deletes issued.
    pub async fn drain(&self) -> usize {
        self.drain_stopping(None).await
    }

    /// Like `drain`, but first stops the poll task.
    ///
    /// The guard is taken before the abort, so an in-flight reconcile step
    /// finishes first and the poll task cannot touch the table afterwards.
    pub async fn drain_stopping(&self, poll_task: Option<AbortHandle>) -> usize {
        let mut slots = self.table.lock().await;
        if let Some(task) = poll_task {
            task.abort();
        }

        let entries = std::mem::take(&mut *slots);
        tracing::info!("deleting messages for {} active slots", entries.len());

        let mut issued = 0;
        for (key, handle) in entries {
            issued += 1;
            if let Err(e) = self.sink.delete(&handle).await {
                tracing::warn!("Failed to delete message {} for {}: {}", handle, key, e);
            }
        }
        issued
    }
}

/// Why the watcher stopped
#[derive(Debug)]
pub enum StopReason {
    Signal(&'static str),
    /// Installing or awaiting the signal handler failed
    SignalFailed(io::Error),
    /// The poll task returned or panicked on its own
    PollerExited(Option<JoinError>),
}

/// Wait for a stop signal or for the poll task to die, then drain.
///
/// Alerts are withdrawn whatever the reason, so a failed signal handler or
/// a crashed poller does not leave messages behind.
pub async fn run_until_stopped<S, F>(
    handler: &ShutdownHandler<S>,
    mut poll_task: JoinHandle<()>,
    signal: F,
) -> (StopReason, usize)
where
    S: NotificationSink,
    F: Future<Output = io::Result<&'static str>>,
{
    let reason = tokio::select! {
        result = signal => match result {
            Ok(name) => {
                tracing::info!("{} received, withdrawing alerts", name);
                StopReason::Signal(name)
            }
            Err(e) => {
                tracing::error!("Signal handler failed: {}, withdrawing alerts", e);
                StopReason::SignalFailed(e)
            }
        },
        joined = &mut poll_task => match joined {
            Ok(()) => {
                tracing::error!("Poll task exited, withdrawing alerts");
                StopReason::PollerExited(None)
            }
            Err(e) => {
                tracing::error!(
                    "Poll task died (panic: {}): {}, withdrawing alerts",
                    e.is_panic(),
                    e
                );
                StopReason::PollerExited(Some(e))
            }
        },
    };

    let deleted = handler.drain_stopping(Some(poll_task.abort_handle())).await;
    (reason, deleted)
}

/// Resolves on Ctrl-C or SIGTERM
#[cfg(unix)]
pub async fn wait_for_signal() -> std::io::Result<&'static str> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = signal(SignalKind::terminate())?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result?;
            Ok("SIGINT")
        }
        _ = terminate.recv() => Ok("SIGTERM"),
    }
}

#[cfg(not(unix))]
pub async fn wait_for_signal() -> std::io::Result<&'static str> {
    tokio::signal::ctrl_c().await?;
    Ok("Ctrl-C")
}
