//! Shutdown Coordination
//!
//! Every path that ends the process (operator signals, reconnection
//! exhaustion, fatal startup errors) goes through a [`ShutdownHandle`]. The
//! binary waits on the matching [`ShutdownListener`], stops serving, flushes
//! log output within a bounded timeout and exits with the requested status.

use std::io::Write;
use std::time::Duration;

use tokio::signal;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;

// == Exit Status ==
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    /// Operator-requested stop
    Success,
    /// Unrecoverable failure
    Failure,
}

impl ExitStatus {
    /// Process exit code for this status.
    pub fn code(self) -> i32 {
        match self {
            ExitStatus::Success => 0,
            ExitStatus::Failure => 1,
        }
    }
}

/// A request to terminate the process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShutdownRequest {
    pub status: ExitStatus,
    pub reason: String,
}

// == Shutdown Handle ==
/// Cloneable sender side used to request process termination.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    tx: mpsc::UnboundedSender<ShutdownRequest>,
}

impl ShutdownHandle {
    /// Requests shutdown with `status`.
    ///
    /// The first request received by the listener decides the final exit
    /// code; later ones are ignored.
    pub fn request(&self, status: ExitStatus, reason: impl Into<String>) {
        let request = ShutdownRequest {
            status,
            reason: reason.into(),
        };
        if self.tx.send(request).is_err() {
            warn!("Shutdown already in progress, request dropped");
        }
    }
}

// == Shutdown Listener ==
/// Receiving side, owned by the binary.
#[derive(Debug)]
pub struct ShutdownListener {
    rx: mpsc::UnboundedReceiver<ShutdownRequest>,
}

impl ShutdownListener {
    /// Waits for the next shutdown request.
    ///
    /// Returns `None` once every handle has been dropped.
    pub async fn recv(&mut self) -> Option<ShutdownRequest> {
        self.rx.recv().await
    }

    /// Returns a pending request without waiting.
    pub fn try_recv(&mut self) -> Option<ShutdownRequest> {
        self.rx.try_recv().ok()
    }
}

/// Creates a connected handle/listener pair.
pub fn channel() -> (ShutdownHandle, ShutdownListener) {
    let (tx, rx) = mpsc::unbounded_channel();
    (ShutdownHandle { tx }, ShutdownListener { rx })
}

// == Signal Watcher ==
/// Waits for SIGINT or SIGTERM and turns the first one into a clean
/// shutdown request.
pub async fn watch_signals(handle: ShutdownHandle) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("SIGINT: Application shutting down");
            handle.request(ExitStatus::Success, "SIGINT");
        }
        _ = terminate => {
            info!("SIGTERM: Application shutting down");
            handle.request(ExitStatus::Success, "SIGTERM");
        }
    }
}

// == Log Flush ==
/// Flushes buffered log output, giving up after `timeout`.
///
/// Dropping `log_file` waits for the file worker to write every pending
/// line. Returns true if the flush completed in time.
pub async fn flush_logs(timeout: Duration, log_file: Option<WorkerGuard>) -> bool {
    let flush = tokio::task::spawn_blocking(move || {
        drop(log_file);
        let stdout = std::io::stdout().flush();
        let stderr = std::io::stderr().flush();
        stdout.and(stderr)
    });

    matches!(tokio::time::timeout(timeout, flush).await, Ok(Ok(Ok(()))))
}

/// Flushes logs and terminates the process with the request's status.
pub async fn terminate(
    request: ShutdownRequest,
    flush_timeout: Duration,
    log_file: Option<WorkerGuard>,
) -> ! {
    info!(reason = %request.reason, "Exiting with status {}", request.status.code());
    if !flush_logs(flush_timeout, log_file).await {
        // Nothing left to log to; exit regardless
        let _ = std::io::stderr().write_all(b"log flush timed out during shutdown\n");
    }
    std::process::exit(request.status.code())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_exit_codes() {
        assert_eq!(ExitStatus::Success.code(), 0);
        assert_eq!(ExitStatus::Failure.code(), 1);
    }

    #[tokio::test]
    async fn test_request_reaches_listener() {
        let (handle, mut listener) = channel();

        handle.clone().request(ExitStatus::Failure, "exhausted");

        let request = listener.recv().await.unwrap();
        assert_eq!(request.status, ExitStatus::Failure);
        assert_eq!(request.reason, "exhausted");
        assert!(listener.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_first_request_decides_status() {
        let (handle, mut listener) = channel();
        let signals = handle.clone();

        handle.request(ExitStatus::Failure, "reconnection attempts exhausted");
        signals.request(ExitStatus::Success, "SIGINT");

        let first = listener.recv().await.unwrap();
        assert_eq!(first.status, ExitStatus::Failure);
        assert_eq!(first.reason, "reconnection attempts exhausted");
    }

    #[tokio::test]
    async fn test_listener_closes_when_handles_dropped() {
        let (handle, mut listener) = channel();
        drop(handle);

        assert!(listener.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_request_after_listener_dropped_does_not_panic() {
        let (handle, listener) = channel();
        drop(listener);

        handle.request(ExitStatus::Success, "SIGTERM");
    }

    #[tokio::test]
    async fn test_flush_logs_completes() {
        assert!(flush_logs(Duration::from_secs(5), None).await);
    }

    /// Shared in-memory sink standing in for the log file.
    #[derive(Clone, Default)]
    struct Sink(Arc<Mutex<Vec<u8>>>);

    impl Write for Sink {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_flush_logs_drains_file_worker() {
        let sink = Sink::default();
        let (mut writer, guard) = tracing_appender::non_blocking(sink.clone());
        writer.write_all(b"SIGTERM: Application shutting down\n").unwrap();

        assert!(flush_logs(Duration::from_secs(5), Some(guard)).await);

        let written = String::from_utf8(sink.0.lock().unwrap().clone()).unwrap();
        assert_eq!(written, "SIGTERM: Application shutting down\n");
    }
}
