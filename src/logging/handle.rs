use std::time::{Duration, Instant};

use tracing_appender::non_blocking::WorkerGuard;

/// Keeps the non-blocking file writer alive.
///
/// Dropping the handle flushes pending lines; [`shutdown`](Self::shutdown)
/// does the same and reports how long it took.
#[derive(Debug)]
pub struct LoggingHandle {
    file_guard: Option<WorkerGuard>,
    flush_timeout: Duration,
}

impl LoggingHandle {
    pub fn new(file_guard: Option<WorkerGuard>) -> Self {
        Self {
            file_guard,
            flush_timeout: Duration::from_secs(5),
        }
    }

    /// Sets the duration after which a slow shutdown is reported.
    pub fn with_flush_timeout(
        mut self,
        timeout: Duration,
    ) -> Self {
        self.flush_timeout = timeout;
        self
    }

    pub fn has_file_output(&self) -> bool {
        self.file_guard.is_some()
    }

    /// Flushes and stops the file writer.
    pub fn shutdown(mut self) {
        let Some(guard) = self.file_guard.take() else {
            return;
        };

        tracing::info!(
            timeout_ms = self.flush_timeout.as_millis() as u64,
            "Initiating logging shutdown"
        );

        let start = Instant::now();
        drop(guard);
        let elapsed = start.elapsed();

        // The writer is gone, so this can only go to stderr.
        if elapsed > self.flush_timeout {
            eprintln!(
                "WARNING: Logging shutdown took {}ms (timeout: {}ms)",
                elapsed.as_millis(),
                self.flush_timeout.as_millis()
            );
        }
    }
}
