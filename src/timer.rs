//! Shared timer used to bound every wait of a pipe.
//!
//! The broker owns one `Timer` and hands a clone to each pipe it creates.
//! Clones share the same counters, so the broker can observe how many waits
//! are in flight across all of its subscribers.

use std::{
    future::Future,
    sync::{
        atomic::{AtomicU64, AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use tokio::time::{error::Elapsed, Instant};

/// Upper bound used when `now + timeout` overflows `Instant`.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// Cheaply clonable timer handle.
#[derive(Debug, Clone, Default)]
pub struct Timer {
    inner: Arc<TimerInner>,
}

#[derive(Debug, Default)]
struct TimerInner {
    /// Deadlines currently being awaited.
    armed: AtomicUsize,
    /// Total number of deadlines started.
    started: AtomicU64,
    /// Deadlines that elapsed before the future completed.
    expired: AtomicU64,
}

/// Snapshot of the timer counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerStats {
    pub armed: usize,
    pub started: u64,
    pub expired: u64,
}

/// Keeps `armed` accurate even when the awaiting future is dropped.
struct ArmedGuard<'a>(&'a TimerInner);

impl<'a> ArmedGuard<'a> {
    fn arm(inner: &'a TimerInner) -> Self {
        inner.armed.fetch_add(1, Ordering::Relaxed);
        inner.started.fetch_add(1, Ordering::Relaxed);
        Self(inner)
    }
}

impl Drop for ArmedGuard<'_> {
    fn drop(&mut self) {
        self.0.armed.fetch_sub(1, Ordering::Relaxed);
    }
}

impl Timer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Computes the deadline `timeout` from now.
    pub fn deadline(
        &self,
        timeout: Duration,
    ) -> Instant {
        let now = Instant::now();
        now.checked_add(timeout).unwrap_or(now + FAR_FUTURE)
    }

    /// Awaits `fut` until `deadline`.
    ///
    /// Returns `Err(Elapsed)` if the deadline passes first; the future is
    /// dropped in that case.
    pub async fn timeout_at<F>(
        &self,
        deadline: Instant,
        fut: F,
    ) -> Result<F::Output, Elapsed>
    where
        F: Future,
    {
        let _armed = ArmedGuard::arm(&self.inner);
        let res = tokio::time::timeout_at(deadline, fut).await;
        if res.is_err() {
            self.inner.expired.fetch_add(1, Ordering::Relaxed);
        }
        res
    }

    pub fn stats(&self) -> TimerStats {
        TimerStats {
            armed: self.inner.armed.load(Ordering::Relaxed),
            started: self.inner.started.load(Ordering::Relaxed),
            expired: self.inner.expired.load(Ordering::Relaxed),
        }
    }

    /// Returns `true` if both handles refer to the same timer.
    pub fn same_timer(
        &self,
        other: &Timer,
    ) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}
