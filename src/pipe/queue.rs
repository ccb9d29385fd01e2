use std::{
    any::type_name,
    collections::VecDeque,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::Notify;
use tracing::{debug, trace, warn};

use super::EventStream;
use crate::{error::PipeError, timer::Timer};

/// Source of process-unique pipe ids.
static NEXT_PIPE_ID: AtomicU64 = AtomicU64::new(1);

/// Lifecycle of a pipe.
///
/// `Open → Draining → Closed` on a graceful close, `Open → Closed` on an
/// immediate one. A closed pipe never reopens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipeStatus {
    Open,
    /// No new events are accepted; buffered ones can still be consumed.
    Draining,
    Closed,
}

#[derive(Debug)]
struct PipeState {
    events: VecDeque<Value>,
    status: PipeStatus,
}

/// Bounded FIFO of events owned by one subscription.
///
/// Producers wait for free space and consumers wait for events, both bounded
/// by the timeout they pass in. All waits go through the shared [`Timer`].
#[derive(Debug)]
pub struct Pipe {
    id: u64,
    capacity: usize,
    timer: Timer,
    state: Mutex<PipeState>,
    /// Signalled when an event is pushed or the pipe changes status.
    not_empty: Notify,
    /// Signalled when an event is popped or the pipe changes status.
    not_full: Notify,
    /// Signalled when the last buffered event is popped or the pipe closes.
    drained: Notify,
}

////////////////////////////////////////////////////////////////////////////////
// Inherent methods
////////////////////////////////////////////////////////////////////////////////

impl Pipe {
    /// Creates an open pipe holding at most `capacity` events.
    pub fn new(
        capacity: usize,
        timer: Timer,
    ) -> Result<Self, PipeError> {
        if capacity == 0 {
            return Err(PipeError::InvalidCapacity);
        }
        Ok(Self {
            id: NEXT_PIPE_ID.fetch_add(1, Ordering::Relaxed),
            capacity,
            timer,
            state: Mutex::new(PipeState {
                events: VecDeque::with_capacity(capacity),
                status: PipeStatus::Open,
            }),
            not_empty: Notify::new(),
            not_full: Notify::new(),
            drained: Notify::new(),
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn timer(&self) -> &Timer {
        &self.timer
    }

    /// Number of buffered events.
    pub fn len(&self) -> usize {
        self.state.lock().events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().events.is_empty()
    }

    pub fn status(&self) -> PipeStatus {
        self.state.lock().status
    }

    /// `true` once the pipe stopped accepting events (draining or closed).
    pub fn is_closed(&self) -> bool {
        self.status() != PipeStatus::Open
    }

    /// Appends `event`, waiting up to `timeout` for free space.
    ///
    /// # Errors
    /// - `NilEvent` for `Value::Null`
    /// - `Closed` if the pipe is draining or closed (also when it closes while
    ///   waiting)
    /// - `Timeout` if no space freed up in time
    pub async fn produce(
        &self,
        event: Value,
        timeout: Duration,
    ) -> Result<(), PipeError> {
        if event.is_null() {
            return Err(PipeError::NilEvent);
        }
        let deadline = self.timer.deadline(timeout);
        let mut event = event;
        loop {
            let space = self.not_full.notified();
            tokio::pin!(space);
            space.as_mut().enable();

            match self.try_push(event)? {
                None => {
                    self.not_empty.notify_one();
                    trace!(pipe = self.id, "event produced");
                    return Ok(());
                }
                Some(rejected) => event = rejected,
            }

            if self.timer.timeout_at(deadline, space).await.is_err() {
                return Err(PipeError::Timeout);
            }
        }
    }

    /// Takes the oldest event and decodes it into `T`, waiting up to `timeout`
    /// for one to arrive.
    ///
    /// # Errors
    /// - `Closed` if the pipe is closed, or draining with nothing left
    /// - `Timeout` if no event arrived in time
    /// - `TypeMismatch` if the event does not deserialize into `T` (the event
    ///   is consumed regardless)
    pub async fn consume<T>(
        &self,
        timeout: Duration,
    ) -> Result<T, PipeError>
    where
        T: DeserializeOwned,
    {
        let event = self.take(timeout).await?;
        decode(event)
    }

    /// Opens a typed stream over this pipe.
    ///
    /// Every `next()` on the stream waits up to `timeout` for an event.
    pub async fn consume_stream<T>(
        self: &Arc<Self>,
        timeout: Duration,
    ) -> Result<EventStream<T>, PipeError> {
        if self.is_closed() {
            return Err(PipeError::Closed);
        }
        Ok(EventStream::new(Arc::clone(self), timeout))
    }

    /// Stops accepting events, gives consumers up to `timeout` to drain the
    /// buffer, then closes the pipe. Events still buffered at that point are
    /// discarded.
    pub async fn graceful_close(
        &self,
        timeout: Duration,
    ) -> Result<(), PipeError> {
        self.begin_drain()?;
        // Producers blocked on a full pipe and consumers blocked on an empty
        // one must observe the new status.
        self.not_full.notify_waiters();
        self.not_empty.notify_waiters();

        let deadline = self.timer.deadline(timeout);
        loop {
            let drained = self.drained.notified();
            tokio::pin!(drained);
            drained.as_mut().enable();

            if self.is_drained() {
                break;
            }
            if self.timer.timeout_at(deadline, drained).await.is_err() {
                break;
            }
        }

        match self.shut() {
            Some(0) | None => debug!(pipe = self.id, "pipe closed gracefully"),
            Some(discarded) => warn!(
                pipe = self.id,
                discarded, "pipe closed before all buffered events were consumed"
            ),
        }
        Ok(())
    }

    /// Closes the pipe at once and discards buffered events.
    ///
    /// Closing an already closed pipe does nothing.
    pub fn immediate_close(&self) {
        if let Some(discarded) = self.shut() {
            debug!(pipe = self.id, discarded, "pipe closed immediately");
        }
    }

    async fn take(
        &self,
        timeout: Duration,
    ) -> Result<Value, PipeError> {
        let deadline = self.timer.deadline(timeout);
        loop {
            let arrival = self.not_empty.notified();
            tokio::pin!(arrival);
            arrival.as_mut().enable();

            if let Some(event) = self.try_pop()? {
                return Ok(event);
            }

            if self.timer.timeout_at(deadline, arrival).await.is_err() {
                return Err(PipeError::Timeout);
            }
        }
    }

    /// Pushes if there is room. A full pipe hands the event back.
    fn try_push(
        &self,
        event: Value,
    ) -> Result<Option<Value>, PipeError> {
        let mut state = self.state.lock();
        if state.status != PipeStatus::Open {
            return Err(PipeError::Closed);
        }
        if state.events.len() >= self.capacity {
            return Ok(Some(event));
        }
        state.events.push_back(event);
        Ok(None)
    }

    /// Pops the oldest event, `Ok(None)` if an open pipe is empty.
    fn try_pop(&self) -> Result<Option<Value>, PipeError> {
        let mut state = self.state.lock();
        if state.status == PipeStatus::Closed {
            return Err(PipeError::Closed);
        }
        match state.events.pop_front() {
            Some(event) => {
                let now_empty = state.events.is_empty();
                drop(state);
                self.not_full.notify_one();
                if now_empty {
                    self.drained.notify_waiters();
                }
                Ok(Some(event))
            }
            None if state.status == PipeStatus::Draining => Err(PipeError::Closed),
            None => Ok(None),
        }
    }

    fn begin_drain(&self) -> Result<(), PipeError> {
        let mut state = self.state.lock();
        if state.status != PipeStatus::Open {
            return Err(PipeError::Closed);
        }
        state.status = PipeStatus::Draining;
        Ok(())
    }

    fn is_drained(&self) -> bool {
        let state = self.state.lock();
        state.events.is_empty() || state.status == PipeStatus::Closed
    }

    /// Marks the pipe closed and wakes every waiter.
    ///
    /// Returns the number of discarded events, `None` if it was already closed.
    fn shut(&self) -> Option<usize> {
        let discarded = {
            let mut state = self.state.lock();
            if state.status == PipeStatus::Closed {
                return None;
            }
            state.status = PipeStatus::Closed;
            let discarded = state.events.len();
            state.events.clear();
            discarded
        };
        self.not_empty.notify_waiters();
        self.not_full.notify_waiters();
        self.drained.notify_waiters();
        Some(discarded)
    }
}

/// Converts a buffered event into the consumer's element type.
pub(crate) fn decode<T>(event: Value) -> Result<T, PipeError>
where
    T: DeserializeOwned,
{
    serde_json::from_value(event).map_err(|e| PipeError::TypeMismatch {
        expected: type_name::<T>(),
        reason: e.to_string(),
    })
}

////////////////////////////////////////////////////////////////////////////////
// Tests
////////////////////////////////////////////////////////////////////////////////
