use std::{fmt, marker::PhantomData, sync::Arc, time::Duration};

use serde::de::DeserializeOwned;

use super::Pipe;
use crate::error::PipeError;

/// Typed stream of events read from one pipe.
///
/// Each call to [`next`](EventStream::next) waits up to the stream's timeout
/// for an event and decodes it into `T`. The stream ends (`None`) once the
/// pipe is closed and nothing is left to read.
///
/// Dropping the stream closes the pipe immediately, so the publish side stops
/// delivering to it.
pub struct EventStream<T> {
    pipe: Arc<Pipe>,
    timeout: Duration,
    finished: bool,
    _marker: PhantomData<fn() -> T>,
}

impl<T> EventStream<T> {
    pub(crate) fn new(
        pipe: Arc<Pipe>,
        timeout: Duration,
    ) -> Self {
        Self {
            pipe,
            timeout,
            finished: false,
            _marker: PhantomData,
        }
    }

    /// Id of the pipe backing this stream.
    pub fn pipe_id(&self) -> u64 {
        self.pipe.id()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// `true` after `next()` has returned `None`.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Gracefully closes the underlying pipe: no new events are accepted and
    /// buffered ones are discarded after `timeout`.
    pub async fn close(
        self,
        timeout: Duration,
    ) -> Result<(), PipeError> {
        self.pipe.graceful_close(timeout).await
    }
}

impl<T> EventStream<T>
where
    T: DeserializeOwned,
{
    /// Waits for the next event.
    ///
    /// # Returns
    /// - `Some(Ok(event))` for a decoded event
    /// - `Some(Err(PipeError::Timeout))` if nothing arrived in time; the
    ///   stream stays usable
    /// - `Some(Err(PipeError::TypeMismatch { .. }))` if the event has another
    ///   shape than `T`
    /// - `None` once the pipe is closed
    pub async fn next(&mut self) -> Option<Result<T, PipeError>> {
        if self.finished {
            return None;
        }
        match self.pipe.consume::<T>(self.timeout).await {
            Err(PipeError::Closed) => {
                self.finished = true;
                None
            }
            other => Some(other),
        }
    }
}

impl<T> fmt::Debug for EventStream<T> {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("pipe_id", &self.pipe.id())
            .field("element", &std::any::type_name::<T>())
            .field("timeout", &self.timeout)
            .field("finished", &self.finished)
            .finish()
    }
}

impl<T> Drop for EventStream<T> {
    fn drop(&mut self) {
        self.pipe.immediate_close();
    }
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;
    use serde_json::json;

    use super::*;
    use crate::{pipe::PipeStatus, timer::Timer};

    const WAIT: Duration = Duration::from_millis(50);

    #[derive(Debug, Deserialize, PartialEq)]
    struct Order {
        id: u32,
        item: String,
    }

    async fn open_stream<T>(capacity: usize) -> (Arc<Pipe>, EventStream<T>) {
        let pipe = Arc::new(Pipe::new(capacity, Timer::new()).unwrap());
        let stream = pipe.consume_stream::<T>(WAIT).await.unwrap();
        (pipe, stream)
    }

    #[tokio::test]
    async fn test_stream_yields_typed_events_in_order() {
        let (pipe, mut stream) = open_stream::<Order>(4).await;
        pipe.produce(json!({"id": 1, "item": "tea"}), WAIT)
            .await
            .unwrap();
        pipe.produce(json!({"id": 2, "item": "milk"}), WAIT)
            .await
            .unwrap();

        let first = stream.next().await.unwrap().unwrap();
        let second = stream.next().await.unwrap().unwrap();

        assert_eq!(
            first,
            Order {
                id: 1,
                item: "tea".into()
            }
        );
        assert_eq!(second.id, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stream_reports_timeout_and_stays_open() {
        let (pipe, mut stream) = open_stream::<i32>(1).await;

        assert_eq!(stream.next().await, Some(Err(PipeError::Timeout)));
        assert!(!stream.is_finished());

        pipe.produce(json!(5), WAIT).await.unwrap();
        assert_eq!(stream.next().await, Some(Ok(5)));
    }

    #[tokio::test]
    async fn test_stream_ends_after_close() {
        let (pipe, mut stream) = open_stream::<i32>(2).await;
        pipe.produce(json!(1), WAIT).await.unwrap();
        pipe.immediate_close();

        assert_eq!(stream.next().await, None);
        assert!(stream.is_finished());
        assert_eq!(stream.next().await, None);
    }

    #[tokio::test]
    async fn test_stream_surfaces_type_mismatch() {
        let (pipe, mut stream) = open_stream::<Order>(2).await;
        pipe.produce(json!("plain text"), WAIT).await.unwrap();

        let item = stream.next().await.unwrap();

        assert!(matches!(item, Err(PipeError::TypeMismatch { .. })));
    }

    #[tokio::test]
    async fn test_drop_closes_pipe() {
        let (pipe, stream) = open_stream::<i32>(1).await;
        drop(stream);
        assert_eq!(pipe.status(), PipeStatus::Closed);
    }

    #[tokio::test]
    async fn test_close_is_graceful() {
        let (pipe, stream) = open_stream::<i32>(1).await;
        stream.close(WAIT).await.unwrap();
        assert_eq!(pipe.status(), PipeStatus::Closed);
    }
}
