//! Runs the consumption call of a subscription on its own task.

use std::{any::Any, future::Future, sync::Arc, time::Duration};

use serde::de::DeserializeOwned;
use tokio::task::JoinError;
use tracing::{debug_span, Instrument, Span};

use super::bridge::{self, PendingSubscription, TaskOutcome};
use crate::{
    error::{GenericError, StackError, StatusCode},
    pipe::{EventStream, Pipe},
};

/// Opens a typed stream on `pipe` in a spawned task.
///
/// The returned handle resolves with the stream, or with `SubscriptionFailed`
/// if the pipe refused to open one.
pub fn launch<T>(
    topic: Arc<str>,
    pipe: Arc<Pipe>,
    timeout: Duration,
) -> PendingSubscription<EventStream<T>>
where
    T: DeserializeOwned + Send + 'static,
{
    let span = debug_span!("subscription", topic = %topic, pipe = pipe.id());
    launch_with(
        topic,
        async move {
            pipe.consume_stream::<T>(timeout)
                .await
                .map_err(|e| StackError::from(e).context("opening event stream"))
        },
        span,
    )
}

/// Spawns `task` inside `span` and forwards its output to the returned
/// handle.
///
/// The output goes through [`TaskOutcome`], so an `Err` value resolves the
/// handle with `SubscriptionFailed`. A task that panics resolves it with an
/// `Internal` cause carrying the panic message.
pub fn launch_with<S, F>(
    topic: Arc<str>,
    task: F,
    span: Span,
) -> PendingSubscription<S>
where
    S: Send + 'static,
    F: Future + Send + 'static,
    F::Output: TaskOutcome<S> + Send + 'static,
{
    let (callback, pending) = bridge::channel(topic);
    let handle = tokio::spawn(task.instrument(span.clone()));
    tokio::spawn(
        async move {
            match handle.await {
                Ok(outcome) => callback.notify_success(outcome),
                Err(err) => callback.notify_failure(task_failure(err)),
            }
        }
        .instrument(span),
    );
    pending
}

/// Turns a task that did not finish into an `Internal` error.
fn task_failure(err: JoinError) -> StackError {
    let message = if err.is_panic() {
        format!(
            "consumption task panicked: {}",
            panic_message(err.into_panic().as_ref())
        )
    } else {
        "consumption task was cancelled".to_string()
    };
    StackError::from(GenericError::new(StatusCode::Internal, message))
        .context("running consumption task")
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        msg
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg
    } else {
        "non-string panic payload"
    }
}
