//! Single-assignment hand-off between a consumption task and the caller
//! waiting on the subscription.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::{debug, error, info, trace, warn};

use crate::{
    error::{GenericError, LogLevel, PubSubError, StackError, StatusCode},
    pipe::EventStream,
};

type Slot<S> = oneshot::Sender<Result<S, PubSubError>>;

/// A value a consumption task can hand to [`SubscriptionCallback::notify_success`].
///
/// Some tasks report failure through their return value instead of an error
/// path; `into_outcome` tells the two apart so the callback can reclassify
/// such values as failures.
pub trait TaskOutcome<S> {
    fn into_outcome(self) -> Result<S, StackError>;
}

impl<T> TaskOutcome<EventStream<T>> for EventStream<T> {
    fn into_outcome(self) -> Result<EventStream<T>, StackError> {
        Ok(self)
    }
}

impl<S, E> TaskOutcome<S> for Result<S, E>
where
    E: Into<StackError>,
{
    fn into_outcome(self) -> Result<S, StackError> {
        self.map_err(Into::into)
    }
}

/// Completion side of a subscription.
///
/// Resolves its [`PendingSubscription`] exactly once. Later completions are
/// ignored and logged.
pub struct SubscriptionCallback<S> {
    topic: Arc<str>,
    slot: Mutex<Option<Slot<S>>>,
}

/// Waiting side of a subscription.
pub struct PendingSubscription<S> {
    topic: Arc<str>,
    rx: oneshot::Receiver<Result<S, PubSubError>>,
}

/// Creates a linked callback / pending pair for `topic`.
pub fn channel<S>(topic: Arc<str>) -> (SubscriptionCallback<S>, PendingSubscription<S>) {
    let (tx, rx) = oneshot::channel();
    (
        SubscriptionCallback {
            topic: topic.clone(),
            slot: Mutex::new(Some(tx)),
        },
        PendingSubscription { topic, rx },
    )
}

impl<S> SubscriptionCallback<S> {
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Completes the subscription with the task's return value.
    ///
    /// A value that is itself an error is reported as a failure instead.
    pub fn notify_success<V>(
        &self,
        value: V,
    ) where
        V: TaskOutcome<S>,
    {
        match value.into_outcome() {
            Ok(stream) => {
                self.complete(Ok(stream));
            }
            Err(cause) => self.notify_failure(cause),
        }
    }

    /// Completes the subscription with `SubscriptionFailed` wrapping `cause`.
    pub fn notify_failure(
        &self,
        cause: impl Into<StackError>,
    ) {
        let cause = cause.into();
        log_failure(&self.topic, &cause);
        self.complete(Err(PubSubError::SubscriptionFailed {
            topic: self.topic.to_string(),
            cause,
        }));
    }

    /// `true` once the subscription has been completed.
    pub fn is_resolved(&self) -> bool {
        self.slot.lock().is_none()
    }

    fn complete(
        &self,
        result: Result<S, PubSubError>,
    ) -> bool {
        let Some(tx) = self.slot.lock().take() else {
            warn!(topic = %self.topic, "Subscription already resolved, ignoring completion");
            return false;
        };
        // The value comes back on failure and is dropped here; for a stream
        // that closes its pipe.
        if tx.send(result).is_err() {
            debug!(topic = %self.topic, "Subscriber stopped waiting before completion");
        }
        true
    }
}

/// Logs a failed subscription at the level its cause asks for.
fn log_failure(
    topic: &str,
    cause: &StackError,
) {
    let code = cause.status_code();
    match cause.log_level() {
        LogLevel::Error => error!(topic, %code, error = %cause, "Subscription task failed"),
        LogLevel::Warn => warn!(topic, %code, error = %cause, "Subscription task failed"),
        LogLevel::Info => info!(topic, %code, error = %cause, "Subscription task failed"),
        LogLevel::Debug => debug!(topic, %code, error = %cause, "Subscription task failed"),
        LogLevel::Trace => trace!(topic, %code, error = %cause, "Subscription task failed"),
    }
}

impl<S> PendingSubscription<S> {
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Waits for the consumption task to complete the subscription.
    ///
    /// # Errors
    /// - whatever the task reported through the callback
    /// - `SubscriptionFailed` with an `Internal` cause if the task went away
    ///   without completing (for example its runtime shut down)
    pub async fn wait(self) -> Result<S, PubSubError> {
        match self.rx.await {
            Ok(result) => result,
            Err(_) => Err(PubSubError::SubscriptionFailed {
                topic: self.topic.to_string(),
                cause: GenericError::new(
                    StatusCode::Internal,
                    "consumption task terminated before reporting a result",
                )
                .into(),
            }),
        }
    }
}
