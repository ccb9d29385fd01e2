use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use parking_lot::RwLock;
use serde::{de::DeserializeOwned, Serialize};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use super::{launcher, registry::TopicRegistry};
use crate::{
    config::BrokerConfig,
    error::{ErrorExt, GenericError, PipeError, PubSubError, StackError, StatusCode},
    pipe::{EventStream, Pipe},
    timer::Timer,
};

/// In-process publish/subscribe broker.
///
/// Every subscription gets its own bounded [`Pipe`]; publishing copies the
/// event into each open pipe of the topic.
///
/// Supports:
/// - Auto-creation of missing topics, or rejection with `TopicNotFound`
/// - Graceful and immediate shutdown
/// - Admission and publish statistics
pub struct PubSub {
    /// `true` once shut down. Admission holds the read lock across its
    /// closed check and registry update; shutdown takes the write lock, so no
    /// subscriber can be added after the registry is drained.
    closed: RwLock<bool>,
    registry: TopicRegistry,
    auto_create_topics: bool,
    /// Shared by every pipe this broker creates.
    timer: Timer,
    default_limit: usize,
    default_timeout: Duration,
    /// Subscriptions that passed admission
    pub subscriptions_admitted: AtomicU64,
    /// Subscriptions rejected before a pipe was registered
    pub subscriptions_rejected: AtomicU64,
    /// Admitted subscriptions whose consumption task failed
    pub subscriptions_failed: AtomicU64,
    /// Total calls to `publish`
    pub publish_count: AtomicU64,
    /// Calls to `publish` that returned an error
    pub publish_error_count: AtomicU64,
}

impl PubSub {
    /// Creates an open broker with default limits.
    pub fn new(auto_create_topics: bool) -> Self {
        Self::with_config(&BrokerConfig {
            auto_create_topics,
            ..BrokerConfig::default()
        })
    }

    pub fn with_config(config: &BrokerConfig) -> Self {
        Self::with_timer(config, Timer::new())
    }

    /// Creates a broker whose pipes share `timer`.
    pub fn with_timer(
        config: &BrokerConfig,
        timer: Timer,
    ) -> Self {
        Self {
            closed: RwLock::new(false),
            registry: TopicRegistry::new(),
            auto_create_topics: config.auto_create_topics,
            timer,
            default_limit: config.default_limit,
            default_timeout: config.default_timeout(),
            subscriptions_admitted: AtomicU64::new(0),
            subscriptions_rejected: AtomicU64::new(0),
            subscriptions_failed: AtomicU64::new(0),
            publish_count: AtomicU64::new(0),
            publish_error_count: AtomicU64::new(0),
        }
    }

    ////////////////////////////////////////////////////////////////////////////////
    // Subscribe
    ////////////////////////////////////////////////////////////////////////////////

    /// Subscribes to `topic` with a pipe of capacity `limit`.
    ///
    /// The subscriber is registered before this call suspends, so an event
    /// published after admission reaches it even if the stream is not yet
    /// returned. Each `next()` on the stream waits at most `timeout`.
    ///
    /// # Errors
    /// - `BrokerClosed` if the broker was shut down
    /// - `InvalidLimit` if `limit` is zero
    /// - `TopicNotFound` if the topic is missing and auto-creation is off
    /// - `SubscriptionFailed` if the consumption task could not open the
    ///   stream
    pub async fn subscribe<T>(
        &self,
        topic: &str,
        limit: usize,
        timeout: Duration,
    ) -> Result<EventStream<T>, PubSubError>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let pipe = self.admit(topic, limit)?;
        self.open(topic, pipe, timeout).await
    }

    /// [`subscribe`](Self::subscribe) with the configured default limit and
    /// timeout.
    pub async fn subscribe_with_defaults<T>(
        &self,
        topic: &str,
    ) -> Result<EventStream<T>, PubSubError>
    where
        T: DeserializeOwned + Send + 'static,
    {
        self.subscribe(topic, self.default_limit, self.default_timeout)
            .await
    }

    /// Registers a new pipe for `topic`. Runs entirely under the lifecycle
    /// read lock and never suspends.
    fn admit(
        &self,
        topic: &str,
        limit: usize,
    ) -> Result<Arc<Pipe>, PubSubError> {
        let closed = self.closed.read();
        let admitted = if *closed {
            Err(PubSubError::BrokerClosed)
        } else {
            self.register(topic, limit)
        };
        drop(closed);

        match admitted {
            Ok(pipe) => {
                self.subscriptions_admitted.fetch_add(1, Ordering::Relaxed);
                Ok(pipe)
            }
            Err(err) => {
                self.subscriptions_rejected.fetch_add(1, Ordering::Relaxed);
                debug!(topic, limit, error = %err, "Subscription rejected");
                Err(err)
            }
        }
    }

    /// Opens the stream on an admitted pipe and waits for it.
    async fn open<T>(
        &self,
        topic: &str,
        pipe: Arc<Pipe>,
        timeout: Duration,
    ) -> Result<EventStream<T>, PubSubError>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let result = launcher::launch::<T>(Arc::from(topic), pipe, timeout)
            .wait()
            .await;
        if result.is_err() {
            self.subscriptions_failed.fetch_add(1, Ordering::Relaxed);
        }
        result
    }

    fn register(
        &self,
        topic: &str,
        limit: usize,
    ) -> Result<Arc<Pipe>, PubSubError> {
        let pipe = Pipe::new(limit, self.timer.clone())
            .map(Arc::new)
            .map_err(|_| PubSubError::InvalidLimit { limit })?;
        let position = self
            .registry
            .add_subscriber(topic, pipe.clone(), self.auto_create_topics)?;
        debug!(
            topic,
            pipe = pipe.id(),
            limit,
            subscribers = position,
            "Subscriber admitted"
        );
        Ok(pipe)
    }

    ////////////////////////////////////////////////////////////////////////////////
    // Publish
    ////////////////////////////////////////////////////////////////////////////////

    /// Delivers `event` to every open subscriber of `topic`.
    ///
    /// Deliveries run concurrently; each waits at most `timeout` for room in
    /// its pipe. Closed pipes are dropped from the topic first.
    ///
    /// # Returns
    /// The number of subscribers the event was delivered to. Publishing to a
    /// missing topic with auto-creation on creates it and returns `Ok(0)`.
    ///
    /// # Errors
    /// - `BrokerClosed`, `NilEvent`, `Serialization`, `TopicNotFound`
    /// - `PublishFailed` if any delivery failed; carries the first failure
    pub async fn publish<E>(
        &self,
        topic: &str,
        event: E,
        timeout: Duration,
    ) -> Result<usize, PubSubError>
    where
        E: Serialize,
    {
        self.publish_count.fetch_add(1, Ordering::Relaxed);
        let result = self.deliver(topic, event, timeout).await;
        if let Err(err) = &result {
            self.publish_error_count.fetch_add(1, Ordering::Relaxed);
            debug!(
                topic,
                error = %err,
                tags = ?err.metrics_tags(),
                "Publish failed"
            );
        }
        result
    }

    async fn deliver<E>(
        &self,
        topic: &str,
        event: E,
        timeout: Duration,
    ) -> Result<usize, PubSubError>
    where
        E: Serialize,
    {
        self.ensure_open()?;
        let event = serde_json::to_value(event).map_err(|e| PubSubError::Serialization {
            reason: e.to_string(),
        })?;
        if event.is_null() {
            return Err(PubSubError::NilEvent);
        }

        let Some(pipes) = self.targets(topic)? else {
            return Ok(0);
        };
        let total = pipes.len();
        if total == 0 {
            return Ok(0);
        }

        let mut deliveries = JoinSet::new();
        for pipe in pipes {
            let event = event.clone();
            deliveries.spawn(async move {
                let id = pipe.id();
                pipe.produce(event, timeout)
                    .await
                    .map_err(|e: PipeError| (id, e))
            });
        }

        let mut failed = 0;
        let mut first_failure: Option<StackError> = None;
        while let Some(joined) = deliveries.join_next().await {
            let cause: StackError = match joined {
                Ok(Ok(())) => continue,
                Ok(Err((pipe, err))) => {
                    warn!(topic, pipe, error = %err, "Delivery failed");
                    err.into()
                }
                Err(join_err) => {
                    warn!(topic, error = %join_err, "Delivery task aborted");
                    GenericError::new(StatusCode::Internal, join_err.to_string()).into()
                }
            };
            failed += 1;
            first_failure.get_or_insert(cause);
        }

        match first_failure {
            None => {
                debug!(topic, delivered = total, "Event published");
                Ok(total)
            }
            Some(cause) => Err(PubSubError::PublishFailed {
                topic: topic.to_string(),
                failed,
                total,
                cause,
            }),
        }
    }

    /// Open pipes of `topic`, or `None` if the topic was just auto-created.
    fn targets(
        &self,
        topic: &str,
    ) -> Result<Option<Vec<Arc<Pipe>>>, PubSubError> {
        let closed = self.closed.read();
        if *closed {
            return Err(PubSubError::BrokerClosed);
        }
        match self.registry.open_subscribers(topic) {
            Some((pipes, pruned)) => {
                if pruned > 0 {
                    debug!(topic, pruned, "Dropped closed subscribers");
                }
                Ok(Some(pipes))
            }
            None if self.auto_create_topics => {
                self.registry.ensure_topic(topic);
                Ok(None)
            }
            None => Err(PubSubError::TopicNotFound {
                topic: topic.to_string(),
            }),
        }
    }

    ////////////////////////////////////////////////////////////////////////////////
    // Topics
    ////////////////////////////////////////////////////////////////////////////////

    /// Registers `topic` with no subscribers.
    ///
    /// # Errors
    /// - `BrokerClosed` if the broker was shut down
    /// - `TopicExists` if the topic is already registered
    pub fn create_topic(
        &self,
        topic: &str,
    ) -> Result<(), PubSubError> {
        let closed = self.closed.read();
        if *closed {
            return Err(PubSubError::BrokerClosed);
        }
        self.registry.create_topic(topic)?;
        debug!(topic, "Topic created");
        Ok(())
    }

    pub fn has_topic(
        &self,
        topic: &str,
    ) -> bool {
        self.registry.contains(topic)
    }

    /// Sorted names of all registered topics.
    pub fn topic_names(&self) -> Vec<String> {
        self.registry.topic_names()
    }

    pub fn subscriber_count(
        &self,
        topic: &str,
    ) -> usize {
        self.registry.subscriber_count(topic)
    }

    /// Pipe ids of the subscribers of `topic`, in subscription order.
    pub fn subscriber_ids(
        &self,
        topic: &str,
    ) -> Option<Vec<u64>> {
        self.registry.subscriber_ids(topic)
    }

    /// Timer shared by this broker's pipes.
    pub fn timer(&self) -> &Timer {
        &self.timer
    }

    pub fn auto_create_topics(&self) -> bool {
        self.auto_create_topics
    }

    ////////////////////////////////////////////////////////////////////////////////
    // Shutdown
    ////////////////////////////////////////////////////////////////////////////////

    pub fn is_closed(&self) -> bool {
        *self.closed.read()
    }

    /// Closes the broker and lets every subscriber drain its pipe for up to
    /// `timeout` before the pipe closes.
    ///
    /// # Errors
    /// `BrokerClosed` if the broker was already shut down.
    pub async fn graceful_shutdown(
        &self,
        timeout: Duration,
    ) -> Result<(), PubSubError> {
        let pipes = self.close()?;
        info!(
            pipes = pipes.len(),
            timeout_ms = timeout.as_millis() as u64,
            "Shutting down pubsub gracefully"
        );

        let mut closing = JoinSet::new();
        for pipe in pipes {
            closing.spawn(async move {
                // A stream may have closed its pipe already.
                if let Err(err) = pipe.graceful_close(timeout).await {
                    debug!(pipe = pipe.id(), error = %err, "Pipe already closed");
                }
            });
        }
        while closing.join_next().await.is_some() {}

        info!("Pubsub shut down");
        Ok(())
    }

    /// Closes the broker and every pipe at once, discarding buffered events.
    ///
    /// # Errors
    /// `BrokerClosed` if the broker was already shut down.
    pub fn force_shutdown(&self) -> Result<(), PubSubError> {
        let pipes = self.close()?;
        info!(pipes = pipes.len(), "Shutting down pubsub immediately");
        for pipe in pipes {
            pipe.immediate_close();
        }
        Ok(())
    }

    fn ensure_open(&self) -> Result<(), PubSubError> {
        if self.is_closed() {
            return Err(PubSubError::BrokerClosed);
        }
        Ok(())
    }

    /// Marks the broker closed and takes every registered pipe.
    fn close(&self) -> Result<Vec<Arc<Pipe>>, PubSubError> {
        let mut closed = self.closed.write();
        if *closed {
            return Err(PubSubError::BrokerClosed);
        }
        *closed = true;
        Ok(self.registry.drain())
    }
}

impl Default for PubSub {
    fn default() -> Self {
        Self::with_config(&BrokerConfig::default())
    }
}

impl std::fmt::Debug for PubSub {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("PubSub")
            .field("closed", &self.is_closed())
            .field("auto_create_topics", &self.auto_create_topics)
            .field("topics", &self.registry.len())
            .finish_non_exhaustive()
    }
}
