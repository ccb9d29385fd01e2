use std::sync::Arc;

use dashmap::{mapref::entry::Entry, DashMap};

use crate::{error::PubSubError, pipe::Pipe};

type TopicKey = Arc<str>;

/// Topic → subscriber pipes, in subscription order.
///
/// Every mutation of one topic's list happens under the write lock of the
/// map shard holding that topic, so concurrent appends to the same topic are
/// serialized and never lost. Different topics proceed independently.
#[derive(Debug, Default)]
pub struct TopicRegistry {
    topics: DashMap<TopicKey, Vec<Arc<Pipe>>>,
}

impl TopicRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `pipe` to the subscribers of `topic`.
    ///
    /// A missing topic is created with `pipe` as its only subscriber when
    /// `auto_create` is set, otherwise the call fails with `TopicNotFound` and
    /// nothing changes.
    ///
    /// Returns the number of subscribers of the topic after the append.
    pub fn add_subscriber(
        &self,
        topic: &str,
        pipe: Arc<Pipe>,
        auto_create: bool,
    ) -> Result<usize, PubSubError> {
        if let Some(mut pipes) = self.topics.get_mut(topic) {
            pipes.push(pipe);
            return Ok(pipes.len());
        }
        if !auto_create {
            return Err(PubSubError::TopicNotFound {
                topic: topic.to_string(),
            });
        }
        // The topic may have been created since the lookup above; the entry
        // API resolves that under the shard lock.
        let mut pipes = self.topics.entry(Arc::from(topic)).or_default();
        pipes.push(pipe);
        Ok(pipes.len())
    }

    /// Registers `topic` without subscribers.
    pub fn create_topic(
        &self,
        topic: &str,
    ) -> Result<(), PubSubError> {
        match self.topics.entry(Arc::from(topic)) {
            Entry::Occupied(_) => Err(PubSubError::TopicExists {
                topic: topic.to_string(),
            }),
            Entry::Vacant(slot) => {
                slot.insert(Vec::new());
                Ok(())
            }
        }
    }

    /// Registers `topic` without subscribers unless it already exists.
    pub fn ensure_topic(
        &self,
        topic: &str,
    ) {
        if !self.topics.contains_key(topic) {
            self.topics.entry(Arc::from(topic)).or_default();
        }
    }

    pub fn contains(
        &self,
        topic: &str,
    ) -> bool {
        self.topics.contains_key(topic)
    }

    /// Snapshot of the subscribers of `topic`, oldest first.
    pub fn subscribers(
        &self,
        topic: &str,
    ) -> Option<Vec<Arc<Pipe>>> {
        self.topics.get(topic).map(|pipes| pipes.clone())
    }

    /// Pipe ids of the subscribers of `topic`, oldest first.
    pub fn subscriber_ids(
        &self,
        topic: &str,
    ) -> Option<Vec<u64>> {
        self.topics
            .get(topic)
            .map(|pipes| pipes.iter().map(|p| p.id()).collect())
    }

    /// Number of subscribers of `topic`, `0` for unknown topics.
    pub fn subscriber_count(
        &self,
        topic: &str,
    ) -> usize {
        self.topics.get(topic).map_or(0, |pipes| pipes.len())
    }

    /// Drops closed pipes from `topic` and returns the remaining ones together
    /// with the number of pipes removed.
    pub fn open_subscribers(
        &self,
        topic: &str,
    ) -> Option<(Vec<Arc<Pipe>>, usize)> {
        let mut pipes = self.topics.get_mut(topic)?;
        let before = pipes.len();
        pipes.retain(|p| !p.is_closed());
        let pruned = before - pipes.len();
        Some((pipes.clone(), pruned))
    }

    /// Sorted topic names.
    pub fn topic_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.topics.iter().map(|e| e.key().to_string()).collect();
        names.sort();
        names
    }

    /// Number of topics.
    pub fn len(&self) -> usize {
        self.topics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.topics.is_empty()
    }

    /// Removes every topic and returns all pipes that were registered.
    pub fn drain(&self) -> Vec<Arc<Pipe>> {
        let keys: Vec<TopicKey> = self.topics.iter().map(|e| e.key().clone()).collect();
        let mut pipes = Vec::new();
        for key in keys {
            if let Some((_, list)) = self.topics.remove(&key) {
                pipes.extend(list);
            }
        }
        pipes
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use proptest::prelude::*;

    use super::*;
    use crate::timer::Timer;

    fn pipe() -> Arc<Pipe> {
        Arc::new(Pipe::new(4, Timer::new()).unwrap())
    }

    #[test]
    fn test_missing_topic_without_auto_create() {
        let registry = TopicRegistry::new();

        let err = registry
            .add_subscriber("invoices", pipe(), false)
            .unwrap_err();

        assert!(matches!(err, PubSubError::TopicNotFound { ref topic } if topic == "invoices"));
        assert!(!registry.contains("invoices"));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_missing_topic_with_auto_create() {
        let registry = TopicRegistry::new();
        let p = pipe();

        let len = registry.add_subscriber("orders", p.clone(), true).unwrap();

        assert_eq!(len, 1);
        assert_eq!(registry.subscriber_ids("orders"), Some(vec![p.id()]));
    }

    #[test]
    fn test_append_preserves_order() {
        let registry = TopicRegistry::new();
        registry.create_topic("orders").unwrap();
        let (a, b, c) = (pipe(), pipe(), pipe());

        for p in [&a, &b, &c] {
            registry.add_subscriber("orders", p.clone(), false).unwrap();
        }

        assert_eq!(
            registry.subscriber_ids("orders"),
            Some(vec![a.id(), b.id(), c.id()])
        );
    }

    #[test]
    fn test_create_topic_twice() {
        let registry = TopicRegistry::new();
        registry.create_topic("orders").unwrap();

        let err = registry.create_topic("orders").unwrap_err();

        assert!(matches!(err, PubSubError::TopicExists { .. }));
        assert_eq!(registry.subscriber_count("orders"), 0);
    }

    #[test]
    fn test_ensure_topic_keeps_subscribers() {
        let registry = TopicRegistry::new();
        registry.add_subscriber("orders", pipe(), true).unwrap();

        registry.ensure_topic("orders");
        registry.ensure_topic("invoices");

        assert_eq!(registry.subscriber_count("orders"), 1);
        assert_eq!(registry.subscriber_count("invoices"), 0);
        assert_eq!(registry.topic_names(), vec!["invoices", "orders"]);
    }

    #[test]
    fn test_open_subscribers_prunes_closed_pipes() {
        let registry = TopicRegistry::new();
        let (a, b) = (pipe(), pipe());
        registry.add_subscriber("orders", a.clone(), true).unwrap();
        registry.add_subscriber("orders", b.clone(), true).unwrap();
        a.immediate_close();

        let (open, pruned) = registry.open_subscribers("orders").unwrap();

        assert_eq!(pruned, 1);
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].id(), b.id());
        assert_eq!(registry.subscriber_ids("orders"), Some(vec![b.id()]));
        assert!(registry.open_subscribers("missing").is_none());
    }

    #[test]
    fn test_drain_empties_registry() {
        let registry = TopicRegistry::new();
        registry.add_subscriber("a", pipe(), true).unwrap();
        registry.add_subscriber("a", pipe(), true).unwrap();
        registry.add_subscriber("b", pipe(), true).unwrap();
        registry.create_topic("c").unwrap();

        let pipes = registry.drain();

        assert_eq!(pipes.len(), 3);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_concurrent_appends_are_not_lost() {
        let registry = Arc::new(TopicRegistry::new());
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let registry = registry.clone();
                std::thread::spawn(move || {
                    let p = pipe();
                    let id = p.id();
                    registry.add_subscriber("hot", p, true).unwrap();
                    id
                })
            })
            .collect();
        let mut expected: Vec<u64> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        let mut actual = registry.subscriber_ids("hot").unwrap();
        expected.sort_unstable();
        actual.sort_unstable();
        assert_eq!(actual, expected);
    }

    proptest! {
        /// Each topic keeps its subscribers in the order they were added,
        /// whatever the interleaving with other topics.
        #[test]
        fn prop_per_topic_order_is_insertion_order(
            topics in prop::collection::vec(0usize..4, 1..40)
        ) {
            let registry = TopicRegistry::new();
            let mut expected: HashMap<String, Vec<u64>> = HashMap::new();

            for t in topics {
                let name = format!("topic-{t}");
                let p = pipe();
                expected.entry(name.clone()).or_default().push(p.id());
                registry.add_subscriber(&name, p, true).unwrap();
            }

            prop_assert_eq!(registry.len(), expected.len());
            for (name, ids) in expected {
                prop_assert_eq!(registry.subscriber_ids(&name), Some(ids));
            }
        }
    }
}
