//! Publish–subscribe core.
//!
//! - `broker`: the [`PubSub`] front door: admission, publish, shutdown.
//! - `registry`: topic → subscriber pipes, in subscription order.
//! - `launcher`: runs each subscription's consumption call on its own task.
//! - `bridge`: single-assignment hand-off of the task's result back to the
//!   subscribing caller.

pub mod bridge;
pub mod broker;
pub mod launcher;
pub mod registry;

pub use bridge::{PendingSubscription, SubscriptionCallback, TaskOutcome};
pub use broker::PubSub;
pub use registry::TopicRegistry;
