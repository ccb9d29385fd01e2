//! Bounded per-subscriber pipes.
//!
//! Every subscription owns one [`Pipe`]: a FIFO of JSON events with a fixed
//! capacity. The publish side produces into it, the subscriber reads from it
//! through an [`EventStream`] that decodes each event into the element type
//! requested at subscription time.
//!
//! - `queue`: the pipe itself (produce, consume, close).
//! - `stream`: typed stream over a pipe.

pub mod queue;
pub mod stream;

pub use queue::*;
pub use stream::*;
