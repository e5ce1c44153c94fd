//! Lock-based concurrent containers for producer/consumer pipelines.
//!
//! * [`ConcurrentStack`] serializes every operation behind one mutex and
//!   reports pop-on-empty as [`EmptyContainerError`].
//! * [`ConcurrentQueue`] locks its head and tail separately so producers and
//!   consumers do not contend, and offers non-blocking, blocking, closable and
//!   deadline-bounded pops.

mod error;
pub mod queue;
pub mod stack;
mod sync;

pub use error::{EmptyContainerError, QueueError};
pub use queue::ConcurrentQueue;
pub use stack::ConcurrentStack;
