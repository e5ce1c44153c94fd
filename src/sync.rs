//! Synchronization primitives used by the containers.
//!
//! Under `--cfg loom` these resolve to loom's model-checked versions so the
//! queue's lock protocol can be explored exhaustively:
//!
//! ```bash
//! RUSTFLAGS="--cfg loom" cargo test --test loom_queue --release
//! ```

#[cfg(loom)]
pub(crate) use loom::sync::atomic::AtomicUsize;
#[cfg(loom)]
pub(crate) use loom::sync::{Condvar, Mutex, MutexGuard};

#[cfg(not(loom))]
pub(crate) use std::sync::atomic::AtomicUsize;
#[cfg(not(loom))]
pub(crate) use std::sync::{Condvar, Mutex, MutexGuard};

use std::sync::{LockResult, PoisonError};

/// Unwraps a lock result, recovering the guard if a previous holder panicked.
///
/// Every critical section in this crate finishes its writes before any point
/// that can panic, so the protected state is consistent even when poisoned.
pub(crate) fn recover<G>(result: LockResult<G>) -> G {
    result.unwrap_or_else(PoisonError::into_inner)
}
