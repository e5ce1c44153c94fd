use crossbeam_utils::CachePadded;
use std::fmt;
use std::ptr;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

use crate::error::QueueError;
use crate::sync::{recover, AtomicUsize, Condvar, Mutex, MutexGuard};

/// A cell in the queue's chain
///
/// Each node is owned by its predecessor (the first one by the queue's head).
/// Every node except the current tail carries a value.
struct Node<T> {
    /// The queued value, `None` for the trailing dummy node
    data: Option<T>,
    /// Owning pointer to the next node, null for the tail
    next: *mut Node<T>,
}

impl<T> Node<T> {
    fn dummy() -> *mut Self {
        Box::into_raw(Box::new(Self {
            data: None,
            next: ptr::null_mut(),
        }))
    }
}

/// State guarded by the head lock
struct Head<T> {
    node: *mut Node<T>,
    closed: bool,
}

/// A FIFO queue with separate locks for the head and the tail
///
/// Producers only take the tail lock and consumers only take the head lock,
/// so a push and a pop run concurrently. The chain always ends in an empty
/// dummy node; the queue is empty exactly when head and tail point at the
/// same node.
///
/// # Lock ordering
///
/// When an operation needs both locks, the head lock is taken first and the
/// tail lock is held only long enough to read the tail pointer. `push` never
/// takes the head lock while holding the tail lock.
///
/// # Examples
/// ```
/// use lockstep::ConcurrentQueue;
///
/// let queue = ConcurrentQueue::new();
/// queue.push(1);
/// queue.push(2);
/// assert_eq!(queue.try_pop().as_deref(), Some(&1));
/// assert_eq!(*queue.wait_and_pop(), 2);
/// assert!(queue.try_pop().is_none());
/// ```
pub struct ConcurrentQueue<T> {
    head: CachePadded<Mutex<Head<T>>>,
    tail: CachePadded<Mutex<*mut Node<T>>>,
    data_cond: Condvar,
    /// Consumers inside a blocking wait, including those still checking
    /// the predicate before parking
    waiters: AtomicUsize,
}

// SAFETY: nodes are only reached through the head or tail mutex, and values
// move between threads only by being pushed and popped.
unsafe impl<T: Send> Send for ConcurrentQueue<T> {}
unsafe impl<T: Send> Sync for ConcurrentQueue<T> {}

impl<T> Default for ConcurrentQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Keeps `waiters` accurate on every exit from a blocking wait.
struct WaiterGuard<'a>(&'a AtomicUsize);

impl<'a> WaiterGuard<'a> {
    fn register(waiters: &'a AtomicUsize) -> Self {
        waiters.fetch_add(1, Ordering::SeqCst);
        Self(waiters)
    }
}

impl Drop for WaiterGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl<T> ConcurrentQueue<T> {
    /// Creates a new empty queue holding a single dummy node.
    pub fn new() -> Self {
        let dummy = Node::dummy();
        Self {
            head: CachePadded::new(Mutex::new(Head {
                node: dummy,
                closed: false,
            })),
            tail: CachePadded::new(Mutex::new(dummy)),
            data_cond: Condvar::new(),
            waiters: AtomicUsize::new(0),
        }
    }

    fn lock_head(&self) -> MutexGuard<'_, Head<T>> {
        recover(self.head.lock())
    }

    /// Reads the tail pointer, holding the tail lock only for the read.
    fn tail(&self) -> *mut Node<T> {
        *recover(self.tail.lock())
    }

    /// Adds a value to the back of the queue and wakes one waiting consumer.
    pub fn push(&self, value: T) {
        let new_tail = Node::dummy();
        {
            let mut tail = recover(self.tail.lock());
            // SAFETY: the tail node is live and, while head == tail, no
            // consumer dereferences it, so only the tail lock holder writes it.
            unsafe {
                (**tail).data = Some(value);
                (**tail).next = new_tail;
            }
            *tail = new_tail;
        }
        trace!("queue push");

        if self.waiters.load(Ordering::SeqCst) > 0 {
            // A consumer may sit between its emptiness check and parking on
            // the condvar. Cycling the head lock waits it out so the
            // notification is not lost.
            drop(self.lock_head());
            self.data_cond.notify_one();
        }
    }

    /// Unlinks the front node if the queue is non-empty. Requires the head lock.
    fn pop_locked(&self, head: &mut Head<T>) -> Option<T> {
        if head.node == self.tail() {
            return None;
        }
        // SAFETY: head != tail, so the head node was completed by a push that
        // released the tail lock before we read the tail. No producer touches
        // it again, and we hold the head lock, so we own it exclusively.
        let old_head = unsafe { Box::from_raw(head.node) };
        head.node = old_head.next;
        old_head.data
    }

    /// Removes and returns the front value without blocking.
    ///
    /// Returns `None` if the queue is empty.
    pub fn try_pop(&self) -> Option<Arc<T>> {
        let value = {
            let mut head = self.lock_head();
            self.pop_locked(&mut head)
        };
        trace!(hit = value.is_some(), "queue try_pop");
        value.map(Arc::new)
    }

    /// Removes the front value into `out` without blocking.
    ///
    /// Returns `false`, leaving `out` untouched, if the queue is empty.
    pub fn try_pop_into(&self, out: &mut T) -> bool {
        let value = {
            let mut head = self.lock_head();
            self.pop_locked(&mut head)
        };
        match value {
            Some(value) => {
                *out = value;
                true
            }
            None => false,
        }
    }

    /// Blocks until the queue is non-empty, then removes the front value.
    fn wait_pop(&self) -> T {
        let _waiter = WaiterGuard::register(&self.waiters);
        let mut head = self.lock_head();
        loop {
            if let Some(value) = self.pop_locked(&mut head) {
                return value;
            }
            head = recover(self.data_cond.wait(head));
        }
    }

    /// Removes and returns the front value, blocking until one is available.
    ///
    /// This waits indefinitely, even after [`close`](Self::close). Use
    /// [`wait_and_pop_until_closed`](Self::wait_and_pop_until_closed) or
    /// [`wait_and_pop_timeout`](Self::wait_and_pop_timeout) when consumers
    /// need a way out.
    pub fn wait_and_pop(&self) -> Arc<T> {
        let value = self.wait_pop();
        trace!("queue wait_and_pop");
        Arc::new(value)
    }

    /// Blocking variant of [`try_pop_into`](Self::try_pop_into).
    pub fn wait_and_pop_into(&self, out: &mut T) {
        *out = self.wait_pop();
    }

    /// Waits for a value until the queue is closed and drained, or the
    /// optional deadline passes.
    fn wait_pop_bounded(&self, deadline: Option<Instant>) -> Result<T, QueueError> {
        let _waiter = WaiterGuard::register(&self.waiters);
        let mut head = self.lock_head();
        loop {
            if let Some(value) = self.pop_locked(&mut head) {
                return Ok(value);
            }
            if head.closed {
                return Err(QueueError::Closed);
            }
            head = match deadline {
                None => recover(self.data_cond.wait(head)),
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Err(QueueError::Timeout);
                    }
                    recover(self.data_cond.wait_timeout(head, deadline - now)).0
                }
            };
        }
    }

    /// Removes and returns the front value, blocking until one is available
    /// or the queue is closed.
    ///
    /// # Returns
    /// * `Ok(Arc<T>)` with the front value
    /// * `Err(QueueError::Closed)` once the queue is closed and empty
    pub fn wait_and_pop_until_closed(&self) -> Result<Arc<T>, QueueError> {
        let result = self.wait_pop_bounded(None);
        if result.is_err() {
            debug!("queue wait ended: closed");
        }
        result.map(Arc::new)
    }

    /// Removes and returns the front value, waiting at most `timeout`.
    ///
    /// # Returns
    /// * `Ok(Arc<T>)` with the front value
    /// * `Err(QueueError::Timeout)` if nothing arrived in time
    /// * `Err(QueueError::Closed)` once the queue is closed and empty
    pub fn wait_and_pop_timeout(&self, timeout: Duration) -> Result<Arc<T>, QueueError> {
        // A deadline past the clock's range is as good as none
        let deadline = Instant::now().checked_add(timeout);
        let result = self.wait_pop_bounded(deadline);
        if let Err(err) = &result {
            debug!(?timeout, %err, "queue wait ended");
        }
        result.map(Arc::new)
    }

    /// Closes the queue and wakes every consumer blocked in a closable wait.
    ///
    /// Pushing is still allowed and queued values can still be popped;
    /// closable waits return [`QueueError::Closed`] once nothing is left.
    /// Closing twice has no further effect.
    pub fn close(&self) {
        {
            let mut head = self.lock_head();
            if head.closed {
                return;
            }
            head.closed = true;
        }
        debug!("queue closed");
        self.data_cond.notify_all();
    }

    /// Returns true once [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.lock_head().closed
    }

    /// Returns true if the queue is empty.
    ///
    /// Note: Due to concurrent operations, the answer may change
    /// immediately after this call returns.
    pub fn is_empty(&self) -> bool {
        let head = self.lock_head();
        head.node == self.tail()
    }
}

impl<T> Drop for ConcurrentQueue<T> {
    fn drop(&mut self) {
        let mut current = self.lock_head().node;
        while !current.is_null() {
            // SAFETY: we have exclusive access, and every node in the chain,
            // the dummy included, was allocated by `Node::dummy` and is owned
            // by its predecessor.
            let node = unsafe { Box::from_raw(current) };
            current = node.next;
        }
    }
}

impl<T> fmt::Debug for ConcurrentQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConcurrentQueue")
            .field("empty", &self.is_empty())
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}
