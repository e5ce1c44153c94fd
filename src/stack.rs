use std::fmt;

use tracing::trace;

use crate::error::EmptyContainerError;
use crate::sync::{recover, Mutex, MutexGuard};

/// A LIFO stack guarded by a single mutex
///
/// Every operation, reads included, runs under the one lock, so all
/// operations on a given stack are totally ordered.
///
/// # Type Parameters
/// * `T`: The type of values stored in the stack
///
/// # Examples
/// ```
/// use lockstep::ConcurrentStack;
///
/// let stack = ConcurrentStack::new();
/// stack.push(1);
/// stack.push(2);
/// assert_eq!(stack.pop(), Ok(2));
/// assert_eq!(stack.pop(), Ok(1));
/// assert!(stack.pop().is_err());
/// ```
pub struct ConcurrentStack<T> {
    data: Mutex<Vec<T>>,
}

impl<T> Default for ConcurrentStack<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ConcurrentStack<T> {
    /// Creates a new empty stack
    pub fn new() -> Self {
        Self {
            data: Mutex::new(Vec::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<T>> {
        recover(self.data.lock())
    }

    /// Pushes a value onto the top of the stack
    pub fn push(&self, value: T) {
        let mut data = self.lock();
        data.push(value);
        trace!(len = data.len(), "stack push");
    }

    /// Removes and returns the top element
    ///
    /// # Returns
    /// * `Ok(T)` with the most recently pushed value
    /// * `Err(EmptyContainerError)` if the stack was empty; the stack is left
    ///   unchanged
    pub fn pop(&self) -> Result<T, EmptyContainerError> {
        let mut data = self.lock();
        let value = data.pop().ok_or(EmptyContainerError)?;
        trace!(len = data.len(), "stack pop");
        Ok(value)
    }

    /// Removes the top element and writes it into `out`
    ///
    /// Same contract as [`pop`](Self::pop), reusing caller-supplied storage.
    /// On error `out` is not touched.
    pub fn pop_into(&self, out: &mut T) -> Result<(), EmptyContainerError> {
        *out = self.pop()?;
        Ok(())
    }

    /// Removes and returns the top element, or `None` if the stack is empty
    pub fn try_pop(&self) -> Option<T> {
        self.pop().ok()
    }

    /// Returns true if the stack is empty
    ///
    /// Note: a concurrent push or pop may change the answer as soon as this
    /// returns, so a `false` here does not guarantee the next pop succeeds.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Returns the number of elements currently on the stack
    pub fn len(&self) -> usize {
        self.lock().len()
    }
}

impl<T: Clone> ConcurrentStack<T> {
    /// Returns a copy of the top element without removing it
    pub fn peek(&self) -> Option<T> {
        self.lock().last().cloned()
    }
}

impl<T: Clone> Clone for ConcurrentStack<T> {
    /// Copies the stack while holding the source's lock
    ///
    /// The copy reflects a single instant of the source and gets its own lock.
    fn clone(&self) -> Self {
        let data = self.lock().clone();
        Self {
            data: Mutex::new(data),
        }
    }
}

impl<T> From<Vec<T>> for ConcurrentStack<T> {
    /// The last element of the vector becomes the top of the stack
    fn from(data: Vec<T>) -> Self {
        Self {
            data: Mutex::new(data),
        }
    }
}

impl<T> FromIterator<T> for ConcurrentStack<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self::from(iter.into_iter().collect::<Vec<_>>())
    }
}

impl<T> fmt::Debug for ConcurrentStack<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConcurrentStack")
            .field("len", &self.len())
            .finish()
    }
}
