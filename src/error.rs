use std::fmt;

/// Returned when popping from an empty [`ConcurrentStack`](crate::ConcurrentStack).
///
/// The stack is left unchanged; retrying, logging or propagating is up to the
/// caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmptyContainerError;

impl std::error::Error for EmptyContainerError {}

impl fmt::Display for EmptyContainerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("empty stack")
    }
}

/// Terminal outcomes of the bounded blocking waits on
/// [`ConcurrentQueue`](crate::ConcurrentQueue).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueError {
    /// The deadline passed with no value available
    Timeout,
    /// The queue was closed and every queued value has been consumed
    Closed,
}

impl std::error::Error for QueueError {}

impl fmt::Display for QueueError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout => f.write_str("timed out waiting for a value"),
            Self::Closed => f.write_str("queue closed and drained"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        assert_eq!(EmptyContainerError.to_string(), "empty stack");
        assert_eq!(QueueError::Timeout.to_string(), "timed out waiting for a value");
        assert_eq!(QueueError::Closed.to_string(), "queue closed and drained");
    }

    #[test]
    fn test_errors_are_std_errors() {
        let boxed: Box<dyn std::error::Error> = Box::new(EmptyContainerError);
        assert_eq!(boxed.to_string(), "empty stack");
    }
}
