use thiserror::Error;

/// Returned when feeding a [`buffer`](crate::buffer()) fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FeedError {
    #[error("the buffer has already been resolved or rejected")]
    Terminated,
}
