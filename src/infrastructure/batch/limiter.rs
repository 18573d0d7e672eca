//! Bounded-concurrency batch runner.

use std::future::Future;
use std::num::NonZeroUsize;

use futures_util::stream::{self, Stream, StreamExt};

use crate::domain::errors::BatchError;

/// Runs independent async jobs with at most `limit` in flight.
///
/// Jobs are started lazily as the returned stream is polled: whenever a job
/// settles, the next poll starts the next pending item. Results arrive in
/// completion order tagged with the item's input index; one failure never
/// prevents the rest from running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConcurrencyLimiter {
    limit: NonZeroUsize,
}

impl ConcurrencyLimiter {
    /// Creates a limiter.
    ///
    /// # Errors
    /// Returns `BatchError::InvalidConcurrency` if `limit` is zero.
    pub fn new(limit: usize) -> Result<Self, BatchError> {
        NonZeroUsize::new(limit)
            .map(|limit| Self { limit })
            .ok_or(BatchError::InvalidConcurrency { limit })
    }

    /// Maximum number of items in flight.
    #[must_use]
    pub const fn limit(self) -> usize {
        self.limit.get()
    }

    /// Drains `items` through `worker`, yielding `(input_index, result)`.
    pub fn run<T, R, E, F, Fut>(
        self,
        items: Vec<T>,
        mut worker: F,
    ) -> impl Stream<Item = (usize, Result<R, E>)>
    where
        F: FnMut(T) -> Fut,
        Fut: Future<Output = Result<R, E>>,
    {
        stream::iter(items.into_iter().enumerate())
            .map(move |(index, item)| {
                let job = worker(item);
                async move { (index, job.await) }
            })
            .buffer_unordered(self.limit.get())
    }
}
