//! Cooperative cancellation for batch runs.

use std::future::Future;

use futures_util::stream::Stream;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::domain::errors::ProcessingError;

use super::limiter::ConcurrencyLimiter;

/// Tracks the cancellation token of an owner's live batch.
///
/// Each [`begin`](Self::begin) replaces the tracked token, so
/// [`abort`](Self::abort) only ever reaches the most recent batch.
#[derive(Debug, Default)]
pub struct BatchController {
    current: Mutex<CancellationToken>,
}

impl BatchController {
    /// Creates a controller with no batch started.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a fresh token and makes it the tracked one.
    pub fn begin(&self) -> CancellationToken {
        let token = CancellationToken::new();
        *self.current.lock() = token.clone();
        token
    }

    /// Cancels the tracked token. Items not yet dispatched will be marked
    /// cancelled; in-flight items finish normally.
    pub fn abort(&self) {
        let token = self.current.lock();
        if token.is_cancelled() {
            debug!("Batch already aborted");
            return;
        }
        token.cancel();
        info!("Batch abort requested");
    }

    /// Returns true if the tracked token has been cancelled.
    #[must_use]
    pub fn is_aborted(&self) -> bool {
        self.current.lock().is_cancelled()
    }
}

/// A concurrency-limited run that stops dispatching once its token fires.
#[derive(Debug, Clone)]
pub struct AbortableBatch {
    limiter: ConcurrencyLimiter,
    token: CancellationToken,
}

impl AbortableBatch {
    /// Pairs a limiter with the token that stops dispatch.
    #[must_use]
    pub const fn new(limiter: ConcurrencyLimiter, token: CancellationToken) -> Self {
        Self { limiter, token }
    }

    /// Drains `items` through `worker`, yielding `(input_index, result)`.
    ///
    /// The token is checked when an item reaches the front of the queue; if
    /// it has fired, `worker` is never called for that item and it yields
    /// `ProcessingError::Cancelled`. Running workers are not interrupted.
    pub fn run<T, R, F, Fut>(
        self,
        items: Vec<T>,
        mut worker: F,
    ) -> impl Stream<Item = (usize, Result<R, ProcessingError>)>
    where
        F: FnMut(T) -> Fut,
        Fut: Future<Output = Result<R, ProcessingError>>,
    {
        let token = self.token;
        self.limiter.run(items, move |item| {
            let job = (!token.is_cancelled()).then(|| worker(item));
            async move {
                match job {
                    Some(job) => job.await,
                    None => Err(ProcessingError::Cancelled),
                }
            }
        })
    }
}
