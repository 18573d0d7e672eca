//! Batch execution infrastructure.
//!
//! This module provides:
//! - Size-based batch ordering
//! - A bounded-concurrency runner
//! - Cooperative cancellation checked at dispatch time

pub mod abort;
pub mod limiter;
pub mod ordering;

pub use abort::{AbortableBatch, BatchController};
pub use limiter::ConcurrencyLimiter;
pub use ordering::{ByteSized, order_by_size};
