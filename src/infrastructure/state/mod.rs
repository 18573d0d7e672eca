//! Batch state tracking.

pub mod ordered_map;
pub mod store;

pub use ordered_map::OrderedMap;
pub use store::{StateStore, StoreSummary, SubscriptionId};
