//! Batch ordering policy.

use crate::domain::entities::ImageInput;

/// Items with a declared byte size.
pub trait ByteSized {
    /// Size in bytes used for ordering.
    fn byte_size(&self) -> u64;
}

impl ByteSized for ImageInput {
    fn byte_size(&self) -> u64 {
        self.size()
    }
}

impl<T: ByteSized> ByteSized for &T {
    fn byte_size(&self) -> u64 {
        (**self).byte_size()
    }
}

/// Sorts items ascending by size so small items finish first under bounded
/// concurrency. The sort is stable: equal sizes keep their input order.
#[must_use]
pub fn order_by_size<T: ByteSized>(mut items: Vec<T>) -> Vec<T> {
    items.sort_by_key(|item| item.byte_size());
    items
}
