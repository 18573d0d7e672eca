//! Port definition for byte resources referenced by handles.

use bytes::Bytes;

use crate::domain::entities::ResourceHandle;

/// Registry of byte buffers addressed by opaque handles.
///
/// All methods are synchronous: releasing a handle must complete before the
/// record owning it disappears.
pub trait ResourcePort: Send + Sync {
    /// Stores bytes and returns a handle to them.
    fn register(&self, bytes: Bytes) -> ResourceHandle;

    /// Returns the bytes behind a handle, if it is still live.
    fn resolve(&self, handle: &ResourceHandle) -> Option<Bytes>;

    /// Frees the bytes behind a handle. Releasing twice is a no-op.
    fn release(&self, handle: &ResourceHandle);
}
