//! In-memory resource registry.

use std::collections::HashMap;

use bytes::Bytes;
use parking_lot::RwLock;
use tracing::trace;
use uuid::Uuid;

use crate::domain::entities::ResourceHandle;
use crate::domain::ports::ResourcePort;

const HANDLE_SCHEME: &str = "blob:imagepress/";

/// Holds registered bytes in memory until their handle is released.
#[derive(Debug, Default)]
pub struct InMemoryResources {
    buffers: RwLock<HashMap<ResourceHandle, Bytes>>,
}

impl InMemoryResources {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live handles.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buffers.read().len()
    }

    /// Returns true if no handle is live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total bytes held by live handles.
    #[must_use]
    pub fn retained_bytes(&self) -> usize {
        self.buffers.read().values().map(Bytes::len).sum()
    }
}

impl ResourcePort for InMemoryResources {
    fn register(&self, bytes: Bytes) -> ResourceHandle {
        let handle = ResourceHandle::new(format!("{HANDLE_SCHEME}{}", Uuid::new_v4()));
        trace!(handle = %handle, size = bytes.len(), "Registered resource");
        self.buffers.write().insert(handle.clone(), bytes);
        handle
    }

    fn resolve(&self, handle: &ResourceHandle) -> Option<Bytes> {
        self.buffers.read().get(handle).cloned()
    }

    fn release(&self, handle: &ResourceHandle) {
        if self.buffers.write().remove(handle).is_some() {
            trace!(handle = %handle, "Released resource");
        }
    }
}
