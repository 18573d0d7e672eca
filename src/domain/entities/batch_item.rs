//! Per-item state tracked through a batch run.

use uuid::Uuid;

use crate::domain::errors::ProcessingError;

/// Unique identifier for a batch item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemId(Uuid);

impl ItemId {
    /// Generates a new random id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// The underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for ItemId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ItemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for ItemId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

/// Opaque reference to bytes held by a resource registry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceHandle(String);

impl ResourceHandle {
    /// Wraps a registry URI.
    #[must_use]
    pub fn new(uri: impl Into<String>) -> Self {
        Self(uri.into())
    }

    /// The registry URI.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ResourceHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Processing status of a batch item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ItemStatus {
    /// Accepted, waiting for a concurrency slot.
    #[default]
    Pending,
    /// Dispatched to the codec or decoder.
    Processing,
    /// Finished successfully.
    Completed,
    /// Failed, or cancelled before it started.
    Error,
}

impl ItemStatus {
    /// Returns true for `Completed` and `Error`.
    #[must_use]
    pub const fn is_finished(self) -> bool {
        matches!(self, Self::Completed | Self::Error)
    }
}

impl std::fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Processing => write!(f, "processing"),
            Self::Completed => write!(f, "completed"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Tracked state of one input in a batch.
///
/// Records are immutable values: every change goes through
/// [`BatchItemRecord::apply`], which returns a new record.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchItemRecord {
    /// Unique id.
    pub id: ItemId,
    /// Name shown to the user.
    pub display_name: String,
    /// Size of the source in bytes.
    pub original_size: u64,
    /// Size of the produced bytes, 0 until completed.
    pub result_size: u64,
    /// Handle to the source bytes.
    pub original_handle: ResourceHandle,
    /// Handle to the produced bytes, set on completion of a transform.
    pub result_handle: Option<ResourceHandle>,
    /// Current status.
    pub status: ItemStatus,
    /// Quality requested for this item, 0-100.
    pub requested_quality: u8,
    /// Failure cause when `status` is `Error`.
    pub error: Option<ProcessingError>,
}

impl BatchItemRecord {
    /// Creates a pending record.
    #[must_use]
    pub fn pending(
        id: ItemId,
        display_name: impl Into<String>,
        original_size: u64,
        original_handle: ResourceHandle,
        requested_quality: u8,
    ) -> Self {
        Self {
            id,
            display_name: display_name.into(),
            original_size,
            result_size: 0,
            original_handle,
            result_handle: None,
            status: ItemStatus::Pending,
            requested_quality,
            error: None,
        }
    }

    /// Returns a new record with the patch applied.
    #[must_use]
    pub fn apply(&self, patch: RecordPatch) -> Self {
        let mut next = self.clone();
        if let Some(status) = patch.status {
            next.status = status;
        }
        if let Some(size) = patch.result_size {
            next.result_size = size;
        }
        if let Some(handle) = patch.result_handle {
            next.result_handle = Some(handle);
        }
        if let Some(error) = patch.error {
            next.error = Some(error);
        }
        next
    }

    /// All handles owned by this record.
    pub fn handles(&self) -> impl Iterator<Item = &ResourceHandle> {
        std::iter::once(&self.original_handle).chain(self.result_handle.as_ref())
    }

    /// Returns true if the item never started because its batch was aborted.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.error.as_ref().is_some_and(ProcessingError::is_cancelled)
    }
}

/// Partial update for a [`BatchItemRecord`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordPatch {
    /// New status.
    pub status: Option<ItemStatus>,
    /// Size of the produced bytes.
    pub result_size: Option<u64>,
    /// Handle to the produced bytes.
    pub result_handle: Option<ResourceHandle>,
    /// Failure cause.
    pub error: Option<ProcessingError>,
}

impl RecordPatch {
    /// Patch that only changes the status.
    #[must_use]
    pub fn status(status: ItemStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    /// Patch for a successful transform.
    #[must_use]
    pub fn transformed(handle: ResourceHandle, size: u64) -> Self {
        Self {
            status: Some(ItemStatus::Completed),
            result_size: Some(size),
            result_handle: Some(handle),
            error: None,
        }
    }

    /// Patch for a failed or cancelled item.
    #[must_use]
    pub fn failed(error: ProcessingError) -> Self {
        Self {
            status: Some(ItemStatus::Error),
            error: Some(error),
            ..Self::default()
        }
    }
}
