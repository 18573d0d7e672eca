//! Observable store of batch item records.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use crate::domain::entities::{BatchItemRecord, ItemId, ItemStatus, RecordPatch, ResourceHandle};
use crate::domain::errors::BatchError;
use crate::domain::ports::ResourcePort;

use super::ordered_map::OrderedMap;

type Subscriber = Box<dyn Fn(&[BatchItemRecord]) + Send + Sync>;

/// Identifies a subscription for [`StateStore::unsubscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Aggregate view over the store's records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StoreSummary {
    /// Records waiting for dispatch.
    pub pending: usize,
    /// Records in flight.
    pub processing: usize,
    /// Records that finished successfully.
    pub completed: usize,
    /// Records that failed or were cancelled.
    pub failed: usize,
    /// Sum of source sizes across completed items.
    pub original_bytes: u64,
    /// Sum of result sizes across completed items.
    pub result_bytes: u64,
}

impl StoreSummary {
    /// Bytes saved by completed items; negative if results grew.
    #[must_use]
    #[allow(clippy::cast_possible_wrap)]
    pub const fn saved_bytes(&self) -> i64 {
        self.original_bytes as i64 - self.result_bytes as i64
    }

    /// Savings relative to the completed originals, as a percentage.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn savings_percent(&self) -> f64 {
        if self.original_bytes == 0 {
            0.0
        } else {
            self.saved_bytes() as f64 / self.original_bytes as f64 * 100.0
        }
    }
}

struct StoreInner {
    records: OrderedMap<ItemId, BatchItemRecord>,
    subscribers: Vec<(SubscriptionId, Subscriber)>,
    next_subscription: u64,
    closed: bool,
}

impl StoreInner {
    fn snapshot(&self) -> Vec<BatchItemRecord> {
        self.records.values().cloned().collect()
    }

    fn notify(&self) {
        if self.subscribers.is_empty() {
            return;
        }
        let snapshot = self.snapshot();
        for (_, subscriber) in &self.subscribers {
            subscriber(&snapshot);
        }
    }

    const fn ensure_open(&self) -> Result<(), BatchError> {
        if self.closed {
            Err(BatchError::StoreClosed)
        } else {
            Ok(())
        }
    }
}

/// Ordered map of item id to record, with change notification.
///
/// Records keep their insertion order across removals. Every mutation is
/// applied and broadcast to subscribers under one lock, so all subscribers
/// see all mutations in the order they happened. Subscriber callbacks run
/// while that lock is held and must not call back into the store.
///
/// Removing a record releases its resource handles before the call returns.
pub struct StateStore {
    inner: Mutex<StoreInner>,
    resources: Arc<dyn ResourcePort>,
}

impl StateStore {
    /// Creates an empty store that releases handles through `resources`.
    #[must_use]
    pub fn new(resources: Arc<dyn ResourcePort>) -> Self {
        Self {
            inner: Mutex::new(StoreInner {
                records: OrderedMap::new(),
                subscribers: Vec::new(),
                next_subscription: 0,
                closed: false,
            }),
            resources,
        }
    }

    /// Appends records at the tail, in the given order.
    ///
    /// A record whose id is already present replaces the old one, and the
    /// old record's handles that the new one does not carry are released.
    ///
    /// # Errors
    /// Returns `BatchError::StoreClosed` after [`teardown`](Self::teardown).
    pub fn insert(
        &self,
        records: impl IntoIterator<Item = BatchItemRecord>,
    ) -> Result<(), BatchError> {
        let mut inner = self.inner.lock();
        inner.ensure_open()?;
        let mut added = 0usize;
        for record in records {
            let kept: Vec<ResourceHandle> = record.handles().cloned().collect();
            if let Some(old) = inner.records.insert(record.id, record) {
                warn!(id = %old.id, "Replaced existing record with duplicate id");
                for handle in old.handles().filter(|handle| !kept.contains(handle)) {
                    self.resources.release(handle);
                }
            }
            added += 1;
        }
        trace!(count = added, "Inserted records");
        inner.notify();
        Ok(())
    }

    /// Replaces a record with `old ⊕ patch`. Returns the new record, or
    /// `None` if the id is unknown (nothing is notified then).
    ///
    /// # Errors
    /// Returns `BatchError::StoreClosed` after [`teardown`](Self::teardown).
    pub fn update(
        &self,
        id: ItemId,
        patch: RecordPatch,
    ) -> Result<Option<BatchItemRecord>, BatchError> {
        let mut inner = self.inner.lock();
        inner.ensure_open()?;
        let Some(next) = inner.records.get(&id).map(|record| record.apply(patch)) else {
            trace!(id = %id, "Update for unknown record ignored");
            return Ok(None);
        };
        inner.records.replace(&id, next.clone());
        trace!(id = %id, status = %next.status, "Updated record");
        inner.notify();
        Ok(Some(next))
    }

    /// Removes a record after releasing its handles. Returns false if absent.
    ///
    /// # Errors
    /// Returns `BatchError::StoreClosed` after [`teardown`](Self::teardown).
    pub fn remove(&self, id: ItemId) -> Result<bool, BatchError> {
        let mut inner = self.inner.lock();
        inner.ensure_open()?;
        let Some(record) = inner.records.get(&id) else {
            return Ok(false);
        };
        self.release(record);
        inner.records.remove(&id);
        debug!(id = %id, "Removed record");
        inner.notify();
        Ok(true)
    }

    /// Removes every record matching `predicate`, releasing their handles.
    /// Returns the number removed.
    ///
    /// # Errors
    /// Returns `BatchError::StoreClosed` after [`teardown`](Self::teardown).
    pub fn remove_where(
        &self,
        mut predicate: impl FnMut(&BatchItemRecord) -> bool,
    ) -> Result<usize, BatchError> {
        let mut inner = self.inner.lock();
        inner.ensure_open()?;
        let removed = inner.records.remove_where(|_, record| predicate(record));
        for (_, record) in &removed {
            self.release(record);
        }
        if !removed.is_empty() {
            debug!(count = removed.len(), "Removed records");
            inner.notify();
        }
        Ok(removed.len())
    }

    /// Removes every record, releasing their handles. Returns the number removed.
    ///
    /// # Errors
    /// Returns `BatchError::StoreClosed` after [`teardown`](Self::teardown).
    pub fn clear(&self) -> Result<usize, BatchError> {
        let mut inner = self.inner.lock();
        inner.ensure_open()?;
        let removed = self.drain_and_release(&mut inner);
        if removed > 0 {
            inner.notify();
        }
        Ok(removed)
    }

    /// Returns a record by id.
    #[must_use]
    pub fn get(&self, id: ItemId) -> Option<BatchItemRecord> {
        self.inner.lock().records.get(&id).cloned()
    }

    /// Returns all records in insertion order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<BatchItemRecord> {
        self.inner.lock().snapshot()
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().records.len()
    }

    /// Returns true if the store holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Counts records per status and totals the sizes of completed items.
    #[must_use]
    pub fn summary(&self) -> StoreSummary {
        let inner = self.inner.lock();
        inner
            .records
            .values()
            .fold(StoreSummary::default(), |mut summary, record| {
                match record.status {
                    ItemStatus::Pending => summary.pending += 1,
                    ItemStatus::Processing => summary.processing += 1,
                    ItemStatus::Completed => {
                        summary.completed += 1;
                        summary.original_bytes += record.original_size;
                        summary.result_bytes += record.result_size;
                    }
                    ItemStatus::Error => summary.failed += 1,
                }
                summary
            })
    }

    /// Registers a callback. It is called immediately with the current
    /// records, then after every mutation.
    ///
    /// # Errors
    /// Returns `BatchError::StoreClosed` after [`teardown`](Self::teardown).
    pub fn subscribe(
        &self,
        callback: impl Fn(&[BatchItemRecord]) + Send + Sync + 'static,
    ) -> Result<SubscriptionId, BatchError> {
        let mut inner = self.inner.lock();
        inner.ensure_open()?;
        let id = SubscriptionId(inner.next_subscription);
        inner.next_subscription += 1;
        callback(&inner.snapshot());
        inner.subscribers.push((id, Box::new(callback)));
        Ok(id)
    }

    /// Removes a subscription. Returns false if it was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut inner = self.inner.lock();
        let before = inner.subscribers.len();
        inner.subscribers.retain(|(sub, _)| *sub != id);
        inner.subscribers.len() != before
    }

    /// Releases every record's handles and closes the store.
    ///
    /// Subscribers get a final empty snapshot before they are dropped.
    /// Later mutations fail with `BatchError::StoreClosed`.
    pub fn teardown(&self) {
        let mut inner = self.inner.lock();
        if inner.closed {
            return;
        }
        let removed = self.drain_and_release(&mut inner);
        inner.notify();
        inner.subscribers.clear();
        inner.closed = true;
        debug!(released = removed, "State store torn down");
    }

    /// Returns true once [`teardown`](Self::teardown) has run.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }

    fn drain_and_release(&self, inner: &mut StoreInner) -> usize {
        let drained = inner.records.drain();
        for (_, record) in &drained {
            self.release(record);
        }
        drained.len()
    }

    fn release(&self, record: &BatchItemRecord) {
        for handle in record.handles() {
            self.resources.release(handle);
        }
    }
}

impl Drop for StateStore {
    fn drop(&mut self) {
        let inner = self.inner.get_mut();
        if !inner.closed {
            for (_, record) in inner.records.drain() {
                for handle in record.handles() {
                    self.resources.release(handle);
                }
            }
        }
    }
}

impl std::fmt::Debug for StateStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateStore")
            .field("len", &self.len())
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::errors::ProcessingError;
    use crate::domain::ports::mocks::MockResources;

    fn record(resources: &MockResources, name: &str, size: u64) -> BatchItemRecord {
        let handle = resources.register(bytes::Bytes::from(vec![0u8; 4]));
        BatchItemRecord::pending(ItemId::new(), name, size, handle, 80)
    }

    fn names(records: &[BatchItemRecord]) -> Vec<String> {
        records.iter().map(|r| r.display_name.clone()).collect()
    }

    #[test]
    fn test_remove_preserves_order_and_releases_once() {
        let resources = MockResources::new();
        let store = StateStore::new(resources.clone());
        let a = record(&resources, "A", 1);
        let b = record(&resources, "B", 2);
        let c = record(&resources, "C", 3);
        let b_handle = b.original_handle.clone();
        let b_id = b.id;

        store.insert([a, b, c]).unwrap();
        assert!(store.remove(b_id).unwrap());
        assert!(!store.remove(b_id).unwrap());

        assert_eq!(names(&store.snapshot()), vec!["A", "C"]);
        assert_eq!(resources.release_count(&b_handle), 1);
        assert_eq!(resources.total_releases(), 1);
    }

    #[test]
    fn test_update_produces_new_value() {
        let resources = MockResources::new();
        let store = StateStore::new(resources.clone());
        let a = record(&resources, "A", 100);
        let id = a.id;
        store.insert([a]).unwrap();

        let before = store.get(id).unwrap();
        let after = store
            .update(
                id,
                RecordPatch::transformed(ResourceHandle::new("blob:out"), 40),
            )
            .unwrap()
            .unwrap();

        assert_eq!(before.status, ItemStatus::Pending);
        assert_eq!(after.status, ItemStatus::Completed);
        assert_eq!(store.get(id).unwrap().result_size, 40);
        assert_eq!(
            store.update(ItemId::new(), RecordPatch::default()).unwrap(),
            None
        );
    }

    #[test]
    fn test_subscribers_see_every_mutation_in_order() {
        let resources = MockResources::new();
        let store = StateStore::new(resources.clone());
        let events: Arc<Mutex<Vec<Vec<String>>>> = Arc::default();

        let sink = events.clone();
        store
            .subscribe(move |records| sink.lock().push(names(records)))
            .unwrap();

        let a = record(&resources, "A", 1);
        let id = a.id;
        store.insert([a, record(&resources, "B", 1)]).unwrap();
        store
            .update(id, RecordPatch::status(ItemStatus::Processing))
            .unwrap();
        store.remove(id).unwrap();

        let events = events.lock();
        assert_eq!(events.len(), 4);
        assert!(events[0].is_empty());
        assert_eq!(events[1], vec!["A", "B"]);
        assert_eq!(events[2], vec!["A", "B"]);
        assert_eq!(events[3], vec!["B"]);
    }

    #[test]
    fn test_unsubscribe_does_not_affect_others() {
        let resources = MockResources::new();
        let store = StateStore::new(resources.clone());
        let first: Arc<Mutex<usize>> = Arc::default();
        let second: Arc<Mutex<usize>> = Arc::default();

        let sink = first.clone();
        let first_id = store.subscribe(move |_| *sink.lock() += 1).unwrap();
        let sink = second.clone();
        store.subscribe(move |_| *sink.lock() += 1).unwrap();

        assert!(store.unsubscribe(first_id));
        assert!(!store.unsubscribe(first_id));
        store.insert([record(&resources, "A", 1)]).unwrap();

        assert_eq!(*first.lock(), 1);
        assert_eq!(*second.lock(), 2);
    }

    #[test]
    fn test_remove_where_and_summary() {
        let resources = MockResources::new();
        let store = StateStore::new(resources.clone());
        let done = record(&resources, "done", 1000);
        let failed = record(&resources, "failed", 10);
        let waiting = record(&resources, "waiting", 10);
        let (done_id, failed_id) = (done.id, failed.id);
        store.insert([done, failed, waiting]).unwrap();

        let out = resources.register(bytes::Bytes::from_static(b"out"));
        store
            .update(done_id, RecordPatch::transformed(out.clone(), 250))
            .unwrap();
        store
            .update(failed_id, RecordPatch::failed(ProcessingError::Cancelled))
            .unwrap();

        let summary = store.summary();
        assert_eq!(summary.completed, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.pending, 1);
        assert_eq!(summary.saved_bytes(), 750);
        assert!((summary.savings_percent() - 75.0).abs() < f64::EPSILON);

        let removed = store
            .remove_where(|r| r.status.is_finished())
            .unwrap();
        assert_eq!(removed, 2);
        assert_eq!(names(&store.snapshot()), vec!["waiting"]);
        assert_eq!(resources.release_count(&out), 1);
        assert_eq!(resources.total_releases(), 3);
    }

    #[test]
    fn test_teardown_releases_and_closes() {
        let resources = MockResources::new();
        let store = StateStore::new(resources.clone());
        store
            .insert([record(&resources, "A", 1), record(&resources, "B", 1)])
            .unwrap();

        store.teardown();

        assert!(store.is_closed());
        assert!(store.is_empty());
        assert_eq!(resources.live_count(), 0);
        assert_eq!(
            store.insert([record(&resources, "C", 1)]),
            Err(BatchError::StoreClosed)
        );
        assert_eq!(store.clear(), Err(BatchError::StoreClosed));
    }

    #[test]
    fn test_duplicate_id_releases_replaced_handles() {
        let resources = MockResources::new();
        let store = StateStore::new(resources.clone());
        let first = record(&resources, "first", 1);
        let first_handle = first.original_handle.clone();
        let second_handle = resources.register(bytes::Bytes::from_static(b"again"));
        let second = BatchItemRecord::pending(first.id, "second", 1, second_handle.clone(), 80);
        let id = first.id;

        store.insert([first]).unwrap();
        store.insert([second]).unwrap();
        store.insert([store.get(id).unwrap()]).unwrap();

        assert_eq!(names(&store.snapshot()), vec!["second"]);
        assert_eq!(resources.release_count(&first_handle), 1);
        assert_eq!(resources.release_count(&second_handle), 0);

        store.teardown();
        assert_eq!(resources.release_count(&second_handle), 1);
        assert_eq!(resources.live_count(), 0);
    }

    #[test]
    fn test_teardown_notifies_before_dropping_subscribers() {
        let resources = MockResources::new();
        let store = StateStore::new(resources.clone());
        let sizes: Arc<Mutex<Vec<usize>>> = Arc::default();

        let sink = sizes.clone();
        store
            .subscribe(move |records| sink.lock().push(records.len()))
            .unwrap();
        store.insert([record(&resources, "A", 1)]).unwrap();
        store.teardown();
        store.teardown();

        assert_eq!(*sizes.lock(), vec![0, 1, 0]);
    }

    #[test]
    fn test_drop_releases_remaining_handles() {
        let resources = MockResources::new();
        {
            let store = StateStore::new(resources.clone());
            store.insert([record(&resources, "A", 1)]).unwrap();
        }
        assert_eq!(resources.total_releases(), 1);
        assert_eq!(resources.live_count(), 0);
    }
}
