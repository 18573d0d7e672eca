//! Batch processing service.

use std::collections::HashSet;
use std::sync::Arc;

use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::application::dto::{BatchOptions, BatchOutcome, BatchReport, ItemResult, OperationKind};
use crate::application::services::ImageAnalyzer;
use crate::domain::entities::{
    BatchItemRecord, ImageInput, ItemId, ItemStatus, RecordPatch, ResourceHandle,
};
use crate::domain::errors::{BatchError, ProcessingError};
use crate::domain::ports::{CodecPort, DecoderPort, ResourcePort, TransformOptions};
use crate::infrastructure::batch::{
    AbortableBatch, BatchController, ByteSized, ConcurrencyLimiter, order_by_size,
};
use crate::infrastructure::cache::AnalysisCacheStats;
use crate::infrastructure::config::{AppConfig, BatchConfig};
use crate::infrastructure::image::{ImageCrateCodec, ImageCrateDecoder};
use crate::infrastructure::resources::InMemoryResources;
use crate::infrastructure::state::{StateStore, StoreSummary};

/// One input on its way through a batch.
struct Job {
    index: usize,
    id: ItemId,
    input: ImageInput,
}

impl ByteSized for Job {
    fn byte_size(&self) -> u64 {
        self.input.size()
    }
}

/// Records of a running batch that have not reached a final status.
///
/// Dropped together with the batch stream. Anything still unsettled then
/// is marked cancelled and the batch token is fired.
struct Unsettled<'a> {
    store: &'a StateStore,
    token: CancellationToken,
    ids: HashSet<ItemId>,
}

impl Unsettled<'_> {
    fn settled(&mut self, id: ItemId) {
        self.ids.remove(&id);
    }
}

impl Drop for Unsettled<'_> {
    fn drop(&mut self) {
        if self.ids.is_empty() {
            return;
        }
        self.token.cancel();
        warn!(count = self.ids.len(), "Batch dropped early, cancelling unsettled items");
        for id in self.ids.drain() {
            if let Err(e) = self
                .store
                .update(id, RecordPatch::failed(ProcessingError::Cancelled))
            {
                debug!(id = %id, error = %e, "Could not cancel unsettled item");
            }
        }
    }
}

/// Runs batches of images through the codec or the analyzer.
///
/// Every submitted input gets a record in the [`StateStore`], created
/// `pending` before any work starts. Inputs are dispatched smallest first
/// with bounded concurrency, and a failed item never affects the others.
/// Only one batch is tracked for [`abort`](Self::abort); starting a new one
/// supersedes the previous.
pub struct ImageBatchService {
    codec: Arc<dyn CodecPort>,
    resources: Arc<dyn ResourcePort>,
    analyzer: ImageAnalyzer,
    store: StateStore,
    controller: BatchController,
    defaults: BatchConfig,
}

impl ImageBatchService {
    /// Creates a service over the given adapters.
    #[must_use]
    pub fn new(
        codec: Arc<dyn CodecPort>,
        decoder: Arc<dyn DecoderPort>,
        resources: Arc<dyn ResourcePort>,
        config: &AppConfig,
    ) -> Self {
        Self {
            codec,
            analyzer: ImageAnalyzer::new(decoder, config.cache),
            store: StateStore::new(Arc::clone(&resources)),
            resources,
            controller: BatchController::new(),
            defaults: config.batch.clone(),
        }
    }

    /// Creates a service backed by the `image` crate and in-memory resources.
    #[must_use]
    pub fn with_image_crate(config: &AppConfig) -> Self {
        Self::new(
            Arc::new(ImageCrateCodec::new()),
            Arc::new(ImageCrateDecoder::new()),
            Arc::new(InMemoryResources::new()),
            config,
        )
    }

    /// Processes every input and returns their outcomes in submission order.
    ///
    /// # Errors
    /// Returns `BatchError::InvalidConcurrency` for a zero limit and
    /// `BatchError::StoreClosed` after [`teardown`](Self::teardown). Per-item
    /// failures are reported in the outcomes, never here.
    pub async fn run_batch(
        &self,
        inputs: Vec<ImageInput>,
        options: BatchOptions,
    ) -> Result<BatchReport, BatchError> {
        let outcomes: Vec<_> = self.run_batch_stream(inputs, options)?.collect().await;
        let report = BatchReport::from_outcomes(outcomes);
        info!(
            succeeded = report.succeeded,
            failed = report.failed,
            cancelled = report.cancelled,
            "Batch finished"
        );
        Ok(report)
    }

    /// Like [`run_batch`](Self::run_batch), but yields outcomes as items settle.
    ///
    /// Records are created eagerly; work starts when the stream is polled.
    /// Each record is updated before its outcome is yielded. Dropping the
    /// stream early aborts the batch and marks unsettled records cancelled.
    ///
    /// # Errors
    /// Same as [`run_batch`](Self::run_batch).
    pub fn run_batch_stream(
        &self,
        inputs: Vec<ImageInput>,
        options: BatchOptions,
    ) -> Result<impl Stream<Item = BatchOutcome> + '_, BatchError> {
        let limiter = ConcurrencyLimiter::new(options.concurrency_or(&self.defaults))?;
        if self.store.is_closed() {
            return Err(BatchError::StoreClosed);
        }

        let jobs: Vec<Job> = order_by_size(
            inputs
                .into_iter()
                .enumerate()
                .map(|(index, input)| Job {
                    index,
                    id: ItemId::new(),
                    input,
                })
                .collect(),
        );

        let quality = options.quality_or(&self.defaults);
        let records: Vec<BatchItemRecord> = jobs
            .iter()
            .map(|job| {
                let handle = self.resources.register(job.input.bytes().clone());
                BatchItemRecord::pending(
                    job.id,
                    job.input.name(),
                    job.input.size(),
                    handle,
                    quality,
                )
            })
            .collect();

        if let Err(e) = self.store.insert(records.iter().cloned()) {
            for record in &records {
                self.resources.release(&record.original_handle);
            }
            return Err(e);
        }

        let labels: Vec<(usize, ItemId, String)> = jobs
            .iter()
            .map(|job| (job.index, job.id, job.input.name().to_owned()))
            .collect();
        let token = self.controller.begin();
        let mut unsettled = Unsettled {
            store: &self.store,
            token: token.clone(),
            ids: jobs.iter().map(|job| job.id).collect(),
        };
        info!(
            items = jobs.len(),
            limit = limiter.limit(),
            operation = %options.operation,
            "Starting batch"
        );

        let stream = AbortableBatch::new(limiter, token)
            .run(jobs, move |job| self.process(job, options))
            .map(move |(position, result)| {
                let (index, id, name) = labels[position].clone();
                self.settle(id, &name, &result);
                unsettled.settled(id);
                BatchOutcome {
                    index,
                    id,
                    name,
                    result,
                }
            });
        Ok(stream)
    }

    async fn process(&self, job: Job, options: BatchOptions) -> Result<ItemResult, ProcessingError> {
        if let Err(e) = self
            .store
            .update(job.id, RecordPatch::status(ItemStatus::Processing))
        {
            debug!(id = %job.id, error = %e, "Could not mark item as processing");
        }
        debug!(id = %job.id, name = job.input.name(), "Dispatching item");

        match options.operation {
            OperationKind::Analyze => Ok(ItemResult::Analyzed(
                self.analyzer.info(&job.input).await?,
            )),
            OperationKind::Compress | OperationKind::Convert => {
                let transform = options.transform_options(&self.defaults, job.input.format());
                self.transform(&job.input, transform).await
            }
        }
    }

    async fn transform(
        &self,
        input: &ImageInput,
        options: TransformOptions,
    ) -> Result<ItemResult, ProcessingError> {
        let bytes = self.codec.transform(input.bytes().clone(), options).await?;
        let byte_size = bytes.len() as u64;
        let handle = self.resources.register(bytes);
        Ok(ItemResult::Transformed { handle, byte_size })
    }

    fn settle(&self, id: ItemId, name: &str, result: &Result<ItemResult, ProcessingError>) {
        let patch = match result {
            Ok(ItemResult::Transformed { handle, byte_size }) => {
                debug!(id = %id, name, size = byte_size, "Item completed");
                RecordPatch::transformed(handle.clone(), *byte_size)
            }
            Ok(ItemResult::Analyzed(_)) => {
                debug!(id = %id, name, "Item analyzed");
                RecordPatch::status(ItemStatus::Completed)
            }
            Err(e) if e.is_cancelled() => {
                debug!(id = %id, name, "Item cancelled");
                RecordPatch::failed(e.clone())
            }
            Err(e) => {
                warn!(id = %id, name, error = %e, "Item failed");
                RecordPatch::failed(e.clone())
            }
        };

        let orphaned = match self.store.update(id, patch) {
            Ok(Some(_)) => None,
            Ok(None) | Err(_) => match result {
                Ok(ItemResult::Transformed { handle, .. }) => Some(handle),
                _ => None,
            },
        };
        if let Some(handle) = orphaned {
            debug!(id = %id, "Record gone before settling, releasing result");
            self.resources.release(handle);
        }
    }

    /// Stops dispatching the current batch. In-flight items still finish.
    pub fn abort(&self) {
        self.controller.abort();
    }

    /// Sizes and hit counters of the analysis caches.
    #[must_use]
    pub fn cache_stats(&self) -> AnalysisCacheStats {
        self.analyzer.cache_stats()
    }

    /// Empties every analysis cache.
    pub fn clear_cache(&self) {
        self.analyzer.clear_cache();
    }

    /// Cached analysis over this service's decoder.
    #[must_use]
    pub const fn analyzer(&self) -> &ImageAnalyzer {
        &self.analyzer
    }

    /// Per-item state of every batch run by this service.
    #[must_use]
    pub const fn store(&self) -> &StateStore {
        &self.store
    }

    /// Status counts and byte totals across all records.
    #[must_use]
    pub fn summary(&self) -> StoreSummary {
        self.store.summary()
    }

    /// Bytes produced for a completed item.
    #[must_use]
    pub fn resolve_result(&self, id: ItemId) -> Option<Bytes> {
        let record = self.store.get(id)?;
        record
            .result_handle
            .as_ref()
            .and_then(|handle| self.resources.resolve(handle))
    }

    /// Bytes behind any live handle, such as one from a [`BatchReport`].
    #[must_use]
    pub fn resolve_handle(&self, handle: &ResourceHandle) -> Option<Bytes> {
        self.resources.resolve(handle)
    }

    /// Removes one record and releases its resources.
    ///
    /// # Errors
    /// Returns `BatchError::StoreClosed` after [`teardown`](Self::teardown).
    pub fn remove_item(&self, id: ItemId) -> Result<bool, BatchError> {
        self.store.remove(id)
    }

    /// Removes completed and failed records. Returns the number removed.
    ///
    /// # Errors
    /// Returns `BatchError::StoreClosed` after [`teardown`](Self::teardown).
    pub fn clear_finished(&self) -> Result<usize, BatchError> {
        self.store.remove_where(|record| record.status.is_finished())
    }

    /// Aborts the current batch and releases everything the store holds.
    pub fn teardown(&self) {
        self.controller.abort();
        self.store.teardown();
        info!("Batch service torn down");
    }
}

impl std::fmt::Debug for ImageBatchService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageBatchService")
            .field("store", &self.store)
            .field("analyzer", &self.analyzer)
            .field("defaults", &self.defaults)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::Dimensions;
    use crate::domain::errors::TransformError;
    use crate::domain::ports::mocks::{MockCodec, MockDecoderPort, MockResources};
    use async_trait::async_trait;
    use tokio::sync::Notify;

    struct Fixture {
        codec: Arc<MockCodec>,
        resources: Arc<MockResources>,
        service: ImageBatchService,
    }

    fn fixture_with(decoder: MockDecoderPort) -> Fixture {
        let codec = MockCodec::new();
        let resources = MockResources::new();
        let service = ImageBatchService::new(
            codec.clone(),
            Arc::new(decoder),
            resources.clone(),
            &AppConfig::default(),
        );
        Fixture {
            codec,
            resources,
            service,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(MockDecoderPort::new())
    }

    fn image(name: &str, bytes: &[u8]) -> ImageInput {
        ImageInput::new(name, bytes.to_vec(), 1_700_000_000_000)
    }

    /// Codec that holds every call until `release` is notified.
    #[derive(Default)]
    struct GatedCodec {
        started: Notify,
        release: Notify,
    }

    #[async_trait]
    impl CodecPort for GatedCodec {
        async fn transform(
            &self,
            bytes: Bytes,
            _options: TransformOptions,
        ) -> Result<Bytes, TransformError> {
            self.started.notify_one();
            self.release.notified().await;
            Ok(bytes)
        }
    }

    /// Runs one item, calling `interrupt` while the codec holds it.
    async fn interrupted_item(
        interrupt: impl FnOnce(&ImageBatchService),
    ) -> (Arc<MockResources>, BatchOutcome) {
        let codec = Arc::new(GatedCodec::default());
        let resources = MockResources::new();
        let service = ImageBatchService::new(
            codec.clone(),
            Arc::new(MockDecoderPort::new()),
            resources.clone(),
            &AppConfig::default(),
        );

        let stream = service
            .run_batch_stream(vec![image("a.png", b"aaaa")], BatchOptions::default())
            .unwrap();
        futures_util::pin_mut!(stream);

        let (outcome, ()) = tokio::join!(stream.next(), async {
            codec.started.notified().await;
            interrupt(&service);
            codec.release.notify_one();
        });
        (resources, outcome.unwrap())
    }

    fn result_handle(outcome: &BatchOutcome) -> ResourceHandle {
        match &outcome.result {
            Ok(ItemResult::Transformed { handle, .. }) => handle.clone(),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_partial_failure_is_isolated() {
        let f = fixture();
        let inputs = vec![
            image("a.png", b"aaaaaaaa"),
            image("b.png", b"fail-bbb"),
            image("c.png", b"cccccccc"),
        ];

        let report = f
            .service
            .run_batch(inputs, BatchOptions::new(OperationKind::Compress))
            .await
            .unwrap();

        assert_eq!((report.succeeded, report.failed, report.cancelled), (2, 1, 0));
        let names: Vec<_> = report.outcomes.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, vec!["a.png", "b.png", "c.png"]);

        let failed = f.service.store().get(report.outcomes[1].id).unwrap();
        assert_eq!(failed.status, ItemStatus::Error);
        assert!(matches!(failed.error, Some(ProcessingError::Transform(_))));

        let done = f.service.store().get(report.outcomes[0].id).unwrap();
        assert_eq!(done.status, ItemStatus::Completed);
        assert_eq!(done.result_size, 4);
        assert_eq!(
            f.service.resolve_result(done.id),
            Some(Bytes::from_static(b"aaaa"))
        );
    }

    #[tokio::test]
    async fn test_smallest_inputs_dispatch_first() {
        let f = fixture();
        let inputs = vec![
            image("big.png", b"xxxxxxxxxxxx"),
            image("small.png", b"xx"),
            image("mid.png", b"xxxxxx"),
            image("mid2.png", b"yyyyyy"),
        ];

        f.service
            .run_batch(
                inputs,
                BatchOptions::new(OperationKind::Compress).with_concurrency(1),
            )
            .await
            .unwrap();

        let sizes: Vec<_> = f.codec.seen().iter().map(Bytes::len).collect();
        assert_eq!(sizes, vec![2, 6, 6, 12]);
        assert_eq!(f.codec.seen()[1], Bytes::from_static(b"xxxxxx"));

        let names: Vec<_> = f
            .service
            .store()
            .snapshot()
            .into_iter()
            .map(|r| r.display_name)
            .collect();
        assert_eq!(names, vec!["small.png", "mid.png", "mid2.png", "big.png"]);
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded() {
        let f = fixture();
        let inputs = (0..10)
            .map(|i| image(&format!("{i}.png"), b"pixels"))
            .collect();

        let report = f
            .service
            .run_batch(
                inputs,
                BatchOptions::new(OperationKind::Convert).with_concurrency(3),
            )
            .await
            .unwrap();

        assert_eq!(report.succeeded, 10);
        assert_eq!(f.codec.calls(), 10);
        assert!(f.codec.max_active() <= 3);
        assert!(f.codec.max_active() >= 2);
    }

    #[tokio::test]
    async fn test_zero_concurrency_is_rejected() {
        let f = fixture();
        let result = f
            .service
            .run_batch(
                vec![image("a.png", b"a")],
                BatchOptions::new(OperationKind::Compress).with_concurrency(0),
            )
            .await;

        assert_eq!(
            result.unwrap_err(),
            BatchError::InvalidConcurrency { limit: 0 }
        );
        assert!(f.service.store().is_empty());
        assert_eq!(f.resources.live_count(), 0);
    }

    #[tokio::test]
    async fn test_abort_cancels_undispatched_items() {
        let f = fixture();
        let inputs = (0..5)
            .map(|i| image(&format!("{i}.png"), b"pixels"))
            .collect();

        let stream = f
            .service
            .run_batch_stream(
                inputs,
                BatchOptions::new(OperationKind::Compress).with_concurrency(1),
            )
            .unwrap();
        futures_util::pin_mut!(stream);

        let first = stream.next().await.unwrap();
        assert!(first.result.is_ok());

        f.service.abort();
        let rest: Vec<_> = stream.collect().await;

        assert_eq!(rest.len(), 4);
        assert!(rest.iter().all(BatchOutcome::is_cancelled));
        assert_eq!(f.codec.calls(), 1);

        let summary = f.service.summary();
        assert_eq!((summary.completed, summary.failed), (1, 4));
        assert!(
            f.service
                .store()
                .snapshot()
                .iter()
                .filter(|r| r.status == ItemStatus::Error)
                .all(BatchItemRecord::is_cancelled)
        );
    }

    #[tokio::test]
    async fn test_new_batch_is_not_affected_by_earlier_abort() {
        let f = fixture();
        f.service.abort();

        let report = f
            .service
            .run_batch(
                vec![image("a.png", b"aaaa")],
                BatchOptions::new(OperationKind::Compress),
            )
            .await
            .unwrap();
        assert_eq!(report.succeeded, 1);
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let f = fixture();
        let report = f
            .service
            .run_batch(Vec::new(), BatchOptions::default())
            .await
            .unwrap();
        assert!(report.is_empty());
        assert_eq!(f.codec.calls(), 0);
    }

    #[tokio::test]
    async fn test_analyze_batch_uses_cache() {
        let mut decoder = MockDecoderPort::new();
        decoder
            .expect_probe()
            .times(2)
            .returning(|_| Ok(Dimensions::new(4, 3)));
        let f = fixture_with(decoder);
        let inputs = vec![
            image("a.png", b"aaaa"),
            image("b.png", b"bbbbbb"),
            image("a.png", b"aaaa"),
        ];

        let report = f
            .service
            .run_batch(
                inputs,
                BatchOptions::new(OperationKind::Analyze).with_concurrency(1),
            )
            .await
            .unwrap();

        assert_eq!(report.succeeded, 3);
        assert_eq!(f.codec.calls(), 0);
        match &report.outcomes[1].result {
            Ok(ItemResult::Analyzed(info)) => assert_eq!(info.name, "b.png"),
            other => panic!("unexpected outcome: {other:?}"),
        }

        let stats = f.service.cache_stats();
        assert_eq!((stats.dimensions, stats.info), (2, 2));

        f.service.clear_cache();
        assert_eq!(f.service.cache_stats().info, 0);
    }

    #[tokio::test]
    async fn test_removal_releases_handles_once() {
        let f = fixture();
        let report = f
            .service
            .run_batch(
                vec![image("a.png", b"aaaa"), image("b.png", b"fail")],
                BatchOptions::default(),
            )
            .await
            .unwrap();

        let done = f.service.store().get(report.outcomes[0].id).unwrap();
        let result_handle = done.result_handle.clone().unwrap();

        assert!(f.service.remove_item(done.id).unwrap());
        assert!(!f.service.remove_item(done.id).unwrap());
        assert_eq!(f.resources.release_count(&done.original_handle), 1);
        assert_eq!(f.resources.release_count(&result_handle), 1);

        assert_eq!(f.service.clear_finished().unwrap(), 1);
        assert_eq!(f.resources.live_count(), 0);
    }

    #[tokio::test]
    async fn test_teardown_releases_everything_and_closes() {
        let f = fixture();
        f.service
            .run_batch(
                vec![image("a.png", b"aaaa"), image("b.png", b"bbbb")],
                BatchOptions::default(),
            )
            .await
            .unwrap();
        assert_eq!(f.resources.live_count(), 4);

        f.service.teardown();

        assert_eq!(f.resources.live_count(), 0);
        assert_eq!(f.resources.total_releases(), 4);
        let result = f
            .service
            .run_batch(vec![image("c.png", b"cc")], BatchOptions::default())
            .await;
        assert_eq!(result.unwrap_err(), BatchError::StoreClosed);
    }

    #[tokio::test]
    async fn test_dropped_stream_cancels_unsettled_items() {
        let f = fixture();
        let inputs = (0..4)
            .map(|i| image(&format!("{i}.png"), b"pixels"))
            .collect();

        {
            let stream = f
                .service
                .run_batch_stream(
                    inputs,
                    BatchOptions::new(OperationKind::Compress).with_concurrency(1),
                )
                .unwrap();
            futures_util::pin_mut!(stream);
            assert!(stream.next().await.unwrap().result.is_ok());
        }

        let summary = f.service.summary();
        assert_eq!(
            (summary.pending, summary.processing, summary.completed, summary.failed),
            (0, 0, 1, 3)
        );
        assert!(
            f.service
                .store()
                .snapshot()
                .iter()
                .filter(|r| r.status == ItemStatus::Error)
                .all(BatchItemRecord::is_cancelled)
        );
        assert!(f.service.controller.is_aborted());
    }

    #[tokio::test]
    async fn test_unpolled_stream_cancels_every_item() {
        let f = fixture();
        let stream = f
            .service
            .run_batch_stream(
                vec![image("a.png", b"aaaa"), image("b.png", b"bbbb")],
                BatchOptions::default(),
            )
            .unwrap();
        drop(stream);

        assert_eq!(f.codec.calls(), 0);
        assert_eq!(f.service.summary().failed, 2);

        let report = f
            .service
            .run_batch(vec![image("c.png", b"cccc")], BatchOptions::default())
            .await
            .unwrap();
        assert_eq!(report.succeeded, 1);
    }

    #[tokio::test]
    async fn test_result_released_when_record_removed_in_flight() {
        let (resources, outcome) = interrupted_item(|service| {
            let id = service.store().snapshot()[0].id;
            assert!(service.remove_item(id).unwrap());
        })
        .await;

        let handle = result_handle(&outcome);
        assert_eq!(resources.release_count(&handle), 1);
        assert_eq!(resources.live_count(), 0);
    }

    #[tokio::test]
    async fn test_result_released_when_torn_down_in_flight() {
        let (resources, outcome) = interrupted_item(ImageBatchService::teardown).await;

        let handle = result_handle(&outcome);
        assert_eq!(resources.release_count(&handle), 1);
        assert_eq!(resources.total_releases(), 2);
        assert_eq!(resources.live_count(), 0);
    }

    #[tokio::test]
    async fn test_subscribers_see_every_transition() {
        let f = fixture();
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        f.service
            .store()
            .subscribe(move |records| {
                if let Some(record) = records.first() {
                    sink.lock().push(record.status);
                }
            })
            .unwrap();

        f.service
            .run_batch(vec![image("a.png", b"aaaa")], BatchOptions::default())
            .await
            .unwrap();

        assert_eq!(
            *seen.lock(),
            vec![
                ItemStatus::Pending,
                ItemStatus::Processing,
                ItemStatus::Completed
            ]
        );
    }
}
