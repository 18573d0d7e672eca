//! Batch request and result DTOs.

use crate::domain::entities::{ImageFormat, ImageInfo, ItemId, ResourceHandle};
use crate::domain::errors::ProcessingError;
use crate::domain::ports::TransformOptions;
use crate::infrastructure::config::BatchConfig;

/// What a batch does to each input.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OperationKind {
    /// Re-encode, keeping the source format unless one is requested.
    #[default]
    Compress,
    /// Re-encode into the requested or configured format.
    Convert,
    /// Extract full image info through the analysis cache.
    Analyze,
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Compress => write!(f, "compress"),
            Self::Convert => write!(f, "convert"),
            Self::Analyze => write!(f, "analyze"),
        }
    }
}

/// Per-batch overrides. Unset fields fall back to [`BatchConfig`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchOptions {
    /// Operation applied to every item.
    pub operation: OperationKind,
    /// Maximum items in flight.
    pub concurrency: Option<usize>,
    /// Encoder quality, 0 to 100.
    pub quality: Option<u8>,
    /// Output format.
    pub format: Option<ImageFormat>,
    /// Target upper bound on output size.
    pub max_bytes: Option<u64>,
    /// Longest edge allowed in the output.
    pub max_dimension: Option<u32>,
}

impl BatchOptions {
    /// Creates options for an operation with every setting defaulted.
    #[must_use]
    pub fn new(operation: OperationKind) -> Self {
        Self {
            operation,
            ..Self::default()
        }
    }

    /// Caps the number of items in flight.
    #[must_use]
    pub const fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = Some(concurrency);
        self
    }

    /// Overrides the encoder quality.
    #[must_use]
    pub const fn with_quality(mut self, quality: u8) -> Self {
        self.quality = Some(quality);
        self
    }

    /// Overrides the output format.
    #[must_use]
    pub const fn with_format(mut self, format: ImageFormat) -> Self {
        self.format = Some(format);
        self
    }

    /// Sets a best-effort output size limit.
    #[must_use]
    pub const fn with_max_bytes(mut self, max_bytes: u64) -> Self {
        self.max_bytes = Some(max_bytes);
        self
    }

    /// Sets the longest edge allowed in the output.
    #[must_use]
    pub const fn with_max_dimension(mut self, max_dimension: u32) -> Self {
        self.max_dimension = Some(max_dimension);
        self
    }

    /// Effective concurrency limit.
    #[must_use]
    pub fn concurrency_or(&self, defaults: &BatchConfig) -> usize {
        self.concurrency.unwrap_or(defaults.concurrency)
    }

    /// Effective quality, clamped to 100.
    #[must_use]
    pub fn quality_or(&self, defaults: &BatchConfig) -> u8 {
        self.quality.unwrap_or(defaults.quality).min(100)
    }

    /// Resolves codec options for one item.
    ///
    /// `Compress` keeps `source` when it can be encoded; everything else
    /// uses the requested format, then the configured one.
    #[must_use]
    pub fn transform_options(
        &self,
        defaults: &BatchConfig,
        source: Option<ImageFormat>,
    ) -> TransformOptions {
        let kept = match self.operation {
            OperationKind::Compress => source.filter(|format| format.is_encodable()),
            OperationKind::Convert | OperationKind::Analyze => None,
        };
        let format = self.format.or(kept).unwrap_or(defaults.format);

        TransformOptions::new(format, self.quality_or(defaults))
            .with_max_bytes(self.max_bytes.or(defaults.max_bytes))
            .with_max_dimension(self.max_dimension.or(defaults.max_dimension))
    }
}

/// Successful result of one item.
#[derive(Debug, Clone, PartialEq)]
pub enum ItemResult {
    /// Bytes produced by the codec, registered as a resource.
    Transformed {
        /// Handle to the produced bytes.
        handle: ResourceHandle,
        /// Size of the produced bytes.
        byte_size: u64,
    },
    /// Metadata extracted by an analyze batch.
    Analyzed(ImageInfo),
}

/// Outcome of one submitted input.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchOutcome {
    /// Position of the input in the submitted list.
    pub index: usize,
    /// Id of the record tracking this input.
    pub id: ItemId,
    /// Input name.
    pub name: String,
    /// Result or failure cause.
    pub result: Result<ItemResult, ProcessingError>,
}

impl BatchOutcome {
    /// Returns true if the item never started because the batch was aborted.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.result.as_ref().is_err_and(ProcessingError::is_cancelled)
    }
}

/// Every outcome of a batch, in submission order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchReport {
    /// Outcomes sorted by [`BatchOutcome::index`].
    pub outcomes: Vec<BatchOutcome>,
    /// Items that completed.
    pub succeeded: usize,
    /// Items that failed in the codec or decoder.
    pub failed: usize,
    /// Items skipped by an abort.
    pub cancelled: usize,
}

impl BatchReport {
    /// Builds a report from outcomes in any order.
    #[must_use]
    pub fn from_outcomes(mut outcomes: Vec<BatchOutcome>) -> Self {
        outcomes.sort_by_key(|outcome| outcome.index);

        let mut report = Self::default();
        for outcome in &outcomes {
            match &outcome.result {
                Ok(_) => report.succeeded += 1,
                Err(e) if e.is_cancelled() => report.cancelled += 1,
                Err(_) => report.failed += 1,
            }
        }
        report.outcomes = outcomes;
        report
    }

    /// Number of outcomes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    /// Returns true if the batch had no inputs.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::errors::TransformError;
    use test_case::test_case;

    #[test_case(OperationKind::Compress, None, Some(ImageFormat::Png), ImageFormat::Png ; "compress keeps source")]
    #[test_case(OperationKind::Compress, None, Some(ImageFormat::Gif), ImageFormat::Webp ; "compress falls back for gif")]
    #[test_case(OperationKind::Compress, Some(ImageFormat::Jpeg), Some(ImageFormat::Png), ImageFormat::Jpeg ; "compress honors override")]
    #[test_case(OperationKind::Convert, None, Some(ImageFormat::Png), ImageFormat::Webp ; "convert uses configured format")]
    #[test_case(OperationKind::Convert, Some(ImageFormat::Png), None, ImageFormat::Png ; "convert honors override")]
    fn test_output_format(
        operation: OperationKind,
        requested: Option<ImageFormat>,
        source: Option<ImageFormat>,
        expected: ImageFormat,
    ) {
        let options = BatchOptions {
            format: requested,
            ..BatchOptions::new(operation)
        };
        let resolved = options.transform_options(&BatchConfig::default(), source);
        assert_eq!(resolved.format, expected);
    }

    #[test]
    fn test_overrides_win_over_defaults() {
        let defaults = BatchConfig {
            max_bytes: Some(1000),
            max_dimension: Some(64),
            ..BatchConfig::default()
        };
        let options = BatchOptions::new(OperationKind::Convert)
            .with_quality(150)
            .with_max_dimension(32)
            .with_concurrency(2);

        let resolved = options.transform_options(&defaults, None);
        assert_eq!(resolved.quality, 100);
        assert_eq!(resolved.max_bytes, Some(1000));
        assert_eq!(resolved.max_dimension, Some(32));
        assert_eq!(options.concurrency_or(&defaults), 2);
        assert_eq!(BatchOptions::default().concurrency_or(&defaults), 4);
    }

    #[test]
    fn test_report_sorts_and_counts() {
        let outcome = |index, result| BatchOutcome {
            index,
            id: ItemId::new(),
            name: format!("{index}.png"),
            result,
        };
        let done = Ok(ItemResult::Transformed {
            handle: ResourceHandle::new("blob:test/1"),
            byte_size: 10,
        });

        let report = BatchReport::from_outcomes(vec![
            outcome(2, Err(ProcessingError::Cancelled)),
            outcome(0, done),
            outcome(1, Err(TransformError::new("bad").into())),
        ]);

        let order: Vec<_> = report.outcomes.iter().map(|o| o.index).collect();
        assert_eq!(order, vec![0, 1, 2]);
        assert_eq!(
            (report.succeeded, report.failed, report.cancelled),
            (1, 1, 1)
        );
        assert!(report.outcomes[2].is_cancelled());
    }
}
