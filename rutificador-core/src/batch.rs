//! Batch and stream processing
//!
//! Every input item is classified independently. Eager batches may be split
//! into chunks that run on rayon (the global pool, or a sized pool built once
//! per processor when `max_workers` is set); results are merged by
//! original index, so output order always matches input order. Unexpected
//! failures (panics inside a worker) become code-less [`ErrorDetail`]s and
//! never abort the batch.

use crate::config::{BatchSettings, DEFAULT_CHUNK_SIZE};
use crate::detail::{serialize_secs, ErrorCode, ErrorDetail};
use crate::error::Result;
use crate::formatters::FormatterRegistry;
use crate::normalize::RutInput;
use crate::rut::{FormatOptions, Rut};
use crate::validator::{RutValidator, ValidationResult, ValidationState, Validator};
use rayon::prelude::*;
use serde::Serialize;
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Per-item result of a batch or stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "value", rename_all = "lowercase")]
pub enum ItemOutcome {
    /// Normalized (or formatted) identifier
    Valid(String),
    Invalid(ErrorDetail),
}

impl ItemOutcome {
    pub fn is_valid(&self) -> bool {
        matches!(self, ItemOutcome::Valid(_))
    }

    /// Convert a classification into an outcome
    ///
    /// Non-valid results report their first error. Results without errors
    /// (`incomplete` or `possible`) report `EMPTY_RUT` or a missing check
    /// character. `subject` is always the original text.
    pub fn from_result(result: ValidationResult) -> Self {
        if result.state == ValidationState::Valid {
            if let Some(normalized) = result.normalized {
                return ItemOutcome::Valid(normalized);
            }
        }

        let detail = match result.errors.into_iter().next() {
            Some(detail) => detail,
            None if result.state == ValidationState::Possible => {
                ErrorDetail::new(ErrorCode::DvInvalid).with_message("Check character is missing")
            }
            None => ErrorDetail::new(ErrorCode::EmptyRut),
        };
        ItemOutcome::Invalid(
            detail
                .with_subject(result.original)
                .with_duration(result.duration),
        )
    }
}

/// Result of an eager batch
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchResult {
    /// Normalized identifiers, input order
    pub valid_items: Vec<String>,
    /// One detail per failing input, input order
    pub invalid_items: Vec<ErrorDetail>,
    pub total_processed: usize,
    #[serde(serialize_with = "serialize_secs")]
    pub elapsed: Duration,
}

impl BatchResult {
    /// Percentage of valid items (0.0 for an empty batch)
    pub fn success_rate(&self) -> f64 {
        if self.total_processed == 0 {
            return 0.0;
        }
        self.valid_items.len() as f64 / self.total_processed as f64 * 100.0
    }

    fn from_outcomes(outcomes: Vec<ItemOutcome>, elapsed: Duration) -> Self {
        let total_processed = outcomes.len();
        let mut result = BatchResult {
            total_processed,
            elapsed,
            ..Default::default()
        };
        for outcome in outcomes {
            match outcome {
                ItemOutcome::Valid(value) => result.valid_items.push(value),
                ItemOutcome::Invalid(detail) => result.invalid_items.push(detail),
            }
        }
        result
    }
}

/// Extract a readable message from a panic payload
fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic in worker".to_string()
    }
}

/// Render a normalized `base-dv` value without recomputing its check character
fn format_normalized(normalized: &str, options: &FormatOptions) -> String {
    match normalized.split_once('-') {
        Some((base, dv)) => match dv.chars().next() {
            Some(c) => Rut::trusted(base, c).format(options),
            None => normalized.to_string(),
        },
        None => normalized.to_string(),
    }
}

/// Eager batch and lazy stream processor
///
/// Holds the validator (and through it the shared checksum cache), the chunk
/// size and the worker count for parallel runs, and the formatter registry
/// used by [`format_batch`](Self::format_batch).
#[derive(Debug, Clone)]
pub struct BatchProcessor<V = RutValidator> {
    validator: V,
    chunk_size: usize,
    max_workers: Option<usize>,
    pool: Option<Arc<rayon::ThreadPool>>,
    registry: FormatterRegistry,
}

impl Default for BatchProcessor<RutValidator> {
    fn default() -> Self {
        Self::new(RutValidator::default())
    }
}

impl<V> BatchProcessor<V>
where
    V: Validator + Sync,
{
    pub fn new(validator: V) -> Self {
        Self {
            validator,
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_workers: None,
            pool: None,
            registry: FormatterRegistry::default(),
        }
    }

    /// Apply `[batch]` settings from the configuration file
    pub fn with_settings(self, settings: &BatchSettings) -> Self {
        let processor = self.with_chunk_size(settings.chunk_size);
        let processor = match settings.max_workers {
            Some(n) => processor.with_max_workers(n),
            None => processor,
        };
        info!(
            chunk_size = processor.chunk_size,
            max_workers = ?processor.max_workers,
            "BatchProcessor configured"
        );
        processor
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Size the worker pool; it is built here once and shared by clones
    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        let workers = max_workers.max(1);
        self.max_workers = Some(workers);
        self.pool = match rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("rutificador-worker-{}", i))
            .build()
        {
            Ok(pool) => Some(Arc::new(pool)),
            Err(e) => {
                warn!("Failed to build worker pool, using the global pool: {}", e);
                None
            }
        };
        self
    }

    pub fn with_registry(mut self, registry: FormatterRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn validator(&self) -> &V {
        &self.validator
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn max_workers(&self) -> Option<usize> {
        self.max_workers
    }

    pub fn registry(&self) -> &FormatterRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut FormatterRegistry {
        &mut self.registry
    }

    /// Full classification of one item; a validator panic becomes the code-less detail
    fn classify(&self, item: &str) -> std::result::Result<ValidationResult, ErrorDetail> {
        let start = Instant::now();
        catch_unwind(AssertUnwindSafe(|| {
            self.validator.parse(&RutInput::from(item))
        }))
        .map_err(|payload| {
            let message = panic_message(payload.as_ref());
            warn!(item = %item, "Worker panicked, recording item as invalid: {}", message);
            ErrorDetail::unexpected(message)
                .with_subject(item)
                .with_duration(start.elapsed())
        })
    }

    /// Outcome for one item
    pub fn outcome(&self, item: &str) -> ItemOutcome {
        match self.classify(item) {
            Ok(result) => ItemOutcome::from_result(result),
            Err(detail) => ItemOutcome::Invalid(detail),
        }
    }

    fn outcomes_sequential<S: AsRef<str>>(&self, items: &[S]) -> Vec<ItemOutcome> {
        items.iter().map(|item| self.outcome(item.as_ref())).collect()
    }

    fn outcomes_chunk<S: AsRef<str>>(&self, chunk_index: usize, chunk: &[S]) -> Vec<ItemOutcome> {
        match catch_unwind(AssertUnwindSafe(|| self.outcomes_sequential(chunk))) {
            Ok(outcomes) => outcomes,
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                error!(chunk = chunk_index, "Chunk failed: {}", message);
                chunk
                    .iter()
                    .map(|item| {
                        ItemOutcome::Invalid(
                            ErrorDetail::unexpected(message.clone()).with_subject(item.as_ref()),
                        )
                    })
                    .collect()
            }
        }
    }

    fn outcomes_parallel<S: AsRef<str> + Sync>(&self, items: &[S]) -> Vec<ItemOutcome> {
        let run = || -> Vec<Vec<ItemOutcome>> {
            debug!(
                items = items.len(),
                chunk_size = self.chunk_size,
                workers = rayon::current_num_threads(),
                "Parallel batch starting"
            );
            // Indexed collect keeps chunk order regardless of completion order
            items
                .par_chunks(self.chunk_size)
                .enumerate()
                .map(|(idx, chunk)| self.outcomes_chunk(idx, chunk))
                .collect()
        };

        let chunks = match &self.pool {
            Some(pool) => pool.install(run),
            None => run(),
        };
        chunks.into_iter().flatten().collect()
    }

    /// Classify every item
    ///
    /// Runs on the worker pool only when `parallel` is set and the input is
    /// larger than one chunk. Output is identical either way apart from
    /// `elapsed`.
    pub fn validate_batch<S: AsRef<str> + Sync>(&self, items: &[S], parallel: bool) -> BatchResult {
        let start = Instant::now();
        if items.is_empty() {
            warn!("Empty batch received");
        }

        let outcomes = if parallel && items.len() > self.chunk_size {
            self.outcomes_parallel(items)
        } else {
            self.outcomes_sequential(items)
        };

        let result = BatchResult::from_outcomes(outcomes, start.elapsed());
        info!(
            total = result.total_processed,
            valid = result.valid_items.len(),
            invalid = result.invalid_items.len(),
            parallel,
            "Batch validated in {:.4}s",
            result.elapsed.as_secs_f64()
        );
        result
    }

    /// Lazy outcomes, one per item, in input order
    pub fn validate_stream<'a, I>(&'a self, items: I) -> impl Iterator<Item = ItemOutcome> + 'a
    where
        I: IntoIterator,
        I::IntoIter: 'a,
        I::Item: AsRef<str>,
    {
        items.into_iter().map(move |item| self.outcome(item.as_ref()))
    }

    /// Lazy full classifications, one per item, in input order
    ///
    /// A validator panic is reported as an `invalid` result carrying the
    /// code-less detail.
    pub fn results<'a, I>(&'a self, items: I) -> impl Iterator<Item = ValidationResult> + 'a
    where
        I: IntoIterator,
        I::IntoIter: 'a,
        I::Item: AsRef<str>,
    {
        items.into_iter().map(move |item| {
            let item = item.as_ref();
            self.classify(item).unwrap_or_else(|detail| ValidationResult {
                original: item.to_string(),
                normalized: None,
                base: None,
                check_char: None,
                state: ValidationState::Invalid,
                duration: detail.duration,
                errors: vec![detail],
                warnings: Vec::new(),
                rigor_used: self.validator.rigor(),
            })
        })
    }

    /// Lazy formatted outcomes, one per item, in input order
    pub fn format_stream<'a, I>(
        &'a self,
        items: I,
        options: FormatOptions,
    ) -> impl Iterator<Item = ItemOutcome> + 'a
    where
        I: IntoIterator,
        I::IntoIter: 'a,
        I::Item: AsRef<str>,
    {
        items
            .into_iter()
            .map(move |item| self.format_outcome(item.as_ref(), &options))
    }

    /// Formatted outcome for one item
    pub fn format_outcome(&self, item: &str, options: &FormatOptions) -> ItemOutcome {
        match self.outcome(item) {
            ItemOutcome::Valid(normalized) => {
                ItemOutcome::Valid(format_normalized(&normalized, options))
            }
            invalid => invalid,
        }
    }

    /// Validate, format and render a text report
    ///
    /// Valid identifiers are formatted per `options` (trusting the validation
    /// pass) and serialized with the formatter named `format`, or joined by
    /// newlines when `format` is `None`. Invalid items and processing
    /// statistics follow.
    pub fn format_batch<S: AsRef<str> + Sync>(
        &self,
        items: &[S],
        options: &FormatOptions,
        format: Option<&str>,
        parallel: bool,
    ) -> Result<String> {
        let formatter = format.map(|name| self.registry.require(name)).transpose()?;
        let result = self.validate_batch(items, parallel);

        let formatted: Vec<String> = if parallel && result.valid_items.len() > self.chunk_size {
            result
                .valid_items
                .par_iter()
                .map(|v| format_normalized(v, options))
                .collect()
        } else {
            result
                .valid_items
                .iter()
                .map(|v| format_normalized(v, options))
                .collect()
        };

        let mut parts = vec!["Valid RUTs:".to_string()];
        match formatter {
            Some(formatter) => parts.push(formatter.format(&formatted)),
            None => parts.push(formatted.join("\n")),
        }

        if !result.invalid_items.is_empty() {
            parts.push(String::new());
            parts.push("Invalid RUTs:".to_string());
            for detail in &result.invalid_items {
                parts.push(format!(
                    "{} - {}",
                    detail.subject.as_deref().unwrap_or_default(),
                    detail.message
                ));
            }
        }

        parts.extend([
            String::new(),
            "Processing statistics:".to_string(),
            format!("- Total processed: {}", result.total_processed),
            format!("- Valid RUTs: {}", result.valid_items.len()),
            format!("- Invalid RUTs: {}", result.invalid_items.len()),
            format!("- Success rate: {:.1}%", result.success_rate()),
            format!("- Processing time: {:.4}s", result.elapsed.as_secs_f64()),
        ]);
        Ok(parts.join("\n"))
    }
}
