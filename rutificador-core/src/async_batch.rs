//! Async bridge over the batch processor
//!
//! Eager batches run on tokio's blocking pool so they never stall the
//! runtime; streams consume any `futures::Stream` of raw strings and yield
//! outcomes one at a time, in input order.

use crate::batch::{BatchProcessor, BatchResult, ItemOutcome};
use crate::error::Result;
use crate::rut::FormatOptions;
use crate::validator::Validator;
use futures::stream::{Stream, StreamExt};
use tracing::debug;

impl<V> BatchProcessor<V>
where
    V: Validator + Clone + Send + Sync + 'static,
{
    /// [`validate_batch`](Self::validate_batch) on the blocking pool
    ///
    /// # Errors
    /// Returns [`Error::Join`](crate::Error::Join) if the blocking task is
    /// cancelled. Item-level failures are data in the returned result.
    pub async fn async_validate_batch(&self, items: Vec<String>, parallel: bool) -> Result<BatchResult> {
        let processor = self.clone();
        let result =
            tokio::task::spawn_blocking(move || processor.validate_batch(&items, parallel)).await?;
        Ok(result)
    }

    /// [`format_batch`](Self::format_batch) on the blocking pool
    ///
    /// # Arguments
    /// * `items` - Raw candidate strings
    /// * `options` - Display options for valid identifiers
    /// * `format` - Registered formatter name, or `None` for plain lines
    /// * `parallel` - Allow the worker pool for large inputs
    pub async fn async_format_batch(
        &self,
        items: Vec<String>,
        options: FormatOptions,
        format: Option<String>,
        parallel: bool,
    ) -> Result<String> {
        let processor = self.clone();
        tokio::task::spawn_blocking(move || {
            processor.format_batch(&items, &options, format.as_deref(), parallel)
        })
        .await?
    }

    /// Outcome per item of `items`, produced lazily
    pub fn async_validate_stream<S>(&self, items: S) -> impl Stream<Item = ItemOutcome>
    where
        S: Stream<Item = String>,
    {
        let processor = self.clone();
        async_stream::stream! {
            futures::pin_mut!(items);
            let mut count = 0usize;
            while let Some(item) = items.next().await {
                count += 1;
                yield processor.outcome(&item);
            }
            debug!(items = count, "Async validation stream finished");
        }
    }

    /// Formatted outcome per item of `items`, produced lazily
    pub fn async_format_stream<S>(&self, items: S, options: FormatOptions) -> impl Stream<Item = ItemOutcome>
    where
        S: Stream<Item = String>,
    {
        let processor = self.clone();
        async_stream::stream! {
            futures::pin_mut!(items);
            while let Some(item) = items.next().await {
                yield processor.format_outcome(&item, &options);
            }
        }
    }
}
