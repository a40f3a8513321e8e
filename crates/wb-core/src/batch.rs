//! Batch sealing and opening with per-item failure isolation.
//!
//! Large batches are split into contiguous chunks processed on scoped worker
//! threads; results are stitched back together in input order.

use crate::envelope::{EnvelopeCodec, SealingKey, WireEnvelope};
use crate::{Error, Result};
use std::num::NonZeroUsize;
use std::thread;
use zeroize::Zeroizing;

/// Batch coordinator configuration.
#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Batches smaller than this run on the calling thread.
    pub parallel_threshold: usize,
    /// Upper bound on worker threads (defaults to available parallelism).
    pub max_workers: Option<NonZeroUsize>,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            parallel_threshold: 64,
            max_workers: None,
        }
    }
}

/// Per-item outcomes of a batch, in input order.
#[derive(Debug)]
pub struct BatchOutcome<T> {
    results: Vec<Result<T>>,
}

impl<T> BatchOutcome<T> {
    /// Number of items.
    pub fn len(&self) -> usize {
        self.results.len()
    }

    /// Whether the batch was empty.
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Number of successful items.
    pub fn success_count(&self) -> usize {
        self.results.iter().filter(|r| r.is_ok()).count()
    }

    /// Failed items. Each error is `Error::BatchItemFailed` carrying the index.
    pub fn failures(&self) -> impl Iterator<Item = &Error> {
        self.results.iter().filter_map(|r| r.as_ref().err())
    }

    /// Iterate over per-item outcomes.
    pub fn iter(&self) -> std::slice::Iter<'_, Result<T>> {
        self.results.iter()
    }

    /// Successful values, dropping failures.
    pub fn into_successes(self) -> Vec<T> {
        self.results.into_iter().filter_map(Result::ok).collect()
    }

    /// Per-item outcomes.
    pub fn into_results(self) -> Vec<Result<T>> {
        self.results
    }
}

impl<T> IntoIterator for BatchOutcome<T> {
    type Item = Result<T>;
    type IntoIter = std::vec::IntoIter<Result<T>>;

    fn into_iter(self) -> Self::IntoIter {
        self.results.into_iter()
    }
}

/// Applies codec operations across many messages.
#[derive(Debug, Clone)]
pub struct BatchCoordinator {
    codec: EnvelopeCodec,
    config: BatchConfig,
}

impl BatchCoordinator {
    /// Coordinator over `codec`.
    pub fn new(codec: EnvelopeCodec, config: BatchConfig) -> Self {
        Self { codec, config }
    }

    /// Seal every plaintext with an independent nonce, preserving order.
    ///
    /// Sealing only fails for reasons that affect every item (an unusable
    /// suite), so the first failure fails the whole batch.
    pub fn seal_all<P>(&self, plaintexts: &[P], key: &SealingKey) -> Result<Vec<WireEnvelope>>
    where
        P: AsRef<[u8]> + Sync,
    {
        self.map_isolated(plaintexts, |_, plaintext| self.codec.seal(plaintext.as_ref(), key))
            .into_iter()
            .collect()
    }

    /// Open every envelope; failures are isolated per item.
    pub fn open_all(
        &self,
        envelopes: &[WireEnvelope],
        key: &SealingKey,
    ) -> BatchOutcome<Zeroizing<Vec<u8>>> {
        self.map_isolated(envelopes, |_, envelope| self.codec.open(envelope, key))
    }

    /// Apply `op` to every item, isolating failures.
    ///
    /// Failed items come back as `Error::BatchItemFailed { index, .. }`.
    pub fn map_isolated<T, U, F>(&self, items: &[T], op: F) -> BatchOutcome<U>
    where
        T: Sync,
        U: Send,
        F: Fn(usize, &T) -> Result<U> + Sync,
    {
        let run = |offset: usize, chunk: &[T]| -> Vec<Result<U>> {
            chunk
                .iter()
                .enumerate()
                .map(|(i, item)| {
                    let index = offset + i;
                    op(index, item).map_err(|e| {
                        tracing::debug!("Batch item {} failed: {}", index, e);
                        Error::batch_item(index, e)
                    })
                })
                .collect()
        };

        let workers = self.worker_count(items.len());
        if workers <= 1 {
            return BatchOutcome {
                results: run(0, items),
            };
        }

        let chunk_size = items.len().div_ceil(workers);
        let run = &run;
        let results = thread::scope(|scope| {
            let handles: Vec<_> = items
                .chunks(chunk_size)
                .enumerate()
                .map(|(n, chunk)| {
                    let offset = n * chunk_size;
                    (offset, chunk.len(), scope.spawn(move || run(offset, chunk)))
                })
                .collect();

            let mut results = Vec::with_capacity(items.len());
            for (offset, len, handle) in handles {
                match handle.join() {
                    Ok(chunk_results) => results.extend(chunk_results),
                    Err(_) => results.extend((offset..offset + len).map(|index| {
                        Err(Error::batch_item(
                            index,
                            Error::Internal("batch worker panicked".into()),
                        ))
                    })),
                }
            }
            results
        });

        BatchOutcome { results }
    }

    fn worker_count(&self, items: usize) -> usize {
        if items < self.config.parallel_threshold.max(2) {
            return 1;
        }
        let available = thread::available_parallelism().map_or(1, NonZeroUsize::get);
        let limit = self.config.max_workers.map_or(available, NonZeroUsize::get);
        available.min(limit).min(items)
    }
}
