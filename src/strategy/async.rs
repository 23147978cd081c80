//! Asynchronous batch processing strategy
//!
//! This module provides a multi-threaded implementation of the
//! ProcessingStrategy trait. Operations are read in batches and each batch is
//! executed by a [`BatchProcessor`] that partitions it into groups of
//! connected users.
//!
//! # Architecture
//!
//! ```text
//! AsyncProcessingStrategy
//!     ├── BatchConfig (batch_size, max_concurrent_batches)
//!     ├── AsyncReader (batch CSV reading)
//!     └── BatchProcessor (registration runs, then one task per user group)
//!         └── WalletEngine<S> (store transactions)
//! ```
//!
//! # Ordering
//!
//! - Batches are processed sequentially
//! - Registrations keep their place in file order
//! - Within a batch, groups of users that never transfer to each other run
//!   concurrently on blocking tasks, so the final state matches a sync replay

use crate::core::{BatchProcessor, WalletEngine, WalletStore};
use crate::io::async_reader::AsyncReader;
use crate::io::csv_format::write_accounts_csv;
use crate::strategy::ProcessingStrategy;
use crate::types::WalletError;
use std::io::Write;
use std::path::Path;
use tracing::{info, warn};

/// Configuration for batch processing
///
/// Controls how operations are batched and how many blocking workers run
/// partitions concurrently.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BatchConfig {
    /// Number of operations per batch
    pub batch_size: usize,
    /// Maximum number of partitions executing concurrently
    pub max_concurrent_batches: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_size: 1000,
            max_concurrent_batches: num_cpus::get(),
        }
    }
}

impl BatchConfig {
    /// Create a new BatchConfig with custom values
    ///
    /// Zero values fall back to the defaults.
    pub fn new(batch_size: usize, max_concurrent_batches: usize) -> Self {
        let default = Self::default();

        let batch_size = if batch_size == 0 {
            warn!(
                batch_size,
                default = default.batch_size,
                "invalid batch_size, using default"
            );
            default.batch_size
        } else {
            batch_size
        };

        let max_concurrent_batches = if max_concurrent_batches == 0 {
            warn!(
                max_concurrent_batches,
                default = default.max_concurrent_batches,
                "invalid max_concurrent_batches, using default"
            );
            default.max_concurrent_batches
        } else {
            max_concurrent_batches
        };

        Self {
            batch_size,
            max_concurrent_batches,
        }
    }
}

/// Asynchronous batch processing strategy
pub struct AsyncProcessingStrategy<S: WalletStore> {
    engine: WalletEngine<S>,
    config: BatchConfig,
}

impl<S: WalletStore + 'static> AsyncProcessingStrategy<S> {
    /// Create a new AsyncProcessingStrategy
    ///
    /// # Arguments
    ///
    /// * `engine` - Engine the strategy replays into
    /// * `config` - BatchConfig with batch_size and max_concurrent_batches
    pub fn new(engine: WalletEngine<S>, config: BatchConfig) -> Self {
        Self { engine, config }
    }
}

impl<S: WalletStore + 'static> ProcessingStrategy for AsyncProcessingStrategy<S> {
    fn process(&self, input_path: &Path, output: &mut dyn Write) -> Result<(), WalletError> {
        if !input_path.exists() {
            return Err(WalletError::FileNotFound {
                path: input_path.display().to_string(),
            });
        }

        // Partitions run on the blocking pool, so that is the pool to bound
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(self.config.max_concurrent_batches)
            .max_blocking_threads(self.config.max_concurrent_batches)
            .build()?;

        runtime.block_on(async {
            let processor = BatchProcessor::new(self.engine.clone());

            let file = tokio::fs::File::open(input_path).await?;

            // Wrap tokio file in a compatibility layer for csv-async
            let compat_file = tokio_util::compat::TokioAsyncReadCompatExt::compat(file);
            let mut reader = AsyncReader::new(compat_file);

            let mut batches = 0usize;
            let mut failed = 0usize;

            loop {
                let batch = reader.read_batch(self.config.batch_size).await;
                if batch.is_empty() {
                    break;
                }

                // Wait for the whole batch before reading the next one
                let results = processor.process_batch(batch).await;
                failed += results.iter().filter(|r| r.result.is_err()).count();
                batches += 1;
            }

            info!(batches, failed, "replay finished");

            write_accounts_csv(&self.engine.accounts()?, output)
        })
    }
}
