//! Synchronous processing strategy
//!
//! This module provides a single-threaded implementation of the
//! ProcessingStrategy trait. Operations are executed in file order on the
//! calling thread.
//!
//! # Design
//!
//! The SyncProcessingStrategy focuses on orchestration, delegating:
//! - CSV parsing to `SyncReader` (iterator interface)
//! - Operation execution to `WalletEngine` (business logic)
//! - CSV output to `csv_format::write_accounts_csv` (format handling)

use crate::core::batch_processor::execute_logged;
use crate::core::{WalletEngine, WalletStore};
use crate::io::csv_format::write_accounts_csv;
use crate::io::sync_reader::SyncReader;
use crate::strategy::ProcessingStrategy;
use crate::types::WalletError;
use std::io::Write;
use std::path::Path;
use tracing::{info, warn};

/// Synchronous processing strategy
///
/// # Examples
///
/// ```no_run
/// use coin_wallet::core::{Catalog, MemoryStore, WalletConfig, WalletEngine};
/// use coin_wallet::strategy::{ProcessingStrategy, SyncProcessingStrategy};
/// use std::path::Path;
/// use std::sync::Arc;
///
/// let engine = WalletEngine::new(
///     Arc::new(MemoryStore::new()),
///     Arc::new(Catalog::default()),
///     WalletConfig::default(),
/// );
/// let strategy = SyncProcessingStrategy::new(engine);
///
/// strategy
///     .process(Path::new("operations.csv"), &mut std::io::stdout())
///     .expect("Replay failed");
/// ```
pub struct SyncProcessingStrategy<S: WalletStore> {
    engine: WalletEngine<S>,
}

impl<S: WalletStore> SyncProcessingStrategy<S> {
    pub fn new(engine: WalletEngine<S>) -> Self {
        Self { engine }
    }
}

impl<S: WalletStore> ProcessingStrategy for SyncProcessingStrategy<S> {
    fn process(&self, input_path: &Path, output: &mut dyn Write) -> Result<(), WalletError> {
        let reader = SyncReader::new(input_path)?;

        let mut executed = 0usize;
        let mut failed = 0usize;

        for result in reader {
            match result {
                Ok(operation) => {
                    executed += 1;
                    if execute_logged(&self.engine, &operation).is_err() {
                        failed += 1;
                    }
                }
                Err(e) => warn!(error = %e, "skipping invalid row"),
            }
        }

        info!(executed, failed, "replay finished");

        write_accounts_csv(&self.engine.accounts()?, output)
    }
}
