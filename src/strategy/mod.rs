//! Processing strategy module for operation log replay
//!
//! This module defines the Strategy pattern for complete replay pipelines,
//! covering both CSV parsing and engine execution. This allows different
//! processing implementations (synchronous, asynchronous batch) to be selected
//! at runtime.

use crate::cli::StrategyType;
use crate::core::{WalletEngine, WalletStore};
use crate::types::WalletError;
use std::io::Write;
use std::path::Path;

pub mod r#async;
pub mod sync;

pub use self::r#async::{AsyncProcessingStrategy, BatchConfig};
pub use sync::SyncProcessingStrategy;

/// Processing strategy trait for complete replay pipelines
///
/// Each strategy reads operations from a CSV file, executes them through its
/// engine, and writes the final account states to output.
pub trait ProcessingStrategy: Send + Sync {
    /// Replay the operations in `input_path` and write the accounts to `output`
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The input file cannot be opened
    /// - A fatal I/O error occurs during reading or writing
    /// - The store fails while the final account states are read
    ///
    /// Individual operation failures are logged and do not cause this method
    /// to return an error. Replay continues with the next operation.
    fn process(&self, input_path: &Path, output: &mut dyn Write) -> Result<(), WalletError>;
}

/// Create a processing strategy based on the specified strategy type
///
/// # Arguments
///
/// * `strategy_type` - The type of processing strategy to create (Sync or Async)
/// * `engine` - Engine the strategy replays into
/// * `config` - Optional configuration for async batch processing (ignored for sync)
pub fn create_strategy<S: WalletStore + 'static>(
    strategy_type: StrategyType,
    engine: WalletEngine<S>,
    config: Option<BatchConfig>,
) -> Box<dyn ProcessingStrategy> {
    match strategy_type {
        StrategyType::Sync => Box::new(SyncProcessingStrategy::new(engine)),
        StrategyType::Async => {
            let config = config.unwrap_or_default();
            Box::new(AsyncProcessingStrategy::new(engine, config))
        }
    }
}
