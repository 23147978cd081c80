//! Storage backends
//!
//! - `memory` - In-process store with per-account locking (default)
//! - `sqlite` - Persistent store using SQLite transactions

pub mod memory;
pub mod sqlite;

pub use memory::{MemoryStore, MemoryTransaction};
pub use sqlite::{SqliteStore, SqliteTransaction};
