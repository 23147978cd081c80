//! Read side of the transfer ledger

use crate::types::LedgerEntry;
use std::cmp::Reverse;

/// Order entries newest first
///
/// Entries committed in the same instant keep commit order reversed through
/// the id tie-break, so the result is deterministic for a given snapshot.
pub fn newest_first(mut entries: Vec<LedgerEntry>) -> Vec<LedgerEntry> {
    entries.sort_by_key(|entry| Reverse((entry.created_at, entry.id)));
    entries
}
