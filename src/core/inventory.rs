//! Inventory projection
//!
//! Derives what an account owns from its purchase records. Nothing here is
//! persisted; the view is rebuilt from the records on every call.

use crate::types::{Coins, InventoryLine, PurchaseRecord, WalletError};
use std::collections::BTreeMap;

/// Group purchase records by `(item_name, unit_price)` and sum quantities
///
/// The same item bought at two different catalog prices yields two lines.
/// Lines are returned sorted by item name, then price. Fails with
/// `ArithmeticOverflow` if a total does not fit.
pub fn project(records: &[PurchaseRecord]) -> Result<Vec<InventoryLine>, WalletError> {
    let mut totals: BTreeMap<(&str, Coins), i64> = BTreeMap::new();

    for record in records {
        let total = totals
            .entry((record.item_name.as_str(), record.unit_price))
            .or_default();
        *total = total
            .checked_add(record.quantity)
            .ok_or_else(|| WalletError::arithmetic_overflow("inventory", record.account))?;
    }

    Ok(totals
        .into_iter()
        .map(|((item_name, unit_price), total_quantity)| InventoryLine {
            item_name: item_name.to_string(),
            unit_price,
            total_quantity,
        })
        .collect())
}
