//! Catalog items and inventory lines

use super::account::Coins;
use serde::{Deserialize, Serialize};

/// A purchasable item
///
/// Read-only reference data; the engine never mutates it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogItem {
    pub name: String,
    pub price: Coins,
}

/// Derived quantity of one item (at one price) held by an account
///
/// Never stored; recomputed from purchase records on demand.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct InventoryLine {
    pub item_name: String,
    pub unit_price: Coins,
    pub total_quantity: i64,
}
