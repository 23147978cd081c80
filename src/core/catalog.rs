//! Catalog of purchasable items
//!
//! A static name to price table. The engine always prices a purchase from
//! here, never from caller input.

use crate::types::{CatalogItem, Coins, WalletError};
use csv::{ReaderBuilder, Trim};
use std::collections::HashMap;
use std::path::Path;

/// Merch sold by the shop when no catalog file is given
const DEFAULT_ITEMS: &[(&str, Coins)] = &[
    ("t-shirt", 80),
    ("cup", 20),
    ("book", 50),
    ("pen", 10),
    ("powerbank", 200),
    ("hoody", 300),
    ("umbrella", 200),
    ("socks", 10),
    ("wallet", 50),
    ("pink-hoody", 500),
];

/// Read-only item price table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Catalog {
    prices: HashMap<String, Coins>,
}

impl Catalog {
    /// Build a catalog from items
    ///
    /// # Errors
    ///
    /// Returns `InvalidAmount` for a non-positive price and `ParseError` for a
    /// name that appears twice.
    pub fn from_items<I>(items: I) -> Result<Self, WalletError>
    where
        I: IntoIterator<Item = CatalogItem>,
    {
        let mut prices = HashMap::new();

        for item in items {
            if item.price <= 0 {
                return Err(WalletError::invalid_amount(item.price));
            }
            if prices.insert(item.name.clone(), item.price).is_some() {
                return Err(WalletError::ParseError {
                    line: None,
                    message: format!("duplicate catalog item '{}'", item.name),
                });
            }
        }

        Ok(Self { prices })
    }

    /// Load a `name,price` CSV file
    pub fn from_csv(path: &Path) -> Result<Self, WalletError> {
        if !path.exists() {
            return Err(WalletError::FileNotFound {
                path: path.display().to_string(),
            });
        }

        let mut reader = ReaderBuilder::new().trim(Trim::All).from_path(path)?;
        let items = reader
            .deserialize::<CatalogItem>()
            .collect::<Result<Vec<_>, _>>()?;

        let catalog = Self::from_items(items)?;
        tracing::info!(items = catalog.len(), path = %path.display(), "catalog loaded");
        Ok(catalog)
    }

    /// Price of an item
    ///
    /// # Errors
    ///
    /// Returns `ItemNotFound` if the item is not sold.
    pub fn price_of(&self, item_name: &str) -> Result<Coins, WalletError> {
        self.prices
            .get(item_name)
            .copied()
            .ok_or_else(|| WalletError::item_not_found(item_name))
    }

    /// All items sorted by name
    pub fn items(&self) -> Vec<CatalogItem> {
        let mut items: Vec<CatalogItem> = self
            .prices
            .iter()
            .map(|(name, price)| CatalogItem {
                name: name.clone(),
                price: *price,
            })
            .collect();
        items.sort_by(|a, b| a.name.cmp(&b.name));
        items
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self {
            prices: DEFAULT_ITEMS
                .iter()
                .map(|(name, price)| (name.to_string(), *price))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[rstest]
    #[case("t-shirt", 80)]
    #[case("book", 50)]
    #[case("pink-hoody", 500)]
    fn test_default_prices(#[case] item: &str, #[case] price: Coins) {
        assert_eq!(Catalog::default().price_of(item), Ok(price));
    }

    #[test]
    fn test_unknown_item() {
        assert_eq!(
            Catalog::default().price_of("yacht"),
            Err(WalletError::item_not_found("yacht"))
        );
    }

    #[test]
    fn test_from_items_rejects_non_positive_price() {
        let result = Catalog::from_items(vec![CatalogItem {
            name: "freebie".to_string(),
            price: 0,
        }]);
        assert_eq!(result, Err(WalletError::invalid_amount(0)));
    }

    #[test]
    fn test_from_items_rejects_duplicates() {
        let item = CatalogItem {
            name: "cup".to_string(),
            price: 20,
        };
        let result = Catalog::from_items(vec![item.clone(), item]);
        assert!(matches!(result, Err(WalletError::ParseError { .. })));
    }

    #[test]
    fn test_from_csv() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"name,price\nsticker, 5\nmug,25\n").unwrap();
        file.flush().unwrap();

        let catalog = Catalog::from_csv(file.path()).unwrap();

        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.price_of("sticker"), Ok(5));
        assert_eq!(catalog.price_of("book"), Err(WalletError::item_not_found("book")));
    }

    #[test]
    fn test_from_csv_missing_file() {
        let result = Catalog::from_csv(Path::new("no/such/catalog.csv"));
        assert!(matches!(result, Err(WalletError::FileNotFound { .. })));
    }

    #[test]
    fn test_items_sorted() {
        let items = Catalog::default().items();
        assert_eq!(items.len(), 10);
        assert_eq!(items[0].name, "book");
    }
}
