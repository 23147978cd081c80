//! CSV format handling for operation logs and account output
//!
//! This module centralizes all CSV format concerns, providing:
//! - CsvRecord structure for deserialization
//! - Conversion from CSV records to wallet operations
//! - Account output serialization
//!
//! All functions are pure (no I/O) for easy testing.

use crate::types::{Account, Coins, OperationKind, WalletError, WalletOperation};
use serde::Deserialize;
use std::io::Write;

/// CSV record structure for deserialization
///
/// Matches the input CSV format with columns: op, user, target, amount.
/// `target` is the recipient for transfers and the item for purchases;
/// `amount` is coins for deposits and transfers and the quantity for purchases.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct CsvRecord {
    pub op: String,
    pub user: String,
    pub target: Option<String>,
    pub amount: Option<String>,
}

fn non_blank(field: Option<String>) -> Option<String> {
    field
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_integer(op: OperationKind, field: &str, value: &str) -> Result<i64, WalletError> {
    value.parse::<i64>().map_err(|_| {
        WalletError::invalid_operation(op, format!("{} '{}' is not an integer", field, value))
    })
}

fn required(op: OperationKind, field: &str, value: Option<String>) -> Result<String, WalletError> {
    value.ok_or_else(|| WalletError::invalid_operation(op, format!("missing {}", field)))
}

/// Convert a CsvRecord to a WalletOperation
///
/// This function:
/// - Parses the op string (case insensitive)
/// - Checks that the fields each op needs are present
/// - Parses amounts and quantities as whole coins
///
/// Range checks (positive amounts, known users, catalog items) are left to the
/// engine so that the same rules apply to every caller.
pub fn convert_csv_record(csv_record: CsvRecord) -> Result<WalletOperation, WalletError> {
    let kind = match csv_record.op.trim().to_lowercase().as_str() {
        "register" => OperationKind::Register,
        "deposit" => OperationKind::Deposit,
        "transfer" => OperationKind::Transfer,
        "buy" => OperationKind::Buy,
        _ => {
            return Err(WalletError::invalid_operation(
                csv_record.op.trim(),
                "unknown operation",
            ))
        }
    };

    let user = csv_record.user.trim().to_string();
    if user.is_empty() {
        return Err(WalletError::invalid_operation(kind, "missing user"));
    }

    let target = non_blank(csv_record.target);
    let amount = non_blank(csv_record.amount);

    match kind {
        OperationKind::Register => Ok(WalletOperation::Register { username: user }),
        OperationKind::Deposit => {
            let amount: Coins = parse_integer(kind, "amount", &required(kind, "amount", amount)?)?;
            Ok(WalletOperation::Deposit {
                username: user,
                amount,
            })
        }
        OperationKind::Transfer => {
            let to = required(kind, "target", target)?;
            let amount: Coins = parse_integer(kind, "amount", &required(kind, "amount", amount)?)?;
            Ok(WalletOperation::Transfer {
                from: user,
                to,
                amount,
            })
        }
        OperationKind::Buy => {
            let item = required(kind, "target", target)?;
            let quantity = match amount {
                Some(value) => parse_integer(kind, "quantity", &value)?,
                None => 1,
            };
            Ok(WalletOperation::Purchase {
                username: user,
                item,
                quantity,
            })
        }
    }
}

/// Write account states to CSV format
///
/// Writes accounts in CSV format with columns: account, username, balance.
/// Accounts are sorted by id for deterministic output.
pub fn write_accounts_csv(accounts: &[Account], output: &mut dyn Write) -> Result<(), WalletError> {
    let mut writer = csv::Writer::from_writer(output);

    writer.write_record(["account", "username", "balance"])?;

    let mut sorted_accounts = accounts.to_vec();
    sorted_accounts.sort_by_key(|account| account.id);

    for account in sorted_accounts {
        writer.write_record(&[
            account.id.to_string(),
            account.username,
            account.balance.to_string(),
        ])?;
    }

    writer.flush()?;

    Ok(())
}
