//! # Ledger Entities
//!
//! The stored objects a bus message can reference.
//!
//! ## Clusters
//!
//! - **Accounts & Postings**: `Account`, `Transaction`, `Tag`
//! - **Planning**: `Budget`, `Reminder`
//! - **Commodities**: `CommodityNode`, `ExchangeRate`
//! - **Settings**: `Config`
//!
//! Every entity carries a `uuid`, its durable identity. Two engines may each
//! hold an instance with the same `uuid`; those are the same logical object.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::objects::ObjectId;

// =============================================================================
// CLUSTER A: ACCOUNTS & POSTINGS
// =============================================================================

/// Broad classification of an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum AccountType {
    /// Root of the account tree.
    Root,
    /// Bank or cash account.
    #[default]
    Bank,
    /// Credit card or loan.
    Liability,
    /// Income category.
    Income,
    /// Expense category.
    Expense,
    /// Brokerage account holding securities.
    Investment,
}

/// A node in the account tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    /// Durable identity.
    pub uuid: ObjectId,
    /// Display name.
    pub name: String,
    /// Account classification.
    pub account_type: AccountType,
    /// Parent account, `None` only for the root.
    pub parent: Option<ObjectId>,
    /// Whether the account is shown in account lists.
    pub visible: bool,
}

impl Account {
    /// Create a visible top-level account with a fresh identity.
    pub fn new(name: impl Into<String>, account_type: AccountType) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            name: name.into(),
            account_type,
            parent: None,
            visible: true,
        }
    }

    /// Set the parent account.
    #[must_use]
    pub fn with_parent(mut self, parent: ObjectId) -> Self {
        self.parent = Some(parent);
        self
    }
}

/// A balanced posting between accounts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Durable identity.
    pub uuid: ObjectId,
    /// Free-form memo.
    pub memo: String,
    /// Amount in minor currency units.
    pub amount: i64,
    /// Accounts touched by this transaction.
    pub accounts: Vec<ObjectId>,
}

impl Transaction {
    /// Create a transaction touching the given accounts.
    pub fn new(memo: impl Into<String>, amount: i64, accounts: Vec<ObjectId>) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            memo: memo.into(),
            amount,
            accounts,
        }
    }
}

/// A user-defined label attached to transactions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    /// Durable identity.
    pub uuid: ObjectId,
    /// Label text.
    pub name: String,
}

impl Tag {
    /// Create a tag.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            name: name.into(),
        }
    }
}

// =============================================================================
// CLUSTER B: PLANNING
// =============================================================================

/// A spending plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Budget {
    /// Durable identity.
    pub uuid: ObjectId,
    /// Display name.
    pub name: String,
}

impl Budget {
    /// Create a budget.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            name: name.into(),
        }
    }
}

/// A scheduled transaction reminder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reminder {
    /// Durable identity.
    pub uuid: ObjectId,
    /// What the reminder is for.
    pub description: String,
    /// Account the reminder posts into.
    pub account: Option<ObjectId>,
}

impl Reminder {
    /// Create a reminder.
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            description: description.into(),
            account: None,
        }
    }
}

// =============================================================================
// CLUSTER C: COMMODITIES
// =============================================================================

/// Whether a commodity is a currency or a traded security.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CommodityKind {
    /// ISO currency.
    Currency,
    /// Stock, fund or other security.
    Security,
}

/// A currency or security.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommodityNode {
    /// Durable identity.
    pub uuid: ObjectId,
    /// Ticker or ISO code.
    pub symbol: String,
    /// Currency or security.
    pub kind: CommodityKind,
}

impl CommodityNode {
    /// Create a currency node.
    pub fn currency(symbol: impl Into<String>) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            symbol: symbol.into(),
            kind: CommodityKind::Currency,
        }
    }

    /// Create a security node.
    pub fn security(symbol: impl Into<String>) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            symbol: symbol.into(),
            kind: CommodityKind::Security,
        }
    }
}

/// Conversion rate between two currencies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeRate {
    /// Durable identity.
    pub uuid: ObjectId,
    /// Currency pair key, e.g. `USDEUR`.
    pub pair: String,
}

impl ExchangeRate {
    /// Create an exchange rate for a currency pair.
    pub fn new(pair: impl Into<String>) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            pair: pair.into(),
        }
    }
}

// =============================================================================
// CLUSTER D: SETTINGS
// =============================================================================

/// Engine-wide settings object; there is one per data store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Durable identity.
    pub uuid: ObjectId,
    /// Default currency for new accounts.
    pub default_currency: Option<ObjectId>,
}

impl Config {
    /// Create an empty settings object.
    pub fn new() -> Self {
        Self {
            uuid: Uuid::new_v4(),
            default_currency: None,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account_with_parent() {
        let root = Account::new("Root", AccountType::Root);
        let child = Account::new("Checking", AccountType::Bank).with_parent(root.uuid);

        assert_eq!(child.parent, Some(root.uuid));
        assert!(child.visible);
        assert_ne!(child.uuid, root.uuid);
    }

    #[test]
    fn test_commodity_constructors() {
        assert_eq!(CommodityNode::currency("USD").kind, CommodityKind::Currency);
        assert_eq!(CommodityNode::security("ACME").kind, CommodityKind::Security);
    }
}
