//! Transaction record types shared by ingestion and the viewer

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::category::Category;

/// A transaction extracted from a statement file
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Transaction {
    /// Posting date, time-of-day discarded
    pub date: NaiveDate,
    /// Positive = inflow, negative = outflow
    pub amount: f64,
    /// Free-text memo from the statement
    pub description: String,
    /// Identifier assigned by the bank; not guaranteed unique across files
    pub external_id: String,
}

impl Transaction {
    pub fn new(
        date: NaiveDate,
        amount: f64,
        description: impl Into<String>,
        external_id: impl Into<String>,
    ) -> Self {
        Self {
            date,
            amount,
            description: description.into(),
            external_id: external_id.into(),
        }
    }

    pub fn is_inflow(&self) -> bool {
        self.amount > 0.0
    }

    pub fn is_outflow(&self) -> bool {
        self.amount < 0.0
    }
}

/// A transaction enriched with its category
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifiedTransaction {
    pub transaction: Transaction,
    pub category: Category,
}

impl ClassifiedTransaction {
    pub fn new(transaction: Transaction, category: Category) -> Self {
        Self {
            transaction,
            category,
        }
    }

    pub fn date(&self) -> NaiveDate {
        self.transaction.date
    }

    pub fn amount(&self) -> f64 {
        self.transaction.amount
    }

    pub fn description(&self) -> &str {
        &self.transaction.description
    }
}
