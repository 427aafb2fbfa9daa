//! Accumulating per-file parse results into one transaction table.

use std::path::PathBuf;

use crate::transaction::Transaction;

/// Result of parsing one statement file
#[derive(Debug, Clone, PartialEq)]
pub enum FileOutcome {
    Parsed {
        file: PathBuf,
        records: Vec<Transaction>,
    },
    Failed {
        file: PathBuf,
        reason: String,
    },
}

impl FileOutcome {
    pub fn file(&self) -> &PathBuf {
        match self {
            FileOutcome::Parsed { file, .. } | FileOutcome::Failed { file, .. } => file,
        }
    }
}

/// Transactions accumulated across all successfully parsed files
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransactionTable {
    records: Vec<Transaction>,
}

impl TransactionTable {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[Transaction] {
        &self.records
    }

    pub fn descriptions(&self) -> impl Iterator<Item = &str> {
        self.records.iter().map(|t| t.description.as_str())
    }
}

impl From<Vec<Transaction>> for TransactionTable {
    fn from(records: Vec<Transaction>) -> Self {
        Self { records }
    }
}

/// Fold one file's outcome into the table. Failed files contribute nothing.
pub fn fold_outcome(mut table: TransactionTable, outcome: &FileOutcome) -> TransactionTable {
    if let FileOutcome::Parsed { records, .. } = outcome {
        table.records.extend(records.iter().cloned());
    }
    table
}
