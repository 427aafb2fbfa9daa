//! The classified CSV file shared by `tally ingest` (writer) and the viewer (reader).
//!
//! Layout: UTF-8 with byte-order mark, header
//! `Date,Amount,Description,SourceID,Category`, dates as YYYY-MM-DD.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::category::Category;
use crate::transaction::{ClassifiedTransaction, Transaction};

const BOM: &[u8] = b"\xEF\xBB\xBF";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("file not found: {}", .0.display())]
    Missing(PathBuf),
    #[error("io error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
}

#[derive(Debug, Serialize, Deserialize)]
struct Row {
    #[serde(rename = "Date")]
    date: NaiveDate,
    #[serde(rename = "Amount")]
    amount: f64,
    #[serde(rename = "Description")]
    description: String,
    #[serde(rename = "SourceID")]
    source_id: String,
    #[serde(rename = "Category")]
    category: String,
}

/// Write the classified table, replacing whatever is at `path`.
pub fn write_classified(path: &Path, rows: &[ClassifiedTransaction]) -> Result<(), StoreError> {
    let io_err = |source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    };

    let mut file = fs::File::create(path).map_err(io_err)?;
    file.write_all(BOM).map_err(io_err)?;

    let mut wtr = csv::Writer::from_writer(file);
    for r in rows {
        wtr.serialize(Row {
            date: r.transaction.date,
            amount: r.transaction.amount,
            description: r.transaction.description.clone(),
            source_id: r.transaction.external_id.clone(),
            category: r.category.label().to_string(),
        })?;
    }
    wtr.flush().map_err(io_err)?;
    Ok(())
}

/// Read the classified table back. A missing file is `StoreError::Missing`.
pub fn read_classified(path: &Path) -> Result<Vec<ClassifiedTransaction>, StoreError> {
    let bytes = fs::read(path).map_err(|source| {
        if source.kind() == io::ErrorKind::NotFound {
            StoreError::Missing(path.to_path_buf())
        } else {
            StoreError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    })?;
    let body = bytes.strip_prefix(BOM).unwrap_or(&bytes);

    let mut rdr = csv::Reader::from_reader(body);
    let mut out = Vec::new();
    for result in rdr.deserialize() {
        let row: Row = result?;
        let category = Category::from_label(row.category.trim()).unwrap_or_else(|| {
            log::warn!(
                "unknown category {:?} for {}; using {}",
                row.category,
                row.source_id,
                Category::Unclassified
            );
            Category::Unclassified
        });
        out.push(ClassifiedTransaction::new(
            Transaction::new(row.date, row.amount, row.description, row.source_id),
            category,
        ));
    }
    Ok(out)
}
