//! tally-ingest: OFX statement parsing and the directory ingest pass.

pub mod parsers;
pub mod scan;
pub mod types;

pub use parsers::ofx::{parse_ofx, parse_statement, OfxError};
pub use scan::{ingest_dir, ingest_file, scan_statement_dir, FileStatus, IngestReport, ScanError};
pub use types::{OfxAccount, OfxDocument, OfxStatement, OfxTransaction, StatementKind};
