//! Statement directory scan and the per-file ingest loop.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

use tally_core::{fold_outcome, FileOutcome, TransactionTable};

use crate::parsers::ofx::{decode_latin1, parse_statement};

pub const STATEMENT_EXTENSION: &str = "ofx";

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("statement directory '{}' not found", .0.display())]
    MissingDir(PathBuf),
    #[error("listing {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Per-file line in the ingest report
#[derive(Debug, Clone, PartialEq)]
pub enum FileStatus {
    Parsed { file: PathBuf, count: usize },
    Failed { file: PathBuf, reason: String },
}

#[derive(Debug, Clone, Default)]
pub struct IngestReport {
    pub table: TransactionTable,
    pub files: Vec<FileStatus>,
}

impl IngestReport {
    pub fn failed_count(&self) -> usize {
        self.files
            .iter()
            .filter(|f| matches!(f, FileStatus::Failed { .. }))
            .count()
    }
}

/// `.ofx` files (any case) directly under `dir`, sorted by name.
pub fn scan_statement_dir(dir: &Path) -> Result<Vec<PathBuf>, ScanError> {
    if !dir.is_dir() {
        return Err(ScanError::MissingDir(dir.to_path_buf()));
    }

    let io_err = |source| ScanError::Io {
        path: dir.to_path_buf(),
        source,
    };

    let mut files = Vec::new();
    for entry in fs::read_dir(dir).map_err(io_err)? {
        let path = entry.map_err(io_err)?.path();
        let is_statement = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case(STATEMENT_EXTENSION));
        if is_statement && path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Parse one file. Every failure is captured in the outcome.
pub fn ingest_file(path: &Path) -> FileOutcome {
    let result = fs::read(path)
        .map_err(|e| e.to_string())
        .and_then(|bytes| parse_statement(&decode_latin1(&bytes)).map_err(|e| e.to_string()));

    match result {
        Ok(records) => FileOutcome::Parsed {
            file: path.to_path_buf(),
            records,
        },
        Err(reason) => FileOutcome::Failed {
            file: path.to_path_buf(),
            reason,
        },
    }
}

/// Scan `dir` and fold every file's outcome into one table.
pub fn ingest_dir(dir: &Path) -> Result<IngestReport, ScanError> {
    let files = scan_statement_dir(dir)?;
    log::info!("reading {} statement file(s) from {}", files.len(), dir.display());

    let mut report = IngestReport::default();
    for path in files {
        let outcome = ingest_file(&path);
        let file = outcome.file().clone();
        let status = match &outcome {
            FileOutcome::Parsed { records, .. } => {
                log::info!("parsed '{}': {} transaction(s)", file.display(), records.len());
                FileStatus::Parsed {
                    file,
                    count: records.len(),
                }
            }
            FileOutcome::Failed { reason, .. } => {
                log::warn!("skipping '{}': {}", file.display(), reason);
                FileStatus::Failed {
                    file,
                    reason: reason.clone(),
                }
            }
        };
        report.table = fold_outcome(std::mem::take(&mut report.table), &outcome);
        report.files.push(status);
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn statement(fitid: &str, amount: &str) -> String {
        format!(
            "OFXHEADER:100\nDATA:OFXSGML\nENCODING: UTF - 8\n\n<OFX><BANKMSGSRSV1><STMTTRNRS><STMTRS>\
<BANKACCTFROM><ACCTID>1</BANKACCTFROM><BANKTRANLIST>\
<STMTTRN><TRNTYPE>DEBIT<DTPOSTED>20240503<TRNAMT>{amount}<FITID>{fitid}<MEMO>MERCADO DO ZE\
</STMTTRN></BANKTRANLIST></STMTRS></STMTTRNRS></BANKMSGSRSV1></OFX>"
        )
    }

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("tally-scan-{}-{}", std::process::id(), name));
        fs::remove_dir_all(&dir).ok();
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_missing_dir() {
        let err = scan_statement_dir(Path::new("/nonexistent/extratos")).unwrap_err();
        assert!(matches!(err, ScanError::MissingDir(_)));
    }

    #[test]
    fn test_only_statement_files_selected() {
        let dir = temp_dir("select");
        fs::write(dir.join("b.OFX"), statement("b", "-1.00")).unwrap();
        fs::write(dir.join("a.ofx"), statement("a", "-1.00")).unwrap();
        fs::write(dir.join("notes.txt"), "ignore me").unwrap();
        fs::write(dir.join("extrato.csv"), "x,y").unwrap();
        fs::create_dir_all(dir.join("nested.ofx")).unwrap();

        let files = scan_statement_dir(&dir).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.ofx", "b.OFX"]);
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_malformed_file_skipped_batch_continues() {
        let dir = temp_dir("batch");
        fs::write(dir.join("a.ofx"), statement("a1", "-10.00")).unwrap();
        fs::write(dir.join("b.ofx"), "<html>not a statement</html>").unwrap();
        fs::write(dir.join("c.ofx"), statement("c1", "25.50")).unwrap();

        let report = ingest_dir(&dir).unwrap();
        let ids: Vec<_> = report
            .table
            .records()
            .iter()
            .map(|t| t.external_id.as_str())
            .collect();
        assert_eq!(ids, vec!["a1", "c1"]);
        assert_eq!(report.failed_count(), 1);
        assert!(matches!(&report.files[1], FileStatus::Failed { file, .. } if file.ends_with("b.ofx")));
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_latin1_file_decoded() {
        let dir = temp_dir("latin1");
        let mut bytes = statement("x", "-3.00").into_bytes();
        let at = bytes.windows(6).position(|w| w == b"DO ZE\n" || w == b"DO ZE<").unwrap();
        bytes.splice(at + 3..at + 5, b"J\xC9".iter().copied());
        fs::write(dir.join("x.ofx"), bytes).unwrap();

        match ingest_file(&dir.join("x.ofx")) {
            FileOutcome::Parsed { records, .. } => {
                assert_eq!(records[0].description, "MERCADO DO JÉ");
            }
            other => panic!("expected parse, got {other:?}"),
        }
        fs::remove_dir_all(&dir).ok();
    }
}
