//! Load-once cache for the classified file, invalidated when the file changes.

use std::fs;
use std::io;
use std::path::PathBuf;
use std::time::SystemTime;

use crate::store::{read_classified, StoreError};
use crate::transaction::ClassifiedTransaction;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Stamp {
    modified: Option<SystemTime>,
    len: u64,
}

#[derive(Debug)]
pub struct DatasetCache {
    path: PathBuf,
    entry: Option<(Stamp, Vec<ClassifiedTransaction>)>,
    loads: usize,
}

impl DatasetCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            entry: None,
            loads: 0,
        }
    }

    /// Number of times the file was actually read.
    pub fn loads(&self) -> usize {
        self.loads
    }

    /// Cached rows, reloading only when the file's mtime or size changed.
    pub fn get(&mut self) -> Result<&[ClassifiedTransaction], StoreError> {
        let stamp = match fs::metadata(&self.path) {
            Ok(meta) => Stamp {
                modified: meta.modified().ok(),
                len: meta.len(),
            },
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                self.entry = None;
                return Err(StoreError::Missing(self.path.clone()));
            }
            Err(source) => {
                return Err(StoreError::Io {
                    path: self.path.clone(),
                    source,
                });
            }
        };

        let fresh = matches!(&self.entry, Some((s, _)) if *s == stamp);
        if !fresh {
            let rows = read_classified(&self.path)?;
            self.loads += 1;
            log::info!("loaded {} rows from {}", rows.len(), self.path.display());
            self.entry = Some((stamp, rows));
        }

        match &self.entry {
            Some((_, rows)) => Ok(rows.as_slice()),
            None => Err(StoreError::Missing(self.path.clone())),
        }
    }

    pub fn invalidate(&mut self) {
        self.entry = None;
    }
}
