//! bindex diagnostics: append-only listings of records and batches that did not load.
//! One file per failure category, each written under its own lock.

#![forbid(unsafe_code)]

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use anyhow::{Context, Result};
use metrics::counter;
use tracing::{debug, warn};

/// Failure categories, each with its own sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SinkKind {
    /// Bulk submission never reached the search engine.
    PostRequestError,
    /// Bulk submission answered with a non-success status.
    UnexpectedResponse,
    /// Record attributes present but the name is empty.
    MissingName,
    /// Record has no attributes at all.
    MissingAttributes,
    /// Enrichment call failed.
    EnrichmentError,
}

impl SinkKind {
    pub const ALL: [SinkKind; 5] = [
        SinkKind::PostRequestError,
        SinkKind::UnexpectedResponse,
        SinkKind::MissingName,
        SinkKind::MissingAttributes,
        SinkKind::EnrichmentError,
    ];

    pub fn file_name(self) -> &'static str {
        match self {
            SinkKind::PostRequestError => "error-posting-request.txt",
            SinkKind::UnexpectedResponse => "unexpected-put-response.txt",
            SinkKind::MissingName => "missing-company-name.txt",
            SinkKind::MissingAttributes => "missing-company-data.txt",
            SinkKind::EnrichmentError => "alpha-key-errors.txt",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SinkKind::PostRequestError => "post_request_error",
            SinkKind::UnexpectedResponse => "unexpected_response",
            SinkKind::MissingName => "missing_name",
            SinkKind::MissingAttributes => "missing_attributes",
            SinkKind::EnrichmentError => "enrichment_error",
        }
    }

    fn slot(self) -> usize {
        match self {
            SinkKind::PostRequestError => 0,
            SinkKind::UnexpectedResponse => 1,
            SinkKind::MissingName => 2,
            SinkKind::MissingAttributes => 3,
            SinkKind::EnrichmentError => 4,
        }
    }
}

/// Append-only diagnostic output, safe to share between concurrent batches.
///
/// Appends never fail the caller; write errors are logged.
pub trait DiagnosticSink: Send + Sync {
    fn append(&self, kind: SinkKind, entry: &str);
}

/// File-backed sinks under a single directory.
pub struct FileSinks {
    dir: PathBuf,
    files: Vec<Mutex<File>>,
}

impl FileSinks {
    /// Create `dir` if needed and open every sink file for appending.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir).with_context(|| format!("creating errors dir {}", dir.display()))?;
        let mut files = Vec::with_capacity(SinkKind::ALL.len());
        for kind in SinkKind::ALL {
            let path = dir.join(kind.file_name());
            let f = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .with_context(|| format!("opening [{}] file", path.display()))?;
            files.push(Mutex::new(f));
        }
        debug!(dir = %dir.display(), "diagnostic sinks opened");
        Ok(Self { dir, files })
    }

    pub fn path(&self, kind: SinkKind) -> PathBuf { self.dir.join(kind.file_name()) }

    /// Flush every sink to disk and release the files.
    pub fn close(self) -> Result<()> {
        for (kind, f) in SinkKind::ALL.into_iter().zip(self.files) {
            let f = f.into_inner().unwrap_or_else(PoisonError::into_inner);
            f.sync_all().with_context(|| format!("closing [{}] file", kind.file_name()))?;
        }
        Ok(())
    }
}

impl DiagnosticSink for FileSinks {
    fn append(&self, kind: SinkKind, entry: &str) {
        let mut f = self.files[kind.slot()].lock().unwrap_or_else(PoisonError::into_inner);
        let mut line = String::with_capacity(entry.len() + 1);
        line.push_str(entry);
        line.push('\n');
        match f.write_all(line.as_bytes()) {
            Ok(()) => {
                counter!("bindex_diag_lines_total", 1u64, "sink" => kind.label());
            }
            Err(e) => {
                warn!(sink = kind.label(), error = %e, entry, "error writing diagnostic entry");
            }
        }
    }
}

/// In-memory sinks for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemorySinks {
    entries: Mutex<Vec<(SinkKind, String)>>,
}

impl MemorySinks {
    pub fn new() -> Self { Self::default() }

    pub fn entries(&self, kind: SinkKind) -> Vec<String> {
        let guard = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        guard.iter().filter(|(k, _)| *k == kind).map(|(_, e)| e.clone()).collect()
    }

    pub fn count(&self, kind: SinkKind) -> usize {
        let guard = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        guard.iter().filter(|(k, _)| *k == kind).count()
    }

    pub fn total(&self) -> usize {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

impl DiagnosticSink for MemorySinks {
    fn append(&self, kind: SinkKind, entry: &str) {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).push((kind, entry.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn temp_dir() -> PathBuf {
        let nanos = std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH).unwrap().as_nanos();
        std::env::temp_dir().join(format!("bindex-diag-test-{}", nanos))
    }

    #[test]
    fn appends_land_in_their_own_file() {
        let dir = temp_dir();
        let sinks = FileSinks::open(&dir).unwrap();
        sinks.append(SinkKind::MissingName, "0001");
        sinks.append(SinkKind::MissingName, "0002");
        sinks.append(SinkKind::PostRequestError, "0003\n0004");
        let name_path = sinks.path(SinkKind::MissingName);
        let post_path = sinks.path(SinkKind::PostRequestError);
        let data_path = sinks.path(SinkKind::MissingAttributes);
        sinks.close().unwrap();

        assert_eq!(std::fs::read_to_string(name_path).unwrap(), "0001\n0002\n");
        assert_eq!(std::fs::read_to_string(post_path).unwrap(), "0003\n0004\n");
        assert_eq!(std::fs::read_to_string(data_path).unwrap(), "");
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn reopening_appends_rather_than_truncates() {
        let dir = temp_dir();
        let first = FileSinks::open(&dir).unwrap();
        first.append(SinkKind::EnrichmentError, "a");
        first.close().unwrap();
        let second = FileSinks::open(&dir).unwrap();
        second.append(SinkKind::EnrichmentError, "b");
        let path = second.path(SinkKind::EnrichmentError);
        second.close().unwrap();
        assert_eq!(std::fs::read_to_string(path).unwrap(), "a\nb\n");
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn concurrent_appends_are_not_interleaved() {
        let dir = temp_dir();
        let sinks = Arc::new(FileSinks::open(&dir).unwrap());
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let s = Arc::clone(&sinks);
                std::thread::spawn(move || {
                    for i in 0..50 { s.append(SinkKind::UnexpectedResponse, &format!("t{}-{}", t, i)); }
                })
            })
            .collect();
        for h in handles { h.join().unwrap(); }
        let path = sinks.path(SinkKind::UnexpectedResponse);
        let body = std::fs::read_to_string(path).unwrap();
        let lines: Vec<_> = body.lines().collect();
        assert_eq!(lines.len(), 400);
        assert!(lines.iter().all(|l| l.starts_with('t') && l.contains('-')));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn memory_sinks_keep_categories_apart() {
        let m = MemorySinks::new();
        m.append(SinkKind::MissingName, "1");
        m.append(SinkKind::MissingAttributes, "2");
        assert_eq!(m.entries(SinkKind::MissingName), vec!["1".to_string()]);
        assert_eq!(m.count(SinkKind::MissingAttributes), 1);
        assert_eq!(m.count(SinkKind::EnrichmentError), 0);
        assert_eq!(m.total(), 2);
    }
}
