//! bindex sources: paged readers yielding raw company records in store order.

#![forbid(unsafe_code)]

use std::collections::VecDeque;
use std::path::Path;

use anyhow::Context;
use bindex_core::{Error, RawRecord, Result};
use metrics::counter;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader, Lines};
use tracing::{debug, warn};

/// A paged, ordered stream of records.
///
/// `next_page` returns at most `max_count` records; an empty page means the source is exhausted.
#[async_trait::async_trait]
pub trait RecordSource: Send {
    async fn next_page(&mut self, max_count: usize) -> Result<Vec<RawRecord>>;
}

/// Source over records held in memory. Used by tests and small replays.
#[derive(Debug, Default)]
pub struct MemorySource {
    records: VecDeque<RawRecord>,
    pages: usize,
}

impl MemorySource {
    pub fn new(records: Vec<RawRecord>) -> Self {
        Self { records: records.into(), pages: 0 }
    }

    /// Number of non-empty pages served so far.
    pub fn pages_served(&self) -> usize { self.pages }
}

#[async_trait::async_trait]
impl RecordSource for MemorySource {
    async fn next_page(&mut self, max_count: usize) -> Result<Vec<RawRecord>> {
        let n = max_count.min(self.records.len());
        if n > 0 { self.pages += 1; }
        Ok(self.records.drain(..n).collect())
    }
}

/// Newline-delimited JSON export of the company collection, one record per line.
///
/// Blank lines are ignored; lines that fail to decode are logged and skipped.
pub struct NdjsonSource {
    lines: Lines<BufReader<File>>,
    line_no: u64,
    undecodable: u64,
}

impl NdjsonSource {
    pub async fn open(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .await
            .with_context(|| format!("opening record source {}", path.display()))?;
        debug!(path = %path.display(), "record source opened");
        Ok(Self { lines: BufReader::new(file).lines(), line_no: 0, undecodable: 0 })
    }

    /// Lines skipped because they did not decode as a record.
    pub fn undecodable(&self) -> u64 { self.undecodable }
}

#[async_trait::async_trait]
impl RecordSource for NdjsonSource {
    async fn next_page(&mut self, max_count: usize) -> Result<Vec<RawRecord>> {
        let mut page = Vec::with_capacity(max_count);
        while page.len() < max_count {
            let line = match self.lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(e) => return Err(Error::Source(format!("reading line {}: {}", self.line_no + 1, e))),
            };
            self.line_no += 1;
            if line.trim().is_empty() { continue; }
            match serde_json::from_str::<RawRecord>(&line) {
                Ok(rec) => page.push(rec),
                Err(e) => {
                    self.undecodable += 1;
                    counter!("bindex_source_undecodable_total", 1u64);
                    warn!(line = self.line_no, error = %e, "skipping undecodable record");
                }
            }
        }
        Ok(page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_source_pages_until_empty() {
        let recs: Vec<_> = (0..7).map(|i| RawRecord::new(i.to_string(), None)).collect();
        let mut src = MemorySource::new(recs);
        assert_eq!(src.next_page(3).await.unwrap().len(), 3);
        assert_eq!(src.next_page(3).await.unwrap().len(), 3);
        let last = src.next_page(3).await.unwrap();
        assert_eq!(last.len(), 1);
        assert_eq!(last[0].id, "6");
        assert!(src.next_page(3).await.unwrap().is_empty());
        assert_eq!(src.pages_served(), 3);
    }
}
