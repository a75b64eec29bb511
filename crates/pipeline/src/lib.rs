//! bindex pipeline: pulls pages from a [`RecordSource`](bindex_source::RecordSource), enriches and
//! transforms each page as one batch unit, and submits the batches under a concurrency limit.

#![forbid(unsafe_code)]

use std::time::Duration;

mod pipeline;
pub mod reporter;
pub mod transform;

pub use pipeline::{Pipeline, RunSummary};
pub use reporter::{spawn_reporter, Reporter, ReporterHandle, Totals};
pub use transform::{SkipReason, Transformed, Transformer};

/// Run knobs. Zero sizes are raised to 1 by [`PipelineConfig::normalized`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Records requested per source page; one page becomes one batch.
    pub batch_size: usize,
    /// Maximum batch units in flight.
    pub concurrency: usize,
    /// Progress reporting interval.
    pub tick: Duration,
    /// Upper bound on a single source page read.
    pub fetch_timeout: Duration,
    pub reporter_capacity: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            batch_size: 500,
            concurrency: 5,
            tick: Duration::from_secs(1),
            fetch_timeout: Duration::from_secs(30),
            reporter_capacity: 64,
        }
    }
}

impl PipelineConfig {
    pub fn normalized(mut self) -> Self {
        self.batch_size = self.batch_size.max(1);
        self.concurrency = self.concurrency.max(1);
        self.reporter_capacity = self.reporter_capacity.max(1);
        if self.tick.is_zero() { self.tick = Duration::from_millis(1); }
        if self.fetch_timeout.is_zero() { self.fetch_timeout = Duration::from_millis(1); }
        self
    }
}
