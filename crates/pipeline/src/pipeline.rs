//! Batch orchestration: read a page, spawn a unit for it, keep at most `concurrency` units alive.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use bindex_core::{Batch, Error, Result};
use bindex_diag::DiagnosticSink;
use bindex_remote::{BulkPayload, BulkResponse, DocumentSubmitter, KeyEnricher};
use bindex_source::RecordSource;
use metrics::counter;
use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, error, info, warn};

use crate::reporter::{spawn_reporter, ReporterHandle, Totals};
use crate::transform::{Transformed, Transformer};
use crate::PipelineConfig;

/// What a finished run did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub totals: Totals,
    /// Batches that ran to completion, abandoned ones included.
    pub batches: u64,
    /// Batches whose submission failed and were dropped.
    pub abandoned: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BatchOutcome {
    Written,
    Abandoned,
    Empty,
}

pub struct Pipeline {
    enricher: Arc<dyn KeyEnricher>,
    submitter: Arc<dyn DocumentSubmitter>,
    transformer: Arc<Transformer>,
    cfg: PipelineConfig,
}

impl Pipeline {
    pub fn new(
        enricher: Arc<dyn KeyEnricher>,
        submitter: Arc<dyn DocumentSubmitter>,
        sinks: Arc<dyn DiagnosticSink>,
        cfg: PipelineConfig,
    ) -> Self {
        Self { enricher, submitter, transformer: Arc::new(Transformer::new(sinks)), cfg: cfg.normalized() }
    }

    /// Drain `source` into the index.
    ///
    /// Batch-scoped failures abandon their batch and the run continues. A fatal batch error
    /// aborts the remaining units; a source failure lets in-flight units finish first. In both
    /// cases the reporter is flushed before the error is returned.
    pub async fn run(&self, source: &mut dyn RecordSource) -> Result<RunSummary> {
        self.run_until(source, std::future::pending()).await
    }

    /// Like [`Pipeline::run`], but stops with [`Error::Cancelled`] once `shutdown` resolves.
    /// Outstanding units are aborted and awaited first, so no clone of the
    /// collaborators outlives the call.
    pub async fn run_until<F>(&self, source: &mut dyn RecordSource, shutdown: F) -> Result<RunSummary>
    where
        F: Future<Output = ()>,
    {
        let (reporter_handle, reporter) = spawn_reporter(self.cfg.tick, self.cfg.reporter_capacity);
        let unit = BatchUnit {
            enricher: self.enricher.clone(),
            submitter: self.submitter.clone(),
            transformer: self.transformer.clone(),
            reporter: reporter_handle,
        };
        let mut units: JoinSet<Result<BatchOutcome>> = JoinSet::new();
        let mut tally = Tally::default();

        let outcome = tokio::select! {
            res = self.pump(source, &unit, &mut units, &mut tally) => res,
            _ = shutdown => {
                warn!(in_flight = units.len(), "shutdown requested; aborting in-flight batches");
                Err(Error::Cancelled)
            }
        };
        if outcome.is_err() {
            units.shutdown().await;
        }

        drop(unit);
        let totals = reporter.finish().await;
        let summary = RunSummary { totals, batches: tally.batches, abandoned: tally.abandoned };
        match outcome {
            Ok(()) => {
                info!(read = totals.read, written = totals.written, skipped = totals.skipped, batches = summary.batches, abandoned = summary.abandoned, "run complete");
                Ok(summary)
            }
            Err(e) => {
                error!(read = totals.read, written = totals.written, skipped = totals.skipped, error = %e, "run stopped");
                Err(e)
            }
        }
    }

    async fn pump(
        &self,
        source: &mut dyn RecordSource,
        unit: &BatchUnit,
        units: &mut JoinSet<Result<BatchOutcome>>,
        tally: &mut Tally,
    ) -> Result<()> {
        match self.feed(source, unit, units, tally).await {
            Ok(()) => drain(units, tally).await,
            Err(e @ (Error::Source(_) | Error::SourceTimeout(_))) => {
                error!(error = %e, in_flight = units.len(), "source failed; waiting for in-flight batches");
                drain(units, tally).await.and(Err(e))
            }
            Err(e) => Err(e),
        }
    }

    async fn feed(
        &self,
        source: &mut dyn RecordSource,
        unit: &BatchUnit,
        units: &mut JoinSet<Result<BatchOutcome>>,
        tally: &mut Tally,
    ) -> Result<()> {
        let limit = Arc::new(Semaphore::new(self.cfg.concurrency));
        let mut seq = 0u64;
        loop {
            let permit = limit.clone().acquire_owned().await.map_err(|e| Error::Worker(e.to_string()))?;
            while let Some(joined) = units.try_join_next() {
                tally.record(joined)?;
            }

            let page = match tokio::time::timeout(self.cfg.fetch_timeout, source.next_page(self.cfg.batch_size)).await {
                Ok(page) => page?,
                Err(_) => return Err(Error::SourceTimeout(self.cfg.fetch_timeout)),
            };
            if page.is_empty() {
                debug!(batches = seq, "source exhausted");
                return Ok(());
            }

            let batch = Batch::new(seq, page);
            seq += 1;
            let unit = unit.clone();
            units.spawn(async move {
                let _permit = permit;
                unit.process(batch).await
            });
        }
    }
}

async fn drain(units: &mut JoinSet<Result<BatchOutcome>>, tally: &mut Tally) -> Result<()> {
    while let Some(joined) = units.join_next().await {
        tally.record(joined)?;
    }
    Ok(())
}

#[derive(Default)]
struct Tally {
    batches: u64,
    abandoned: u64,
}

impl Tally {
    fn record(&mut self, joined: std::result::Result<Result<BatchOutcome>, JoinError>) -> Result<()> {
        let outcome = joined.map_err(|e| Error::Worker(e.to_string()))??;
        self.batches += 1;
        if outcome == BatchOutcome::Abandoned {
            self.abandoned += 1;
        }
        Ok(())
    }
}

/// Everything one batch needs, cloned into its task.
#[derive(Clone)]
struct BatchUnit {
    enricher: Arc<dyn KeyEnricher>,
    submitter: Arc<dyn DocumentSubmitter>,
    transformer: Arc<Transformer>,
    reporter: ReporterHandle,
}

impl BatchUnit {
    async fn process(self, batch: Batch) -> Result<BatchOutcome> {
        let started = Instant::now();
        let expected = batch.len();
        self.reporter.read(expected as u64).await;

        let keys = self.enricher.enrich(&batch.names()).await?;
        if keys.len() != expected {
            error!(batch = batch.seq, expected, got = keys.len(), "enrichment response misaligned");
            return Err(Error::EnrichmentMisaligned { expected, got: keys.len() });
        }

        // keys pair with records by position
        let mut payload = BulkPayload::with_capacity(expected);
        let mut skipped = 0u64;
        for (record, key) in batch.records.iter().zip(&keys) {
            match self.transformer.transform(record, key) {
                Transformed::Document(doc) => payload.push(&doc)?,
                Transformed::Skipped(_) => skipped += 1,
            }
        }
        self.reporter.skipped(skipped).await;

        if payload.is_empty() {
            debug!(batch = batch.seq, skipped, "nothing to submit");
            counter!("bindex_batches_total", 1, "outcome" => "empty");
            return Ok(BatchOutcome::Empty);
        }

        let docs = payload.len();
        let (body, audit) = payload.into_parts();
        let reply = match self.submitter.submit(body, &audit).await {
            Ok(reply) => reply,
            Err(e) if !e.is_fatal() => {
                warn!(batch = batch.seq, docs, error = %e, "batch abandoned");
                counter!("bindex_batches_total", 1, "outcome" => "abandoned");
                return Ok(BatchOutcome::Abandoned);
            }
            Err(e) => return Err(e),
        };

        let response = BulkResponse::parse(&reply)?;
        if let Some(item) = response.first_rejection() {
            error!(batch = batch.seq, id = %item.id, status = item.status, "document not created");
            return Err(Error::DocumentRejected { id: item.id.clone(), status: item.status, reason: item.reason() });
        }

        self.reporter.written(docs as u64).await;
        counter!("bindex_batches_total", 1, "outcome" => "written");
        debug!(batch = batch.seq, docs, skipped, took_ms = started.elapsed().as_millis() as u64, "batch written");
        Ok(BatchOutcome::Written)
    }
}
