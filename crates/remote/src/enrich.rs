use std::sync::Arc;
use std::time::Instant;

use bindex_core::{EnrichmentKey, Error, Result};
use bindex_diag::{DiagnosticSink, SinkKind};
use metrics::histogram;
use serde::Serialize;
use tracing::{debug, error};

use crate::{send_with_retry, KeyEnricher, RetryPolicy};

/// Sent in place of an empty name; the service rejects empty array elements.
pub const PLACEHOLDER_NAME: &str = "@";

#[derive(Serialize)]
struct NameQuery<'a> {
    name: &'a str,
}

/// Alpha key service client: POSTs `[{"name": ..}, ..]`, expects `[{"sameAsAlphaKey", "orderedAlphaKey"}, ..]`.
pub struct HttpEnricher {
    http: reqwest::Client,
    url: String,
    sinks: Arc<dyn DiagnosticSink>,
    retry: RetryPolicy,
}

impl HttpEnricher {
    pub fn new(http: reqwest::Client, url: impl Into<String>, sinks: Arc<dyn DiagnosticSink>) -> Self {
        Self { http, url: url.into(), sinks, retry: RetryPolicy::none() }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn record_failure(&self, names: &[String], err: &Error) {
        self.sinks.append(SinkKind::EnrichmentError, &names.join("\n"));
        error!(url = %self.url, names = names.len(), error = %err, "alpha key request failed");
    }
}

#[async_trait::async_trait]
impl KeyEnricher for HttpEnricher {
    async fn enrich(&self, names: &[String]) -> Result<Vec<EnrichmentKey>> {
        let started = Instant::now();
        let query: Vec<NameQuery<'_>> = names
            .iter()
            .map(|n| NameQuery { name: if n.is_empty() { PLACEHOLDER_NAME } else { n.as_str() } })
            .collect();
        let body = serde_json::to_vec(&query)
            .map_err(|source| Error::Encode { id: "alpha key request".to_string(), source })?;

        let resp = match send_with_retry(self.retry, "enrich", || {
            self.http
                .post(&self.url)
                .header("content-type", "application/json")
                .body(body.clone())
        })
        .await
        {
            Ok(r) => r,
            Err(e) => {
                let err = Error::EnrichmentTransport(e.to_string());
                self.record_failure(names, &err);
                return Err(err);
            }
        };

        let status = resp.status();
        if !status.is_success() {
            let err = Error::EnrichmentStatus(status.as_u16());
            self.record_failure(names, &err);
            return Err(err);
        }
        let bytes = match resp.bytes().await {
            Ok(b) => b,
            Err(e) => {
                let err = Error::EnrichmentTransport(e.to_string());
                self.record_failure(names, &err);
                return Err(err);
            }
        };
        let keys: Vec<EnrichmentKey> = match serde_json::from_slice(&bytes) {
            Ok(k) => k,
            Err(e) => {
                let err = Error::EnrichmentDecode(e);
                self.record_failure(names, &err);
                return Err(err);
            }
        };
        histogram!("bindex_enrich_ms", started.elapsed().as_secs_f64() * 1000.0);
        debug!(names = names.len(), keys = keys.len(), "alpha keys fetched");
        Ok(keys)
    }
}
