use std::sync::Arc;
use std::time::Instant;

use bindex_core::{Error, Result};
use bindex_diag::{DiagnosticSink, SinkKind};
use metrics::histogram;
use tracing::warn;

use crate::{send_with_retry, DocumentSubmitter, RetryPolicy};

/// Search engine bulk client posting to `<base>/<index>/_bulk`.
pub struct HttpSubmitter {
    http: reqwest::Client,
    endpoint: String,
    sinks: Arc<dyn DiagnosticSink>,
    retry: RetryPolicy,
}

impl HttpSubmitter {
    pub fn new(http: reqwest::Client, base_url: &str, index: &str, sinks: Arc<dyn DiagnosticSink>) -> Self {
        let endpoint = format!("{}/{}/_bulk", base_url.trim_end_matches('/'), index);
        Self { http, endpoint, sinks, retry: RetryPolicy::none() }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn endpoint(&self) -> &str { &self.endpoint }
}

#[async_trait::async_trait]
impl DocumentSubmitter for HttpSubmitter {
    async fn submit(&self, payload: Vec<u8>, audit_trail: &str) -> Result<Vec<u8>> {
        let started = Instant::now();
        let resp = match send_with_retry(self.retry, "submit", || {
            self.http
                .post(&self.endpoint)
                .header("content-type", "application/x-ndjson")
                .body(payload.clone())
        })
        .await
        {
            Ok(r) => r,
            Err(e) => {
                self.sinks.append(SinkKind::PostRequestError, audit_trail);
                warn!(endpoint = %self.endpoint, error = %e, "error posting bulk request");
                return Err(Error::SubmissionTransport(e.to_string()));
            }
        };

        let status = resp.status();
        if status.as_u16() > 299 {
            self.sinks.append(SinkKind::UnexpectedResponse, audit_trail);
            warn!(endpoint = %self.endpoint, status = %status, "unexpected bulk response");
            return Err(Error::SubmissionRejected { status: status.as_u16() });
        }

        let body = match resp.bytes().await {
            Ok(b) => b.to_vec(),
            Err(e) => {
                self.sinks.append(SinkKind::PostRequestError, audit_trail);
                warn!(endpoint = %self.endpoint, error = %e, "error reading bulk response");
                return Err(Error::SubmissionTransport(e.to_string()));
            }
        };
        histogram!("bindex_submit_ms", started.elapsed().as_secs_f64() * 1000.0);
        Ok(body)
    }
}
