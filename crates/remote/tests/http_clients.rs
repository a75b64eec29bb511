use std::sync::Arc;
use std::time::Duration;

use bindex_core::Error;
use bindex_diag::{MemorySinks, SinkKind};
use bindex_remote::{http_client, DocumentSubmitter, HttpEnricher, HttpSubmitter, KeyEnricher, RetryPolicy};
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// Nothing listens on port 1 on test hosts; connecting fails immediately.
const DEAD_URL: &str = "http://127.0.0.1:1";

fn client() -> reqwest::Client {
    http_client(Duration::from_secs(5)).unwrap()
}

fn names(v: &[&str]) -> Vec<String> {
    v.iter().map(|s| s.to_string()).collect()
}

#[tokio::test]
async fn enrich_substitutes_placeholder_and_keeps_order() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/alphakey"))
        .and(body_json(serde_json::json!([{"name": "B LTD"}, {"name": "@"}, {"name": "A LTD"}])))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            {"sameAsAlphaKey": "B", "orderedAlphaKey": "B0"},
            {"sameAsAlphaKey": "", "orderedAlphaKey": ""},
            {"sameAsAlphaKey": "A", "orderedAlphaKey": "A0"}
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let sinks = Arc::new(MemorySinks::new());
    let enricher = HttpEnricher::new(client(), format!("{}/alphakey", server.uri()), sinks.clone());
    let keys = enricher.enrich(&names(&["B LTD", "", "A LTD"])).await.unwrap();
    assert_eq!(keys.len(), 3);
    assert_eq!(keys[0].ordering_key, "B0");
    assert_eq!(keys[2].equivalence_key, "A");
    assert_eq!(sinks.total(), 0);
}

#[tokio::test]
async fn enrich_status_failure_is_reported_with_names() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let sinks = Arc::new(MemorySinks::new());
    let enricher = HttpEnricher::new(client(), server.uri(), sinks.clone());
    let err = enricher.enrich(&names(&["X", "Y"])).await.unwrap_err();
    assert!(matches!(err, Error::EnrichmentStatus(500)));
    assert!(err.is_fatal());
    assert_eq!(sinks.entries(SinkKind::EnrichmentError), vec!["X\nY".to_string()]);
}

#[tokio::test]
async fn enrich_unparseable_body_is_a_decode_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"not":"an array"}"#))
        .mount(&server)
        .await;

    let sinks = Arc::new(MemorySinks::new());
    let enricher = HttpEnricher::new(client(), server.uri(), sinks.clone());
    let err = enricher.enrich(&names(&["X"])).await.unwrap_err();
    assert!(matches!(err, Error::EnrichmentDecode(_)));
    assert_eq!(sinks.count(SinkKind::EnrichmentError), 1);
}

#[tokio::test]
async fn enrich_transport_failure_after_retries_logs_once() {
    let sinks = Arc::new(MemorySinks::new());
    let enricher = HttpEnricher::new(client(), DEAD_URL, sinks.clone())
        .with_retry(RetryPolicy::new(2, Duration::from_millis(5)));
    let err = enricher.enrich(&names(&["X"])).await.unwrap_err();
    assert!(matches!(err, Error::EnrichmentTransport(_)));
    assert_eq!(sinks.count(SinkKind::EnrichmentError), 1);
}

#[tokio::test]
async fn submit_posts_ndjson_to_bulk_endpoint() {
    let server = MockServer::start().await;
    let reply = r#"{"took":1,"errors":false,"items":[{"create":{"_id":"1","status":201}}]}"#;
    Mock::given(method("POST"))
        .and(path("/companies/_bulk"))
        .and(header("content-type", "application/x-ndjson"))
        .respond_with(ResponseTemplate::new(200).set_body_string(reply))
        .expect(1)
        .mount(&server)
        .await;

    let sinks = Arc::new(MemorySinks::new());
    let submitter = HttpSubmitter::new(client(), &format!("{}/", server.uri()), "companies", sinks.clone());
    assert!(submitter.endpoint().ends_with("/companies/_bulk"));
    let body = submitter.submit(b"{\"create\":{\"_id\":\"1\"}}\n{}\n".to_vec(), "1").await.unwrap();
    assert_eq!(body, reply.as_bytes());
    assert_eq!(sinks.total(), 0);
}

#[tokio::test]
async fn submit_non_success_status_goes_to_unexpected_response_sink() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(413))
        .mount(&server)
        .await;

    let sinks = Arc::new(MemorySinks::new());
    let submitter = HttpSubmitter::new(client(), &server.uri(), "companies", sinks.clone());
    let err = submitter.submit(b"x\n".to_vec(), "1\n2").await.unwrap_err();
    assert!(matches!(err, Error::SubmissionRejected { status: 413 }));
    assert!(!err.is_fatal());
    assert_eq!(sinks.entries(SinkKind::UnexpectedResponse), vec!["1\n2".to_string()]);
    assert_eq!(sinks.count(SinkKind::PostRequestError), 0);
}

#[tokio::test]
async fn submit_transport_failure_goes_to_post_error_sink() {
    let sinks = Arc::new(MemorySinks::new());
    let submitter = HttpSubmitter::new(client(), DEAD_URL, "companies", sinks.clone());
    let err = submitter.submit(b"x\n".to_vec(), "9").await.unwrap_err();
    assert!(matches!(err, Error::SubmissionTransport(_)));
    assert_eq!(sinks.entries(SinkKind::PostRequestError), vec!["9".to_string()]);
    assert_eq!(sinks.count(SinkKind::UnexpectedResponse), 0);
}
