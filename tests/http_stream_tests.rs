mod common;

use common::{serve_once, Reply};
use crmstream::types::{AccountIntelRequest, CrmWorkflowRequest};
use crmstream::{Config, Handlers, StreamClient, StreamError, WorkflowClient};
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio_util::sync::CancellationToken;

fn workflow_client(config: Config) -> WorkflowClient {
    let http = reqwest::Client::builder()
        .no_proxy()
        .build()
        .expect("http client");
    let client = StreamClient::with_http_client(&config, http);
    WorkflowClient::with_stream_client(config, client)
}

fn counting_handlers(count: &AtomicUsize) -> Handlers<'_> {
    let bump = move || {
        count.fetch_add(1, Ordering::SeqCst);
    };
    Handlers::new()
        .on_reasoning_start(move || {
            bump();
            Ok(())
        })
        .on_content_chunk(move |_| {
            bump();
            Ok(())
        })
        .on_workflow_completed(move |_| {
            bump();
            Ok(())
        })
        .on_completed(move || {
            bump();
            Ok(())
        })
        .on_step_started(move |_, _| {
            bump();
            Ok(())
        })
}

#[tokio::test]
async fn test_server_error_rejects_without_invoking_handlers() {
    let (base, server) = serve_once(Reply::Empty("500 Internal Server Error")).await;
    let client = workflow_client(Config::for_base_url(base));
    let count = AtomicUsize::new(0);

    let err = client
        .crm_workflow(
            &CrmWorkflowRequest::new("pipeline"),
            counting_handlers(&count),
            &CancellationToken::new(),
        )
        .await
        .expect_err("HTTP 500 should fail");
    server.await.expect("server task");

    assert!(matches!(err, StreamError::Status { status: 500, .. }));
    assert_eq!(err.status(), Some(500));
    assert_eq!(count.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_bodiless_success_rejects_without_invoking_handlers() {
    let (base, server) = serve_once(Reply::Empty("204 No Content")).await;
    let client = workflow_client(Config::for_base_url(base));
    let count = AtomicUsize::new(0);

    let err = client
        .account_intel(
            &AccountIntelRequest::new("renewal risk"),
            counting_handlers(&count),
            &CancellationToken::new(),
        )
        .await
        .expect_err("204 should fail");
    server.await.expect("server task");

    assert!(matches!(err, StreamError::MissingBody { status: 204, .. }));
    assert_eq!(count.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_chunked_stream_dispatches_in_order() {
    let body = "{\"type\":\"agent_thinking\"}\n\
                {\"type\":\"step_started\",\"step_name\":\"Research\"}\n\
                {\"type\":\"content_chunk\",\"content\":\"Acme renews in Q3 ✓\"}\n\
                {\"type\":\"workflow_completed\"}";
    let bytes = body.as_bytes();
    let check_mark = body.find('✓').expect("check mark");
    let chunks = vec![
        bytes[..20].to_vec(),
        bytes[20..check_mark + 1].to_vec(),
        bytes[check_mark + 1..].to_vec(),
    ];
    let (base, server) = serve_once(Reply::Chunked(chunks)).await;
    let client = workflow_client(Config::for_base_url(base));

    let mut answer = String::new();
    let handlers = Handlers::new().on_content_chunk(|chunk| {
        answer.push_str(chunk);
        Ok(())
    });
    let request = AccountIntelRequest::new("When does Acme renew?").with_account("Acme");
    let outcome = client
        .account_intel(&request, handlers, &CancellationToken::new())
        .await
        .expect("stream should finish");
    let captured = server.await.expect("server task");

    assert_eq!(answer, "Acme renews in Q3 ✓");
    assert_eq!(outcome.summary.dispatched, 4);
    assert_eq!(outcome.summary.malformed, 0);
    assert_eq!(outcome.timeline.len(), 1);

    assert!(captured.head.starts_with("POST /api/accounts/intel HTTP/1.1"));
    assert_eq!(captured.header("accept"), Some("application/x-ndjson"));
    assert_eq!(captured.header("content-type"), Some("application/json"));
    assert_eq!(captured.header("authorization"), None);
    let sent: serde_json::Value = serde_json::from_str(&captured.body).expect("json body");
    assert_eq!(
        sent,
        serde_json::json!({
            "account": "Acme",
            "query": "When does Acme renew?",
            "session_id": null
        })
    );
}

#[tokio::test]
async fn test_configured_token_is_sent_as_bearer() {
    let (base, server) = serve_once(Reply::Chunked(vec![
        b"{\"type\":\"run_completed\"}\n".to_vec(),
    ]))
    .await;
    let config = Config {
        auth_token: Some("secret-token".to_string()),
        ..Config::for_base_url(base)
    };
    config.validate().expect("token to a local endpoint is allowed");
    let client = workflow_client(config);

    let outcome = client
        .crm_workflow(
            &CrmWorkflowRequest::new("q").with_session("s-42"),
            Handlers::new(),
            &CancellationToken::new(),
        )
        .await
        .expect("stream should finish");
    let captured = server.await.expect("server task");

    assert_eq!(outcome.summary.dispatched, 1);
    assert!(captured.head.starts_with("POST /api/crm/workflow HTTP/1.1"));
    assert_eq!(
        captured.header("authorization"),
        Some("Bearer secret-token")
    );
}
