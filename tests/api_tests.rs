mod common;

use axum::http::StatusCode;
use axum_test::TestServer;
use common::mocks::{MockLLMClient, ScriptedFetcher, ScriptedSearch};
use common::{html_page, orchestrator, test_config};
use scout::api::routes::build_app;
use scout::AppState;
use serde_json::{Value, json};
use std::sync::Arc;

const URLS: [&str; 2] = ["https://a.example/", "https://b.example/"];

fn server_with(search: ScriptedSearch, llm: MockLLMClient) -> TestServer {
    let fetcher = ScriptedFetcher::new()
        .page(URLS[0], html_page("A", "First page with enough text to keep."))
        .page(URLS[1], html_page("B", "Second page with enough text to keep."));
    let orchestrator = orchestrator(test_config(), search, fetcher, llm);
    TestServer::new(build_app(AppState::new(Arc::new(orchestrator)))).unwrap()
}

fn create_test_server() -> TestServer {
    server_with(
        ScriptedSearch::with_urls(&URLS),
        MockLLMClient::new("The final research report."),
    )
}

/// Payloads of the `data:` lines of an SSE body.
fn sse_data(body: &str) -> Vec<String> {
    body.lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|data| data.trim_start().to_string())
        .collect()
}

#[tokio::test]
async fn test_health_check() {
    let server = create_test_server();

    let response = server.get("/api/health").await;
    response.assert_status_ok();

    let body: Value = response.json();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    assert!(body["timestamp"].is_string());
}

#[tokio::test]
async fn test_stream_emits_events_then_done() {
    let server = create_test_server();

    let response = server
        .post("/api/chat/stream")
        .json(&json!({ "message": "what is rust", "sessionId": "s-1" }))
        .await;
    response.assert_status_ok();
    assert!(
        response
            .header("content-type")
            .to_str()
            .unwrap()
            .starts_with("text/event-stream")
    );

    let data = sse_data(&response.text());
    assert_eq!(data.last().map(String::as_str), Some("[DONE]"));

    let events: Vec<Value> = data[..data.len() - 1]
        .iter()
        .map(|d| serde_json::from_str(d).unwrap())
        .collect();

    for (i, event) in events.iter().enumerate() {
        assert_eq!(event["sequence"], i as u64 + 1);
    }
    assert_eq!(events[0]["type"], "stage_start");
    assert_eq!(events[0]["data"]["name"], "planning");

    let last = events.last().unwrap();
    assert_eq!(last["type"], "pipeline_end");
    assert_eq!(last["data"]["session_id"], "s-1");

    let report: String = events
        .iter()
        .filter(|e| e["type"] == "text_chunk")
        .map(|e| e["data"]["content"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(report, "The final research report.");
}

#[tokio::test]
async fn test_stream_reports_fatal_error_as_event() {
    let server = server_with(ScriptedSearch::failing(), MockLLMClient::new("unused"));

    let response = server
        .post("/api/chat/stream")
        .json(&json!({ "message": "what is rust", "session_id": "s-2" }))
        .await;
    response.assert_status_ok();

    let data = sse_data(&response.text());
    assert_eq!(data.last().map(String::as_str), Some("[DONE]"));

    let terminal: Value = serde_json::from_str(&data[data.len() - 2]).unwrap();
    assert_eq!(terminal["type"], "error");
    assert_eq!(terminal["data"]["code"], "SEARCH_FAILED");
}

#[tokio::test]
async fn test_stream_honors_pipeline_override() {
    let server = server_with(
        ScriptedSearch::with_urls(&URLS),
        MockLLMClient::new("<main>generated</main>"),
    );

    let response = server
        .post("/api/chat/stream")
        .json(&json!({
            "message": "tell me about owls",
            "sessionId": "s-3",
            "agentType": "generation"
        }))
        .await;

    let data = sse_data(&response.text());
    let first: Value = serde_json::from_str(&data[0]).unwrap();
    assert_eq!(first["data"]["name"], "generate_html");
}

#[tokio::test]
async fn test_chat_returns_assembled_reply() {
    let server = create_test_server();

    let response = server
        .post("/api/chat")
        .json(&json!({ "message": "what is rust", "sessionId": "s-4" }))
        .await;
    response.assert_status_ok();

    let body: Value = response.json();
    assert_eq!(body["sessionId"], "s-4");
    assert_eq!(body["content"], "The final research report.");
    assert!(body["messageId"].is_string());

    let calls = body["toolCalls"].as_array().unwrap();
    assert_eq!(calls[0]["name"], "planning");
    assert!(calls.iter().all(|c| c["status"] == "success"));
}

#[tokio::test]
async fn test_chat_maps_fatal_run_to_http_error() {
    let server = server_with(ScriptedSearch::failing(), MockLLMClient::new("unused"));

    let response = server
        .post("/api/chat")
        .json(&json!({ "message": "what is rust", "sessionId": "s-5" }))
        .expect_failure()
        .await;

    response.assert_status(StatusCode::BAD_GATEWAY);
    let body: Value = response.json();
    assert_eq!(body["code"], "SEARCH_FAILED");
}

#[tokio::test]
async fn test_empty_message_is_rejected() {
    let server = create_test_server();

    for route in ["/api/chat", "/api/chat/stream"] {
        let response = server
            .post(route)
            .json(&json!({ "message": "  ", "sessionId": "s-6" }))
            .expect_failure()
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        let body: Value = response.json();
        assert_eq!(body["code"], "VALIDATION_ERROR");
    }
}
