//! Page retrieval against a mocked HTTP server.

mod common;

use common::html_page;
use scout::research::{FetchCoordinator, FetchStatus};
use scout::tools::{ExtractOptions, HttpFetcher, HttpTransport, PageFetcher};
use scout::types::AppError;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const USER_AGENT: &str = "scout-test/1.0";

fn options() -> ExtractOptions {
    ExtractOptions {
        min_line_chars: 10,
        max_content_chars: 10_000,
    }
}

async fn serve_html(server: &MockServer, route: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/html; charset=utf-8")
                .set_body_string(body),
        )
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_fetch_sends_user_agent_and_returns_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/page"))
        .and(header("user-agent", USER_AGENT))
        .respond_with(ResponseTemplate::new(200).set_body_string("<p>hello</p>"))
        .expect(1)
        .mount(&server)
        .await;

    let transport = HttpTransport::new(USER_AGENT, 1024).unwrap();
    let page = HttpFetcher::new()
        .fetch(&transport, &format!("{}/page", server.uri()))
        .await
        .unwrap();

    assert_eq!(page.status, 200);
    assert_eq!(page.body, "<p>hello</p>");
}

#[tokio::test]
async fn test_non_success_status_is_fetch_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let transport = HttpTransport::new(USER_AGENT, 1024).unwrap();
    let err = HttpFetcher::new()
        .fetch(&transport, &format!("{}/missing", server.uri()))
        .await
        .unwrap_err();

    match err {
        AppError::Fetch(message) => assert!(message.contains("404")),
        other => panic!("unexpected error {:?}", other),
    }
}

#[tokio::test]
async fn test_oversized_body_is_rejected_not_truncated() {
    let server = MockServer::start().await;
    serve_html(&server, "/big", "x".repeat(4096)).await;

    let transport = HttpTransport::new(USER_AGENT, 1000).unwrap();
    let err = HttpFetcher::new()
        .fetch(&transport, &format!("{}/big", server.uri()))
        .await
        .unwrap_err();

    match err {
        AppError::Fetch(message) => assert!(message.contains("1000 byte limit")),
        other => panic!("unexpected error {:?}", other),
    }
}

#[tokio::test]
async fn test_coordinator_extracts_and_isolates_failures() {
    let server = MockServer::start().await;
    serve_html(
        &server,
        "/good",
        html_page("Good Page", "This page has plenty of readable text in it."),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/bad"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(html_page("Slow", "Arrives after the deadline."))
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    let coordinator = FetchCoordinator::new(Arc::new(HttpFetcher::new()), Duration::from_millis(500), options());
    let targets = vec![
        format!("{}/good", server.uri()),
        format!("{}/bad", server.uri()),
        format!("{}/slow", server.uri()),
    ];
    let transport = Arc::new(HttpTransport::new(USER_AGENT, 100_000).unwrap());

    let tasks = coordinator.fetch_all(&targets, transport, None).await;

    assert_eq!(tasks.len(), 3);
    assert_eq!(tasks[0].status(), FetchStatus::Success);
    let page = tasks[0].content().unwrap();
    assert_eq!(page.title, "Good Page");
    assert!(page.content.contains("plenty of readable text"));

    assert_eq!(tasks[1].status(), FetchStatus::Failed);
    assert!(tasks[1].error().unwrap().contains("500"));

    assert_eq!(tasks[2].status(), FetchStatus::Failed);
    assert!(tasks[2].error().unwrap().contains("Timed out"));
    assert!(tasks[2].elapsed() < Duration::from_secs(2));

    for (i, task) in tasks.iter().enumerate() {
        assert_eq!(task.index(), i);
        assert_eq!(task.url(), targets[i]);
    }
}

#[tokio::test]
async fn test_body_at_ceiling_with_invalid_utf8_is_accepted() {
    let server = MockServer::start().await;
    let mut body = html_page("Latin Page", "Readable text followed by stray bytes.").into_bytes();
    body.extend_from_slice(&[0xFF; 8]);
    let limit = body.len();
    Mock::given(method("GET"))
        .and(path("/latin"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body))
        .mount(&server)
        .await;

    let coordinator = FetchCoordinator::new(Arc::new(HttpFetcher::new()), Duration::from_secs(5), options());
    let transport = Arc::new(HttpTransport::new(USER_AGENT, limit).unwrap());
    let tasks = coordinator
        .fetch_all(&[format!("{}/latin", server.uri())], transport, None)
        .await;

    assert_eq!(tasks[0].status(), FetchStatus::Success, "{:?}", tasks[0].error());
    assert_eq!(tasks[0].content().unwrap().title, "Latin Page");
}
