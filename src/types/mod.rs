use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============= API Request/Response Types =============

/// Body of `POST /api/chat` and `POST /api/chat/stream`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub message: String,
    #[serde(alias = "session_id")]
    pub session_id: String,
    /// Explicit pipeline override (`research`, `generation`, or one of their aliases).
    #[serde(default, alias = "agent_type", skip_serializing_if = "Option::is_none")]
    pub agent_type: Option<String>,
}

/// Non-streaming reply assembled from a finished run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    pub message_id: String,
    pub session_id: String,
    pub content: String,
    pub tool_calls: Vec<ToolCallSummary>,
    pub timestamp: DateTime<Utc>,
}

/// One finished tool invocation as reported by [`ChatResponse`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallSummary {
    pub invocation_id: String,
    pub name: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: DateTime<Utc>,
}

// ============= Search & Content Types =============

/// One entry returned by a search provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchHit {
    pub title: String,
    pub url: String,
    pub summary: String,
    pub source_domain: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f32>,
}

impl SearchHit {
    /// Build a hit, deriving `source_domain` from the URL host.
    pub fn new(title: impl Into<String>, url: impl Into<String>, summary: impl Into<String>) -> Self {
        let url = url.into();
        let source_domain = domain_of(&url);
        Self {
            title: title.into(),
            url,
            summary: summary.into(),
            source_domain,
            score: None,
        }
    }

    pub fn with_score(mut self, score: f32) -> Self {
        self.score = Some(score);
        self
    }
}

/// Host part of a URL, or an empty string when the URL does not parse.
pub fn domain_of(url: &str) -> String {
    reqwest::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_default()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageInfo {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publish_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,
}

impl ContentMetadata {
    pub fn is_empty(&self) -> bool {
        self.author.is_none()
            && self.publish_date.is_none()
            && self.description.is_none()
            && self.keywords.is_empty()
    }
}

/// Readable content extracted from one retrieved page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageContent {
    pub url: String,
    pub title: String,
    pub content: String,
    pub summary: String,
    pub metadata: ContentMetadata,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<ImageInfo>,
}

// ============= Error Types =============

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("LLM error: {0}")]
    LLM(String),

    #[error("Search error: {0}")]
    Search(String),

    #[error("Fetch error: {0}")]
    Fetch(String),

    #[error("Generation failed: {0}")]
    Generation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Stable machine-readable code used in `error` stream events and HTTP bodies.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Config(_) => "CONFIGURATION_ERROR",
            AppError::LLM(_) => "LLM_ERROR",
            AppError::Search(_) => "SEARCH_FAILED",
            AppError::Fetch(_) => "FETCH_FAILED",
            AppError::Generation(_) => "GENERATION_FAILED",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::InvalidInput(_) => "VALIDATION_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl AppError {
    /// The message without the variant prefix.
    pub fn message(&self) -> &str {
        match self {
            AppError::Config(msg)
            | AppError::LLM(msg)
            | AppError::Search(msg)
            | AppError::Fetch(msg)
            | AppError::Generation(msg)
            | AppError::NotFound(msg)
            | AppError::InvalidInput(msg)
            | AppError::Internal(msg) => msg,
        }
    }
}

impl axum::response::IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let code = self.code();
        let (status, message) = match self {
            AppError::Config(msg) => (axum::http::StatusCode::INTERNAL_SERVER_ERROR, msg),
            AppError::LLM(msg) => (axum::http::StatusCode::BAD_GATEWAY, msg),
            AppError::Search(msg) => (axum::http::StatusCode::BAD_GATEWAY, msg),
            AppError::Fetch(msg) => (axum::http::StatusCode::BAD_GATEWAY, msg),
            AppError::Generation(msg) => (axum::http::StatusCode::BAD_GATEWAY, msg),
            AppError::NotFound(msg) => (axum::http::StatusCode::NOT_FOUND, msg),
            AppError::InvalidInput(msg) => (axum::http::StatusCode::BAD_REQUEST, msg),
            AppError::Internal(msg) => (axum::http::StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = serde_json::json!({
            "error": message,
            "code": code
        });

        (status, axum::Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
