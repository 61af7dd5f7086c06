//! Page retrieval over a shared HTTP transport
//!
//! A run creates one [`HttpTransport`] and hands it to every fetch task, so
//! all retrievals of a run share a single connection pool. Bodies are read
//! incrementally and rejected as soon as they exceed the byte ceiling.

use crate::types::{AppError, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use uuid::Uuid;

/// The connection pool and limits shared by all fetch tasks of one run.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    max_body_bytes: usize,
    id: Uuid,
}

impl HttpTransport {
    pub fn new(user_agent: &str, max_body_bytes: usize) -> Result<Self> {
        let client = Client::builder()
            .user_agent(user_agent)
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self::with_client(client, max_body_bytes))
    }

    /// Wrap an existing client, e.g. one already configured by the caller.
    pub fn with_client(client: Client, max_body_bytes: usize) -> Self {
        Self {
            client,
            max_body_bytes,
            id: Uuid::new_v4(),
        }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn max_body_bytes(&self) -> usize {
        self.max_body_bytes
    }

    /// Identity of this transport; every task of a run observes the same value.
    pub fn id(&self) -> Uuid {
        self.id
    }
}

/// A retrieved page before extraction.
#[derive(Debug, Clone)]
pub struct RawPage {
    pub url: String,
    pub status: u16,
    pub body: String,
    /// Body size as received, before any lossy UTF-8 decoding
    pub bytes: usize,
}

impl RawPage {
    /// A page whose body arrived as valid UTF-8.
    pub fn new(url: impl Into<String>, status: u16, body: impl Into<String>) -> Self {
        let body = body.into();
        Self {
            url: url.into(),
            status,
            bytes: body.len(),
            body,
        }
    }
}

/// Retrieval capability used by the fetch coordinator.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Retrieve `url` using the caller's transport.
    ///
    /// Implementations must fail with [`AppError::Fetch`] rather than
    /// truncate when the body exceeds the transport's byte ceiling.
    async fn fetch(&self, transport: &HttpTransport, url: &str) -> Result<RawPage>;
}

/// [`PageFetcher`] backed by reqwest.
#[derive(Debug, Default, Clone)]
pub struct HttpFetcher;

impl HttpFetcher {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, transport: &HttpTransport, url: &str) -> Result<RawPage> {
        let limit = transport.max_body_bytes();

        let mut response = transport
            .client()
            .get(url)
            .send()
            .await
            .map_err(|e| AppError::Fetch(format!("Request to {} failed: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::Fetch(format!("HTTP error: {}", status.as_u16())));
        }

        if let Some(length) = response.content_length()
            && length as usize > limit
        {
            return Err(AppError::Fetch(format!(
                "Response of {} bytes exceeds the {} byte limit",
                length, limit
            )));
        }

        let mut body = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| AppError::Fetch(format!("Failed to read body of {}: {}", url, e)))?
        {
            if body.len() + chunk.len() > limit {
                return Err(AppError::Fetch(format!(
                    "Response exceeds the {} byte limit",
                    limit
                )));
            }
            body.extend_from_slice(&chunk);
        }

        Ok(RawPage {
            url: url.to_string(),
            status: status.as_u16(),
            body: String::from_utf8_lossy(&body).into_owned(),
            bytes: body.len(),
        })
    }
}
