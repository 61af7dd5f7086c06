//! Test doubles for the pipeline's collaborators.
//!
//! Every double is deterministic: the LLM replays fixed text, search returns
//! a fixed hit list, and the fetcher serves per-URL scripts with optional
//! delays. The fetcher also counts in-flight requests and records which
//! transport each request used.

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use parking_lot::Mutex;
use scout::llm::{LLMClient, TokenStream};
use scout::tools::{HttpTransport, PageFetcher, RawPage, SearchProvider};
use scout::types::{AppError, Result, SearchHit};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use uuid::Uuid;

// ============= LLM =============

/// Mock LLM client with configurable responses.
///
/// `stream_with_system` yields the configured tokens (or the response split
/// into 5-character chunks); `generate_with_system` returns the whole response.
#[derive(Clone)]
pub struct MockLLMClient {
    response: String,
    tokens: Option<Vec<String>>,
    should_fail: bool,
    stalled: bool,
    failing_calls: Vec<usize>,
    calls: Arc<AtomicUsize>,
    prompts: Arc<Mutex<Vec<String>>>,
}

impl MockLLMClient {
    /// Create a new mock client that returns the given response.
    pub fn new(response: &str) -> Self {
        Self {
            response: response.to_string(),
            tokens: None,
            should_fail: false,
            stalled: false,
            failing_calls: Vec::new(),
            calls: Arc::new(AtomicUsize::new(0)),
            prompts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Stream exactly these tokens.
    pub fn with_tokens(tokens: &[&str]) -> Self {
        let mut client = Self::new(&tokens.concat());
        client.tokens = Some(tokens.iter().map(|t| t.to_string()).collect());
        client
    }

    /// Create a mock client that always returns an error.
    pub fn failing() -> Self {
        let mut client = Self::new("");
        client.should_fail = true;
        client
    }

    /// Accept every streaming request but never answer it.
    pub fn stalled() -> Self {
        let mut client = Self::new("");
        client.stalled = true;
        client
    }

    /// Fail only the given zero-based calls.
    pub fn failing_on_calls(response: &str, calls: &[usize]) -> Self {
        let mut client = Self::new(response);
        client.failing_calls = calls.to_vec();
        client
    }

    /// Every user prompt received, in call order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().clone()
    }

    fn check(&self, prompt: &str) -> Result<()> {
        self.prompts.lock().push(prompt.to_string());
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if self.should_fail || self.failing_calls.contains(&call) {
            return Err(AppError::LLM("Mock LLM failure".to_string()));
        }
        Ok(())
    }

    fn token_stream(&self) -> TokenStream {
        let chunks: Vec<String> = match &self.tokens {
            Some(tokens) => tokens.clone(),
            None => self
                .response
                .chars()
                .collect::<Vec<_>>()
                .chunks(5)
                .map(|c| c.iter().collect())
                .collect(),
        };
        Box::new(stream::iter(chunks.into_iter().map(Ok)).boxed())
    }
}

#[async_trait]
impl LLMClient for MockLLMClient {
    async fn generate_with_system(&self, _system: &str, prompt: &str) -> Result<String> {
        self.check(prompt)?;
        Ok(self.response.clone())
    }

    async fn stream_with_system(&self, _system: &str, prompt: &str) -> Result<TokenStream> {
        self.check(prompt)?;
        if self.stalled {
            futures::future::pending::<()>().await;
        }
        Ok(self.token_stream())
    }

    fn model_name(&self) -> &str {
        "mock-model"
    }
}

// ============= Search =============

/// Search provider returning a fixed hit list, or always failing.
#[derive(Clone)]
pub struct ScriptedSearch {
    hits: Vec<SearchHit>,
    should_fail: bool,
    hangs: bool,
}

impl ScriptedSearch {
    pub fn new(hits: Vec<SearchHit>) -> Self {
        Self {
            hits,
            should_fail: false,
            hangs: false,
        }
    }

    /// Hits for `urls`, titled "Result N".
    pub fn with_urls(urls: &[&str]) -> Self {
        Self::new(
            urls.iter()
                .enumerate()
                .map(|(i, url)| SearchHit::new(format!("Result {}", i + 1), *url, format!("Summary {}", i + 1)))
                .collect(),
        )
    }

    pub fn failing() -> Self {
        Self {
            hits: Vec::new(),
            should_fail: true,
            hangs: false,
        }
    }

    /// Never answer.
    pub fn hanging() -> Self {
        Self {
            hits: Vec::new(),
            should_fail: false,
            hangs: true,
        }
    }
}

#[async_trait]
impl SearchProvider for ScriptedSearch {
    async fn search(&self, _query: &str, max_results: usize) -> Result<Vec<SearchHit>> {
        if self.hangs {
            futures::future::pending::<()>().await;
        }
        if self.should_fail {
            return Err(AppError::Search("search backend unavailable".to_string()));
        }
        Ok(self.hits.iter().take(max_results).cloned().collect())
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

// ============= Fetch =============

/// How the scripted fetcher answers one URL.
#[derive(Clone, Debug)]
pub enum FetchScript {
    Page { status: u16, body: String },
    Fail(String),
}

/// Page fetcher serving per-URL scripts after an optional fixed delay.
#[derive(Clone)]
pub struct ScriptedFetcher {
    scripts: HashMap<String, FetchScript>,
    delay: Duration,
    in_flight: Arc<AtomicUsize>,
    started: Arc<AtomicUsize>,
    transports: Arc<Mutex<Vec<Uuid>>>,
}

/// Decrements the in-flight counter when a request settles or is dropped.
struct InFlight(Arc<AtomicUsize>);

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl ScriptedFetcher {
    pub fn new() -> Self {
        Self {
            scripts: HashMap::new(),
            delay: Duration::ZERO,
            in_flight: Arc::new(AtomicUsize::new(0)),
            started: Arc::new(AtomicUsize::new(0)),
            transports: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn page(mut self, url: &str, body: impl Into<String>) -> Self {
        self.scripts.insert(
            url.to_string(),
            FetchScript::Page {
                status: 200,
                body: body.into(),
            },
        );
        self
    }

    pub fn status(mut self, url: &str, status: u16) -> Self {
        self.scripts.insert(
            url.to_string(),
            FetchScript::Page {
                status,
                body: String::new(),
            },
        );
        self
    }

    pub fn fail(mut self, url: &str, message: &str) -> Self {
        self.scripts
            .insert(url.to_string(), FetchScript::Fail(message.to_string()));
        self
    }

    /// Delay every request by `delay` before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Requests started but not yet settled or dropped.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    /// Transport id seen by each request, in start order.
    pub fn transports(&self) -> Vec<Uuid> {
        self.transports.lock().clone()
    }
}

impl Default for ScriptedFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PageFetcher for ScriptedFetcher {
    async fn fetch(&self, transport: &HttpTransport, url: &str) -> Result<RawPage> {
        self.started.fetch_add(1, Ordering::SeqCst);
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        let _guard = InFlight(Arc::clone(&self.in_flight));
        self.transports.lock().push(transport.id());

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        match self.scripts.get(url) {
            Some(FetchScript::Page { status, body }) => Ok(RawPage::new(url, *status, body.clone())),
            Some(FetchScript::Fail(message)) => Err(AppError::Fetch(message.clone())),
            None => Err(AppError::Fetch(format!("no script for {}", url))),
        }
    }
}
