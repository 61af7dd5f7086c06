//! Web search providers
//!
//! [`DuckDuckGoSearch`] goes through the daedra crate and needs no key.
//! [`TavilySearch`] calls the Tavily HTTP API with a key taken from the
//! environment.

use crate::types::{AppError, Result, SearchHit};
use crate::utils::toml_config::{SearchConfig, SearchProviderKind};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Search capability used by the Searching stage.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Run one query and return at most `max_results` hits in rank order.
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>>;

    /// Provider name for logs
    fn name(&self) -> &str;
}

/// Build the provider selected by the `[search]` config section.
pub fn from_config(config: &SearchConfig) -> Result<Arc<dyn SearchProvider>> {
    match config.provider {
        SearchProviderKind::DuckDuckGo => Ok(Arc::new(DuckDuckGoSearch::new())),
        SearchProviderKind::Tavily => {
            let env = config.api_key_env.as_deref().ok_or_else(|| {
                AppError::Config("search.api_key_env is not set".to_string())
            })?;
            let api_key = std::env::var(env).map_err(|_| {
                AppError::Config(format!("Environment variable '{}' is not set", env))
            })?;

            let mut tavily =
                TavilySearch::new(api_key, config.timeout())?;
            if let Some(base_url) = &config.base_url {
                tavily = tavily.with_base_url(base_url.clone());
            }
            Ok(Arc::new(tavily))
        }
    }
}

/// Web search powered by daedra (DuckDuckGo backend)
#[derive(Debug, Default, Clone)]
pub struct DuckDuckGoSearch;

impl DuckDuckGoSearch {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl SearchProvider for DuckDuckGoSearch {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>> {
        let search_args = daedra::SearchArgs {
            query: query.to_string(),
            options: Some(daedra::SearchOptions {
                num_results: max_results,
                ..Default::default()
            }),
        };

        let response = daedra::tools::search::perform_search(&search_args)
            .await
            .map_err(|e| AppError::Search(format!("Search failed: {}", e)))?;

        Ok(response
            .data
            .iter()
            .take(max_results)
            .map(|r| SearchHit::new(r.title.clone(), r.url.clone(), r.description.clone()))
            .collect())
    }

    fn name(&self) -> &str {
        "duckduckgo"
    }
}

const TAVILY_API_BASE: &str = "https://api.tavily.com";

#[derive(Debug, Serialize)]
struct TavilyRequest<'a> {
    api_key: &'a str,
    query: &'a str,
    max_results: usize,
    search_depth: &'a str,
}

#[derive(Debug, Deserialize)]
struct TavilyResponse {
    #[serde(default)]
    results: Vec<TavilyResult>,
}

#[derive(Debug, Deserialize)]
struct TavilyResult {
    title: String,
    url: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    score: Option<f32>,
}

/// Web search through the Tavily API
#[derive(Debug, Clone)]
pub struct TavilySearch {
    client: Client,
    api_key: String,
    base_url: String,
}

impl TavilySearch {
    pub fn new(api_key: String, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key,
            base_url: TAVILY_API_BASE.to_string(),
        })
    }

    /// Point the client at a different endpoint (proxies, tests).
    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl SearchProvider for TavilySearch {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>> {
        let request = TavilyRequest {
            api_key: &self.api_key,
            query,
            max_results,
            search_depth: "basic",
        };

        let response = self
            .client
            .post(format!("{}/search", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::Search(format!("Tavily request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::Search(format!(
                "Tavily returned HTTP {}",
                status.as_u16()
            )));
        }

        let body: TavilyResponse = response
            .json()
            .await
            .map_err(|e| AppError::Search(format!("Invalid Tavily response: {}", e)))?;

        Ok(body
            .results
            .into_iter()
            .take(max_results)
            .map(|r| {
                let hit = SearchHit::new(r.title, r.url, r.content);
                match r.score {
                    Some(score) => hit.with_score(score),
                    None => hit,
                }
            })
            .collect())
    }

    fn name(&self) -> &str {
        "tavily"
    }
}
