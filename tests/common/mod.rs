//! Shared helpers for integration tests.

#![allow(dead_code)]

pub mod mocks;

use scout::utils::toml_config::ScoutConfig;
use scout::{ConfigManager, Orchestrator};
use std::sync::Arc;

use mocks::{MockLLMClient, ScriptedFetcher, ScriptedSearch};

/// Default config with the planning pause removed so runs finish quickly.
pub fn test_config() -> ScoutConfig {
    let mut config = ScoutConfig::default();
    config.research.planning_delay_ms = 0;
    config
}

pub fn orchestrator(
    config: ScoutConfig,
    search: ScriptedSearch,
    fetcher: ScriptedFetcher,
    llm: MockLLMClient,
) -> Orchestrator {
    Orchestrator::new(
        Arc::new(ConfigManager::from_config(config)),
        Arc::new(search),
        Arc::new(fetcher),
        Arc::new(llm),
    )
}

/// An HTML page whose article body is `text`.
pub fn html_page(title: &str, text: &str) -> String {
    format!(
        "<html><head><title>{title}</title></head><body><article><p>{text}</p></article></body></html>"
    )
}
