//! # Scout - Research Pipeline Server
//!
//! Scout answers a chat message by running one of two pipelines and
//! streaming its progress as an ordered sequence of events:
//!
//! - **research**: plan, search the web, fetch and extract the top pages
//!   concurrently, then stream an LLM-written report grounded in them.
//! - **generation**: generate a small static web project (HTML, CSS,
//!   JavaScript) and present it as a file listing.
//!
//! Scout can be used in two ways:
//!
//! 1. **As a standalone server** - Run the `scout-server` binary
//! 2. **As a library** - Drive pipelines from your own Rust code
//!
//! ## Quick Start (Library Usage)
//!
//! ```rust,ignore
//! use scout::{ConfigManager, Orchestrator, Provider};
//! use scout::tools::{HttpFetcher, search};
//! use futures::StreamExt;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Arc::new(ConfigManager::new("scout.toml")?);
//!     let snapshot = config.config();
//!
//!     let llm = Provider::from_config(&snapshot.llm)?.create_client().await?;
//!     let search = search::from_config(&snapshot.search)?;
//!     let orchestrator = Orchestrator::new(config, search, Arc::new(HttpFetcher::new()), Arc::from(llm));
//!
//!     let (_, mut events) = orchestrator.stream("What is Rust?", "session-1", None);
//!     while let Some(event) = events.next().await {
//!         println!("{}", serde_json::to_string(&event)?);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `ollama` | Ollama local inference (default) |
//! | `openai` | OpenAI API and compatible endpoints |
//! | `all-llm` | Both providers |
//!
//! ## Modules
//!
//! - [`agents`] - Pipeline selection, dispatch and the generation pipeline
//! - [`research`] - The research pipeline and its event channel
//! - [`tools`] - Web search, page retrieval and HTML extraction
//! - [`llm`] - LLM client implementations
//! - [`api`] - REST/SSE handlers and routes
//! - [`cli`] - Command-line interface
//! - [`types`] - Common types and error handling
//! - [`utils`] - TOML configuration with hot reload

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(rustdoc::missing_crate_level_docs)]

/// Pipeline selection and dispatch.
pub mod agents;
/// HTTP API handlers and routes.
pub mod api;
/// Command-line interface.
pub mod cli;
/// LLM provider clients and abstractions.
pub mod llm;
/// The research pipeline orchestrator.
pub mod research;
/// Search, retrieval and extraction.
pub mod tools;
/// Core types (requests, responses, errors).
pub mod types;
/// Configuration utilities.
pub mod utils;

// Re-export commonly used types
pub use agents::{Orchestrator, PipelineKind, PipelineSelector};
pub use llm::{LLMClient, Provider};
pub use research::{EventPayload, EventStream, ResearchPipeline, StreamEvent};
pub use types::{AppError, Result};
pub use utils::toml_config::{ConfigManager, ScoutConfig};

use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Pipeline dispatcher with its injected collaborators
    pub orchestrator: Arc<Orchestrator>,
    /// TOML configuration with hot-reload support
    pub config: Arc<ConfigManager>,
}

impl AppState {
    pub fn new(orchestrator: Arc<Orchestrator>) -> Self {
        let config = Arc::clone(orchestrator.config());
        Self {
            orchestrator,
            config,
        }
    }
}
