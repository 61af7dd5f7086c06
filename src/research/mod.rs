//! Research Pipeline Orchestration
//!
//! This module answers a query by running a staged research pipeline and
//! streaming its progress as an ordered sequence of events.
//!
//! # Architecture
//!
//! - [`stage`] - The forward-only stage state machine and the stage executor
//! - [`coordinator::FetchCoordinator`] - Concurrent page retrieval with per-task failure isolation
//! - [`synthesis::TokenStreamConsumer`] - Forwards generated tokens with an idle timeout
//! - [`events`] - The single ordered, cancelable event channel of a run
//! - [`pipeline::ResearchPipeline`] - Sequences the stages and threads results forward
//!
//! # Usage
//!
//! ```ignore
//! use futures::StreamExt;
//! use scout::research::ResearchPipeline;
//!
//! let pipeline = Arc::new(ResearchPipeline::new(search, fetcher, llm, config));
//! let mut events = pipeline.start("How do async runtimes schedule tasks?", "session-1");
//!
//! while let Some(event) = events.next().await {
//!     println!("{}", serde_json::to_string(&event)?);
//! }
//! ```
//!
//! # Research Workflow
//!
//! 1. **Planning** - Acknowledge the query
//! 2. **Searching** - One web search; failure ends the run with an `error` event
//! 3. **Fetching** - Read the top results concurrently; failures are isolated
//! 4. **Synthesizing** - Stream the report from the LLM
//! 5. **Completed** - `pipeline_end`

/// Concurrent page retrieval.
pub mod coordinator;
/// Event types and the run's event channel.
pub mod events;
/// The research pipeline driver.
pub mod pipeline;
/// Stage state machine and executor.
pub mod stage;
/// Prompt construction and token streaming.
pub mod synthesis;

pub use coordinator::{FetchCoordinator, FetchStatus, FetchTask};
pub use events::{EventPayload, EventSink, EventStream, StreamClosed, StreamEvent, ToolStatus};
pub use pipeline::ResearchPipeline;
pub use stage::{PipelineRun, Stage, ToolInvocation};
pub use synthesis::{ConsumedMessage, TokenStreamConsumer};
