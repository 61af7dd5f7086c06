//! Pipeline selection and dispatch
//!
//! - [`router`] - The pure research-vs-generation selector
//! - [`orchestrator::Orchestrator`] - Runs the selected pipeline for a request
//! - [`developer::GenerationPipeline`] - The file-generation pipeline

pub mod developer;
pub mod orchestrator;
pub mod router;

pub use developer::GenerationPipeline;
pub use orchestrator::Orchestrator;
pub use router::{PipelineKind, PipelineSelector, select};
