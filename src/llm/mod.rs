//! LLM Provider Clients and Abstractions
//!
//! This module provides a unified interface for the text generation backends
//! used by the synthesis and generation stages. Provider specifics are hidden
//! behind the [`LLMClient`] trait, so pipelines only ever see a prompt going in
//! and a stream of text fragments coming out.
//!
//! # Supported Providers
//!
//! Enable providers via Cargo features:
//! - `ollama` - Local Ollama server (default)
//! - `openai` - OpenAI API and compatible endpoints
//!
//! # Streaming
//!
//! All providers support streaming via [`LLMClient::stream`], which returns a
//! [`TokenStream`] of text fragments in generation order.

/// Core LLM client trait and provider selection.
pub mod client;

#[cfg(feature = "ollama")]
pub mod ollama;

#[cfg(feature = "openai")]
pub mod openai;

pub use client::{LLMClient, Provider, TokenStream};
