//! API request handlers.

/// Chat and streaming handlers.
pub mod chat;
/// Health check handler.
pub mod health;
