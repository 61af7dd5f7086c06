//! HTTP API handlers and routes
//!
//! # API Endpoints
//!
//! ## Chat (`/api/chat`)
//! - `POST /api/chat/stream` - Run a pipeline and stream its events as SSE
//! - `POST /api/chat` - Run a pipeline to completion and return one reply
//!
//! ## Health (`/api/health`)
//! - `GET /api/health` - Health check endpoint
//!
//! Every SSE `data:` line is one JSON-encoded
//! [`StreamEvent`](crate::research::StreamEvent); the stream ends with
//! `data: [DONE]`. Closing the connection cancels the run.

/// Request handlers for all API endpoints.
pub mod handlers;
/// Router configuration and route definitions.
pub mod routes;
