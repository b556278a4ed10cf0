//! # Insight Orchestrator
//!
//! Marketing insight orchestration service. Requests are classified into an
//! analysis mode, delegated to external analyzer processes, and answered with
//! a deterministic catalogue-backed insight whenever the analyzer is missing,
//! crashes or produces garbage.
//!
//! ## Features
//!
//! - **Mode Classification**: Keyword rule tables map free text to one analysis mode per surface
//! - **Analyzer Gateway**: Allow-listed subprocess invocation with timeouts and stderr capture
//! - **Deterministic Fallback**: Canned segment, campaign and content data shaped like analyzer output
//! - **Aggregation**: Per-mode views (segments, ranking, strategy, formats, calendar)
//! - **Chat Streaming**: Token relay from a streaming analyzer with paced fallback replies
//! - **Insight Store**: Append-only in-memory record of produced insights
//!
//! ## Architecture
//!
//! ```text
//! JSON-RPC Client → McpServer (stdio) → Orchestrator → Analyzer processes
//!                                           ↓               ↓ (on failure)
//!                                     InsightStore      Fallback catalogue
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use insight_orchestrator::{Config, AppState, McpServer};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_env()?;
//!     let state = Arc::new(AppState::new(config));
//!     let server = McpServer::new(state);
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

/// Per-mode shaping of analyzer output into client views.
pub mod aggregate;
/// External analyzer processes and their output formats.
pub mod analyzer;
/// One-shot command line operations.
pub mod cli;
/// Configuration management.
pub mod config;
/// Error types and result aliases for the application.
pub mod error;
/// Deterministic stand-in output when an analyzer is unavailable.
pub mod fallback;
/// Analysis surfaces, modes and the keyword classifier.
pub mod modes;
/// Request orchestration across classifier, analyzer, fallback and store.
pub mod orchestrator;
/// JSON-RPC server implementation and request handling.
pub mod server;
/// Insight records and the storage trait.
pub mod storage;
/// Chat token streaming sessions.
pub mod streaming;

pub use config::Config;
pub use error::{AppError, AppResult};
pub use orchestrator::{InsightRequest, Orchestrator};
pub use server::{AppState, McpServer, SharedState};
