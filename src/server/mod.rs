//! Server module for JSON-RPC handling.
//!
//! This module provides:
//! - JSON-RPC 2.0 server implementation over stdio
//! - Tool call handlers and routing
//! - Shared application state management

mod handlers;
mod mcp;

pub use handlers::*;
pub use mcp::*;

use std::sync::Arc;

use crate::analyzer::ProcessAnalyzer;
use crate::config::Config;
use crate::orchestrator::Orchestrator;
use crate::storage::MemoryStore;
use crate::streaming::ChatDispatcher;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Config,
    /// Request orchestrator.
    pub orchestrator: Orchestrator,
}

impl AppState {
    /// Create application state backed by analyzer processes and an in-memory store.
    pub fn new(config: Config) -> Self {
        tracing::info!(
            interpreter = %config.analyzer.interpreter.display(),
            allowed = config.analyzer.allowed_executables.len(),
            timeout_ms = config.analyzer.timeout_ms,
            "AppState initializing with analyzer configuration"
        );

        let analyzer = ProcessAnalyzer::new(
            config.analyzer.clone(),
            config.streaming.channel_capacity,
        );
        let orchestrator = Orchestrator::new(
            Arc::new(analyzer),
            Arc::new(MemoryStore::new()),
            ChatDispatcher::new(&config.streaming),
        );

        Self {
            config,
            orchestrator,
        }
    }

    /// Create application state around an existing orchestrator.
    pub fn with_orchestrator(config: Config, orchestrator: Orchestrator) -> Self {
        Self {
            config,
            orchestrator,
        }
    }
}

/// Shared application state handle
pub type SharedState = Arc<AppState>;
