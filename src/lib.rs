//! Workspace Assistant
//!
//! A conversational workspace assistant service. The interesting part is
//! not the model call. It is the orchestration pipeline in front of it:
//! classify intent, assemble only the tools that are authorized and
//! relevant, gate side-effecting actions behind explicit confirmation,
//! execute tool calls with partial-failure tolerance, and answer with one
//! envelope shape no matter which execution path served the request.
//!
//! # Architecture
//!
//! - **Server**: Axum-based HTTP API with JWT auth, timeouts, rate limits
//! - **Pipeline**: intent → capability assembly → model turn → confirmation
//!   gate → executor → follow-up turn, with a rich and an internal-only path
//! - **Capabilities**: static internal registry + per-request external
//!   resolution against the connector service
//! - **Audit**: append-only record of every external tool attempt
//!
//! # Modules
//!
//! - [`pipeline`]: the orchestration pipeline and both execution paths
//! - [`tools`]: tool model, internal registry, external resolver, assembler
//! - [`intent`]: deterministic intent classification
//! - [`llm`]: LLM client boundary
//! - [`envelope`]: the unified response contract

// Allow pedantic clippy warnings that don't add value for this codebase
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::missing_fields_in_debug)]
#![allow(clippy::implicit_hasher)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::cargo_common_metadata)]
#![allow(clippy::multiple_crate_versions)]
#![allow(clippy::default_trait_access)]
#![allow(clippy::unused_async)]

pub mod audit;
pub mod config;
pub mod envelope;
pub mod error;
pub mod intent;
pub mod llm;
pub mod pending;
pub mod pipeline;
pub mod security;
pub mod server;
pub mod telemetry;
pub mod tools;
pub mod workspace;

use std::sync::Arc;

use crate::config::AppConfig;
use crate::pipeline::controller::AssistantController;
use crate::security::rate_limit::SimpleRateLimiter;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// The dual-path pipeline controller.
    pub controller: Arc<AssistantController>,
    /// Global rate limiter.
    pub rate_limiter: Arc<SimpleRateLimiter>,
    /// Global configuration.
    pub config: Arc<AppConfig>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState").finish()
    }
}
