//! Workspace Assistant Server
//!
//! Entry point for the assistant orchestration service.

use std::sync::Arc;

use dotenvy::dotenv;
use mimalloc::MiMalloc;

use workspace_assistant::config::{AppConfig, load_llm_settings};
use workspace_assistant::server::start_server;
use workspace_assistant::telemetry;

/// Global allocator for improved performance (M-MIMALLOC-APPS).
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() {
    // Load .env (if present) before anything reads the environment.
    let _ = dotenv();

    // Initialize tracing (M-LOG-STRUCTURED)
    telemetry::init();

    let config = match AppConfig::load() {
        Ok(c) => Arc::new(c),
        Err(e) => {
            eprintln!("Configuration error: {e}");
            std::process::exit(1);
        }
    };

    let settings = match load_llm_settings() {
        Ok(s) => s,
        Err(msg) => {
            eprintln!("Configuration error: {msg}");
            std::process::exit(1);
        }
    };

    if let Err(e) = start_server(config, settings).await {
        eprintln!("Server error: {e}");
        std::process::exit(1);
    }
}
