use clap::Parser;
use config::{Config, Environment};
use serde::Deserialize;
use std::env;

use crate::llm::{LlmSettings, Provider};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Config file path
    #[arg(short, long, env = "CONFIG_FILE")]
    pub config: Option<String>,

    /// Port to listen on
    #[arg(long, env = "PORT")]
    pub port: Option<u16>,

    /// Require JWT authentication
    #[arg(long, env = "JWT_REQUIRED")]
    pub jwt_required: Option<bool>,

    /// Enable rate limiting
    #[arg(long, env = "RATE_LIMIT_ENABLED")]
    pub rate_limit_enabled: Option<bool>,

    /// Disable timeout middleware
    #[arg(long, env = "TIMEOUT_DISABLED")]
    pub timeout_disabled: Option<bool>,

    /// Connector service base URL
    #[arg(long, env = "CONNECTOR_BASE_URL")]
    pub connector_base_url: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub security: SecurityConfig,
    pub resilience: ResilienceConfig,
    pub connector: ConnectorConfig,
    pub audit: AuditConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SecurityConfig {
    pub jwt_required: bool,
    pub jwt_secret: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ResilienceConfig {
    pub rate_limit_enabled: bool,
    pub timeout_disabled: bool,
    pub requests_per_second: f32,
    pub burst_size: f32,
    /// Per-request bound on concurrent tool calls.
    pub tool_concurrency: usize,
    /// Hard timeout for connector lookups and invocations.
    pub connector_timeout_secs: u64,
    /// Lifetime of a parked confirmation.
    pub pending_ttl_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ConnectorConfig {
    /// Empty means no connector service is configured; external tools are
    /// then never offered.
    pub base_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuditConfig {
    pub log_path: String,
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        Self::load_from_args(std::env::args())
    }

    pub fn load_from_args<I, T>(args: I) -> Result<Self, config::ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let cli =
            Cli::try_parse_from(args).map_err(|e| config::ConfigError::Message(e.to_string()))?;

        let mut builder = Config::builder();

        // Defaults
        builder = builder
            .set_default("server.port", 3000)?
            .set_default("server.host", "0.0.0.0")?
            .set_default("security.jwt_required", true)?
            .set_default("security.jwt_secret", "")?
            .set_default("resilience.rate_limit_enabled", true)?
            .set_default("resilience.timeout_disabled", false)?
            .set_default("resilience.requests_per_second", 5.0)?
            .set_default("resilience.burst_size", 10.0)?
            .set_default("resilience.tool_concurrency", 4)?
            .set_default("resilience.connector_timeout_secs", 5)?
            .set_default("resilience.pending_ttl_secs", 600)?
            .set_default("connector.base_url", "")?
            .set_default("audit.log_path", "audit.jsonl")?;

        // CLI overrides
        if let Some(port) = cli.port {
            builder = builder.set_override("server.port", i64::from(port))?;
        }
        if let Some(jwt) = cli.jwt_required {
            builder = builder.set_override("security.jwt_required", jwt)?;
        }
        if let Some(rl) = cli.rate_limit_enabled {
            builder = builder.set_override("resilience.rate_limit_enabled", rl)?;
        }
        if let Some(td) = cli.timeout_disabled {
            builder = builder.set_override("resilience.timeout_disabled", td)?;
        }
        if let Some(url) = cli.connector_base_url {
            builder = builder.set_override("connector.base_url", url)?;
        }

        // Direct env overrides for secrets that should not travel via CLI.
        if let Ok(secret) = env::var("WA_SECURITY__JWT_SECRET") {
            builder = builder.set_override("security.jwt_secret", secret)?;
        }
        if let Ok(key) = env::var("WA_CONNECTOR__API_KEY") {
            builder = builder.set_override("connector.api_key", key)?;
        }

        // Environment variables prefixed with WA_, e.g. WA_SERVER__PORT=8000.
        builder = builder.add_source(
            Environment::with_prefix("WA")
                .separator("__")
                .try_parsing(true),
        );

        let cfg = builder.build()?;
        cfg.try_deserialize()
    }
}

pub fn load_llm_settings() -> Result<LlmSettings, String> {
    let base_url = std::env::var("LLM_BASE_URL")
        .map_err(|_| "Missing required env var: LLM_BASE_URL".to_string())?;
    if base_url.trim().is_empty() {
        return Err("LLM_BASE_URL cannot be empty".to_string());
    }

    let model = std::env::var("LLM_MODEL")
        .map_err(|_| "Missing required env var: LLM_MODEL".to_string())?;
    if model.trim().is_empty() {
        return Err("LLM_MODEL cannot be empty".to_string());
    }

    let api_key = std::env::var("LLM_API_KEY")
        .ok()
        .filter(|s| !s.trim().is_empty());

    let request_timeout_secs = std::env::var("LLM_TIMEOUT_SECS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(60);

    // Auto-detect provider from base URL
    let mut provider = Provider::detect_from_url(&base_url);

    // Load Azure-specific settings if needed
    if let Provider::AzureOpenAI { .. } = &provider {
        if let Ok(deployment) = std::env::var("AZURE_DEPLOYMENT_NAME") {
            provider = Provider::AzureOpenAI {
                deployment_name: deployment,
                api_version: std::env::var("AZURE_API_VERSION")
                    .unwrap_or_else(|_| "2024-08-01-preview".to_string()),
            };
        }
    }

    Ok(LlmSettings {
        base_url,
        api_key,
        model,
        provider,
        request_timeout_secs,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_load() {
        let cfg = AppConfig::load_from_args(["workspace-assistant"]).unwrap();
        assert_eq!(cfg.server.port, 3000);
        assert!(cfg.security.jwt_required);
        assert_eq!(cfg.resilience.tool_concurrency, 4);
        assert_eq!(cfg.resilience.connector_timeout_secs, 5);
        assert!(cfg.connector.base_url.is_empty());
    }

    #[test]
    fn test_cli_overrides() {
        let cfg = AppConfig::load_from_args([
            "workspace-assistant",
            "--port",
            "8080",
            "--jwt-required",
            "false",
            "--connector-base-url",
            "http://localhost:8100",
        ])
        .unwrap();
        assert_eq!(cfg.server.port, 8080);
        assert!(!cfg.security.jwt_required);
        assert_eq!(cfg.connector.base_url, "http://localhost:8100");
    }
}
