use config::{Config, ConfigError, File};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct SolaceConfig {
    pub service: ServiceConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub handler: HandlerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServiceConfig {
    pub log_level: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

/// LLM gateway settings. The API key is never read from the config file;
/// `main` injects it from the environment.
#[derive(Debug, Deserialize, Clone)]
pub struct GatewayConfig {
    pub base_url: String,
    pub model: String,
    pub timeout_seconds: u64,
    #[serde(skip)]
    pub api_key: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: "https://ai.gateway.lovable.dev/v1".to_string(),
            model: "google/gemini-2.5-flash".to_string(),
            timeout_seconds: 60,
            api_key: String::new(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct HttpConfig {
    pub host: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8787,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct HandlerConfig {
    /// Store the fixed safety reply as an assistant message when a crisis
    /// phrase is detected. Off by default.
    #[serde(default)]
    pub persist_crisis_replies: bool,
}

impl SolaceConfig {
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let s = Config::builder()
            .add_source(File::with_name(path))
            .build()?;
        s.try_deserialize()
    }
}
