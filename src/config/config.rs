use serde::Deserialize;

use crate::llm::framing::LineFraming;

const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant that provides well-structured, detailed responses. \
When appropriate, use markdown formatting for better readability. \
Use code blocks with language specification for code examples. \
Format lists and tables appropriately. \
Break down complex explanations into sections.";

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

/// The text-generation service the relay forwards prompts to.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct UpstreamConfig {
    pub provider: String,
    pub base_url: String,
    pub model: String,
    pub system_prompt: Option<String>,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            provider: "ollama".to_string(),
            base_url: "http://localhost:11434".to_string(),
            model: "llama3.2".to_string(),
            system_prompt: Some(DEFAULT_SYSTEM_PROMPT.to_string()),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct RelayConfig {
    pub framing: LineFraming,
}

/// Where a chat client sends its prompts.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ChatBackend {
    /// Through a relay endpoint over HTTP.
    Relay { url: String },
    /// Straight to the upstream service described by `upstream`.
    Direct,
}

impl Default for ChatBackend {
    fn default() -> Self {
        ChatBackend::Relay {
            url: "http://127.0.0.1:8080/api/generate".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct ClientConfig {
    pub backend: ChatBackend,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub upstream: UpstreamConfig,
    pub relay: RelayConfig,
    pub client: ClientConfig,
}

impl AppConfig {
    pub fn load(path: &str) -> Result<Self, config::ConfigError> {
        dotenv::dotenv().ok();

        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(config::Environment::with_prefix("PARLEY").separator("__"))
            .build()?;

        let mut app_config: AppConfig = settings.try_deserialize()?;

        // Expand environment variables if present like ${OLLAMA_HOST}
        app_config.server.host = expand_env(&app_config.server.host);
        app_config.upstream.base_url = expand_env(&app_config.upstream.base_url);

        if let ChatBackend::Relay { ref mut url } = app_config.client.backend {
            *url = expand_env(url);
        }

        Ok(app_config)
    }
}

fn expand_env(val: &str) -> String {
    match val.strip_prefix("${").and_then(|v| v.strip_suffix('}')) {
        Some(var_name) => std::env::var(var_name).unwrap_or_default(),
        None => val.to_string(),
    }
}
