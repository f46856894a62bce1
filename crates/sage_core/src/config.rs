use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

// ============================================================================
// Top-level config
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SageConfig {
    pub llm: LlmConfig,
    pub agent: AgentConfig,
    pub gateway: GatewayConfig,
    pub wikipedia: WikipediaConfig,
}

impl SageConfig {
    /// Load config from a TOML file, falling back to defaults for missing fields.
    /// After loading, env var overrides are applied.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;
        let mut config: SageConfig =
            toml::from_str(&content).with_context(|| "Failed to parse TOML config")?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Try to load from path; if the file doesn't exist, return defaults with env overrides.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        match Self::load(path) {
            Ok(cfg) => cfg,
            Err(e) => {
                tracing::info!("Config file not found or invalid ({:#}), using defaults", e);
                let mut cfg = Self::default();
                cfg.apply_env_overrides();
                cfg
            }
        }
    }

    /// Apply environment variable overrides on top of file-based config.
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("LLM_PROVIDER") {
            self.llm.provider = v;
        }
        if let Some(v) = lookup("LLM_MODEL") {
            self.llm.model = v;
        }
        if let Some(v) = lookup("LLM_BASE_URL") {
            self.llm.base_url = Some(v);
        }
        if let Some(n) = lookup("LLM_MAX_TOKENS").and_then(|v| v.parse().ok()) {
            self.llm.max_tokens = n;
        }
        if let Some(n) = lookup("LLM_TEMPERATURE").and_then(|v| v.parse().ok()) {
            self.llm.temperature = n;
        }
        if let Some(n) = lookup("SAGE_MAX_REASONING_STEPS").and_then(|v| v.parse().ok()) {
            self.agent.max_reasoning_steps = n;
        }
        if let Some(v) = lookup("SAGE_EXTRA_CONTEXT") {
            self.agent.extra_context = Some(v);
        }
        if let Some(v) = lookup("GATEWAY_HOST") {
            self.gateway.host = v;
        }
        if let Some(n) = lookup("GATEWAY_PORT").and_then(|v| v.parse().ok()) {
            self.gateway.port = n;
        }
        if let Some(n) = lookup("GATEWAY_WS_QUERY_TIMEOUT_SECS").and_then(|v| v.parse().ok()) {
            self.gateway.ws_query_timeout_secs = n;
        }
        if let Some(v) = lookup("WIKIPEDIA_API_URL") {
            self.wikipedia.api_url = v;
        }
    }
}

// ============================================================================
// Sub-configs
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// `openai` or `mock`.
    pub provider: String,
    pub model: String,
    pub base_url: Option<String>,
    pub max_tokens: u32,
    pub temperature: f32,
    /// Per-request HTTP timeout.
    pub request_timeout_secs: u64,
    /// Attempts per request, including the first.
    pub max_attempts: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "gpt-4o".to_string(),
            base_url: None,
            max_tokens: 1024,
            temperature: 0.1,
            request_timeout_secs: 60,
            max_attempts: 3,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Step ceiling: the trace never grows past this many entries.
    pub max_reasoning_steps: usize,
    /// Extra context appended to the system instructions.
    pub extra_context: Option<String>,
    /// Character budget for the memory window sent to the model.
    /// `None` sends the whole dialogue.
    pub memory_budget_chars: Option<usize>,
    pub model_timeout_secs: u64,
    pub tool_timeout_secs: u64,
    /// Extra attempts for transient tool failures.
    pub tool_max_retries: usize,
    /// Accept output with no `Thought:` marker as a final answer.
    pub implicit_final_answer: bool,
}

impl AgentConfig {
    pub fn model_timeout(&self) -> Duration {
        Duration::from_secs(self.model_timeout_secs)
    }

    pub fn tool_timeout(&self) -> Duration {
        Duration::from_secs(self.tool_timeout_secs)
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_reasoning_steps: 10,
            extra_context: None,
            memory_budget_chars: None,
            model_timeout_secs: 120,
            tool_timeout_secs: 30,
            tool_max_retries: 1,
            implicit_final_answer: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
    /// Upper bound for a single `POST /query` request.
    pub http_query_timeout_secs: u64,
    /// Upper bound for one query on a WebSocket session. Expiry closes the socket.
    pub ws_query_timeout_secs: u64,
    /// Queries a WebSocket client may queue behind the one in flight.
    pub max_queued_queries: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            http_query_timeout_secs: 120,
            ws_query_timeout_secs: 120,
            max_queued_queries: 32,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WikipediaConfig {
    /// MediaWiki action API endpoint.
    pub api_url: String,
    pub search_results: usize,
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for WikipediaConfig {
    fn default() -> Self {
        Self {
            api_url: "https://en.wikipedia.org/w/api.php".to_string(),
            search_results: 15,
            timeout_secs: 10,
            user_agent: concat!("sage/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
