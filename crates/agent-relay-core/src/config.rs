//! Configuration loading and validation.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Tool name reported for every tool-use episode unless configured otherwise.
pub const DEFAULT_TOOL_NAME: &str = "tavily";

/// Environment variable consulted for the tool API key by default.
pub const DEFAULT_TOOL_API_KEY_ENV: &str = "TAVILY_API_KEY";

/// Shown in place of secrets when config is printed.
pub const REDACTED: &str = "********";

/// Top-level agent-relay configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upstream: Option<UpstreamConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub logging: Option<LoggingConfig>,
}

/// Where and how to invoke the agent runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub url_env: Option<String>,

    /// Server-side tool API key. Takes priority over a client-supplied key.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_api_key: Option<String>,

    #[serde(default = "default_tool_api_key_env")]
    pub tool_api_key_env: Option<String>,

    #[serde(default)]
    pub tool_naming: ToolNaming,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

fn default_tool_api_key_env() -> Option<String> {
    Some(DEFAULT_TOOL_API_KEY_ENV.into())
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            url: None,
            url_env: None,
            tool_api_key: None,
            tool_api_key_env: default_tool_api_key_env(),
            tool_naming: ToolNaming::default(),
            timeout_secs: None,
        }
    }
}

impl UpstreamConfig {
    pub fn resolve_url(&self) -> Option<String> {
        resolve_secret_field(&self.url, &self.url_env)
    }

    pub fn resolve_tool_api_key(&self) -> Option<String> {
        resolve_secret_field(&self.tool_api_key, &self.tool_api_key_env)
    }
}

/// How the normalizer names the tool in `tool_use` events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ToolNaming {
    /// Always report the same name; the deployment has one integrated tool.
    Fixed { name: String },
    /// Report `toolUse.name` from the provider payload, or `fallback`.
    FromPayload { fallback: String },
}

impl Default for ToolNaming {
    fn default() -> Self {
        Self::Fixed {
            name: DEFAULT_TOOL_NAME.into(),
        }
    }
}

impl ToolNaming {
    /// Pick the tool name given the provider's `toolUse` object.
    pub fn resolve(&self, tool_use: &serde_json::Value) -> String {
        match self {
            ToolNaming::Fixed { name } => name.clone(),
            ToolNaming::FromPayload { fallback } => tool_use
                .get("name")
                .and_then(|n| n.as_str())
                .filter(|n| !n.is_empty())
                .unwrap_or(fallback)
                .to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log format: "plain" (default) or "json".
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Log level override (trace/debug/info/warn/error).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,

    /// Per-crate log level overrides (e.g. "agent_relay_normalizer=trace").
    #[serde(default)]
    pub filters: Vec<String>,

    /// Output target: "stderr" (default) or "stdout".
    #[serde(default = "default_log_output")]
    pub output: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: default_log_format(),
            level: None,
            filters: Vec::new(),
            output: default_log_output(),
        }
    }
}

fn default_log_format() -> String {
    "plain".into()
}

fn default_log_output() -> String {
    "stderr".into()
}

/// Resolve a secret: check the direct value first, then the env-var reference.
pub fn resolve_secret_field(direct: &Option<String>, env_var: &Option<String>) -> Option<String> {
    if let Some(val) = direct {
        if !val.is_empty() {
            return Some(val.clone());
        }
    }
    if let Some(env) = env_var {
        if let Ok(val) = std::env::var(env) {
            if !val.is_empty() {
                return Some(val);
            }
        }
    }
    None
}

static ENV_VAR_PATTERN: LazyLock<regex::Regex> =
    LazyLock::new(|| regex::Regex::new(r"\$\{([^}]+)\}").expect("env var pattern is valid"));

/// Substitute `${ENV_VAR}` patterns in a string with their environment variable values.
fn substitute_env_vars(input: &str) -> String {
    ENV_VAR_PATTERN
        .replace_all(input, |caps: &regex::Captures| {
            std::env::var(&caps[1]).unwrap_or_default()
        })
        .into_owned()
}

impl Config {
    /// Load config from a JSON5 file, substituting `${ENV_VAR}` references.
    pub fn load(path: &Path) -> crate::error::Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "No config file; using defaults");
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path)?;
        let substituted = substitute_env_vars(&raw);

        let config: Config = json5::from_str(&substituted)
            .map_err(|e| crate::error::RelayError::Config(e.to_string()))?;

        tracing::debug!(path = %path.display(), "Loaded config");
        Ok(config)
    }

    /// Default config file location.
    pub fn config_dir() -> PathBuf {
        data_dir().join("config.json")
    }

    pub fn upstream_url(&self) -> Option<String> {
        self.upstream.as_ref().and_then(UpstreamConfig::resolve_url)
    }

    /// Tool API key for a request: the server-side key wins, the
    /// client-supplied one is the fallback.
    pub fn tool_api_key(&self, client_key: Option<&str>) -> Option<String> {
        let server_key = match &self.upstream {
            Some(upstream) => upstream.resolve_tool_api_key(),
            None => resolve_secret_field(&None, &default_tool_api_key_env()),
        };
        server_key.or_else(|| {
            client_key
                .filter(|k| !k.is_empty())
                .map(str::to_string)
        })
    }

    /// Whether a server-side tool API key is available.
    pub fn has_server_tool_api_key(&self) -> bool {
        self.tool_api_key(None).is_some()
    }

    pub fn tool_naming(&self) -> ToolNaming {
        self.upstream
            .as_ref()
            .map(|u| u.tool_naming.clone())
            .unwrap_or_default()
    }

    pub fn upstream_timeout(&self) -> Duration {
        let secs = self
            .upstream
            .as_ref()
            .and_then(|u| u.timeout_secs)
            .unwrap_or(300);
        Duration::from_secs(secs)
    }

    /// The config as JSON with secrets replaced by [`REDACTED`].
    pub fn redacted_value(&self) -> serde_json::Value {
        let mut json = serde_json::to_value(self).unwrap_or_default();
        if let Some(key) = json.pointer_mut("/upstream/tool_api_key") {
            *key = REDACTED.into();
        }
        json
    }

    /// Get a config value by dotted path (e.g. "upstream.url", "logging.format").
    /// Secrets come back redacted at any depth.
    pub fn get_path(&self, path: &str) -> Option<serde_json::Value> {
        let json = self.redacted_value();
        let mut current = &json;
        for segment in path.split('.') {
            current = current.get(segment)?;
        }
        Some(current.clone())
    }

    /// Validate config, returning (warnings, errors).
    pub fn validate(&self) -> (Vec<String>, Vec<String>) {
        let mut warnings = Vec::new();
        let mut errors = Vec::new();

        if self.upstream_url().is_none() {
            errors.push("No upstream URL configured (set upstream.url or upstream.url_env)".to_string());
        }

        if !self.has_server_tool_api_key() {
            warnings.push(
                "No server-side tool API key; clients must supply one per request".to_string(),
            );
        }

        if let Some(ToolNaming::Fixed { name } | ToolNaming::FromPayload { fallback: name }) =
            self.upstream.as_ref().map(|u| &u.tool_naming)
        {
            if name.is_empty() {
                errors.push("Tool name cannot be empty".to_string());
            }
        }

        if self.upstream.as_ref().and_then(|u| u.timeout_secs) == Some(0) {
            errors.push("Upstream timeout cannot be 0".to_string());
        }

        (warnings, errors)
    }
}

/// Base directory for agent-relay data: `~/.agent_relay/`
pub fn data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".agent_relay")
}
