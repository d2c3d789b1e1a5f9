use serde::Deserialize;
use std::path::PathBuf;

use crate::error::{AppError, Result};

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub session: SessionConfig,
    pub credentials: CredentialsConfig,
    pub git: GitConfig,
    pub github: GitHubConfig,
    pub claude: ClaudeConfig,
    pub agent: AgentConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ApiConfig {
    #[serde(default = "default_api_base_url")]
    pub base_url: String,
    /// OAuth client used for the device authorization grant.
    #[serde(default = "default_cli_client_id")]
    pub client_id: String,
    #[serde(default = "default_device_timeout_secs")]
    pub device_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct SessionConfig {
    /// Where the cached session token lives. Defaults to
    /// `$HOME/.config/authwright/session.json`.
    pub path: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CredentialsConfig {
    #[serde(default = "default_env_files")]
    pub env_files: Vec<String>,
    #[serde(default = "default_client_id_keys")]
    pub client_id_keys: Vec<String>,
    #[serde(default = "default_api_key_keys")]
    pub api_key_keys: Vec<String>,
    #[serde(default = "default_client_id_prefix")]
    pub client_id_prefix: String,
    #[serde(default = "default_api_key_prefix")]
    pub api_key_prefix: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GitConfig {
    #[serde(default = "default_protected_branches")]
    pub protected_branches: Vec<String>,
    #[serde(default = "default_branch_name")]
    pub branch_name: String,
}

#[derive(Deserialize, Clone, Default)]
pub struct GitHubConfig {
    pub token: Option<String>,
}

// Manual Debug impl to avoid leaking the token
impl std::fmt::Debug for GitHubConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubConfig")
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

#[derive(Deserialize, Clone)]
pub struct ClaudeConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_max_turns")]
    pub max_turns: u32,
}

// Manual Debug impl to avoid leaking the API key
impl std::fmt::Debug for ClaudeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClaudeConfig")
            .field("api_key", &"[REDACTED]")
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .field("max_turns", &self.max_turns)
            .finish()
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AgentConfig {
    #[serde(default = "default_max_file_size")]
    pub max_file_size_bytes: usize,
}

fn default_api_base_url() -> String {
    "https://api.authwright.dev".to_string()
}

fn default_cli_client_id() -> String {
    "authwright-cli".to_string()
}

fn default_device_timeout_secs() -> u64 {
    15 * 60
}

fn default_env_files() -> Vec<String> {
    [".env.local", ".env", ".env.development.local", ".env.development"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_client_id_keys() -> Vec<String> {
    vec![
        "AUTHWRIGHT_CLIENT_ID".to_string(),
        "NEXT_PUBLIC_AUTHWRIGHT_CLIENT_ID".to_string(),
        "VITE_AUTHWRIGHT_CLIENT_ID".to_string(),
    ]
}

fn default_api_key_keys() -> Vec<String> {
    vec!["AUTHWRIGHT_API_KEY".to_string()]
}

fn default_client_id_prefix() -> String {
    "client_".to_string()
}

fn default_api_key_prefix() -> String {
    "sk_".to_string()
}

fn default_protected_branches() -> Vec<String> {
    ["main", "master", "develop", "production"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_branch_name() -> String {
    "authwright/add-authentication".to_string()
}

fn default_model() -> String {
    "claude-sonnet-4-20250514".to_string()
}

fn default_max_tokens() -> u32 {
    16384
}

fn default_max_turns() -> u32 {
    60
}

fn default_max_file_size() -> usize {
    512 * 1024 // 512 KB
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_api_base_url(),
            client_id: default_cli_client_id(),
            device_timeout_secs: default_device_timeout_secs(),
        }
    }
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            env_files: default_env_files(),
            client_id_keys: default_client_id_keys(),
            api_key_keys: default_api_key_keys(),
            client_id_prefix: default_client_id_prefix(),
            api_key_prefix: default_api_key_prefix(),
        }
    }
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            protected_branches: default_protected_branches(),
            branch_name: default_branch_name(),
        }
    }
}

impl Default for ClaudeConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: default_model(),
            max_tokens: default_max_tokens(),
            max_turns: default_max_turns(),
        }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_file_size_bytes: default_max_file_size(),
        }
    }
}

impl AppConfig {
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut builder = config::Config::builder();

        // Load from file if specified
        if let Some(path) = config_path {
            builder = builder.add_source(config::File::with_name(path));
        } else {
            builder = builder.add_source(config::File::with_name("authwright").required(false));
        }

        // Environment variable overrides with AUTHWRIGHT__ prefix
        builder = builder.add_source(
            config::Environment::with_prefix("AUTHWRIGHT")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;

        let mut config: AppConfig = config
            .try_deserialize()
            .map_err(|e| AppError::Config(e.to_string()))?;

        if config.claude.api_key.is_empty() {
            if let Ok(key) = std::env::var("ANTHROPIC_API_KEY") {
                config.claude.api_key = key;
            }
        }

        Ok(config)
    }

    pub fn session_path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.session.path {
            return Ok(path.clone());
        }
        let home = std::env::var_os("HOME")
            .ok_or_else(|| AppError::Config("HOME is not set; configure session.path".to_string()))?;
        Ok(PathBuf::from(home)
            .join(".config")
            .join("authwright")
            .join("session.json"))
    }

    pub fn claude_api_key(&self) -> Option<&str> {
        Some(self.claude.api_key.as_str()).filter(|k| !k.is_empty())
    }

    pub fn github_token(&self) -> Option<&str> {
        self.github.token.as_deref().filter(|t| !t.is_empty())
    }
}
