use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Target framework or platform the SDK is being installed into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Integration {
    Nextjs,
    ReactRouter,
    TanstackStart,
    React,
    VanillaJs,
    Node,
    Python,
    Go,
}

impl Integration {
    /// Client-only integrations never see the secret API key.
    pub fn requires_api_key(self) -> bool {
        !matches!(self, Integration::React | Integration::VanillaJs)
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Integration::Nextjs => "Next.js",
            Integration::ReactRouter => "React Router",
            Integration::TanstackStart => "TanStack Start",
            Integration::React => "React",
            Integration::VanillaJs => "Vanilla JavaScript",
            Integration::Node => "Node.js",
            Integration::Python => "Python",
            Integration::Go => "Go",
        }
    }

    pub fn is_javascript(self) -> bool {
        !matches!(self, Integration::Python | Integration::Go)
    }

    /// Env file the credentials are written to.
    pub fn env_file(self) -> &'static str {
        if self.is_javascript() {
            ".env.local"
        } else {
            ".env"
        }
    }

    /// Callback URL registered against the remote API during configuration.
    pub fn default_redirect_uri(self) -> &'static str {
        match self {
            Integration::Nextjs | Integration::ReactRouter => "http://localhost:3000/callback",
            Integration::TanstackStart => "http://localhost:3000/api/auth/callback",
            Integration::React | Integration::VanillaJs => "http://localhost:5173/callback",
            Integration::Node => "http://localhost:3000/callback",
            Integration::Python => "http://localhost:5000/callback",
            Integration::Go => "http://localhost:8000/callback",
        }
    }
}

impl std::fmt::Display for Integration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Immutable run configuration supplied by the caller.
#[derive(Debug, Clone)]
pub struct InstallOptions {
    pub install_dir: PathBuf,
    pub skip_auth: bool,
    pub no_commit: bool,
    pub client_id: Option<String>,
    pub api_key: Option<String>,
    /// Integration chosen upstream; detection honours it instead of sniffing.
    pub integration: Option<Integration>,
}

impl InstallOptions {
    pub fn new(install_dir: impl Into<PathBuf>) -> Self {
        Self {
            install_dir: install_dir.into(),
            skip_auth: false,
            no_commit: false,
            client_id: None,
            api_key: None,
            integration: None,
        }
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub client_id: String,
    pub api_key: Option<String>,
}

// Manual Debug impl to avoid leaking the API key
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// Which waterfall step produced the credentials.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CredentialSource {
    Cli,
    Env,
    Stored,
    Device,
    Manual,
}

/// Verification details shown to the user during device authorization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceAuthGrant {
    pub verification_uri: String,
    pub verification_uri_complete: String,
    pub user_code: String,
}

/// The most recent fatal failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowError {
    pub message: String,
    pub stack: Option<String>,
    /// Already described to renderers by a phase-specific failure event.
    pub reported: bool,
}

impl WorkflowError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            stack: None,
            reported: false,
        }
    }

    pub fn from_error(prefix: &str, error: &crate::error::AppError) -> Self {
        Self {
            message: format!("{prefix}: {error}"),
            stack: Some(format!("{error:?}")),
            reported: false,
        }
    }
}

/// Mutable state of one run. Owned by the orchestrator.
#[derive(Debug, Clone)]
pub struct WorkflowContext {
    pub options: InstallOptions,
    pub integration: Option<Integration>,
    pub git_is_clean: Option<bool>,
    pub git_dirty_files: Vec<String>,
    pub current_branch: Option<String>,
    pub is_protected_branch: bool,
    credentials: Option<Credentials>,
    credential_source: Option<CredentialSource>,
    pub env_files_detected: Vec<String>,
    pub env_credential_path: Option<String>,
    pub device_auth: Option<DeviceAuthGrant>,
    pub agent_summary: Option<String>,
    pub changed_files: Vec<String>,
    pub commit_message: Option<String>,
    pub pr_description: Option<String>,
    pub pr_url: Option<String>,
    pub error: Option<WorkflowError>,
}

impl WorkflowContext {
    pub fn new(options: InstallOptions) -> Self {
        Self {
            options,
            integration: None,
            git_is_clean: None,
            git_dirty_files: Vec::new(),
            current_branch: None,
            is_protected_branch: false,
            credentials: None,
            credential_source: None,
            env_files_detected: Vec::new(),
            env_credential_path: None,
            device_auth: None,
            agent_summary: None,
            changed_files: Vec::new(),
            commit_message: None,
            pr_description: None,
            pr_url: None,
            error: None,
        }
    }

    pub fn credentials(&self) -> Option<&Credentials> {
        self.credentials.as_ref()
    }

    pub fn credential_source(&self) -> Option<CredentialSource> {
        self.credential_source
    }

    /// Record the waterfall result. Credentials are write-once per run;
    /// returns false and leaves the context untouched on a second attempt.
    pub fn resolve_credentials(&mut self, credentials: Credentials, source: CredentialSource) -> bool {
        if self.credentials.is_some() {
            tracing::error!(source = ?source, "Credentials already resolved, ignoring");
            return false;
        }
        self.credentials = Some(credentials);
        self.credential_source = Some(source);
        true
    }

    pub fn requires_api_key(&self) -> bool {
        self.integration.map_or(true, Integration::requires_api_key)
    }

    pub fn fail(&mut self, error: WorkflowError) {
        tracing::error!(message = %error.message, "Workflow failed");
        self.error = Some(error);
    }
}
