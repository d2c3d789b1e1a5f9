use std::path::PathBuf;

use crate::workflow::context::{Credentials, Integration};

/// Snapshot of the working tree at check time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GitStatus {
    pub is_clean: bool,
    pub files: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BranchStatus {
    /// `None` on a detached HEAD or unborn branch.
    pub branch: Option<String>,
    pub is_protected: bool,
}

/// Existence probe only; file contents are not read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvFileProbe {
    pub exists: bool,
    pub files: Vec<String>,
}

#[derive(Clone, Default, PartialEq, Eq)]
pub struct EnvScan {
    pub found: bool,
    pub client_id: Option<String>,
    pub api_key: Option<String>,
    pub source_path: Option<String>,
}

// Manual Debug impl to avoid leaking the API key
impl std::fmt::Debug for EnvScan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnvScan")
            .field("found", &self.found)
            .field("client_id", &self.client_id)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("source_path", &self.source_path)
            .finish()
    }
}

/// Input for writing local configuration and remote auto-configuration.
#[derive(Debug, Clone)]
pub struct ConfigureRequest {
    pub install_dir: PathBuf,
    pub integration: Integration,
    pub credentials: Credentials,
}

#[derive(Debug, Clone)]
pub struct AgentRequest {
    pub install_dir: PathBuf,
    pub integration: Integration,
    pub credentials: Credentials,
}

/// Business-level agent outcome; a thrown error is reported separately.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AgentResult {
    pub success: bool,
    pub summary: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    pub has_changes: bool,
    pub files: Vec<String>,
}

/// What the commit-message and PR-description generators work from.
#[derive(Debug, Clone)]
pub struct ChangeSummary {
    pub install_dir: PathBuf,
    pub integration: Option<Integration>,
    pub files: Vec<String>,
    /// Files that were already modified before the run started.
    pub preexisting_files: Vec<String>,
    pub agent_summary: Option<String>,
    pub commit_message: Option<String>,
}

#[derive(Debug, Clone)]
pub struct PullRequestRequest {
    pub install_dir: PathBuf,
    pub branch: Option<String>,
    pub title: String,
    pub body: String,
}
