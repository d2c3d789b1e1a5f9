//! Narrow asynchronous contracts the orchestrator drives.
//!
//! Every input is an owned snapshot; implementations never see the
//! orchestrator's context and only hand back plain results.

pub mod live;
pub mod types;

use std::path::PathBuf;

use async_trait::async_trait;

use crate::error::Result;
use crate::events::EventBus;
use crate::workflow::context::{Credentials, DeviceAuthGrant, InstallOptions, Integration};
use types::*;

#[async_trait]
pub trait Collaborators: Send + Sync {
    /// Whether the user is logged in to the CLI.
    async fn check_authentication(&self, options: InstallOptions) -> Result<bool>;

    async fn detect_integration(&self, options: InstallOptions) -> Result<Option<Integration>>;

    async fn check_git_status(&self, install_dir: PathBuf) -> Result<GitStatus>;

    async fn check_branch(&self, install_dir: PathBuf) -> Result<BranchStatus>;

    /// Create and check out `name`, or `fallback_name` if `name` is taken.
    async fn create_branch(
        &self,
        install_dir: PathBuf,
        name: String,
        fallback_name: String,
    ) -> Result<String>;

    async fn detect_env_files(&self, install_dir: PathBuf) -> Result<EnvFileProbe>;

    async fn scan_env_files(&self, install_dir: PathBuf) -> Result<EnvScan>;

    /// Whether a cached session token exists and is still usable.
    async fn check_stored_auth(&self) -> Result<bool>;

    /// Run the interactive device authorization flow to completion.
    /// The verification code is published on `events` while polling.
    async fn run_device_auth(&self, events: EventBus) -> Result<DeviceAuthGrant>;

    async fn fetch_remote_credentials(&self) -> Result<Credentials>;

    async fn configure_environment(&self, request: ConfigureRequest) -> Result<()>;

    async fn run_agent(&self, request: AgentRequest) -> Result<AgentResult>;

    async fn detect_changes(&self, install_dir: PathBuf) -> Result<ChangeSet>;

    async fn generate_commit_message(&self, summary: ChangeSummary) -> Result<String>;

    async fn commit_changes(&self, install_dir: PathBuf, message: String) -> Result<()>;

    /// Whether pushing and opening a pull request can be automated.
    async fn check_pr_tooling(&self, install_dir: PathBuf) -> Result<bool>;

    async fn generate_pr_description(&self, summary: ChangeSummary) -> Result<String>;

    /// Push the current branch, returning its name.
    async fn push_branch(&self, install_dir: PathBuf) -> Result<String>;

    /// Open a pull request, returning its URL.
    async fn create_pr(&self, request: PullRequestRequest) -> Result<String>;
}
