use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::agent::InstallAgent;
use crate::api::{device, ApiClient, Session, SessionStore};
use crate::collaborators::types::*;
use crate::collaborators::Collaborators;
use crate::config::AppConfig;
use crate::error::{AppError, Result};
use crate::events::{EventBus, WizardEvent};
use crate::platform::github::GitHubPlatform;
use crate::platform::types::{CreatePullRequest, RepoRef};
use crate::platform::Platform;
use crate::project::{configure, detect, env_files};
use crate::workflow::context::{Credentials, DeviceAuthGrant, InstallOptions, Integration};
use crate::workspace::git;

/// Production wiring: local filesystem and git, the authentication service,
/// Claude and GitHub.
pub struct LiveCollaborators {
    config: AppConfig,
    api: ApiClient,
    sessions: SessionStore,
    agent: InstallAgent,
    platform: Option<Arc<dyn Platform>>,
}

impl LiveCollaborators {
    pub fn new(config: AppConfig) -> Result<Self> {
        let api = ApiClient::new(&config.api.base_url)?;
        let sessions = SessionStore::new(config.session_path()?);
        let agent = InstallAgent::new(&config);
        let platform = match config.github_token() {
            Some(token) => Some(Arc::new(GitHubPlatform::new(token)?) as Arc<dyn Platform>),
            None => None,
        };
        Ok(Self {
            config,
            api,
            sessions,
            agent,
            platform,
        })
    }

    pub fn with_platform(mut self, platform: Arc<dyn Platform>) -> Self {
        self.platform = Some(platform);
        self
    }

    async fn session(&self) -> Result<Option<Session>> {
        self.sessions.load().await
    }

    async fn require_session(&self) -> Result<Session> {
        self.session()
            .await?
            .ok_or_else(|| AppError::Auth("No active session; run `authwright login`".to_string()))
    }

    async fn github_repo(&self, dir: &Path) -> Result<Option<RepoRef>> {
        let url = git::origin_url(dir).await?;
        Ok(url
            .as_deref()
            .and_then(git::parse_github_remote)
            .map(|(owner, name)| RepoRef { owner, name }))
    }
}

#[async_trait]
impl Collaborators for LiveCollaborators {
    async fn check_authentication(&self, _options: InstallOptions) -> Result<bool> {
        let Some(session) = self.session().await? else {
            return Ok(false);
        };
        self.api.verify_session(&session.access_token).await
    }

    async fn detect_integration(&self, options: InstallOptions) -> Result<Option<Integration>> {
        if let Some(integration) = options.integration {
            tracing::debug!(integration = %integration, "Using preselected integration");
            return Ok(Some(integration));
        }
        detect::detect(&options.install_dir).await
    }

    async fn check_git_status(&self, install_dir: PathBuf) -> Result<GitStatus> {
        git::status(&install_dir).await
    }

    async fn check_branch(&self, install_dir: PathBuf) -> Result<BranchStatus> {
        git::branch_status(&install_dir, self.config.git.protected_branches.clone()).await
    }

    async fn create_branch(
        &self,
        install_dir: PathBuf,
        name: String,
        fallback_name: String,
    ) -> Result<String> {
        git::create_branch(&install_dir, &name, &fallback_name).await
    }

    async fn detect_env_files(&self, install_dir: PathBuf) -> Result<EnvFileProbe> {
        Ok(env_files::probe(
            &install_dir,
            &self.config.credentials.env_files,
        ))
    }

    async fn scan_env_files(&self, install_dir: PathBuf) -> Result<EnvScan> {
        env_files::scan(&install_dir, &self.config.credentials).await
    }

    async fn check_stored_auth(&self) -> Result<bool> {
        Ok(self.session().await?.is_some())
    }

    async fn run_device_auth(&self, events: EventBus) -> Result<DeviceAuthGrant> {
        let timeout = Duration::from_secs(self.config.api.device_timeout_secs);
        let (grant, session) = device::run(&self.api, &self.config.api.client_id, timeout, |grant| {
            events.emit(WizardEvent::DeviceStarted {
                verification_uri: grant.verification_uri.clone(),
                verification_uri_complete: grant.verification_uri_complete.clone(),
                user_code: grant.user_code.clone(),
            });
        })
        .await?;
        self.sessions.save(&session).await?;
        Ok(grant)
    }

    async fn fetch_remote_credentials(&self) -> Result<Credentials> {
        let session = self.require_session().await?;
        self.api.fetch_credentials(&session.access_token).await
    }

    async fn configure_environment(&self, request: ConfigureRequest) -> Result<()> {
        let session = match self.session().await {
            Ok(session) => session,
            Err(e) => {
                tracing::warn!(error = %e, "Could not read session, configuring locally only");
                None
            }
        };
        let remote = session
            .as_ref()
            .map(|s| (&self.api, s.access_token.as_str()));
        configure::configure(&request, remote).await
    }

    async fn run_agent(&self, request: AgentRequest) -> Result<AgentResult> {
        self.agent.install(&request).await
    }

    async fn detect_changes(&self, install_dir: PathBuf) -> Result<ChangeSet> {
        let files = git::changed_files(&install_dir).await?;
        Ok(ChangeSet {
            has_changes: !files.is_empty(),
            files,
        })
    }

    async fn generate_commit_message(&self, summary: ChangeSummary) -> Result<String> {
        self.agent.commit_message(&summary).await
    }

    async fn commit_changes(&self, install_dir: PathBuf, message: String) -> Result<()> {
        git::commit_all(&install_dir, &message).await
    }

    async fn check_pr_tooling(&self, install_dir: PathBuf) -> Result<bool> {
        if self.platform.is_none() {
            tracing::debug!("No GitHub token configured");
            return Ok(false);
        }
        Ok(self.github_repo(&install_dir).await?.is_some())
    }

    async fn generate_pr_description(&self, summary: ChangeSummary) -> Result<String> {
        self.agent.pr_description(&summary).await
    }

    async fn push_branch(&self, install_dir: PathBuf) -> Result<String> {
        let token = self.config.github_token().map(str::to_string);
        git::push_current_branch(&install_dir, token).await
    }

    async fn create_pr(&self, request: PullRequestRequest) -> Result<String> {
        let platform = self
            .platform
            .as_ref()
            .ok_or_else(|| AppError::GitHubApi("No GitHub token configured".to_string()))?;
        let repo = self
            .github_repo(&request.install_dir)
            .await?
            .ok_or_else(|| AppError::GitHubApi("origin is not a GitHub remote".to_string()))?;
        let head = request
            .branch
            .ok_or_else(|| AppError::Git("No branch to open a pull request from".to_string()))?;

        let base = platform.default_branch(&repo).await?;
        if base == head {
            return Err(AppError::GitHubApi(format!(
                "Changes are on the default branch `{base}`; nothing to compare"
            )));
        }

        let pr = platform
            .create_pull_request(
                &repo,
                &CreatePullRequest {
                    title: request.title,
                    body: request.body,
                    head_branch: head,
                    base_branch: base,
                },
            )
            .await?;
        Ok(pr.url)
    }
}
