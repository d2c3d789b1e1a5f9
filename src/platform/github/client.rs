use async_trait::async_trait;
use octocrab::Octocrab;

use crate::error::{AppError, Result};
use crate::platform::types::*;
use crate::platform::Platform;

use super::mapper;

const FALLBACK_DEFAULT_BRANCH: &str = "main";

pub struct GitHubPlatform {
    client: Octocrab,
}

impl GitHubPlatform {
    /// Authenticate with a personal access token.
    pub fn new(token: &str) -> Result<Self> {
        let client = Octocrab::builder()
            .personal_token(token.to_string())
            .build()
            .map_err(|e| AppError::GitHubApi(format!("Failed to build octocrab client: {e}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Platform for GitHubPlatform {
    async fn default_branch(&self, repo: &RepoRef) -> Result<String> {
        let info = self.client.repos(&repo.owner, &repo.name).get().await?;
        Ok(info
            .default_branch
            .unwrap_or_else(|| FALLBACK_DEFAULT_BRANCH.to_string()))
    }

    async fn create_pull_request(
        &self,
        repo: &RepoRef,
        pr: &CreatePullRequest,
    ) -> Result<PullRequest> {
        let created = self
            .client
            .pulls(&repo.owner, &repo.name)
            .create(&pr.title, &pr.head_branch, &pr.base_branch)
            .body(&pr.body)
            .send()
            .await?;

        tracing::info!(
            repo = %repo.full_name(),
            number = created.number,
            "Opened pull request"
        );
        Ok(mapper::map_pull_request(repo, created))
    }
}
