pub mod github;
pub mod types;

use async_trait::async_trait;

use crate::error::Result;
use types::*;

/// Code host the pull request is opened on.
#[async_trait]
pub trait Platform: Send + Sync {
    /// Branch pull requests target by default.
    async fn default_branch(&self, repo: &RepoRef) -> Result<String>;

    /// Create a pull request.
    async fn create_pull_request(
        &self,
        repo: &RepoRef,
        pr: &CreatePullRequest,
    ) -> Result<PullRequest>;
}
