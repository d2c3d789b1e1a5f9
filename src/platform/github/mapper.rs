use crate::platform::types::{PullRequest, RepoRef};

pub fn map_pull_request(repo: &RepoRef, pr: octocrab::models::pulls::PullRequest) -> PullRequest {
    let url = pr
        .html_url
        .map(|u| u.to_string())
        .unwrap_or_else(|| format!("https://github.com/{}/pull/{}", repo.full_name(), pr.number));
    PullRequest {
        number: pr.number,
        url,
        head_branch: pr.head.ref_field,
        base_branch: pr.base.ref_field,
    }
}
