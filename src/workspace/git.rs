use std::cell::RefCell;
use std::path::Path;
use std::rc::Rc;

use git2::{
    BranchType, Cred, CredentialType, ErrorCode, IndexAddOption, PushOptions, RemoteCallbacks,
    Repository, Signature, StatusOptions,
};

use crate::collaborators::types::{BranchStatus, GitStatus};
use crate::error::{AppError, Result};

const FALLBACK_AUTHOR: (&str, &str) = ("authwright", "authwright@users.noreply.github.com");
const MAX_CREDENTIAL_ATTEMPTS: usize = 3;

/// Validate a branch name to prevent argument injection.
/// Rejects names starting with `-` as defence in depth.
fn validate_branch_name(name: &str) -> Result<()> {
    if name.starts_with('-') {
        return Err(AppError::Git(format!(
            "Invalid branch name (starts with '-'): {name}"
        )));
    }
    Ok(())
}

/// Run a blocking git2 closure against the repository containing `dir`.
async fn with_repo<T, F>(dir: &Path, op: &'static str, f: F) -> Result<T>
where
    F: FnOnce(Repository) -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    let dir = dir.to_path_buf();
    tokio::task::spawn_blocking(move || {
        let repo = Repository::discover(&dir)?;
        f(repo)
    })
    .await
    .map_err(|e| AppError::Git(format!("{op} task panicked: {e}")))?
}

fn changed_paths(repo: &Repository) -> Result<Vec<String>> {
    let mut opts = StatusOptions::new();
    opts.include_untracked(true)
        .recurse_untracked_dirs(true)
        .include_ignored(false);
    let statuses = repo.statuses(Some(&mut opts))?;
    Ok(statuses
        .iter()
        .filter_map(|entry| entry.path().map(str::to_string))
        .collect())
}

fn head_branch(repo: &Repository) -> Result<Option<String>> {
    match repo.head() {
        Ok(head) if head.is_branch() => Ok(head.shorthand().map(str::to_string)),
        Ok(_) => Ok(None),
        Err(e) if e.code() == ErrorCode::UnbornBranch => {
            // No commits yet; HEAD still names the branch.
            let target = repo
                .find_reference("HEAD")?
                .symbolic_target()
                .and_then(|t| t.strip_prefix("refs/heads/"))
                .map(str::to_string);
            Ok(target)
        }
        Err(e) => Err(e.into()),
    }
}

/// Working-tree status, including untracked files.
pub async fn status(dir: &Path) -> Result<GitStatus> {
    with_repo(dir, "Status", |repo| {
        let files = changed_paths(&repo)?;
        Ok(GitStatus {
            is_clean: files.is_empty(),
            files,
        })
    })
    .await
}

/// Files changed relative to HEAD, for the post-install summary.
pub async fn changed_files(dir: &Path) -> Result<Vec<String>> {
    with_repo(dir, "Changed-files", |repo| changed_paths(&repo)).await
}

/// Current branch and whether it is one of `protected`.
pub async fn branch_status(dir: &Path, protected: Vec<String>) -> Result<BranchStatus> {
    with_repo(dir, "Branch-status", move |repo| {
        let branch = head_branch(&repo)?;
        let is_protected = branch
            .as_deref()
            .is_some_and(|b| protected.iter().any(|p| p == b));
        Ok(BranchStatus {
            branch,
            is_protected,
        })
    })
    .await
}

/// Create and check out a branch at HEAD. Uses `fallback` when `name` is
/// already taken. Returns the branch actually created.
pub async fn create_branch(dir: &Path, name: &str, fallback: &str) -> Result<String> {
    validate_branch_name(name)?;
    validate_branch_name(fallback)?;

    let name = name.to_string();
    let fallback = fallback.to_string();

    with_repo(dir, "Create-branch", move |repo| {
        let chosen = if repo.find_branch(&name, BranchType::Local).is_ok() {
            tracing::info!(branch = %name, fallback = %fallback, "Branch exists, using fallback name");
            fallback
        } else {
            name
        };

        let commit = repo.head()?.peel_to_commit()?;
        repo.branch(&chosen, &commit, false)?;
        // Same commit, so uncommitted changes carry over untouched.
        repo.set_head(&format!("refs/heads/{chosen}"))?;
        Ok(chosen)
    })
    .await
}

/// Pathspec covering `dir` relative to the repository work tree.
fn scope_pathspec(workdir: &Path, dir: &Path) -> Result<String> {
    let workdir = workdir.canonicalize()?;
    let dir = dir.canonicalize()?;
    let relative = dir.strip_prefix(&workdir).map_err(|_| {
        AppError::Git(format!(
            "{} is outside the repository at {}",
            dir.display(),
            workdir.display()
        ))
    })?;
    let relative = relative.to_string_lossy().replace('\\', "/");
    if relative.is_empty() {
        Ok("*".to_string())
    } else {
        Ok(format!("{relative}/*"))
    }
}

/// Stage everything under `dir` (including deletions) and commit. Changes
/// elsewhere in the repository stay unstaged.
pub async fn commit_all(dir: &Path, message: &str) -> Result<()> {
    let message = message.to_string();
    let scope_dir = dir.to_path_buf();

    with_repo(dir, "Commit", move |repo| {
        let workdir = repo
            .workdir()
            .ok_or_else(|| AppError::Git("Bare repository has no work tree".to_string()))?;
        let pathspec = scope_pathspec(workdir, &scope_dir)?;

        let mut index = repo.index()?;
        index.add_all([pathspec.as_str()].iter(), IndexAddOption::DEFAULT, None)?;
        index.update_all([pathspec.as_str()].iter(), None)?;
        index.write()?;

        let sig = match repo.signature() {
            Ok(sig) => sig,
            Err(_) => Signature::now(FALLBACK_AUTHOR.0, FALLBACK_AUTHOR.1)?,
        };
        let tree = repo.find_tree(index.write_tree()?)?;

        let parent = match repo.head() {
            Ok(head) => Some(head.peel_to_commit()?),
            Err(e) if e.code() == ErrorCode::UnbornBranch => None,
            Err(e) => return Err(e.into()),
        };
        let parents: Vec<&git2::Commit> = parent.iter().collect();

        repo.commit(Some("HEAD"), &sig, &sig, &message, &tree, &parents)?;
        Ok(())
    })
    .await
}

/// Map the server's answer for one pushed reference. `None` means accepted.
fn ref_update_result(refname: &str, status: Option<&str>) -> Result<()> {
    match status {
        None => Ok(()),
        Some(reason) => Err(AppError::Git(format!(
            "Remote rejected {refname}: {reason}"
        ))),
    }
}

/// Build `PushOptions` that authenticate with a token over HTTPS, or the
/// user's ssh-agent and credential helpers otherwise. A reference the
/// remote refuses is recorded in `rejection`.
fn make_push_options(
    repo_config: git2::Config,
    token: Option<String>,
    rejection: Rc<RefCell<Option<AppError>>>,
) -> PushOptions<'static> {
    let mut attempts = 0;
    let mut callbacks = RemoteCallbacks::new();
    callbacks.credentials(move |url, username_from_url, allowed_types| {
        attempts += 1;
        if attempts > MAX_CREDENTIAL_ATTEMPTS {
            return Err(git2::Error::from_str("Authentication failed"));
        }
        if allowed_types.contains(CredentialType::SSH_KEY) {
            return Cred::ssh_key_from_agent(username_from_url.unwrap_or("git"));
        }
        if allowed_types.contains(CredentialType::USER_PASS_PLAINTEXT) {
            if let Some(token) = token.as_deref() {
                return Cred::userpass_plaintext("x-access-token", token);
            }
            return Cred::credential_helper(&repo_config, url, username_from_url);
        }
        Cred::default()
    });
    callbacks.push_update_reference(move |refname, status| {
        if let Err(e) = ref_update_result(refname, status) {
            tracing::warn!(refname, status, "Push rejected by remote");
            rejection.borrow_mut().get_or_insert(e);
        }
        Ok(())
    });
    let mut opts = PushOptions::new();
    opts.remote_callbacks(callbacks);
    opts
}

/// Push the current branch to origin and set it as upstream.
pub async fn push_current_branch(dir: &Path, token: Option<String>) -> Result<String> {
    with_repo(dir, "Push", move |repo| {
        let branch = head_branch(&repo)?
            .ok_or_else(|| AppError::Git("HEAD is detached; nothing to push".to_string()))?;
        validate_branch_name(&branch)?;

        let mut remote = repo.find_remote("origin")?;
        let refspec = format!("refs/heads/{branch}:refs/heads/{branch}");
        let rejection = Rc::new(RefCell::new(None));
        let mut push_opts = make_push_options(repo.config()?, token, rejection.clone());
        remote.push(&[&refspec], Some(&mut push_opts))?;
        drop(push_opts);
        if let Some(e) = rejection.borrow_mut().take() {
            return Err(e);
        }

        if let Ok(mut local) = repo.find_branch(&branch, BranchType::Local) {
            if let Err(e) = local.set_upstream(Some(&format!("origin/{branch}"))) {
                tracing::debug!(error = %e, "Could not set upstream");
            }
        }
        Ok(branch)
    })
    .await
}

pub async fn origin_url(dir: &Path) -> Result<Option<String>> {
    with_repo(dir, "Origin-url", |repo| {
        let url = match repo.find_remote("origin") {
            Ok(remote) => remote.url().map(str::to_string),
            Err(e) if e.code() == ErrorCode::NotFound => None,
            Err(e) => return Err(e.into()),
        };
        Ok(url)
    })
    .await
}

/// Split a GitHub remote URL into `(owner, repo)`.
pub fn parse_github_remote(url: &str) -> Option<(String, String)> {
    let path = url
        .strip_prefix("https://github.com/")
        .or_else(|| url.strip_prefix("http://github.com/"))
        .or_else(|| url.strip_prefix("git@github.com:"))
        .or_else(|| url.strip_prefix("ssh://git@github.com/"))?;
    let path = path.trim_end_matches('/');
    let path = path.strip_suffix(".git").unwrap_or(path);
    let (owner, repo) = path.split_once('/')?;
    if owner.is_empty() || repo.is_empty() || repo.contains('/') {
        return None;
    }
    Some((owner.to_string(), repo.to_string()))
}
