use std::io::Write;

use crate::error::Result;
use crate::events::WizardEvent;
use crate::render::EventSink;
use crate::workflow::context::CredentialSource;

/// Human-readable progress lines.
pub struct Terminal<W> {
    out: W,
}

impl<W: Write + Send> Terminal<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }
}

impl<W: Write + Send> EventSink for Terminal<W> {
    fn render(&mut self, event: &WizardEvent) -> Result<()> {
        if let Some(line) = describe(event) {
            writeln!(self.out, "{line}")?;
            self.out.flush()?;
        }
        Ok(())
    }
}

fn source_label(source: CredentialSource) -> &'static str {
    match source {
        CredentialSource::Cli => "command-line flags",
        CredentialSource::Env => "project env file",
        CredentialSource::Stored => "stored session",
        CredentialSource::Device => "browser sign-in",
        CredentialSource::Manual => "manual entry",
    }
}

fn bullets(files: &[String]) -> String {
    files
        .iter()
        .map(|f| format!("\n    {f}"))
        .collect::<String>()
}

/// The line shown for an event, or `None` for bookkeeping events.
pub fn describe(event: &WizardEvent) -> Option<String> {
    let line = match event {
        WizardEvent::StateEnter { .. } | WizardEvent::StateExit { .. } => return None,

        WizardEvent::AuthChecking => "Checking authentication...".to_string(),
        WizardEvent::AuthRequired => {
            "Not logged in. Run `authwright login` first, or pass --skip-auth.".to_string()
        }
        WizardEvent::AuthSuccess => "✓ Authenticated".to_string(),
        WizardEvent::AuthFailure { message } => format!("✗ Authentication failed: {message}"),

        WizardEvent::DetectionStart => "Detecting project type...".to_string(),
        WizardEvent::DetectionComplete { integration } => format!("✓ Detected {integration}"),
        WizardEvent::DetectionNone => "✗ Could not detect the project type".to_string(),
        WizardEvent::DetectionError { message } => format!("! Detection failed: {message}"),

        WizardEvent::GitChecking => "Checking git status...".to_string(),
        WizardEvent::GitClean => "✓ Working tree is clean".to_string(),
        WizardEvent::GitDirty { files } => {
            format!("! Uncommitted changes:{}", bullets(files))
        }
        WizardEvent::GitDirtyConfirmed => "Continuing with uncommitted changes".to_string(),
        WizardEvent::GitDirtyCancelled => "Stopping so you can commit first".to_string(),
        WizardEvent::GitError { message } => {
            format!("! Could not read git status ({message}); continuing")
        }

        WizardEvent::BranchChecking => "Checking current branch...".to_string(),
        WizardEvent::BranchProtected { branch } => {
            format!("! You are on protected branch `{branch}`")
        }
        WizardEvent::BranchCreated { branch } => format!("✓ Switched to new branch `{branch}`"),
        WizardEvent::BranchCreateFailed { error } => {
            format!("! Could not create a branch ({error}); staying on the current one")
        }
        WizardEvent::BranchError { message } => {
            format!("! Could not check the current branch ({message}); continuing")
        }

        WizardEvent::CredentialsGathering { requires_api_key } => {
            if *requires_api_key {
                "Enter your client id and API key from the dashboard.".to_string()
            } else {
                "Enter your client id from the dashboard.".to_string()
            }
        }
        WizardEvent::CredentialsFound { source } => {
            format!("✓ Credentials from {}", source_label(*source))
        }
        WizardEvent::EnvDetected { files } => {
            format!("Found env files:{}", bullets(files))
        }
        WizardEvent::EnvPrompt { .. } => return None,
        WizardEvent::EnvScanning => "Scanning env files for credentials...".to_string(),
        WizardEvent::EnvFound { source_path } => format!("✓ Credentials found in {source_path}"),
        WizardEvent::EnvNotFound => "No usable credentials in env files".to_string(),
        WizardEvent::EnvError { message } => format!("! Could not read env files: {message}"),
        WizardEvent::StoredAuthError { message } => {
            format!("! Could not read the stored session: {message}")
        }

        WizardEvent::DeviceStarted {
            verification_uri,
            verification_uri_complete,
            user_code,
        } => format!(
            "Open {verification_uri_complete}\n  or go to {verification_uri} and enter code {user_code}\nWaiting for approval..."
        ),
        WizardEvent::DeviceSuccess => "✓ Signed in".to_string(),
        WizardEvent::DeviceError { message } => format!("✗ Sign-in failed: {message}"),
        WizardEvent::DeviceTimeout => "✗ Sign-in timed out".to_string(),

        WizardEvent::StagingFetching => "Fetching credentials...".to_string(),
        WizardEvent::StagingSuccess => "✓ Credentials fetched".to_string(),
        WizardEvent::StagingError { message } => {
            format!("✗ Could not fetch credentials: {message}")
        }

        WizardEvent::ConfigStart => "Configuring environment...".to_string(),
        WizardEvent::ConfigComplete => "✓ Environment configured".to_string(),

        WizardEvent::AgentStart => "Installing authentication (this can take a few minutes)...".to_string(),
        WizardEvent::AgentSuccess { summary } => format!("✓ Installation finished\n\n{summary}\n"),
        WizardEvent::AgentFailure { message, .. } => format!("✗ Installation failed: {message}"),

        WizardEvent::PostInstallChanges { files } => {
            format!("Changed files:{}", bullets(files))
        }
        WizardEvent::PostInstallNoChanges => "No files were changed".to_string(),
        WizardEvent::ChangesFailed { error } => format!("! Could not list changed files: {error}"),
        WizardEvent::CommitMessageFallback { error } => {
            format!("! Using a default commit message ({error})")
        }
        WizardEvent::PrDescriptionFallback { error } => {
            format!("! Using a default pull request description ({error})")
        }
        WizardEvent::CommitPrompt | WizardEvent::PrPrompt => return None,
        WizardEvent::CommitGenerating => "Writing commit message...".to_string(),
        WizardEvent::CommitCommitting { message } => format!("Committing:\n\n{message}\n"),
        WizardEvent::CommitSuccess { .. } => "✓ Changes committed".to_string(),
        WizardEvent::CommitFailed { error } => format!("✗ Commit failed: {error}"),
        WizardEvent::PrGenerating => "Writing pull request description...".to_string(),
        WizardEvent::PrPushing => "Pushing branch...".to_string(),
        WizardEvent::PushFailed { error } => format!("✗ Push failed: {error}"),
        WizardEvent::PrCreating => "Opening pull request...".to_string(),
        WizardEvent::PrSuccess { url } => format!("✓ Pull request opened: {url}"),
        WizardEvent::PrFailed { error } => format!("✗ Pull request failed: {error}"),
        WizardEvent::ManualInstructions { instructions } => instructions.clone(),

        WizardEvent::Complete { success: true, .. } => "Done.".to_string(),
        WizardEvent::Complete { success: false, .. } => "Finished with errors.".to_string(),
        WizardEvent::Cancelled => "Cancelled.".to_string(),
        WizardEvent::Error { message, .. } => format!("Error: {message}"),
    };
    Some(line)
}
