//! Repository bookkeeping after a successful agent run: commit, push and
//! open a pull request. Every branch converges on `done`, which completes
//! the run.

use crate::collaborators::types::{ChangeSummary, PullRequestRequest};
use crate::events::WizardEvent;
use crate::workflow::context::{Integration, WorkflowContext};
use crate::workflow::machine::{Completion, Machine};
use crate::workflow::state::{PostInstallStep, State};
use crate::workflow::MachineEvent;

impl Machine {
    pub(super) fn start_post_install(&mut self) {
        if self.ctx.options.no_commit {
            tracing::info!("Skipping post-install steps (no-commit)");
            self.transition(State::Complete);
            return;
        }
        self.enter_post_install_step(PostInstallStep::DetectingChanges);
    }

    fn post_install_step(&self) -> Option<PostInstallStep> {
        match &self.state {
            State::PostInstall(step) => Some(*step),
            _ => None,
        }
    }

    fn advance_post_install(&mut self, step: PostInstallStep) {
        self.state = State::PostInstall(step);
        self.enter_post_install_step(step);
    }

    fn enter_post_install_step(&mut self, step: PostInstallStep) {
        self.enter_substate(format!("postInstall.{}", step.name()));
        let dir = self.ctx.options.install_dir.clone();

        match step {
            PostInstallStep::DetectingChanges => {
                self.invoke(
                    |c| async move { c.detect_changes(dir).await },
                    Completion::Changes,
                );
            }
            PostInstallStep::PromptingCommit => self.emit(WizardEvent::CommitPrompt),
            PostInstallStep::GeneratingCommitMessage => {
                self.emit(WizardEvent::CommitGenerating);
                let summary = self.change_summary();
                self.invoke(
                    |c| async move { c.generate_commit_message(summary).await },
                    Completion::CommitMessage,
                );
            }
            PostInstallStep::Committing => {
                let message = self
                    .ctx
                    .commit_message
                    .clone()
                    .unwrap_or_else(|| fallback_commit_message(self.ctx.integration));
                self.emit(WizardEvent::CommitCommitting {
                    message: message.clone(),
                });
                self.invoke(
                    |c| async move { c.commit_changes(dir, message).await },
                    Completion::Committed,
                );
            }
            PostInstallStep::CheckingForPrTooling => {
                self.invoke(
                    |c| async move { c.check_pr_tooling(dir).await },
                    Completion::PrTooling,
                );
            }
            PostInstallStep::PromptingPr => self.emit(WizardEvent::PrPrompt),
            PostInstallStep::GeneratingPrDescription => {
                self.emit(WizardEvent::PrGenerating);
                let summary = self.change_summary();
                self.invoke(
                    |c| async move { c.generate_pr_description(summary).await },
                    Completion::PrDescription,
                );
            }
            PostInstallStep::Pushing => {
                self.emit(WizardEvent::PrPushing);
                self.invoke(
                    |c| async move { c.push_branch(dir).await },
                    Completion::Pushed,
                );
            }
            PostInstallStep::CreatingPr => {
                self.emit(WizardEvent::PrCreating);
                let request = PullRequestRequest {
                    install_dir: dir,
                    branch: self.ctx.current_branch.clone(),
                    title: pr_title(&self.ctx),
                    body: self
                        .ctx
                        .pr_description
                        .clone()
                        .unwrap_or_else(|| fallback_pr_description(&self.ctx)),
                };
                self.invoke(
                    |c| async move { c.create_pr(request).await },
                    Completion::PrCreated,
                );
            }
            PostInstallStep::Done => self.transition(State::Complete),
        }
    }

    fn change_summary(&self) -> ChangeSummary {
        ChangeSummary {
            install_dir: self.ctx.options.install_dir.clone(),
            integration: self.ctx.integration,
            files: self.ctx.changed_files.clone(),
            preexisting_files: self.ctx.git_dirty_files.clone(),
            agent_summary: self.ctx.agent_summary.clone(),
            commit_message: self.ctx.commit_message.clone(),
        }
    }

    fn emit_manual_instructions(&self) {
        self.emit(WizardEvent::ManualInstructions {
            instructions: manual_instructions(self.ctx.current_branch.as_deref()),
        });
    }

    pub(super) fn on_post_install_event(&mut self, event: &MachineEvent) -> bool {
        let Some(step) = self.post_install_step() else {
            return false;
        };

        match (step, event) {
            (PostInstallStep::PromptingCommit, MachineEvent::CommitApproved) => {
                self.advance_post_install(PostInstallStep::GeneratingCommitMessage);
            }
            (PostInstallStep::PromptingCommit, MachineEvent::CommitDeclined) => {
                self.advance_post_install(PostInstallStep::Done);
            }
            (PostInstallStep::PromptingPr, MachineEvent::PrApproved) => {
                self.advance_post_install(PostInstallStep::GeneratingPrDescription);
            }
            (PostInstallStep::PromptingPr, MachineEvent::PrDeclined) => {
                self.advance_post_install(PostInstallStep::Done);
            }
            _ => return false,
        }
        true
    }

    pub(super) fn on_post_install_completion(&mut self, completion: Completion) -> Option<Completion> {
        let Some(step) = self.post_install_step() else {
            return Some(completion);
        };

        match (step, completion) {
            (PostInstallStep::DetectingChanges, Completion::Changes(result)) => match result {
                Ok(changes) if changes.has_changes => {
                    self.ctx.changed_files = changes.files.clone();
                    self.emit(WizardEvent::PostInstallChanges {
                        files: changes.files,
                    });
                    self.advance_post_install(PostInstallStep::PromptingCommit);
                }
                Ok(_) => {
                    self.emit(WizardEvent::PostInstallNoChanges);
                    self.advance_post_install(PostInstallStep::Done);
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Could not detect changes");
                    self.emit(WizardEvent::ChangesFailed {
                        error: e.to_string(),
                    });
                    self.emit(WizardEvent::ManualInstructions {
                        instructions: "Review the changes with `git status` and commit them when ready."
                            .to_string(),
                    });
                    self.advance_post_install(PostInstallStep::Done);
                }
            },
            (PostInstallStep::GeneratingCommitMessage, Completion::CommitMessage(result)) => {
                let message = match result {
                    Ok(message) if !message.trim().is_empty() => message.trim().to_string(),
                    other => {
                        let error = other
                            .err()
                            .map_or_else(|| "empty commit message".to_string(), |e| e.to_string());
                        tracing::warn!(error = %error, "Commit message generation failed, using template");
                        self.emit(WizardEvent::CommitMessageFallback { error });
                        fallback_commit_message(self.ctx.integration)
                    }
                };
                self.ctx.commit_message = Some(message);
                self.advance_post_install(PostInstallStep::Committing);
            }
            (PostInstallStep::Committing, Completion::Committed(result)) => match result {
                Ok(()) => {
                    let message = self.ctx.commit_message.clone().unwrap_or_default();
                    self.emit(WizardEvent::CommitSuccess { message });
                    self.advance_post_install(PostInstallStep::CheckingForPrTooling);
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Commit failed");
                    self.emit(WizardEvent::CommitFailed {
                        error: e.to_string(),
                    });
                    self.advance_post_install(PostInstallStep::Done);
                }
            },
            (PostInstallStep::CheckingForPrTooling, Completion::PrTooling(result)) => {
                match result {
                    Ok(true) => self.advance_post_install(PostInstallStep::PromptingPr),
                    Ok(false) => {
                        tracing::info!("No pull request tooling available");
                        self.emit_manual_instructions();
                        self.advance_post_install(PostInstallStep::Done);
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Pull request tooling check failed");
                        self.emit_manual_instructions();
                        self.advance_post_install(PostInstallStep::Done);
                    }
                }
            }
            (PostInstallStep::GeneratingPrDescription, Completion::PrDescription(result)) => {
                let description = match result {
                    Ok(body) if !body.trim().is_empty() => body,
                    other => {
                        let error = other
                            .err()
                            .map_or_else(|| "empty description".to_string(), |e| e.to_string());
                        tracing::warn!(error = %error, "PR description generation failed, using template");
                        self.emit(WizardEvent::PrDescriptionFallback { error });
                        fallback_pr_description(&self.ctx)
                    }
                };
                self.ctx.pr_description = Some(description);
                self.advance_post_install(PostInstallStep::Pushing);
            }
            (PostInstallStep::Pushing, Completion::Pushed(result)) => match result {
                Ok(branch) => {
                    self.ctx.current_branch = Some(branch);
                    self.advance_post_install(PostInstallStep::CreatingPr);
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Push failed");
                    self.emit(WizardEvent::PushFailed {
                        error: e.to_string(),
                    });
                    self.emit_manual_instructions();
                    self.advance_post_install(PostInstallStep::Done);
                }
            },
            (PostInstallStep::CreatingPr, Completion::PrCreated(result)) => {
                match result {
                    Ok(url) => {
                        tracing::info!(url = %url, "Pull request created");
                        self.ctx.pr_url = Some(url.clone());
                        self.emit(WizardEvent::PrSuccess { url });
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Pull request creation failed");
                        self.emit(WizardEvent::PrFailed {
                            error: e.to_string(),
                        });
                    }
                }
                self.advance_post_install(PostInstallStep::Done);
            }
            (_, other) => return Some(other),
        }
        None
    }
}

pub(crate) fn fallback_commit_message(integration: Option<Integration>) -> String {
    match integration {
        Some(integration) => format!("feat: add {} authentication", integration.display_name()),
        None => "feat: add authentication".to_string(),
    }
}

fn pr_title(ctx: &WorkflowContext) -> String {
    ctx.commit_message
        .as_deref()
        .and_then(|m| m.lines().next())
        .map(str::to_string)
        .unwrap_or_else(|| fallback_commit_message(ctx.integration))
}

pub(crate) fn fallback_pr_description(ctx: &WorkflowContext) -> String {
    let target = ctx
        .integration
        .map(Integration::display_name)
        .unwrap_or("this project");
    let files = ctx
        .changed_files
        .iter()
        .map(|f| format!("- `{f}`"))
        .collect::<Vec<_>>()
        .join("\n");
    let summary = ctx.agent_summary.as_deref().unwrap_or("");

    format!(
        "## Summary\n\nAdds authentication to {target}.\n\n{summary}\n\n## Changed files\n\n{files}\n\n---\n*Set up with authwright*"
    )
}

fn manual_instructions(branch: Option<&str>) -> String {
    let branch = branch.unwrap_or("HEAD");
    format!(
        "Push your changes and open a pull request:\n\n  git push -u origin {branch}\n\nThen open a pull request for `{branch}` on your Git host."
    )
}
