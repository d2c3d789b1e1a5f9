//! The `preparing` parallel region: integration detection, working-tree
//! check and branch check run concurrently and join before credentials.

use crate::collaborators::types::GitStatus;
use crate::events::WizardEvent;
use crate::workflow::context::WorkflowError;
use crate::workflow::machine::{Completion, Machine};
use crate::workflow::state::{BranchCheckState, DetectionState, GitCheckState, Readiness, State};
use crate::workflow::MachineEvent;

impl Machine {
    pub(super) fn start_readiness(&mut self) {
        self.emit(WizardEvent::DetectionStart);
        let options = self.ctx.options.clone();
        self.invoke(
            |c| async move { c.detect_integration(options).await },
            Completion::Detected,
        );

        self.emit(WizardEvent::GitChecking);
        let dir = self.ctx.options.install_dir.clone();
        self.invoke(
            |c| async move { c.check_git_status(dir).await },
            Completion::GitStatus,
        );

        self.emit(WizardEvent::BranchChecking);
        let dir = self.ctx.options.install_dir.clone();
        self.invoke(
            |c| async move { c.check_branch(dir).await },
            Completion::Branch,
        );
    }

    fn readiness(&self) -> Option<&Readiness> {
        match &self.state {
            State::Preparing(readiness) => Some(readiness),
            _ => None,
        }
    }

    fn set_detection(&mut self, next: DetectionState) {
        if let State::Preparing(readiness) = &mut self.state {
            readiness.detection = next;
        }
        self.enter_substate(format!("preparing.detection.{}", next.name()));
    }

    fn set_git(&mut self, next: GitCheckState) {
        if let State::Preparing(readiness) = &mut self.state {
            readiness.git = next;
        }
        self.enter_substate(format!("preparing.git.{}", next.name()));
    }

    fn set_branch(&mut self, next: BranchCheckState) {
        if let State::Preparing(readiness) = &mut self.state {
            readiness.branch = next;
        }
        self.enter_substate(format!("preparing.branch.{}", next.name()));
    }

    pub(super) fn on_readiness_event(&mut self, event: &MachineEvent) -> bool {
        let Some(readiness) = self.readiness() else {
            return false;
        };
        let (git, branch) = (readiness.git, readiness.branch);

        match (event, git, branch) {
            (MachineEvent::GitConfirmed, GitCheckState::AwaitingConfirmation, _) => {
                self.emit(WizardEvent::GitDirtyConfirmed);
                self.set_git(GitCheckState::Done);
                self.try_join();
            }
            (MachineEvent::GitCancelled, GitCheckState::AwaitingConfirmation, _) => {
                self.emit(WizardEvent::GitDirtyCancelled);
                self.transition(State::Cancelled);
            }
            (MachineEvent::BranchCreate, _, BranchCheckState::AwaitingConfirmation) => {
                self.set_branch(BranchCheckState::Creating);
                let dir = self.ctx.options.install_dir.clone();
                let name = self.branch_name.clone();
                let fallback = format!("{name}-{}", chrono::Utc::now().format("%Y%m%d%H%M%S"));
                self.invoke(
                    |c| async move { c.create_branch(dir, name, fallback).await },
                    Completion::BranchCreated,
                );
            }
            (MachineEvent::BranchContinue, _, BranchCheckState::AwaitingConfirmation) => {
                self.set_branch(BranchCheckState::Done);
                self.try_join();
            }
            (MachineEvent::BranchCancel, _, BranchCheckState::AwaitingConfirmation) => {
                self.transition(State::Cancelled);
            }
            _ => return false,
        }
        true
    }

    pub(super) fn on_readiness_completion(&mut self, completion: Completion) -> Option<Completion> {
        let Some(readiness) = self.readiness().cloned() else {
            return Some(completion);
        };

        match completion {
            Completion::Detected(result) if readiness.detection == DetectionState::Detecting => {
                match result {
                    Ok(Some(integration)) => {
                        tracing::info!(integration = %integration, "Integration detected");
                        self.ctx.integration = Some(integration);
                        self.emit(WizardEvent::DetectionComplete { integration });
                    }
                    Ok(None) => self.emit(WizardEvent::DetectionNone),
                    Err(e) => {
                        tracing::warn!(error = %e, "Integration detection failed");
                        self.emit(WizardEvent::DetectionError {
                            message: e.to_string(),
                        });
                        self.emit(WizardEvent::DetectionNone);
                    }
                }
                self.set_detection(DetectionState::Done);
            }
            Completion::GitStatus(result) if readiness.git == GitCheckState::Checking => {
                let status = match result {
                    Ok(status) => status,
                    Err(e) => {
                        tracing::warn!(error = %e, "Git status check failed, assuming clean");
                        self.emit(WizardEvent::GitError {
                            message: e.to_string(),
                        });
                        GitStatus {
                            is_clean: true,
                            files: Vec::new(),
                        }
                    }
                };
                if status.is_clean {
                    self.ctx.git_is_clean = Some(true);
                    self.emit(WizardEvent::GitClean);
                    self.set_git(GitCheckState::Done);
                } else {
                    self.ctx.git_is_clean = Some(false);
                    self.ctx.git_dirty_files = status.files.clone();
                    self.emit(WizardEvent::GitDirty {
                        files: status.files,
                    });
                    self.set_git(GitCheckState::AwaitingConfirmation);
                }
            }
            Completion::Branch(result) if readiness.branch == BranchCheckState::Checking => {
                match result {
                    Ok(status) => {
                        self.ctx.current_branch = status.branch.clone();
                        self.ctx.is_protected_branch = status.is_protected;
                        match status.branch {
                            Some(branch) if status.is_protected => {
                                self.emit(WizardEvent::BranchProtected { branch });
                                self.set_branch(BranchCheckState::AwaitingConfirmation);
                            }
                            _ => self.set_branch(BranchCheckState::Done),
                        }
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Branch check failed, continuing");
                        self.ctx.is_protected_branch = false;
                        self.emit(WizardEvent::BranchError {
                            message: e.to_string(),
                        });
                        self.set_branch(BranchCheckState::Done);
                    }
                }
            }
            Completion::BranchCreated(result) if readiness.branch == BranchCheckState::Creating => {
                match result {
                    Ok(branch) => {
                        tracing::info!(branch = %branch, "Created working branch");
                        self.ctx.current_branch = Some(branch.clone());
                        self.ctx.is_protected_branch = false;
                        self.emit(WizardEvent::BranchCreated { branch });
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Failed to create branch, continuing");
                        self.emit(WizardEvent::BranchCreateFailed {
                            error: e.to_string(),
                        });
                    }
                }
                self.set_branch(BranchCheckState::Done);
            }
            other => return Some(other),
        }

        self.try_join();
        None
    }

    /// Leave `preparing` once every region is final.
    fn try_join(&mut self) {
        if !self.readiness().is_some_and(Readiness::is_done) {
            return;
        }
        if self.ctx.integration.is_some() {
            self.start_credentials();
        } else {
            self.fail(WorkflowError::new(
                "Could not detect integration. Re-run with --integration to choose one.",
            ));
        }
    }
}
