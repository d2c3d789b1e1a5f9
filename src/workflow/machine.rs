use std::future::Future;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::collaborators::types::*;
use crate::collaborators::Collaborators;
use crate::error::{AppError, Result};
use crate::events::{EventBus, WizardEvent};
use crate::workflow::context::{
    Credentials, DeviceAuthGrant, InstallOptions, Integration, WorkflowContext, WorkflowError,
};
use crate::workflow::state::{CredentialStep, PostInstallStep, Readiness, State};
use crate::workflow::MachineEvent;

const DEFAULT_BRANCH_NAME: &str = "authwright/add-authentication";

/// Terminal outcome of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Complete,
    Cancelled,
    Error,
}

/// What a finished run hands back to its caller.
#[derive(Debug)]
pub struct RunReport {
    pub outcome: Outcome,
    pub context: WorkflowContext,
}

/// Builds and runs the installation workflow.
pub struct Orchestrator {
    collaborators: Arc<dyn Collaborators>,
    bus: EventBus,
    branch_name: String,
}

/// Handle to a spawned run: send it events, then join it.
pub struct WorkflowHandle {
    events: mpsc::UnboundedSender<MachineEvent>,
    task: JoinHandle<RunReport>,
}

impl WorkflowHandle {
    pub fn send(&self, event: MachineEvent) -> bool {
        self.events.send(event).is_ok()
    }

    pub fn sender(&self) -> mpsc::UnboundedSender<MachineEvent> {
        self.events.clone()
    }

    pub async fn join(self) -> Result<RunReport> {
        // Keep the inbox open while waiting; a closed inbox cancels the run.
        let Self { events: _events, task } = self;
        task.await
            .map_err(|e| AppError::Internal(format!("Workflow task panicked: {e}")))
    }
}

impl Orchestrator {
    pub fn new(collaborators: Arc<dyn Collaborators>, bus: EventBus) -> Self {
        Self {
            collaborators,
            bus,
            branch_name: DEFAULT_BRANCH_NAME.to_string(),
        }
    }

    /// Name of the branch offered when the current one is protected.
    pub fn with_branch_name(mut self, name: impl Into<String>) -> Self {
        self.branch_name = name.into();
        self
    }

    /// Spawn the run on the current runtime. It waits for `START`.
    pub fn spawn(self, options: InstallOptions) -> WorkflowHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(self.run(options, rx));
        WorkflowHandle { events: tx, task }
    }

    /// Drive one run to a terminal state.
    ///
    /// External events are polled before collaborator results so a `CANCEL`
    /// is never queued behind work that has already finished.
    pub async fn run(
        self,
        options: InstallOptions,
        mut inbox: mpsc::UnboundedReceiver<MachineEvent>,
    ) -> RunReport {
        let (tx, mut completions) = mpsc::unbounded_channel();
        let mut machine = Machine {
            collaborators: self.collaborators,
            bus: self.bus,
            branch_name: self.branch_name,
            ctx: WorkflowContext::new(options),
            state: State::Idle,
            completions: tx,
        };

        tracing::info!(
            install_dir = %machine.ctx.options.install_dir.display(),
            "Workflow started"
        );
        machine.emit(WizardEvent::StateEnter {
            state: State::Idle.name().to_string(),
        });

        while !machine.state.is_terminal() {
            tokio::select! {
                biased;
                event = inbox.recv() => {
                    machine.dispatch(event.unwrap_or(MachineEvent::Cancel));
                }
                Some(completion) = completions.recv() => {
                    machine.complete(completion);
                }
            }
        }

        let outcome = match machine.state {
            State::Complete => Outcome::Complete,
            State::Cancelled => Outcome::Cancelled,
            _ => Outcome::Error,
        };
        tracing::info!(outcome = ?outcome, "Workflow finished");

        RunReport {
            outcome,
            context: machine.ctx,
        }
    }
}

/// Settled result of a collaborator call, applied on the dispatch loop.
pub(super) enum Completion {
    Authenticated(Result<bool>),
    Detected(Result<Option<Integration>>),
    GitStatus(Result<GitStatus>),
    Branch(Result<BranchStatus>),
    BranchCreated(Result<String>),
    EnvFiles(Result<EnvFileProbe>),
    EnvScanned(Result<EnvScan>),
    StoredAuth(Result<bool>),
    DeviceAuth(Result<DeviceAuthGrant>),
    RemoteCredentials(Result<Credentials>),
    Configured(Result<()>),
    AgentFinished(Result<AgentResult>),
    Changes(Result<ChangeSet>),
    CommitMessage(Result<String>),
    Committed(Result<()>),
    PrTooling(Result<bool>),
    PrDescription(Result<String>),
    Pushed(Result<String>),
    PrCreated(Result<String>),
}

impl Completion {
    pub(super) fn name(&self) -> &'static str {
        match self {
            Completion::Authenticated(_) => "check_authentication",
            Completion::Detected(_) => "detect_integration",
            Completion::GitStatus(_) => "check_git_status",
            Completion::Branch(_) => "check_branch",
            Completion::BranchCreated(_) => "create_branch",
            Completion::EnvFiles(_) => "detect_env_files",
            Completion::EnvScanned(_) => "scan_env_files",
            Completion::StoredAuth(_) => "check_stored_auth",
            Completion::DeviceAuth(_) => "run_device_auth",
            Completion::RemoteCredentials(_) => "fetch_remote_credentials",
            Completion::Configured(_) => "configure_environment",
            Completion::AgentFinished(_) => "run_agent",
            Completion::Changes(_) => "detect_changes",
            Completion::CommitMessage(_) => "generate_commit_message",
            Completion::Committed(_) => "commit_changes",
            Completion::PrTooling(_) => "check_pr_tooling",
            Completion::PrDescription(_) => "generate_pr_description",
            Completion::Pushed(_) => "push_branch",
            Completion::PrCreated(_) => "create_pr",
        }
    }
}

pub(super) struct Machine {
    pub(super) collaborators: Arc<dyn Collaborators>,
    pub(super) bus: EventBus,
    pub(super) branch_name: String,
    pub(super) ctx: WorkflowContext,
    pub(super) state: State,
    completions: mpsc::UnboundedSender<Completion>,
}

impl Machine {
    pub(super) fn emit(&self, event: WizardEvent) {
        self.bus.emit(event);
    }

    /// Start a collaborator call as its own task. The result comes back
    /// through the completion channel; if the machine has moved on by then it
    /// is discarded.
    pub(super) fn invoke<T, F, Fut>(&self, call: F, wrap: fn(Result<T>) -> Completion)
    where
        F: FnOnce(Arc<dyn Collaborators>) -> Fut,
        Fut: Future<Output = Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        let future = call(Arc::clone(&self.collaborators));
        let tx = self.completions.clone();
        tokio::spawn(async move {
            let result = future.await;
            let _ = tx.send(wrap(result));
        });
    }

    /// Leave the current top-level state and run the entry actions of `next`.
    pub(super) fn transition(&mut self, next: State) {
        let from = self.state.name();
        self.emit(WizardEvent::StateExit {
            state: from.to_string(),
        });
        self.state = next;
        tracing::info!(from, to = self.state.name(), "State transition");
        self.emit(WizardEvent::StateEnter {
            state: self.state.name().to_string(),
        });
        self.on_entry();
    }

    /// Announce a nested sub-state, e.g. `preparing.git.awaitingConfirmation`.
    pub(super) fn enter_substate(&self, path: String) {
        tracing::debug!(state = %path, "Entering sub-state");
        self.emit(WizardEvent::StateEnter { state: path });
    }

    pub(super) fn fail(&mut self, error: WorkflowError) {
        self.ctx.fail(error);
        self.transition(State::Error);
    }

    fn on_entry(&mut self) {
        match &self.state {
            State::Idle => {}
            State::Authenticating => {
                self.emit(WizardEvent::AuthChecking);
                let options = self.ctx.options.clone();
                self.invoke(
                    |c| async move { c.check_authentication(options).await },
                    Completion::Authenticated,
                );
            }
            State::Preparing(_) => self.start_readiness(),
            State::GatheringCredentials(step) => {
                let step = *step;
                self.enter_credential_step(step);
            }
            State::Configuring => self.start_configuring(),
            State::RunningAgent => self.start_agent(),
            State::PostInstall(_) => self.start_post_install(),
            State::Complete => {
                self.emit(WizardEvent::Complete {
                    success: true,
                    summary: self.ctx.agent_summary.clone(),
                });
            }
            State::Cancelled => self.emit(WizardEvent::Cancelled),
            State::Error => {
                let error = self
                    .ctx
                    .error
                    .clone()
                    .unwrap_or_else(|| WorkflowError::new("Unknown error"));
                if error.reported {
                    // The phase already described the failure in full.
                    self.emit(WizardEvent::Complete {
                        success: false,
                        summary: None,
                    });
                } else {
                    self.emit(WizardEvent::Error {
                        message: error.message,
                        stack: error.stack,
                    });
                }
            }
        }
    }

    /// Route an external event. `CANCEL` is checked before any state sees it.
    pub(super) fn dispatch(&mut self, event: MachineEvent) {
        if event == MachineEvent::Cancel {
            tracing::info!(state = self.state.name(), "Cancel requested");
            self.transition(State::Cancelled);
            return;
        }

        let handled = match &self.state {
            State::Idle if event == MachineEvent::Start => {
                let next = if self.ctx.options.skip_auth {
                    State::Preparing(Readiness::new())
                } else {
                    State::Authenticating
                };
                self.transition(next);
                true
            }
            State::Preparing(_) => self.on_readiness_event(&event),
            State::GatheringCredentials(_) => self.on_credentials_event(event.clone()),
            State::PostInstall(_) => self.on_post_install_event(&event),
            _ => false,
        };

        if !handled {
            tracing::debug!(
                event = event.name(),
                state = self.state.name(),
                "Ignoring event not accepted in current state"
            );
        }
    }

    /// Apply a settled collaborator result to the state that requested it.
    pub(super) fn complete(&mut self, completion: Completion) {
        let name = completion.name();
        let leftover = match &self.state {
            State::Authenticating => self.on_authenticated(completion),
            State::Preparing(_) => self.on_readiness_completion(completion),
            State::GatheringCredentials(_) => self.on_credentials_completion(completion),
            State::Configuring => self.on_configured(completion),
            State::RunningAgent => self.on_agent_finished(completion),
            State::PostInstall(_) => self.on_post_install_completion(completion),
            _ => Some(completion),
        };

        if leftover.is_some() {
            tracing::debug!(
                operation = name,
                state = self.state.name(),
                "Discarding stale collaborator result"
            );
        }
    }

    fn on_authenticated(&mut self, completion: Completion) -> Option<Completion> {
        let Completion::Authenticated(result) = completion else {
            return Some(completion);
        };
        match result {
            Ok(true) => {
                self.emit(WizardEvent::AuthSuccess);
                self.transition(State::Preparing(Readiness::new()));
            }
            Ok(false) => {
                self.emit(WizardEvent::AuthRequired);
                self.fail(WorkflowError::new(
                    "Not authenticated. Run `authwright login` and try again.",
                ));
            }
            Err(e) => {
                self.emit(WizardEvent::AuthFailure {
                    message: e.to_string(),
                });
                self.fail(WorkflowError::from_error("Authentication check failed", &e));
            }
        }
        None
    }

    fn start_configuring(&mut self) {
        self.emit(WizardEvent::ConfigStart);
        let Some(request) = self.configure_request() else {
            self.fail(WorkflowError::new(
                "Cannot configure environment without an integration and credentials",
            ));
            return;
        };
        self.invoke(
            |c| async move { c.configure_environment(request).await },
            Completion::Configured,
        );
    }

    fn configure_request(&self) -> Option<ConfigureRequest> {
        Some(ConfigureRequest {
            install_dir: self.ctx.options.install_dir.clone(),
            integration: self.ctx.integration?,
            credentials: self.ctx.credentials()?.clone(),
        })
    }

    fn on_configured(&mut self, completion: Completion) -> Option<Completion> {
        let Completion::Configured(result) = completion else {
            return Some(completion);
        };
        match result {
            Ok(()) => {
                self.emit(WizardEvent::ConfigComplete);
                self.transition(State::RunningAgent);
            }
            Err(e) => {
                self.fail(WorkflowError::from_error("Failed to configure environment", &e));
            }
        }
        None
    }

    fn start_agent(&mut self) {
        self.emit(WizardEvent::AgentStart);
        let Some(request) = self.configure_request() else {
            self.fail(WorkflowError::new(
                "Cannot run the agent without an integration and credentials",
            ));
            return;
        };
        let request = AgentRequest {
            install_dir: request.install_dir,
            integration: request.integration,
            credentials: request.credentials,
        };
        self.invoke(
            |c| async move { c.run_agent(request).await },
            Completion::AgentFinished,
        );
    }

    fn on_agent_finished(&mut self, completion: Completion) -> Option<Completion> {
        let Completion::AgentFinished(result) = completion else {
            return Some(completion);
        };
        match result {
            Ok(AgentResult {
                success: true,
                summary,
                ..
            }) => {
                let summary = summary.unwrap_or_else(|| "Installation complete.".to_string());
                self.ctx.agent_summary = Some(summary.clone());
                self.emit(WizardEvent::AgentSuccess { summary });
                self.transition(State::PostInstall(PostInstallStep::DetectingChanges));
            }
            Ok(AgentResult { error, .. }) => {
                let message = error.unwrap_or_else(|| "Agent reported failure".to_string());
                self.agent_failed(message, None);
            }
            Err(e) => {
                self.agent_failed(e.to_string(), Some(format!("{e:?}")));
            }
        }
        None
    }

    fn agent_failed(&mut self, message: String, stack: Option<String>) {
        self.emit(WizardEvent::AgentFailure {
            message: message.clone(),
            stack: stack.clone(),
        });
        self.fail(WorkflowError {
            message,
            stack,
            reported: true,
        });
    }

    /// Entering the credential waterfall always starts from the flags check.
    pub(super) fn start_credentials(&mut self) {
        self.transition(State::GatheringCredentials(CredentialStep::CheckingFlags));
    }
}
