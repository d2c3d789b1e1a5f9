//! The installation workflow state machine.

pub mod context;
mod credentials;
mod machine;
mod post_install;
mod readiness;
pub mod state;

#[cfg(test)]
mod tests;

pub use machine::{Orchestrator, Outcome, RunReport, WorkflowHandle};

/// Events sent into the machine by the user or a renderer.
#[derive(Clone, PartialEq, Eq)]
pub enum MachineEvent {
    Start,
    GitConfirmed,
    GitCancelled,
    BranchCreate,
    BranchContinue,
    BranchCancel,
    EnvScanApproved,
    EnvScanDeclined,
    CredentialsSubmitted { client_id: String, api_key: String },
    RetryAuth,
    CommitApproved,
    CommitDeclined,
    PrApproved,
    PrDeclined,
    /// Accepted from every non-terminal state.
    Cancel,
}

impl MachineEvent {
    pub fn name(&self) -> &'static str {
        match self {
            MachineEvent::Start => "START",
            MachineEvent::GitConfirmed => "GIT_CONFIRMED",
            MachineEvent::GitCancelled => "GIT_CANCELLED",
            MachineEvent::BranchCreate => "BRANCH_CREATE",
            MachineEvent::BranchContinue => "BRANCH_CONTINUE",
            MachineEvent::BranchCancel => "BRANCH_CANCEL",
            MachineEvent::EnvScanApproved => "ENV_SCAN_APPROVED",
            MachineEvent::EnvScanDeclined => "ENV_SCAN_DECLINED",
            MachineEvent::CredentialsSubmitted { .. } => "CREDENTIALS_SUBMITTED",
            MachineEvent::RetryAuth => "RETRY_AUTH",
            MachineEvent::CommitApproved => "COMMIT_APPROVED",
            MachineEvent::CommitDeclined => "COMMIT_DECLINED",
            MachineEvent::PrApproved => "PR_APPROVED",
            MachineEvent::PrDeclined => "PR_DECLINED",
            MachineEvent::Cancel => "CANCEL",
        }
    }
}

// Manual Debug impl to avoid leaking submitted API keys
impl std::fmt::Debug for MachineEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
