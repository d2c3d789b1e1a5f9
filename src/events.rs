//! Typed event stream between the orchestrator and its renderers.
//!
//! The orchestrator publishes [`WizardEvent`]s on an [`EventBus`]; renderers
//! subscribe and never talk back through it. User decisions travel the other
//! way as [`MachineEvent`](crate::workflow::MachineEvent)s.

use serde::Serialize;
use tokio::sync::broadcast;

use crate::workflow::context::{CredentialSource, Integration};

const BUS_CAPACITY: usize = 256;

/// Every notification the wizard emits, tagged with its wire name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all_fields = "camelCase")]
pub enum WizardEvent {
    #[serde(rename = "state:enter")]
    StateEnter { state: String },
    #[serde(rename = "state:exit")]
    StateExit { state: String },

    #[serde(rename = "auth:checking")]
    AuthChecking,
    #[serde(rename = "auth:required")]
    AuthRequired,
    #[serde(rename = "auth:success")]
    AuthSuccess,
    #[serde(rename = "auth:failure")]
    AuthFailure { message: String },

    #[serde(rename = "detection:start")]
    DetectionStart,
    #[serde(rename = "detection:complete")]
    DetectionComplete { integration: Integration },
    #[serde(rename = "detection:none")]
    DetectionNone,
    /// Detection failed; followed by `detection:none`.
    #[serde(rename = "detection:error")]
    DetectionError { message: String },

    #[serde(rename = "git:checking")]
    GitChecking,
    #[serde(rename = "git:clean")]
    GitClean,
    #[serde(rename = "git:dirty")]
    GitDirty { files: Vec<String> },
    #[serde(rename = "git:dirty:confirmed")]
    GitDirtyConfirmed,
    #[serde(rename = "git:dirty:cancelled")]
    GitDirtyCancelled,
    /// Status check failed; the tree is treated as clean.
    #[serde(rename = "git:error")]
    GitError { message: String },

    #[serde(rename = "branch:checking")]
    BranchChecking,
    #[serde(rename = "branch:protected")]
    BranchProtected { branch: String },
    #[serde(rename = "branch:created")]
    BranchCreated { branch: String },
    #[serde(rename = "branch:create:failed")]
    BranchCreateFailed { error: String },
    /// Branch check failed; the branch is treated as unprotected.
    #[serde(rename = "branch:error")]
    BranchError { message: String },

    /// Manual entry prompt.
    #[serde(rename = "credentials:gathering")]
    CredentialsGathering { requires_api_key: bool },
    #[serde(rename = "credentials:found")]
    CredentialsFound { source: CredentialSource },
    #[serde(rename = "credentials:env:detected")]
    EnvDetected { files: Vec<String> },
    #[serde(rename = "credentials:env:prompt")]
    EnvPrompt { files: Vec<String> },
    #[serde(rename = "credentials:env:scanning")]
    EnvScanning,
    #[serde(rename = "credentials:env:found")]
    EnvFound { source_path: String },
    #[serde(rename = "credentials:env:notfound")]
    EnvNotFound,
    #[serde(rename = "credentials:env:error")]
    EnvError { message: String },
    #[serde(rename = "credentials:stored:error")]
    StoredAuthError { message: String },

    /// Published by the device authorization collaborator once the code is known.
    #[serde(rename = "device:started")]
    DeviceStarted {
        verification_uri: String,
        verification_uri_complete: String,
        user_code: String,
    },
    #[serde(rename = "device:success")]
    DeviceSuccess,
    #[serde(rename = "device:error")]
    DeviceError { message: String },
    #[serde(rename = "device:timeout")]
    DeviceTimeout,

    #[serde(rename = "staging:fetching")]
    StagingFetching,
    #[serde(rename = "staging:success")]
    StagingSuccess,
    #[serde(rename = "staging:error")]
    StagingError { message: String },

    #[serde(rename = "config:start")]
    ConfigStart,
    #[serde(rename = "config:complete")]
    ConfigComplete,

    #[serde(rename = "agent:start")]
    AgentStart,
    #[serde(rename = "agent:success")]
    AgentSuccess { summary: String },
    #[serde(rename = "agent:failure")]
    AgentFailure {
        message: String,
        stack: Option<String>,
    },

    #[serde(rename = "postinstall:changes")]
    PostInstallChanges { files: Vec<String> },
    #[serde(rename = "postinstall:nochanges")]
    PostInstallNoChanges,
    #[serde(rename = "postinstall:changes:failed")]
    ChangesFailed { error: String },
    #[serde(rename = "postinstall:commit:prompt")]
    CommitPrompt,
    #[serde(rename = "postinstall:commit:generating")]
    CommitGenerating,
    /// Generation failed or came back empty; a template is used.
    #[serde(rename = "postinstall:commit:fallback")]
    CommitMessageFallback { error: String },
    #[serde(rename = "postinstall:commit:committing")]
    CommitCommitting { message: String },
    #[serde(rename = "postinstall:commit:success")]
    CommitSuccess { message: String },
    #[serde(rename = "postinstall:commit:failed")]
    CommitFailed { error: String },
    #[serde(rename = "postinstall:pr:prompt")]
    PrPrompt,
    #[serde(rename = "postinstall:pr:generating")]
    PrGenerating,
    #[serde(rename = "postinstall:pr:fallback")]
    PrDescriptionFallback { error: String },
    #[serde(rename = "postinstall:pr:pushing")]
    PrPushing,
    #[serde(rename = "postinstall:push:failed")]
    PushFailed { error: String },
    #[serde(rename = "postinstall:pr:creating")]
    PrCreating,
    #[serde(rename = "postinstall:pr:success")]
    PrSuccess { url: String },
    #[serde(rename = "postinstall:pr:failed")]
    PrFailed { error: String },
    #[serde(rename = "postinstall:manual")]
    ManualInstructions { instructions: String },

    #[serde(rename = "complete")]
    Complete {
        success: bool,
        summary: Option<String>,
    },
    #[serde(rename = "cancelled")]
    Cancelled,
    #[serde(rename = "error")]
    Error {
        message: String,
        stack: Option<String>,
    },
}

impl WizardEvent {
    /// Wire name of the event, e.g. `agent:success`.
    pub fn name(&self) -> &'static str {
        match self {
            WizardEvent::StateEnter { .. } => "state:enter",
            WizardEvent::StateExit { .. } => "state:exit",
            WizardEvent::AuthChecking => "auth:checking",
            WizardEvent::AuthRequired => "auth:required",
            WizardEvent::AuthSuccess => "auth:success",
            WizardEvent::AuthFailure { .. } => "auth:failure",
            WizardEvent::DetectionStart => "detection:start",
            WizardEvent::DetectionComplete { .. } => "detection:complete",
            WizardEvent::DetectionNone => "detection:none",
            WizardEvent::DetectionError { .. } => "detection:error",
            WizardEvent::GitChecking => "git:checking",
            WizardEvent::GitClean => "git:clean",
            WizardEvent::GitDirty { .. } => "git:dirty",
            WizardEvent::GitDirtyConfirmed => "git:dirty:confirmed",
            WizardEvent::GitDirtyCancelled => "git:dirty:cancelled",
            WizardEvent::GitError { .. } => "git:error",
            WizardEvent::BranchChecking => "branch:checking",
            WizardEvent::BranchProtected { .. } => "branch:protected",
            WizardEvent::BranchCreated { .. } => "branch:created",
            WizardEvent::BranchCreateFailed { .. } => "branch:create:failed",
            WizardEvent::BranchError { .. } => "branch:error",
            WizardEvent::CredentialsGathering { .. } => "credentials:gathering",
            WizardEvent::CredentialsFound { .. } => "credentials:found",
            WizardEvent::EnvDetected { .. } => "credentials:env:detected",
            WizardEvent::EnvPrompt { .. } => "credentials:env:prompt",
            WizardEvent::EnvScanning => "credentials:env:scanning",
            WizardEvent::EnvFound { .. } => "credentials:env:found",
            WizardEvent::EnvNotFound => "credentials:env:notfound",
            WizardEvent::EnvError { .. } => "credentials:env:error",
            WizardEvent::StoredAuthError { .. } => "credentials:stored:error",
            WizardEvent::DeviceStarted { .. } => "device:started",
            WizardEvent::DeviceSuccess => "device:success",
            WizardEvent::DeviceError { .. } => "device:error",
            WizardEvent::DeviceTimeout => "device:timeout",
            WizardEvent::StagingFetching => "staging:fetching",
            WizardEvent::StagingSuccess => "staging:success",
            WizardEvent::StagingError { .. } => "staging:error",
            WizardEvent::ConfigStart => "config:start",
            WizardEvent::ConfigComplete => "config:complete",
            WizardEvent::AgentStart => "agent:start",
            WizardEvent::AgentSuccess { .. } => "agent:success",
            WizardEvent::AgentFailure { .. } => "agent:failure",
            WizardEvent::PostInstallChanges { .. } => "postinstall:changes",
            WizardEvent::PostInstallNoChanges => "postinstall:nochanges",
            WizardEvent::ChangesFailed { .. } => "postinstall:changes:failed",
            WizardEvent::CommitPrompt => "postinstall:commit:prompt",
            WizardEvent::CommitGenerating => "postinstall:commit:generating",
            WizardEvent::CommitMessageFallback { .. } => "postinstall:commit:fallback",
            WizardEvent::CommitCommitting { .. } => "postinstall:commit:committing",
            WizardEvent::CommitSuccess { .. } => "postinstall:commit:success",
            WizardEvent::CommitFailed { .. } => "postinstall:commit:failed",
            WizardEvent::PrPrompt => "postinstall:pr:prompt",
            WizardEvent::PrGenerating => "postinstall:pr:generating",
            WizardEvent::PrDescriptionFallback { .. } => "postinstall:pr:fallback",
            WizardEvent::PrPushing => "postinstall:pr:pushing",
            WizardEvent::PushFailed { .. } => "postinstall:push:failed",
            WizardEvent::PrCreating => "postinstall:pr:creating",
            WizardEvent::PrSuccess { .. } => "postinstall:pr:success",
            WizardEvent::PrFailed { .. } => "postinstall:pr:failed",
            WizardEvent::ManualInstructions { .. } => "postinstall:manual",
            WizardEvent::Complete { .. } => "complete",
            WizardEvent::Cancelled => "cancelled",
            WizardEvent::Error { .. } => "error",
        }
    }

    /// True for the three lifecycle events that close a run.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            WizardEvent::Complete { .. } | WizardEvent::Cancelled | WizardEvent::Error { .. }
        )
    }
}

/// Fan-out channel for [`WizardEvent`]s. Cheap to clone.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<WizardEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(BUS_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<WizardEvent> {
        self.tx.subscribe()
    }

    pub fn emit(&self, event: WizardEvent) {
        tracing::debug!(event = event.name(), "Emitting event");
        // No subscribers is fine
        let _ = self.tx.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
