use crate::workflow::context::CredentialSource;

/// Top-level states of the installation workflow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum State {
    Idle,
    Authenticating,
    Preparing(Readiness),
    GatheringCredentials(CredentialStep),
    Configuring,
    RunningAgent,
    PostInstall(PostInstallStep),
    Complete,
    Cancelled,
    Error,
}

impl State {
    pub fn name(&self) -> &'static str {
        match self {
            State::Idle => "idle",
            State::Authenticating => "authenticating",
            State::Preparing(_) => "preparing",
            State::GatheringCredentials(_) => "gatheringCredentials",
            State::Configuring => "configuring",
            State::RunningAgent => "runningAgent",
            State::PostInstall(_) => "postInstall",
            State::Complete => "complete",
            State::Cancelled => "cancelled",
            State::Error => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, State::Complete | State::Cancelled | State::Error)
    }
}

/// Parallel region of `preparing`: three independent sub-machines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Readiness {
    pub detection: DetectionState,
    pub git: GitCheckState,
    pub branch: BranchCheckState,
}

impl Readiness {
    pub fn new() -> Self {
        Self {
            detection: DetectionState::Detecting,
            git: GitCheckState::Checking,
            branch: BranchCheckState::Checking,
        }
    }

    /// AND-join: every region has reached its final sub-state.
    pub fn is_done(&self) -> bool {
        self.detection == DetectionState::Done
            && self.git == GitCheckState::Done
            && self.branch == BranchCheckState::Done
    }
}

impl Default for Readiness {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectionState {
    Detecting,
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GitCheckState {
    Checking,
    AwaitingConfirmation,
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchCheckState {
    Checking,
    AwaitingConfirmation,
    Creating,
    Done,
}

impl DetectionState {
    pub fn name(self) -> &'static str {
        match self {
            DetectionState::Detecting => "detecting",
            DetectionState::Done => "done",
        }
    }
}

impl GitCheckState {
    pub fn name(self) -> &'static str {
        match self {
            GitCheckState::Checking => "checking",
            GitCheckState::AwaitingConfirmation => "awaitingConfirmation",
            GitCheckState::Done => "done",
        }
    }
}

impl BranchCheckState {
    pub fn name(self) -> &'static str {
        match self {
            BranchCheckState::Checking => "checking",
            BranchCheckState::AwaitingConfirmation => "awaitingConfirmation",
            BranchCheckState::Creating => "creating",
            BranchCheckState::Done => "done",
        }
    }
}

/// Position in the credential waterfall.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialStep {
    CheckingFlags,
    DetectingEnvFiles,
    AwaitingEnvConsent,
    ScanningEnv,
    CheckingStoredAuth,
    DeviceAuth,
    /// Fetch with a valid session; carries the source that produced it.
    FetchingRemote(CredentialSource),
    ManualEntry,
}

impl CredentialStep {
    pub fn name(self) -> &'static str {
        match self {
            CredentialStep::CheckingFlags => "checkingFlags",
            CredentialStep::DetectingEnvFiles => "detectingEnvFiles",
            CredentialStep::AwaitingEnvConsent => "awaitingEnvConsent",
            CredentialStep::ScanningEnv => "scanningEnv",
            CredentialStep::CheckingStoredAuth => "checkingStoredAuth",
            CredentialStep::DeviceAuth => "deviceAuth",
            CredentialStep::FetchingRemote(_) => "fetchingRemote",
            CredentialStep::ManualEntry => "manualEntry",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostInstallStep {
    DetectingChanges,
    PromptingCommit,
    GeneratingCommitMessage,
    Committing,
    CheckingForPrTooling,
    PromptingPr,
    GeneratingPrDescription,
    Pushing,
    CreatingPr,
    Done,
}

impl PostInstallStep {
    pub fn name(self) -> &'static str {
        match self {
            PostInstallStep::DetectingChanges => "detectingChanges",
            PostInstallStep::PromptingCommit => "promptingCommit",
            PostInstallStep::GeneratingCommitMessage => "generatingCommitMessage",
            PostInstallStep::Committing => "committing",
            PostInstallStep::CheckingForPrTooling => "checkingForPrTooling",
            PostInstallStep::PromptingPr => "promptingPr",
            PostInstallStep::GeneratingPrDescription => "generatingPrDescription",
            PostInstallStep::Pushing => "pushing",
            PostInstallStep::CreatingPr => "creatingPr",
            PostInstallStep::Done => "done",
        }
    }
}
