use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{broadcast, Notify};

use crate::collaborators::types::*;
use crate::collaborators::Collaborators;
use crate::error::{AppError, Result};
use crate::events::{EventBus, WizardEvent};
use crate::workflow::context::{
    CredentialSource, Credentials, DeviceAuthGrant, InstallOptions, Integration,
};
use crate::workflow::{MachineEvent, Orchestrator, Outcome, RunReport, WorkflowHandle};

const WAIT: Duration = Duration::from_secs(5);

#[derive(Clone)]
enum AgentBehavior {
    Succeed(&'static str),
    Report(&'static str),
    Throw(&'static str),
    Hang,
}

#[derive(Clone)]
enum DeviceBehavior {
    Approve,
    Deny,
    Expire,
}

/// Scripted collaborator with per-operation call counters.
struct MockCollaborators {
    authenticated: std::result::Result<bool, &'static str>,
    integration: Option<Integration>,
    detect_fails: bool,
    /// Detection waits for a notification before answering.
    detect_gate: Option<Arc<Notify>>,
    git: GitStatus,
    git_fails: bool,
    branch: BranchStatus,
    branch_fails: bool,
    create_branch_fails: bool,
    env_files: Vec<String>,
    env_detect_fails: bool,
    env_scan: EnvScan,
    stored_auth: bool,
    stored_auth_fails: bool,
    device: Mutex<VecDeque<DeviceBehavior>>,
    remote_fails: bool,
    configure_fails: bool,
    agent: AgentBehavior,
    changes: Vec<String>,
    changes_fail: bool,
    commit_message_fails: bool,
    commit_fails: bool,
    pr_tooling: bool,
    pr_description_fails: bool,
    push_fails: bool,
    create_pr_fails: bool,
    calls: Mutex<HashMap<&'static str, usize>>,
}

impl Default for MockCollaborators {
    fn default() -> Self {
        Self {
            authenticated: Ok(true),
            integration: Some(Integration::Nextjs),
            detect_fails: false,
            detect_gate: None,
            git: GitStatus {
                is_clean: true,
                files: Vec::new(),
            },
            git_fails: false,
            branch: BranchStatus {
                branch: Some("feature/auth".to_string()),
                is_protected: false,
            },
            branch_fails: false,
            create_branch_fails: false,
            env_files: Vec::new(),
            env_detect_fails: false,
            env_scan: EnvScan::default(),
            stored_auth: false,
            stored_auth_fails: false,
            device: Mutex::new(VecDeque::new()),
            remote_fails: false,
            configure_fails: false,
            agent: AgentBehavior::Succeed("Done!"),
            changes: Vec::new(),
            changes_fail: false,
            commit_message_fails: false,
            commit_fails: false,
            pr_tooling: true,
            pr_description_fails: false,
            push_fails: false,
            create_pr_fails: false,
            calls: Mutex::new(HashMap::new()),
        }
    }
}

impl MockCollaborators {
    fn record(&self, op: &'static str) {
        *self.calls.lock().unwrap().entry(op).or_insert(0) += 1;
    }

    fn calls(&self, op: &str) -> usize {
        self.calls.lock().unwrap().get(op).copied().unwrap_or(0)
    }

    fn with_device(self, script: Vec<DeviceBehavior>) -> Self {
        *self.device.lock().unwrap() = script.into();
        self
    }
}

fn remote_credentials() -> Credentials {
    Credentials {
        client_id: "client_remote".to_string(),
        api_key: Some("sk_remote".to_string()),
    }
}

#[async_trait]
impl Collaborators for MockCollaborators {
    async fn check_authentication(&self, _options: InstallOptions) -> Result<bool> {
        self.record("check_authentication");
        self.authenticated
            .map_err(|e| AppError::Auth(e.to_string()))
    }

    async fn detect_integration(&self, options: InstallOptions) -> Result<Option<Integration>> {
        self.record("detect_integration");
        if let Some(gate) = &self.detect_gate {
            gate.notified().await;
        }
        if self.detect_fails {
            return Err(AppError::Detection("package.json is not valid JSON".to_string()));
        }
        Ok(options.integration.or(self.integration))
    }

    async fn check_git_status(&self, _install_dir: PathBuf) -> Result<GitStatus> {
        self.record("check_git_status");
        if self.git_fails {
            return Err(AppError::Git("could not find repository".to_string()));
        }
        Ok(self.git.clone())
    }

    async fn check_branch(&self, _install_dir: PathBuf) -> Result<BranchStatus> {
        self.record("check_branch");
        if self.branch_fails {
            return Err(AppError::Git("reference HEAD is corrupt".to_string()));
        }
        Ok(self.branch.clone())
    }

    async fn create_branch(
        &self,
        _install_dir: PathBuf,
        name: String,
        _fallback_name: String,
    ) -> Result<String> {
        self.record("create_branch");
        if self.create_branch_fails {
            return Err(AppError::Git("branch already exists".to_string()));
        }
        Ok(name)
    }

    async fn detect_env_files(&self, _install_dir: PathBuf) -> Result<EnvFileProbe> {
        self.record("detect_env_files");
        if self.env_detect_fails {
            return Err(AppError::Io(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "permission denied",
            )));
        }
        Ok(EnvFileProbe {
            exists: !self.env_files.is_empty(),
            files: self.env_files.clone(),
        })
    }

    async fn scan_env_files(&self, _install_dir: PathBuf) -> Result<EnvScan> {
        self.record("scan_env_files");
        Ok(self.env_scan.clone())
    }

    async fn check_stored_auth(&self) -> Result<bool> {
        self.record("check_stored_auth");
        if self.stored_auth_fails {
            return Err(AppError::Serialization(
                serde_json::from_str::<serde_json::Value>("{").unwrap_err(),
            ));
        }
        Ok(self.stored_auth)
    }

    async fn run_device_auth(&self, events: EventBus) -> Result<DeviceAuthGrant> {
        self.record("run_device_auth");
        let grant = DeviceAuthGrant {
            verification_uri: "https://auth.test/device".to_string(),
            verification_uri_complete: "https://auth.test/device?code=ABCD-EFGH".to_string(),
            user_code: "ABCD-EFGH".to_string(),
        };
        events.emit(WizardEvent::DeviceStarted {
            verification_uri: grant.verification_uri.clone(),
            verification_uri_complete: grant.verification_uri_complete.clone(),
            user_code: grant.user_code.clone(),
        });
        let behavior = self.device.lock().unwrap().pop_front();
        match behavior {
            Some(DeviceBehavior::Approve) => Ok(grant),
            Some(DeviceBehavior::Expire) => Err(AppError::DeviceAuthExpired),
            Some(DeviceBehavior::Deny) | None => {
                Err(AppError::DeviceAuth("access_denied".to_string()))
            }
        }
    }

    async fn fetch_remote_credentials(&self) -> Result<Credentials> {
        self.record("fetch_remote_credentials");
        if self.remote_fails {
            return Err(AppError::Api("503 Service Unavailable".to_string()));
        }
        Ok(remote_credentials())
    }

    async fn configure_environment(&self, _request: ConfigureRequest) -> Result<()> {
        self.record("configure_environment");
        if self.configure_fails {
            return Err(AppError::Io(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "read-only file system",
            )));
        }
        Ok(())
    }

    async fn run_agent(&self, _request: AgentRequest) -> Result<AgentResult> {
        self.record("run_agent");
        match self.agent.clone() {
            AgentBehavior::Succeed(summary) => Ok(AgentResult {
                success: true,
                summary: Some(summary.to_string()),
                error: None,
            }),
            AgentBehavior::Report(error) => Ok(AgentResult {
                success: false,
                summary: None,
                error: Some(error.to_string()),
            }),
            AgentBehavior::Throw(error) => Err(AppError::Agent(error.to_string())),
            AgentBehavior::Hang => std::future::pending().await,
        }
    }

    async fn detect_changes(&self, _install_dir: PathBuf) -> Result<ChangeSet> {
        self.record("detect_changes");
        if self.changes_fail {
            return Err(AppError::Git("index is locked".to_string()));
        }
        Ok(ChangeSet {
            has_changes: !self.changes.is_empty(),
            files: self.changes.clone(),
        })
    }

    async fn generate_commit_message(&self, _summary: ChangeSummary) -> Result<String> {
        self.record("generate_commit_message");
        if self.commit_message_fails {
            return Err(AppError::ClaudeApi("overloaded".to_string()));
        }
        Ok("feat: add authentication with authwright".to_string())
    }

    async fn commit_changes(&self, _install_dir: PathBuf, _message: String) -> Result<()> {
        self.record("commit_changes");
        if self.commit_fails {
            return Err(AppError::Git("nothing added to commit".to_string()));
        }
        Ok(())
    }

    async fn check_pr_tooling(&self, _install_dir: PathBuf) -> Result<bool> {
        self.record("check_pr_tooling");
        Ok(self.pr_tooling)
    }

    async fn generate_pr_description(&self, _summary: ChangeSummary) -> Result<String> {
        self.record("generate_pr_description");
        if self.pr_description_fails {
            return Err(AppError::ClaudeApi("rate limited".to_string()));
        }
        Ok("## Summary\n\nAdds authentication.".to_string())
    }

    async fn push_branch(&self, _install_dir: PathBuf) -> Result<String> {
        self.record("push_branch");
        if self.push_fails {
            return Err(AppError::Git("remote rejected".to_string()));
        }
        Ok("feature/auth".to_string())
    }

    async fn create_pr(&self, _request: PullRequestRequest) -> Result<String> {
        self.record("create_pr");
        if self.create_pr_fails {
            return Err(AppError::GitHubApi("Validation Failed".to_string()));
        }
        Ok("https://github.com/acme/shop/pull/7".to_string())
    }
}

fn cli_options() -> InstallOptions {
    InstallOptions {
        skip_auth: true,
        client_id: Some("client_123".to_string()),
        api_key: Some("sk_test_123".to_string()),
        ..InstallOptions::new("/tmp/project")
    }
}

fn bare_options() -> InstallOptions {
    InstallOptions {
        skip_auth: true,
        ..InstallOptions::new("/tmp/project")
    }
}

fn start(
    mock: &Arc<MockCollaborators>,
    options: InstallOptions,
) -> (WorkflowHandle, broadcast::Receiver<WizardEvent>) {
    let bus = EventBus::new();
    let rx = bus.subscribe();
    let collaborators: Arc<dyn Collaborators> = mock.clone();
    let handle = Orchestrator::new(collaborators, bus).spawn(options);
    assert!(handle.send(MachineEvent::Start));
    (handle, rx)
}

/// Receive events until one matches `pred`; returns everything seen.
async fn wait_until<F>(rx: &mut broadcast::Receiver<WizardEvent>, pred: F) -> Vec<WizardEvent>
where
    F: Fn(&WizardEvent) -> bool,
{
    let mut seen = Vec::new();
    tokio::time::timeout(WAIT, async {
        loop {
            let event = rx.recv().await.expect("event bus closed");
            let done = pred(&event);
            seen.push(event);
            if done {
                break;
            }
        }
    })
    .await
    .expect("timed out waiting for event");
    seen
}

async fn wait_for(rx: &mut broadcast::Receiver<WizardEvent>, name: &str) -> Vec<WizardEvent> {
    wait_until(rx, |e| e.name() == name).await
}

async fn wait_for_state(rx: &mut broadcast::Receiver<WizardEvent>, state: &str) -> Vec<WizardEvent> {
    wait_until(rx, |e| matches!(e, WizardEvent::StateEnter { state: s } if s == state)).await
}

fn drain(rx: &mut broadcast::Receiver<WizardEvent>) -> Vec<WizardEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

async fn finish(
    handle: WorkflowHandle,
    rx: &mut broadcast::Receiver<WizardEvent>,
    mut seen: Vec<WizardEvent>,
) -> (RunReport, Vec<WizardEvent>) {
    let report = tokio::time::timeout(WAIT, handle.join())
        .await
        .expect("workflow did not finish")
        .unwrap();
    seen.extend(drain(rx));
    (report, seen)
}

fn count(events: &[WizardEvent], name: &str) -> usize {
    events.iter().filter(|e| e.name() == name).count()
}

fn lifecycle_count(events: &[WizardEvent]) -> usize {
    events.iter().filter(|e| e.is_terminal()).count()
}

fn entered(events: &[WizardEvent], state: &str) -> bool {
    events
        .iter()
        .any(|e| matches!(e, WizardEvent::StateEnter { state: s } if s == state))
}

#[tokio::test]
async fn test_cli_credentials_run_to_completion() {
    let mock = Arc::new(MockCollaborators::default());
    let (handle, mut rx) = start(&mock, cli_options());

    let (report, events) = finish(handle, &mut rx, Vec::new()).await;

    assert_eq!(report.outcome, Outcome::Complete);
    assert_eq!(count(&events, "complete"), 1);
    assert_eq!(lifecycle_count(&events), 1);
    assert!(events.contains(&WizardEvent::Complete {
        success: true,
        summary: Some("Done!".to_string()),
    }));
    assert_eq!(count(&events, "agent:success"), 1);
    assert_eq!(report.context.credential_source(), Some(CredentialSource::Cli));
    assert_eq!(
        report.context.credentials().unwrap().client_id,
        "client_123"
    );
}

#[tokio::test]
async fn test_cli_credentials_skip_every_other_waterfall_step() {
    let mock = Arc::new(MockCollaborators {
        env_files: vec![".env.local".to_string()],
        stored_auth: true,
        ..Default::default()
    });
    let (handle, mut rx) = start(&mock, cli_options());
    let (report, events) = finish(handle, &mut rx, Vec::new()).await;

    assert_eq!(report.outcome, Outcome::Complete);
    for op in [
        "detect_env_files",
        "scan_env_files",
        "check_stored_auth",
        "run_device_auth",
        "fetch_remote_credentials",
    ] {
        assert_eq!(mock.calls(op), 0, "{op} should not run");
    }
    assert_eq!(count(&events, "credentials:gathering"), 0);
    assert_eq!(mock.calls("check_authentication"), 0);
}

#[tokio::test]
async fn test_client_only_integration_accepts_client_id_flag_alone() {
    let mock = Arc::new(MockCollaborators {
        integration: Some(Integration::React),
        ..Default::default()
    });
    let options = InstallOptions {
        api_key: None,
        ..cli_options()
    };
    let (handle, mut rx) = start(&mock, options);
    let (report, _) = finish(handle, &mut rx, Vec::new()).await;

    assert_eq!(report.outcome, Outcome::Complete);
    assert_eq!(report.context.credential_source(), Some(CredentialSource::Cli));
    assert_eq!(report.context.credentials().unwrap().api_key, None);
    assert_eq!(mock.calls("detect_env_files"), 0);
}

#[tokio::test]
async fn test_dirty_tree_cancel_stops_before_agent() {
    let mock = Arc::new(MockCollaborators {
        git: GitStatus {
            is_clean: false,
            files: vec!["a.ts".to_string(), "b.ts".to_string()],
        },
        ..Default::default()
    });
    let (handle, mut rx) = start(&mock, cli_options());

    let seen = wait_for_state(&mut rx, "preparing.git.awaitingConfirmation").await;
    assert!(seen.contains(&WizardEvent::GitDirty {
        files: vec!["a.ts".to_string(), "b.ts".to_string()],
    }));
    handle.send(MachineEvent::GitCancelled);

    let (report, events) = finish(handle, &mut rx, seen).await;
    assert_eq!(report.outcome, Outcome::Cancelled);
    assert_eq!(count(&events, "git:dirty:cancelled"), 1);
    assert_eq!(count(&events, "cancelled"), 1);
    assert_eq!(lifecycle_count(&events), 1);
    assert_eq!(mock.calls("run_agent"), 0);
    assert_eq!(report.context.git_dirty_files.len(), 2);
}

#[tokio::test]
async fn test_readiness_waits_for_every_region_before_credentials() {
    let mock = Arc::new(MockCollaborators {
        git: GitStatus {
            is_clean: false,
            files: vec!["a.ts".to_string()],
        },
        ..Default::default()
    });
    let (handle, mut rx) = start(&mock, cli_options());

    let mut seen = wait_for(&mut rx, "git:dirty").await;
    // Let detection and the branch check settle.
    tokio::time::sleep(Duration::from_millis(50)).await;
    seen.extend(drain(&mut rx));
    assert!(entered(&seen, "preparing.detection.done"));
    assert!(entered(&seen, "preparing.branch.done"));
    assert!(!entered(&seen, "gatheringCredentials"));
    assert_eq!(mock.calls("configure_environment"), 0);

    handle.send(MachineEvent::GitConfirmed);
    seen.extend(wait_for_state(&mut rx, "gatheringCredentials").await);
    let (report, events) = finish(handle, &mut rx, seen).await;

    assert_eq!(report.outcome, Outcome::Complete);
    let confirmed = events
        .iter()
        .position(|e| e.name() == "git:dirty:confirmed")
        .unwrap();
    let gathering = events
        .iter()
        .position(|e| matches!(e, WizardEvent::StateEnter { state } if state == "gatheringCredentials"))
        .unwrap();
    assert!(confirmed < gathering);
}

#[tokio::test]
async fn test_protected_branch_create_then_continue() {
    let mock = Arc::new(MockCollaborators {
        branch: BranchStatus {
            branch: Some("main".to_string()),
            is_protected: true,
        },
        ..Default::default()
    });
    let (handle, mut rx) = start(&mock, cli_options());

    let seen = wait_for(&mut rx, "branch:protected").await;
    handle.send(MachineEvent::BranchCreate);
    let (report, events) = finish(handle, &mut rx, seen).await;

    assert_eq!(report.outcome, Outcome::Complete);
    assert_eq!(mock.calls("create_branch"), 1);
    assert!(events.contains(&WizardEvent::BranchCreated {
        branch: "authwright/add-authentication".to_string(),
    }));
    assert_eq!(
        report.context.current_branch.as_deref(),
        Some("authwright/add-authentication")
    );
    assert!(!report.context.is_protected_branch);
}

#[tokio::test]
async fn test_branch_creation_failure_is_not_fatal() {
    let mock = Arc::new(MockCollaborators {
        branch: BranchStatus {
            branch: Some("main".to_string()),
            is_protected: true,
        },
        create_branch_fails: true,
        ..Default::default()
    });
    let (handle, mut rx) = start(&mock, cli_options());

    let seen = wait_for(&mut rx, "branch:protected").await;
    handle.send(MachineEvent::BranchCreate);
    let (report, events) = finish(handle, &mut rx, seen).await;

    assert_eq!(report.outcome, Outcome::Complete);
    assert_eq!(count(&events, "branch:create:failed"), 1);
    assert_eq!(mock.calls("run_agent"), 1);
}

#[tokio::test]
async fn test_branch_cancel_ends_run() {
    let mock = Arc::new(MockCollaborators {
        branch: BranchStatus {
            branch: Some("main".to_string()),
            is_protected: true,
        },
        ..Default::default()
    });
    let (handle, mut rx) = start(&mock, cli_options());

    let seen = wait_for(&mut rx, "branch:protected").await;
    handle.send(MachineEvent::BranchCancel);
    let (report, events) = finish(handle, &mut rx, seen).await;

    assert_eq!(report.outcome, Outcome::Cancelled);
    assert_eq!(lifecycle_count(&events), 1);
    assert_eq!(mock.calls("create_branch"), 0);
}

#[tokio::test]
async fn test_undetected_integration_is_fatal() {
    let mock = Arc::new(MockCollaborators {
        integration: None,
        ..Default::default()
    });
    let (handle, mut rx) = start(&mock, cli_options());
    let (report, events) = finish(handle, &mut rx, Vec::new()).await;

    assert_eq!(report.outcome, Outcome::Error);
    assert_eq!(count(&events, "detection:none"), 1);
    assert_eq!(count(&events, "error"), 1);
    assert_eq!(lifecycle_count(&events), 1);
    assert!(report
        .context
        .error
        .unwrap()
        .message
        .contains("Could not detect integration"));
}

#[tokio::test]
async fn test_preselected_integration_is_used() {
    let mock = Arc::new(MockCollaborators {
        integration: None,
        ..Default::default()
    });
    let options = InstallOptions {
        integration: Some(Integration::Go),
        ..cli_options()
    };
    let (handle, mut rx) = start(&mock, options);
    let (report, events) = finish(handle, &mut rx, Vec::new()).await;

    assert_eq!(report.outcome, Outcome::Complete);
    assert!(events.contains(&WizardEvent::DetectionComplete {
        integration: Integration::Go,
    }));
}

#[tokio::test]
async fn test_authentication_required_routes_to_error() {
    let mock = Arc::new(MockCollaborators {
        authenticated: Ok(false),
        ..Default::default()
    });
    let options = InstallOptions {
        skip_auth: false,
        ..cli_options()
    };
    let (handle, mut rx) = start(&mock, options);
    let (report, events) = finish(handle, &mut rx, Vec::new()).await;

    assert_eq!(report.outcome, Outcome::Error);
    assert_eq!(count(&events, "auth:required"), 1);
    assert_eq!(count(&events, "error"), 1);
    assert_eq!(lifecycle_count(&events), 1);
    assert_eq!(mock.calls("detect_integration"), 0);
}

#[tokio::test]
async fn test_authentication_check_error_routes_to_error() {
    let mock = Arc::new(MockCollaborators {
        authenticated: Err("session store unreadable"),
        ..Default::default()
    });
    let options = InstallOptions {
        skip_auth: false,
        ..cli_options()
    };
    let (handle, mut rx) = start(&mock, options);
    let (report, events) = finish(handle, &mut rx, Vec::new()).await;

    assert_eq!(report.outcome, Outcome::Error);
    assert_eq!(count(&events, "auth:failure"), 1);
    let error = events.iter().find(|e| e.name() == "error").unwrap();
    let WizardEvent::Error { message, stack } = error else {
        unreachable!()
    };
    assert!(message.contains("session store unreadable"));
    assert!(stack.is_some());
}

#[tokio::test]
async fn test_authenticated_run_checks_auth_first() {
    let mock = Arc::new(MockCollaborators::default());
    let options = InstallOptions {
        skip_auth: false,
        ..cli_options()
    };
    let (handle, mut rx) = start(&mock, options);
    let (report, events) = finish(handle, &mut rx, Vec::new()).await;

    assert_eq!(report.outcome, Outcome::Complete);
    assert_eq!(mock.calls("check_authentication"), 1);
    let auth = events.iter().position(|e| e.name() == "auth:success").unwrap();
    let detect = events
        .iter()
        .position(|e| e.name() == "detection:start")
        .unwrap();
    assert!(auth < detect);
}

#[tokio::test]
async fn test_env_file_consent_resolves_from_env() {
    let mock = Arc::new(MockCollaborators {
        env_files: vec![".env.local".to_string()],
        env_scan: EnvScan {
            found: true,
            client_id: Some("client_env".to_string()),
            api_key: Some("sk_env".to_string()),
            source_path: Some(".env.local".to_string()),
        },
        ..Default::default()
    });
    let (handle, mut rx) = start(&mock, bare_options());

    let seen = wait_for(&mut rx, "credentials:env:prompt").await;
    assert_eq!(mock.calls("scan_env_files"), 0);
    handle.send(MachineEvent::EnvScanApproved);
    let (report, events) = finish(handle, &mut rx, seen).await;

    assert_eq!(report.outcome, Outcome::Complete);
    assert_eq!(report.context.credential_source(), Some(CredentialSource::Env));
    assert_eq!(report.context.env_credential_path.as_deref(), Some(".env.local"));
    assert_eq!(count(&events, "credentials:env:found"), 1);
    assert_eq!(mock.calls("check_stored_auth"), 0);
    assert_eq!(mock.calls("run_device_auth"), 0);
}

#[tokio::test]
async fn test_env_decline_falls_through_to_stored_session() {
    let mock = Arc::new(MockCollaborators {
        env_files: vec![".env".to_string()],
        stored_auth: true,
        ..Default::default()
    });
    let (handle, mut rx) = start(&mock, bare_options());

    let seen = wait_for(&mut rx, "credentials:env:prompt").await;
    handle.send(MachineEvent::EnvScanDeclined);
    let (report, events) = finish(handle, &mut rx, seen).await;

    assert_eq!(report.outcome, Outcome::Complete);
    assert_eq!(mock.calls("scan_env_files"), 0);
    assert_eq!(mock.calls("run_device_auth"), 0);
    assert_eq!(count(&events, "staging:success"), 1);
    assert_eq!(
        report.context.credential_source(),
        Some(CredentialSource::Stored)
    );
    assert_eq!(report.context.credentials(), Some(&remote_credentials()));
}

#[tokio::test]
async fn test_env_scan_without_valid_pair_falls_through() {
    let mock = Arc::new(MockCollaborators {
        env_files: vec![".env".to_string()],
        env_scan: EnvScan {
            found: false,
            ..Default::default()
        },
        stored_auth: true,
        ..Default::default()
    });
    let (handle, mut rx) = start(&mock, bare_options());

    let seen = wait_for(&mut rx, "credentials:env:prompt").await;
    handle.send(MachineEvent::EnvScanApproved);
    let (report, events) = finish(handle, &mut rx, seen).await;

    assert_eq!(count(&events, "credentials:env:notfound"), 1);
    assert_eq!(
        report.context.credential_source(),
        Some(CredentialSource::Stored)
    );
}

#[tokio::test]
async fn test_device_auth_retry_succeeds_on_second_attempt() {
    let mock = Arc::new(
        MockCollaborators::default().with_device(vec![DeviceBehavior::Deny, DeviceBehavior::Approve]),
    );
    let (handle, mut rx) = start(&mock, bare_options());

    let seen = wait_for(&mut rx, "credentials:gathering").await;
    assert_eq!(count(&seen, "device:error"), 1);
    handle.send(MachineEvent::RetryAuth);
    let (report, events) = finish(handle, &mut rx, seen).await;

    assert_eq!(report.outcome, Outcome::Complete);
    assert_eq!(mock.calls("run_device_auth"), 2);
    assert_eq!(count(&events, "device:started"), 2);
    assert_eq!(count(&events, "device:success"), 1);
    assert_eq!(
        report.context.credential_source(),
        Some(CredentialSource::Device)
    );
    assert_eq!(
        report.context.device_auth.unwrap().user_code,
        "ABCD-EFGH"
    );
}

#[tokio::test]
async fn test_device_auth_expiry_emits_timeout_and_manual_entry_resolves() {
    let mock = Arc::new(MockCollaborators::default().with_device(vec![DeviceBehavior::Expire]));
    let (handle, mut rx) = start(&mock, bare_options());

    let seen = wait_for(&mut rx, "credentials:gathering").await;
    assert_eq!(count(&seen, "device:timeout"), 1);
    assert!(seen.contains(&WizardEvent::CredentialsGathering {
        requires_api_key: true,
    }));
    handle.send(MachineEvent::CredentialsSubmitted {
        client_id: " client_manual ".to_string(),
        api_key: "sk_manual".to_string(),
    });
    let (report, _) = finish(handle, &mut rx, seen).await;

    assert_eq!(report.outcome, Outcome::Complete);
    assert_eq!(
        report.context.credential_source(),
        Some(CredentialSource::Manual)
    );
    assert_eq!(report.context.credentials().unwrap().client_id, "client_manual");
}

#[tokio::test]
async fn test_incomplete_manual_entry_prompts_again() {
    let mock = Arc::new(MockCollaborators::default());
    let (handle, mut rx) = start(&mock, bare_options());

    let mut seen = wait_for(&mut rx, "credentials:gathering").await;
    handle.send(MachineEvent::CredentialsSubmitted {
        client_id: "client_manual".to_string(),
        api_key: String::new(),
    });
    seen.extend(wait_for(&mut rx, "credentials:gathering").await);
    assert_eq!(mock.calls("configure_environment"), 0);

    handle.send(MachineEvent::CredentialsSubmitted {
        client_id: "client_manual".to_string(),
        api_key: "sk_manual".to_string(),
    });
    let (report, events) = finish(handle, &mut rx, seen).await;
    assert_eq!(report.outcome, Outcome::Complete);
    assert_eq!(count(&events, "credentials:gathering"), 2);
    assert_eq!(count(&events, "credentials:found"), 1);
}

#[tokio::test]
async fn test_remote_fetch_failure_falls_through_to_manual() {
    let mock = Arc::new(MockCollaborators {
        stored_auth: true,
        remote_fails: true,
        ..Default::default()
    });
    let (handle, mut rx) = start(&mock, bare_options());

    let seen = wait_for(&mut rx, "credentials:gathering").await;
    assert_eq!(count(&seen, "staging:error"), 1);
    assert_eq!(mock.calls("run_device_auth"), 0);
    handle.send(MachineEvent::Cancel);
    let (report, events) = finish(handle, &mut rx, seen).await;

    assert_eq!(report.outcome, Outcome::Cancelled);
    assert_eq!(lifecycle_count(&events), 1);
    assert!(report.context.credentials().is_none());
}

#[tokio::test]
async fn test_configure_failure_is_fatal() {
    let mock = Arc::new(MockCollaborators {
        configure_fails: true,
        ..Default::default()
    });
    let (handle, mut rx) = start(&mock, cli_options());
    let (report, events) = finish(handle, &mut rx, Vec::new()).await;

    assert_eq!(report.outcome, Outcome::Error);
    assert_eq!(count(&events, "config:start"), 1);
    assert_eq!(count(&events, "config:complete"), 0);
    assert_eq!(count(&events, "error"), 1);
    assert_eq!(mock.calls("run_agent"), 0);
}

#[tokio::test]
async fn test_agent_reported_failure_completes_unsuccessfully() {
    let mock = Arc::new(MockCollaborators {
        agent: AgentBehavior::Report("Agent failed"),
        changes: vec!["app/page.tsx".to_string()],
        ..Default::default()
    });
    let (handle, mut rx) = start(&mock, cli_options());
    let (report, events) = finish(handle, &mut rx, Vec::new()).await;

    assert_eq!(report.outcome, Outcome::Error);
    assert_eq!(count(&events, "agent:failure"), 1);
    assert_eq!(count(&events, "complete"), 1);
    assert_eq!(count(&events, "error"), 0);
    assert!(events.contains(&WizardEvent::Complete {
        success: false,
        summary: None,
    }));
    assert!(events.contains(&WizardEvent::AgentFailure {
        message: "Agent failed".to_string(),
        stack: None,
    }));
    assert_eq!(mock.calls("detect_changes"), 0);
    assert_eq!(report.context.error.unwrap().message, "Agent failed");
}

#[tokio::test]
async fn test_agent_error_reports_stack() {
    let mock = Arc::new(MockCollaborators {
        agent: AgentBehavior::Throw("tool loop crashed"),
        ..Default::default()
    });
    let (handle, mut rx) = start(&mock, cli_options());
    let (report, events) = finish(handle, &mut rx, Vec::new()).await;

    assert_eq!(report.outcome, Outcome::Error);
    let failure = events.iter().find(|e| e.name() == "agent:failure").unwrap();
    let WizardEvent::AgentFailure { message, stack } = failure else {
        unreachable!()
    };
    assert!(message.contains("tool loop crashed"));
    assert!(stack.is_some());
    assert_eq!(lifecycle_count(&events), 1);
}

#[tokio::test]
async fn test_no_commit_skips_post_install() {
    let mock = Arc::new(MockCollaborators {
        changes: vec!["app/page.tsx".to_string()],
        ..Default::default()
    });
    let options = InstallOptions {
        no_commit: true,
        ..cli_options()
    };
    let (handle, mut rx) = start(&mock, options);
    let (report, events) = finish(handle, &mut rx, Vec::new()).await;

    assert_eq!(report.outcome, Outcome::Complete);
    assert_eq!(mock.calls("detect_changes"), 0);
    assert!(!entered(&events, "postInstall.detectingChanges"));
    assert_eq!(count(&events, "complete"), 1);
}

#[tokio::test]
async fn test_post_install_commits_pushes_and_opens_pr() {
    let mock = Arc::new(MockCollaborators {
        changes: vec!["app/page.tsx".to_string(), "middleware.ts".to_string()],
        ..Default::default()
    });
    let (handle, mut rx) = start(&mock, cli_options());

    let mut seen = wait_for(&mut rx, "postinstall:commit:prompt").await;
    handle.send(MachineEvent::CommitApproved);
    seen.extend(wait_for(&mut rx, "postinstall:pr:prompt").await);
    handle.send(MachineEvent::PrApproved);
    let (report, events) = finish(handle, &mut rx, seen).await;

    assert_eq!(report.outcome, Outcome::Complete);
    let names: Vec<_> = events
        .iter()
        .map(WizardEvent::name)
        .filter(|n| n.starts_with("postinstall:"))
        .collect();
    assert_eq!(
        names,
        vec![
            "postinstall:changes",
            "postinstall:commit:prompt",
            "postinstall:commit:generating",
            "postinstall:commit:committing",
            "postinstall:commit:success",
            "postinstall:pr:prompt",
            "postinstall:pr:generating",
            "postinstall:pr:pushing",
            "postinstall:pr:creating",
            "postinstall:pr:success",
        ]
    );
    assert_eq!(
        report.context.pr_url.as_deref(),
        Some("https://github.com/acme/shop/pull/7")
    );
    assert_eq!(
        report.context.commit_message.as_deref(),
        Some("feat: add authentication with authwright")
    );
    assert_eq!(report.context.changed_files.len(), 2);
}

#[tokio::test]
async fn test_commit_message_falls_back_to_template() {
    let mock = Arc::new(MockCollaborators {
        changes: vec!["app/page.tsx".to_string()],
        commit_message_fails: true,
        ..Default::default()
    });
    let (handle, mut rx) = start(&mock, cli_options());

    let mut seen = wait_for(&mut rx, "postinstall:commit:prompt").await;
    handle.send(MachineEvent::CommitApproved);
    seen.extend(wait_for(&mut rx, "postinstall:pr:prompt").await);
    handle.send(MachineEvent::PrDeclined);
    let (report, events) = finish(handle, &mut rx, seen).await;

    assert_eq!(report.outcome, Outcome::Complete);
    assert!(events.contains(&WizardEvent::CommitCommitting {
        message: "feat: add Next.js authentication".to_string(),
    }));
    assert!(events.contains(&WizardEvent::CommitMessageFallback {
        error: "Claude API error: overloaded".to_string(),
    }));
    assert_eq!(mock.calls("push_branch"), 0);
}

#[tokio::test]
async fn test_commit_failure_ends_post_install() {
    let mock = Arc::new(MockCollaborators {
        changes: vec!["app/page.tsx".to_string()],
        commit_fails: true,
        ..Default::default()
    });
    let (handle, mut rx) = start(&mock, cli_options());

    let seen = wait_for(&mut rx, "postinstall:commit:prompt").await;
    handle.send(MachineEvent::CommitApproved);
    let (report, events) = finish(handle, &mut rx, seen).await;

    assert_eq!(report.outcome, Outcome::Complete);
    assert_eq!(count(&events, "postinstall:commit:failed"), 1);
    assert_eq!(mock.calls("check_pr_tooling"), 0);
    assert!(events.contains(&WizardEvent::Complete {
        success: true,
        summary: Some("Done!".to_string()),
    }));
}

#[tokio::test]
async fn test_missing_pr_tooling_emits_manual_instructions() {
    let mock = Arc::new(MockCollaborators {
        changes: vec!["main.go".to_string()],
        pr_tooling: false,
        ..Default::default()
    });
    let (handle, mut rx) = start(&mock, cli_options());

    let seen = wait_for(&mut rx, "postinstall:commit:prompt").await;
    handle.send(MachineEvent::CommitApproved);
    let (report, events) = finish(handle, &mut rx, seen).await;

    assert_eq!(report.outcome, Outcome::Complete);
    assert_eq!(count(&events, "postinstall:manual"), 1);
    assert_eq!(count(&events, "postinstall:pr:prompt"), 0);
    assert_eq!(mock.calls("push_branch"), 0);
}

#[tokio::test]
async fn test_push_failure_emits_manual_instructions() {
    let mock = Arc::new(MockCollaborators {
        changes: vec!["main.go".to_string()],
        push_fails: true,
        ..Default::default()
    });
    let (handle, mut rx) = start(&mock, cli_options());

    let mut seen = wait_for(&mut rx, "postinstall:commit:prompt").await;
    handle.send(MachineEvent::CommitApproved);
    seen.extend(wait_for(&mut rx, "postinstall:pr:prompt").await);
    handle.send(MachineEvent::PrApproved);
    let (report, events) = finish(handle, &mut rx, seen).await;

    assert_eq!(report.outcome, Outcome::Complete);
    let push_failed = events
        .iter()
        .position(|e| e.name() == "postinstall:push:failed")
        .unwrap();
    let manual = events
        .iter()
        .position(|e| e.name() == "postinstall:manual")
        .unwrap();
    assert!(push_failed < manual);
    assert_eq!(mock.calls("create_pr"), 0);
    assert!(report.context.pr_url.is_none());
}

#[tokio::test]
async fn test_commit_declined_completes() {
    let mock = Arc::new(MockCollaborators {
        changes: vec!["main.go".to_string()],
        ..Default::default()
    });
    let (handle, mut rx) = start(&mock, cli_options());

    let seen = wait_for(&mut rx, "postinstall:commit:prompt").await;
    handle.send(MachineEvent::CommitDeclined);
    let (report, _) = finish(handle, &mut rx, seen).await;

    assert_eq!(report.outcome, Outcome::Complete);
    assert_eq!(mock.calls("commit_changes"), 0);
    assert_eq!(mock.calls("generate_commit_message"), 0);
}

#[tokio::test]
async fn test_cancel_while_agent_is_running() {
    let mock = Arc::new(MockCollaborators {
        agent: AgentBehavior::Hang,
        ..Default::default()
    });
    let (handle, mut rx) = start(&mock, cli_options());

    let seen = wait_for(&mut rx, "agent:start").await;
    handle.send(MachineEvent::Cancel);
    let (report, events) = finish(handle, &mut rx, seen).await;

    assert_eq!(report.outcome, Outcome::Cancelled);
    assert_eq!(count(&events, "cancelled"), 1);
    assert_eq!(count(&events, "complete"), 0);
    assert_eq!(lifecycle_count(&events), 1);
}

#[tokio::test]
async fn test_cancel_is_accepted_in_every_prompt_state() {
    let scenarios: Vec<(MockCollaborators, InstallOptions, &str)> = vec![
        (
            MockCollaborators {
                branch: BranchStatus {
                    branch: Some("main".to_string()),
                    is_protected: true,
                },
                ..Default::default()
            },
            cli_options(),
            "preparing.branch.awaitingConfirmation",
        ),
        (
            MockCollaborators {
                env_files: vec![".env".to_string()],
                ..Default::default()
            },
            bare_options(),
            "gatheringCredentials.awaitingEnvConsent",
        ),
        (
            MockCollaborators::default(),
            bare_options(),
            "gatheringCredentials.manualEntry",
        ),
        (
            MockCollaborators {
                changes: vec!["a.ts".to_string()],
                ..Default::default()
            },
            cli_options(),
            "postInstall.promptingCommit",
        ),
    ];

    for (mock, options, state) in scenarios {
        let mock = Arc::new(mock);
        let (handle, mut rx) = start(&mock, options);
        let seen = wait_for_state(&mut rx, state).await;
        handle.send(MachineEvent::Cancel);
        let (report, events) = finish(handle, &mut rx, seen).await;

        assert_eq!(report.outcome, Outcome::Cancelled, "cancel from {state}");
        assert_eq!(lifecycle_count(&events), 1, "cancel from {state}");
        assert_eq!(events.last(), Some(&WizardEvent::Cancelled));
    }
}

#[tokio::test]
async fn test_closed_inbox_cancels_idle_run() {
    let mock: Arc<dyn Collaborators> = Arc::new(MockCollaborators::default());
    let bus = EventBus::new();
    let mut rx = bus.subscribe();
    let (tx, inbox) = tokio::sync::mpsc::unbounded_channel();
    drop(tx);

    let report = Orchestrator::new(mock, bus).run(cli_options(), inbox).await;

    assert_eq!(report.outcome, Outcome::Cancelled);
    let events = drain(&mut rx);
    assert_eq!(lifecycle_count(&events), 1);
}

#[tokio::test]
async fn test_events_before_start_are_ignored() {
    let mock = Arc::new(MockCollaborators::default());
    let bus = EventBus::new();
    let mut rx = bus.subscribe();
    let collaborators: Arc<dyn Collaborators> = mock.clone();
    let handle = Orchestrator::new(collaborators, bus).spawn(cli_options());
    handle.send(MachineEvent::GitConfirmed);
    handle.send(MachineEvent::CommitApproved);
    handle.send(MachineEvent::Start);

    let (report, _) = finish(handle, &mut rx, Vec::new()).await;
    assert_eq!(report.outcome, Outcome::Complete);
    assert_eq!(mock.calls("detect_integration"), 1);
}

#[tokio::test]
async fn test_identical_mocks_produce_identical_event_streams() {
    async fn run_once() -> Vec<String> {
        let mock = Arc::new(MockCollaborators {
            changes: vec!["app/page.tsx".to_string()],
            ..Default::default()
        });
        let (handle, mut rx) = start(&mock, cli_options());
        let mut seen = wait_for(&mut rx, "postinstall:commit:prompt").await;
        handle.send(MachineEvent::CommitApproved);
        seen.extend(wait_for(&mut rx, "postinstall:pr:prompt").await);
        handle.send(MachineEvent::PrDeclined);
        let (_, events) = finish(handle, &mut rx, seen).await;
        events
            .iter()
            .map(|e| serde_json::to_string(e).unwrap())
            .collect()
    }

    let first = run_once().await;
    let second = run_once().await;
    assert_eq!(first, second);
    assert_eq!(first.iter().filter(|e| e.contains("\"agent:success\"")).count(), 1);
    assert_eq!(first.iter().filter(|e| e.contains("\"type\":\"complete\"")).count(), 1);
}

#[tokio::test]
async fn test_detection_error_is_reported_and_region_still_joins() {
    let mock = Arc::new(MockCollaborators {
        detect_fails: true,
        ..Default::default()
    });
    let (handle, mut rx) = start(&mock, cli_options());
    let (report, events) = finish(handle, &mut rx, Vec::new()).await;

    let error = events
        .iter()
        .position(|e| e.name() == "detection:error")
        .unwrap();
    let none = events.iter().position(|e| e.name() == "detection:none").unwrap();
    assert!(error < none);
    assert!(entered(&events, "preparing.detection.done"));
    assert!(entered(&events, "preparing.git.done"));
    assert!(entered(&events, "preparing.branch.done"));
    // The run only ends because no integration is known after the join.
    assert_eq!(report.outcome, Outcome::Error);
    assert!(report
        .context
        .error
        .unwrap()
        .message
        .contains("Could not detect integration"));
    assert_eq!(lifecycle_count(&events), 1);
}

#[tokio::test]
async fn test_git_check_error_is_treated_as_clean() {
    let mock = Arc::new(MockCollaborators {
        git_fails: true,
        ..Default::default()
    });
    let (handle, mut rx) = start(&mock, cli_options());
    let (report, events) = finish(handle, &mut rx, Vec::new()).await;

    assert_eq!(report.outcome, Outcome::Complete);
    assert!(events.contains(&WizardEvent::GitError {
        message: "Git operation failed: could not find repository".to_string(),
    }));
    assert_eq!(count(&events, "git:clean"), 1);
    assert_eq!(count(&events, "git:dirty"), 0);
    assert_eq!(report.context.git_is_clean, Some(true));
}

#[tokio::test]
async fn test_branch_check_error_is_treated_as_unprotected() {
    let mock = Arc::new(MockCollaborators {
        branch_fails: true,
        ..Default::default()
    });
    let (handle, mut rx) = start(&mock, cli_options());
    let (report, events) = finish(handle, &mut rx, Vec::new()).await;

    assert_eq!(report.outcome, Outcome::Complete);
    assert_eq!(count(&events, "branch:error"), 1);
    assert_eq!(count(&events, "branch:protected"), 0);
    assert!(!report.context.is_protected_branch);
    assert_eq!(mock.calls("create_branch"), 0);
}

#[tokio::test]
async fn test_env_file_detection_error_is_reported_and_falls_through() {
    let mock = Arc::new(MockCollaborators {
        env_detect_fails: true,
        stored_auth: true,
        ..Default::default()
    });
    let (handle, mut rx) = start(&mock, bare_options());
    let (report, events) = finish(handle, &mut rx, Vec::new()).await;

    assert_eq!(report.outcome, Outcome::Complete);
    assert_eq!(count(&events, "credentials:env:error"), 1);
    assert_eq!(count(&events, "credentials:env:prompt"), 0);
    assert_eq!(mock.calls("check_stored_auth"), 1);
    assert_eq!(
        report.context.credential_source(),
        Some(CredentialSource::Stored)
    );
}

#[tokio::test]
async fn test_stored_auth_error_is_reported_and_falls_through_to_device() {
    let mock = Arc::new(
        MockCollaborators {
            stored_auth_fails: true,
            ..Default::default()
        }
        .with_device(vec![DeviceBehavior::Approve]),
    );
    let (handle, mut rx) = start(&mock, bare_options());
    let (report, events) = finish(handle, &mut rx, Vec::new()).await;

    assert_eq!(report.outcome, Outcome::Complete);
    assert_eq!(count(&events, "credentials:stored:error"), 1);
    assert_eq!(mock.calls("run_device_auth"), 1);
    assert_eq!(
        report.context.credential_source(),
        Some(CredentialSource::Device)
    );
}

#[tokio::test]
async fn test_pr_description_falls_back_to_template() {
    let mock = Arc::new(MockCollaborators {
        changes: vec!["app/page.tsx".to_string()],
        pr_description_fails: true,
        ..Default::default()
    });
    let (handle, mut rx) = start(&mock, cli_options());

    let mut seen = wait_for(&mut rx, "postinstall:commit:prompt").await;
    handle.send(MachineEvent::CommitApproved);
    seen.extend(wait_for(&mut rx, "postinstall:pr:prompt").await);
    handle.send(MachineEvent::PrApproved);
    let (report, events) = finish(handle, &mut rx, seen).await;

    assert_eq!(report.outcome, Outcome::Complete);
    assert_eq!(count(&events, "postinstall:pr:fallback"), 1);
    assert_eq!(mock.calls("create_pr"), 1);
    let description = report.context.pr_description.unwrap();
    assert!(description.starts_with("## Summary\n\nAdds authentication to Next.js."));
    assert!(description.contains("- `app/page.tsx`"));
}

#[tokio::test]
async fn test_pr_creation_failure_still_completes() {
    let mock = Arc::new(MockCollaborators {
        changes: vec!["app/page.tsx".to_string()],
        create_pr_fails: true,
        ..Default::default()
    });
    let (handle, mut rx) = start(&mock, cli_options());

    let mut seen = wait_for(&mut rx, "postinstall:commit:prompt").await;
    handle.send(MachineEvent::CommitApproved);
    seen.extend(wait_for(&mut rx, "postinstall:pr:prompt").await);
    handle.send(MachineEvent::PrApproved);
    let (report, events) = finish(handle, &mut rx, seen).await;

    assert_eq!(report.outcome, Outcome::Complete);
    assert!(events.contains(&WizardEvent::PrFailed {
        error: "GitHub API error: Validation Failed".to_string(),
    }));
    assert!(entered(&events, "postInstall.done"));
    assert!(events.contains(&WizardEvent::Complete {
        success: true,
        summary: Some("Done!".to_string()),
    }));
    assert!(report.context.pr_url.is_none());
}

#[tokio::test]
async fn test_change_detection_error_is_reported() {
    let mock = Arc::new(MockCollaborators {
        changes_fail: true,
        ..Default::default()
    });
    let (handle, mut rx) = start(&mock, cli_options());
    let (report, events) = finish(handle, &mut rx, Vec::new()).await;

    assert_eq!(report.outcome, Outcome::Complete);
    assert_eq!(count(&events, "postinstall:changes:failed"), 1);
    assert_eq!(count(&events, "postinstall:manual"), 1);
    assert_eq!(mock.calls("commit_changes"), 0);
}

#[tokio::test]
async fn test_detection_finishing_after_git_confirmation_still_joins() {
    let gate = Arc::new(Notify::new());
    let mock = Arc::new(MockCollaborators {
        detect_gate: Some(gate.clone()),
        git: GitStatus {
            is_clean: false,
            files: vec!["a.ts".to_string()],
        },
        ..Default::default()
    });
    let (handle, mut rx) = start(&mock, cli_options());

    let mut seen = wait_for(&mut rx, "git:dirty").await;
    handle.send(MachineEvent::GitConfirmed);
    seen.extend(wait_for_state(&mut rx, "preparing.git.done").await);
    tokio::time::sleep(Duration::from_millis(50)).await;
    seen.extend(drain(&mut rx));
    assert!(entered(&seen, "preparing.branch.done"));
    assert!(!entered(&seen, "preparing.detection.done"));
    assert!(!entered(&seen, "gatheringCredentials"));

    gate.notify_one();
    let (report, events) = finish(handle, &mut rx, seen).await;

    assert_eq!(report.outcome, Outcome::Complete);
    let confirmed = events
        .iter()
        .position(|e| e.name() == "git:dirty:confirmed")
        .unwrap();
    let detected = events
        .iter()
        .position(|e| e.name() == "detection:complete")
        .unwrap();
    let gathering = events
        .iter()
        .position(|e| matches!(e, WizardEvent::StateEnter { state } if state == "gatheringCredentials"))
        .unwrap();
    assert!(confirmed < detected);
    assert!(detected < gathering);
    assert_eq!(mock.calls("detect_integration"), 1);
}
