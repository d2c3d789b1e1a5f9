//! The credential resolution waterfall.
//!
//! Steps run strictly in order: CLI flags, local env files (with consent),
//! cached session, device authorization, remote fetch, manual entry. Every
//! failure falls through to the next step; only manual entry can loop back
//! (to device authorization, on `RETRY_AUTH`).

use crate::error::AppError;
use crate::events::WizardEvent;
use crate::workflow::context::{CredentialSource, Credentials, WorkflowError};
use crate::workflow::machine::{Completion, Machine};
use crate::workflow::state::{CredentialStep, State};
use crate::workflow::MachineEvent;

impl Machine {
    fn credential_step(&self) -> Option<CredentialStep> {
        match &self.state {
            State::GatheringCredentials(step) => Some(*step),
            _ => None,
        }
    }

    fn advance_credentials(&mut self, step: CredentialStep) {
        self.state = State::GatheringCredentials(step);
        self.enter_credential_step(step);
    }

    /// Entry actions of each waterfall step.
    pub(super) fn enter_credential_step(&mut self, step: CredentialStep) {
        self.enter_substate(format!("gatheringCredentials.{}", step.name()));

        match step {
            CredentialStep::CheckingFlags => match self.credentials_from_flags() {
                Some(credentials) => self.resolve(credentials, CredentialSource::Cli),
                None => self.advance_credentials(CredentialStep::DetectingEnvFiles),
            },
            CredentialStep::DetectingEnvFiles => {
                let dir = self.ctx.options.install_dir.clone();
                self.invoke(
                    |c| async move { c.detect_env_files(dir).await },
                    Completion::EnvFiles,
                );
            }
            CredentialStep::AwaitingEnvConsent => {
                self.emit(WizardEvent::EnvPrompt {
                    files: self.ctx.env_files_detected.clone(),
                });
            }
            CredentialStep::ScanningEnv => {
                self.emit(WizardEvent::EnvScanning);
                let dir = self.ctx.options.install_dir.clone();
                self.invoke(
                    |c| async move { c.scan_env_files(dir).await },
                    Completion::EnvScanned,
                );
            }
            CredentialStep::CheckingStoredAuth => {
                self.invoke(
                    |c| async move { c.check_stored_auth().await },
                    Completion::StoredAuth,
                );
            }
            CredentialStep::DeviceAuth => {
                let bus = self.bus.clone();
                self.invoke(
                    |c| async move { c.run_device_auth(bus).await },
                    Completion::DeviceAuth,
                );
            }
            CredentialStep::FetchingRemote(_) => {
                self.emit(WizardEvent::StagingFetching);
                self.invoke(
                    |c| async move { c.fetch_remote_credentials().await },
                    Completion::RemoteCredentials,
                );
            }
            CredentialStep::ManualEntry => {
                self.emit(WizardEvent::CredentialsGathering {
                    requires_api_key: self.ctx.requires_api_key(),
                });
            }
        }
    }

    fn credentials_from_flags(&self) -> Option<Credentials> {
        let options = &self.ctx.options;
        let client_id = options.client_id.as_deref().filter(|s| !s.trim().is_empty())?;
        let api_key = options.api_key.as_deref().filter(|s| !s.trim().is_empty());
        if api_key.is_none() && self.ctx.requires_api_key() {
            return None;
        }
        Some(Credentials {
            client_id: client_id.to_string(),
            api_key: api_key.map(str::to_string),
        })
    }

    /// Exit the waterfall. Credentials are write-once per run.
    fn resolve(&mut self, credentials: Credentials, source: CredentialSource) {
        if !self.ctx.resolve_credentials(credentials, source) {
            self.fail(WorkflowError::new("Credentials were resolved twice"));
            return;
        }
        tracing::info!(source = ?source, "Credentials resolved");
        self.emit(WizardEvent::CredentialsFound { source });
        self.transition(State::Configuring);
    }

    /// Keep the failure around for display without ending the run.
    fn record_fallthrough(&mut self, prefix: &str, error: &AppError) {
        tracing::warn!(error = %error, "{prefix}");
        self.ctx.error = Some(WorkflowError::from_error(prefix, error));
    }

    pub(super) fn on_credentials_event(&mut self, event: MachineEvent) -> bool {
        let Some(step) = self.credential_step() else {
            return false;
        };

        match (step, event) {
            (CredentialStep::AwaitingEnvConsent, MachineEvent::EnvScanApproved) => {
                self.advance_credentials(CredentialStep::ScanningEnv);
            }
            (CredentialStep::AwaitingEnvConsent, MachineEvent::EnvScanDeclined) => {
                tracing::info!("Env file scan declined");
                self.advance_credentials(CredentialStep::CheckingStoredAuth);
            }
            (
                CredentialStep::ManualEntry,
                MachineEvent::CredentialsSubmitted { client_id, api_key },
            ) => {
                let client_id = client_id.trim().to_string();
                let api_key = Some(api_key.trim().to_string()).filter(|k| !k.is_empty());
                if client_id.is_empty() || (api_key.is_none() && self.ctx.requires_api_key()) {
                    tracing::warn!("Incomplete credentials submitted, asking again");
                    self.enter_credential_step(CredentialStep::ManualEntry);
                } else {
                    self.resolve(Credentials { client_id, api_key }, CredentialSource::Manual);
                }
            }
            (CredentialStep::ManualEntry, MachineEvent::RetryAuth) => {
                self.advance_credentials(CredentialStep::DeviceAuth);
            }
            _ => return false,
        }
        true
    }

    pub(super) fn on_credentials_completion(&mut self, completion: Completion) -> Option<Completion> {
        let Some(step) = self.credential_step() else {
            return Some(completion);
        };

        match (step, completion) {
            (CredentialStep::DetectingEnvFiles, Completion::EnvFiles(result)) => match result {
                Ok(probe) if probe.exists && !probe.files.is_empty() => {
                    self.ctx.env_files_detected = probe.files.clone();
                    self.emit(WizardEvent::EnvDetected { files: probe.files });
                    self.advance_credentials(CredentialStep::AwaitingEnvConsent);
                }
                Ok(_) => self.advance_credentials(CredentialStep::CheckingStoredAuth),
                Err(e) => {
                    tracing::warn!(error = %e, "Env file detection failed");
                    self.emit(WizardEvent::EnvError {
                        message: e.to_string(),
                    });
                    self.advance_credentials(CredentialStep::CheckingStoredAuth);
                }
            },
            (CredentialStep::ScanningEnv, Completion::EnvScanned(result)) => {
                let requires_api_key = self.ctx.requires_api_key();
                match result {
                    Ok(scan)
                        if scan.found
                            && scan.client_id.is_some()
                            && (scan.api_key.is_some() || !requires_api_key) =>
                    {
                        let source_path = scan.source_path.unwrap_or_default();
                        self.ctx.env_credential_path = Some(source_path.clone());
                        self.emit(WizardEvent::EnvFound { source_path });
                        let credentials = Credentials {
                            client_id: scan.client_id.unwrap_or_default(),
                            api_key: scan.api_key,
                        };
                        self.resolve(credentials, CredentialSource::Env);
                    }
                    Ok(_) => {
                        self.emit(WizardEvent::EnvNotFound);
                        self.advance_credentials(CredentialStep::CheckingStoredAuth);
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Env file scan failed");
                        self.emit(WizardEvent::EnvError {
                            message: e.to_string(),
                        });
                        self.emit(WizardEvent::EnvNotFound);
                        self.advance_credentials(CredentialStep::CheckingStoredAuth);
                    }
                }
            }
            (CredentialStep::CheckingStoredAuth, Completion::StoredAuth(result)) => match result {
                Ok(true) => self.advance_credentials(CredentialStep::FetchingRemote(
                    CredentialSource::Stored,
                )),
                Ok(false) => self.advance_credentials(CredentialStep::DeviceAuth),
                Err(e) => {
                    tracing::warn!(error = %e, "Stored session check failed");
                    self.emit(WizardEvent::StoredAuthError {
                        message: e.to_string(),
                    });
                    self.advance_credentials(CredentialStep::DeviceAuth);
                }
            },
            (CredentialStep::DeviceAuth, Completion::DeviceAuth(result)) => match result {
                Ok(grant) => {
                    self.ctx.device_auth = Some(grant);
                    self.emit(WizardEvent::DeviceSuccess);
                    self.advance_credentials(CredentialStep::FetchingRemote(
                        CredentialSource::Device,
                    ));
                }
                Err(AppError::DeviceAuthExpired) => {
                    self.record_fallthrough("Device authorization", &AppError::DeviceAuthExpired);
                    self.emit(WizardEvent::DeviceTimeout);
                    self.advance_credentials(CredentialStep::ManualEntry);
                }
                Err(e) => {
                    self.record_fallthrough("Device authorization failed", &e);
                    self.emit(WizardEvent::DeviceError {
                        message: e.to_string(),
                    });
                    self.advance_credentials(CredentialStep::ManualEntry);
                }
            },
            (CredentialStep::FetchingRemote(source), Completion::RemoteCredentials(result)) => {
                match result {
                    Ok(credentials) => {
                        self.emit(WizardEvent::StagingSuccess);
                        self.resolve(credentials, source);
                    }
                    Err(e) => {
                        self.record_fallthrough("Failed to fetch credentials", &e);
                        self.emit(WizardEvent::StagingError {
                            message: e.to_string(),
                        });
                        self.advance_credentials(CredentialStep::ManualEntry);
                    }
                }
            }
            (_, other) => return Some(other),
        }
        None
    }
}
