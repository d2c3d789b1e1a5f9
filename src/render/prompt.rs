use std::io::Write;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, Lines};
use tokio::sync::mpsc;

use crate::error::Result;
use crate::events::WizardEvent;
use crate::workflow::MachineEvent;

/// How prompts are answered.
pub enum Answerer<R, W> {
    /// `--yes`: accept every default that keeps the run going.
    AssumeYes,
    Interactive(Prompter<R, W>),
}

/// Answer for unattended runs. Manual credential entry cannot be automated
/// and cancels.
pub fn assume_yes(event: &WizardEvent) -> Option<MachineEvent> {
    let reply = match event {
        WizardEvent::GitDirty { .. } => MachineEvent::GitConfirmed,
        WizardEvent::BranchProtected { .. } => MachineEvent::BranchCreate,
        WizardEvent::EnvPrompt { .. } => MachineEvent::EnvScanApproved,
        WizardEvent::CredentialsGathering { .. } => {
            tracing::warn!("Credentials need manual entry, which --yes cannot answer");
            MachineEvent::Cancel
        }
        WizardEvent::CommitPrompt => MachineEvent::CommitApproved,
        WizardEvent::PrPrompt => MachineEvent::PrApproved,
        _ => return None,
    };
    Some(reply)
}

/// Line-based questions on `input`, asked on `out`.
pub struct Prompter<R, W> {
    lines: Lines<R>,
    out: W,
}

impl<R: AsyncBufRead + Unpin, W: Write> Prompter<R, W> {
    pub fn new(input: R, out: W) -> Self {
        Self {
            lines: input.lines(),
            out,
        }
    }

    /// `None` once input is exhausted.
    async fn ask(&mut self, question: &str) -> Result<Option<String>> {
        write!(self.out, "{question}")?;
        self.out.flush()?;
        Ok(self
            .lines
            .next_line()
            .await?
            .map(|line| line.trim().to_string()))
    }

    async fn confirm(&mut self, question: &str, default: bool) -> Result<Option<bool>> {
        let hint = if default { "[Y/n]" } else { "[y/N]" };
        loop {
            let Some(answer) = self.ask(&format!("{question} {hint} ")).await? else {
                return Ok(None);
            };
            match answer.to_ascii_lowercase().as_str() {
                "" => return Ok(Some(default)),
                "y" | "yes" => return Ok(Some(true)),
                "n" | "no" => return Ok(Some(false)),
                _ => continue,
            }
        }
    }

    async fn confirm_event(
        &mut self,
        question: &str,
        default: bool,
        yes: MachineEvent,
        no: MachineEvent,
    ) -> Result<MachineEvent> {
        Ok(match self.confirm(question, default).await? {
            Some(true) => yes,
            Some(false) => no,
            None => MachineEvent::Cancel,
        })
    }

    async fn branch_choice(&mut self, branch: &str) -> Result<MachineEvent> {
        let question =
            format!("Create a new branch? [C]reate / [k]eep working on `{branch}` / [q]uit ");
        loop {
            let Some(answer) = self.ask(&question).await? else {
                return Ok(MachineEvent::Cancel);
            };
            match answer.to_ascii_lowercase().as_str() {
                "" | "c" | "create" => return Ok(MachineEvent::BranchCreate),
                "k" | "keep" => return Ok(MachineEvent::BranchContinue),
                "q" | "quit" => return Ok(MachineEvent::BranchCancel),
                _ => continue,
            }
        }
    }

    async fn credentials(&mut self, requires_api_key: bool) -> Result<MachineEvent> {
        let Some(client_id) = self
            .ask("Client id (or `login` to sign in with the browser): ")
            .await?
        else {
            return Ok(MachineEvent::Cancel);
        };
        if client_id.eq_ignore_ascii_case("login") {
            return Ok(MachineEvent::RetryAuth);
        }

        let api_key = if requires_api_key {
            match self.ask("API key: ").await? {
                Some(key) => key,
                None => return Ok(MachineEvent::Cancel),
            }
        } else {
            String::new()
        };
        Ok(MachineEvent::CredentialsSubmitted { client_id, api_key })
    }

    pub async fn answer(&mut self, event: &WizardEvent) -> Result<Option<MachineEvent>> {
        let reply = match event {
            WizardEvent::GitDirty { .. } => {
                self.confirm_event(
                    "Continue with uncommitted changes?",
                    false,
                    MachineEvent::GitConfirmed,
                    MachineEvent::GitCancelled,
                )
                .await?
            }
            WizardEvent::BranchProtected { branch } => self.branch_choice(branch).await?,
            WizardEvent::EnvPrompt { files } => {
                self.confirm_event(
                    &format!("Look for existing credentials in {}?", files.join(", ")),
                    true,
                    MachineEvent::EnvScanApproved,
                    MachineEvent::EnvScanDeclined,
                )
                .await?
            }
            WizardEvent::CredentialsGathering { requires_api_key } => {
                self.credentials(*requires_api_key).await?
            }
            WizardEvent::CommitPrompt => {
                self.confirm_event(
                    "Commit these changes?",
                    true,
                    MachineEvent::CommitApproved,
                    MachineEvent::CommitDeclined,
                )
                .await?
            }
            WizardEvent::PrPrompt => {
                self.confirm_event(
                    "Push the branch and open a pull request?",
                    true,
                    MachineEvent::PrApproved,
                    MachineEvent::PrDeclined,
                )
                .await?
            }
            _ => return Ok(None),
        };
        Ok(Some(reply))
    }
}

/// Answer forwarded prompts one at a time until either channel closes.
pub async fn run<R, W>(
    mut prompts: mpsc::UnboundedReceiver<WizardEvent>,
    mut answerer: Answerer<R, W>,
    inbox: mpsc::UnboundedSender<MachineEvent>,
) where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    while let Some(event) = prompts.recv().await {
        let reply = match &mut answerer {
            Answerer::AssumeYes => assume_yes(&event),
            Answerer::Interactive(prompter) => match prompter.answer(&event).await {
                Ok(reply) => reply,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to read answer, cancelling");
                    Some(MachineEvent::Cancel)
                }
            },
        };
        if let Some(reply) = reply {
            tracing::debug!(prompt = event.name(), reply = reply.name(), "Answered prompt");
            if inbox.send(reply).is_err() {
                return;
            }
        }
    }
}
