//! Presentation of the wizard's event stream.
//!
//! A renderer only ever reads from the [`EventBus`](crate::events::EventBus).
//! Events that wait on the user are forwarded to the prompt task, which
//! answers them through the workflow inbox.

pub mod json;
pub mod prompt;
pub mod terminal;

use tokio::sync::{broadcast, mpsc};

use crate::error::Result;
use crate::events::WizardEvent;

pub use json::JsonLines;
pub use terminal::Terminal;

/// Output format for the event stream.
pub trait EventSink: Send {
    fn render(&mut self, event: &WizardEvent) -> Result<()>;
}

/// Whether the workflow is blocked on the user after emitting `event`.
pub fn needs_answer(event: &WizardEvent) -> bool {
    matches!(
        event,
        WizardEvent::GitDirty { .. }
            | WizardEvent::BranchProtected { .. }
            | WizardEvent::EnvPrompt { .. }
            | WizardEvent::CredentialsGathering { .. }
            | WizardEvent::CommitPrompt
            | WizardEvent::PrPrompt
    )
}

/// Render events until the run reaches a lifecycle end.
pub async fn run(
    mut events: broadcast::Receiver<WizardEvent>,
    mut sink: Box<dyn EventSink>,
    prompts: mpsc::UnboundedSender<WizardEvent>,
) -> Result<()> {
    loop {
        match events.recv().await {
            Ok(event) => {
                sink.render(&event)?;
                if needs_answer(&event) && prompts.send(event.clone()).is_err() {
                    tracing::warn!(event = event.name(), "Prompt task is gone");
                }
                if event.is_terminal() {
                    return Ok(());
                }
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Renderer fell behind, events dropped");
            }
            Err(broadcast::error::RecvError::Closed) => {
                tracing::debug!("Event bus closed");
                return Ok(());
            }
        }
    }
}
