use tokio::signal;
use tokio::sync::mpsc;

use crate::workflow::MachineEvent;

/// Wait for an interrupt (SIGINT or SIGTERM).
///
/// If a handler cannot be installed the corresponding signal is never
/// reported, so the future stays pending.
pub async fn wait_for_interrupt() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, cancelling...");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, cancelling...");
        }
    }
}

/// Turn the first interrupt into a `CANCEL` for the running workflow.
pub async fn cancel_on_interrupt(inbox: mpsc::UnboundedSender<MachineEvent>) {
    wait_for_interrupt().await;
    if inbox.send(MachineEvent::Cancel).is_err() {
        tracing::debug!("Workflow already finished");
    }
}
