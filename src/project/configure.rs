use crate::api::ApiClient;
use crate::collaborators::types::ConfigureRequest;
use crate::error::Result;
use crate::project::env_files;
use crate::workflow::context::Integration;

pub const API_KEY_VAR: &str = "AUTHWRIGHT_API_KEY";
pub const REDIRECT_URI_VAR: &str = "AUTHWRIGHT_REDIRECT_URI";

/// Environment variable the SDK reads the client id from. Browser bundlers
/// only expose prefixed variables.
pub fn client_id_var(integration: Integration) -> &'static str {
    match integration {
        Integration::Nextjs => "NEXT_PUBLIC_AUTHWRIGHT_CLIENT_ID",
        Integration::React | Integration::VanillaJs => "VITE_AUTHWRIGHT_CLIENT_ID",
        _ => "AUTHWRIGHT_CLIENT_ID",
    }
}

/// Write the resolved credentials into the project's env file and, when a
/// session is available, register the default redirect URI remotely.
/// Only the local write can fail the call.
pub async fn configure(
    request: &ConfigureRequest,
    remote: Option<(&ApiClient, &str)>,
) -> Result<()> {
    let integration = request.integration;
    let path = request.install_dir.join(integration.env_file());
    let redirect_uri = integration.default_redirect_uri();

    let mut entries = vec![
        (client_id_var(integration), request.credentials.client_id.as_str()),
        (REDIRECT_URI_VAR, redirect_uri),
    ];
    if integration.requires_api_key() {
        if let Some(api_key) = request.credentials.api_key.as_deref() {
            entries.push((API_KEY_VAR, api_key));
        }
    }

    env_files::upsert(&path, &entries).await?;
    tracing::info!(file = %path.display(), "Wrote credentials to env file");

    match remote {
        Some((api, token)) => {
            match api
                .register_redirect_uri(token, &request.credentials.client_id, redirect_uri)
                .await
            {
                Ok(()) => tracing::info!(uri = redirect_uri, "Registered redirect URI"),
                // The env file is what the app needs; the URI can be added later.
                Err(e) => tracing::warn!(uri = redirect_uri, error = %e, "Redirect URI registration failed"),
            }
        }
        None => tracing::debug!("No session, skipping redirect URI registration"),
    }
    Ok(())
}
