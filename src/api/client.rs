use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::workflow::context::Credentials;

const USER_AGENT: &str = concat!("authwright/", env!("CARGO_PKG_VERSION"));

/// Client for the authentication service's CLI endpoints.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder().user_agent(USER_AGENT).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    pub(crate) fn http(&self) -> &Client {
        &self.client
    }

    /// Whether the service still accepts `access_token`.
    pub async fn verify_session(&self, access_token: &str) -> Result<bool> {
        let response = self
            .client
            .get(self.url("/v1/cli/session"))
            .bearer_auth(access_token)
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => Ok(true),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Ok(false),
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(AppError::Api(format!("Session check returned {status}: {body}")))
            }
        }
    }

    /// Fetch the client id and API key of the user's default application.
    pub async fn fetch_credentials(&self, access_token: &str) -> Result<Credentials> {
        let response = self
            .client
            .get(self.url("/v1/cli/credentials"))
            .bearer_auth(access_token)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Api(format!(
                "Credential fetch returned {status}: {body}"
            )));
        }

        let body = response.json::<CredentialsResponse>().await?;
        if body.client_id.trim().is_empty() {
            return Err(AppError::Api("Credential response had no client id".to_string()));
        }
        Ok(Credentials {
            client_id: body.client_id,
            api_key: body.api_key.filter(|k| !k.is_empty()),
        })
    }

    /// Register a redirect URI. Already-registered URIs are not an error.
    pub async fn register_redirect_uri(
        &self,
        access_token: &str,
        client_id: &str,
        uri: &str,
    ) -> Result<()> {
        let response = self
            .client
            .post(self.url("/v1/cli/redirect-uris"))
            .bearer_auth(access_token)
            .json(&RedirectUriRequest { client_id, uri })
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => Ok(()),
            StatusCode::CONFLICT => {
                tracing::debug!(uri, "Redirect URI already registered");
                Ok(())
            }
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(AppError::Api(format!(
                    "Redirect URI registration returned {status}: {body}"
                )))
            }
        }
    }
}

#[derive(Deserialize)]
struct CredentialsResponse {
    client_id: String,
    #[serde(default)]
    api_key: Option<String>,
}

#[derive(Serialize)]
struct RedirectUriRequest<'a> {
    client_id: &'a str,
    uri: &'a str,
}
