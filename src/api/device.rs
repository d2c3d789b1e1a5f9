//! OAuth 2.0 device authorization grant (RFC 8628).

use std::time::Duration;

use reqwest::StatusCode;
use serde::Deserialize;

use crate::api::client::ApiClient;
use crate::api::session::Session;
use crate::error::{AppError, Result};
use crate::workflow::context::DeviceAuthGrant;

const DEVICE_CODE_GRANT: &str = "urn:ietf:params:oauth:grant-type:device_code";
const DEFAULT_INTERVAL_SECS: u64 = 5;
const SLOW_DOWN_STEP_SECS: u64 = 5;
const MIN_INTERVAL_SECS: u64 = 1;

#[derive(Debug, Clone, Deserialize)]
pub struct DeviceAuthorization {
    pub device_code: String,
    pub user_code: String,
    pub verification_uri: String,
    #[serde(default)]
    pub verification_uri_complete: Option<String>,
    pub expires_in: u64,
    #[serde(default)]
    pub interval: Option<u64>,
}

impl DeviceAuthorization {
    pub fn grant(&self) -> DeviceAuthGrant {
        DeviceAuthGrant {
            verification_uri: self.verification_uri.clone(),
            verification_uri_complete: self
                .verification_uri_complete
                .clone()
                .unwrap_or_else(|| {
                    format!(
                        "{}?user_code={}",
                        self.verification_uri,
                        urlencoding::encode(&self.user_code)
                    )
                }),
            user_code: self.user_code.clone(),
        }
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

#[derive(Deserialize)]
struct TokenError {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

#[derive(Debug, PartialEq, Eq)]
enum PollStatus {
    Granted(String, Option<u64>),
    Pending,
    SlowDown,
    Denied,
    Expired,
    Failed(String),
}

fn classify(status: StatusCode, body: &str) -> PollStatus {
    if status.is_success() {
        return match serde_json::from_str::<TokenResponse>(body) {
            Ok(token) => PollStatus::Granted(token.access_token, token.expires_in),
            Err(e) => PollStatus::Failed(format!("Malformed token response: {e}")),
        };
    }

    match serde_json::from_str::<TokenError>(body) {
        Ok(err) => match err.error.as_str() {
            "authorization_pending" => PollStatus::Pending,
            "slow_down" => PollStatus::SlowDown,
            "access_denied" => PollStatus::Denied,
            "expired_token" => PollStatus::Expired,
            other => PollStatus::Failed(match err.error_description {
                Some(description) => format!("{other}: {description}"),
                None => other.to_string(),
            }),
        },
        Err(_) => PollStatus::Failed(format!("Token endpoint returned {status}: {body}")),
    }
}

/// Request a device code for `client_id`.
pub async fn authorize(api: &ApiClient, client_id: &str) -> Result<DeviceAuthorization> {
    let response = api
        .http()
        .post(api.url("/oauth/device/authorize"))
        .form(&[("client_id", client_id), ("scope", "openid profile")])
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(AppError::DeviceAuth(format!(
            "Authorization request returned {status}: {body}"
        )));
    }
    Ok(response.json::<DeviceAuthorization>().await?)
}

impl DeviceAuthorization {
    /// Seconds between polls. A server-sent `0` would spin, so never go
    /// below one second.
    pub fn poll_interval(&self) -> Duration {
        let secs = self.interval.unwrap_or(DEFAULT_INTERVAL_SECS);
        Duration::from_secs(secs.max(MIN_INTERVAL_SECS))
    }
}

/// Poll the token endpoint until the user approves, denies, or time runs out.
pub async fn poll_for_token(
    api: &ApiClient,
    client_id: &str,
    authorization: &DeviceAuthorization,
    timeout: Duration,
) -> Result<Session> {
    let timeout = timeout.min(Duration::from_secs(authorization.expires_in));
    let deadline = tokio::time::Instant::now() + timeout;
    let mut interval = authorization.poll_interval();

    loop {
        tokio::time::sleep(interval).await;
        if tokio::time::Instant::now() >= deadline {
            return Err(AppError::DeviceAuthExpired);
        }

        let response = api
            .http()
            .post(api.url("/oauth/token"))
            .form(&[
                ("grant_type", DEVICE_CODE_GRANT),
                ("device_code", authorization.device_code.as_str()),
                ("client_id", client_id),
            ])
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        match classify(status, &body) {
            PollStatus::Granted(token, expires_in) => {
                tracing::info!("Device authorization approved");
                return Ok(Session::new(token, expires_in));
            }
            PollStatus::Pending => tracing::debug!("Authorization pending"),
            PollStatus::SlowDown => {
                interval += Duration::from_secs(SLOW_DOWN_STEP_SECS);
                tracing::debug!(interval_secs = interval.as_secs(), "Slowing down polling");
            }
            PollStatus::Denied => {
                return Err(AppError::DeviceAuth("Authorization was denied".to_string()));
            }
            PollStatus::Expired => return Err(AppError::DeviceAuthExpired),
            PollStatus::Failed(message) => return Err(AppError::DeviceAuth(message)),
        }
    }
}

/// Full flow: request a code, hand it to `on_code` for display, then poll.
pub async fn run<F>(
    api: &ApiClient,
    client_id: &str,
    timeout: Duration,
    on_code: F,
) -> Result<(DeviceAuthGrant, Session)>
where
    F: FnOnce(&DeviceAuthGrant),
{
    let authorization = authorize(api, client_id).await?;
    let grant = authorization.grant();
    on_code(&grant);
    let session = poll_for_token(api, client_id, &authorization, timeout).await?;
    Ok((grant, session))
}
