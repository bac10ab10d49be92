use std::{sync::Arc, time::Duration};

use reqwest::{StatusCode, header};
use serde_json::{Value, json};
use thiserror::Error;
use tokio::{sync::Mutex, time::MissedTickBehavior};
use tracing::{debug, error, info};

use crate::infra::{task::TaskHandle, text::truncate_chars};

/// Response fields that may carry the bearer token, in order of preference.
pub const TOKEN_FIELDS: [&str; 3] = ["access_token", "token", "accessToken"];

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("token request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("token endpoint returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("token endpoint returned a non-JSON body")]
    InvalidBody,
    #[error("token response carries none of access_token/token/accessToken: {0}")]
    MissingToken(String),
}

#[derive(Clone)]
pub struct ApiCredentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for ApiCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiCredentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Holds the single bearer token for the fulfillment API.
///
/// Every read and write of the token goes through `slot`. A fetch holds the
/// lock for its whole duration, so concurrent callers wait for one fetch
/// instead of issuing their own.
#[derive(Debug)]
pub struct TokenManager {
    http: reqwest::Client,
    token_url: String,
    credentials: ApiCredentials,
    slot: Mutex<Option<String>>,
}

impl TokenManager {
    pub fn new(http: reqwest::Client, api_base: &str, credentials: ApiCredentials) -> Self {
        Self {
            http,
            token_url: format!("{}/token", api_base.trim_end_matches('/')),
            credentials,
            slot: Mutex::new(None),
        }
    }

    /// Returns the cached token, fetching one first if none is cached.
    pub async fn ensure_token(&self) -> Result<String, AuthError> {
        let mut slot = self.slot.lock().await;
        if let Some(token) = slot.as_ref() {
            return Ok(token.clone());
        }
        let token = self.fetch().await?;
        info!("Obtained fulfillment API bearer token");
        *slot = Some(token.clone());
        Ok(token)
    }

    /// Fetches a fresh token and replaces the cached one. On failure the
    /// previous token stays in place.
    pub async fn refresh_token(&self) -> Result<(), AuthError> {
        let mut slot = self.slot.lock().await;
        match self.fetch().await {
            Ok(token) => {
                *slot = Some(token);
                info!("Fulfillment API token refreshed");
                Ok(())
            }
            Err(err) => {
                error!(error = %err, "Failed to refresh fulfillment API token");
                Err(err)
            }
        }
    }

    #[cfg(test)]
    pub(crate) async fn install(&self, token: &str) {
        *self.slot.lock().await = Some(token.to_string());
    }

    async fn fetch(&self) -> Result<String, AuthError> {
        let resp = self
            .http
            .post(&self.token_url)
            .header(header::ACCEPT, "application/json")
            .json(&json!({
                "username": self.credentials.username,
                "password": self.credentials.password,
            }))
            .send()
            .await?;

        let status = resp.status();
        let body = resp.text().await?;
        if status != StatusCode::OK {
            return Err(AuthError::Status {
                status: status.as_u16(),
                body: truncate_chars(&body, 300),
            });
        }

        let value: Value = serde_json::from_str(&body).map_err(|_| AuthError::InvalidBody)?;
        extract_token(&value)
            .ok_or_else(|| AuthError::MissingToken(truncate_chars(&value.to_string(), 300)))
    }
}

fn extract_token(value: &Value) -> Option<String> {
    TOKEN_FIELDS.iter().find_map(|field| {
        value
            .get(field)
            .and_then(Value::as_str)
            .filter(|token| !token.is_empty())
            .map(str::to_string)
    })
}

/// Refreshes the token every `every`, independent of in-flight requests.
pub fn spawn_refresher(tokens: Arc<TokenManager>, every: Duration) -> TaskHandle {
    TaskHandle::spawn(move |mut stop_rx| async move {
        let start = tokio::time::Instant::now() + every;
        let mut ticker = tokio::time::interval_at(start, every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    // failures are logged by refresh_token; the old token stays usable
                    let _ = tokens.refresh_token().await;
                }
                _ = stop_rx.changed() => break,
            }
        }
        debug!("Token refresher stopped");
    })
}
