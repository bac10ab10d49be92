use async_trait::async_trait;
use reqwest::{RequestBuilder, StatusCode};
use serde::Deserialize;

use super::status_and_body;
use crate::directory::{AccountKind, DirectoryError, DirectoryLookup, Resolution};

#[derive(Deserialize)]
struct ResolveBody {
    kind: AccountKind,
}

/// Telegram directory bridge: resolves usernames through a user session
/// held by a separate service.
pub struct HttpDirectory {
    base_url: String,
    token: Option<String>,
    http: reqwest::Client,
}

impl HttpDirectory {
    pub fn new(http: reqwest::Client, base_url: &str, token: Option<String>) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
            http,
        }
    }

    fn get(&self, path: &str) -> RequestBuilder {
        let req = self.http.get(format!("{}{}", self.base_url, path));
        match &self.token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }
}

#[async_trait]
impl DirectoryLookup for HttpDirectory {
    async fn resolve(&self, username: &str) -> Result<Resolution, DirectoryError> {
        let resp = self.get(&format!("/resolve/{username}")).send().await?;
        match resp.status() {
            StatusCode::OK => {
                let body: ResolveBody = resp.json().await?;
                Ok(Resolution::Found(body.kind))
            }
            StatusCode::NOT_FOUND => Ok(Resolution::NotFound),
            StatusCode::TOO_MANY_REQUESTS => Ok(Resolution::RateLimited),
            _ => {
                let (status, body) = status_and_body(resp).await;
                Err(DirectoryError::Status { status, body })
            }
        }
    }

    async fn search(&self, username: &str) -> Result<Vec<String>, DirectoryError> {
        let resp = self
            .get("/search")
            .query(&[("q", username)])
            .send()
            .await?;
        match resp.status() {
            StatusCode::OK => Ok(resp.json().await?),
            StatusCode::TOO_MANY_REQUESTS => Err(DirectoryError::RateLimited),
            _ => {
                let (status, body) = status_and_body(resp).await;
                Err(DirectoryError::Status { status, body })
            }
        }
    }
}
