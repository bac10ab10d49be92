use std::sync::Arc;

use reqwest::{StatusCode, header};
use serde_json::{Value, json};
use thiserror::Error;
use tracing::{error, warn};

use super::token::{AuthError, TokenManager};
use crate::infra::text::truncate_chars;

pub const MSG_AUTH_FAILURE: &str =
    "Ошибка авторизации сервиса. Мы разберёмся и при необходимости сделаем возврат.";
pub const MSG_OVERLOADED: &str =
    "Сервис перегружен. Попробуйте чуть позже, при необходимости оформим возврат.";
pub const MSG_SERVICE_TROUBLE: &str =
    "У сервиса неполадки. Попробуйте позже, средства вернём по запросу.";
pub const MSG_REJECTED: &str = "Запрос отклонён сервисом.";
pub const MSG_PURCHASE_FAILED: &str = "Не удалось купить звёзды.";
pub const MSG_UNAVAILABLE: &str = "Сервис временно недоступен.";

const TECH_DETAIL_LIMIT: usize = 180;

#[derive(Debug, Error)]
enum FulfillmentError {
    #[error("{0}")]
    Auth(#[from] AuthError),
    #[error("purchase request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

/// What a purchase attempt produced. `message` is always safe to show the buyer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurchaseOutcome {
    pub success: bool,
    pub message: String,
    pub status: u16,
}

impl PurchaseOutcome {
    fn failed(message: impl Into<String>, status: u16) -> Self {
        Self {
            success: false,
            message: message.into(),
            status,
        }
    }
}

pub struct FulfillmentClient {
    http: reqwest::Client,
    buy_url: String,
    tokens: Arc<TokenManager>,
}

impl FulfillmentClient {
    pub fn new(http: reqwest::Client, api_base: &str, tokens: Arc<TokenManager>) -> Self {
        Self {
            http,
            buy_url: format!("{}/buyStars", api_base.trim_end_matches('/')),
            tokens,
        }
    }

    /// Buys `quantity` stars for `username`.
    ///
    /// An authorization rejection (401/403) triggers one token refresh and one
    /// retry. Only HTTP 200 counts as success.
    pub async fn purchase(&self, username: &str, quantity: u32) -> PurchaseOutcome {
        let body = json!({
            "username": username.trim_start_matches('@'),
            "quantity": quantity,
        });

        match self.post_authorized(&body).await {
            Ok((status, text)) if status == StatusCode::OK => PurchaseOutcome {
                success: true,
                message: if text.is_empty() { "OK".to_string() } else { text },
                status: 200,
            },
            Ok((status, text)) => {
                PurchaseOutcome::failed(friendly_api_error(status.as_u16(), &text), status.as_u16())
            }
            Err(FulfillmentError::Auth(err)) => {
                error!(error = %err, "Cannot obtain fulfillment API token");
                PurchaseOutcome::failed(MSG_AUTH_FAILURE, 0)
            }
            Err(err) => {
                error!(error = %err, "Purchase request failed");
                PurchaseOutcome::failed(MSG_UNAVAILABLE, 0)
            }
        }
    }

    async fn post_authorized(&self, body: &Value) -> Result<(StatusCode, String), FulfillmentError> {
        let token = self.tokens.ensure_token().await?;
        let mut resp = self.post(&token, body).await?;

        if matches!(resp.status(), StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
            warn!(
                status = resp.status().as_u16(),
                "Fulfillment API rejected the token, refreshing and retrying once"
            );
            // a failed refresh is logged and leaves the old token for the retry
            let _ = self.tokens.refresh_token().await;
            let token = self.tokens.ensure_token().await?;
            resp = self.post(&token, body).await?;
        }

        let status = resp.status();
        let text = resp.text().await?;
        Ok((status, text))
    }

    async fn post(&self, token: &str, body: &Value) -> Result<reqwest::Response, reqwest::Error> {
        self.http
            .post(&self.buy_url)
            .header(header::ACCEPT, "application/json")
            .bearer_auth(token)
            .json(body)
            .send()
            .await
    }
}

/// Maps a non-success response to text the buyer can be shown.
pub fn friendly_api_error(status: u16, body: &str) -> String {
    match status {
        401 | 403 => MSG_AUTH_FAILURE.to_string(),
        429 => MSG_OVERLOADED.to_string(),
        500.. => MSG_SERVICE_TROUBLE.to_string(),
        400.. => match technical_detail(body) {
            Some(detail) => format!(
                "Запрос отклонён сервисом: {}",
                truncate_chars(&detail, TECH_DETAIL_LIMIT)
            ),
            None => MSG_REJECTED.to_string(),
        },
        _ => MSG_PURCHASE_FAILED.to_string(),
    }
}

fn technical_detail(body: &str) -> Option<String> {
    let from_json = serde_json::from_str::<Value>(body).ok().and_then(|value| {
        ["message", "detail", "error"].iter().find_map(|field| {
            value
                .get(field)
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|text| !text.is_empty())
                .map(str::to_string)
        })
    });
    from_json
        .or_else(|| Some(body.trim().to_string()))
        .filter(|detail| !detail.is_empty())
}

#[cfg(test)]
mod tests {
    use super::{
        FulfillmentClient, MSG_AUTH_FAILURE, MSG_OVERLOADED, MSG_PURCHASE_FAILED, MSG_REJECTED,
        MSG_SERVICE_TROUBLE, friendly_api_error,
    };
    use crate::fulfillment::token::{ApiCredentials, TokenManager};
    use httpmock::prelude::*;
    use serde_json::json;
    use std::sync::Arc;

    fn client(server: &MockServer) -> (FulfillmentClient, Arc<TokenManager>) {
        let http = reqwest::Client::new();
        let tokens = Arc::new(TokenManager::new(
            http.clone(),
            &server.base_url(),
            ApiCredentials {
                username: "seller".into(),
                password: "secret".into(),
            },
        ));
        (
            FulfillmentClient::new(http, &server.base_url(), Arc::clone(&tokens)),
            tokens,
        )
    }

    #[tokio::test]
    async fn purchase_sends_bare_username_and_quantity() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/token");
            then.status(200).json_body(json!({"access_token": "tok"}));
        });
        let buy = server.mock(|when, then| {
            when.method(POST)
                .path("/buyStars")
                .header("authorization", "Bearer tok")
                .json_body(json!({"username": "mynick", "quantity": 100}));
            then.status(200).body("delivered");
        });

        let (client, _) = client(&server);
        let outcome = client.purchase("@mynick", 100).await;
        assert!(outcome.success);
        assert_eq!(outcome.status, 200);
        assert_eq!(outcome.message, "delivered");
        assert_eq!(buy.calls(), 1);
    }

    #[tokio::test]
    async fn unauthorized_then_ok_refreshes_exactly_once() {
        let server = MockServer::start();
        let token = server.mock(|when, then| {
            when.method(POST).path("/token");
            then.status(200).json_body(json!({"access_token": "fresh"}));
        });
        let stale = server.mock(|when, then| {
            when.method(POST)
                .path("/buyStars")
                .header("authorization", "Bearer stale");
            then.status(401);
        });
        let fresh = server.mock(|when, then| {
            when.method(POST)
                .path("/buyStars")
                .header("authorization", "Bearer fresh");
            then.status(200);
        });

        let (client, tokens) = client(&server);
        tokens.install("stale").await;
        let outcome = client.purchase("mynick", 5).await;

        assert!(outcome.success);
        assert_eq!(outcome.message, "OK");
        assert_eq!(token.calls(), 1);
        assert_eq!(stale.calls(), 1);
        assert_eq!(fresh.calls(), 1);
    }

    #[tokio::test]
    async fn unauthorized_twice_fails_without_looping() {
        let server = MockServer::start();
        let token = server.mock(|when, then| {
            when.method(POST).path("/token");
            then.status(200).json_body(json!({"access_token": "fresh"}));
        });
        let buy = server.mock(|when, then| {
            when.method(POST).path("/buyStars");
            then.status(401);
        });

        let (client, tokens) = client(&server);
        tokens.install("stale").await;
        let outcome = client.purchase("mynick", 5).await;

        assert!(!outcome.success);
        assert_eq!(outcome.status, 401);
        assert_eq!(outcome.message, MSG_AUTH_FAILURE);
        assert_eq!(token.calls(), 1);
        assert_eq!(buy.calls(), 2);
    }

    #[tokio::test]
    async fn server_error_maps_to_buyer_safe_text() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/token");
            then.status(200).json_body(json!({"access_token": "tok"}));
        });
        server.mock(|when, then| {
            when.method(POST).path("/buyStars");
            then.status(500).body("Traceback (most recent call last): ...");
        });

        let (client, _) = client(&server);
        let outcome = client.purchase("mynick", 5).await;
        assert!(!outcome.success);
        assert_eq!(outcome.status, 500);
        assert_eq!(outcome.message, MSG_SERVICE_TROUBLE);
    }

    #[tokio::test]
    async fn token_failure_is_a_failed_outcome() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/token");
            then.status(500);
        });
        let buy = server.mock(|when, then| {
            when.method(POST).path("/buyStars");
            then.status(200);
        });

        let (client, _) = client(&server);
        let outcome = client.purchase("mynick", 5).await;
        assert!(!outcome.success);
        assert_eq!(outcome.status, 0);
        assert_eq!(outcome.message, MSG_AUTH_FAILURE);
        assert_eq!(buy.calls(), 0);
    }

    #[test]
    fn error_text_mapping() {
        assert_eq!(friendly_api_error(403, ""), MSG_AUTH_FAILURE);
        assert_eq!(friendly_api_error(429, "slow down"), MSG_OVERLOADED);
        assert_eq!(friendly_api_error(502, ""), MSG_SERVICE_TROUBLE);
        assert_eq!(
            friendly_api_error(400, r#"{"detail": "username not found"}"#),
            "Запрос отклонён сервисом: username not found"
        );
        assert_eq!(
            friendly_api_error(422, "plain reason"),
            "Запрос отклонён сервисом: plain reason"
        );
        assert_eq!(friendly_api_error(404, "   "), MSG_REJECTED);
        assert_eq!(friendly_api_error(302, ""), MSG_PURCHASE_FAILED);

        let long = "x".repeat(500);
        let text = friendly_api_error(400, &long);
        assert_eq!(
            text.chars().count(),
            "Запрос отклонён сервисом: ".chars().count() + 180
        );
    }
}
