use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::json;

use super::status_and_body;
use crate::marketplace::{
    LotFields, LotSummary, MarketError, MarketEvent, Marketplace, Order, SellerAccount,
};

/// Marketplace session exposed by a local bridge service over JSON/HTTP.
pub struct HttpMarketplace {
    base_url: String,
    token: String,
    http: reqwest::Client,
}

impl HttpMarketplace {
    pub fn new(http: reqwest::Client, base_url: &str, token: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
            http,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get(&self, path: &str) -> Result<Response, MarketError> {
        Ok(self
            .http
            .get(self.url(path))
            .bearer_auth(&self.token)
            .send()
            .await?)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, MarketError> {
        let resp = ensure_success(self.get(path).await?).await?;
        Ok(resp.json().await?)
    }
}

async fn ensure_success(resp: Response) -> Result<Response, MarketError> {
    if resp.status().is_success() {
        return Ok(resp);
    }
    let (status, body) = status_and_body(resp).await;
    Err(MarketError::Status { status, body })
}

#[async_trait]
impl Marketplace for HttpMarketplace {
    async fn whoami(&self) -> Result<SellerAccount, MarketError> {
        self.get_json("/me").await
    }

    async fn next_event(&self, wait: Duration) -> Result<Option<MarketEvent>, MarketError> {
        let path = format!("/events?timeout_ms={}", wait.as_millis());
        let resp = ensure_success(self.get(&path).await?).await?;
        if resp.status() == StatusCode::NO_CONTENT {
            return Ok(None);
        }
        Ok(Some(resp.json().await?))
    }

    async fn send_message(&self, chat_id: &str, text: &str) -> Result<(), MarketError> {
        let resp = self
            .http
            .post(self.url(&format!("/chats/{chat_id}/messages")))
            .bearer_auth(&self.token)
            .json(&json!({ "text": text }))
            .send()
            .await?;
        ensure_success(resp).await.map(drop)
    }

    async fn get_order(&self, order_id: &str) -> Result<Order, MarketError> {
        let resp = self.get(&format!("/orders/{order_id}")).await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Err(MarketError::OrderNotFound(order_id.to_string()));
        }
        Ok(ensure_success(resp).await?.json().await?)
    }

    async fn refund(&self, order_id: &str) -> Result<(), MarketError> {
        let resp = self
            .http
            .post(self.url(&format!("/orders/{order_id}/refund")))
            .bearer_auth(&self.token)
            .send()
            .await?;
        ensure_success(resp).await.map(drop)
    }

    async fn list_lots_in_category(&self, category_id: u64) -> Result<Vec<LotSummary>, MarketError> {
        self.get_json(&format!("/categories/{category_id}/lots"))
            .await
    }

    async fn get_lot_fields(&self, lot_id: u64) -> Result<Option<LotFields>, MarketError> {
        let resp = self.get(&format!("/lots/{lot_id}")).await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Ok(Some(ensure_success(resp).await?.json().await?))
    }

    async fn save_lot(&self, fields: &LotFields) -> Result<(), MarketError> {
        let resp = self
            .http
            .put(self.url(&format!("/lots/{}", fields.id)))
            .bearer_auth(&self.token)
            .json(fields)
            .send()
            .await?;
        ensure_success(resp).await.map(drop)
    }
}

#[cfg(test)]
mod tests {
    use super::HttpMarketplace;
    use crate::marketplace::{MarketError, MarketEvent, Marketplace};
    use httpmock::prelude::*;
    use serde_json::json;
    use std::time::Duration;

    fn market(server: &MockServer) -> HttpMarketplace {
        HttpMarketplace::new(reqwest::Client::new(), &server.base_url(), "sess")
    }

    #[tokio::test]
    async fn events_poll_with_timeout_and_treat_204_as_idle() {
        let server = MockServer::start();
        let mut idle = server.mock(|when, then| {
            when.method(GET)
                .path("/events")
                .query_param("timeout_ms", "3000")
                .header("authorization", "Bearer sess");
            then.status(204);
        });

        let market = market(&server);
        assert_eq!(market.next_event(Duration::from_secs(3)).await.unwrap(), None);
        idle.assert();
        idle.delete();

        server.mock(|when, then| {
            when.method(GET).path("/events");
            then.status(200)
                .json_body(json!({"type": "order_created", "order_id": "ORD1"}));
        });
        assert_eq!(
            market.next_event(Duration::from_secs(3)).await.unwrap(),
            Some(MarketEvent::OrderCreated {
                order_id: "ORD1".into()
            })
        );
    }

    #[tokio::test]
    async fn order_lookup_maps_404() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/orders/GONE");
            then.status(404);
        });
        server.mock(|when, then| {
            when.method(GET).path("/orders/ORD1");
            then.status(200).json_body(json!({
                "id": "ORD1",
                "buyer_id": 42,
                "chat_id": "c-42",
                "subcategory_id": 2418,
                "title": "100 stars"
            }));
        });

        let market = market(&server);
        assert!(matches!(
            market.get_order("GONE").await,
            Err(MarketError::OrderNotFound(id)) if id == "GONE"
        ));
        let order = market.get_order("ORD1").await.unwrap();
        assert_eq!(order.buyer_id, 42);
        assert_eq!(order.subcategory_id, Some(2418));
        assert_eq!(order.description, "");
    }

    #[tokio::test]
    async fn messages_refunds_and_lot_saves_hit_the_bridge() {
        let server = MockServer::start();
        let send = server.mock(|when, then| {
            when.method(POST)
                .path("/chats/c-42/messages")
                .json_body(json!({"text": "hi"}));
            then.status(200);
        });
        let refund = server.mock(|when, then| {
            when.method(POST).path("/orders/ORD1/refund");
            then.status(500).body("already refunded");
        });
        server.mock(|when, then| {
            when.method(GET).path("/lots/7");
            then.status(200)
                .json_body(json!({"id": 7, "active": true, "price": 12}));
        });
        server.mock(|when, then| {
            when.method(GET).path("/lots/8");
            then.status(404);
        });
        let save = server.mock(|when, then| {
            when.method(PUT)
                .path("/lots/7")
                .json_body(json!({"id": 7, "active": false, "price": 12}));
            then.status(200);
        });

        let market = market(&server);
        market.send_message("c-42", "hi").await.unwrap();
        assert_eq!(send.calls(), 1);

        match market.refund("ORD1").await {
            Err(MarketError::Status { status, body }) => {
                assert_eq!(status, 500);
                assert_eq!(body, "already refunded");
            }
            other => panic!("unexpected refund result: {other:?}"),
        }
        assert_eq!(refund.calls(), 1);

        assert!(market.get_lot_fields(8).await.unwrap().is_none());
        let mut lot = market.get_lot_fields(7).await.unwrap().unwrap();
        lot.active = false;
        market.save_lot(&lot).await.unwrap();
        assert_eq!(save.calls(), 1);
    }
}
