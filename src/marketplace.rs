//! Marketplace collaborator: the seller session the daemon acts through.
//!
//! The daemon never talks to the marketplace directly; it goes through the
//! [`Marketplace`] trait so the transport can be swapped (see
//! `adapters::marketplace_http`).

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MarketError {
    #[error("marketplace request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("marketplace returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("order not found: {0}")]
    OrderNotFound(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SellerAccount {
    pub id: u64,
    #[serde(default)]
    pub username: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub buyer_id: u64,
    pub chat_id: String,
    #[serde(default)]
    pub subcategory_id: Option<u64>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub chat_id: String,
    pub author_id: u64,
    #[serde(default)]
    pub text: String,
}

/// Events the daemon reacts to. Anything else the event stream produces is
/// decoded as [`MarketEvent::Other`] and ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MarketEvent {
    OrderCreated { order_id: String },
    MessageReceived(ChatMessage),
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LotSummary {
    pub id: u64,
}

/// Editable form of a listing. Fields the daemon does not touch are carried
/// through `extra` so a save does not drop them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LotFields {
    pub id: u64,
    #[serde(default = "default_active", alias = "is_active")]
    pub active: bool,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

fn default_active() -> bool {
    true
}

#[async_trait]
pub trait Marketplace: Send + Sync {
    /// The seller account the session is authorized as.
    async fn whoami(&self) -> Result<SellerAccount, MarketError>;

    /// Waits up to `wait` for the next event.
    async fn next_event(&self, wait: Duration) -> Result<Option<MarketEvent>, MarketError>;

    async fn send_message(&self, chat_id: &str, text: &str) -> Result<(), MarketError>;

    async fn get_order(&self, order_id: &str) -> Result<Order, MarketError>;

    async fn refund(&self, order_id: &str) -> Result<(), MarketError>;

    async fn list_lots_in_category(&self, category_id: u64) -> Result<Vec<LotSummary>, MarketError>;

    /// `None` when the lot has no editable form (deleted, foreign, ...).
    async fn get_lot_fields(&self, lot_id: u64) -> Result<Option<LotFields>, MarketError>;

    async fn save_lot(&self, fields: &LotFields) -> Result<(), MarketError>;
}
