//! Client for the billed stars API: bearer token lifecycle and purchases.

pub mod client;
pub mod token;

pub use client::{FulfillmentClient, PurchaseOutcome, friendly_api_error};
pub use token::{ApiCredentials, AuthError, TokenManager, spawn_refresher};
