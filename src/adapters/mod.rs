//! HTTP bridges for the marketplace session and the Telegram directory.

pub mod directory_http;
pub mod marketplace_http;

pub use directory_http::HttpDirectory;
pub use marketplace_http::HttpMarketplace;

use reqwest::Response;

/// Splits a response into its status and body text, for error reporting.
pub(crate) async fn status_and_body(resp: Response) -> (u16, String) {
    let status = resp.status().as_u16();
    let body = resp.text().await.unwrap_or_default();
    (status, crate::infra::text::truncate_chars(&body, 300))
}
