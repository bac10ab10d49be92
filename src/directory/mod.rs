//! Directory lookups: does a username denote an account stars can be sent to?

pub mod worker;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

pub use worker::{LookupHandle, spawn_lookup_worker};

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("directory request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("directory returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("directory rate limited the request")]
    RateLimited,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountKind {
    User,
    Bot,
    Group,
    Supergroup,
    Channel,
    #[serde(other)]
    Unknown,
}

impl AccountKind {
    /// Only people and bots can receive stars.
    pub fn is_eligible(self) -> bool {
        matches!(self, AccountKind::User | AccountKind::Bot)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Found(AccountKind),
    NotFound,
    RateLimited,
}

#[async_trait]
pub trait DirectoryLookup: Send + Sync {
    /// Resolves a bare username (no leading `@`).
    async fn resolve(&self, username: &str) -> Result<Resolution, DirectoryError>;

    /// Free-text directory search, returning the usernames of the matches.
    async fn search(&self, username: &str) -> Result<Vec<String>, DirectoryError>;
}

/// Existence policy. Fails closed: rate limits and errors count as "absent".
pub async fn account_exists<D>(directory: &D, username: &str) -> bool
where
    D: DirectoryLookup + ?Sized,
{
    let username = username.trim().trim_start_matches('@');

    match directory.resolve(username).await {
        Ok(Resolution::Found(kind)) => return kind.is_eligible(),
        Ok(Resolution::NotFound) => return false,
        Ok(Resolution::RateLimited) => {
            warn!(username, "directory rate limited username resolution");
            return false;
        }
        Err(err) => {
            debug!(username, error = %err, "username resolution inconclusive, searching");
        }
    }

    match directory.search(username).await {
        Ok(matches) => matches.iter().any(|found| {
            found
                .trim_start_matches('@')
                .eq_ignore_ascii_case(username)
        }),
        Err(err) => {
            warn!(username, error = %err, "directory search failed");
            false
        }
    }
}
