use std::{fmt, sync::LazyLock, time::Duration};

use regex::Regex;
use thiserror::Error;

use crate::directory::LookupHandle;

/// Leading character buyers put in front of a Telegram username.
pub const IDENTIFIER_MARKER: char = '@';

static USERNAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_]{5,32}$").expect("valid regex"));

/// Why a buyer-supplied identifier was refused. The `Display` text is sent
/// to the buyer as is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum IdentifierRejection {
    #[error("Неверный формат ника. Укажите @username (5–32 символа: латиница, цифры, _).")]
    Format,
    #[error("Такого ника нет. Попробуйте другой @username.")]
    NotFound,
}

/// A syntactically valid Telegram username, stored without the marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Username(String);

impl Username {
    pub fn parse(raw: &str) -> Result<Self, IdentifierRejection> {
        let trimmed = raw.trim();
        let bare = trimmed.strip_prefix(IDENTIFIER_MARKER).unwrap_or(trimmed);
        if USERNAME.is_match(bare) {
            Ok(Self(bare.to_string()))
        } else {
            Err(IdentifierRejection::Format)
        }
    }

    /// The bare username, as the fulfillment API expects it.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Username {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{IDENTIFIER_MARKER}{}", self.0)
    }
}

/// Prefixes `text` with the marker unless it already carries one.
pub fn with_marker(text: &str) -> String {
    if text.starts_with(IDENTIFIER_MARKER) {
        text.to_string()
    } else {
        format!("{IDENTIFIER_MARKER}{text}")
    }
}

/// Format check followed by a bounded existence check. Never errors: any
/// lookup trouble is reported as [`IdentifierRejection::NotFound`].
#[derive(Debug, Clone)]
pub struct IdentifierValidator {
    lookup: LookupHandle,
    timeout: Duration,
}

impl IdentifierValidator {
    pub fn new(lookup: LookupHandle, timeout: Duration) -> Self {
        Self { lookup, timeout }
    }

    pub async fn validate(&self, raw: &str) -> Result<Username, IdentifierRejection> {
        let username = Username::parse(raw)?;
        if self.lookup.exists(username.as_str(), self.timeout).await {
            Ok(username)
        } else {
            Err(IdentifierRejection::NotFound)
        }
    }
}
