use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Long-lived credential used for every API call, persisted as `auth.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Authorization {
    pub access_token: String,
    #[serde(default)]
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub obtained_at: Option<DateTime<Utc>>,
}

impl Authorization {
    pub fn new(access_token: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            username: username.into(),
            obtained_at: Some(Utc::now()),
        }
    }

    /// Decode a persisted record, rejecting anything without a usable access token.
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        let record: Self = serde_json::from_str(raw)?;
        if record.access_token.trim().is_empty() {
            return Err(serde::de::Error::custom("access_token is empty"));
        }
        Ok(record)
    }
}

/// Short-lived token valid for a single authorization handshake.
#[derive(Clone, PartialEq, Eq)]
pub struct RequestToken(String);

impl RequestToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for RequestToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("RequestToken(..)")
    }
}
