use std::time::Duration;

use reqwest::StatusCode;
use thiserror::Error;

use crate::config::ConfigError;

/// Errors surfaced by the authorization bootstrap and credential management.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("authorization endpoint error {status}: {message} (code {code})")]
    Endpoint {
        status: StatusCode,
        code: String,
        message: String,
    },
    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),
    #[error("authorization listener terminated before receiving the callback")]
    ListenerClosed,
    #[error("no authorization callback received within {0:?}")]
    CallbackTimeout(Duration),
    #[error("authorization service returned an empty {0}")]
    EmptyToken(&'static str),
}
