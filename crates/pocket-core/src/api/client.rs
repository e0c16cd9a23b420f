use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::auth::Authorization;
use crate::config::PocketEndpoints;
use crate::http::{self, ErrorDetails};

use super::types::{Action, Item, ItemList, ModifyResult, RetrieveOptions};

/// Errors returned by the API client.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("HTTP status {status}: {message} (code {code})")]
    Status {
        status: StatusCode,
        code: String,
        message: String,
    },
    #[error("invalid API endpoint: {0}")]
    InvalidEndpoint(#[from] url::ParseError),
    #[error("failed to deserialize response: {0}")]
    Deserialize(#[from] serde_json::Error),
    #[error("service reported an error: {0}")]
    Remote(String),
    #[error("service rejected the actions (status {status}): {results:?}")]
    ActionsRejected {
        status: i32,
        results: Vec<serde_json::Value>,
    },
}

pub type ApiResult<T> = Result<T, ApiError>;

/// Remote operations on the user's reading list.
#[async_trait]
pub trait PocketApi: Send + Sync {
    /// Fetch the items matching `options`, in list order.
    async fn retrieve(&self, options: &RetrieveOptions) -> ApiResult<Vec<Item>>;

    /// Apply `actions` in one request.
    async fn modify(&self, actions: &[Action]) -> ApiResult<ModifyResult>;
}

/// Minimal client for the Pocket v3 API.
#[derive(Debug, Clone)]
pub struct PocketClient {
    http: Client,
    endpoints: PocketEndpoints,
    consumer_key: String,
    access_token: String,
}

impl PocketClient {
    pub fn new(
        consumer_key: impl Into<String>,
        authorization: &Authorization,
        endpoints: PocketEndpoints,
    ) -> ApiResult<Self> {
        let http = http::client()?;
        Ok(Self {
            http,
            endpoints,
            consumer_key: consumer_key.into(),
            access_token: authorization.access_token.clone(),
        })
    }

    async fn post<T, R>(&self, method: &str, body: T) -> ApiResult<R>
    where
        T: Serialize,
        R: DeserializeOwned,
    {
        #[derive(Serialize)]
        struct Authenticated<'a, T> {
            consumer_key: &'a str,
            access_token: &'a str,
            #[serde(flatten)]
            body: T,
        }

        let url = self.endpoints.method(method)?;
        debug!(%url, "calling API");
        let response = self
            .http
            .post(url)
            .header("x-accept", "application/json")
            .json(&Authenticated {
                consumer_key: &self.consumer_key,
                access_token: &self.access_token,
                body,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            let ErrorDetails {
                status,
                code,
                message,
            } = ErrorDetails::from_response(response).await;
            return Err(ApiError::Status {
                status,
                code,
                message,
            });
        }

        let text = response.text().await?;
        Ok(serde_json::from_str(&text)?)
    }
}

#[async_trait]
impl PocketApi for PocketClient {
    async fn retrieve(&self, options: &RetrieveOptions) -> ApiResult<Vec<Item>> {
        #[derive(Deserialize)]
        struct RetrieveEnvelope {
            #[serde(default)]
            list: ItemList,
            #[serde(default)]
            error: Option<String>,
        }

        let envelope: RetrieveEnvelope = self.post("get", options).await?;
        if let Some(error) = envelope.error {
            return Err(ApiError::Remote(error));
        }
        let items = envelope.list.into_ordered();
        debug!(count = items.len(), "retrieved items");
        Ok(items)
    }

    async fn modify(&self, actions: &[Action]) -> ApiResult<ModifyResult> {
        #[derive(Serialize)]
        struct Request<'a> {
            actions: &'a [Action],
        }

        let result: ModifyResult = self.post("send", Request { actions }).await?;
        if result.status != 1 {
            return Err(ApiError::ActionsRejected {
                status: result.status,
                results: result.action_results,
            });
        }
        Ok(result)
    }
}
