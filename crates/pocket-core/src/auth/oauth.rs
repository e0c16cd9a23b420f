use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::config::PocketEndpoints;
use crate::http::{self, ErrorDetails};

use super::{AuthError, Authorization, RequestToken};

/// The three operations of the remote authorization handshake.
#[async_trait]
pub trait AuthorizationService: Send + Sync {
    /// Obtain a request token bound to `redirect_url`.
    async fn obtain_request_token(
        &self,
        consumer_key: &str,
        redirect_url: &Url,
    ) -> Result<RequestToken, AuthError>;

    /// URL the user visits to approve the request token. No network access.
    fn authorization_url(
        &self,
        request_token: &RequestToken,
        redirect_url: &Url,
    ) -> Result<Url, AuthError>;

    /// Exchange an approved request token for the long-lived access token.
    async fn obtain_access_token(
        &self,
        consumer_key: &str,
        request_token: &RequestToken,
    ) -> Result<Authorization, AuthError>;
}

/// Performs the authorization handshake against Pocket's OAuth endpoints.
#[derive(Debug, Clone)]
pub struct PocketAuthClient {
    http: Client,
    endpoints: PocketEndpoints,
}

impl PocketAuthClient {
    pub fn new(endpoints: PocketEndpoints) -> Result<Self, AuthError> {
        let http = http::client()?;
        Ok(Self { http, endpoints })
    }

    async fn post<T: Serialize>(&self, method: &str, body: &T) -> Result<Response, AuthError> {
        let url = self.endpoints.method(method)?;
        debug!(%url, "calling authorization endpoint");
        let response = self
            .http
            .post(url)
            .header("x-accept", "application/json")
            .json(body)
            .send()
            .await?;

        if !response.status().is_success() {
            let ErrorDetails {
                status,
                code,
                message,
            } = ErrorDetails::from_response(response).await;
            return Err(AuthError::Endpoint {
                status,
                code,
                message,
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl AuthorizationService for PocketAuthClient {
    async fn obtain_request_token(
        &self,
        consumer_key: &str,
        redirect_url: &Url,
    ) -> Result<RequestToken, AuthError> {
        #[derive(Serialize)]
        struct Request<'a> {
            consumer_key: &'a str,
            redirect_uri: &'a str,
        }

        #[derive(Deserialize)]
        struct Payload {
            code: String,
        }

        let payload: Payload = self
            .post(
                "oauth/request",
                &Request {
                    consumer_key,
                    redirect_uri: redirect_url.as_str(),
                },
            )
            .await?
            .json()
            .await?;

        if payload.code.is_empty() {
            return Err(AuthError::EmptyToken("request token"));
        }
        Ok(RequestToken::new(payload.code))
    }

    fn authorization_url(
        &self,
        request_token: &RequestToken,
        redirect_url: &Url,
    ) -> Result<Url, AuthError> {
        let mut url = self.endpoints.authorize_url().clone();
        url.query_pairs_mut()
            .append_pair("request_token", request_token.as_str())
            .append_pair("redirect_uri", redirect_url.as_str());
        Ok(url)
    }

    async fn obtain_access_token(
        &self,
        consumer_key: &str,
        request_token: &RequestToken,
    ) -> Result<Authorization, AuthError> {
        #[derive(Serialize)]
        struct Request<'a> {
            consumer_key: &'a str,
            code: &'a str,
        }

        #[derive(Deserialize)]
        struct Payload {
            access_token: String,
            #[serde(default)]
            username: String,
        }

        let payload: Payload = self
            .post(
                "oauth/authorize",
                &Request {
                    consumer_key,
                    code: request_token.as_str(),
                },
            )
            .await?
            .json()
            .await?;

        if payload.access_token.is_empty() {
            return Err(AuthError::EmptyToken("access token"));
        }
        Ok(Authorization::new(payload.access_token, payload.username))
    }
}
