//! Test doubles shared by the auth module tests.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use url::Url;

use super::{AuthError, Authorization, AuthorizationService, CredentialStore, RequestToken};

/// Issue a bare `GET` to `url` and return the raw response.
pub(crate) async fn http_get(url: &Url) -> String {
    let host = url.host_str().unwrap().to_owned();
    let port = url.port().unwrap();
    let mut path = url.path().to_owned();
    if let Some(query) = url.query() {
        path.push('?');
        path.push_str(query);
    }
    let mut stream = TcpStream::connect((host.as_str(), port)).await.unwrap();
    let request =
        format!("GET {path} HTTP/1.1\r\nHost: {host}:{port}\r\nConnection: close\r\n\r\n");
    stream.write_all(request.as_bytes()).await.unwrap();
    let mut response = Vec::new();
    stream.read_to_end(&mut response).await.unwrap();
    String::from_utf8(response).unwrap()
}

/// Simulate the browser following the redirect embedded in an authorization URL.
pub(crate) fn hit_redirect_from(auth_url: &Url) {
    let redirect = StubService::redirect_of(auth_url);
    tokio::spawn(async move {
        http_get(&redirect).await;
    });
}

type AccessHook = Box<dyn Fn() + Send + Sync>;

/// Authorization service that records every call instead of touching the network.
pub(crate) struct StubService {
    request_token: Option<String>,
    access_token: String,
    calls: Mutex<Vec<String>>,
    on_access: Option<AccessHook>,
}

impl StubService {
    pub(crate) fn new(request_token: &str, access_token: &str) -> Self {
        Self {
            request_token: Some(request_token.to_owned()),
            access_token: access_token.to_owned(),
            calls: Mutex::new(Vec::new()),
            on_access: None,
        }
    }

    pub(crate) fn failing_request() -> Self {
        Self {
            request_token: None,
            ..Self::new("", "")
        }
    }

    pub(crate) fn on_access(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_access = Some(Box::new(hook));
        self
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn network_calls(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| !call.starts_with("authorization_url"))
            .count()
    }

    pub(crate) fn access_calls(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| call.starts_with("access"))
            .count()
    }

    pub(crate) fn redirect_of(auth_url: &Url) -> Url {
        let redirect = auth_url
            .query_pairs()
            .find(|(key, _)| key == "redirect_uri")
            .map(|(_, value)| value.into_owned())
            .unwrap();
        Url::parse(&redirect).unwrap()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl AuthorizationService for StubService {
    async fn obtain_request_token(
        &self,
        consumer_key: &str,
        _redirect_url: &Url,
    ) -> Result<RequestToken, AuthError> {
        self.record(format!("request:{consumer_key}"));
        match &self.request_token {
            Some(token) => Ok(RequestToken::new(token.clone())),
            None => Err(AuthError::EmptyToken("request token")),
        }
    }

    fn authorization_url(
        &self,
        request_token: &RequestToken,
        redirect_url: &Url,
    ) -> Result<Url, AuthError> {
        self.record(format!("authorization_url:{}", request_token.as_str()));
        let mut url = Url::parse("http://stub.invalid/authorize")?;
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
        if let Some(hook) = &self.on_access {
            hook();
        }
        self.record(format!("access:{consumer_key}:{}", request_token.as_str()));
        Ok(Authorization::new(self.access_token.clone(), "stub-user"))
    }
}

/// In-memory credential store counting writes.
#[derive(Clone, Default)]
pub(crate) struct MemoryStore {
    inner: Arc<Mutex<Option<Authorization>>>,
    saves: Arc<Mutex<usize>>,
}

impl MemoryStore {
    pub(crate) fn with(record: Authorization) -> Self {
        let store = Self::default();
        *store.inner.lock().unwrap() = Some(record);
        store
    }

    pub(crate) fn saves(&self) -> usize {
        *self.saves.lock().unwrap()
    }
}

impl CredentialStore for MemoryStore {
    fn load(&self) -> Result<Option<Authorization>, AuthError> {
        Ok(self.inner.lock().unwrap().clone())
    }

    fn save(&self, record: &Authorization) -> Result<(), AuthError> {
        *self.inner.lock().unwrap() = Some(record.clone());
        *self.saves.lock().unwrap() += 1;
        Ok(())
    }

    fn delete(&self) -> Result<(), AuthError> {
        *self.inner.lock().unwrap() = None;
        Ok(())
    }
}
