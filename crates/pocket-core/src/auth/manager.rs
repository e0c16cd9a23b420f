use std::time::Duration;

use tracing::{debug, info};
use url::Url;

use super::bootstrap::run_bootstrap;
use super::{AuthError, Authorization, AuthorizationService, CredentialStore};

/// Coordinates the cached authorization record and the bootstrap handshake.
pub struct Authorizer<S, A> {
    store: S,
    service: A,
    callback_timeout: Option<Duration>,
}

impl<S, A> Authorizer<S, A>
where
    S: CredentialStore,
    A: AuthorizationService,
{
    pub fn new(store: S, service: A) -> Self {
        Self {
            store,
            service,
            callback_timeout: None,
        }
    }

    /// Bound the wait for the browser callback. Unbounded by default.
    pub fn with_callback_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.callback_timeout = timeout;
        self
    }

    /// Return the stored record, bootstrapping and persisting a new one when absent.
    ///
    /// A stored record is trusted as-is; nothing is checked against the service.
    pub async fn ensure_authorization<F>(
        &self,
        consumer_key: &str,
        notify: F,
    ) -> Result<Authorization, AuthError>
    where
        F: Fn(&Url) -> Result<(), AuthError>,
    {
        if let Some(record) = self.store.load()? {
            debug!(username = %record.username, "using stored authorization");
            return Ok(record);
        }
        self.authorize(consumer_key, notify).await
    }

    /// Always run the handshake, replacing any stored record.
    pub async fn authorize<F>(
        &self,
        consumer_key: &str,
        notify: F,
    ) -> Result<Authorization, AuthError>
    where
        F: Fn(&Url) -> Result<(), AuthError>,
    {
        let record =
            run_bootstrap(&self.service, consumer_key, self.callback_timeout, notify).await?;
        self.store.save(&record)?;
        info!(username = %record.username, "authorization stored");
        Ok(record)
    }

    pub fn current(&self) -> Result<Option<Authorization>, AuthError> {
        self.store.load()
    }

    pub fn logout(&self) -> Result<(), AuthError> {
        self.store.delete()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::testing::{hit_redirect_from, MemoryStore, StubService};
    use crate::auth::{FileCredentialStore, PocketAuthClient};
    use crate::config::{ConfigLocator, PocketEndpoints};
    use crate::consumer_key::ConsumerKeyStore;
    use httpmock::prelude::*;
    use std::fs;
    use tempfile::TempDir;

    fn follow_redirect(url: &Url) -> Result<(), AuthError> {
        hit_redirect_from(url);
        Ok(())
    }

    fn no_browser(_url: &Url) -> Result<(), AuthError> {
        panic!("bootstrap must not run");
    }

    #[tokio::test]
    async fn cached_record_skips_bootstrap() {
        let cached = Authorization::new("cached", "ada");
        let store = MemoryStore::with(cached.clone());
        let authorizer = Authorizer::new(store.clone(), StubService::new("reqtok", "fresh"));

        let record = authorizer
            .ensure_authorization("abc123", no_browser)
            .await
            .unwrap();

        assert_eq!(record, cached);
        assert!(authorizer.service.calls().is_empty());
        assert_eq!(store.saves(), 0);
    }

    #[tokio::test]
    async fn missing_record_bootstraps_once_and_persists() {
        let store = MemoryStore::default();
        let authorizer = Authorizer::new(store.clone(), StubService::new("reqtok", "fresh"))
            .with_callback_timeout(Some(Duration::from_secs(5)));

        let record = authorizer
            .ensure_authorization("abc123", follow_redirect)
            .await
            .unwrap();

        assert_eq!(record.access_token, "fresh");
        assert_eq!(authorizer.service.access_calls(), 1);
        assert_eq!(store.saves(), 1);
        assert_eq!(authorizer.current().unwrap(), Some(record));
    }

    #[tokio::test]
    async fn malformed_file_triggers_bootstrap() {
        let temp_dir = TempDir::new().unwrap();
        let locator = ConfigLocator::at(temp_dir.path()).unwrap();
        fs::write(locator.auth_file(), "{ not json").unwrap();
        let authorizer = Authorizer::new(
            FileCredentialStore::new(&locator),
            StubService::new("reqtok", "fresh"),
        );

        let record = authorizer
            .ensure_authorization("abc123", follow_redirect)
            .await
            .unwrap();

        assert_eq!(record.access_token, "fresh");
        assert_eq!(authorizer.service.access_calls(), 1);
        let raw = fs::read_to_string(locator.auth_file()).unwrap();
        assert_eq!(Authorization::from_json(&raw).unwrap(), record);
    }

    #[tokio::test]
    async fn second_run_uses_persisted_record() {
        let temp_dir = TempDir::new().unwrap();
        let locator = ConfigLocator::at(temp_dir.path()).unwrap();

        let first = Authorizer::new(
            FileCredentialStore::new(&locator),
            StubService::new("reqtok", "fresh"),
        );
        let issued = first
            .ensure_authorization("abc123", follow_redirect)
            .await
            .unwrap();
        assert_eq!(first.service.network_calls(), 2);

        let second = Authorizer::new(
            FileCredentialStore::new(&locator),
            StubService::new("reqtok", "other"),
        );
        let restored = second
            .ensure_authorization("abc123", no_browser)
            .await
            .unwrap();
        assert_eq!(restored, issued);
        assert_eq!(second.service.network_calls(), 0);
    }

    #[tokio::test]
    async fn second_run_makes_no_http_requests() {
        let server = MockServer::start();
        let request_mock = server.mock(|when, then| {
            when.method(POST).path("/v3/oauth/request");
            then.status(200).json_body_obj(&serde_json::json!({ "code": "reqtok" }));
        });
        let access_mock = server.mock(|when, then| {
            when.method(POST).path("/v3/oauth/authorize");
            then.status(200).json_body_obj(&serde_json::json!({
                "access_token": "acc-1",
                "username": "ada"
            }));
        });

        let temp_dir = TempDir::new().unwrap();
        let locator = ConfigLocator::at(temp_dir.path()).unwrap();
        let endpoints = PocketEndpoints::new(
            &format!("{}/v3/", server.base_url()),
            "https://getpocket.com/auth/authorize",
        )
        .unwrap();

        for _ in 0..2 {
            let authorizer = Authorizer::new(
                FileCredentialStore::new(&locator),
                PocketAuthClient::new(endpoints.clone()).unwrap(),
            );
            let record = authorizer
                .ensure_authorization("abc123", follow_redirect)
                .await
                .unwrap();
            assert_eq!(record.access_token, "acc-1");
        }

        request_mock.assert_hits(1);
        access_mock.assert_hits(1);
    }

    #[tokio::test]
    async fn consumer_key_file_to_persisted_record() {
        let temp_dir = TempDir::new().unwrap();
        let locator = ConfigLocator::at(temp_dir.path()).unwrap();
        fs::write(locator.consumer_key_file(), "abc123\n").unwrap();
        let consumer_key = ConsumerKeyStore::new(&locator).load().unwrap().unwrap();

        let authorizer = Authorizer::new(
            FileCredentialStore::new(&locator),
            StubService::new("reqtok", "acc-1"),
        );
        let record = authorizer
            .ensure_authorization(&consumer_key, follow_redirect)
            .await
            .unwrap();

        assert_eq!(
            authorizer.service.calls().last().map(String::as_str),
            Some("access:abc123:reqtok")
        );
        assert_eq!(record.access_token, "acc-1");
        let stored = FileCredentialStore::new(&locator).load().unwrap();
        assert_eq!(stored, Some(record));
    }

    #[tokio::test]
    async fn failed_bootstrap_persists_nothing() {
        let store = MemoryStore::default();
        let authorizer = Authorizer::new(store.clone(), StubService::failing_request());

        let err = authorizer
            .ensure_authorization("bad", follow_redirect)
            .await
            .unwrap_err();

        assert!(matches!(err, AuthError::EmptyToken(_)));
        assert_eq!(store.saves(), 0);
        assert!(authorizer.current().unwrap().is_none());
    }

    #[tokio::test]
    async fn authorize_replaces_and_logout_removes() {
        let store = MemoryStore::with(Authorization::new("old", "ada"));
        let authorizer = Authorizer::new(store.clone(), StubService::new("reqtok", "new"));

        let record = authorizer.authorize("abc123", follow_redirect).await.unwrap();
        assert_eq!(record.access_token, "new");
        assert_eq!(store.saves(), 1);

        authorizer.logout().unwrap();
        assert!(authorizer.current().unwrap().is_none());
    }
}
