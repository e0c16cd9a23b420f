use std::fmt;
use std::time::Duration;

use tracing::{debug, warn};
use url::Url;

use super::{AuthError, Authorization, AuthorizationService, CallbackListener};

/// Progress of a single authorization handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BootstrapState {
    Idle,
    RequestTokenObtained,
    AwaitingUserAuthorization,
    AccessTokenObtained,
}

impl fmt::Display for BootstrapState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            BootstrapState::Idle => "idle",
            BootstrapState::RequestTokenObtained => "request-token-obtained",
            BootstrapState::AwaitingUserAuthorization => "awaiting-user-authorization",
            BootstrapState::AccessTokenObtained => "access-token-obtained",
        };
        write!(f, "{value}")
    }
}

/// Run the three-step handshake through a loopback callback listener.
///
/// `notify_authorization_url` receives the URL the user has to visit. The
/// access token is requested only after the listener received its callback.
pub(crate) async fn run_bootstrap<A, F>(
    service: &A,
    consumer_key: &str,
    callback_timeout: Option<Duration>,
    notify_authorization_url: F,
) -> Result<Authorization, AuthError>
where
    A: AuthorizationService + ?Sized,
    F: Fn(&Url) -> Result<(), AuthError>,
{
    let listener = CallbackListener::bind().await?;
    let redirect_url = listener.redirect_url().clone();

    let request_token = service
        .obtain_request_token(consumer_key, &redirect_url)
        .await
        .map_err(failed_in(BootstrapState::Idle))?;
    debug!(state = %BootstrapState::RequestTokenObtained, "obtained request token");

    let auth_url = service
        .authorization_url(&request_token, &redirect_url)
        .map_err(failed_in(BootstrapState::RequestTokenObtained))?;
    notify_authorization_url(&auth_url)
        .map_err(failed_in(BootstrapState::RequestTokenObtained))?;
    debug!(
        state = %BootstrapState::AwaitingUserAuthorization,
        "waiting for authorization callback"
    );

    listener
        .wait(callback_timeout)
        .await
        .map_err(failed_in(BootstrapState::AwaitingUserAuthorization))?;

    let record = service
        .obtain_access_token(consumer_key, &request_token)
        .await
        .map_err(failed_in(BootstrapState::AwaitingUserAuthorization))?;
    debug!(
        state = %BootstrapState::AccessTokenObtained,
        username = %record.username,
        "obtained access token"
    );
    Ok(record)
}

fn failed_in(state: BootstrapState) -> impl FnOnce(AuthError) -> AuthError {
    move |err| {
        warn!(%state, error = %err, "authorization bootstrap failed");
        err
    }
}
