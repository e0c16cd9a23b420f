mod bootstrap;
mod callback;
mod credential_store;
mod error;
mod manager;
mod oauth;
mod session;
#[cfg(test)]
pub(crate) mod testing;

pub use callback::CallbackListener;
pub use credential_store::{CredentialStore, FileCredentialStore};
pub use error::AuthError;
pub use manager::Authorizer;
pub use oauth::{AuthorizationService, PocketAuthClient};
pub use session::{Authorization, RequestToken};
