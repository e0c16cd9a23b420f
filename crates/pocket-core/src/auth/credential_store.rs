use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use tracing::{debug, warn};

use crate::config::{write_private_file, ConfigLocator};

use super::{AuthError, Authorization};

/// Persistence abstraction for the authorization record.
pub trait CredentialStore {
    /// Load the stored record. Missing or malformed data yields `None`.
    fn load(&self) -> Result<Option<Authorization>, AuthError>;
    fn save(&self, record: &Authorization) -> Result<(), AuthError>;
    fn delete(&self) -> Result<(), AuthError>;
}

/// Filesystem-backed credential storage located in the user configuration directory.
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    pub fn new(locator: &ConfigLocator) -> Self {
        Self {
            path: locator.auth_file(),
        }
    }
}

impl CredentialStore for FileCredentialStore {
    fn load(&self) -> Result<Option<Authorization>, AuthError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no stored authorization");
                return Ok(None);
            }
            Err(err) => return Err(err.into()),
        };
        match Authorization::from_json(&raw) {
            Ok(record) => Ok(Some(record)),
            Err(err) => {
                warn!(
                    path = %self.path.display(),
                    error = %err,
                    "ignoring malformed stored authorization"
                );
                Ok(None)
            }
        }
    }

    fn save(&self, record: &Authorization) -> Result<(), AuthError> {
        let payload = serde_json::to_string_pretty(record)?;
        write_private_file(&self.path, payload.as_bytes())?;
        Ok(())
    }

    fn delete(&self) -> Result<(), AuthError> {
        match fs::remove_file(&self.path) {
            Ok(_) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}
