use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use crate::config::{write_private_file, ConfigError, ConfigLocator};

/// File-backed cache of the application's consumer key.
#[derive(Debug, Clone)]
pub struct ConsumerKeyStore {
    path: PathBuf,
}

impl ConsumerKeyStore {
    pub fn new(locator: &ConfigLocator) -> Self {
        Self {
            path: locator.consumer_key_file(),
        }
    }

    /// Read the cached key. A missing file or an empty first line yields `None`.
    pub fn load(&self) -> Result<Option<String>, ConfigError> {
        match fs::read_to_string(&self.path) {
            Ok(raw) => Ok(parse_consumer_key(&raw).map(ToOwned::to_owned)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    pub fn save(&self, key: &str) -> Result<(), ConfigError> {
        write_private_file(&self.path, key.as_bytes())?;
        Ok(())
    }
}

/// Only the content before the first line break is significant.
pub fn parse_consumer_key(raw: &str) -> Option<&str> {
    let first = raw.split('\n').next().unwrap_or_default();
    let first = first.strip_suffix('\r').unwrap_or(first);
    if first.is_empty() {
        None
    } else {
        Some(first)
    }
}
