use std::fs::{self, OpenOptions};
use std::io::Write;
#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use directories::BaseDirs;
use thiserror::Error;
use url::Url;

const CONSUMER_KEY_FILE: &str = "consumer_key";
const AUTH_FILE: &str = "auth.json";

pub const DEFAULT_API_BASE: &str = "https://getpocket.com/v3/";
pub const DEFAULT_AUTHORIZE_URL: &str = "https://getpocket.com/auth/authorize";

/// Locates the per-user configuration directory holding the consumer key and credentials.
#[derive(Debug, Clone)]
pub struct ConfigLocator {
    root: PathBuf,
}

impl ConfigLocator {
    /// Discover `~/.config/pocket`, creating it if needed. The directory is
    /// always restricted to its owner.
    pub fn new() -> Result<Self, ConfigError> {
        let dirs = BaseDirs::new().ok_or(ConfigError::MissingHomeDir)?;
        let locator = Self::at(dirs.home_dir().join(".config").join("pocket"))?;
        set_user_only_permissions(&locator.root)?;
        Ok(locator)
    }

    /// Use an explicit configuration directory, creating it if needed.
    ///
    /// Only a directory created here is restricted to its owner; an existing
    /// one keeps its permissions.
    pub fn at(root: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let root = root.into();
        if !root.is_dir() {
            fs::create_dir_all(&root).map_err(ConfigError::CreateDir)?;
            set_user_only_permissions(&root)?;
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Plain-text file holding the consumer key on its first line.
    pub fn consumer_key_file(&self) -> PathBuf {
        self.root.join(CONSUMER_KEY_FILE)
    }

    /// JSON-encoded authorization record.
    pub fn auth_file(&self) -> PathBuf {
        self.root.join(AUTH_FILE)
    }
}

/// Remote endpoints of the Pocket service.
#[derive(Debug, Clone)]
pub struct PocketEndpoints {
    api_base: Url,
    authorize_url: Url,
}

impl PocketEndpoints {
    pub fn new(api_base: &str, authorize_url: &str) -> Result<Self, url::ParseError> {
        let mut api_base = Url::parse(api_base)?;
        if !api_base.path().ends_with('/') {
            let path = format!("{}/", api_base.path());
            api_base.set_path(&path);
        }
        Ok(Self {
            api_base,
            authorize_url: Url::parse(authorize_url)?,
        })
    }

    /// Resolve an API method (e.g. `oauth/request`) against the API base.
    pub fn method(&self, name: &str) -> Result<Url, url::ParseError> {
        self.api_base.join(name)
    }

    pub fn authorize_url(&self) -> &Url {
        &self.authorize_url
    }
}

/// Write `payload` to `path`, readable and writable by the owner only.
pub(crate) fn write_private_file(path: &Path, payload: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(path)?;
    file.write_all(payload)?;

    #[cfg(unix)]
    {
        let mut perm = file.metadata()?.permissions();
        perm.set_mode(0o600);
        fs::set_permissions(path, perm)?;
    }

    Ok(())
}

fn set_user_only_permissions(path: &Path) -> Result<(), ConfigError> {
    #[cfg(unix)]
    {
        let metadata = fs::metadata(path)?;
        let mut permissions = metadata.permissions();
        permissions.set_mode(0o700);
        fs::set_permissions(path, permissions)?;
        Ok(())
    }
    #[cfg(not(unix))]
    {
        let _ = path;
        Ok(())
    }
}

/// Errors that can occur when working with the configuration directory.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unable to determine the home directory")]
    MissingHomeDir,
    #[error("failed to create configuration directory: {0}")]
    CreateDir(#[source] std::io::Error),
    #[error("filesystem error: {0}")]
    Io(#[source] std::io::Error),
}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::Io(err)
    }
}
