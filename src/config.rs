//! Bridge connection configuration and the saved session

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

const SESSION_FILE: &str = "session.json";

/// Connection settings for a running Proton Bridge.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    pub host: String,
    pub imap_port: u16,
    pub smtp_port: u16,
    pub username: String,
    pub password: String,
}

/// Credentials saved by `pmail login`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub username: String,
    pub password: String,
}

impl BridgeConfig {
    /// Load the configuration.
    ///
    /// Reads from `.env` file if present. Host and ports come from:
    /// - `BRIDGE_HOST` (default: `127.0.0.1`)
    /// - `IMAP_PORT` (default: `1143`)
    /// - `SMTP_PORT` (default: `1025`)
    ///
    /// Credentials come from `IMAP_USERNAME` and `IMAP_PASSWORD` when
    /// both are set, otherwise from the session saved in `config_dir`.
    ///
    /// # Errors
    ///
    /// [`Error::Config`] for an unparsable port, [`Error::NotLoggedIn`]
    /// when there are no credentials anywhere.
    pub fn load(config_dir: &Path) -> Result<Self> {
        dotenvy::dotenv().ok();

        let session = match (env::var("IMAP_USERNAME"), env::var("IMAP_PASSWORD")) {
            (Ok(username), Ok(password)) => Session { username, password },
            _ => Session::load(config_dir)?.ok_or(Error::NotLoggedIn)?,
        };

        Self::with_session(session)
    }

    /// Host and ports from the environment, credentials as given.
    ///
    /// # Errors
    ///
    /// [`Error::Config`] for an unparsable port.
    pub fn with_session(session: Session) -> Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            host: env::var("BRIDGE_HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            imap_port: port_var("IMAP_PORT", 1143)?,
            smtp_port: port_var("SMTP_PORT", 1025)?,
            username: session.username,
            password: session.password,
        })
    }
}

fn port_var(name: &str, default: u16) -> Result<u16> {
    env::var(name).map_or(Ok(default), |v| {
        v.parse()
            .map_err(|e| Error::Config(format!("Invalid {name}: {e}")))
    })
}

/// Directory holding the saved session.
///
/// `PMAIL_CONFIG_DIR` if set, otherwise `pmail` under the platform's
/// configuration directory.
///
/// # Errors
///
/// [`Error::Config`] when no configuration directory can be found.
pub fn config_dir() -> Result<PathBuf> {
    if let Ok(dir) = env::var("PMAIL_CONFIG_DIR") {
        return Ok(PathBuf::from(dir));
    }
    dirs::config_dir()
        .map(|dir| dir.join("pmail"))
        .ok_or_else(|| Error::Config("No configuration directory found".into()))
}

impl Session {
    #[must_use]
    pub fn path(config_dir: &Path) -> PathBuf {
        config_dir.join(SESSION_FILE)
    }

    /// Read the saved session, if there is one.
    ///
    /// # Errors
    ///
    /// IO errors other than a missing file, or [`Error::Config`] for a
    /// corrupt session file.
    pub fn load(config_dir: &Path) -> Result<Option<Self>> {
        let path = Self::path(config_dir);
        let data = match fs::read_to_string(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        debug!("Loaded session from {}", path.display());
        serde_json::from_str(&data)
            .map(Some)
            .map_err(|e| Error::Config(format!("Corrupt session file {}: {e}", path.display())))
    }

    /// Write the session, readable by the owner only.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or file cannot be written.
    pub fn save(&self, config_dir: &Path) -> Result<PathBuf> {
        fs::create_dir_all(config_dir)?;
        let path = Self::path(config_dir);
        let data = serde_json::to_string_pretty(self)
            .map_err(|e| Error::Config(e.to_string()))?;
        write_private(&path, data.as_bytes())?;
        Ok(path)
    }

    /// Delete the saved session. Returns whether there was one.
    ///
    /// # Errors
    ///
    /// IO errors other than a missing file.
    pub fn remove(config_dir: &Path) -> Result<bool> {
        match fs::remove_file(Self::path(config_dir)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

/// Write `data` to `path`, which is never readable by anyone but the
/// owner, not even while the file is being created.
#[cfg(unix)]
fn write_private(path: &Path, data: &[u8]) -> std::io::Result<()> {
    use std::io::Write;
    use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

    let mut file = fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    // `mode` only applies to new files.
    file.set_permissions(fs::Permissions::from_mode(0o600))?;
    file.write_all(data)
}

#[cfg(not(unix))]
fn write_private(path: &Path, data: &[u8]) -> std::io::Result<()> {
    fs::write(path, data)
}
