//! Inventory record for a monitored device.

use std::fmt;
use std::path::PathBuf;

use async_ssh2_tokio::client::AuthMethod;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::config::DEFAULT_PORT;

/// Identity and credentials of one remote device.
///
/// Built by whoever loads the inventory and handed to the session manager,
/// which only reads it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Device {
    /// Hostname or address of the device.
    pub host: String,

    /// SSH port, 22 unless the inventory says otherwise.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Login user.
    pub username: String,

    /// How to authenticate.
    pub auth: Auth,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

impl Device {
    /// Creates a device with password authentication on the default port.
    pub fn with_password(
        host: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_PORT,
            username: username.into(),
            auth: Auth::Password {
                password: password.into(),
            },
        }
    }

    /// `user@host:port`, used to tag log records.
    pub fn addr(&self) -> String {
        format!("{}@{}:{}", self.username, self.host, self.port)
    }
}

/// Authentication method for a device.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum Auth {
    Password {
        password: String,
    },
    /// Private key read from disk when connecting.
    KeyFile {
        path: PathBuf,
        #[serde(default)]
        passphrase: Option<String>,
    },
    /// Private key given inline in OpenSSH format.
    Key {
        key: String,
        #[serde(default)]
        passphrase: Option<String>,
    },
}

impl Auth {
    pub(crate) fn to_auth_method(&self) -> AuthMethod {
        match self {
            Auth::Password { password } => AuthMethod::with_password(password),
            Auth::KeyFile { path, passphrase } => {
                AuthMethod::with_key_file(path, passphrase.as_deref())
            }
            Auth::Key { key, passphrase } => AuthMethod::with_key(key, passphrase.as_deref()),
        }
    }
}

// Secrets stay out of logs.
impl fmt::Debug for Auth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Auth::Password { .. } => f.debug_struct("Password").finish_non_exhaustive(),
            Auth::KeyFile { path, .. } => f
                .debug_struct("KeyFile")
                .field("path", path)
                .finish_non_exhaustive(),
            Auth::Key { .. } => f.debug_struct("Key").finish_non_exhaustive(),
        }
    }
}
