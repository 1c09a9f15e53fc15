use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// The default timeout for authorization requests.
pub const DEFAULT_AUTH_TIMEOUT: Duration = Duration::from_secs(10);

/// The default time to wait for the reply to a helper command.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(10);

/// Options used when starting a [`Session`][crate::Session].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Configuration {
    /// Path to the helper executable. Only used by the helper-process backend.
    pub shim_path: Option<PathBuf>,
    /// Socket path the helper listens on. A unique temporary path is generated when absent.
    pub socket_path: Option<PathBuf>,
    /// How long an authorization challenge waits for the authorizer.
    pub auth_timeout: Duration,
    /// How long a helper command waits for its reply.
    pub command_timeout: Duration,
}

impl Default for Configuration {
    fn default() -> Self {
        Configuration {
            shim_path: None,
            socket_path: None,
            auth_timeout: DEFAULT_AUTH_TIMEOUT,
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }
}

impl Configuration {
    /// Sets the helper executable path.
    pub fn with_shim_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.shim_path = Some(path.into());
        self
    }

    /// Sets the helper socket path.
    pub fn with_socket_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.socket_path = Some(path.into());
        self
    }

    /// Sets the authorization timeout.
    pub fn with_auth_timeout(mut self, timeout: Duration) -> Self {
        self.auth_timeout = timeout;
        self
    }

    /// Sets the helper command reply timeout.
    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }
}
