use std::time::Duration;

use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// Protocol policy applied to every outbound request
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RequestConfig {
    /// Add `consistent=true` to all requests.
    /// Do not turn this off unless you *know* what you're doing.
    #[serde(default = "default_true")]
    pub consistent: bool,

    /// Add `quorum=true` to all requests that do not `wait`.
    /// Do not turn this off unless you *know* what you're doing.
    #[serde(default = "default_true")]
    pub quorum: bool,

    /// Upper bound on how long a single HTTP call may stay outstanding
    #[serde(default = "default_connection_timeout_in_ms")]
    pub connection_timeout_in_ms: u64,

    /// Leader redirects followed by one request before giving up
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            consistent: default_true(),
            quorum: default_true(),
            connection_timeout_in_ms: default_connection_timeout_in_ms(),
            max_redirects: default_max_redirects(),
        }
    }
}

impl RequestConfig {
    pub fn connection_timeout(&self) -> Duration {
        Duration::from_millis(self.connection_timeout_in_ms)
    }

    pub(super) fn validate(&self) -> Result<()> {
        if self.connection_timeout_in_ms == 0 {
            return Err(Error::Config(ConfigError::Message(
                "request.connection_timeout_in_ms must be greater than 0".into(),
            )));
        }
        Ok(())
    }
}

fn default_true() -> bool {
    true
}
fn default_connection_timeout_in_ms() -> u64 {
    10_000
}
fn default_max_redirects() -> usize {
    16
}
