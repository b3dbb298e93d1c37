use std::time::Duration;

use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// What a watch does when its seeding snapshot read fails
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum InitialReadFailurePolicy {
    /// Terminate the watch with [`Error::InitialRead`]
    #[default]
    Fatal,
    /// Re-issue the snapshot read after `retry_delay_in_ms`
    Retry,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct WatchConfig {
    /// Delay between retrying failed long-poll requests
    #[serde(default = "default_retry_delay_in_ms")]
    pub retry_delay_in_ms: u64,

    #[serde(default)]
    pub initial_read_failure: InitialReadFailurePolicy,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            retry_delay_in_ms: default_retry_delay_in_ms(),
            initial_read_failure: InitialReadFailurePolicy::default(),
        }
    }
}

impl WatchConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_in_ms)
    }

    pub(super) fn validate(&self) -> Result<()> {
        if self.retry_delay_in_ms == 0 {
            return Err(Error::Config(ConfigError::Message(
                "watch.retry_delay_in_ms must be greater than 0".into(),
            )));
        }
        Ok(())
    }
}

fn default_retry_delay_in_ms() -> u64 {
    5_000
}
