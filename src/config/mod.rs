//! Configuration management for the etcd client.
//!
//! Settings are layered with increasing priority:
//! 1. Default values (hardcoded)
//! 2. The file named by the `CONFIG_PATH` environment variable
//! 3. Environment variables (`ETCD_CLIENT__<SECTION>__<KEY>`)
//!
//! Loading never validates; call [`ClientConfig::validate`] once all
//! overrides are applied.

mod request;
mod watch;
pub use request::*;
pub use watch::*;


//---
use std::env;

use config::Config;
use config::Environment;
use config::File;
use serde::Deserialize;
use serde::Serialize;

use crate::Result;

/// Top-level client settings
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct ClientConfig {
    /// Per-request protocol policy and transport limits
    #[serde(default)]
    pub request: RequestConfig,

    /// Watch retry behaviour
    #[serde(default)]
    pub watch: WatchConfig,
}

impl ClientConfig {
    /// Builds a configuration from defaults, the optional `CONFIG_PATH` file
    /// and `ETCD_CLIENT__*` environment variables.
    pub fn new() -> Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);

        if let Ok(config_path) = env::var("CONFIG_PATH") {
            builder = builder.add_source(File::with_name(&config_path).required(true));
        }

        builder = builder.add_source(
            Environment::with_prefix("ETCD_CLIENT")
                .separator("__")
                .ignore_empty(true)
                .try_parsing(true),
        );

        let config: Self = builder.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Applies overrides from `path` on top of `self`.
    ///
    /// Environment variables still win over the file.
    pub fn with_override_config(
        &self,
        path: &str,
    ) -> Result<Self> {
        let config: Self = Config::builder()
            .add_source(Config::try_from(self)?)
            .add_source(File::with_name(path).required(true))
            .add_source(
                Environment::with_prefix("ETCD_CLIENT")
                    .separator("__")
                    .ignore_empty(true)
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.request.validate()?;
        self.watch.validate()?;
        Ok(())
    }
}
