use std::sync::Arc;
use std::time::Duration;

use super::EtcdClient;
use crate::network::Connector;
use crate::network::Endpoint;
use crate::network::ReqwestConnector;
use crate::ClientConfig;
use crate::InitialReadFailurePolicy;
use crate::Result;

pub struct ClientBuilder {
    config: ClientConfig,
    bootstrap: Endpoint,
    connector: Option<Arc<dyn Connector>>,
}

impl ClientBuilder {
    /// Create a new builder with default config and the bootstrap endpoint
    pub fn new(bootstrap: Endpoint) -> Self {
        Self {
            config: ClientConfig::default(),
            bootstrap,
            connector: None,
        }
    }

    /// Add `consistent=true` to requests (default: enabled)
    pub fn consistent(
        mut self,
        enable: bool,
    ) -> Self {
        self.config.request.consistent = enable;
        self
    }

    /// Add `quorum=true` to non-waiting requests (default: enabled)
    pub fn quorum(
        mut self,
        enable: bool,
    ) -> Self {
        self.config.request.quorum = enable;
        self
    }

    /// Set per-call timeout (default: 10s)
    pub fn connection_timeout(
        mut self,
        timeout: Duration,
    ) -> Self {
        self.config.request.connection_timeout_in_ms = timeout.as_millis() as u64;
        self
    }

    /// Set delay before a failed watch poll is retried (default: 5s)
    pub fn watch_retry_delay(
        mut self,
        delay: Duration,
    ) -> Self {
        self.config.watch.retry_delay_in_ms = delay.as_millis() as u64;
        self
    }

    /// Choose what a watch does when its initial read fails (default: fatal)
    pub fn initial_read_failure(
        mut self,
        policy: InitialReadFailurePolicy,
    ) -> Self {
        self.config.watch.initial_read_failure = policy;
        self
    }

    /// Replace the HTTP transport (default: reqwest)
    pub fn connector(
        mut self,
        connector: Arc<dyn Connector>,
    ) -> Self {
        self.connector = Some(connector);
        self
    }

    /// Completely replaces the default configuration
    ///
    /// Discards all settings made through the individual methods so far.
    pub fn set_config(
        mut self,
        config: ClientConfig,
    ) -> Self {
        self.config = config;
        self
    }

    /// Build the client with current configuration
    pub fn build(self) -> Result<EtcdClient> {
        let connector = match self.connector {
            Some(connector) => connector,
            None => Arc::new(ReqwestConnector::new(self.config.request.connection_timeout())),
        };
        EtcdClient::with_connector(self.config, self.bootstrap, connector)
    }
}
