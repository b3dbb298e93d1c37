//! etcd client facade
//!
//! [`EtcdClient`] exposes the CRUD and watch operations of the v2 keys API.
//! Every operation funnels through [`EtcdClient::generic`], which applies the
//! configured `consistent`/`quorum` policy, runs a request against the
//! current leader and hands the raw response to a per-operation decoder.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::error;

use super::decode;
use super::watch::WatchState;
use super::ClientBuilder;
use super::GenericResponse;
use super::Params;
use super::Request;
use crate::constants::PARAM_PREV_EXIST;
use crate::constants::PARAM_PREV_INDEX;
use crate::constants::PARAM_TTL;
use crate::constants::PARAM_VALUE;
use crate::network::ConnectionRegistry;
use crate::network::Connector;
use crate::network::Endpoint;
use crate::network::Verb;
use crate::ClientConfig;
use crate::Error;
use crate::Node;
use crate::Result;
use crate::WatchUpdate;

/// Asynchronous client for one etcd cluster
///
/// Cheap to clone; clones share the connection registry and leader pointer.
#[derive(Clone)]
pub struct EtcdClient {
    pub(super) inner: Arc<ClientInner>,
}

pub(crate) struct ClientInner {
    pub(crate) config: ClientConfig,
    pub(crate) registry: ConnectionRegistry,
}

impl EtcdClient {
    /// Starts building a client that bootstraps from `host:port`.
    pub fn builder(
        host: impl Into<String>,
        port: u16,
    ) -> ClientBuilder {
        ClientBuilder::new(Endpoint::new(host, port))
    }

    /// Creates a client over a caller-supplied transport.
    pub fn with_connector(
        config: ClientConfig,
        bootstrap: Endpoint,
        connector: Arc<dyn Connector>,
    ) -> Result<Self> {
        config.validate()?;
        let registry = ConnectionRegistry::new(connector, bootstrap)?;
        debug!(leader = %registry.leader_endpoint(), "EtcdClient created");

        Ok(Self {
            inner: Arc::new(ClientInner { config, registry }),
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.inner.registry
    }

    /// Reads one key.
    ///
    /// Returns the node and the store's global index at response time.
    pub async fn get(
        &self,
        key: &str,
    ) -> Result<(Node, i64)> {
        let resp = self.generic(key, Params::new(), Verb::Get, false).await;
        decode::decode_get(resp)
    }

    /// Lists the value-bearing children of directory `dir`.
    ///
    /// An empty directory yields an empty list.
    pub async fn get_all(
        &self,
        dir: &str,
    ) -> Result<(Vec<Node>, i64)> {
        let resp = self.generic(dir, Params::new(), Verb::Get, false).await;
        decode::decode_get_all(resp)
    }

    /// Creates `key`, failing if it already exists.
    ///
    /// Returns the new node's modified index.
    pub async fn create(
        &self,
        key: &str,
        value: &str,
    ) -> Result<i64> {
        let params = Params::new()
            .with(PARAM_VALUE, value)
            .with(PARAM_PREV_EXIST, "false");
        let resp = self.generic(key, params, Verb::Put, false).await;
        decode::decode_create(resp)
    }

    pub async fn create_with_ttl(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<i64> {
        let params = Params::new()
            .with(PARAM_VALUE, value)
            .with(PARAM_PREV_EXIST, "false")
            .with(PARAM_TTL, ttl_seconds(ttl)?);
        let resp = self.generic(key, params, Verb::Put, false).await;
        decode::decode_create(resp)
    }

    /// Appends `value` to the ordered queue under `dir`.
    ///
    /// Returns the server-generated key and its modified index.
    pub async fn create_in_queue(
        &self,
        dir: &str,
        value: &str,
    ) -> Result<(String, i64)> {
        let params = Params::new()
            .with(PARAM_VALUE, value)
            .with(PARAM_PREV_EXIST, "false");
        let resp = self.generic(dir, params, Verb::Post, false).await;
        decode::decode_create_in_queue(resp)
    }

    /// Compare-and-swap on the key's modified index.
    pub async fn update(
        &self,
        key: &str,
        value: &str,
        previous_index: i64,
    ) -> Result<i64> {
        let params = Params::new()
            .with(PARAM_VALUE, value)
            .with(PARAM_PREV_INDEX, previous_index.to_string());
        let resp = self.generic(key, params, Verb::Put, false).await;
        decode::decode_update(resp)
    }

    pub async fn update_with_ttl(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
        previous_index: i64,
    ) -> Result<i64> {
        let params = Params::new()
            .with(PARAM_VALUE, value)
            .with(PARAM_PREV_INDEX, previous_index.to_string())
            .with(PARAM_TTL, ttl_seconds(ttl)?);
        let resp = self.generic(key, params, Verb::Put, false).await;
        decode::decode_update(resp)
    }

    /// Unconditionally sets `key`.
    pub async fn force_set(
        &self,
        key: &str,
        value: &str,
    ) -> Result<i64> {
        let params = Params::new().with(PARAM_VALUE, value);
        let resp = self.generic(key, params, Verb::Put, false).await;
        decode::decode_force_set(resp)
    }

    pub async fn force_set_with_ttl(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<i64> {
        let params = Params::new()
            .with(PARAM_VALUE, value)
            .with(PARAM_TTL, ttl_seconds(ttl)?);
        let resp = self.generic(key, params, Verb::Put, false).await;
        decode::decode_force_set(resp)
    }

    /// Deletes `key` if its modified index is still `current_index`.
    ///
    /// Returns the store's global index after the deletion.
    pub async fn delete(
        &self,
        key: &str,
        current_index: i64,
    ) -> Result<i64> {
        let params = Params::new().with(PARAM_PREV_INDEX, current_index.to_string());
        let resp = self.generic(key, params, Verb::Delete, false).await;
        decode::decode_delete(resp)
    }

    /// Watches `key` (or, with a trailing `/`, the directory below it).
    ///
    /// `callback` first receives the current snapshot as one batch, then one
    /// batch per observed change, strictly in order. The next long poll only
    /// starts once the callback has returned.
    ///
    /// Runs until the watch terminates and returns the terminal status:
    /// [`Error::Cancelled`] once `cancel` fires, or a fatal protocol error.
    pub async fn watch<F>(
        &self,
        key: &str,
        cancel: CancellationToken,
        callback: F,
    ) -> Error
    where
        F: FnMut(Vec<WatchUpdate>) + Send,
    {
        debug!("EtcdClient::Watch: {}", key);
        WatchState::new(self.clone(), key, callback, cancel).run().await
    }

    /// Runs [`watch`](Self::watch) on its own task, cancelled together with
    /// `parent`.
    pub fn spawn_watch<F>(
        &self,
        key: impl Into<String>,
        parent: &CancellationToken,
        callback: F,
    ) -> WatchHandle
    where
        F: FnMut(Vec<WatchUpdate>) + Send + 'static,
    {
        let key = key.into();
        let cancel = parent.child_token();
        let client = self.clone();
        let token = cancel.clone();
        let join = tokio::spawn(async move { client.watch(&key, token, callback).await });

        WatchHandle { cancel, join }
    }

    /// Low-level entry point shared by all operations.
    ///
    /// Adds the policy parameters to `params`, runs the request (following
    /// leader redirects) and returns the undecoded response.
    /// `separate_conn` puts the call on a private connection so a long poll
    /// cannot block unrelated traffic to the same endpoint.
    pub async fn generic(
        &self,
        key: &str,
        mut params: Params,
        verb: Verb,
        separate_conn: bool,
    ) -> GenericResponse {
        let request_config = &self.inner.config.request;
        params.apply_policy(request_config);

        let request = match Request::new(verb, key, separate_conn, &params) {
            Ok(request) => request,
            Err(e) => return GenericResponse::failed(e),
        };

        request
            .run(
                &self.inner.registry,
                request_config.connection_timeout(),
                request_config.max_redirects,
            )
            .await
    }
}

/// A watch running on its own task
pub struct WatchHandle {
    cancel: CancellationToken,
    join: JoinHandle<Error>,
}

impl WatchHandle {
    /// Requests cooperative cancellation; an in-flight poll still runs to
    /// completion or timeout first.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Waits for the watch to terminate and returns its terminal status.
    pub async fn wait(self) -> Error {
        match self.join.await {
            Ok(status) => status,
            Err(e) => {
                error!("watch task failed: {:?}", e);
                Error::Fatal(format!("watch task failed: {e}"))
            }
        }
    }
}

/// etcd TTLs are whole seconds. Partial seconds round up so a short TTL
/// never becomes `ttl=0`; a zero duration is rejected.
fn ttl_seconds(ttl: Duration) -> Result<String> {
    if ttl.is_zero() {
        return Err(Error::invalid_argument("TTL must be positive"));
    }
    let secs = ttl.as_secs() + u64::from(ttl.subsec_nanos() > 0);
    Ok(secs.to_string())
}
