//! Watch state machine
//!
//! ```text
//! InitialRead -> SendUpdates -> StartRequest -> RequestDone -+-> SendUpdates -> StartRequest ...
//!                                    ^                       |
//!                                    +---- RetryRequest <----+
//! any state -> Terminated(Cancelled | fatal)
//! ```
//!
//! Updates for one watch are delivered one batch at a time in non-decreasing
//! global-index order: the next long poll is only issued after the callback
//! for the previous batch has returned.
//!
//! Each poll resumes at `highest_index_seen + 1`. If the server's retained
//! event window has already moved past that index (sustained write load during
//! a retry delay), the skipped events are lost without detection.

use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::info;
use tracing::trace;
use tracing::warn;

use super::decode::decode_watch_update;
use super::EtcdClient;
use super::GenericResponse;
use super::Params;
use crate::constants::PARAM_RECURSIVE;
use crate::constants::PARAM_WAIT;
use crate::constants::PARAM_WAIT_INDEX;
use crate::constants::UNKNOWN_INDEX;
use crate::metrics::WATCH_RETRIES;
use crate::metrics::WATCH_UPDATES_DELIVERED;
use crate::network::Verb;
use crate::Error;
use crate::InitialReadFailurePolicy;
use crate::Node;
use crate::Result;
use crate::WatchUpdate;
use crate::key_is_directory;

#[derive(Debug)]
enum Step {
    InitialRead,
    InitialReadDone(Result<(Vec<Node>, i64)>),
    RetryInitialRead,
    StartRequest,
    RequestDone(GenericResponse),
    RetryRequest,
    SendUpdates(Vec<WatchUpdate>),
    Terminated(Error),
}

pub(crate) struct WatchState<F> {
    client: EtcdClient,
    key: String,
    callback: F,
    cancel: CancellationToken,
    highest_index_seen: i64,
}

impl<F> WatchState<F>
where
    F: FnMut(Vec<WatchUpdate>) + Send,
{
    pub(crate) fn new(
        client: EtcdClient,
        key: &str,
        callback: F,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            client,
            key: key.to_string(),
            callback,
            cancel,
            highest_index_seen: UNKNOWN_INDEX,
        }
    }

    /// Drives the machine until it terminates.
    pub(crate) async fn run(mut self) -> Error {
        let mut step = Step::InitialRead;
        loop {
            step = match step {
                Step::Terminated(status) => {
                    debug!("EtcdClient::Watch: no longer watching {}: {}", self.key, status);
                    return status;
                }
                step => self.advance(step).await,
            };
        }
    }

    async fn advance(
        &mut self,
        step: Step,
    ) -> Step {
        match step {
            Step::InitialRead => self.initial_read().await,
            Step::InitialReadDone(result) => self.initial_read_done(result),
            Step::RetryInitialRead => {
                self.delay().await;
                if self.cancel_requested() {
                    return Step::Terminated(Error::Cancelled);
                }
                Step::InitialRead
            }
            Step::StartRequest => self.start_request().await,
            Step::RequestDone(resp) => self.request_done(resp),
            Step::RetryRequest => {
                WATCH_RETRIES.inc();
                self.delay().await;
                Step::StartRequest
            }
            Step::SendUpdates(updates) => self.send_updates(updates),
            Step::Terminated(status) => Step::Terminated(status),
        }
    }

    fn cancel_requested(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Sleeps for the retry delay; cancellation cuts it short and is then
    /// observed by the next step.
    async fn delay(&mut self) {
        tokio::select! {
            _ = self.cancel.cancelled() => {}
            _ = tokio::time::sleep(self.client.config().watch.retry_delay()) => {}
        }
    }

    async fn initial_read(&mut self) -> Step {
        let result = if key_is_directory(&self.key) {
            self.client.get_all(&self.key).await
        } else {
            self.client
                .get(&self.key)
                .await
                .map(|(node, etcd_index)| (vec![node], etcd_index))
        };
        Step::InitialReadDone(result)
    }

    fn initial_read_done(
        &mut self,
        result: Result<(Vec<Node>, i64)>,
    ) -> Step {
        if self.cancel_requested() {
            return Step::Terminated(Error::Cancelled);
        }

        let (nodes, etcd_index) = match result {
            Ok(snapshot) => snapshot,
            Err(e) => {
                return match self.client.config().watch.initial_read_failure {
                    InitialReadFailurePolicy::Fatal => Step::Terminated(Error::InitialRead {
                        key: self.key.clone(),
                        source: Box::new(e),
                    }),
                    InitialReadFailurePolicy::Retry => {
                        warn!("initial get error for watch on {}: {}", self.key, e);
                        Step::RetryInitialRead
                    }
                };
            }
        };

        self.highest_index_seen = etcd_index;
        let updates = nodes
            .into_iter()
            .map(|node| WatchUpdate::new(node, true))
            .collect();
        Step::SendUpdates(updates)
    }

    async fn start_request(&mut self) -> Step {
        if self.cancel_requested() {
            return Step::Terminated(Error::Cancelled);
        }

        let params = Params::new()
            .with(PARAM_WAIT, "true")
            .with(PARAM_WAIT_INDEX, (self.highest_index_seen + 1).to_string())
            .with(PARAM_RECURSIVE, "true");

        let resp = self.client.generic(&self.key, params, Verb::Get, true).await;
        Step::RequestDone(resp)
    }

    fn request_done(
        &mut self,
        resp: GenericResponse,
    ) -> Step {
        trace!("etcd_index: {}", resp.etcd_index);

        // A poll that got no answer carries no index to check.
        if resp.has_response() {
            if resp.etcd_index < self.highest_index_seen {
                return Step::Terminated(Error::IndexRegression {
                    key: self.key.clone(),
                    seen: self.highest_index_seen,
                    received: resp.etcd_index,
                });
            }
            self.highest_index_seen = resp.etcd_index;
        }

        if self.cancel_requested() {
            return Step::Terminated(Error::Cancelled);
        }

        match decode_watch_update(resp) {
            Ok(update) => {
                // never ask for the delivered event again
                self.highest_index_seen = self.highest_index_seen.max(update.node.modified_index);
                Step::SendUpdates(vec![update])
            }
            Err(e) => {
                info!("Watch request on {} failed: {}", self.key, e);
                Step::RetryRequest
            }
        }
    }

    fn send_updates(
        &mut self,
        updates: Vec<WatchUpdate>,
    ) -> Step {
        WATCH_UPDATES_DELIVERED.inc_by(updates.len() as u64);
        (self.callback)(updates);

        Step::StartRequest
    }
}
