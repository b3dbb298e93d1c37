use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::debug;
use tracing::info;

use super::Connector;
use super::Endpoint;
use super::HttpConnection;
use crate::metrics::LEADER_REDIRECTS;
use crate::Result;

/// Endpoint -> connection map plus the currently believed leader
///
/// Entries are never evicted: the set of endpoints a client ever talks to is
/// small and stable. Only the leader pointer is shared mutable state, and it
/// sits behind its own lock.
pub struct ConnectionRegistry {
    connector: Arc<dyn Connector>,
    conns: DashMap<Endpoint, Arc<dyn HttpConnection>>,
    leader: Mutex<Arc<dyn HttpConnection>>,
}

impl ConnectionRegistry {
    /// Creates the registry with `bootstrap` as the initial leader.
    pub fn new(
        connector: Arc<dyn Connector>,
        bootstrap: Endpoint,
    ) -> Result<Self> {
        let conns = DashMap::new();
        let leader = connector.connect(&bootstrap)?;
        conns.insert(bootstrap, leader.clone());

        Ok(Self {
            connector,
            conns,
            leader: Mutex::new(leader),
        })
    }

    /// Returns the existing connection for `host:port`, creating and
    /// registering one on first use.
    pub fn get_connection(
        &self,
        host: &str,
        port: u16,
    ) -> Result<Arc<dyn HttpConnection>> {
        let endpoint = Endpoint::new(host, port);
        if let Some(conn) = self.conns.get(&endpoint) {
            return Ok(conn.value().clone());
        }

        match self.conns.entry(endpoint) {
            dashmap::mapref::entry::Entry::Occupied(e) => Ok(e.get().clone()),
            dashmap::mapref::entry::Entry::Vacant(e) => {
                debug!(endpoint = %e.key(), "registering new connection");
                let conn = self.connector.connect(e.key())?;
                e.insert(conn.clone());
                Ok(conn)
            }
        }
    }

    pub fn get_leader(&self) -> Arc<dyn HttpConnection> {
        self.leader.lock().clone()
    }

    /// Points the leader at `host:port` and returns its connection.
    pub fn update_leader(
        &self,
        host: &str,
        port: u16,
    ) -> Result<Arc<dyn HttpConnection>> {
        let conn = self.get_connection(host, port)?;
        info!("etcd leader: {}", conn.endpoint());
        LEADER_REDIRECTS.inc();

        *self.leader.lock() = conn.clone();
        Ok(conn)
    }

    pub fn leader_endpoint(&self) -> Endpoint {
        self.get_leader().endpoint()
    }

    /// Number of distinct endpoints ever contacted
    pub fn len(&self) -> usize {
        self.conns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conns.is_empty()
    }
}
