use std::collections::HashMap;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::network::Connector;
use crate::network::Endpoint;
use crate::network::HttpConnection;
use crate::network::HttpRequest;
use crate::network::HttpResponse;
use crate::network::TransportError;
use crate::Result;

/// What a scripted endpoint does with the next call
#[derive(Debug, Clone)]
pub enum Scripted {
    Respond(HttpResponse),
    Fail(TransportError),
}

/// One call observed by the fake
#[derive(Debug, Clone)]
pub struct SentRequest {
    pub endpoint: Endpoint,
    /// Issued on a connection obtained through `clone_private`
    pub private: bool,
    pub request: HttpRequest,
}

impl SentRequest {
    pub fn body_str(&self) -> String {
        String::from_utf8_lossy(&self.request.body).into_owned()
    }
}

#[derive(Default)]
struct FakeState {
    scripts: HashMap<Endpoint, VecDeque<Scripted>>,
    sent: Vec<SentRequest>,
    connects: Vec<Endpoint>,
}

/// In-memory transport answering calls from per-endpoint scripts
///
/// Once an endpoint's script is exhausted, further calls block for the full
/// call timeout and then fail with [`TransportError::Timeout`], like a long
/// poll that never saw a change.
#[derive(Clone, Default)]
pub struct FakeConnector {
    state: Arc<Mutex<FakeState>>,
}

impl FakeConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(
        &self,
        endpoint: &Endpoint,
        response: HttpResponse,
    ) -> &Self {
        self.push(endpoint, Scripted::Respond(response))
    }

    pub fn fail(
        &self,
        endpoint: &Endpoint,
        error: TransportError,
    ) -> &Self {
        self.push(endpoint, Scripted::Fail(error))
    }

    fn push(
        &self,
        endpoint: &Endpoint,
        step: Scripted,
    ) -> &Self {
        self.state
            .lock()
            .scripts
            .entry(endpoint.clone())
            .or_default()
            .push_back(step);
        self
    }

    pub fn sent(&self) -> Vec<SentRequest> {
        self.state.lock().sent.clone()
    }

    /// Endpoints for which the connector opened a shared connection
    pub fn connects(&self) -> Vec<Endpoint> {
        self.state.lock().connects.clone()
    }

    pub fn remaining(
        &self,
        endpoint: &Endpoint,
    ) -> usize {
        self.state
            .lock()
            .scripts
            .get(endpoint)
            .map(VecDeque::len)
            .unwrap_or_default()
    }
}

impl Connector for FakeConnector {
    fn connect(
        &self,
        endpoint: &Endpoint,
    ) -> Result<Arc<dyn HttpConnection>> {
        self.state.lock().connects.push(endpoint.clone());
        Ok(Arc::new(FakeConnection {
            endpoint: endpoint.clone(),
            private: false,
            state: self.state.clone(),
        }))
    }
}

struct FakeConnection {
    endpoint: Endpoint,
    private: bool,
    state: Arc<Mutex<FakeState>>,
}

#[async_trait]
impl HttpConnection for FakeConnection {
    fn endpoint(&self) -> Endpoint {
        self.endpoint.clone()
    }

    fn clone_private(&self) -> Result<Arc<dyn HttpConnection>> {
        Ok(Arc::new(FakeConnection {
            endpoint: self.endpoint.clone(),
            private: true,
            state: self.state.clone(),
        }))
    }

    async fn send(
        &self,
        request: HttpRequest,
        timeout: Duration,
    ) -> std::result::Result<HttpResponse, TransportError> {
        let next = {
            let mut state = self.state.lock();
            state.sent.push(SentRequest {
                endpoint: self.endpoint.clone(),
                private: self.private,
                request,
            });
            state
                .scripts
                .get_mut(&self.endpoint)
                .and_then(VecDeque::pop_front)
        };

        match next {
            Some(Scripted::Respond(response)) => Ok(response),
            Some(Scripted::Fail(e)) => Err(e),
            None => {
                tokio::time::sleep(timeout).await;
                Err(TransportError::Timeout(self.endpoint.to_string()))
            }
        }
    }
}
