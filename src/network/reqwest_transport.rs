use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::redirect::Policy;
use reqwest::Client;
use reqwest::Method;
use tracing::debug;
use tracing::trace;

use super::Connector;
use super::Endpoint;
use super::HttpConnection;
use super::HttpRequest;
use super::HttpResponse;
use super::TransportError;
use super::Verb;
use crate::Error;
use crate::Result;

/// Builds [`ReqwestConnection`]s
#[derive(Debug, Clone)]
pub struct ReqwestConnector {
    connect_timeout: Duration,
}

impl ReqwestConnector {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

impl Connector for ReqwestConnector {
    fn connect(
        &self,
        endpoint: &Endpoint,
    ) -> Result<Arc<dyn HttpConnection>> {
        let conn = ReqwestConnection::new(endpoint.clone(), self.connect_timeout)?;
        Ok(Arc::new(conn))
    }
}

/// Plain-HTTP connection backed by its own reqwest connection pool
#[derive(Debug, Clone)]
pub struct ReqwestConnection {
    endpoint: Endpoint,
    connect_timeout: Duration,
    client: Client,
}

impl ReqwestConnection {
    pub fn new(
        endpoint: Endpoint,
        connect_timeout: Duration,
    ) -> Result<Self> {
        debug!(%endpoint, "creating http connection");
        let client = Client::builder()
            .redirect(Policy::none())
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| {
                Error::Transport(TransportError::Connect {
                    endpoint: endpoint.to_string(),
                    message: e.to_string(),
                })
            })?;

        Ok(Self {
            endpoint,
            connect_timeout,
            client,
        })
    }

    fn method(verb: Verb) -> Method {
        match verb {
            Verb::Get => Method::GET,
            Verb::Put => Method::PUT,
            Verb::Post => Method::POST,
            Verb::Delete => Method::DELETE,
        }
    }

    /// `Endpoint`'s display form brackets IPv6 hosts.
    pub(super) fn url(
        &self,
        uri: &str,
    ) -> String {
        format!("http://{}{}", self.endpoint, uri)
    }

    fn map_error(
        &self,
        e: reqwest::Error,
    ) -> TransportError {
        if e.is_timeout() {
            TransportError::Timeout(self.endpoint.to_string())
        } else if e.is_connect() {
            TransportError::Connect {
                endpoint: self.endpoint.to_string(),
                message: e.to_string(),
            }
        } else {
            TransportError::Other(e.to_string())
        }
    }
}

#[async_trait]
impl HttpConnection for ReqwestConnection {
    fn endpoint(&self) -> Endpoint {
        self.endpoint.clone()
    }

    fn clone_private(&self) -> Result<Arc<dyn HttpConnection>> {
        // a fresh client means a fresh pool
        let conn = ReqwestConnection::new(self.endpoint.clone(), self.connect_timeout)?;
        Ok(Arc::new(conn))
    }

    async fn send(
        &self,
        request: HttpRequest,
        timeout: Duration,
    ) -> std::result::Result<HttpResponse, TransportError> {
        let url = self.url(&request.uri);
        trace!(verb = %request.verb, %url, "sending request");

        let mut builder = self
            .client
            .request(Self::method(request.verb), &url)
            .timeout(timeout);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if !request.body.is_empty() {
            builder = builder.body(request.body);
        }

        let response = builder.send().await.map_err(|e| self.map_error(e))?;
        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = response.bytes().await.map_err(|e| self.map_error(e))?;

        Ok(HttpResponse {
            status,
            headers,
            body: body.to_vec(),
        })
    }
}
