//! Lifecycle of one protocol call
//!
//! A [`Request`] is built once from a key, verb and parameter set, then run:
//! `Created -> Running -> (Redirected -> Running)* -> Completed | Failed`.
//! Leader redirects re-issue the same logical request against the new leader
//! and are never visible to the caller.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use reqwest::Url;
use serde_json::Value;
use tracing::debug;
use tracing::warn;

use crate::constants::ETCD_INDEX_HEADER;
use crate::constants::FORM_CONTENT_TYPE;
use crate::constants::KEYS_PREFIX;
use crate::constants::LOCATION_HEADER;
use crate::constants::TEMPORARY_REDIRECT;
use crate::constants::UNKNOWN_INDEX;
use crate::metrics::REQUESTS_TOTAL;
use crate::metrics::REQUEST_ERRORS_TOTAL;
use crate::network::ConnectionRegistry;
use crate::network::HttpConnection;
use crate::network::HttpRequest;
use crate::network::HttpResponse;
use crate::network::Verb;
use crate::utils::ScopedTimer;
use crate::Error;
use crate::ErrorCode;
use crate::Params;
use crate::Result;

/// Decode context for one completed call
#[derive(Debug)]
pub struct GenericResponse {
    /// Transport failure, or the HTTP status mapped onto [`ErrorCode`]
    pub status: Result<()>,
    /// Parsed body; `Value::Null` when absent or not JSON
    pub json_body: Value,
    /// Global index from the response header, -1 when absent
    pub etcd_index: i64,
    responded: bool,
}

impl GenericResponse {
    pub(crate) fn failed(error: Error) -> Self {
        Self {
            status: Err(error),
            json_body: Value::Null,
            etcd_index: UNKNOWN_INDEX,
            responded: false,
        }
    }

    pub(crate) fn from_http(response: &HttpResponse) -> Self {
        let etcd_index = response
            .header(ETCD_INDEX_HEADER)
            .and_then(|v| v.trim().parse::<i64>().ok())
            .unwrap_or(UNKNOWN_INDEX);
        let json_body: Value = serde_json::from_slice(&response.body).unwrap_or(Value::Null);

        let code = ErrorCode::from_http_status(response.status);
        let status = if code == ErrorCode::Ok {
            Ok(())
        } else {
            REQUEST_ERRORS_TOTAL.with_label_values(&[code.as_str()]).inc();
            Err(Error::api(code, message_from_body(&json_body, &response.body)))
        };

        Self {
            status,
            json_body,
            etcd_index,
            responded: true,
        }
    }

    /// True when a final HTTP answer arrived, successfully or not.
    ///
    /// False for transport failures, unusable redirects and requests that
    /// were never sent.
    pub fn has_response(&self) -> bool {
        self.responded
    }
}

/// Error text for a non-OK response: the body's `message` field if present,
/// else the whole body.
fn message_from_body(
    json: &Value,
    raw: &[u8],
) -> String {
    match json.get("message").and_then(Value::as_str) {
        Some(message) => message.to_string(),
        None if json.is_null() => String::from_utf8_lossy(raw).into_owned(),
        None => json.to_string(),
    }
}

pub(crate) struct Request {
    verb: Verb,
    path: String,
    separate_conn: bool,
    params: String,

    // Only the bound connection is guarded; everything else is owned by the
    // future driving this request.
    conn: Mutex<Option<Arc<dyn HttpConnection>>>,
}

impl Request {
    pub(crate) fn new(
        verb: Verb,
        key: &str,
        separate_conn: bool,
        params: &Params,
    ) -> Result<Self> {
        if !key.starts_with('/') {
            return Err(Error::invalid_argument(format!(
                "key must be absolute, got {key:?}"
            )));
        }

        Ok(Self {
            verb,
            path: format!("{KEYS_PREFIX}{key}"),
            separate_conn,
            params: params.encode(),
            conn: Mutex::new(None),
        })
    }

    pub(crate) fn http_request(&self) -> HttpRequest {
        if self.verb.has_form_body() {
            HttpRequest {
                verb: self.verb,
                uri: self.path.clone(),
                headers: vec![("Content-Type".to_string(), FORM_CONTENT_TYPE.to_string())],
                body: self.params.clone().into_bytes(),
            }
        } else {
            let uri = if self.params.is_empty() {
                self.path.clone()
            } else {
                format!("{}?{}", self.path, self.params)
            };
            HttpRequest {
                verb: self.verb,
                uri,
                headers: Vec::new(),
                body: Vec::new(),
            }
        }
    }

    /// Runs the request to completion, following leader redirects.
    pub(crate) async fn run(
        &self,
        registry: &ConnectionRegistry,
        timeout: Duration,
        max_redirects: usize,
    ) -> GenericResponse {
        let _timer = ScopedTimer::new("request::run");

        let mut leader = registry.get_leader();
        let mut redirects = 0;
        loop {
            let conn = match self.bind(&leader) {
                Ok(conn) => conn,
                Err(e) => return GenericResponse::failed(e),
            };

            REQUESTS_TOTAL.with_label_values(&[self.verb.as_str()]).inc();
            let outcome = conn.send(self.http_request(), timeout).await;

            // The call is over; it is too late to cancel it anyway.
            self.reset();

            let response = match outcome {
                Ok(response) => response,
                Err(e) => {
                    debug!(path = %self.path, "request produced no response: {}", e);
                    REQUEST_ERRORS_TOTAL
                        .with_label_values(&[ErrorCode::Unknown.as_str()])
                        .inc();
                    return GenericResponse::failed(Error::Transport(e));
                }
            };

            if response.status != TEMPORARY_REDIRECT {
                return GenericResponse::from_http(&response);
            }

            redirects += 1;
            if redirects > max_redirects {
                warn!(path = %self.path, "giving up after {} leader redirects", max_redirects);
                return GenericResponse::failed(Error::api(
                    ErrorCode::Unavailable,
                    format!("too many leader redirects ({max_redirects})"),
                ));
            }

            match self.follow_redirect(registry, &response) {
                Ok(next) => leader = next,
                Err(e) => return GenericResponse::failed(e),
            }
        }
    }

    /// Updates the registry's leader from a 307 `Location` header.
    fn follow_redirect(
        &self,
        registry: &ConnectionRegistry,
        response: &HttpResponse,
    ) -> Result<Arc<dyn HttpConnection>> {
        let location = response
            .header(LOCATION_HEADER)
            .ok_or_else(|| Error::api(ErrorCode::Unknown, "redirect without a Location header"))?;

        let url = Url::parse(location).map_err(|e| {
            Error::api(
                ErrorCode::Unknown,
                format!("unparsable redirect location {location:?}: {e}"),
            )
        })?;
        let host = url
            .host_str()
            .ok_or_else(|| Error::api(ErrorCode::Unknown, format!("redirect location {location:?} has no host")))?;
        let port = url
            .port_or_known_default()
            .ok_or_else(|| Error::api(ErrorCode::Unknown, format!("redirect location {location:?} has no port")))?;

        registry.update_leader(host, port)
    }

    fn bind(
        &self,
        conn: &Arc<dyn HttpConnection>,
    ) -> Result<Arc<dyn HttpConnection>> {
        let conn = if self.separate_conn {
            conn.clone_private()?
        } else {
            conn.clone()
        };

        let mut bound = self.conn.lock();
        if bound.is_some() {
            return Err(Error::Fatal("running an already running request".to_string()));
        }
        *bound = Some(conn.clone());
        Ok(conn)
    }

    fn reset(&self) {
        self.conn.lock().take();
    }

    #[cfg(test)]
    pub(crate) fn is_bound(&self) -> bool {
        self.conn.lock().is_some()
    }
}
