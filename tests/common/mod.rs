//! In-memory stand-in for an etcd v2 member, served over real HTTP
//!
//! Implements just enough of the keys API for the client: plain and
//! directory reads, create / compare-and-swap / set / queue append,
//! compare-and-delete, and `wait=true` long polls against an event log.

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::json;
use serde_json::Value;
use tokio::sync::Notify;
use warp::hyper::body::Bytes;
use warp::http::Method;
use warp::http::StatusCode;
use warp::hyper::Body;
use warp::path::FullPath;
use warp::reply::Response;
use warp::Filter;

use etcd_watch_client::EtcdClient;

const KEYS_PREFIX: &str = "/v2/keys";

static LOGGER_INIT: once_cell::sync::Lazy<()> = once_cell::sync::Lazy::new(|| {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
});

pub fn enable_logger() {
    *LOGGER_INIT;
    println!("setup logger for integration test.");
}

#[derive(Clone)]
struct Entry {
    value: String,
    created_index: i64,
    modified_index: i64,
}

struct Event {
    index: i64,
    key: String,
    action: &'static str,
    node: Value,
}

#[derive(Default)]
struct Store {
    index: i64,
    keys: BTreeMap<String, Entry>,
    events: Vec<Event>,
}

impl Store {
    fn node_json(
        key: &str,
        entry: &Entry,
    ) -> Value {
        json!({
            "key": key,
            "value": entry.value,
            "createdIndex": entry.created_index,
            "modifiedIndex": entry.modified_index,
        })
    }

    fn record(
        &mut self,
        key: &str,
        action: &'static str,
        node: Value,
    ) {
        self.events.push(Event {
            index: self.index,
            key: key.to_string(),
            action,
            node,
        });
    }

    fn first_event_from(
        &self,
        key: &str,
        wait_index: i64,
        recursive: bool,
    ) -> Option<(i64, &'static str, Value)> {
        let dir_prefix = format!("{key}/");
        self.events
            .iter()
            .find(|e| e.index >= wait_index && (e.key == key || (recursive && e.key.starts_with(&dir_prefix))))
            .map(|e| (e.index, e.action, e.node.clone()))
    }
}

#[derive(Default)]
struct Shared {
    store: Mutex<Store>,
    changed: Notify,
    hits: AtomicUsize,
}

/// A running fake member
pub struct FakeEtcd {
    pub addr: SocketAddr,
    shared: Arc<Shared>,
}

impl FakeEtcd {
    pub async fn start() -> Self {
        let shared = Arc::new(Shared::default());
        let state = shared.clone();

        let routes = warp::method()
            .and(warp::path::full())
            .and(warp::query::<HashMap<String, String>>())
            .and(warp::body::bytes())
            .and(warp::any().map(move || state.clone()))
            .then(handle);

        let (addr, server) = warp::serve(routes).bind_ephemeral(([127, 0, 0, 1], 0));
        tokio::spawn(server);

        Self { addr, shared }
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Calls served so far
    pub fn hits(&self) -> usize {
        self.shared.hits.load(Ordering::SeqCst)
    }

    pub fn etcd_index(&self) -> i64 {
        self.shared.store.lock().index
    }
}

/// A member that is not the leader: answers everything with a 307 to `leader`
pub struct FakeFollower {
    pub addr: SocketAddr,
    hits: Arc<AtomicUsize>,
}

impl FakeFollower {
    pub async fn start(leader: SocketAddr) -> Self {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();

        let routes = warp::path::full().map(move |path: FullPath| {
            counter.fetch_add(1, Ordering::SeqCst);
            warp::http::Response::builder()
                .status(StatusCode::TEMPORARY_REDIRECT)
                .header("Location", format!("http://{}{}", leader, path.as_str()))
                .body(Body::empty())
                .unwrap()
        });

        let (addr, server) = warp::serve(routes).bind_ephemeral(([127, 0, 0, 1], 0));
        tokio::spawn(server);

        Self { addr, hits }
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

pub fn client_for(port: u16) -> EtcdClient {
    EtcdClient::builder("127.0.0.1", port)
        .connection_timeout(Duration::from_millis(500))
        .watch_retry_delay(Duration::from_millis(50))
        .build()
        .expect("client should build")
}

fn reply(
    status: StatusCode,
    etcd_index: i64,
    body: Value,
) -> Response {
    warp::http::Response::builder()
        .status(status)
        .header("X-Etcd-Index", etcd_index.to_string())
        .header("Content-Type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn error_reply(
    status: StatusCode,
    error_code: u32,
    message: &str,
    key: &str,
    etcd_index: i64,
) -> Response {
    reply(
        status,
        etcd_index,
        json!({ "errorCode": error_code, "message": message, "cause": key, "index": etcd_index }),
    )
}

async fn handle(
    method: Method,
    path: FullPath,
    query: HashMap<String, String>,
    body: Bytes,
    shared: Arc<Shared>,
) -> Response {
    shared.hits.fetch_add(1, Ordering::SeqCst);

    let Some(raw_key) = path.as_str().strip_prefix(KEYS_PREFIX) else {
        return reply(StatusCode::NOT_FOUND, 0, json!({ "message": "not found" }));
    };
    let key = match raw_key.trim_end_matches('/') {
        "" => "/".to_string(),
        k => k.to_string(),
    };
    let form: HashMap<String, String> = serde_urlencoded::from_bytes(&body).unwrap_or_default();

    match method {
        Method::GET if query.get("wait").map(String::as_str) == Some("true") => {
            let wait_index = query
                .get("waitIndex")
                .and_then(|v| v.parse().ok())
                .unwrap_or(0);
            let recursive = query.get("recursive").map(String::as_str) == Some("true");
            watch(&shared, &key, wait_index, recursive).await
        }
        Method::GET => get(&shared, &key),
        Method::PUT => put(&shared, &key, &form),
        Method::POST => append(&shared, &key, &form),
        Method::DELETE => delete(&shared, &key, &query),
        _ => reply(StatusCode::METHOD_NOT_ALLOWED, 0, json!({ "message": "method not allowed" })),
    }
}

async fn watch(
    shared: &Shared,
    key: &str,
    wait_index: i64,
    recursive: bool,
) -> Response {
    loop {
        let notified = shared.changed.notified();
        {
            let store = shared.store.lock();
            // answered with the index of the event itself
            if let Some((index, action, node)) = store.first_event_from(key, wait_index, recursive) {
                return reply(StatusCode::OK, index, json!({ "action": action, "node": node }));
            }
        }
        notified.await;
    }
}

fn get(
    shared: &Shared,
    key: &str,
) -> Response {
    let store = shared.store.lock();
    if let Some(entry) = store.keys.get(key) {
        return reply(
            StatusCode::OK,
            store.index,
            json!({ "action": "get", "node": Store::node_json(key, entry) }),
        );
    }

    let dir_prefix = if key == "/" { "/".to_string() } else { format!("{key}/") };
    let children: Vec<Value> = store
        .keys
        .iter()
        .filter(|(k, _)| k.starts_with(&dir_prefix))
        .map(|(k, e)| Store::node_json(k, e))
        .collect();
    if children.is_empty() {
        return error_reply(StatusCode::NOT_FOUND, 100, "Key not found", key, store.index);
    }

    reply(
        StatusCode::OK,
        store.index,
        json!({ "action": "get", "node": { "key": key, "dir": true, "nodes": children } }),
    )
}

fn put(
    shared: &Shared,
    key: &str,
    form: &HashMap<String, String>,
) -> Response {
    let mut store = shared.store.lock();
    let existing = store.keys.get(key).cloned();
    let value = form.get("value").cloned().unwrap_or_default();

    let (status, action) = if form.get("prevExist").map(String::as_str) == Some("false") {
        if existing.is_some() {
            return error_reply(StatusCode::PRECONDITION_FAILED, 105, "Key already exists", key, store.index);
        }
        (StatusCode::CREATED, "create")
    } else if let Some(prev_index) = form.get("prevIndex") {
        let Some(entry) = &existing else {
            return error_reply(StatusCode::NOT_FOUND, 100, "Key not found", key, store.index);
        };
        if entry.modified_index.to_string() != *prev_index {
            return error_reply(StatusCode::PRECONDITION_FAILED, 101, "Compare failed", key, store.index);
        }
        (StatusCode::OK, "compareAndSwap")
    } else {
        (StatusCode::OK, "set")
    };

    store.index += 1;
    let index = store.index;
    let entry = Entry {
        value,
        created_index: existing.map(|e| e.created_index).unwrap_or(index),
        modified_index: index,
    };
    let node = Store::node_json(key, &entry);
    store.keys.insert(key.to_string(), entry);
    store.record(key, action, node.clone());
    drop(store);
    shared.changed.notify_waiters();

    reply(status, index, json!({ "action": action, "node": node }))
}

fn append(
    shared: &Shared,
    dir: &str,
    form: &HashMap<String, String>,
) -> Response {
    let mut store = shared.store.lock();
    store.index += 1;
    let index = store.index;
    let key = format!("{dir}/{index:020}");
    let entry = Entry {
        value: form.get("value").cloned().unwrap_or_default(),
        created_index: index,
        modified_index: index,
    };
    let node = Store::node_json(&key, &entry);
    store.keys.insert(key.clone(), entry);
    store.record(&key, "create", node.clone());
    drop(store);
    shared.changed.notify_waiters();

    reply(StatusCode::CREATED, index, json!({ "action": "create", "node": node }))
}

fn delete(
    shared: &Shared,
    key: &str,
    query: &HashMap<String, String>,
) -> Response {
    let mut store = shared.store.lock();
    let Some(entry) = store.keys.get(key).cloned() else {
        return error_reply(StatusCode::NOT_FOUND, 100, "Key not found", key, store.index);
    };
    if let Some(prev_index) = query.get("prevIndex") {
        if entry.modified_index.to_string() != *prev_index {
            return error_reply(StatusCode::PRECONDITION_FAILED, 101, "Compare failed", key, store.index);
        }
    }

    store.index += 1;
    let index = store.index;
    store.keys.remove(key);
    let node = json!({ "key": key, "createdIndex": entry.created_index, "modifiedIndex": index });
    store.record(key, "compareAndDelete", node.clone());
    drop(store);
    shared.changed.notify_waiters();

    reply(StatusCode::OK, index, json!({ "action": "compareAndDelete", "node": node }))
}
