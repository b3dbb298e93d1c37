//! Client for the etcd v2 keys API
//!
//! Provides the components for talking to an etcd cluster:
//! - [`EtcdClient`] - CRUD and watch operations, leader tracking
//! - [`ClientBuilder`] - Configurable client construction
//! - [`WatchHandle`] - A watch running on its own task
//! - [`GenericResponse`] - Raw outcome of one call, for custom operations
//!
//! # Basic Usage
//! ```no_run
//! use etcd_watch_client::EtcdClient;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let client = EtcdClient::builder("127.0.0.1", 2379).build().unwrap();
//!
//!     let index = client.create("/config/a", "1").await.unwrap();
//!     let (node, _) = client.get("/config/a").await.unwrap();
//!     println!("{node} created at {index}");
//!
//!     let shutdown = CancellationToken::new();
//!     let watch = client.spawn_watch("/config/", &shutdown, |updates| {
//!         for u in updates {
//!             println!("{} exists={}", u.node, u.exists);
//!         }
//!     });
//!
//!     shutdown.cancel();
//!     println!("watch ended: {}", watch.wait().await);
//! }
//! ```

mod builder;
mod client;
mod decode;
mod node;
mod params;
mod request;
mod watch;

pub use builder::*;
pub use client::*;
pub use node::*;
pub use params::*;
pub use request::GenericResponse;

pub(crate) use request::Request;
