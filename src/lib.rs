//! Asynchronous client for the etcd v2 HTTP keys API
//!
//! Tracks the cluster leader across redirects, decodes the v2 JSON protocol
//! into typed results and keeps long-poll watches running across transient
//! failures.

mod client;
mod config;
mod constants;
mod errors;
pub mod metrics;
pub mod network;
mod utils;

pub use client::*;
pub use self::config::*;
pub use constants::UNKNOWN_INDEX;
pub use errors::*;

//-----------------------------------------------------------
// Test utils
