use std::fmt;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde::Deserialize;
use serde::Serialize;

/// A key/value entry as stored by etcd
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    /// Global index at which the key was created
    pub created_index: i64,
    /// Global index of the last change, never below `created_index`
    pub modified_index: i64,
    /// Absolute key path
    pub key: String,
    pub value: String,
    /// `None` means the key never expires
    pub expires: Option<SystemTime>,
    pub deleted: bool,
}

impl Node {
    pub fn new(
        created_index: i64,
        modified_index: i64,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            created_index,
            modified_index,
            key: key.into(),
            value: value.into(),
            expires: None,
            deleted: false,
        }
    }

    /// Sentinel standing for "no node"
    pub fn invalid() -> Self {
        Self::new(-1, -1, "", "")
    }

    pub fn is_valid(&self) -> bool {
        self.created_index >= 0 && self.modified_index >= self.created_index
    }

    pub fn has_expiry(&self) -> bool {
        self.expires.is_some()
    }
}

impl Default for Node {
    fn default() -> Self {
        Self::invalid()
    }
}

impl fmt::Display for Node {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(
            f,
            "[{}: '{}' c: {} m: {}",
            self.key, self.value, self.created_index, self.modified_index
        )?;
        if let Some(expires) = self.expires {
            let secs = expires
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or_default();
            write!(f, " expires: {secs}")?;
        }
        write!(f, " deleted: {}]", self.deleted)
    }
}

/// One change observed by a watch
///
/// `exists` is false when the server reported index metadata without a value,
/// which is how deletions and TTL expiries show up.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WatchUpdate {
    pub node: Node,
    pub exists: bool,
}

impl WatchUpdate {
    pub fn new(
        node: Node,
        exists: bool,
    ) -> Self {
        Self { node, exists }
    }
}

/// Keys ending in the path separator name directories.
pub fn key_is_directory(key: &str) -> bool {
    key.ends_with('/')
}
