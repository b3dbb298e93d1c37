// -
// Wire protocol

/// Every key lives under this path prefix on the server
pub(crate) const KEYS_PREFIX: &str = "/v2/keys";

/// Response header carrying the store's global change index
pub(crate) const ETCD_INDEX_HEADER: &str = "X-Etcd-Index";

pub(crate) const LOCATION_HEADER: &str = "Location";

pub(crate) const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Leader redirect status
pub(crate) const TEMPORARY_REDIRECT: u16 = 307;

/// Index reported when the server omitted the global index header
pub const UNKNOWN_INDEX: i64 = -1;

// -
// Query/body parameter names

pub(crate) const PARAM_VALUE: &str = "value";
pub(crate) const PARAM_PREV_EXIST: &str = "prevExist";
pub(crate) const PARAM_PREV_INDEX: &str = "prevIndex";
pub(crate) const PARAM_TTL: &str = "ttl";
pub(crate) const PARAM_WAIT: &str = "wait";
pub(crate) const PARAM_WAIT_INDEX: &str = "waitIndex";
pub(crate) const PARAM_RECURSIVE: &str = "recursive";
pub(crate) const PARAM_CONSISTENT: &str = "consistent";
pub(crate) const PARAM_QUORUM: &str = "quorum";

/// Policy downgrade warnings are emitted once per this many requests
pub(crate) const POLICY_WARNING_EVERY_N: u64 = 100;
