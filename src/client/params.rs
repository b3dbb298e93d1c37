use std::collections::BTreeMap;

use tracing::warn;

use crate::constants::PARAM_CONSISTENT;
use crate::constants::PARAM_QUORUM;
use crate::constants::PARAM_WAIT;
use crate::constants::POLICY_WARNING_EVERY_N;
use crate::utils::EveryN;
use crate::RequestConfig;

static NO_CONSISTENT_WARNING: EveryN = EveryN::new();
static NO_QUORUM_WARNING: EveryN = EveryN::new();

/// Query/body parameters of one request, kept ordered by name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params(BTreeMap<String, String>);

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(
        &mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> &mut Self {
        self.0.insert(name.into(), value.into());
        self
    }

    pub fn with(
        mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.insert(name, value);
        self
    }

    pub fn get(
        &self,
        name: &str,
    ) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn contains(
        &self,
        name: &str,
    ) -> bool {
        self.0.contains_key(name)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Percent-encodes and joins as `a=1%202&b=x`, ordered by name.
    pub fn encode(&self) -> String {
        self.0
            .iter()
            .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&")
    }

    /// Adds the process-wide `consistent`/`quorum` policy flags.
    ///
    /// `quorum` is never combined with `wait`: the two are incompatible on
    /// the v2 API.
    pub fn apply_policy(
        &mut self,
        policy: &RequestConfig,
    ) {
        if policy.consistent {
            self.insert(PARAM_CONSISTENT, "true");
        } else if NO_CONSISTENT_WARNING.tick(POLICY_WARNING_EVERY_N) {
            warn!("Sending request without 'consistent=true'");
        }

        if policy.quorum {
            if !self.contains(PARAM_WAIT) {
                self.insert(PARAM_QUORUM, "true");
            }
        } else if NO_QUORUM_WARNING.tick(POLICY_WARNING_EVERY_N) {
            warn!("Sending request without 'quorum=true'");
        }
    }
}

impl<K, V> FromIterator<(K, V)> for Params
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}
