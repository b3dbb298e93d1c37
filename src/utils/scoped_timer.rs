use tokio::time::Instant;
use tracing::trace;

/// Records how long an etcd call took, under the `etcd_client::timing`
/// target, when it goes out of scope
pub(crate) struct ScopedTimer {
    start: Instant,
    operation: &'static str,
}

impl ScopedTimer {
    pub(crate) fn new(operation: &'static str) -> Self {
        Self {
            start: Instant::now(),
            operation,
        }
    }
}

impl Drop for ScopedTimer {
    fn drop(&mut self) {
        trace!(
            target: "etcd_client::timing",
            operation = self.operation,
            elapsed_ms = self.start.elapsed().as_millis() as u64,
            "etcd call finished"
        );
    }
}
