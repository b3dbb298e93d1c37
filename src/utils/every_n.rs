use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

/// Counts occurrences and fires on the first and every `n`-th one after it.
#[derive(Debug, Default)]
pub(crate) struct EveryN {
    count: AtomicU64,
}

impl EveryN {
    pub(crate) const fn new() -> Self {
        Self {
            count: AtomicU64::new(0),
        }
    }

    pub(crate) fn tick(
        &self,
        n: u64,
    ) -> bool {
        let seen = self.count.fetch_add(1, Ordering::Relaxed);
        n <= 1 || seen % n == 0
    }
}
