use std::sync::atomic::{AtomicU64, Ordering};

pub trait IdGenerator: Send + Sync {
    fn next_id(&self, prefix: &str) -> String;
}

// Monotonic counter so tests can assert exact identifiers.
#[derive(Debug)]
pub struct CounterIdGenerator {
    next: AtomicU64,
}

impl Default for CounterIdGenerator {
    fn default() -> Self {
        Self {
            next: AtomicU64::new(1),
        }
    }
}

impl IdGenerator for CounterIdGenerator {
    fn next_id(&self, prefix: &str) -> String {
        let sequence = self.next.fetch_add(1, Ordering::Relaxed);
        format!("{prefix}-{sequence}")
    }
}
