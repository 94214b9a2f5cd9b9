//! Request-id and idempotency-key generation.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use rand::distr::{Alphanumeric, SampleString};

/// Generates request ids unique within one session: a monotonic
/// counter combined with a Unix-ms timestamp.
#[derive(Debug, Default)]
pub struct RequestIdGenerator {
    counter: AtomicU64,
}

impl RequestIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&self) -> String {
        let n = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        format!("req-{}-{}", n, Utc::now().timestamp_millis())
    }
}

/// A fresh per-send idempotency key: current time plus a random
/// suffix. Lets the gateway deduplicate retried sends; this client
/// never retries on its own.
pub fn idempotency_key() -> String {
    let suffix = Alphanumeric.sample_string(&mut rand::rng(), 8);
    format!("{}-{}", Utc::now().timestamp_millis(), suffix.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_request_ids_are_unique_and_monotonic() {
        let ids = RequestIdGenerator::new();
        let a = ids.next_id();
        let b = ids.next_id();
        assert_ne!(a, b);
        assert!(a.starts_with("req-1-"));
        assert!(b.starts_with("req-2-"));
    }

    #[test]
    fn test_idempotency_keys_do_not_repeat() {
        let keys: HashSet<String> = (0..64).map(|_| idempotency_key()).collect();
        assert_eq!(keys.len(), 64);
    }
}
