//! Request/response context correlation.
//!
//! # Responsibilities
//! - Carry label sets computed during the request phase to the response phase
//!   of the same logical request
//! - Stay correct under concurrent in-flight requests whose phases complete
//!   out of order
//! - Bound stored entries so cancelled or abandoned requests cannot leak
//!
//! # Design Decisions
//! - Entries are keyed by a per-request id, never a shared stack or queue
//! - `take` removes the entry; every response path must consume its entry
//! - TTL expiry plus a capacity cap with oldest-entry eviction cover requests
//!   whose response phase never runs

use std::time::{Duration, Instant};

use dashmap::DashMap;
use uuid::Uuid;

const DEFAULT_MAX_ENTRIES: usize = 4096;
const DEFAULT_TTL: Duration = Duration::from_secs(300);

struct ContextEntry {
    labels: Vec<(String, String)>,
    created_at: Instant,
}

/// Concurrency-safe store of per-request context labels.
pub struct ContextCorrelator {
    entries: DashMap<Uuid, ContextEntry>,
    max_entries: usize,
    ttl: Duration,
}

impl Default for ContextCorrelator {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ENTRIES, DEFAULT_TTL)
    }
}

impl ContextCorrelator {
    pub fn new(max_entries: usize, ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            max_entries,
            ttl,
        }
    }

    /// Call at the start of request-phase processing; clears any stale state
    /// for a reused identity.
    pub fn begin(&self, request_id: Uuid) {
        self.entries.remove(&request_id);
    }

    /// Attach computed context labels to the identity. Empty label sets are
    /// not stored; `take` reports them as empty either way.
    pub fn save(&self, request_id: Uuid, labels: Vec<(String, String)>) {
        if labels.is_empty() {
            return;
        }
        self.evict_if_needed();
        self.entries.insert(
            request_id,
            ContextEntry {
                labels,
                created_at: Instant::now(),
            },
        );
    }

    /// Retrieve and remove the labels for the identity; empty when nothing
    /// was saved (e.g. the request body was not parseable).
    pub fn take(&self, request_id: &Uuid) -> Vec<(String, String)> {
        self.entries
            .remove(request_id)
            .map(|(_, entry)| entry.labels)
            .unwrap_or_default()
    }

    /// Number of in-flight entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn evict_if_needed(&self) {
        if self.entries.len() < self.max_entries {
            return;
        }
        self.entries
            .retain(|_, entry| entry.created_at.elapsed() < self.ttl);

        while self.entries.len() >= self.max_entries {
            let oldest = self
                .entries
                .iter()
                .min_by_key(|entry| entry.value().created_at)
                .map(|entry| *entry.key());
            match oldest {
                Some(key) => {
                    tracing::warn!(request_id = %key, "Context store full, evicting oldest entry");
                    self.entries.remove(&key);
                }
                None => break,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_then_take() {
        let correlator = ContextCorrelator::default();
        let id = Uuid::new_v4();

        correlator.begin(id);
        correlator.save(id, vec![("Model".to_string(), "v3".to_string())]);

        let labels = correlator.take(&id);
        assert_eq!(labels, vec![("Model".to_string(), "v3".to_string())]);

        // Consumed: a second take is empty.
        assert!(correlator.take(&id).is_empty());
    }

    #[test]
    fn test_concurrent_requests_stay_isolated() {
        let correlator = ContextCorrelator::default();
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();

        correlator.begin(first);
        correlator.begin(second);
        correlator.save(first, vec![("id".to_string(), "first".to_string())]);
        correlator.save(second, vec![("id".to_string(), "second".to_string())]);

        // Response phases complete out of order.
        assert_eq!(
            correlator.take(&second),
            vec![("id".to_string(), "second".to_string())]
        );
        assert_eq!(
            correlator.take(&first),
            vec![("id".to_string(), "first".to_string())]
        );
    }

    #[test]
    fn test_take_without_save_is_empty() {
        let correlator = ContextCorrelator::default();
        let id = Uuid::new_v4();
        correlator.begin(id);
        assert!(correlator.take(&id).is_empty());
    }

    #[test]
    fn test_begin_clears_reused_identity() {
        let correlator = ContextCorrelator::default();
        let id = Uuid::new_v4();

        correlator.save(id, vec![("stale".to_string(), "1".to_string())]);
        correlator.begin(id);
        assert!(correlator.take(&id).is_empty());
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let correlator = ContextCorrelator::new(2, Duration::from_secs(300));
        let ids: Vec<Uuid> = (0..3).map(|_| Uuid::new_v4()).collect();

        for (i, id) in ids.iter().enumerate() {
            correlator.save(*id, vec![("n".to_string(), i.to_string())]);
            // Distinct creation instants for deterministic eviction order.
            std::thread::sleep(Duration::from_millis(5));
        }

        assert!(correlator.len() <= 2);
        assert!(correlator.take(&ids[0]).is_empty());
        assert_eq!(
            correlator.take(&ids[2]),
            vec![("n".to_string(), "2".to_string())]
        );
    }

    #[test]
    fn test_expired_entries_are_swept() {
        let correlator = ContextCorrelator::new(1, Duration::from_millis(1));
        let stale = Uuid::new_v4();
        let fresh = Uuid::new_v4();

        correlator.save(stale, vec![("n".to_string(), "0".to_string())]);
        std::thread::sleep(Duration::from_millis(10));
        correlator.save(fresh, vec![("n".to_string(), "1".to_string())]);

        assert!(correlator.take(&stale).is_empty());
        assert_eq!(
            correlator.take(&fresh),
            vec![("n".to_string(), "1".to_string())]
        );
    }

    #[test]
    fn test_empty_labels_are_not_stored() {
        let correlator = ContextCorrelator::default();
        let id = Uuid::new_v4();
        correlator.save(id, Vec::new());
        assert!(correlator.is_empty());
    }
}
