//! Bounded TTL cache for suggestion batches.
//!
//! Keyed by `(pipeline, sha256(context))`.  Entries expire after a fixed
//! TTL; when the cache is full the **oldest-inserted** entry is evicted —
//! insertion order, not recency of access.  Re-inserting an existing key
//! keeps its original position in the eviction queue.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use sha2::{Digest, Sha256};

// ---------------------------------------------------------------------------
// SuggestionCache
// ---------------------------------------------------------------------------

struct CacheSlot {
    suggestions: Vec<String>,
    inserted_at: Instant,
}

/// Insertion-order-bounded, TTL-bounded suggestion cache.
///
/// Owned exclusively by the suggestion engine behind a mutex.
pub struct SuggestionCache {
    capacity: usize,
    ttl: Duration,
    map: HashMap<String, CacheSlot>,
    /// Keys in insertion order; front is evicted first.
    order: VecDeque<String>,
}

impl SuggestionCache {
    /// Create a cache holding at most `capacity` entries for `ttl` each.
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            capacity: capacity.max(1),
            ttl,
            map: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    /// Cache key for a `(pipeline, context)` pair.
    pub fn key_for(pipeline_tag: &str, context: &str) -> String {
        use std::fmt::Write;
        let digest = Sha256::digest(context.as_bytes());
        digest
            .iter()
            .fold(format!("{pipeline_tag}:"), |mut out, byte| {
                let _ = write!(out, "{byte:02x}");
                out
            })
    }

    /// Look up a batch; expired entries behave as misses and are removed.
    pub fn get(&mut self, key: &str) -> Option<Vec<String>> {
        let expired = match self.map.get(key) {
            Some(slot) => slot.inserted_at.elapsed() >= self.ttl,
            None => return None,
        };
        if expired {
            self.remove(key);
            return None;
        }
        self.map.get(key).map(|slot| slot.suggestions.clone())
    }

    /// Insert a batch, evicting the oldest-inserted entry on overflow.
    ///
    /// Overwriting an existing key refreshes its TTL but not its eviction
    /// position.
    pub fn insert(&mut self, key: String, suggestions: Vec<String>) {
        let slot = CacheSlot {
            suggestions,
            inserted_at: Instant::now(),
        };
        if self.map.insert(key.clone(), slot).is_some() {
            // Key already queued; position unchanged by design.
            return;
        }
        self.order.push_back(key);

        while self.map.len() > self.capacity {
            match self.order.pop_front() {
                Some(oldest) => {
                    self.map.remove(&oldest);
                }
                None => break,
            }
        }
    }

    /// Number of live entries (including not-yet-collected expired ones).
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// `true` when no entries are held.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    fn remove(&mut self, key: &str) {
        self.map.remove(key);
        self.order.retain(|k| k != key);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn batch(label: &str) -> Vec<String> {
        vec![format!("{label} one"), format!("{label} two")]
    }

    #[test]
    fn hit_within_ttl() {
        let mut cache = SuggestionCache::new(4, Duration::from_secs(300));
        cache.insert("k1".into(), batch("a"));
        assert_eq!(cache.get("k1"), Some(batch("a")));
    }

    #[test]
    fn expired_entry_is_a_miss_and_removed() {
        let mut cache = SuggestionCache::new(4, Duration::from_millis(10));
        cache.insert("k1".into(), batch("a"));

        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(cache.get("k1"), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn overflow_evicts_oldest_inserted() {
        let mut cache = SuggestionCache::new(2, Duration::from_secs(300));
        cache.insert("k1".into(), batch("a"));
        cache.insert("k2".into(), batch("b"));
        cache.insert("k3".into(), batch("c"));

        assert_eq!(cache.get("k1"), None, "oldest-inserted must be evicted");
        assert!(cache.get("k2").is_some());
        assert!(cache.get("k3").is_some());
        assert_eq!(cache.len(), 2);
    }

    /// Eviction is insertion-order, not LRU: reading an old entry does not
    /// protect it.
    #[test]
    fn access_does_not_refresh_eviction_order() {
        let mut cache = SuggestionCache::new(2, Duration::from_secs(300));
        cache.insert("k1".into(), batch("a"));
        cache.insert("k2".into(), batch("b"));

        // Touch k1, then overflow — k1 is still the first to go.
        assert!(cache.get("k1").is_some());
        cache.insert("k3".into(), batch("c"));

        assert_eq!(cache.get("k1"), None);
        assert!(cache.get("k2").is_some());
    }

    /// Re-inserting an existing key keeps its original queue position.
    #[test]
    fn reinsert_keeps_original_position() {
        let mut cache = SuggestionCache::new(2, Duration::from_secs(300));
        cache.insert("k1".into(), batch("a"));
        cache.insert("k2".into(), batch("b"));

        // Overwrite k1 (still oldest), then overflow.
        cache.insert("k1".into(), batch("a2"));
        cache.insert("k3".into(), batch("c"));

        assert_eq!(cache.get("k1"), None, "k1 keeps its old position");
        assert_eq!(cache.get("k2"), Some(batch("b")));
        assert_eq!(cache.get("k3"), Some(batch("c")));
    }

    // ---- Keys --------------------------------------------------------------

    #[test]
    fn key_embeds_pipeline_and_context_hash() {
        let a = SuggestionCache::key_for("interview", "context one");
        let b = SuggestionCache::key_for("interview", "context two");
        let c = SuggestionCache::key_for("meeting", "context one");

        assert!(a.starts_with("interview:"));
        assert_ne!(a, b, "different context, different key");
        assert_ne!(a, c, "different pipeline, different key");
        assert_eq!(a, SuggestionCache::key_for("interview", "context one"));
    }
}
