//! Parsed-template cache.
//!
//! Entries are keyed by template id and remember the hash of the source they
//! were parsed from; asking for the same id with different source replaces
//! the entry. Each entry owns a [`OnceLock`], so concurrent first use of one
//! `(id, source)` pair runs the parser exactly once while the other callers
//! wait for its result. Parse failures are cached the same way.
//!
//! With a capacity, the least recently used entry is evicted using a
//! generation counter (O(1) touch under the read lock, O(n) evict).

use crate::error::DynSqlResult;
use crate::node::{ParsedTemplate, source_hash};
use crate::parser::parse_template;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

type Slot = Arc<OnceLock<DynSqlResult<Arc<ParsedTemplate>>>>;

#[derive(Debug)]
struct Entry {
    hash: u64,
    slot: Slot,
    last_access: AtomicU64,
}

/// Counters describing cache effectiveness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Number of times the parser actually ran.
    pub parses: u64,
    pub evictions: u64,
    pub entries: usize,
}

/// Thread-safe memo of parsed templates.
#[derive(Debug, Default)]
pub struct TemplateCache {
    capacity: Option<usize>,
    entries: RwLock<HashMap<String, Entry>>,
    generation: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    parses: AtomicU64,
    evictions: AtomicU64,
}

impl TemplateCache {
    /// An unbounded cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// A cache holding at most `capacity` templates.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: Some(capacity),
            ..Self::default()
        }
    }

    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    /// Return the parsed form of `source`, parsing it on first use.
    pub fn get_or_parse(&self, id: &str, source: &str) -> DynSqlResult<Arc<ParsedTemplate>> {
        let hash = source_hash(source);

        let cached = {
            let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
            entries
                .get(id)
                .filter(|e| e.hash == hash)
                .map(|e| {
                    e.last_access.store(self.next_generation(), Ordering::Relaxed);
                    e.slot.clone()
                })
        };

        let slot = match cached {
            Some(slot) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                tracing::trace!(target: "dynsql.cache", template = id, "cache hit");
                slot
            }
            None => self.insert_slot(id, hash),
        };

        // Parse outside the map lock; only callers of this slot wait.
        slot.get_or_init(|| {
            self.parses.fetch_add(1, Ordering::Relaxed);
            parse_template(id, source)
        })
        .clone()
    }

    /// The cached template for `id`, if it parsed successfully.
    pub fn get(&self, id: &str) -> Option<Arc<ParsedTemplate>> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        let entry = entries.get(id)?;
        match entry.slot.get() {
            Some(Ok(template)) => Some(template.clone()),
            _ => None,
        }
    }

    pub fn remove(&self, id: &str) -> bool {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.remove(id).is_some()
    }

    pub fn clear(&self) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            parses: self.parses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            entries: self.len(),
        }
    }

    fn next_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Insert-if-absent under the write lock.
    fn insert_slot(&self, id: &str, hash: u64) -> Slot {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);

        // Another thread may have inserted it between our read and write lock.
        if let Some(entry) = entries.get(id).filter(|e| e.hash == hash) {
            entry.last_access.store(self.next_generation(), Ordering::Relaxed);
            self.hits.fetch_add(1, Ordering::Relaxed);
            return entry.slot.clone();
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let slot: Slot = Arc::new(OnceLock::new());
        let replaced = entries
            .insert(
                id.to_string(),
                Entry {
                    hash,
                    slot: slot.clone(),
                    last_access: AtomicU64::new(self.next_generation()),
                },
            )
            .is_some();
        tracing::debug!(target: "dynsql.cache", template = id, replaced, "cache miss");

        if let Some(capacity) = self.capacity {
            while entries.len() > capacity {
                let oldest = entries
                    .iter()
                    .filter(|(key, _)| key.as_str() != id || capacity == 0)
                    .min_by_key(|(_, e)| e.last_access.load(Ordering::Relaxed))
                    .map(|(key, _)| key.clone());
                let Some(oldest) = oldest else {
                    break;
                };
                entries.remove(&oldest);
                self.evictions.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(target: "dynsql.cache", template = %oldest, "evicted");
            }
        }

        slot
    }
}
