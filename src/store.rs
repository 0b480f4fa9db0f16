//! Data-access layer: a narrow key-value contract behind the [`Store`] trait.
//!
//! Implementations must be safe for concurrent use from many request tasks;
//! any shared mutable state is serialized internally, so callers never
//! coordinate locking. Two stubs ship with the service:
//! - `MemoryStore`: bounded in-memory map with insertion-order eviction
//! - `NullStore`: discards writes, answers every read with nothing
//!
//! The trait is the only store surface visible outside the crate. A test
//! harness may supply its own implementation through `ServiceConfig`.

use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, trace};

/// Errors surfaced by store construction and operations.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The configured capacity cannot hold a single entry.
    #[error("store capacity must be at least 1")]
    InvalidCapacity,

    /// The backing implementation failed.
    #[error("store backend failure: {0}")]
    Backend(String),
}

/// Narrow key-value contract consumed by the business layer.
#[async_trait]
pub trait Store: Send + Sync {
    /// Fetch the value stored under `key`, if any.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Store `value` under `key`, replacing any previous value.
    async fn put(&self, key: &str, value: Vec<u8>) -> Result<(), StoreError>;
}

/// A single stored entry.
struct Entry {
    value: Vec<u8>,
    /// Insertion sequence number, used to pick the eviction victim.
    seq: u64,
}

/// Thread-safe in-memory store bounded by entry count.
///
/// When a `put` of a new key would exceed the capacity, the oldest entry
/// (lowest insertion sequence) is evicted so that `put` is total.
pub(crate) struct MemoryStore {
    data: RwLock<HashMap<String, Entry>>,
    capacity: usize,
    seq_counter: AtomicU64,
}

impl MemoryStore {
    /// Create a store holding at most `capacity` entries.
    ///
    /// Capacity 0 is a construction error: the lifecycle manager surfaces it
    /// as a wiring failure before any listener is bound.
    pub(crate) fn new(capacity: usize) -> Result<Self, StoreError> {
        if capacity == 0 {
            return Err(StoreError::InvalidCapacity);
        }
        debug!(capacity, "Initializing in-memory store");
        Ok(Self {
            data: RwLock::new(HashMap::new()),
            capacity,
            seq_counter: AtomicU64::new(0),
        })
    }

    fn next_seq(&self) -> u64 {
        self.seq_counter.fetch_add(1, Ordering::SeqCst)
    }

    /// Find the key with the lowest insertion sequence.
    fn find_oldest_key(data: &HashMap<String, Entry>) -> Option<String> {
        data.iter()
            .min_by_key(|(_, entry)| entry.seq)
            .map(|(key, _)| key.clone())
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let data = self.data.read().unwrap();
        Ok(data.get(key).map(|entry| entry.value.clone()))
    }

    async fn put(&self, key: &str, value: Vec<u8>) -> Result<(), StoreError> {
        let mut data = self.data.write().unwrap();

        // Replacing an existing key never changes the entry count.
        if !data.contains_key(key) && data.len() >= self.capacity {
            if let Some(victim) = Self::find_oldest_key(&data) {
                debug!(key = %victim, "Evicting oldest entry");
                data.remove(&victim);
            }
        }

        let entry = Entry {
            value,
            seq: self.next_seq(),
        };
        data.insert(key.to_string(), entry);
        trace!(key, entries = data.len(), "Entry stored");
        Ok(())
    }
}

/// No-op store: every read misses, every write is discarded.
pub(crate) struct NullStore;

#[async_trait]
impl Store for NullStore {
    async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(None)
    }

    async fn put(&self, _key: &str, _value: Vec<u8>) -> Result<(), StoreError> {
        Ok(())
    }
}
