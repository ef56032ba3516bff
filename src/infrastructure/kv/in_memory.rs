//! # In-Memory Backend
//!
//! In-process implementation of [`KeyValueBackend`] for tests and local
//! runs without a Redis server.
//!
//! Strings and sets share one keyspace, as in Redis: reading a set with
//! `GET` is a type error and `MGET` reports it as absent. Guarded batches run
//! under a single write lock, so they are atomic with respect to every other
//! call.
//!
//! Scans visit members ordered by a 64-bit hash and use the hash of the
//! next unvisited member as the cursor. Members present for the whole scan
//! are returned at least once even if others are added or removed between
//! steps.
//!
//! Latency and outages can be injected to exercise cancellation and error
//! paths.

use crate::infrastructure::kv::error::{BackendError, BackendResult};
use crate::infrastructure::kv::traits::{
    AtomicBatch, Command, KeyValueBackend, ScanPage, SetCondition, WriteOutcome,
};
use async_trait::async_trait;
use std::collections::hash_map::DefaultHasher;
use std::collections::{BTreeSet, HashMap};
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Entry {
    Bytes(Vec<u8>),
    Set(BTreeSet<String>),
}

fn wrong_type(key: &str) -> BackendError {
    BackendError::response(format!(
        "WRONGTYPE Operation against a key holding the wrong kind of value: {key}"
    ))
}

fn scan_hash(member: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    member.hash(&mut hasher);
    // Cursor 0 is reserved for "start" and "done".
    hasher.finish().max(1)
}

/// In-memory implementation of [`KeyValueBackend`].
///
/// Clones share the same storage.
#[derive(Debug, Clone)]
pub struct InMemoryBackend {
    storage: Arc<RwLock<HashMap<String, Entry>>>,
    available: Arc<AtomicBool>,
    latency: Option<Duration>,
}

impl InMemoryBackend {
    /// Creates a new empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self {
            storage: Arc::new(RwLock::new(HashMap::new())),
            available: Arc::new(AtomicBool::new(true)),
            latency: None,
        }
    }

    /// Delays every call by `latency` before touching storage.
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Makes every subsequent call fail with `BackendError::Unavailable`
    /// until re-enabled.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Returns the number of keys of any type.
    #[must_use]
    pub fn len(&self) -> usize {
        self.storage
            .try_read()
            .map(|guard| guard.len())
            .unwrap_or(0)
    }

    /// Returns true if no keys exist.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes every key.
    pub async fn clear(&self) {
        let mut storage = self.storage.write().await;
        storage.clear();
    }

    /// Reads a string key directly, bypassing latency and outage injection.
    pub async fn raw_get(&self, key: &str) -> Option<Vec<u8>> {
        let storage = self.storage.read().await;
        match storage.get(key) {
            Some(Entry::Bytes(value)) => Some(value.clone()),
            _ => None,
        }
    }

    /// Writes a string key directly, replacing whatever was there.
    pub async fn raw_put(&self, key: impl Into<String>, value: impl Into<Vec<u8>>) {
        let mut storage = self.storage.write().await;
        storage.insert(key.into(), Entry::Bytes(value.into()));
    }

    /// Deletes a key directly. Returns true if it existed.
    pub async fn raw_remove(&self, key: &str) -> bool {
        let mut storage = self.storage.write().await;
        storage.remove(key).is_some()
    }

    /// Adds a set member directly.
    pub async fn raw_add_member(&self, set: &str, member: impl Into<String>) {
        let mut storage = self.storage.write().await;
        let entry = storage
            .entry(set.to_string())
            .or_insert_with(|| Entry::Set(BTreeSet::new()));
        if let Entry::Set(members) = entry {
            members.insert(member.into());
        }
    }

    /// Returns the members of a set, sorted. Empty if absent.
    pub async fn members(&self, set: &str) -> Vec<String> {
        let storage = self.storage.read().await;
        match storage.get(set) {
            Some(Entry::Set(members)) => members.iter().cloned().collect(),
            _ => Vec::new(),
        }
    }

    async fn simulate_io(&self) -> BackendResult<()> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(BackendError::unavailable("in-memory backend disabled"))
        }
    }

    fn check_type(storage: &HashMap<String, Entry>, command: &Command) -> BackendResult<()> {
        let key = command.key();
        match (command, storage.get(key)) {
            (Command::SAdd { .. } | Command::SRem { .. }, Some(Entry::Bytes(_))) => {
                Err(wrong_type(key))
            }
            _ => Ok(()),
        }
    }

    fn apply(storage: &mut HashMap<String, Entry>, command: &Command) -> bool {
        match command {
            Command::Set {
                key,
                value,
                condition,
            } => Self::apply_set(storage, key, value, *condition),
            Command::Del { key } => storage.remove(key).is_some(),
            Command::SAdd { set, member } => {
                let entry = storage
                    .entry(set.clone())
                    .or_insert_with(|| Entry::Set(BTreeSet::new()));
                match entry {
                    Entry::Set(members) => members.insert(member.clone()),
                    Entry::Bytes(_) => false,
                }
            }
            Command::SRem { set, member } => {
                let (removed, now_empty) = match storage.get_mut(set) {
                    Some(Entry::Set(members)) => (members.remove(member), members.is_empty()),
                    _ => (false, false),
                };
                // Redis drops sets that become empty.
                if now_empty {
                    storage.remove(set);
                }
                removed
            }
        }
    }

    fn apply_set(
        storage: &mut HashMap<String, Entry>,
        key: &str,
        value: &[u8],
        condition: SetCondition,
    ) -> bool {
        let exists = storage.contains_key(key);
        let allowed = match condition {
            SetCondition::Always => true,
            SetCondition::IfAbsent => !exists,
            SetCondition::IfPresent => exists,
        };
        if allowed {
            storage.insert(key.to_string(), Entry::Bytes(value.to_vec()));
        }
        allowed
    }
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KeyValueBackend for InMemoryBackend {
    async fn get(&self, key: &str) -> BackendResult<Option<Vec<u8>>> {
        self.simulate_io().await?;
        let storage = self.storage.read().await;
        match storage.get(key) {
            None => Ok(None),
            Some(Entry::Bytes(value)) => Ok(Some(value.clone())),
            Some(Entry::Set(_)) => Err(wrong_type(key)),
        }
    }

    async fn set(
        &self,
        key: &str,
        value: &[u8],
        condition: SetCondition,
    ) -> BackendResult<WriteOutcome> {
        self.simulate_io().await?;
        let mut storage = self.storage.write().await;
        let applied = Self::apply_set(&mut storage, key, value, condition);
        Ok(WriteOutcome::from_applied(applied))
    }

    async fn mget(&self, keys: &[String]) -> BackendResult<Vec<Option<Vec<u8>>>> {
        self.simulate_io().await?;
        let storage = self.storage.read().await;
        Ok(keys
            .iter()
            .map(|key| match storage.get(key) {
                Some(Entry::Bytes(value)) => Some(value.clone()),
                _ => None,
            })
            .collect())
    }

    async fn sscan(
        &self,
        set: &str,
        cursor: u64,
        pattern: &str,
        count: usize,
    ) -> BackendResult<ScanPage> {
        self.simulate_io().await?;
        let matcher = glob::Pattern::new(pattern)
            .map_err(|e| BackendError::invalid_command(format!("bad MATCH pattern: {e}")))?;

        let storage = self.storage.read().await;
        let members = match storage.get(set) {
            None => return Ok(ScanPage::default()),
            Some(Entry::Bytes(_)) => return Err(wrong_type(set)),
            Some(Entry::Set(members)) => members,
        };

        let mut ordered: Vec<(u64, &String)> = members
            .iter()
            .map(|m| (scan_hash(m), m))
            .filter(|(h, _)| *h >= cursor)
            .collect();
        ordered.sort();

        let count = count.max(1);
        let mut visited = 0usize;
        let mut page = Vec::new();
        let mut next_cursor = 0u64;
        let mut last_hash = None;
        for (hash, member) in ordered {
            // Members sharing a hash are never split across steps.
            if visited >= count && last_hash != Some(hash) {
                next_cursor = hash;
                break;
            }
            visited += 1;
            last_hash = Some(hash);
            if matcher.matches(member) {
                page.push(member.clone());
            }
        }

        Ok(ScanPage {
            cursor: next_cursor,
            members: page,
        })
    }

    async fn execute(&self, batch: AtomicBatch) -> BackendResult<WriteOutcome> {
        self.simulate_io().await?;
        let mut storage = self.storage.write().await;

        for command in std::iter::once(batch.guard()).chain(batch.dependents()) {
            Self::check_type(&storage, command)?;
        }

        if !Self::apply(&mut storage, batch.guard()) {
            return Ok(WriteOutcome::SKIPPED);
        }
        for command in batch.dependents() {
            Self::apply(&mut storage, command);
        }
        Ok(WriteOutcome::APPLIED)
    }
}
