//! In-memory implementation of [`KvBackend`], for tests and local development.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::info;

use super::{Batch, Command, KvBackend};
use crate::error::BackendError;

/// Entries keyed by name, each holding the slot it was given on insertion.
///
/// Slots only grow and are never reused, so removing an entry does not move
/// any other entry. Scans walk slots in ascending order and the cursor is the
/// next slot to examine, which gives the Redis guarantee: an entry present for
/// the whole traversal is returned at least once.
#[derive(Debug)]
struct Slotted<V> {
    next_slot: u64,
    slots: BTreeMap<u64, String>,
    entries: HashMap<String, (u64, V)>,
}

impl<V> Default for Slotted<V> {
    fn default() -> Self {
        Self {
            // Cursor 0 means "from the start", so slots begin at 1.
            next_slot: 1,
            slots: BTreeMap::new(),
            entries: HashMap::new(),
        }
    }
}

impl<V> Slotted<V> {
    fn get(&self, key: &str) -> Option<&V> {
        self.entries.get(key).map(|(_, value)| value)
    }

    fn get_mut(&mut self, key: &str) -> Option<&mut V> {
        self.entries.get_mut(key).map(|(_, value)| value)
    }

    fn insert_if_absent(&mut self, key: &str, value: V) -> bool {
        if self.entries.contains_key(key) {
            return false;
        }
        let slot = self.next_slot;
        self.next_slot += 1;
        self.slots.insert(slot, key.to_string());
        self.entries.insert(key.to_string(), (slot, value));
        true
    }

    fn remove(&mut self, key: &str) -> bool {
        match self.entries.remove(key) {
            Some((slot, _)) => {
                self.slots.remove(&slot);
                true
            }
            None => false,
        }
    }

    fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Examines up to `count` entries from slot `cursor` on and returns the
    /// matching names plus the next cursor (0 once nothing is left).
    fn scan(&self, cursor: u64, pattern: &str, count: u64) -> (Vec<String>, u64) {
        let mut remaining = self.slots.range(cursor..);
        let examined: Vec<(&u64, &String)> =
            remaining.by_ref().take(count.max(1) as usize).collect();

        let matched = examined
            .iter()
            .filter(|(_, key)| glob_match(pattern, key))
            .map(|(_, key)| (*key).clone())
            .collect();

        let next = match (examined.last(), remaining.next()) {
            (Some((slot, _)), Some(_)) => **slot + 1,
            _ => 0,
        };
        (matched, next)
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    strings: Slotted<String>,
    sets: HashMap<String, Slotted<()>>,
    closed: bool,
}

impl MemoryState {
    fn set_if_absent(&mut self, key: &str, value: &str) -> bool {
        self.strings.insert_if_absent(key, value.to_string())
    }

    fn delete(&mut self, key: &str) -> bool {
        self.strings.remove(key)
    }

    fn set_add(&mut self, set: &str, member: &str) -> bool {
        self.sets
            .entry(set.to_string())
            .or_default()
            .insert_if_absent(member, ())
    }

    fn set_remove(&mut self, set: &str, member: &str) -> bool {
        let Some(members) = self.sets.get_mut(set) else {
            return false;
        };
        let removed = members.remove(member);
        if members.is_empty() {
            self.sets.remove(set);
        }
        removed
    }
}

/// Key-value state behind one async lock. Clones share the same state.
///
/// Scans walk entries in insertion order. `count` is how many entries one
/// call examines, so a call can return no matches while the cursor is still
/// non-zero. Removing entries mid-scan never makes the scan skip others.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    state: Arc<RwLock<MemoryState>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    async fn read(&self) -> Result<RwLockReadGuard<'_, MemoryState>, BackendError> {
        let state = self.state.read().await;
        if state.closed {
            return Err(BackendError::Closed);
        }
        Ok(state)
    }

    async fn write(&self) -> Result<RwLockWriteGuard<'_, MemoryState>, BackendError> {
        let state = self.state.write().await;
        if state.closed {
            return Err(BackendError::Closed);
        }
        Ok(state)
    }
}

/// Redis-style glob: `*` matches any run, `?` one character, everything else literally.
pub(crate) fn glob_match(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();
    let (mut p, mut t) = (0, 0);
    let mut backtrack: Option<(usize, usize)> = None;

    while t < text.len() {
        if p < pattern.len() && pattern[p] == '*' {
            backtrack = Some((p, t));
            p += 1;
        } else if p < pattern.len() && (pattern[p] == '?' || pattern[p] == text[t]) {
            p += 1;
            t += 1;
        } else if let Some((star, matched)) = backtrack {
            p = star + 1;
            t = matched + 1;
            backtrack = Some((star, matched + 1));
        } else {
            return false;
        }
    }
    while p < pattern.len() && pattern[p] == '*' {
        p += 1;
    }
    p == pattern.len()
}

#[async_trait]
impl KvBackend for MemoryBackend {
    async fn get(&self, key: &str) -> Result<Option<String>, BackendError> {
        Ok(self.read().await?.strings.get(key).cloned())
    }

    async fn set_if_absent(&self, key: &str, value: &str) -> Result<bool, BackendError> {
        Ok(self.write().await?.set_if_absent(key, value))
    }

    async fn set_if_present(&self, key: &str, value: &str) -> Result<bool, BackendError> {
        let mut state = self.write().await?;
        match state.strings.get_mut(key) {
            Some(existing) => {
                *existing = value.to_string();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete(&self, key: &str) -> Result<bool, BackendError> {
        Ok(self.write().await?.delete(key))
    }

    async fn multi_get(&self, keys: &[String]) -> Result<Vec<Option<String>>, BackendError> {
        let state = self.read().await?;
        Ok(keys.iter().map(|key| state.strings.get(key).cloned()).collect())
    }

    async fn set_add(&self, set: &str, member: &str) -> Result<bool, BackendError> {
        Ok(self.write().await?.set_add(set, member))
    }

    async fn set_remove(&self, set: &str, member: &str) -> Result<bool, BackendError> {
        Ok(self.write().await?.set_remove(set, member))
    }

    async fn set_scan(
        &self,
        set: &str,
        cursor: u64,
        pattern: &str,
        count: u64,
    ) -> Result<(Vec<String>, u64), BackendError> {
        let state = self.read().await?;
        match state.sets.get(set) {
            Some(members) => Ok(members.scan(cursor, pattern, count)),
            None => Ok((Vec::new(), 0)),
        }
    }

    async fn scan_keys(
        &self,
        cursor: u64,
        pattern: &str,
        count: u64,
    ) -> Result<(Vec<String>, u64), BackendError> {
        let state = self.read().await?;
        Ok(state.strings.scan(cursor, pattern, count))
    }

    async fn exec_atomic(&self, batch: &Batch) -> Result<Vec<bool>, BackendError> {
        let mut state = self.write().await?;
        let applied = batch
            .commands()
            .iter()
            .map(|command| match command {
                Command::SetIfAbsent { key, value } => state.set_if_absent(key, value),
                Command::Delete { key } => state.delete(key),
                Command::SetAdd { set, member } => state.set_add(set, member),
                Command::SetRemove { set, member } => state.set_remove(set, member),
            })
            .collect();
        Ok(applied)
    }

    async fn ping(&self) -> Result<(), BackendError> {
        self.read().await.map(|_| ())
    }

    async fn close(&self) -> Result<(), BackendError> {
        let mut state = self.write().await?;
        state.closed = true;
        info!("In-memory backend closed");
        Ok(())
    }
}
