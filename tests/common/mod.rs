//! Shared test utilities for keysweep integration tests.
//!
//! Import via `mod common;` in integration test files:
//! ```rust,ignore
//! mod common;
//! use common::*;
//! ```
//!
//! [`MemoryServer`] stands in for one Redis-compatible server: a set of
//! numbered logical databases behind a shared lock, with per-key failure
//! injection and a scriptable scan, so sweeps run deterministically without
//! a live store.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use keysweep::store::{KeyType, Store, StoreError, Ttl};

// ============================================================================
// Values
// ============================================================================

/// A stored value, one variant per supported type.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    String(Vec<u8>),
    Hash(HashMap<String, Vec<u8>>),
    List(VecDeque<Vec<u8>>),
    Set(HashSet<Vec<u8>>),
    ZSet(HashMap<Vec<u8>, f64>),
}

impl Value {
    fn key_type(&self) -> KeyType {
        match self {
            Value::String(_) => KeyType::String,
            Value::Hash(_) => KeyType::Hash,
            Value::List(_) => KeyType::List,
            Value::Set(_) => KeyType::Set,
            Value::ZSet(_) => KeyType::ZSet,
        }
    }
}

/// Convenience constructors for seeding test data.
pub fn bytes(s: &str) -> Vec<u8> {
    s.as_bytes().to_vec()
}

pub fn list(items: &[&str]) -> Value {
    Value::List(items.iter().map(|i| bytes(i)).collect())
}

pub fn hash(entries: &[(&str, &str)]) -> Value {
    Value::Hash(
        entries
            .iter()
            .map(|(f, v)| (f.to_string(), bytes(v)))
            .collect(),
    )
}

pub fn set(members: &[&str]) -> Value {
    Value::Set(members.iter().map(|m| bytes(m)).collect())
}

pub fn zset(entries: &[(&str, f64)]) -> Value {
    Value::ZSet(entries.iter().map(|(m, s)| (bytes(m), *s)).collect())
}

#[derive(Clone, Debug)]
struct Entry {
    value: Value,
    ttl: Option<u64>,
}

// ============================================================================
// Server
// ============================================================================

#[derive(Default)]
struct ServerState {
    dbs: HashMap<u32, HashMap<String, Entry>>,
    fail_keys: HashSet<String>,
    scripted_pages: Option<VecDeque<(u64, Vec<String>)>>,
}

/// An in-memory stand-in for one Redis-compatible server.
///
/// Cheaply clonable; every clone and every [`MemoryStore`] view shares the
/// same state, the way connections to one server share its databases.
#[derive(Clone, Default)]
pub struct MemoryServer {
    state: Arc<Mutex<ServerState>>,
}

impl MemoryServer {
    pub fn new() -> Self {
        Self::default()
    }

    /// A connection-like view over one logical database.
    pub fn store(&self, db: u32) -> MemoryStore {
        MemoryStore {
            server: self.clone(),
            db,
        }
    }

    /// Seed a key with no expiration.
    pub fn insert(&self, db: u32, key: &str, value: Value) {
        self.insert_with_ttl(db, key, value, None);
    }

    /// Seed a key, optionally with a TTL in seconds.
    pub fn insert_with_ttl(&self, db: u32, key: &str, value: Value, ttl: Option<u64>) {
        let mut state = self.state.lock().unwrap();
        state
            .dbs
            .entry(db)
            .or_default()
            .insert(key.to_string(), Entry { value, ttl });
    }

    /// Make every operation touching `key` fail with an injected error.
    pub fn fail_key(&self, key: &str) {
        self.state.lock().unwrap().fail_keys.insert(key.to_string());
    }

    /// Replace the scan with a fixed page sequence of (next_cursor, keys).
    pub fn script_scan(&self, pages: Vec<(u64, Vec<String>)>) {
        self.state.lock().unwrap().scripted_pages = Some(pages.into());
    }

    /// The current value of a key, if present.
    pub fn value(&self, db: u32, key: &str) -> Option<Value> {
        let state = self.state.lock().unwrap();
        state
            .dbs
            .get(&db)
            .and_then(|keys| keys.get(key))
            .map(|entry| entry.value.clone())
    }

    /// The TTL of a key: `None` if the key is absent, `Some(None)` if it has
    /// no expiration, `Some(Some(secs))` otherwise.
    pub fn ttl_of(&self, db: u32, key: &str) -> Option<Option<u64>> {
        let state = self.state.lock().unwrap();
        state
            .dbs
            .get(&db)
            .and_then(|keys| keys.get(key))
            .map(|entry| entry.ttl)
    }

    pub fn contains(&self, db: u32, key: &str) -> bool {
        self.value(db, key).is_some()
    }
}

// ============================================================================
// Store view
// ============================================================================

/// A [`Store`] view over one logical database of a [`MemoryServer`].
pub struct MemoryStore {
    server: MemoryServer,
    db: u32,
}

impl MemoryStore {
    fn with_state<T>(
        &self,
        key: &str,
        f: impl FnOnce(&mut ServerState, u32) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut state = self.server.state.lock().unwrap();
        if state.fail_keys.contains(key) {
            return Err(StoreError::Other(format!("injected failure on {}", key)));
        }
        f(&mut state, self.db)
    }
}

fn wrong_type() -> StoreError {
    StoreError::Other("WRONGTYPE operation against a key holding the wrong kind of value".into())
}

#[async_trait]
impl Store for MemoryStore {
    async fn key_type(&mut self, key: &str) -> Result<KeyType, StoreError> {
        self.with_state(key, |state, db| {
            Ok(state
                .dbs
                .get(&db)
                .and_then(|keys| keys.get(key))
                .map(|entry| entry.value.key_type())
                .unwrap_or_else(|| KeyType::Other("none".to_string())))
        })
    }

    async fn get(&mut self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        self.with_state(key, |state, db| {
            match state.dbs.get(&db).and_then(|keys| keys.get(key)) {
                None => Ok(None),
                Some(Entry {
                    value: Value::String(v),
                    ..
                }) => Ok(Some(v.clone())),
                Some(_) => Err(wrong_type()),
            }
        })
    }

    async fn set(&mut self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        self.with_state(key, |state, db| {
            state.dbs.entry(db).or_default().insert(
                key.to_string(),
                Entry {
                    value: Value::String(value.to_vec()),
                    ttl: None,
                },
            );
            Ok(())
        })
    }

    async fn hash_entries(&mut self, key: &str) -> Result<Vec<(String, Vec<u8>)>, StoreError> {
        self.with_state(key, |state, db| {
            match state.dbs.get(&db).and_then(|keys| keys.get(key)) {
                None => Ok(Vec::new()),
                Some(Entry {
                    value: Value::Hash(h),
                    ..
                }) => Ok(h.iter().map(|(f, v)| (f.clone(), v.clone())).collect()),
                Some(_) => Err(wrong_type()),
            }
        })
    }

    async fn hash_set_all(
        &mut self,
        key: &str,
        entries: &[(String, Vec<u8>)],
    ) -> Result<(), StoreError> {
        self.with_state(key, |state, db| {
            let entry = state
                .dbs
                .entry(db)
                .or_default()
                .entry(key.to_string())
                .or_insert_with(|| Entry {
                    value: Value::Hash(HashMap::new()),
                    ttl: None,
                });
            match &mut entry.value {
                Value::Hash(h) => {
                    for (field, value) in entries {
                        h.insert(field.clone(), value.clone());
                    }
                    Ok(())
                }
                _ => Err(wrong_type()),
            }
        })
    }

    async fn list_range(&mut self, key: &str) -> Result<Vec<Vec<u8>>, StoreError> {
        self.with_state(key, |state, db| {
            match state.dbs.get(&db).and_then(|keys| keys.get(key)) {
                None => Ok(Vec::new()),
                Some(Entry {
                    value: Value::List(l),
                    ..
                }) => Ok(l.iter().cloned().collect()),
                Some(_) => Err(wrong_type()),
            }
        })
    }

    async fn list_prepend(&mut self, key: &str, items: &[Vec<u8>]) -> Result<(), StoreError> {
        self.with_state(key, |state, db| {
            let entry = state
                .dbs
                .entry(db)
                .or_default()
                .entry(key.to_string())
                .or_insert_with(|| Entry {
                    value: Value::List(VecDeque::new()),
                    ttl: None,
                });
            match &mut entry.value {
                Value::List(l) => {
                    // LPUSH prepends left to right, so the batch lands reversed.
                    for item in items {
                        l.push_front(item.clone());
                    }
                    Ok(())
                }
                _ => Err(wrong_type()),
            }
        })
    }

    async fn set_members(&mut self, key: &str) -> Result<Vec<Vec<u8>>, StoreError> {
        self.with_state(key, |state, db| {
            match state.dbs.get(&db).and_then(|keys| keys.get(key)) {
                None => Ok(Vec::new()),
                Some(Entry {
                    value: Value::Set(s),
                    ..
                }) => Ok(s.iter().cloned().collect()),
                Some(_) => Err(wrong_type()),
            }
        })
    }

    async fn set_add_all(&mut self, key: &str, members: &[Vec<u8>]) -> Result<(), StoreError> {
        self.with_state(key, |state, db| {
            let entry = state
                .dbs
                .entry(db)
                .or_default()
                .entry(key.to_string())
                .or_insert_with(|| Entry {
                    value: Value::Set(HashSet::new()),
                    ttl: None,
                });
            match &mut entry.value {
                Value::Set(s) => {
                    for member in members {
                        s.insert(member.clone());
                    }
                    Ok(())
                }
                _ => Err(wrong_type()),
            }
        })
    }

    async fn sorted_set_entries(&mut self, key: &str) -> Result<Vec<(Vec<u8>, f64)>, StoreError> {
        self.with_state(key, |state, db| {
            match state.dbs.get(&db).and_then(|keys| keys.get(key)) {
                None => Ok(Vec::new()),
                Some(Entry {
                    value: Value::ZSet(z),
                    ..
                }) => {
                    let mut entries: Vec<(Vec<u8>, f64)> =
                        z.iter().map(|(m, s)| (m.clone(), *s)).collect();
                    // ZRANGE returns members ordered by score, then member.
                    entries.sort_by(|a, b| {
                        a.1.partial_cmp(&b.1)
                            .unwrap_or(std::cmp::Ordering::Equal)
                            .then_with(|| a.0.cmp(&b.0))
                    });
                    Ok(entries)
                }
                Some(_) => Err(wrong_type()),
            }
        })
    }

    async fn sorted_set_add(
        &mut self,
        key: &str,
        member: &[u8],
        score: f64,
    ) -> Result<(), StoreError> {
        self.with_state(key, |state, db| {
            let entry = state
                .dbs
                .entry(db)
                .or_default()
                .entry(key.to_string())
                .or_insert_with(|| Entry {
                    value: Value::ZSet(HashMap::new()),
                    ttl: None,
                });
            match &mut entry.value {
                Value::ZSet(z) => {
                    z.insert(member.to_vec(), score);
                    Ok(())
                }
                _ => Err(wrong_type()),
            }
        })
    }

    async fn ttl(&mut self, key: &str) -> Result<Ttl, StoreError> {
        self.with_state(key, |state, db| {
            Ok(
                match state.dbs.get(&db).and_then(|keys| keys.get(key)) {
                    None => Ttl::Missing,
                    Some(Entry { ttl: None, .. }) => Ttl::Persistent,
                    Some(Entry {
                        ttl: Some(secs), ..
                    }) => Ttl::Expires(*secs),
                },
            )
        })
    }

    async fn expire(&mut self, key: &str, seconds: u64) -> Result<bool, StoreError> {
        self.with_state(key, |state, db| {
            match state.dbs.get_mut(&db).and_then(|keys| keys.get_mut(key)) {
                Some(entry) => {
                    entry.ttl = Some(seconds);
                    Ok(true)
                }
                None => Ok(false),
            }
        })
    }

    async fn persist(&mut self, key: &str) -> Result<bool, StoreError> {
        self.with_state(key, |state, db| {
            match state.dbs.get_mut(&db).and_then(|keys| keys.get_mut(key)) {
                Some(entry) if entry.ttl.is_some() => {
                    entry.ttl = None;
                    Ok(true)
                }
                _ => Ok(false),
            }
        })
    }

    async fn delete(&mut self, key: &str) -> Result<bool, StoreError> {
        self.with_state(key, |state, db| {
            Ok(state
                .dbs
                .get_mut(&db)
                .and_then(|keys| keys.remove(key))
                .is_some())
        })
    }

    async fn move_to_db(&mut self, key: &str, db: u32) -> Result<bool, StoreError> {
        self.with_state(key, |state, src_db| {
            let target_has_key = state
                .dbs
                .get(&db)
                .map(|keys| keys.contains_key(key))
                .unwrap_or(false);
            if target_has_key {
                return Ok(false);
            }
            let entry = state
                .dbs
                .get_mut(&src_db)
                .and_then(|keys| keys.remove(key));
            match entry {
                Some(entry) => {
                    state.dbs.entry(db).or_default().insert(key.to_string(), entry);
                    Ok(true)
                }
                None => Ok(false),
            }
        })
    }

    async fn scan_page(
        &mut self,
        cursor: u64,
        count: usize,
    ) -> Result<(u64, Vec<String>), StoreError> {
        let mut state = self.server.state.lock().unwrap();

        if let Some(pages) = state.scripted_pages.as_mut() {
            return Ok(pages.pop_front().unwrap_or((0, Vec::new())));
        }

        let mut keys: Vec<String> = state
            .dbs
            .get(&self.db)
            .map(|keys| keys.keys().cloned().collect())
            .unwrap_or_default();
        keys.sort();

        let start = cursor as usize;
        if start >= keys.len() {
            return Ok((0, Vec::new()));
        }
        let end = (start + count).min(keys.len());
        let next_cursor = if end >= keys.len() { 0 } else { end as u64 };
        Ok((next_cursor, keys[start..end].to_vec()))
    }
}
