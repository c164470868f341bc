//! Test utilities shared across the crate.
//!
//! This module is only compiled during tests (`#[cfg(test)]`). `MemoryServer`
//! is a tiny in-process keyspace that implements the same store traits as the
//! real client, including partitioned scans and scan fault injection.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use crate::app::redis_client::{Connector, KeyStore, ScanNode, StoreError, StoreResult};
use crate::app::{App, AppOptions};
use crate::config::{ConnectionSettings, Topology};

#[derive(Debug, Clone, PartialEq)]
pub enum MemoryValue {
    Str(String),
    Raw(Vec<u8>),
    List(Vec<String>),
    Set(BTreeSet<String>),
    ZSet(Vec<(String, f64)>),
    Hash(BTreeMap<String, String>),
    Stream,
}

impl MemoryValue {
    fn type_name(&self) -> &'static str {
        match self {
            MemoryValue::Str(_) | MemoryValue::Raw(_) => "string",
            MemoryValue::List(_) => "list",
            MemoryValue::Set(_) => "set",
            MemoryValue::ZSet(_) => "zset",
            MemoryValue::Hash(_) => "hash",
            MemoryValue::Stream => "stream",
        }
    }
}

#[derive(Debug, Clone)]
struct Entry {
    value: MemoryValue,
    ttl: Option<i64>,
}

#[derive(Default)]
struct ServerState {
    dbs: BTreeMap<u32, BTreeMap<String, Entry>>,
    unavailable_dbs: HashSet<u32>,
    fail_scans_after: Option<usize>,
    repeat_pages: bool,
}

pub struct MemoryServer {
    partitions: usize,
    state: Mutex<ServerState>,
    scan_calls: AtomicUsize,
    random_cursor: AtomicUsize,
}

impl MemoryServer {
    /// More than one partition makes the store report a cluster topology.
    pub fn with_partitions(partitions: usize) -> Arc<Self> {
        Arc::new(MemoryServer {
            partitions: partitions.max(1),
            state: Mutex::new(ServerState::default()),
            scan_calls: AtomicUsize::new(0),
            random_cursor: AtomicUsize::new(0),
        })
    }

    pub fn store(self: &Arc<Self>, db: u32) -> Arc<dyn KeyStore> {
        Arc::new(MemoryStore {
            server: self.clone(),
            db,
        })
    }

    pub fn connector(self: &Arc<Self>) -> Arc<dyn Connector> {
        Arc::new(MemoryConnector {
            server: self.clone(),
        })
    }

    fn state(&self) -> MutexGuard<'_, ServerState> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn topology(&self) -> Topology {
        if self.partitions > 1 {
            Topology::Cluster
        } else {
            Topology::Standalone
        }
    }

    pub fn insert(&self, db: u32, key: &str, value: MemoryValue) {
        self.state()
            .dbs
            .entry(db)
            .or_default()
            .insert(key.to_string(), Entry { value, ttl: None });
    }

    pub fn set_string(&self, db: u32, key: &str, value: &str) {
        self.insert(db, key, MemoryValue::Str(value.to_string()));
    }

    pub fn set_ttl(&self, db: u32, key: &str, seconds: i64) {
        if let Some(entry) = self.state().dbs.entry(db).or_default().get_mut(key) {
            entry.ttl = Some(seconds);
        }
    }

    pub fn get(&self, db: u32, key: &str) -> Option<MemoryValue> {
        self.state()
            .dbs
            .get(&db)
            .and_then(|keys| keys.get(key))
            .map(|entry| entry.value.clone())
    }

    pub fn keys(&self, db: u32) -> Vec<String> {
        self.state()
            .dbs
            .get(&db)
            .map(|keys| keys.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn ttl_of(&self, db: u32, key: &str) -> i64 {
        match self.state().dbs.get(&db).and_then(|keys| keys.get(key)) {
            None => -2,
            Some(Entry { ttl: None, .. }) => -1,
            Some(Entry { ttl: Some(ttl), .. }) => *ttl,
        }
    }

    /// Every scan page after the first `ok_pages` fails.
    pub fn fail_scans_after(&self, ok_pages: usize) {
        self.scan_calls.store(0, Ordering::SeqCst);
        self.state().fail_scans_after = Some(ok_pages);
    }

    /// Each page repeats the last key of the previous page, like SCAN may.
    pub fn repeat_scan_pages(&self, on: bool) {
        self.state().repeat_pages = on;
    }

    pub fn make_unavailable(&self, db: u32) {
        self.state().unavailable_dbs.insert(db);
    }

    fn partition_of(&self, key: &str) -> usize {
        key.bytes().map(usize::from).sum::<usize>() % self.partitions
    }

    fn partition_keys(&self, db: u32, partition: usize) -> Vec<String> {
        self.keys(db)
            .into_iter()
            .filter(|key| self.partition_of(key) == partition)
            .collect()
    }

    fn with_entry<T>(
        &self,
        db: u32,
        key: &str,
        read: impl FnOnce(&MemoryValue) -> StoreResult<T>,
    ) -> StoreResult<Option<T>> {
        match self.state().dbs.get(&db).and_then(|keys| keys.get(key)) {
            Some(entry) => read(&entry.value).map(Some),
            None => Ok(None),
        }
    }
}

fn wrong_type() -> StoreError {
    StoreError::Command(
        "WRONGTYPE Operation against a key holding the wrong kind of value".to_string(),
    )
}

/// Minimal glob: `*` and `?` only.
pub fn glob_match(pattern: &str, text: &str) -> bool {
    fn matches(p: &[char], t: &[char]) -> bool {
        match p.first() {
            None => t.is_empty(),
            Some('*') => matches(&p[1..], t) || (!t.is_empty() && matches(p, &t[1..])),
            Some('?') => !t.is_empty() && matches(&p[1..], &t[1..]),
            Some(c) => t.first() == Some(c) && matches(&p[1..], &t[1..]),
        }
    }
    let p: Vec<char> = pattern.chars().collect();
    let t: Vec<char> = text.chars().collect();
    matches(&p, &t)
}

pub struct MemoryStore {
    server: Arc<MemoryServer>,
    db: u32,
}

#[async_trait]
impl KeyStore for MemoryStore {
    fn topology(&self) -> Topology {
        self.server.topology()
    }

    fn db(&self) -> u32 {
        self.db
    }

    fn nodes(&self) -> Vec<Arc<dyn ScanNode>> {
        (0..self.server.partitions)
            .map(|partition| {
                Arc::new(MemoryNode {
                    server: self.server.clone(),
                    db: self.db,
                    partition,
                }) as Arc<dyn ScanNode>
            })
            .collect()
    }

    async fn ping(&self) -> StoreResult<()> {
        if self.server.state().unavailable_dbs.contains(&self.db) {
            return Err(StoreError::Connection(format!("DB {} is unavailable", self.db)));
        }
        Ok(())
    }

    async fn server_info(&self) -> StoreResult<String> {
        Ok([
            "# Server",
            "redis_version:7.2.4",
            "uptime_in_seconds:93784",
            "# Clients",
            "connected_clients:3",
            "# Memory",
            "used_memory:1048576",
            "used_memory_human:1.00M",
            "used_memory_peak_human:2.00M",
            "mem_fragmentation_ratio:1.25",
            "# Stats",
            "total_commands_processed:12345",
            "instantaneous_ops_per_sec:42",
            "expired_keys:7",
            "evicted_keys:0",
        ]
        .join("\r\n"))
    }

    async fn key_type(&self, key: &str) -> StoreResult<String> {
        Ok(self
            .server
            .with_entry(self.db, key, |value| Ok(value.type_name()))?
            .unwrap_or("none")
            .to_string())
    }

    async fn ttl(&self, key: &str) -> StoreResult<i64> {
        Ok(self.server.ttl_of(self.db, key))
    }

    async fn get_bytes(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        self.server.with_entry(self.db, key, |value| match value {
            MemoryValue::Str(text) => Ok(text.as_bytes().to_vec()),
            MemoryValue::Raw(bytes) => Ok(bytes.clone()),
            _ => Err(wrong_type()),
        })
    }

    async fn list_range(&self, key: &str) -> StoreResult<Vec<String>> {
        let items = self.server.with_entry(self.db, key, |value| match value {
            MemoryValue::List(items) => Ok(items.clone()),
            _ => Err(wrong_type()),
        })?;
        Ok(items.unwrap_or_default())
    }

    async fn set_members(&self, key: &str) -> StoreResult<Vec<String>> {
        let members = self.server.with_entry(self.db, key, |value| match value {
            // Reverse order so callers cannot rely on set ordering.
            MemoryValue::Set(members) => Ok(members.iter().rev().cloned().collect()),
            _ => Err(wrong_type()),
        })?;
        Ok(members.unwrap_or_default())
    }

    async fn sorted_set_range(&self, key: &str) -> StoreResult<Vec<String>> {
        let members = self.server.with_entry(self.db, key, |value| match value {
            MemoryValue::ZSet(scored) => {
                let mut scored = scored.clone();
                scored.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
                Ok(scored.into_iter().map(|(member, _)| member).collect())
            }
            _ => Err(wrong_type()),
        })?;
        Ok(members.unwrap_or_default())
    }

    async fn hash_entries(&self, key: &str) -> StoreResult<Vec<(String, String)>> {
        let pairs = self.server.with_entry(self.db, key, |value| match value {
            MemoryValue::Hash(fields) => Ok(fields
                .iter()
                .map(|(f, v)| (f.clone(), v.clone()))
                .collect()),
            _ => Err(wrong_type()),
        })?;
        Ok(pairs.unwrap_or_default())
    }

    async fn set_string(&self, key: &str, value: &str) -> StoreResult<()> {
        self.server.set_string(self.db, key, value);
        Ok(())
    }

    async fn expire(&self, key: &str, seconds: i64) -> StoreResult<()> {
        self.server.set_ttl(self.db, key, seconds);
        Ok(())
    }

    async fn persist(&self, key: &str) -> StoreResult<()> {
        if let Some(entry) = self
            .server
            .state()
            .dbs
            .get_mut(&self.db)
            .and_then(|keys| keys.get_mut(key))
        {
            entry.ttl = None;
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> StoreResult<bool> {
        Ok(self
            .server
            .state()
            .dbs
            .get_mut(&self.db)
            .and_then(|keys| keys.remove(key))
            .is_some())
    }
}

pub struct MemoryNode {
    server: Arc<MemoryServer>,
    db: u32,
    partition: usize,
}

#[async_trait]
impl ScanNode for MemoryNode {
    fn label(&self) -> String {
        format!("memory-{}", self.partition)
    }

    async fn scan_page(
        &self,
        cursor: u64,
        pattern: &str,
        page_size: usize,
    ) -> StoreResult<(u64, Vec<String>)> {
        let call = self.server.scan_calls.fetch_add(1, Ordering::SeqCst);
        let (fail_after, repeat) = {
            let state = self.server.state();
            (state.fail_scans_after, state.repeat_pages)
        };
        if fail_after.is_some_and(|ok_pages| call >= ok_pages) {
            return Err(StoreError::Command("injected scan failure".to_string()));
        }

        let keys = self.server.partition_keys(self.db, self.partition);
        let start = (cursor as usize).min(keys.len());
        let end = (start + page_size.max(1)).min(keys.len());
        let from = if repeat && start > 0 { start - 1 } else { start };
        let page = keys[from..end]
            .iter()
            .filter(|key| glob_match(pattern, key))
            .cloned()
            .collect();
        let next = if end >= keys.len() { 0 } else { end as u64 };
        Ok((next, page))
    }

    async fn flush_db(&self) -> StoreResult<()> {
        let doomed = self.server.partition_keys(self.db, self.partition);
        if let Some(keys) = self.server.state().dbs.get_mut(&self.db) {
            for key in doomed {
                keys.remove(&key);
            }
        }
        Ok(())
    }

    async fn db_size(&self) -> StoreResult<u64> {
        Ok(self.server.partition_keys(self.db, self.partition).len() as u64)
    }

    async fn random_key(&self) -> StoreResult<Option<String>> {
        let keys = self.server.partition_keys(self.db, self.partition);
        if keys.is_empty() {
            return Ok(None);
        }
        let turn = self.server.random_cursor.fetch_add(1, Ordering::SeqCst);
        Ok(keys.get(turn % keys.len()).cloned())
    }

    async fn ttl(&self, key: &str) -> StoreResult<i64> {
        Ok(self.server.ttl_of(self.db, key))
    }
}

pub struct MemoryConnector {
    server: Arc<MemoryServer>,
}

#[async_trait]
impl Connector for MemoryConnector {
    async fn connect(&self, settings: &ConnectionSettings) -> StoreResult<Arc<dyn KeyStore>> {
        let store = self.server.store(settings.db);
        store.ping().await?;
        Ok(store)
    }
}

pub fn test_settings(db: u32) -> ConnectionSettings {
    ConnectionSettings {
        profile_name: "test".to_string(),
        addrs: vec!["memory".to_string()],
        db,
        username: None,
        password: None,
        master_name: None,
        topology: Topology::Standalone,
    }
}

/// Creates a test App bound to DB 0 of `server`.
pub fn test_app(server: &Arc<MemoryServer>) -> App {
    App::new(server.store(0), test_settings(0), AppOptions::default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn glob_supports_star_and_question_mark() {
        assert!(glob_match("*", ""));
        assert!(glob_match("a*", "ab"));
        assert!(glob_match("user:?", "user:1"));
        assert!(!glob_match("a*", "b"));
        assert!(!glob_match("user:?", "user:10"));
    }
}
