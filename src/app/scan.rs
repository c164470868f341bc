use crate::app::record::KeyRecord;
use crate::app::redis_client::{KeyStore, ScanNode, StoreError, StoreResult};
use crate::search::{filter_keys, FilterSpec};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::task::JoinSet;

pub const SCAN_CHANNEL_CAPACITY: usize = 256;

/// Parameters of one scan pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanRequest {
    /// Starting cursor. Only meaningful for a single partition.
    pub cursor: u64,
    pub pattern: String,
    pub page_size: usize,
}

impl ScanRequest {
    pub fn new(pattern: &str, page_size: usize) -> Self {
        ScanRequest {
            cursor: 0,
            pattern: pattern.to_string(),
            page_size: page_size.max(1),
        }
    }

    pub fn match_pattern(&self) -> &str {
        if self.pattern.is_empty() {
            "*"
        } else {
            &self.pattern
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScanResult {
    pub records: Vec<KeyRecord>,
    pub total_scanned: usize,
    pub complete: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyCount {
    pub count: usize,
    pub capped: bool,
}

/// Receiving end of a running scan. Yields unique key names, or a single
/// error after which the stream ends.
pub struct ScanStream {
    keys: mpsc::Receiver<StoreResult<String>>,
    scanned: Arc<AtomicUsize>,
}

impl ScanStream {
    pub async fn next(&mut self) -> Option<StoreResult<String>> {
        self.keys.recv().await
    }

    /// Keys returned by the store so far, duplicates included.
    pub fn scanned(&self) -> usize {
        self.scanned.load(Ordering::Relaxed)
    }
}

pub fn spawn_scan(store: Arc<dyn KeyStore>, request: ScanRequest) -> ScanStream {
    let (tx, rx) = mpsc::channel(SCAN_CHANNEL_CAPACITY);
    let scanned = Arc::new(AtomicUsize::new(0));
    let tally = scanned.clone();

    tokio::spawn(async move {
        match scan_partitions(store, &request, tally).await {
            Ok(keys) => {
                for key in keys {
                    if tx.send(Ok(key)).await.is_err() {
                        // Receiver dropped; nobody wants the rest.
                        return;
                    }
                }
            }
            Err(e) => {
                let _ = tx.send(Err(e)).await;
            }
        }
    });

    ScanStream { keys: rx, scanned }
}

/// Drains a scan. Any error discards everything collected before it.
pub async fn collect_scan(mut stream: ScanStream) -> StoreResult<(Vec<String>, usize)> {
    let mut keys = Vec::new();
    while let Some(item) = stream.next().await {
        keys.push(item?);
    }
    Ok((keys, stream.scanned()))
}

/// Scan, filter and wrap the keys as unloaded records.
pub async fn run_scan(
    store: Arc<dyn KeyStore>,
    request: ScanRequest,
    filter: &FilterSpec,
) -> StoreResult<ScanResult> {
    log::debug!(
        "Scanning DB {} with pattern '{}' (page size {})",
        store.db(),
        request.match_pattern(),
        request.page_size
    );
    let (keys, total_scanned) = collect_scan(spawn_scan(store, request)).await?;
    let records = filter_keys(keys, filter)
        .into_iter()
        .map(KeyRecord::unloaded)
        .collect();
    Ok(ScanResult {
        records,
        total_scanned,
        complete: true,
    })
}

async fn scan_partitions(
    store: Arc<dyn KeyStore>,
    request: &ScanRequest,
    tally: Arc<AtomicUsize>,
) -> StoreResult<Vec<String>> {
    let nodes = store.nodes();
    let start_cursor = if nodes.len() == 1 { request.cursor } else { 0 };
    let collected = Arc::new(Mutex::new(Vec::new()));

    let mut workers = JoinSet::new();
    for node in nodes {
        workers.spawn(scan_node(
            node,
            start_cursor,
            request.match_pattern().to_string(),
            request.page_size,
            collected.clone(),
            tally.clone(),
        ));
    }

    while let Some(joined) = workers.join_next().await {
        let outcome = joined.unwrap_or_else(|e| Err(StoreError::Worker(e.to_string())));
        if let Err(e) = outcome {
            workers.abort_all();
            return Err(e);
        }
    }

    let keys = std::mem::take(&mut *collected.lock().unwrap_or_else(|p| p.into_inner()));
    Ok(dedupe(keys))
}

async fn scan_node(
    node: Arc<dyn ScanNode>,
    start_cursor: u64,
    pattern: String,
    page_size: usize,
    collected: Arc<Mutex<Vec<String>>>,
    tally: Arc<AtomicUsize>,
) -> StoreResult<()> {
    let mut cursor = start_cursor;
    loop {
        let (next, page) = node
            .scan_page(cursor, &pattern, page_size)
            .await
            .inspect_err(|e| log::warn!("Scan of {} failed: {}", node.label(), e))?;
        tally.fetch_add(page.len(), Ordering::Relaxed);
        collected
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .extend(page);
        if next == 0 {
            return Ok(());
        }
        cursor = next;
    }
}

// SCAN may return a key more than once; keep the first occurrence.
fn dedupe(keys: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::with_capacity(keys.len());
    keys.into_iter().filter(|key| seen.insert(key.clone())).collect()
}

/// Counts distinct keys matching `pattern`, giving up once `cap` is reached.
pub async fn count_keys(
    store: Arc<dyn KeyStore>,
    pattern: &str,
    page_size: usize,
    cap: usize,
) -> StoreResult<KeyCount> {
    let pattern = if pattern.is_empty() { "*" } else { pattern };
    let mut seen = HashSet::new();
    for node in store.nodes() {
        let mut cursor = 0;
        loop {
            let (next, page) = node.scan_page(cursor, pattern, page_size.max(1)).await?;
            seen.extend(page);
            if seen.len() >= cap {
                return Ok(KeyCount {
                    count: cap,
                    capped: true,
                });
            }
            if next == 0 {
                break;
            }
            cursor = next;
        }
    }
    Ok(KeyCount {
        count: seen.len(),
        capped: false,
    })
}
