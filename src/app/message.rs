use crate::app::record::{LoadedValue, ValueType};
use crate::app::redis_client::KeyStore;
use crate::app::redis_stats::StatsReport;
use crate::app::scan::{KeyCount, ScanRequest, ScanResult};
use crate::search::FilterSpec;
use crossterm::event::KeyEvent;
use std::path::PathBuf;
use std::sync::Arc;

/// What a finished mutation did, for the status line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationKind {
    Deleted { key: String },
    TtlSet { key: String, ttl: i64 },
    Purged { db: u32 },
    Edited { key: String },
    Created { key: String },
}

/// Everything the event loop feeds into `update`.
pub enum Message {
    Key(KeyEvent),
    Tick(String),
    ScanFinished {
        generation: u64,
        outcome: Result<ScanResult, String>,
    },
    CountFinished {
        generation: u64,
        outcome: Result<KeyCount, String>,
    },
    NextBatch,
    ValueLoaded {
        generation: u64,
        value: LoadedValue,
    },
    Mutation {
        kind: MutationKind,
        outcome: Result<(), String>,
    },
    DbSwitched {
        db: u32,
        outcome: Result<Arc<dyn KeyStore>, String>,
    },
    StatsLoaded(Result<StatsReport, String>),
    EditPrepared {
        key: String,
        outcome: Result<PathBuf, String>,
    },
    EditorFinished {
        path: PathBuf,
        outcome: Result<(), String>,
    },
}

/// Side effects requested by `update`.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Scan {
        generation: u64,
        request: ScanRequest,
        filter: FilterSpec,
    },
    Count {
        generation: u64,
        pattern: String,
    },
    /// Handled inline by the event loop, never spawned.
    NextBatch,
    LoadValue {
        generation: u64,
        key: String,
        known_type: ValueType,
        known_ttl: i64,
    },
    Delete {
        key: String,
    },
    SetTtl {
        key: String,
        ttl: i64,
    },
    Flush {
        db: u32,
    },
    SwitchDb {
        db: u32,
    },
    LoadStats,
    PrepareEdit {
        key: String,
        value: String,
        create: bool,
    },
    /// Needs the terminal; the event loop suspends the UI around it.
    OpenEditor {
        path: PathBuf,
    },
    ApplyEdit {
        key: String,
        path: PathBuf,
        create: bool,
    },
    DiscardEdit {
        path: PathBuf,
    },
}
