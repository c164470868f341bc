pub mod app_fetch;
pub mod batch;
pub mod editor;
pub mod executor;
pub mod message;
pub mod record;
pub mod redis_client;
pub mod redis_stats;
pub mod scan;
pub mod state_dialogs;
pub mod update;
pub mod value_format;


pub use executor::{perform, TaskContext};
pub use message::{Command, Message, MutationKind};
pub use update::update;

use crate::app::batch::BatchDispatcher;
use crate::app::record::KeyRecord;
use crate::app::redis_client::{Connector, KeyStore};
use crate::app::redis_stats::StatsReport;
use crate::app::scan::ScanRequest;
use crate::app::state_dialogs::TextInput;
use crate::config::{self, ConnectionSettings, Topology};
use crate::search::FilterSpec;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Default,
    Search,
    FuzzySearch,
    SwitchDb,
    SetTtl,
    ConfirmDelete,
    ConfirmPurge,
    Help,
    Stats,
    CreateKeyInput,
    EditingKey,
}

impl Mode {
    pub fn label(self) -> &'static str {
        match self {
            Mode::Default => "BROWSE",
            Mode::Search => "SEARCH",
            Mode::FuzzySearch => "FILTER",
            Mode::SwitchDb => "SWITCH DB",
            Mode::SetTtl => "SET TTL",
            Mode::ConfirmDelete => "DELETE?",
            Mode::ConfirmPurge => "PURGE?",
            Mode::Help => "HELP",
            Mode::Stats => "STATS",
            Mode::CreateKeyInput => "NEW KEY",
            Mode::EditingKey => "EDITING",
        }
    }

    pub fn is_prompt(self) -> bool {
        matches!(
            self,
            Mode::Search | Mode::FuzzySearch | Mode::SwitchDb | Mode::SetTtl | Mode::CreateKeyInput
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    List,
    Detail,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppOptions {
    pub scan_page_size: usize,
    pub count_cap: usize,
    pub stats_sample_size: usize,
    pub editor: Option<String>,
}

impl Default for AppOptions {
    fn default() -> Self {
        AppOptions {
            scan_page_size: config::DEFAULT_SCAN_PAGE_SIZE,
            count_cap: config::DEFAULT_COUNT_CAP,
            stats_sample_size: config::DEFAULT_STATS_SAMPLE_SIZE,
            editor: None,
        }
    }
}

/// A create or edit waiting on the external editor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditSession {
    pub key: String,
    pub create: bool,
    pub path: Option<PathBuf>,
}

pub struct App {
    pub mode: Mode,
    pub focus: Focus,
    pub store: Arc<dyn KeyStore>,
    pub settings: ConnectionSettings,
    pub options: AppOptions,

    pub records: Vec<KeyRecord>,
    pub selected: usize,
    pub dispatcher: BatchDispatcher,
    pub loads_in_flight: HashSet<String>,

    pub search_pattern: String,
    pub filter_query: String,
    pub fuzzy: bool,
    pub input: TextInput,

    pub pending_delete: Option<String>,
    pub pending_ttl_key: Option<String>,
    pub editing: Option<EditSession>,

    /// Bumped on every rescan; results tagged with an older value are dropped.
    pub scan_generation: u64,
    pub ready: bool,
    pub scan_in_progress: bool,
    pub scanned: usize,
    /// Failure of the current scan. Kept visible over the count result.
    pub scan_error: Option<String>,
    /// Count result held back while batches are still being displayed.
    pub count_status: Option<String>,

    pub status: String,
    pub clock: String,
    pub wrap: bool,
    pub detail_scroll: u16,

    pub stats: Option<StatsReport>,
    pub stats_error: Option<String>,
    pub stats_loading: bool,

    pub should_quit: bool,
}

impl App {
    pub fn new(store: Arc<dyn KeyStore>, settings: ConnectionSettings, options: AppOptions) -> App {
        App {
            mode: Mode::Default,
            focus: Focus::List,
            store,
            settings,
            options,
            records: Vec::new(),
            selected: 0,
            dispatcher: BatchDispatcher::default(),
            loads_in_flight: HashSet::new(),
            search_pattern: String::new(),
            filter_query: String::new(),
            fuzzy: true,
            input: TextInput::default(),
            pending_delete: None,
            pending_ttl_key: None,
            editing: None,
            scan_generation: 0,
            ready: false,
            scan_in_progress: false,
            scanned: 0,
            scan_error: None,
            count_status: None,
            status: "Connecting...".to_string(),
            clock: String::new(),
            wrap: false,
            detail_scroll: 0,
            stats: None,
            stats_error: None,
            stats_loading: false,
            should_quit: false,
        }
    }

    pub fn db(&self) -> u32 {
        self.settings.db
    }

    pub fn topology(&self) -> Topology {
        self.store.topology()
    }

    pub fn selected_record(&self) -> Option<&KeyRecord> {
        self.records.get(self.selected)
    }

    pub fn filter_spec(&self) -> FilterSpec {
        FilterSpec::new(&self.filter_query, self.fuzzy)
    }

    /// First scan after connecting.
    pub fn start(&mut self) -> Vec<Command> {
        self.status = format!("Scanning DB {}...", self.db());
        self.rescan()
    }

    /// Resynchronises the list with the store: fresh scan plus recount.
    pub fn rescan(&mut self) -> Vec<Command> {
        self.ready = false;
        self.scan_in_progress = true;
        self.scanned = 0;
        self.scan_error = None;
        self.count_status = None;
        self.scan_generation += 1;
        let request = ScanRequest::new(&self.search_pattern, self.options.scan_page_size);
        let pattern = request.match_pattern().to_string();
        vec![
            Command::Scan {
                generation: self.scan_generation,
                request,
                filter: self.filter_spec(),
            },
            Command::Count {
                generation: self.scan_generation,
                pattern,
            },
        ]
    }

    /// Load command for the selected record, unless it is loaded or loading.
    pub fn load_selected(&mut self) -> Option<Command> {
        let record = self.records.get(self.selected)?;
        if record.loaded || self.loads_in_flight.contains(&record.key) {
            return None;
        }
        let command = Command::LoadValue {
            generation: self.scan_generation,
            key: record.key.clone(),
            known_type: record.value_type,
            known_ttl: record.ttl_seconds,
        };
        self.loads_in_flight.insert(record.key.clone());
        Some(command)
    }

    /// Snapshot handed to a spawned command. Holding the store `Arc` keeps the
    /// connection alive for that command even if the app switches databases.
    pub fn task_context(&self, connector: &Arc<dyn Connector>) -> TaskContext {
        TaskContext {
            store: self.store.clone(),
            connector: connector.clone(),
            settings: self.settings.clone(),
            options: self.options.clone(),
        }
    }
}
