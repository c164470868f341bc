use crate::app::message::{Command, Message, MutationKind};
use crate::app::record::{LoadedValue, ValueType};
use crate::app::redis_stats::StatsReport;
use crate::app::scan::{KeyCount, ScanResult};
use crate::app::state_dialogs::{parse_db_index, parse_key_name, parse_ttl};
use crate::app::{App, EditSession, Focus, Mode};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use std::path::PathBuf;

const DETAIL_PAGE: u16 = 10;

/// Applies one message to the app and returns the side effects to run.
/// All state changes happen here, on the event loop.
pub fn update(app: &mut App, message: Message) -> Vec<Command> {
    match message {
        Message::Key(key) => handle_key(app, key),
        Message::Tick(clock) => {
            app.clock = clock;
            Vec::new()
        }
        Message::ScanFinished {
            generation,
            outcome,
        } => on_scan_finished(app, generation, outcome),
        Message::CountFinished {
            generation,
            outcome,
        } => on_count_finished(app, generation, outcome),
        Message::NextBatch => on_next_batch(app),
        Message::ValueLoaded { generation, value } => on_value_loaded(app, generation, value),
        Message::Mutation { kind, outcome } => on_mutation(app, kind, outcome),
        Message::DbSwitched { db, outcome } => match outcome {
            Ok(store) => {
                log::info!("Switched to DB {}", db);
                app.store = store;
                app.settings = app.settings.with_db(db);
                app.status = format!("Switched to database {}", db);
                app.rescan()
            }
            Err(e) => {
                log::warn!("Switch to DB {} failed: {}", db, e);
                app.status = format!("Failed to switch to database {}: {}", db, e);
                Vec::new()
            }
        },
        Message::StatsLoaded(outcome) => on_stats_loaded(app, outcome),
        Message::EditPrepared { key, outcome } => on_edit_prepared(app, key, outcome),
        Message::EditorFinished { path, outcome } => on_editor_finished(app, path, outcome),
    }
}

fn on_scan_finished(
    app: &mut App,
    generation: u64,
    outcome: Result<ScanResult, String>,
) -> Vec<Command> {
    if generation != app.scan_generation {
        log::debug!(
            "Dropping scan result {} (current {})",
            generation,
            app.scan_generation
        );
        return Vec::new();
    }
    app.scan_in_progress = false;
    app.records.clear();
    app.selected = 0;
    app.detail_scroll = 0;
    app.loads_in_flight.clear();

    match outcome {
        Ok(result) => {
            log::info!(
                "Scan {} finished: {} keys shown, {} scanned",
                generation,
                result.records.len(),
                result.total_scanned
            );
            app.scanned = result.total_scanned;
            app.scan_error = None;
            let empty = result.records.is_empty();
            app.dispatcher.reset(result.records);
            if empty {
                if let Some(status) = &app.count_status {
                    app.status = status.clone();
                }
                return Vec::new();
            }
            vec![Command::NextBatch]
        }
        Err(e) => {
            log::warn!("Scan {} failed: {}", generation, e);
            app.dispatcher.reset(Vec::new());
            app.status = format!("Scan failed: {}", e);
            app.scan_error = Some(e);
            app.ready = true;
            Vec::new()
        }
    }
}

fn on_count_finished(
    app: &mut App,
    generation: u64,
    outcome: Result<KeyCount, String>,
) -> Vec<Command> {
    if generation != app.scan_generation {
        return Vec::new();
    }
    app.ready = true;
    let status = match outcome {
        Ok(count) if count.capped => format!("DB {}: {}+ keys found", app.db(), count.count),
        Ok(count) => format!("DB {}: {} keys found", app.db(), count.count),
        Err(e) => format!("Failed to count keys: {}", e),
    };
    if app.scan_error.is_some() {
        log::debug!("Keeping scan error over count result: {}", status);
        return Vec::new();
    }
    if app.dispatcher.is_complete() {
        app.status = status.clone();
    }
    app.count_status = Some(status);
    Vec::new()
}

fn on_next_batch(app: &mut App) -> Vec<Command> {
    // Left over from an earlier scan; the current one is already shown.
    if app.dispatcher.is_complete() {
        return Vec::new();
    }
    let was_empty = app.records.is_empty();
    let batch = app.dispatcher.next_batch();
    app.records.extend(batch.items);

    let mut commands = Vec::new();
    if was_empty && !app.records.is_empty() {
        commands.extend(app.load_selected());
    }
    if !batch.complete {
        app.status = format!(
            "Displaying... {}/{} keys",
            app.records.len(),
            app.dispatcher.total()
        );
        commands.push(Command::NextBatch);
    } else if let Some(status) = &app.count_status {
        app.status = status.clone();
    } else if !was_empty {
        app.status = format!("Displayed {} keys, counting...", app.records.len());
    }
    commands
}

fn on_value_loaded(app: &mut App, generation: u64, value: LoadedValue) -> Vec<Command> {
    if generation != app.scan_generation {
        log::debug!("Dropping stale value for '{}'", value.key);
        return Vec::new();
    }
    app.loads_in_flight.remove(&value.key);
    match app.records.iter_mut().find(|record| record.key == value.key) {
        Some(record) => record.apply(&value),
        None => log::debug!("'{}' is no longer listed; value dropped", value.key),
    }
    Vec::new()
}

fn on_mutation(app: &mut App, kind: MutationKind, outcome: Result<(), String>) -> Vec<Command> {
    if matches!(kind, MutationKind::Edited { .. } | MutationKind::Created { .. }) {
        app.editing = None;
        if app.mode == Mode::EditingKey {
            app.mode = Mode::Default;
        }
    }

    match outcome {
        Ok(()) => {
            app.status = match &kind {
                MutationKind::Deleted { key } => format!("Key '{}' deleted successfully", key),
                MutationKind::TtlSet { key, ttl } if *ttl <= 0 => {
                    format!("TTL removed from key '{}' (now persistent)", key)
                }
                MutationKind::TtlSet { key, ttl } => {
                    format!("TTL set to {} seconds for key '{}'", ttl, key)
                }
                MutationKind::Purged { db } => format!("Database {} purged successfully", db),
                MutationKind::Edited { key } => format!("Key '{}' updated successfully", key),
                MutationKind::Created { key } => format!("Key '{}' created successfully", key),
            };
            log::info!("{}", app.status);
            app.rescan()
        }
        Err(e) => {
            app.status = match &kind {
                MutationKind::Deleted { key } => format!("Failed to delete key '{}': {}", key, e),
                MutationKind::TtlSet { key, .. } => {
                    format!("Failed to set TTL for key '{}': {}", key, e)
                }
                MutationKind::Purged { db } => format!("Failed to purge database {}: {}", db, e),
                MutationKind::Edited { .. } => format!("Failed to update key: {}", e),
                MutationKind::Created { .. } => format!("Failed to create key: {}", e),
            };
            log::warn!("{}", app.status);
            Vec::new()
        }
    }
}

fn on_stats_loaded(app: &mut App, outcome: Result<StatsReport, String>) -> Vec<Command> {
    app.stats_loading = false;
    match outcome {
        Ok(report) => {
            app.stats = Some(report);
            app.stats_error = None;
        }
        Err(e) => {
            app.status = format!("Failed to load stats: {}", e);
            app.stats_error = Some(e);
        }
    }
    Vec::new()
}

fn on_edit_prepared(app: &mut App, key: String, outcome: Result<PathBuf, String>) -> Vec<Command> {
    let session = match app.editing.as_mut() {
        Some(session) if session.key == key => session,
        _ => {
            return match outcome {
                Ok(path) => vec![Command::DiscardEdit { path }],
                Err(_) => Vec::new(),
            };
        }
    };
    match outcome {
        Ok(path) => {
            session.path = Some(path.clone());
            vec![Command::OpenEditor { path }]
        }
        Err(e) => {
            app.status = if session.create {
                format!("Failed to prepare create: {}", e)
            } else {
                format!("Failed to prepare edit: {}", e)
            };
            app.editing = None;
            app.mode = Mode::Default;
            Vec::new()
        }
    }
}

fn on_editor_finished(app: &mut App, path: PathBuf, outcome: Result<(), String>) -> Vec<Command> {
    let session = app.editing.clone();
    match (session, outcome) {
        (Some(session), Ok(())) => vec![Command::ApplyEdit {
            key: session.key,
            path,
            create: session.create,
        }],
        (_, outcome) => {
            if let Err(e) = outcome {
                app.status = format!("Editor failed: {}", e);
            }
            app.editing = None;
            app.mode = Mode::Default;
            vec![Command::DiscardEdit { path }]
        }
    }
}

fn handle_key(app: &mut App, key: KeyEvent) -> Vec<Command> {
    // The terminal belongs to the editor until it exits.
    if app.mode == Mode::EditingKey {
        return Vec::new();
    }

    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    if ctrl && key.code == KeyCode::Char('c') {
        app.should_quit = true;
        return Vec::new();
    }
    if ctrl
        && key.code == KeyCode::Char('f')
        && !matches!(app.mode, Mode::ConfirmDelete | Mode::ConfirmPurge)
    {
        return toggle_filter_mode(app);
    }

    match app.mode {
        Mode::Default => handle_default_key(app, key),
        Mode::ConfirmDelete | Mode::ConfirmPurge => handle_confirm_key(app, key),
        Mode::Help => {
            if matches!(key.code, KeyCode::Char('?') | KeyCode::Esc) {
                app.mode = Mode::Default;
            }
            Vec::new()
        }
        Mode::Stats => match key.code {
            KeyCode::Char('i') | KeyCode::Char('q') | KeyCode::Esc => {
                app.mode = Mode::Default;
                Vec::new()
            }
            KeyCode::Char('r') => {
                app.stats_loading = true;
                vec![Command::LoadStats]
            }
            _ => Vec::new(),
        },
        mode if mode.is_prompt() => handle_prompt_key(app, key),
        _ => Vec::new(),
    }
}

fn toggle_filter_mode(app: &mut App) -> Vec<Command> {
    app.fuzzy = !app.fuzzy;
    app.status = if app.fuzzy {
        "Switched to fuzzy mode".to_string()
    } else {
        "Switched to strict mode".to_string()
    };
    if app.filter_query.is_empty() {
        Vec::new()
    } else {
        app.rescan()
    }
}

fn handle_default_key(app: &mut App, key: KeyEvent) -> Vec<Command> {
    match key.code {
        KeyCode::Char('q') => {
            app.should_quit = true;
            Vec::new()
        }
        KeyCode::Char('r') => {
            app.status = "Reloading keys...".to_string();
            app.rescan()
        }
        KeyCode::Char('s') => {
            let pattern = app.search_pattern.clone();
            open_prompt(app, Mode::Search, &pattern)
        }
        KeyCode::Char('/') => {
            let query = app.filter_query.clone();
            open_prompt(app, Mode::FuzzySearch, &query)
        }
        KeyCode::Char('x') => {
            match app.selected_record().map(|record| record.key.clone()) {
                Some(key) => {
                    app.pending_delete = Some(key);
                    app.mode = Mode::ConfirmDelete;
                }
                None => app.status = "No key selected".to_string(),
            }
            Vec::new()
        }
        KeyCode::Char('P') => {
            app.mode = Mode::ConfirmPurge;
            Vec::new()
        }
        KeyCode::Char('d') => open_prompt(app, Mode::SwitchDb, ""),
        KeyCode::Char('t') => match app.selected_record().map(|record| record.key.clone()) {
            Some(key) => {
                app.pending_ttl_key = Some(key);
                open_prompt(app, Mode::SetTtl, "")
            }
            None => {
                app.status = "No key selected".to_string();
                Vec::new()
            }
        },
        KeyCode::Char('w') => {
            app.wrap = !app.wrap;
            Vec::new()
        }
        KeyCode::Char('?') => {
            app.mode = Mode::Help;
            Vec::new()
        }
        KeyCode::Char('i') => {
            app.mode = Mode::Stats;
            app.stats_loading = true;
            vec![Command::LoadStats]
        }
        KeyCode::Char('e') => start_edit(app),
        KeyCode::Char('n') => open_prompt(app, Mode::CreateKeyInput, ""),
        KeyCode::Left => {
            app.focus = Focus::List;
            Vec::new()
        }
        KeyCode::Right => {
            app.focus = Focus::Detail;
            Vec::new()
        }
        KeyCode::Up | KeyCode::Char('k') => navigate(app, -1),
        KeyCode::Down | KeyCode::Char('j') => navigate(app, 1),
        KeyCode::PageUp => {
            app.detail_scroll = app.detail_scroll.saturating_sub(DETAIL_PAGE);
            Vec::new()
        }
        KeyCode::PageDown => {
            app.detail_scroll = app.detail_scroll.saturating_add(DETAIL_PAGE);
            Vec::new()
        }
        _ => Vec::new(),
    }
}

fn navigate(app: &mut App, delta: i64) -> Vec<Command> {
    if app.focus == Focus::Detail {
        app.detail_scroll = if delta < 0 {
            app.detail_scroll.saturating_sub(1)
        } else {
            app.detail_scroll.saturating_add(1)
        };
        return Vec::new();
    }
    if app.records.is_empty() {
        return Vec::new();
    }
    let last = app.records.len() - 1;
    let target = if delta < 0 {
        app.selected.saturating_sub(1)
    } else {
        (app.selected + 1).min(last)
    };
    if target == app.selected {
        return Vec::new();
    }
    app.selected = target;
    app.detail_scroll = 0;
    app.load_selected().into_iter().collect()
}

fn start_edit(app: &mut App) -> Vec<Command> {
    let record = match app.selected_record() {
        Some(record) => record,
        None => {
            app.status = "No key selected".to_string();
            return Vec::new();
        }
    };
    if !record.loaded || record.fetch_error || record.value_type != ValueType::String {
        app.status = "Only loaded string keys can be edited".to_string();
        return Vec::new();
    }
    if record.binary {
        app.status = "Binary values cannot be edited".to_string();
        return Vec::new();
    }
    let key = record.key.clone();
    let value = record.value.clone();
    app.editing = Some(EditSession {
        key: key.clone(),
        create: false,
        path: None,
    });
    app.mode = Mode::EditingKey;
    app.status = format!("Editing '{}'...", key);
    vec![Command::PrepareEdit {
        key,
        value,
        create: false,
    }]
}

fn open_prompt(app: &mut App, mode: Mode, initial: &str) -> Vec<Command> {
    app.input.open(initial);
    app.mode = mode;
    Vec::new()
}

fn handle_prompt_key(app: &mut App, key: KeyEvent) -> Vec<Command> {
    match key.code {
        KeyCode::Esc => cancel_prompt(app),
        KeyCode::Enter => submit_prompt(app),
        KeyCode::Backspace => {
            app.input.backspace();
            Vec::new()
        }
        KeyCode::Delete => {
            app.input.delete();
            Vec::new()
        }
        KeyCode::Left => {
            app.input.move_left();
            Vec::new()
        }
        KeyCode::Right => {
            app.input.move_right();
            Vec::new()
        }
        KeyCode::Home => {
            app.input.move_home();
            Vec::new()
        }
        KeyCode::End => {
            app.input.move_end();
            Vec::new()
        }
        KeyCode::Char(ch)
            if !key
                .modifiers
                .intersects(KeyModifiers::CONTROL | KeyModifiers::ALT) =>
        {
            app.input.insert(ch);
            Vec::new()
        }
        _ => Vec::new(),
    }
}

fn cancel_prompt(app: &mut App) -> Vec<Command> {
    let mode = app.mode;
    app.mode = Mode::Default;
    app.input.clear();
    match mode {
        Mode::Search if !app.search_pattern.is_empty() => {
            app.search_pattern.clear();
            app.rescan()
        }
        Mode::FuzzySearch if !app.filter_query.is_empty() => {
            app.filter_query.clear();
            app.rescan()
        }
        Mode::SetTtl => {
            app.pending_ttl_key = None;
            Vec::new()
        }
        _ => Vec::new(),
    }
}

fn submit_prompt(app: &mut App) -> Vec<Command> {
    let mode = app.mode;
    let value = app.input.value().to_string();
    app.input.clear();
    app.mode = Mode::Default;

    match mode {
        Mode::Search => {
            app.search_pattern = value;
            app.rescan()
        }
        Mode::FuzzySearch => {
            app.filter_query = value;
            app.rescan()
        }
        Mode::SwitchDb => match parse_db_index(&value) {
            Ok(db) => {
                app.status = format!("Switching to database {}...", db);
                vec![Command::SwitchDb { db }]
            }
            Err(message) => {
                app.status = message;
                Vec::new()
            }
        },
        Mode::SetTtl => {
            let Some(key) = app.pending_ttl_key.take() else {
                return Vec::new();
            };
            match parse_ttl(&value) {
                Ok(ttl) => vec![Command::SetTtl { key, ttl }],
                Err(message) => {
                    app.status = message;
                    Vec::new()
                }
            }
        }
        Mode::CreateKeyInput => match parse_key_name(&value) {
            Ok(key) => {
                app.editing = Some(EditSession {
                    key: key.clone(),
                    create: true,
                    path: None,
                });
                app.mode = Mode::EditingKey;
                app.status = format!("Creating '{}'...", key);
                vec![Command::PrepareEdit {
                    key,
                    value: String::new(),
                    create: true,
                }]
            }
            Err(message) => {
                app.status = message;
                Vec::new()
            }
        },
        _ => Vec::new(),
    }
}

fn handle_confirm_key(app: &mut App, key: KeyEvent) -> Vec<Command> {
    let confirmed = match key.code {
        KeyCode::Char('y') | KeyCode::Char('Y') => true,
        KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => false,
        _ => return Vec::new(),
    };
    let mode = app.mode;
    app.mode = Mode::Default;

    match (mode, confirmed) {
        (Mode::ConfirmDelete, true) => match app.pending_delete.take() {
            Some(key) => {
                app.status = format!("Deleting '{}'...", key);
                vec![Command::Delete { key }]
            }
            None => Vec::new(),
        },
        (Mode::ConfirmPurge, true) => {
            app.status = format!("Purging database {}...", app.db());
            vec![Command::Flush { db: app.db() }]
        }
        _ => {
            app.pending_delete = None;
            app.status = "Cancelled".to_string();
            Vec::new()
        }
    }
}
