use crate::app::app_fetch::load_value;
use crate::app::message::{Command, Message, MutationKind};
use crate::app::redis_client::{flush_database, Connector, KeyStore};
use crate::app::redis_stats::collect_stats;
use crate::app::scan::{count_keys, run_scan};
use crate::app::{editor, AppOptions};
use crate::config::ConnectionSettings;
use std::sync::Arc;

/// What a command needs to run away from the event loop.
#[derive(Clone)]
pub struct TaskContext {
    pub store: Arc<dyn KeyStore>,
    pub connector: Arc<dyn Connector>,
    pub settings: ConnectionSettings,
    pub options: AppOptions,
}

/// Runs one command to completion and returns the message reporting it.
pub async fn perform(command: Command, ctx: TaskContext) -> Option<Message> {
    match command {
        Command::Scan {
            generation,
            request,
            filter,
        } => {
            let outcome = run_scan(ctx.store, request, &filter)
                .await
                .map_err(|e| e.to_string());
            Some(Message::ScanFinished { generation, outcome })
        }
        Command::Count {
            generation,
            pattern,
        } => {
            let outcome = count_keys(
                ctx.store,
                &pattern,
                ctx.options.scan_page_size,
                ctx.options.count_cap,
            )
            .await
            .map_err(|e| e.to_string());
            Some(Message::CountFinished { generation, outcome })
        }
        Command::NextBatch => Some(Message::NextBatch),
        Command::LoadValue {
            generation,
            key,
            known_type,
            known_ttl,
        } => {
            let value = load_value(&*ctx.store, &key, known_type, known_ttl).await;
            Some(Message::ValueLoaded { generation, value })
        }
        Command::Delete { key } => {
            let outcome = ctx
                .store
                .delete(&key)
                .await
                .map(|existed| {
                    if !existed {
                        log::info!("Key '{}' was already gone", key);
                    }
                })
                .map_err(|e| e.to_string());
            Some(Message::Mutation {
                kind: MutationKind::Deleted { key },
                outcome,
            })
        }
        Command::SetTtl { key, ttl } => {
            let result = if ttl <= 0 {
                ctx.store.persist(&key).await
            } else {
                ctx.store.expire(&key, ttl).await
            };
            Some(Message::Mutation {
                kind: MutationKind::TtlSet { key, ttl },
                outcome: result.map_err(|e| e.to_string()),
            })
        }
        Command::Flush { db } => {
            let outcome = flush_database(&*ctx.store)
                .await
                .map_err(|e| e.to_string());
            Some(Message::Mutation {
                kind: MutationKind::Purged { db },
                outcome,
            })
        }
        Command::SwitchDb { db } => {
            let outcome = ctx
                .connector
                .connect(&ctx.settings.with_db(db))
                .await
                .map_err(|e| e.to_string());
            Some(Message::DbSwitched { db, outcome })
        }
        Command::LoadStats => {
            let outcome = collect_stats(
                ctx.store,
                ctx.connector,
                &ctx.settings,
                ctx.options.stats_sample_size,
            )
            .await
            .map_err(|e| e.to_string());
            Some(Message::StatsLoaded(outcome))
        }
        Command::PrepareEdit { key, value, create } => {
            let outcome = editor::prepare_file(&key, &value, create).map_err(|e| e.to_string());
            Some(Message::EditPrepared { key, outcome })
        }
        Command::OpenEditor { path } => {
            let command_line = editor::resolve_editor(ctx.options.editor.as_deref());
            let outcome = editor::run_editor(&command_line, &path)
                .await
                .map_err(|e| e.to_string());
            Some(Message::EditorFinished { path, outcome })
        }
        Command::ApplyEdit { key, path, create } => {
            let outcome = editor::apply_edit(&*ctx.store, &key, &path)
                .await
                .map_err(|e| e.to_string());
            let kind = if create {
                MutationKind::Created { key }
            } else {
                MutationKind::Edited { key }
            };
            Some(Message::Mutation { kind, outcome })
        }
        Command::DiscardEdit { path } => {
            editor::discard(&path);
            None
        }
    }
}
