use crate::app::redis_client::{Connector, KeyStore, StoreResult};
use crate::app::value_format::format_ttl;
use crate::config::{ConnectionSettings, Topology};
use std::collections::HashMap;
use std::sync::Arc;

/// Logical databases queried for the statistics view on a single server.
pub const STANDALONE_DATABASES: u32 = 16;

#[derive(Debug, Clone, PartialEq)]
pub struct ServerStats {
    pub version: String,
    pub uptime_in_seconds: u64,
    pub uptime_human: String,
    pub memory_used_human: String,
    pub memory_peak_human: String,
    pub fragmentation_ratio: f64,
    pub connected_clients: u32,
    pub total_commands_processed: u64,
    pub instantaneous_ops_per_sec: u32,
    pub evicted_keys: u64,
    pub expired_keys: u64,
}

impl Default for ServerStats {
    fn default() -> Self {
        Self {
            version: "Unknown".to_string(),
            uptime_in_seconds: 0,
            uptime_human: "0s".to_string(),
            memory_used_human: "0 B".to_string(),
            memory_peak_human: "0 B".to_string(),
            fragmentation_ratio: 0.0,
            connected_clients: 0,
            total_commands_processed: 0,
            instantaneous_ops_per_sec: 0,
            evicted_keys: 0,
            expired_keys: 0,
        }
    }
}

impl ServerStats {
    pub fn from_info_string(info: &str) -> Self {
        let mut stats = ServerStats::default();
        let mut parsed_data: HashMap<&str, &str> = HashMap::new();

        for line in info.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if let Some((key, value)) = line.split_once(':') {
                parsed_data.insert(key, value);
            }
        }

        if let Some(version) = parsed_data.get("redis_version") {
            stats.version = version.to_string();
        }
        if let Some(uptime) = parsed_data.get("uptime_in_seconds") {
            stats.uptime_in_seconds = uptime.parse().unwrap_or(0);
            stats.uptime_human = format_duration(stats.uptime_in_seconds);
        }

        // The server's own `_human` rendering wins over ours.
        stats.memory_used_human = human_memory(&parsed_data, "used_memory");
        stats.memory_peak_human = human_memory(&parsed_data, "used_memory_peak");
        if let Some(ratio) = parsed_data.get("mem_fragmentation_ratio") {
            stats.fragmentation_ratio = ratio.parse().unwrap_or(0.0);
        }

        if let Some(clients) = parsed_data.get("connected_clients") {
            stats.connected_clients = clients.parse().unwrap_or(0);
        }
        if let Some(total_commands) = parsed_data.get("total_commands_processed") {
            stats.total_commands_processed = total_commands.parse().unwrap_or(0);
        }
        if let Some(ops_per_sec) = parsed_data.get("instantaneous_ops_per_sec") {
            stats.instantaneous_ops_per_sec = ops_per_sec.parse().unwrap_or(0);
        }
        if let Some(evicted) = parsed_data.get("evicted_keys") {
            stats.evicted_keys = evicted.parse().unwrap_or(0);
        }
        if let Some(expired) = parsed_data.get("expired_keys") {
            stats.expired_keys = expired.parse().unwrap_or(0);
        }

        stats
    }
}

fn human_memory(parsed_data: &HashMap<&str, &str>, field: &str) -> String {
    let human_key = format!("{}_human", field);
    match parsed_data.get(human_key.as_str()) {
        Some(human) if !human.is_empty() => human.to_string(),
        _ => format_bytes(
            parsed_data
                .get(field)
                .and_then(|raw| raw.parse().ok())
                .unwrap_or(0),
        ),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DatabaseStats {
    pub db: u32,
    pub keys: u64,
    pub avg_ttl: String,
    pub sample_size: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StatsReport {
    pub server: ServerStats,
    pub databases: Vec<DatabaseStats>,
}

/// Server statistics plus key counts for every reachable, non-empty database.
pub async fn collect_stats(
    store: Arc<dyn KeyStore>,
    connector: Arc<dyn Connector>,
    settings: &ConnectionSettings,
    sample_size: usize,
) -> StoreResult<StatsReport> {
    let info = store.server_info().await?;
    let server = ServerStats::from_info_string(&info);

    let db_count = match store.topology() {
        Topology::Cluster => 1,
        _ => STANDALONE_DATABASES,
    };
    let mut databases = Vec::new();
    for db in 0..db_count {
        let db_store = if db == store.db() {
            store.clone()
        } else {
            match connector.connect(&settings.with_db(db)).await {
                Ok(db_store) => db_store,
                Err(e) => {
                    log::debug!("Skipping DB {} in stats: {}", db, e);
                    continue;
                }
            }
        };
        match database_stats(&*db_store, sample_size).await {
            Ok(stats) if stats.keys > 0 => databases.push(stats),
            Ok(_) => {}
            Err(e) => log::debug!("Skipping DB {} in stats: {}", db, e),
        }
    }

    Ok(StatsReport { server, databases })
}

pub async fn database_stats(store: &dyn KeyStore, sample_size: usize) -> StoreResult<DatabaseStats> {
    let mut keys = 0;
    for node in store.nodes() {
        keys += node.db_size().await?;
    }
    let avg_ttl = if keys > 0 && sample_size > 0 {
        average_ttl(store, sample_size).await
    } else {
        "N/A".to_string()
    };
    Ok(DatabaseStats {
        db: store.db(),
        keys,
        avg_ttl,
        sample_size,
    })
}

// Samples `sample_size` random keys per partition; persistent keys and
// failed lookups are left out of the average.
async fn average_ttl(store: &dyn KeyStore, sample_size: usize) -> String {
    let mut total: i64 = 0;
    let mut with_ttl: i64 = 0;
    for node in store.nodes() {
        for _ in 0..sample_size {
            let key = match node.random_key().await {
                Ok(Some(key)) => key,
                _ => continue,
            };
            match node.ttl(&key).await {
                Ok(ttl) if ttl > 0 => {
                    total += ttl;
                    with_ttl += 1;
                }
                _ => {}
            }
        }
    }
    if with_ttl == 0 {
        "No TTL".to_string()
    } else {
        format_ttl(total / with_ttl)
    }
}

fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    if unit_index == 0 {
        format!("{} {}", bytes, UNITS[unit_index])
    } else {
        format!("{:.1} {}", size, UNITS[unit_index])
    }
}

fn format_duration(seconds: u64) -> String {
    let days = seconds / 86400;
    let hours = (seconds % 86400) / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;

    if days > 0 {
        format!("{}d {}h {}m", days, hours, minutes)
    } else if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, secs)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, secs)
    } else {
        format!("{}s", secs)
    }
}
