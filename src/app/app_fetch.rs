use crate::app::record::{LoadedValue, ValueType, TTL_UNKNOWN};
use crate::app::redis_client::KeyStore;
use crate::app::value_format::{format_bytes_block, to_pretty_json};
use std::collections::BTreeMap;

/// Resolves type, TTL and value of one key.
///
/// Never fails as a whole: store errors end up in the returned value with
/// `fetch_error` set, and a failed TTL lookup reads as "no expiry".
pub async fn load_value(
    store: &dyn KeyStore,
    key: &str,
    known_type: ValueType,
    known_ttl: i64,
) -> LoadedValue {
    let value_type = if known_type.is_resolved() {
        known_type
    } else {
        match resolve_type(store, key).await {
            Ok(value_type) => value_type,
            Err(message) => return failed(key, ValueType::Unknown, 0, message),
        }
    };

    let ttl_seconds = if known_ttl == TTL_UNKNOWN {
        match store.ttl(key).await {
            Ok(ttl) if ttl > 0 => ttl,
            Ok(_) => 0,
            Err(e) => {
                log::debug!("TTL lookup for '{}' failed: {}", key, e);
                0
            }
        }
    } else {
        known_ttl.max(0)
    };

    match fetch_value(store, key, value_type).await {
        Ok((value, binary)) => LoadedValue {
            key: key.to_string(),
            value_type,
            ttl_seconds,
            value,
            fetch_error: false,
            binary,
        },
        Err(message) => failed(key, value_type, ttl_seconds, message),
    }
}

async fn resolve_type(store: &dyn KeyStore, key: &str) -> Result<ValueType, String> {
    let name = store.key_type(key).await.map_err(|e| e.to_string())?;
    match ValueType::from_type_name(&name) {
        Some(value_type) => Ok(value_type),
        None if name == "none" => Err("key no longer exists".to_string()),
        None => Err(format!("unsupported type: {}", name)),
    }
}

async fn fetch_value(
    store: &dyn KeyStore,
    key: &str,
    value_type: ValueType,
) -> Result<(String, bool), String> {
    let rendered = match value_type {
        ValueType::String => {
            let bytes = store
                .get_bytes(key)
                .await
                .map_err(|e| e.to_string())?
                .ok_or_else(|| "key no longer exists".to_string())?;
            // Text is kept byte for byte so an edit writes back what was read.
            return Ok(match String::from_utf8(bytes) {
                Ok(text) => (text, false),
                Err(e) => (format_bytes_block(e.as_bytes()), true),
            });
        }
        ValueType::List => {
            let items = store.list_range(key).await.map_err(|e| e.to_string())?;
            to_pretty_json(&items).map_err(|e| e.to_string())?
        }
        ValueType::Set => {
            // Members come back in hash order; sort for a stable view.
            let mut members = store.set_members(key).await.map_err(|e| e.to_string())?;
            members.sort();
            to_pretty_json(&members).map_err(|e| e.to_string())?
        }
        ValueType::SortedSet => {
            let members = store
                .sorted_set_range(key)
                .await
                .map_err(|e| e.to_string())?;
            to_pretty_json(&members).map_err(|e| e.to_string())?
        }
        ValueType::Hash => {
            let fields: BTreeMap<String, String> = store
                .hash_entries(key)
                .await
                .map_err(|e| e.to_string())?
                .into_iter()
                .collect();
            to_pretty_json(&fields).map_err(|e| e.to_string())?
        }
        ValueType::Unknown => return Err(format!("unsupported type: {}", value_type)),
    };
    Ok((rendered, false))
}

fn failed(key: &str, value_type: ValueType, ttl_seconds: i64, message: String) -> LoadedValue {
    LoadedValue {
        key: key.to_string(),
        value_type,
        ttl_seconds,
        value: message,
        fetch_error: true,
        binary: false,
    }
}
