use std::fmt;

/// Sentinel TTL for a record whose TTL has not been fetched yet.
pub const TTL_UNKNOWN: i64 = -1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValueType {
    #[default]
    Unknown,
    String,
    List,
    Set,
    SortedSet,
    Hash,
}

impl ValueType {
    /// Maps the store's `TYPE` reply. `None` means the type is not browsable.
    pub fn from_type_name(name: &str) -> Option<ValueType> {
        match name {
            "string" => Some(ValueType::String),
            "list" => Some(ValueType::List),
            "set" => Some(ValueType::Set),
            "zset" => Some(ValueType::SortedSet),
            "hash" => Some(ValueType::Hash),
            _ => None,
        }
    }

    pub fn is_resolved(self) -> bool {
        self != ValueType::Unknown
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueType::Unknown => "unknown",
            ValueType::String => "string",
            ValueType::List => "list",
            ValueType::Set => "set",
            ValueType::SortedSet => "zset",
            ValueType::Hash => "hash",
        };
        f.write_str(name)
    }
}

/// One key shown in the list pane.
///
/// Records come out of a scan unloaded; `value`, `value_type` and
/// `ttl_seconds` are only filled by [`KeyRecord::apply`].
#[derive(Debug, Clone, PartialEq)]
pub struct KeyRecord {
    pub key: String,
    pub value_type: ValueType,
    pub ttl_seconds: i64,
    pub value: String,
    pub loaded: bool,
    pub fetch_error: bool,
    /// String value that is not UTF-8; `value` holds a hex dump of it.
    pub binary: bool,
}

impl KeyRecord {
    pub fn unloaded(key: impl Into<String>) -> Self {
        KeyRecord {
            key: key.into(),
            value_type: ValueType::Unknown,
            ttl_seconds: TTL_UNKNOWN,
            value: String::new(),
            loaded: false,
            fetch_error: false,
            binary: false,
        }
    }

    pub fn apply(&mut self, loaded: &LoadedValue) {
        self.value_type = loaded.value_type;
        self.ttl_seconds = loaded.ttl_seconds;
        self.value = loaded.value.clone();
        self.fetch_error = loaded.fetch_error;
        self.binary = loaded.binary;
        self.loaded = true;
    }

    pub fn description(&self) -> String {
        if self.fetch_error {
            format!("get error: {}", self.value)
        } else if !self.loaded {
            format!("{} (not loaded)", self.value_type)
        } else if self.binary {
            format!("{}: binary", self.value_type)
        } else {
            format!("{}: {} bytes", self.value_type, self.value.len())
        }
    }
}

/// Outcome of a lazy load for a single key.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedValue {
    pub key: String,
    pub value_type: ValueType,
    pub ttl_seconds: i64,
    pub value: String,
    pub fetch_error: bool,
    pub binary: bool,
}
