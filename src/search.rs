use fuzzy_matcher::skim::SkimMatcherV2;
use fuzzy_matcher::FuzzyMatcher;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterMode {
    Off,
    Strict,
    Fuzzy,
}

/// Client-side filter applied to every completed scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterSpec {
    pub query: String,
    pub mode: FilterMode,
}

impl FilterSpec {
    /// An empty query always means `Off`, whatever mode the user picked.
    pub fn new(query: &str, fuzzy: bool) -> Self {
        let mode = if query.is_empty() {
            FilterMode::Off
        } else if fuzzy {
            FilterMode::Fuzzy
        } else {
            FilterMode::Strict
        };
        FilterSpec {
            query: query.to_string(),
            mode,
        }
    }

    pub fn off() -> Self {
        FilterSpec {
            query: String::new(),
            mode: FilterMode::Off,
        }
    }
}

pub fn filter_keys(keys: Vec<String>, spec: &FilterSpec) -> Vec<String> {
    match spec.mode {
        FilterMode::Off => keys,
        FilterMode::Strict => strict_filter(keys, &spec.query),
        FilterMode::Fuzzy => fuzzy_filter(keys, &spec.query),
    }
}

fn strict_filter(keys: Vec<String>, query: &str) -> Vec<String> {
    let needle = query.to_lowercase();
    keys.into_iter()
        .filter(|key| key.to_lowercase().contains(&needle))
        .collect()
}

// Best score first; equal scores keep scan order so the result is deterministic.
fn fuzzy_filter(keys: Vec<String>, query: &str) -> Vec<String> {
    let matcher = SkimMatcherV2::default().ignore_case();
    let mut scored: Vec<(i64, usize, String)> = keys
        .into_iter()
        .enumerate()
        .filter_map(|(idx, key)| {
            matcher
                .fuzzy_match(&key, query)
                .map(|score| (score, idx, key))
        })
        .collect();
    scored.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));
    scored.into_iter().map(|(_, _, key)| key).collect()
}
