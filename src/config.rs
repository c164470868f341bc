use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_SCAN_PAGE_SIZE: usize = 50;
pub const DEFAULT_COUNT_CAP: usize = 10_000;
pub const DEFAULT_STATS_SAMPLE_SIZE: usize = 10;
const DEFAULT_ADDR: &str = "127.0.0.1:6379";

/// How the store is deployed. Decided once when connecting.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Topology {
    Standalone,
    Sentinel,
    Cluster,
}

impl std::fmt::Display for Topology {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Topology::Standalone => "standalone",
            Topology::Sentinel => "sentinel",
            Topology::Cluster => "cluster",
        };
        f.write_str(name)
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct ConnectionProfile {
    pub name: String,
    #[serde(default)]
    pub addrs: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub master_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<Topology>,
}

impl ConnectionProfile {
    fn default_local() -> Self {
        ConnectionProfile {
            name: "Default Local".to_string(),
            addrs: vec![DEFAULT_ADDR.to_string()],
            db: None,
            username: None,
            password: None,
            master_name: None,
            mode: None,
        }
    }

    /// Applies command-line overrides and settles the topology.
    pub fn resolve(&self, overrides: &ConnectionOverrides) -> ConnectionSettings {
        let mut addrs = if overrides.addrs.is_empty() {
            self.addrs.clone()
        } else {
            overrides.addrs.clone()
        };
        if addrs.is_empty() {
            addrs.push(DEFAULT_ADDR.to_string());
        }
        let master_name = overrides
            .master_name
            .clone()
            .or_else(|| self.master_name.clone())
            .filter(|name| !name.is_empty());
        let topology = self
            .mode
            .unwrap_or_else(|| infer_topology(&addrs, master_name.as_deref()));

        ConnectionSettings {
            profile_name: self.name.clone(),
            addrs,
            db: overrides.db.or(self.db).unwrap_or(0),
            username: overrides.username.clone().or_else(|| self.username.clone()),
            password: overrides.password.clone().or_else(|| self.password.clone()),
            master_name,
            topology,
        }
    }
}

fn infer_topology(addrs: &[String], master_name: Option<&str>) -> Topology {
    if master_name.is_some() {
        Topology::Sentinel
    } else if addrs.len() > 1 {
        Topology::Cluster
    } else {
        Topology::Standalone
    }
}

/// Connection values given on the command line; they win over the profile.
#[derive(Debug, Clone, Default)]
pub struct ConnectionOverrides {
    pub addrs: Vec<String>,
    pub db: Option<u32>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub master_name: Option<String>,
}

/// Fully resolved connection target.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionSettings {
    pub profile_name: String,
    pub addrs: Vec<String>,
    pub db: u32,
    pub username: Option<String>,
    pub password: Option<String>,
    pub master_name: Option<String>,
    pub topology: Topology,
}

impl ConnectionSettings {
    pub fn with_db(&self, db: u32) -> Self {
        ConnectionSettings {
            db,
            ..self.clone()
        }
    }

    pub fn describe(&self) -> String {
        format!(
            "{} ({}, {}), DB {}",
            self.profile_name,
            self.addrs.join(","),
            self.topology,
            self.db
        )
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    pub scan_page_size: usize,
    pub count_cap: usize,
    pub stats_sample_size: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub editor: Option<String>,
    #[serde(rename = "connections")]
    pub profiles: Vec<ConnectionProfile>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            scan_page_size: DEFAULT_SCAN_PAGE_SIZE,
            count_cap: DEFAULT_COUNT_CAP,
            stats_sample_size: DEFAULT_STATS_SAMPLE_SIZE,
            editor: None,
            profiles: vec![ConnectionProfile::default_local()],
        }
    }
}

impl Config {
    pub fn default_path() -> Option<PathBuf> {
        directories::BaseDirs::new()
            .map(|base_dirs| base_dirs.config_dir().join("keyglass").join("keyglass.toml"))
    }

    /// Loads the config file, creating a default one at the standard location
    /// when none exists. An explicit path is never created.
    pub fn load(path_override: Option<&Path>) -> Self {
        match path_override {
            Some(path) => Self::load_from(path, false),
            None => match Self::default_path() {
                Some(path) => Self::load_from(&path, true),
                None => {
                    eprintln!("Could not determine config directory. Using default in-memory config.");
                    Self::default()
                }
            },
        }
    }

    pub fn load_from(config_file_path: &Path, create_if_missing: bool) -> Self {
        if config_file_path.exists() {
            match fs::read_to_string(config_file_path) {
                Ok(contents) => match toml::from_str::<Config>(&contents) {
                    Ok(config) => {
                        log::info!("Loaded config from '{}'", config_file_path.display());
                        return config.sanitized();
                    }
                    Err(e) => {
                        eprintln!(
                            "Failed to parse config file at '{}': {}. Using default in-memory config.",
                            config_file_path.display(),
                            e
                        );
                    }
                },
                Err(e) => {
                    eprintln!(
                        "Failed to read config file at '{}': {}. Using default in-memory config.",
                        config_file_path.display(),
                        e
                    );
                }
            }
            return Self::default();
        }

        if !create_if_missing {
            eprintln!(
                "Config file not found at '{}'. Using default in-memory config.",
                config_file_path.display()
            );
            return Self::default();
        }

        let default_cfg = Self::default();
        match toml::to_string_pretty(&default_cfg) {
            Ok(toml_string) => {
                let created = config_file_path
                    .parent()
                    .map_or(Ok(()), fs::create_dir_all)
                    .and_then(|_| fs::write(config_file_path, toml_string));
                match created {
                    Ok(()) => log::info!(
                        "Default config file created at '{}'",
                        config_file_path.display()
                    ),
                    Err(e) => eprintln!(
                        "Failed to write default config file to '{}': {}",
                        config_file_path.display(),
                        e
                    ),
                }
            }
            Err(e) => eprintln!("Failed to serialize default config: {}", e),
        }
        default_cfg
    }

    // Zero sizes would stall the scan loop or hide every count.
    fn sanitized(mut self) -> Self {
        if self.scan_page_size == 0 {
            self.scan_page_size = DEFAULT_SCAN_PAGE_SIZE;
        }
        if self.count_cap == 0 {
            self.count_cap = DEFAULT_COUNT_CAP;
        }
        if self.profiles.is_empty() {
            self.profiles.push(ConnectionProfile::default_local());
        }
        self
    }

    pub fn select_profile(&self, name: Option<&str>) -> Result<ConnectionProfile> {
        match name {
            Some(profile_name) => match self.profiles.iter().find(|p| p.name == profile_name) {
                Some(profile) => Ok(profile.clone()),
                None => bail!("Profile '{}' not found in configuration.", profile_name),
            },
            None => Ok(self
                .profiles
                .first()
                .cloned()
                .unwrap_or_else(ConnectionProfile::default_local)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_profiles_and_fills_defaults() {
        let raw = r#"
            count_cap = 500

            [[connections]]
            name = "cache"
            addrs = ["10.0.0.1:6379"]
            db = 3

            [[connections]]
            name = "shards"
            addrs = ["10.0.0.1:7000", "10.0.0.2:7000"]
        "#;
        let config: Config = toml::from_str(raw).expect("parse");

        assert_eq!(config.count_cap, 500);
        assert_eq!(config.scan_page_size, DEFAULT_SCAN_PAGE_SIZE);
        assert_eq!(config.profiles.len(), 2);

        let cache = config.select_profile(Some("cache")).unwrap();
        let settings = cache.resolve(&ConnectionOverrides::default());
        assert_eq!(settings.db, 3);
        assert_eq!(settings.topology, Topology::Standalone);

        let shards = config.select_profile(Some("shards")).unwrap();
        assert_eq!(
            shards.resolve(&ConnectionOverrides::default()).topology,
            Topology::Cluster
        );
    }

    #[test]
    fn master_name_implies_sentinel_unless_mode_is_explicit() {
        let mut profile = ConnectionProfile::default_local();
        profile.master_name = Some("mymaster".to_string());
        assert_eq!(
            profile.resolve(&ConnectionOverrides::default()).topology,
            Topology::Sentinel
        );

        profile.mode = Some(Topology::Standalone);
        assert_eq!(
            profile.resolve(&ConnectionOverrides::default()).topology,
            Topology::Standalone
        );
    }

    #[test]
    fn overrides_win_over_profile_values() {
        let profile = ConnectionProfile::default_local();
        let overrides = ConnectionOverrides {
            addrs: vec!["192.168.1.5:6380".to_string()],
            db: Some(7),
            password: Some("secret".to_string()),
            ..Default::default()
        };
        let settings = profile.resolve(&overrides);

        assert_eq!(settings.addrs, vec!["192.168.1.5:6380".to_string()]);
        assert_eq!(settings.db, 7);
        assert_eq!(settings.password.as_deref(), Some("secret"));
        assert_eq!(settings.with_db(2).db, 2);
    }

    #[test]
    fn unknown_profile_is_an_error() {
        let config = Config::default();
        assert!(config.select_profile(Some("nope")).is_err());
        assert_eq!(config.select_profile(None).unwrap().name, "Default Local");
    }

    #[test]
    fn load_from_creates_default_file_when_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("keyglass.toml");

        let config = Config::load_from(&path, true);
        assert_eq!(config, Config::default());
        assert!(path.exists());

        let reloaded = Config::load_from(&path, false);
        assert_eq!(reloaded, Config::default());
    }

    #[test]
    fn load_from_falls_back_on_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keyglass.toml");
        fs::write(&path, "scan_page_size = \"lots\"").unwrap();

        assert_eq!(Config::load_from(&path, false), Config::default());
    }

    #[test]
    fn zero_sizes_are_replaced_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keyglass.toml");
        fs::write(&path, "scan_page_size = 0\ncount_cap = 0\nconnections = []\n").unwrap();

        let config = Config::load_from(&path, false);
        assert_eq!(config.scan_page_size, DEFAULT_SCAN_PAGE_SIZE);
        assert_eq!(config.count_cap, DEFAULT_COUNT_CAP);
        assert_eq!(config.profiles.len(), 1);
    }
}
