//! Settings loading and resolution.
//!
//! Layers, lowest first: built-in defaults, an optional JSON file, then
//! `ARTICLE_HARVEST_*` environment variables. CLI flags are applied on top by
//! the caller. Everything is read once at startup.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use article_harvest::HarvestConfig;

/// Environment variable naming a JSON settings file.
pub const CONFIG_ENV: &str = "ARTICLE_HARVEST_CONFIG";

const ENV_PREFIX: &str = "ARTICLE_HARVEST_";

#[derive(thiserror::Error, Debug)]
pub enum SettingsError {
    #[error("cannot read settings file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid settings file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("invalid value {value:?} for {key}")]
    InvalidValue { key: String, value: String },
}

/// Where the browser runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// A developer machine, container or WSL: sandbox and /dev/shm disabled.
    #[default]
    Local,
    /// A managed host that provides the Chromium sandbox.
    Hosted,
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "local" => Ok(Environment::Local),
            "hosted" => Ok(Environment::Hosted),
            other => Err(format!("unknown environment {other:?} (expected local or hosted)")),
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Environment::Local => write!(f, "local"),
            Environment::Hosted => write!(f, "hosted"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub environment: Environment,
    /// Element wait budget, in milliseconds.
    pub wait_timeout_ms: u64,
    /// Pause after each successful wait or interaction, in milliseconds.
    pub settle_delay_ms: u64,
    /// Root under which every run gets its own directory.
    pub output_root: PathBuf,
    /// Asset folder name inside a run directory.
    pub asset_folder: String,
    /// Snapshot folder name inside a run directory.
    pub snapshot_folder: String,
    pub log_level: String,
    pub log_file: PathBuf,
    /// Explicit Chromium binary; discovered when unset.
    pub chromium_path: Option<PathBuf>,
    /// Cap on items examined per harvest; the library default when unset.
    pub max_items: Option<usize>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            environment: Environment::Local,
            wait_timeout_ms: 20_000,
            settle_delay_ms: 200,
            output_root: PathBuf::from("output"),
            asset_folder: "images".to_string(),
            snapshot_folder: "screenshots".to_string(),
            log_level: "info".to_string(),
            log_file: PathBuf::from("output/logs/article-harvest.log"),
            chromium_path: None,
            max_items: None,
        }
    }
}

/// Resolve the settings file path: explicit argument, then [`CONFIG_ENV`].
pub fn resolve_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    std::env::var_os(CONFIG_ENV).map(PathBuf::from)
}

impl Settings {
    /// Defaults, then the settings file (if any), then the process environment.
    pub fn load(explicit: Option<&Path>) -> Result<Self, SettingsError> {
        let mut settings = match resolve_config_path(explicit) {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };
        settings.apply_env(|key| std::env::var(key).ok())?;
        Ok(settings)
    }

    /// Read a JSON settings file. Missing keys keep their defaults.
    pub fn from_file(path: &Path) -> Result<Self, SettingsError> {
        let raw = std::fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Apply `ARTICLE_HARVEST_*` overrides looked up through `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), SettingsError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            let key = format!("{ENV_PREFIX}{name}");
            lookup(&key).map(|value| (key, value))
        };

        if let Some((key, value)) = get("ENVIRONMENT") {
            self.environment = parse_value(key, value)?;
        }
        if let Some((key, value)) = get("WAIT_TIMEOUT_MS") {
            self.wait_timeout_ms = parse_value(key, value)?;
        }
        if let Some((key, value)) = get("SETTLE_DELAY_MS") {
            self.settle_delay_ms = parse_value(key, value)?;
        }
        if let Some((_, value)) = get("OUTPUT_ROOT") {
            self.output_root = PathBuf::from(value);
        }
        if let Some((_, value)) = get("ASSET_FOLDER") {
            self.asset_folder = value;
        }
        if let Some((_, value)) = get("SNAPSHOT_FOLDER") {
            self.snapshot_folder = value;
        }
        if let Some((_, value)) = get("LOG_LEVEL") {
            self.log_level = value;
        }
        if let Some((_, value)) = get("LOG_FILE") {
            self.log_file = PathBuf::from(value);
        }
        if let Some((_, value)) = get("CHROMIUM_PATH") {
            self.chromium_path = Some(PathBuf::from(value));
        }
        if let Some((key, value)) = get("MAX_ITEMS") {
            self.max_items = Some(parse_value(key, value)?);
        }
        Ok(())
    }

    /// Build the engine configuration for one run directory.
    pub fn harvest_config(&self, run_dir: &Path) -> HarvestConfig {
        let defaults = HarvestConfig::default();
        HarvestConfig {
            wait_timeout: Duration::from_millis(self.wait_timeout_ms),
            settle_delay: Duration::from_millis(self.settle_delay_ms),
            max_items: self.max_items.unwrap_or(defaults.max_items),
            asset_dir: run_dir.join(&self.asset_folder),
            snapshot_dir: run_dir.join(&self.snapshot_folder),
            ..defaults
        }
    }
}

fn parse_value<T: FromStr>(key: String, value: String) -> Result<T, SettingsError> {
    value
        .trim()
        .parse()
        .map_err(|_| SettingsError::InvalidValue { key, value })
}
