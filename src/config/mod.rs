// world-restore/src/config/mod.rs
use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::fs;
use std::path::{Component, Path, PathBuf};

pub const PLUGIN_NAME: &str = "EasyBackuper";
pub const DEFAULT_MAX_WORKERS: usize = 4;
pub const DEFAULT_RESTART_WAIT_SECS: u64 = 10;
const DEFAULT_BACKUP_FOLDER: &str = "./backup";

#[cfg(windows)]
const DEFAULT_EXE_7Z_PATH: &str = "./plugins/EasyBackuper/7za.exe";
#[cfg(not(windows))]
const DEFAULT_EXE_7Z_PATH: &str = "7z";

#[cfg(windows)]
const DEFAULT_START_SCRIPT: &str = "./start.bat";
#[cfg(not(windows))]
const DEFAULT_START_SCRIPT: &str = "./start.sh";

/// One configuration value as found in the file. A value of the wrong type
/// is kept as `Invalid` so it only costs its own default, not the document.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum JsonField<T> {
    #[default]
    Missing,
    Valid(T),
    Invalid(String),
}

impl<'de, T: DeserializeOwned> Deserialize<'de> for JsonField<T> {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        if value.is_null() {
            return Ok(JsonField::Missing);
        }
        Ok(match serde_json::from_value::<T>(value.clone()) {
            Ok(parsed) => JsonField::Valid(parsed),
            Err(e) => JsonField::Invalid(format!("{} ({})", value, e)),
        })
    }
}

impl<T> JsonField<T> {
    /// The parsed value, recording a warning under `key` when it was unusable.
    fn take(self, key: &str, warnings: &mut Vec<String>) -> Option<T> {
        match self {
            JsonField::Missing => None,
            JsonField::Valid(value) => Some(value),
            JsonField::Invalid(reason) => {
                warnings.push(format!("Ignoring invalid {}: {}, using default", key, reason));
                None
            }
        }
    }
}

// Structs for deserializing EasyBackuper.json
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawJsonConfig {
    pub use_7z: JsonField<bool>,
    pub exe_7z_path: JsonField<String>,
    #[serde(rename = "Max_Workers")]
    pub max_workers: JsonField<i64>,
    #[serde(rename = "BackupFolderPath")]
    pub backup_folder_path: JsonField<String>,
    #[serde(rename = "Restore")]
    pub restore: JsonField<JsonRestoreSection>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct JsonRestoreSection {
    pub config: JsonField<JsonRestoreOptions>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct JsonRestoreOptions {
    pub debug: JsonField<bool>,
    pub backup_old_world_before_restore: JsonField<bool>,
    pub restart_server: JsonField<JsonRestartOptions>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct JsonRestartOptions {
    pub status: JsonField<bool>,
    pub wait_time_s: JsonField<u64>,
    pub start_script_path: JsonField<String>,
}

// Application's internal configuration structs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestartConfig {
    pub enabled: bool,
    pub wait_seconds: u64,
    pub start_script_path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub use_7z: bool,
    pub exe_7z_path: PathBuf,
    pub max_workers: usize,
    pub backup_folder: PathBuf,
    pub backup_old_world_before_restore: bool,
    pub restart: RestartConfig,
    pub debug: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            use_7z: false,
            exe_7z_path: PathBuf::from(DEFAULT_EXE_7Z_PATH),
            max_workers: DEFAULT_MAX_WORKERS,
            backup_folder: PathBuf::from(DEFAULT_BACKUP_FOLDER),
            backup_old_world_before_restore: false,
            restart: RestartConfig {
                enabled: false,
                wait_seconds: DEFAULT_RESTART_WAIT_SECS,
                start_script_path: PathBuf::from(DEFAULT_START_SCRIPT),
            },
            debug: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    File(PathBuf),
    Defaults { reason: String },
}

/// Result of configuration discovery. Loading never fails; problems are
/// recorded in `source` and `warnings` so they can be logged once the
/// subscriber is installed.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: Config,
    pub source: ConfigSource,
    pub warnings: Vec<String>,
}

impl Config {
    fn from_raw(raw: RawJsonConfig, warnings: &mut Vec<String>) -> Self {
        let defaults = Config::default();
        let options = raw
            .restore
            .take("Restore", warnings)
            .and_then(|section| section.config.take("Restore.config", warnings))
            .unwrap_or_default();
        let restart = options
            .restart_server
            .take("Restore.config.restart_server", warnings)
            .unwrap_or_default();
        let non_empty = |s: String| (!s.trim().is_empty()).then(|| PathBuf::from(s));

        let max_workers = match raw.max_workers.take("Max_Workers", warnings) {
            Some(n) if n >= 1 => n as usize,
            Some(n) => {
                warnings.push(format!("Max_Workers={} is invalid, using 1", n));
                1
            }
            None => defaults.max_workers,
        };

        Config {
            use_7z: raw
                .use_7z
                .take("use_7z", warnings)
                .unwrap_or(defaults.use_7z),
            exe_7z_path: raw
                .exe_7z_path
                .take("exe_7z_path", warnings)
                .and_then(non_empty)
                .unwrap_or(defaults.exe_7z_path),
            max_workers,
            backup_folder: raw
                .backup_folder_path
                .take("BackupFolderPath", warnings)
                .and_then(non_empty)
                .unwrap_or(defaults.backup_folder),
            backup_old_world_before_restore: options
                .backup_old_world_before_restore
                .take("Restore.config.backup_old_world_before_restore", warnings)
                .unwrap_or(defaults.backup_old_world_before_restore),
            restart: RestartConfig {
                enabled: restart
                    .status
                    .take("Restore.config.restart_server.status", warnings)
                    .unwrap_or(defaults.restart.enabled),
                wait_seconds: restart
                    .wait_time_s
                    .take("Restore.config.restart_server.wait_time_s", warnings)
                    .unwrap_or(defaults.restart.wait_seconds),
                start_script_path: restart
                    .start_script_path
                    .take("Restore.config.restart_server.start_script_path", warnings)
                    .and_then(non_empty)
                    .unwrap_or(defaults.restart.start_script_path),
            },
            debug: options
                .debug
                .take("Restore.config.debug", warnings)
                .unwrap_or(defaults.debug),
        }
    }
}

/// Config file locations in lookup order. An explicit path comes first.
pub fn candidate_paths(server_dir: &Path, explicit: Option<&Path>) -> Vec<PathBuf> {
    let relative = Path::new("plugins")
        .join(PLUGIN_NAME)
        .join("config")
        .join(format!("{}.json", PLUGIN_NAME));

    let mut paths = Vec::new();
    if let Some(path) = explicit {
        paths.push(path.to_path_buf());
    }
    paths.push(server_dir.join(&relative));
    if let Ok(cwd) = std::env::current_dir() {
        paths.push(cwd.join(&relative));
    }
    paths
}

pub fn load_from_json(config_path: &Path) -> Result<RawJsonConfig> {
    let config_content = fs::read_to_string(config_path)
        .with_context(|| format!("Failed to read config file at {}", config_path.display()))?;
    serde_json::from_str(&config_content).with_context(|| {
        format!(
            "Failed to parse JSON from config file at {}",
            config_path.display()
        )
    })
}

/// Finds and parses the plugin configuration, substituting defaults when
/// no file exists or the first file found cannot be used.
pub fn load(server_dir: &Path, explicit: Option<&Path>) -> LoadedConfig {
    let mut warnings = Vec::new();
    let Some(path) = candidate_paths(server_dir, explicit)
        .into_iter()
        .find(|p| p.is_file())
    else {
        return LoadedConfig {
            config: Config::default(),
            source: ConfigSource::Defaults {
                reason: "no configuration file found in any search path".to_string(),
            },
            warnings,
        };
    };

    match load_from_json(&path) {
        Ok(raw) => LoadedConfig {
            config: Config::from_raw(raw, &mut warnings),
            source: ConfigSource::File(path),
            warnings,
        },
        Err(e) => LoadedConfig {
            config: Config::default(),
            source: ConfigSource::Defaults {
                reason: format!("{:#}", e),
            },
            warnings,
        },
    }
}

/// Resolves a configured path against the server directory.
pub fn resolve_path(server_dir: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    let trimmed: PathBuf = path
        .components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect();
    server_dir.join(trimmed)
}
