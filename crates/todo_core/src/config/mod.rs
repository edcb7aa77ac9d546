use crate::error::AppError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const APP_DIR_NAME: &str = "todoapp";
const CONFIG_FILE_NAME: &str = "config.json";
const CONFIG_ENV_VAR: &str = "TODOAPP_CONFIG_PATH";

pub const DEFAULT_BIND: &str = "127.0.0.1:5000";

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub data_file: Option<PathBuf>,
    #[serde(default)]
    pub lock_timeout_ms: Option<u64>,
    #[serde(default)]
    pub bind: Option<String>,
}

impl Config {
    pub fn bind_or_default(&self) -> &str {
        self.bind.as_deref().unwrap_or(DEFAULT_BIND)
    }
}

/// A config plus the problem that forced defaults, if any.
#[derive(Debug, Clone)]
pub struct ConfigLoad {
    pub config: Config,
    pub error: Option<AppError>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ConfigOverrides {
    pub data_file: Option<PathBuf>,
    pub lock_timeout_ms: Option<u64>,
    pub bind: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigKey {
    DataFile,
    LockTimeoutMs,
    Bind,
}

impl ConfigOverrides {
    /// Applies one `KEY=VALUE` string, e.g. `data-file=/tmp/todos.json`.
    pub fn apply(&mut self, raw: &str) -> Result<ConfigKey, AppError> {
        let (key_raw, value_raw) = raw
            .trim()
            .split_once('=')
            .ok_or_else(|| AppError::invalid_input("override must be in KEY=VALUE format"))?;
        let value = value_raw.trim();
        let key = canonical_key(key_raw)
            .ok_or_else(|| AppError::invalid_input("override key cannot be empty"))?;

        match key.as_str() {
            "data_file" => {
                if value.is_empty() {
                    return Err(AppError::invalid_input("data_file cannot be empty"));
                }
                self.data_file = Some(PathBuf::from(value));
                Ok(ConfigKey::DataFile)
            }
            "lock_timeout_ms" => {
                let millis = value.parse::<u64>().map_err(|_| {
                    AppError::invalid_input(format!("lock_timeout_ms must be an integer, got '{value}'"))
                })?;
                self.lock_timeout_ms = Some(millis);
                Ok(ConfigKey::LockTimeoutMs)
            }
            "bind" => {
                if value.is_empty() {
                    return Err(AppError::invalid_input("bind cannot be empty"));
                }
                self.bind = Some(value.to_string());
                Ok(ConfigKey::Bind)
            }
            other => Err(AppError::invalid_input(format!(
                "unknown config field '{other}'"
            ))),
        }
    }

    pub fn from_args<I, S>(args: I) -> Result<Self, AppError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut overrides = Self::default();
        for arg in args {
            overrides.apply(arg.as_ref())?;
        }
        Ok(overrides)
    }
}

fn canonical_key(raw: &str) -> Option<String> {
    let mut cleaned = String::new();
    let mut previous_underscore = false;

    for ch in raw.chars() {
        if ch.is_ascii_alphanumeric() {
            cleaned.push(ch.to_ascii_lowercase());
            previous_underscore = false;
        } else if !previous_underscore && !cleaned.is_empty() {
            cleaned.push('_');
            previous_underscore = true;
        }
    }

    let trimmed = cleaned.trim_matches('_');
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// `%APPDATA%\todoapp` on Windows, `~/.config/todoapp` elsewhere.
pub fn app_dir() -> Result<PathBuf, AppError> {
    if cfg!(windows) {
        let appdata =
            std::env::var("APPDATA").map_err(|_| AppError::invalid_data("APPDATA is not set"))?;
        Ok(PathBuf::from(appdata).join(APP_DIR_NAME))
    } else {
        let home = std::env::var("HOME").map_err(|_| AppError::invalid_data("HOME is not set"))?;
        Ok(PathBuf::from(home).join(".config").join(APP_DIR_NAME))
    }
}

pub fn config_path() -> Result<PathBuf, AppError> {
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR)
        && !path.trim().is_empty()
    {
        return Ok(PathBuf::from(path));
    }

    Ok(app_dir()?.join(CONFIG_FILE_NAME))
}

pub fn load_config_with_fallback() -> ConfigLoad {
    match config_path() {
        Ok(path) => load_config_with_fallback_from_path(&path),
        Err(err) => ConfigLoad {
            config: Config::default(),
            error: Some(err),
        },
    }
}

fn load_config_with_fallback_from_path(path: &Path) -> ConfigLoad {
    if !path.exists() {
        return ConfigLoad {
            config: Config::default(),
            error: None,
        };
    }

    match load_config_from_path(path) {
        Ok(config) => ConfigLoad {
            config,
            error: None,
        },
        Err(err) => ConfigLoad {
            config: Config::default(),
            error: Some(err),
        },
    }
}

fn load_config_from_path(path: &Path) -> Result<Config, AppError> {
    let content = std::fs::read_to_string(path)
        .map_err(|err| AppError::io(format!("{}: {}", path.display(), err)))?;
    serde_json::from_str(&content).map_err(|err| {
        AppError::invalid_data(format!("invalid JSON in {}: {}", path.display(), err))
    })
}

pub fn merge_overrides(base: &Config, overrides: &ConfigOverrides) -> Config {
    let mut merged = base.clone();
    if let Some(data_file) = overrides.data_file.as_ref() {
        merged.data_file = Some(data_file.clone());
    }
    if let Some(millis) = overrides.lock_timeout_ms {
        merged.lock_timeout_ms = Some(millis);
    }
    if let Some(bind) = overrides.bind.as_ref() {
        merged.bind = Some(bind.clone());
    }
    merged
}
