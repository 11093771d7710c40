//! # Configuration
//!
//! Settings are read from `config.yaml` in the configuration directory and
//! merged over the embedded defaults. Any key can then be overridden by an
//! environment variable: `PMOXIAMI_CONFIG__API__TIMEOUT_SECS=10` sets
//! `api.timeout_secs`. Keys are case-insensitive.
//!
//! ```no_run
//! use pmoxiami::{XiamiClient, XiamiConfig};
//!
//! let config = XiamiConfig::load("")?;
//! let client = XiamiClient::from_config(&config);
//! # Ok::<(), anyhow::Error>(())
//! ```
//!
//! Loading never writes to disk: a missing directory or file just means the
//! defaults are used.

use crate::api::transport::{DEFAULT_REFERER, DEFAULT_USER_AGENT};
use crate::api::{API_BASE_URL, DEFAULT_APP_ID, DEFAULT_APP_KEY, DEFAULT_PLATFORM_ID, DEFAULT_TIMEOUT};
use anyhow::{Context, Result, anyhow};
use dirs::home_dir;
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};
use std::path::{Path, PathBuf};
use std::time::Duration;
use std::{env, fs};
use tracing::{debug, info};

// Configuration par défaut intégrée
const DEFAULT_CONFIG: &str = include_str!("pmoxiami.yaml");

const ENV_CONFIG_DIR: &str = "PMOXIAMI_CONFIG";
const ENV_PREFIX: &str = "PMOXIAMI_CONFIG__";
const CONFIG_DIR_NAME: &str = ".pmomusic";
const CONFIG_FILE_NAME: &str = "config.yaml";

/// Connection settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub app_key: String,
    pub app_id: u32,
    pub platform_id: String,
    pub timeout_secs: u64,
    pub user_agent: String,
    pub referer: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: API_BASE_URL.to_string(),
            app_key: DEFAULT_APP_KEY.to_string(),
            app_id: DEFAULT_APP_ID,
            platform_id: DEFAULT_PLATFORM_ID.to_string(),
            timeout_secs: DEFAULT_TIMEOUT.as_secs(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            referer: DEFAULT_REFERER.to_string(),
        }
    }
}

/// Saved credentials
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccountConfig {
    /// Access token restored from a previous login
    pub access_token: Option<String>,
}

/// Xiami client configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct XiamiConfig {
    pub api: ApiConfig,
    pub account: AccountConfig,
}

impl XiamiConfig {
    /// Per-call timeout
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.api.timeout_secs)
    }

    /// Loads the configuration from a directory
    ///
    /// The directory is searched in the following order:
    /// 1. The provided `directory` parameter if not empty
    /// 2. The `PMOXIAMI_CONFIG` environment variable
    /// 3. `.pmomusic` in the current directory
    /// 4. `.pmomusic` in the user's home directory
    pub fn load(directory: &str) -> Result<Self> {
        let config_dir = config_dir(directory);
        info!(config_dir=%config_dir.display(), "Using config directory");

        let path = config_dir.join(CONFIG_FILE_NAME);
        let external = match fs::read_to_string(&path) {
            Ok(data) => {
                info!(config_file=%path.display(), "Loaded config file");
                Some(data)
            }
            Err(_) => {
                info!(config_file=%path.display(), "Config file not found, using defaults");
                None
            }
        };

        Self::from_sources(external.as_deref(), env::vars())
    }

    /// Parses a YAML document merged over the defaults, without env overrides
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        Self::from_sources(Some(yaml), std::iter::empty())
    }

    /// Builds the configuration from an optional YAML document and a set of
    /// environment variables
    pub fn from_sources<I>(yaml: Option<&str>, vars: I) -> Result<Self>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut value: Value =
            serde_yaml::from_str(DEFAULT_CONFIG).context("Invalid embedded configuration")?;

        if let Some(yaml) = yaml {
            let external: Value = serde_yaml::from_str(yaml).context("Invalid config.yaml")?;
            // Un fichier vide se lit comme null
            if !external.is_null() {
                merge_yaml(&mut value, &lower_keys_value(external));
            }
        }

        apply_env_overrides(&mut value, vars)?;
        serde_yaml::from_value(value).context("Invalid configuration values")
    }

    /// Serializes the configuration, e.g. to save a new access token
    pub fn to_yaml_string(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }
}

/// Finds a config directory by trying different locations in order
pub fn config_dir(directory: &str) -> PathBuf {
    if !directory.is_empty() {
        return PathBuf::from(directory);
    }

    if let Ok(env_path) = env::var(ENV_CONFIG_DIR) {
        info!(env_var = ENV_CONFIG_DIR, path = %env_path, "Trying to load config from env");
        return PathBuf::from(env_path);
    }

    if Path::new(CONFIG_DIR_NAME).exists() {
        return PathBuf::from(CONFIG_DIR_NAME);
    }

    if let Some(home) = home_dir() {
        let home_config = home.join(CONFIG_DIR_NAME);
        if home_config.exists() {
            return home_config;
        }
    }

    PathBuf::from(CONFIG_DIR_NAME)
}

fn apply_env_overrides<I>(config: &mut Value, vars: I) -> Result<()>
where
    I: IntoIterator<Item = (String, String)>,
{
    for (key, value) in vars {
        let Some(path) = key.strip_prefix(ENV_PREFIX) else {
            continue;
        };
        let key_path = path.split("__").collect::<Vec<_>>();
        debug!(key = %key, "Applying environment override");
        set_value(config, &key_path, convert_env_value(&value))
            .with_context(|| format!("Cannot apply {}", key))?;
    }
    Ok(())
}

fn convert_env_value(value: &str) -> Value {
    serde_yaml::from_str::<Value>(value).unwrap_or_else(|_| Value::String(value.to_string()))
}

fn set_value(data: &mut Value, path: &[&str], value: Value) -> Result<()> {
    let Some((first, rest)) = path.split_first() else {
        *data = value;
        return Ok(());
    };

    let Value::Mapping(map) = data else {
        return Err(anyhow!("Current node is not a map"));
    };

    let key = Value::String(first.to_lowercase());
    if rest.is_empty() {
        map.insert(key, value);
        Ok(())
    } else {
        let entry = map
            .entry(key)
            .or_insert_with(|| Value::Mapping(Mapping::new()));
        set_value(entry, rest, value)
    }
}

fn lower_keys_value(value: Value) -> Value {
    match value {
        Value::Mapping(map) => {
            let mut new_map = Mapping::new();
            for (k, v) in map {
                let k = match k {
                    Value::String(s) => Value::String(s.to_lowercase()),
                    other => other,
                };
                new_map.insert(k, lower_keys_value(v));
            }
            Value::Mapping(new_map)
        }
        Value::Sequence(seq) => Value::Sequence(seq.into_iter().map(lower_keys_value).collect()),
        _ => value,
    }
}

fn merge_yaml(default: &mut Value, external: &Value) {
    match (default, external) {
        (Value::Mapping(dmap), Value::Mapping(emap)) => {
            for (k, v) in emap {
                match dmap.get_mut(k) {
                    Some(dv) => merge_yaml(dv, v),
                    None => {
                        dmap.insert(k.clone(), v.clone());
                    }
                }
            }
        }
        // scalaires et séquences : on remplace
        (d, e) => *d = e.clone(),
    }
}
