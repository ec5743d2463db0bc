use std::{env, fs, path::Path, path::PathBuf, time::Duration};

use serde::Deserialize;
use serde_aux::field_attributes::deserialize_string_from_number;
use serde_json::Value;
use thiserror::Error;
use tracing::{info, warn};

pub const DEFAULT_CONFIG_PATH: &str = "配置.json";
pub const DEFAULT_API_URL: &str = "https://klbq-prod-www.idreamsky.com/api/common/ide";
pub const DEFAULT_CHART_ID: &str = "338985";
pub const DEFAULT_IDE_TOKEN: &str = "b7FM3m";
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("could not read settings document: {0}")]
    Io(#[from] std::io::Error),
    #[error("settings document is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("settings document has no data.value.setting object")]
    MissingSetting,
    #[error("bad {category} entry #{index}: {reason}")]
    Entry {
        category: &'static str,
        index: usize,
        reason: String,
    },
}

/// A `{code, name}` pair from the settings document.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Definition {
    #[serde(deserialize_with = "deserialize_string_from_number")]
    pub code: String,
    pub name: String,
}

pub type MapDef = Definition;
pub type RankDef = Definition;

/// Opaque identifiers the remote report endpoint wants in every body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestParams {
    pub chart_id: String,
    pub ide_token: String,
}

impl Default for RequestParams {
    fn default() -> Self {
        Self {
            chart_id: DEFAULT_CHART_ID.to_string(),
            ide_token: DEFAULT_IDE_TOKEN.to_string(),
        }
    }
}

/// Runtime knobs, read from the environment (and `.env`, if present).
#[derive(Debug, Clone)]
pub struct Settings {
    pub config_path: PathBuf,
    pub api_url: String,
    pub params: RequestParams,
    pub output_dir: PathBuf,
    pub timeout: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            config_path: PathBuf::from(DEFAULT_CONFIG_PATH),
            api_url: DEFAULT_API_URL.to_string(),
            params: RequestParams::default(),
            output_dir: PathBuf::from("."),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl Settings {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let chart_id = lookup("KLBQ_CHART_ID");
        let ide_token = lookup("KLBQ_IDE_TOKEN");
        if chart_id.is_none() && ide_token.is_none() {
            info!("using default request parameters");
        }

        let timeout = match lookup("KLBQ_TIMEOUT_SECS") {
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(0) => {
                    warn!(value = %raw, "ignoring KLBQ_TIMEOUT_SECS: must be positive");
                    defaults.timeout
                }
                Ok(secs) => Duration::from_secs(secs),
                Err(e) => {
                    warn!(value = %raw, "ignoring KLBQ_TIMEOUT_SECS: {e}");
                    defaults.timeout
                }
            },
            None => defaults.timeout,
        };

        Self {
            config_path: lookup("KLBQ_CONFIG_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.config_path),
            api_url: lookup("KLBQ_API_URL").unwrap_or(defaults.api_url),
            params: RequestParams {
                chart_id: chart_id.unwrap_or(defaults.params.chart_id),
                ide_token: ide_token.unwrap_or(defaults.params.ide_token),
            },
            output_dir: lookup("KLBQ_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.output_dir),
            timeout,
        }
    }
}

#[derive(Deserialize, Debug)]
struct SettingItem {
    content: String,
}

/// Reads map and rank definitions from the settings document.
///
/// Never fails: an unreadable document gives two empty lists, and a bad
/// entry is logged and skipped.
pub fn load_config(path: impl AsRef<Path>) -> (Vec<MapDef>, Vec<RankDef>) {
    let path = path.as_ref();
    match read_document(path) {
        Ok(doc) => parse_document(&doc),
        Err(e) => {
            warn!(path = %path.display(), "{e}");
            (Vec::new(), Vec::new())
        }
    }
}

fn read_document(path: &Path) -> Result<Value, ConfigError> {
    let raw = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

pub fn parse_document(doc: &Value) -> (Vec<MapDef>, Vec<RankDef>) {
    let Some(setting) = doc.pointer("/data/value/setting") else {
        warn!("{}", ConfigError::MissingSetting);
        return (Vec::new(), Vec::new());
    };

    (
        parse_category(setting, "map"),
        parse_category(setting, "rank"),
    )
}

fn parse_category(setting: &Value, category: &'static str) -> Vec<Definition> {
    let Some(items) = setting.get(category).and_then(Value::as_array) else {
        return Vec::new();
    };

    items
        .iter()
        .enumerate()
        .filter_map(|(index, item)| match parse_item(item) {
            Ok(def) => Some(def),
            Err(reason) => {
                warn!(
                    "{}",
                    ConfigError::Entry {
                        category,
                        index,
                        reason
                    }
                );
                None
            }
        })
        .collect()
}

// `content` is itself a JSON document holding the definition.
fn parse_item(item: &Value) -> Result<Definition, String> {
    let item = SettingItem::deserialize(item).map_err(|e| e.to_string())?;
    serde_json::from_str(&item.content).map_err(|e| e.to_string())
}
