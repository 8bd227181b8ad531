use std::{ fs, path::{ Path, PathBuf } };

use directories::BaseDirs;
use serde::{ Deserialize, Serialize };
use serde_json::{ Map, Value };

use crate::{ home_assistant::HaConnection, logger::Level, PLUGIN_UUID };

pub const GLOBAL_HA_URL: &str = "ha_url";
pub const GLOBAL_HA_TOKEN: &str = "ha_token";
pub const GLOBAL_HA_VERIFY_SSL: &str = "ha_verify_ssl";
pub const GLOBAL_HA_TIMEOUT_SECS: &str = "ha_timeout_secs";

const DEFAULT_TIMEOUT_SECS: u64 = 10;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Base URL of the Home Assistant instance, e.g. `http://homeassistant.local:8123`
    pub ha_url: Option<String>,

    /// Long-lived access token
    pub ha_token: Option<String>,

    pub ha_verify_ssl: bool,
    pub ha_timeout_secs: u64,
    pub log_level: Level,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ha_url: None,
            ha_token: None,
            ha_verify_ssl: true,
            ha_timeout_secs: DEFAULT_TIMEOUT_SECS,
            log_level: Level::Info,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self, String> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self, String> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path).map_err(|e| format!("Failed to read config: {e}"))?;
        serde_json::from_str(&contents).map_err(|e| format!("Failed to parse config: {e}"))
    }

    pub fn save_to(&self, path: &Path) -> Result<(), String> {
        let json = serde_json
            ::to_string_pretty(self)
            .map_err(|e| format!("Failed to serialize config: {e}"))?;
        fs::write(path, json).map_err(|e| format!("Failed to write config: {e}"))
    }

    pub fn config_path() -> Result<PathBuf, String> {
        let base = BaseDirs::new().ok_or("Could not find user data directory")?;
        let dir = base.data_dir().join(PLUGIN_UUID);
        fs::create_dir_all(&dir).map_err(|e| format!("Failed to create config dir: {e}"))?;
        Ok(dir.join("settings.json"))
    }

    /// The connection to use, if both URL and token are present.
    pub fn connection(&self) -> Option<HaConnection> {
        let url = self.ha_url.as_deref().map(str::trim).filter(|s| !s.is_empty())?;
        let token = self.ha_token.as_deref().map(str::trim).filter(|s| !s.is_empty())?;
        Some(HaConnection {
            url: url.trim_end_matches('/').to_string(),
            token: token.to_string(),
            verify_ssl: self.ha_verify_ssl,
            timeout_secs: self.ha_timeout_secs,
        })
    }

    /// Merges plugin-global settings pushed by the host. Returns true if anything changed.
    pub fn apply_globals(&mut self, globals: &Map<String, Value>) -> bool {
        let before = self.clone();

        if let Some(v) = globals.get(GLOBAL_HA_URL) {
            self.ha_url = string_setting(v);
        }
        if let Some(v) = globals.get(GLOBAL_HA_TOKEN) {
            self.ha_token = string_setting(v);
        }
        if let Some(v) = globals.get(GLOBAL_HA_VERIFY_SSL) {
            self.ha_verify_ssl = match v {
                Value::Bool(b) => *b,
                Value::String(s) => !matches!(s.trim(), "false" | "0" | "no" | "off"),
                Value::Null => true,
                _ => self.ha_verify_ssl,
            };
        }
        if let Some(v) = globals.get(GLOBAL_HA_TIMEOUT_SECS) {
            self.ha_timeout_secs = match v {
                Value::Number(n) => n.as_u64().unwrap_or(DEFAULT_TIMEOUT_SECS),
                Value::String(s) => s.trim().parse().unwrap_or(DEFAULT_TIMEOUT_SECS),
                _ => DEFAULT_TIMEOUT_SECS,
            }
            .max(1);
        }

        *self != before
    }

    /// Connection part of the config, in the shape the host stores as global settings.
    pub fn to_globals(&self) -> Map<String, Value> {
        let mut globals = Map::new();
        globals.insert(GLOBAL_HA_URL.into(), self.ha_url.clone().unwrap_or_default().into());
        globals.insert(GLOBAL_HA_TOKEN.into(), self.ha_token.clone().unwrap_or_default().into());
        globals.insert(GLOBAL_HA_VERIFY_SSL.into(), self.ha_verify_ssl.into());
        globals.insert(GLOBAL_HA_TIMEOUT_SECS.into(), self.ha_timeout_secs.into());
        globals
    }
}

fn string_setting(v: &Value) -> Option<String> {
    match v {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        _ => None,
    }
}
