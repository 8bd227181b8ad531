use std::{ path::PathBuf, sync::{ Arc, Mutex } };

use serde_json::{ Map, Value };

use crate::{
    config::{ Config, GLOBAL_HA_TOKEN, GLOBAL_HA_URL },
    error,
    home_assistant::{ connection_rows, log_connection_check, HomeAssistantClient },
    info,
    locale::{ Locale, DEFAULT_LOCALE },
    logger::ActionLog,
    rows::RowGroup,
    sd_client::SdClient,
};

/// Plugin-wide state shared by every action handler.
pub struct AppContext {
    pub plugin_uuid: String,
    pub home_assistant: Arc<HomeAssistantClient>,
    pub locale: &'static Locale,
    config: Mutex<Config>,
    /// Where the config is saved; `None` keeps it in memory only.
    config_path: Option<PathBuf>,
    logger: Arc<dyn ActionLog>,
}

impl AppContext {
    pub fn new(
        plugin_uuid: &str,
        config: Config,
        config_path: Option<PathBuf>,
        logger: Arc<dyn ActionLog>
    ) -> Self {
        let home_assistant = Arc::new(HomeAssistantClient::new(Arc::clone(&logger)));
        if let Err(e) = home_assistant.set_connection(config.connection()) {
            error!(logger, "Failed to apply Home Assistant connection: {}", e);
        }

        Self {
            plugin_uuid: plugin_uuid.to_string(),
            home_assistant,
            locale: &DEFAULT_LOCALE,
            config: Mutex::new(config),
            config_path,
            logger,
        }
    }

    pub fn config(&self) -> Config {
        self.config
            .lock()
            .map(|c| c.clone())
            .unwrap_or_default()
    }

    pub fn is_connection_key(key: &str) -> bool {
        key == GLOBAL_HA_URL || key == GLOBAL_HA_TOKEN
    }

    /// Applies `didReceiveGlobalSettings`. Returns true if the config changed.
    pub fn apply_global_settings(&self, globals: &Map<String, Value>) -> bool {
        if !self.merge_globals(globals) {
            return false;
        }
        self.commit_connection();
        true
    }

    /// A connection row was edited in the inspector: update locally and push to
    /// the host's global settings so every action instance sees it. The client
    /// keeps its old connection until [`Self::commit_connection`].
    pub fn apply_connection_field(&self, sd: &SdClient, key: &str, value: &Value) {
        let mut patch = Map::new();
        patch.insert(key.to_string(), value.clone());
        if !self.merge_globals(&patch) {
            return;
        }

        let globals = self.config().to_globals();
        if let Err(e) = sd.set_global_settings(&self.plugin_uuid, globals) {
            error!(self.logger, "Failed to write global settings: {}", e);
        }
    }

    /// Hands the configured connection to the client and checks it if it changed.
    pub fn commit_connection(&self) {
        match self.home_assistant.set_connection(self.config().connection()) {
            Ok(true) => log_connection_check(&self.home_assistant, &self.logger),
            Ok(false) => {}
            Err(e) => error!(self.logger, "Failed to apply Home Assistant connection: {}", e),
        }
    }

    fn merge_globals(&self, globals: &Map<String, Value>) -> bool {
        let updated = {
            let Ok(mut cfg) = self.config.lock() else {
                error!(self.logger, "Config lock poisoned, ignoring global settings");
                return false;
            };
            if !cfg.apply_globals(globals) {
                return false;
            }
            cfg.clone()
        };

        info!(self.logger, "Global settings changed");
        self.save_config(&updated);
        true
    }

    pub fn connection_rows(&self) -> Vec<RowGroup> {
        let connection = self.config().connection();
        vec![connection_rows(connection.as_ref(), self.locale)]
    }

    fn save_config(&self, cfg: &Config) {
        let Some(path) = &self.config_path else {
            return;
        };
        if let Err(e) = cfg.save_to(path) {
            error!(self.logger, "Failed to save config: {}", e);
        }
    }
}
