use std::{ sync::{ Arc, RwLock }, time::Duration };

use reqwest::blocking::Client;
use serde_json::{ Map, Value };
use urlencoding::encode;

use crate::{
    config::{ GLOBAL_HA_TOKEN, GLOBAL_HA_URL },
    debug,
    dial::{ InvokeError, ServiceInvoker },
    info,
    locale::Locale,
    logger::ActionLog,
    rows::{ ConfigRow, RowGroup },
    warn,
};

const USER_AGENT: &str = concat!("StreamDeck-HomeAssistant/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HaConnection {
    pub url: String,
    pub token: String,
    pub verify_ssl: bool,
    pub timeout_secs: u64,
}

struct Session {
    connection: HaConnection,
    http: Client,
}

/// Calls Home Assistant services over the REST API.
///
/// The connection can be swapped at runtime when the global settings change;
/// until one is set every call fails with [`InvokeError::NotConnected`].
pub struct HomeAssistantClient {
    session: RwLock<Option<Session>>,
    logger: Arc<dyn ActionLog>,
}

impl HomeAssistantClient {
    pub fn new(logger: Arc<dyn ActionLog>) -> Self {
        Self {
            session: RwLock::new(None),
            logger,
        }
    }

    pub fn connection(&self) -> Option<HaConnection> {
        self.session
            .read()
            .ok()
            .and_then(|s| s.as_ref().map(|s| s.connection.clone()))
    }

    /// Replaces the current connection. Returns false if nothing changed.
    pub fn set_connection(&self, connection: Option<HaConnection>) -> Result<bool, InvokeError> {
        if self.connection() == connection {
            return Ok(false);
        }

        let session = match connection {
            Some(connection) => {
                let http = Client::builder()
                    .user_agent(USER_AGENT)
                    .timeout(Duration::from_secs(connection.timeout_secs))
                    .danger_accept_invalid_certs(!connection.verify_ssl)
                    .build()
                    .map_err(|e| InvokeError::Transport(format!("failed to create HTTP client: {e}")))?;
                info!(self.logger, "Home Assistant connection set to {}", connection.url);
                Some(Session { connection, http })
            }
            None => {
                info!(self.logger, "Home Assistant connection cleared");
                None
            }
        };

        let mut guard = self.session
            .write()
            .map_err(|_| InvokeError::Transport("session lock poisoned".into()))?;
        *guard = session;
        Ok(true)
    }

    /// `GET /api/` — succeeds when the URL and token are accepted.
    pub fn check_connection(&self) -> Result<(), InvokeError> {
        let (url, token, http) = self.session_parts()?;
        let response = http
            .get(format!("{url}/api/"))
            .bearer_auth(token)
            .send()
            .map_err(|e| InvokeError::Transport(e.to_string()))?;
        ensure_success(response)
    }

    fn session_parts(&self) -> Result<(String, String, Client), InvokeError> {
        let guard = self.session
            .read()
            .map_err(|_| InvokeError::Transport("session lock poisoned".into()))?;
        let session = guard.as_ref().ok_or(InvokeError::NotConnected)?;
        Ok((
            session.connection.url.clone(),
            session.connection.token.clone(),
            session.http.clone(),
        ))
    }
}

impl ServiceInvoker for HomeAssistantClient {
    fn call(
        &self,
        entity_id: &str,
        service: &str,
        parameters: &Map<String, Value>
    ) -> Result<(), InvokeError> {
        let domain = entity_domain(entity_id).ok_or_else(||
            InvokeError::InvalidEntity(entity_id.to_string())
        )?;
        let (url, token, http) = self.session_parts()?;
        let endpoint = service_url(&url, domain, service);

        debug!(self.logger, "POST {} {}", endpoint, Value::Object(parameters.clone()));
        let response = http
            .post(&endpoint)
            .bearer_auth(token)
            .json(parameters)
            .send()
            .map_err(|e| InvokeError::Transport(e.to_string()))?;
        ensure_success(response)
    }
}

fn ensure_success(response: reqwest::blocking::Response) -> Result<(), InvokeError> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }
    let body = response.text().unwrap_or_default();
    Err(InvokeError::Rejected {
        status: status.as_u16(),
        body: body.trim().to_string(),
    })
}

/// `light.office` -> `light`
pub fn entity_domain(entity_id: &str) -> Option<&str> {
    entity_id
        .trim()
        .split_once('.')
        .map(|(domain, _)| domain)
        .filter(|d| !d.is_empty())
}

pub fn service_url(base: &str, domain: &str, service: &str) -> String {
    format!(
        "{}/api/services/{}/{}",
        base.trim_end_matches('/'),
        encode(domain),
        encode(service)
    )
}

/// Connection rows shown above every action's own rows.
pub fn connection_rows(connection: Option<&HaConnection>, locale: &Locale) -> RowGroup {
    let (url, token) = connection
        .map(|c| (c.url.as_str(), c.token.as_str()))
        .unwrap_or_default();
    RowGroup {
        title: locale.get("connection.group.title"),
        rows: vec![
            ConfigRow::text(GLOBAL_HA_URL, locale.get("connection.url.title"), url)
                .with_placeholder(locale.get("connection.url.placeholder")),
            ConfigRow::password(GLOBAL_HA_TOKEN, locale.get("connection.token.title"), token),
        ],
    }
}

/// Logs whether the configured instance answers; used after connection changes.
pub fn log_connection_check(client: &HomeAssistantClient, logger: &Arc<dyn ActionLog>) {
    match client.check_connection() {
        Ok(()) => info!(logger, "Home Assistant reachable"),
        Err(InvokeError::NotConnected) => {
            info!(logger, "Home Assistant not configured yet");
        }
        Err(e) => warn!(logger, "Home Assistant connection check failed: {}", e),
    }
}
