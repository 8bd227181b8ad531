use std::{ collections::HashMap, net::TcpStream, sync::{ Arc, Mutex } };

use serde_json::{ json, Map, Value };
use thiserror::Error;
use websocket::{ sync::Writer, OwnedMessage };

use crate::dial::{ SettingsError, SettingsStore };

pub type WriteSink = Arc<Mutex<Writer<TcpStream>>>;

#[derive(Debug, Error)]
pub enum SdError {
    #[error("websocket writer lock poisoned")]
    Poisoned,
    #[error("failed to send message: {0}")]
    Send(String),
}

/// Where outbound host events go. The live plugin writes to the WebSocket.
pub trait Outbound: Send + Sync {
    fn send(&self, message: Value) -> Result<(), SdError>;
}

pub struct WsOutbound {
    write: WriteSink,
}

impl WsOutbound {
    pub fn new(write: WriteSink) -> Self {
        Self { write }
    }
}

impl Outbound for WsOutbound {
    fn send(&self, message: Value) -> Result<(), SdError> {
        let mut writer = self.write.lock().map_err(|_| SdError::Poisoned)?;
        writer
            .send_message(&OwnedMessage::Text(message.to_string()))
            .map_err(|e| SdError::Send(e.to_string()))
    }
}

/// Typed helpers for the events the plugin sends to the host.
#[derive(Clone)]
pub struct SdClient {
    out: Arc<dyn Outbound>,
}

impl SdClient {
    pub fn new(out: Arc<dyn Outbound>) -> Self {
        Self { out }
    }

    pub fn register(&self, register_event: &str, plugin_uuid: &str) -> Result<(), SdError> {
        self.out.send(json!({ "event": register_event, "uuid": plugin_uuid }))
    }

    pub fn get_global_settings(&self, plugin_uuid: &str) -> Result<(), SdError> {
        self.out.send(json!({ "event": "getGlobalSettings", "context": plugin_uuid }))
    }

    pub fn set_global_settings(
        &self,
        plugin_uuid: &str,
        settings: Map<String, Value>
    ) -> Result<(), SdError> {
        self.out.send(
            json!({
                "event": "setGlobalSettings",
                "context": plugin_uuid,
                "payload": settings,
            })
        )
    }

    pub fn set_settings(&self, context: &str, settings: Map<String, Value>) -> Result<(), SdError> {
        self.out.send(json!({
            "event": "setSettings",
            "context": context,
            "payload": settings,
        }))
    }

    pub fn send_to_property_inspector(&self, context: &str, payload: Value) -> Result<(), SdError> {
        self.out.send(
            json!({
                "event": "sendToPropertyInspector",
                "context": context,
                "payload": payload,
            })
        )
    }
}

/// Per-context settings cache backed by `setSettings`.
///
/// The host pushes a context's settings with `willAppear` and `didReceiveSettings`;
/// those payloads are remembered here so `get` can answer synchronously.
pub struct SdSettingsStore {
    sd: SdClient,
    cache: Mutex<HashMap<String, Map<String, Value>>>,
}

impl SdSettingsStore {
    pub fn new(sd: SdClient) -> Self {
        Self {
            sd,
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn remember(&self, context: &str, settings: &Map<String, Value>) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(context.to_string(), settings.clone());
        }
    }

    pub fn forget(&self, context: &str) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.remove(context);
        }
    }
}

impl SettingsStore for SdSettingsStore {
    fn get(&self, action_id: &str) -> Map<String, Value> {
        self.cache
            .lock()
            .ok()
            .and_then(|cache| cache.get(action_id).cloned())
            .unwrap_or_default()
    }

    /// The cache only takes the new record once the host send went through.
    fn set(&self, action_id: &str, settings: Map<String, Value>) -> Result<(), SettingsError> {
        let mut cache = self.cache.lock().map_err(|_| SettingsError::Unavailable)?;
        self.sd
            .set_settings(action_id, settings.clone())
            .map_err(|e| SettingsError::Host(e.to_string()))?;
        cache.insert(action_id.to_string(), settings);
        Ok(())
    }
}

#[cfg(test)]
pub mod testing {
    use super::*;

    #[derive(Default)]
    pub struct RecordingOutbound {
        sent: Mutex<Vec<Value>>,
    }

    impl RecordingOutbound {
        pub fn sent(&self) -> Vec<Value> {
            self.sent.lock().unwrap().clone()
        }

        pub fn events(&self, name: &str) -> Vec<Value> {
            self.sent()
                .into_iter()
                .filter(|m| m["event"] == name)
                .collect()
        }
    }

    impl Outbound for RecordingOutbound {
        fn send(&self, message: Value) -> Result<(), SdError> {
            self.sent.lock().unwrap().push(message);
            Ok(())
        }
    }

    /// A socket that is already gone.
    pub struct ClosedOutbound;

    impl Outbound for ClosedOutbound {
        fn send(&self, _message: Value) -> Result<(), SdError> {
            Err(SdError::Send("broken pipe".into()))
        }
    }
}
