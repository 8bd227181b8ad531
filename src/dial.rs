//! The dial action: maps press / turn gestures on a deck dial to Home Assistant
//! service calls, and keeps its four settings in sync with the property inspector.

use serde_json::{ Map, Value };
use thiserror::Error;

pub mod controller;
pub mod service_id;
pub mod settings;

pub use controller::{ DialActionController, DialEvent };
pub use service_id::{ parse_service_id, ParseServiceIdError };
pub use settings::{ DialConfiguration, DialField };

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to send settings to the host: {0}")]
    Host(String),
    #[error("settings store is unavailable")]
    Unavailable,
}

/// Per-action persisted settings, keyed by the host's action context.
pub trait SettingsStore: Send + Sync {
    /// Previously persisted settings, or an empty map.
    fn get(&self, action_id: &str) -> Map<String, Value>;

    /// Replaces the full persisted record for the action.
    fn set(&self, action_id: &str, settings: Map<String, Value>) -> Result<(), SettingsError>;
}

#[derive(Debug, Error)]
pub enum InvokeError {
    #[error("not connected to Home Assistant (URL or token missing)")]
    NotConnected,
    #[error("entity id '{0}' has no domain")]
    InvalidEntity(String),
    #[error("request failed: {0}")]
    Transport(String),
    #[error("Home Assistant answered HTTP {status}: {body}")]
    Rejected {
        status: u16,
        body: String,
    },
}

#[derive(Debug, Error)]
pub enum FieldError {
    #[error("'{0}' is not a valid step size")]
    InvalidStepSize(Value),
    #[error("'{0}' is not a text value")]
    InvalidText(Value),
    #[error(transparent)]
    Persist(#[from] SettingsError),
}

/// Performs one remote service call against the home-automation backend.
pub trait ServiceInvoker: Send + Sync {
    fn call(
        &self,
        entity_id: &str,
        service: &str,
        parameters: &Map<String, Value>
    ) -> Result<(), InvokeError>;
}
