use serde_json::{ Map, Value };

use crate::{ app::AppContext, sd_client::SdClient };

pub mod dial;

/// Per-action events the host delivers, reduced to the fields this plugin uses.
#[derive(Debug, Clone, PartialEq)]
pub enum SdEvent {
    WillAppear {
        settings: Map<String, Value>,
    },
    WillDisappear,
    DidReceiveSettings {
        settings: Map<String, Value>,
    },
    DialDown {
        settings: Map<String, Value>,
    },
    DialUp {
        settings: Map<String, Value>,
    },
    DialRotate {
        settings: Map<String, Value>,
        ticks: i64,
    },
    TouchTap {
        settings: Map<String, Value>,
    },
    KeyDown {
        settings: Map<String, Value>,
    },
    KeyUp {
        settings: Map<String, Value>,
    },
    PropertyInspectorDidAppear,
    PropertyInspectorDidDisappear,
    SendToPlugin {
        payload: Value,
    },
}

impl SdEvent {
    /// `None` for unknown events or ones missing their required fields.
    pub fn parse(msg: &Map<String, Value>) -> Option<Self> {
        let event = msg.get("event").and_then(Value::as_str)?;
        let payload = msg.get("payload");
        let settings = || {
            payload
                .and_then(|p| p.get("settings"))
                .and_then(Value::as_object)
                .cloned()
                .unwrap_or_default()
        };

        Some(match event {
            "willAppear" => SdEvent::WillAppear { settings: settings() },
            "willDisappear" => SdEvent::WillDisappear,
            "didReceiveSettings" => SdEvent::DidReceiveSettings { settings: settings() },
            "dialDown" => SdEvent::DialDown { settings: settings() },
            "dialUp" => SdEvent::DialUp { settings: settings() },
            "dialRotate" => {
                let ticks = payload.and_then(|p| p.get("ticks"))?;
                let ticks = ticks.as_i64().or_else(|| ticks.as_f64().map(|t| t as i64))?;
                SdEvent::DialRotate {
                    settings: settings(),
                    ticks,
                }
            }
            "touchTap" => SdEvent::TouchTap { settings: settings() },
            "keyDown" => SdEvent::KeyDown { settings: settings() },
            "keyUp" => SdEvent::KeyUp { settings: settings() },
            "propertyInspectorDidAppear" => SdEvent::PropertyInspectorDidAppear,
            "propertyInspectorDidDisappear" => SdEvent::PropertyInspectorDidDisappear,
            "sendToPlugin" => SdEvent::SendToPlugin { payload: payload?.clone() },
            _ => {
                return None;
            }
        })
    }
}

/// One handler per action UUID. Every hook defaults to doing nothing, so an action
/// only overrides the events it reacts to.
pub trait ActionHandler: Send + Sync {
    fn on_message(&self, sd: &SdClient, app: &AppContext, msg: &Map<String, Value>) -> bool {
        let context = msg.get("context").and_then(Value::as_str).unwrap_or_default();
        let Some(event) = SdEvent::parse(msg) else {
            return false;
        };

        match &event {
            SdEvent::WillAppear { settings } => self.on_will_appear(sd, app, context, settings),
            SdEvent::WillDisappear => self.on_will_disappear(sd, app, context),
            SdEvent::DidReceiveSettings { settings } => {
                self.on_did_receive_settings(sd, app, context, settings)
            }
            SdEvent::DialDown { settings } => self.on_dial_down(sd, app, context, settings),
            SdEvent::DialUp { settings } => self.on_dial_up(sd, app, context, settings),
            SdEvent::DialRotate { settings, ticks } => {
                self.on_dial_rotate(sd, app, context, settings, *ticks)
            }
            SdEvent::TouchTap { settings } => self.on_touch_tap(sd, app, context, settings),
            SdEvent::KeyDown { settings } => self.on_key_down(sd, app, context, settings),
            SdEvent::KeyUp { settings } => self.on_key_up(sd, app, context, settings),
            SdEvent::PropertyInspectorDidAppear => {
                self.on_property_inspector_did_appear(sd, app, context)
            }
            SdEvent::PropertyInspectorDidDisappear => {
                self.on_property_inspector_did_disappear(sd, app, context)
            }
            SdEvent::SendToPlugin { payload } => self.on_send_to_plugin(sd, app, context, payload),
        }
        true
    }

    fn on_will_appear(
        &self,
        _sd: &SdClient,
        _app: &AppContext,
        _context: &str,
        _settings: &Map<String, Value>
    ) {}

    fn on_will_disappear(&self, _sd: &SdClient, _app: &AppContext, _context: &str) {}

    fn on_did_receive_settings(
        &self,
        _sd: &SdClient,
        _app: &AppContext,
        _context: &str,
        _settings: &Map<String, Value>
    ) {}

    fn on_dial_down(
        &self,
        _sd: &SdClient,
        _app: &AppContext,
        _context: &str,
        _settings: &Map<String, Value>
    ) {}

    fn on_dial_up(
        &self,
        _sd: &SdClient,
        _app: &AppContext,
        _context: &str,
        _settings: &Map<String, Value>
    ) {}

    fn on_dial_rotate(
        &self,
        _sd: &SdClient,
        _app: &AppContext,
        _context: &str,
        _settings: &Map<String, Value>,
        _ticks: i64
    ) {}

    fn on_touch_tap(
        &self,
        _sd: &SdClient,
        _app: &AppContext,
        _context: &str,
        _settings: &Map<String, Value>
    ) {}

    fn on_key_down(
        &self,
        _sd: &SdClient,
        _app: &AppContext,
        _context: &str,
        _settings: &Map<String, Value>
    ) {}

    fn on_key_up(
        &self,
        _sd: &SdClient,
        _app: &AppContext,
        _context: &str,
        _settings: &Map<String, Value>
    ) {}

    fn on_property_inspector_did_appear(&self, _sd: &SdClient, _app: &AppContext, _context: &str) {}

    fn on_property_inspector_did_disappear(
        &self,
        _sd: &SdClient,
        _app: &AppContext,
        _context: &str
    ) {}

    fn on_send_to_plugin(&self, _sd: &SdClient, _app: &AppContext, _context: &str, _payload: &Value) {}
}
