use std::{ collections::HashMap, sync::{ Arc, Mutex } };

use constcat::concat;
use serde_json::{ json, Map, Value };

use crate::{
    action_handlers::ActionHandler,
    app::AppContext,
    debug,
    dial::{ DialActionController, DialEvent, DialField, ServiceInvoker },
    error,
    logger::ActionLog,
    sd_client::{ SdClient, SdSettingsStore },
    warn,
    PLUGIN_UUID,
};

/// Maps a rotate tick count to a turn direction; zero ticks carry no direction.
pub fn turn_direction(ticks: i64) -> Option<DialEvent> {
    match ticks.signum() {
        1 => Some(DialEvent::TurnClockwise),
        -1 => Some(DialEvent::TurnCounterClockwise),
        _ => None,
    }
}

/// Host side of the dial action: one [`DialActionController`] per action context.
pub struct DialKey {
    logger: Arc<dyn ActionLog>,
    store: Arc<SdSettingsStore>,
    invoker: Arc<dyn ServiceInvoker>,
    controllers: Mutex<HashMap<String, DialActionController>>,
}

impl DialKey {
    pub const PLUGIN_UUID: &str = concat!(PLUGIN_UUID, ".dial");

    pub fn new(
        logger: Arc<dyn ActionLog>,
        store: Arc<SdSettingsStore>,
        invoker: Arc<dyn ServiceInvoker>
    ) -> Self {
        Self {
            logger,
            store,
            invoker,
            controllers: Mutex::new(HashMap::new()),
        }
    }

    /// Runs `f` against the context's controller, creating it from `settings` on first use.
    fn with_controller<R>(
        &self,
        context: &str,
        settings: Option<&Map<String, Value>>,
        f: impl FnOnce(&mut DialActionController) -> R
    ) -> Option<R> {
        let Ok(mut controllers) = self.controllers.lock() else {
            error!(self.logger, "Dial controllers lock poisoned");
            return None;
        };

        if !controllers.contains_key(context) {
            if let Some(settings) = settings {
                self.store.remember(context, settings);
            }
            let controller = DialActionController::load(
                context,
                self.store.clone(),
                self.invoker.clone(),
                self.logger.clone()
            );
            controllers.insert(context.to_string(), controller);
        }

        controllers.get_mut(context).map(f)
    }

    fn dispatch(&self, context: &str, settings: &Map<String, Value>, event: DialEvent) {
        let payload = Value::Object(settings.clone());
        let outcome = self.with_controller(context, Some(settings), |c| {
            c.handle_event(event, &payload)
        });
        debug!(self.logger, "Dial {} on {}: {:?}", event, context, outcome);
    }

    fn send_rows(&self, sd: &SdClient, app: &AppContext, context: &str) {
        let Some(groups) = self.with_controller(context, None, |c| {
            c.build_configuration_rows(app.connection_rows(), app.locale)
        }) else {
            return;
        };

        let payload = json!({ "event": "configRows", "groups": groups });
        if let Err(e) = sd.send_to_property_inspector(context, payload) {
            error!(self.logger, "Failed to send rows to inspector: {}", e);
        }
    }

    fn field_changed(&self, sd: &SdClient, app: &AppContext, context: &str, key: &str, value: &Value) {
        if let Some(field) = DialField::from_key(key) {
            let result = self.with_controller(context, None, |c| c.on_field_changed(field, value));
            match result {
                Some(Ok(())) => debug!(self.logger, "Saved {} for {}", key, context),
                Some(Err(e)) => warn!(self.logger, "Ignoring change of {}: {}", key, e),
                None => {}
            }
        } else if AppContext::is_connection_key(key) {
            app.apply_connection_field(sd, key, value);
        } else {
            warn!(self.logger, "Unknown field '{}' from inspector", key);
        }
    }
}

impl ActionHandler for DialKey {
    fn on_will_appear(
        &self,
        _sd: &SdClient,
        _app: &AppContext,
        context: &str,
        settings: &Map<String, Value>
    ) {
        self.store.remember(context, settings);
        if let Ok(mut controllers) = self.controllers.lock() {
            let controller = DialActionController::load(
                context,
                self.store.clone(),
                self.invoker.clone(),
                self.logger.clone()
            );
            debug!(self.logger, "Dial appeared: {} {:?}", context, controller.config());
            controllers.insert(context.to_string(), controller);
        }
    }

    fn on_will_disappear(&self, _sd: &SdClient, _app: &AppContext, context: &str) {
        if let Ok(mut controllers) = self.controllers.lock() {
            controllers.remove(context);
        }
        self.store.forget(context);
    }

    fn on_did_receive_settings(
        &self,
        _sd: &SdClient,
        _app: &AppContext,
        context: &str,
        settings: &Map<String, Value>
    ) {
        self.store.remember(context, settings);
        self.with_controller(context, Some(settings), |c| c.reload());
    }

    fn on_dial_down(
        &self,
        _sd: &SdClient,
        _app: &AppContext,
        context: &str,
        settings: &Map<String, Value>
    ) {
        self.dispatch(context, settings, DialEvent::Press);
    }

    fn on_dial_rotate(
        &self,
        _sd: &SdClient,
        _app: &AppContext,
        context: &str,
        settings: &Map<String, Value>,
        ticks: i64
    ) {
        if let Some(event) = turn_direction(ticks) {
            self.dispatch(context, settings, event);
        }
    }

    fn on_property_inspector_did_appear(&self, sd: &SdClient, app: &AppContext, context: &str) {
        self.send_rows(sd, app, context);
    }

    fn on_property_inspector_did_disappear(&self, _sd: &SdClient, app: &AppContext, _context: &str) {
        app.commit_connection();
    }

    fn on_send_to_plugin(&self, sd: &SdClient, app: &AppContext, context: &str, payload: &Value) {
        match payload.get("event").and_then(Value::as_str) {
            Some("fieldChanged") => {
                let Some(key) = payload.get("key").and_then(Value::as_str) else {
                    warn!(self.logger, "fieldChanged without key: {}", payload);
                    return;
                };
                let value = payload.get("value").unwrap_or(&Value::Null);
                self.field_changed(sd, app, context, key, value);
            }
            Some("requestRows") => {
                app.commit_connection();
                self.send_rows(sd, app, context);
            }
            other => warn!(self.logger, "Unhandled inspector message {:?}", other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::Config,
        dial::testing::RecordingInvoker,
        logger::testing::MemoryLog,
        sd_client::testing::RecordingOutbound,
    };

    struct Harness {
        out: Arc<RecordingOutbound>,
        sd: SdClient,
        app: AppContext,
        invoker: Arc<RecordingInvoker>,
        key: DialKey,
    }

    fn harness() -> Harness {
        let out = Arc::new(RecordingOutbound::default());
        let sd = SdClient::new(out.clone());
        let log: Arc<dyn ActionLog> = Arc::new(MemoryLog::default());
        let app = AppContext::new("plugin-uuid", Config::default(), None, log.clone());
        let invoker = Arc::new(RecordingInvoker::default());
        let store = Arc::new(SdSettingsStore::new(sd.clone()));
        let key = DialKey::new(log, store, invoker.clone());
        Harness { out, sd, app, invoker, key }
    }

    impl Harness {
        fn send(&self, msg: Value) -> bool {
            self.key.on_message(&self.sd, &self.app, msg.as_object().unwrap())
        }
    }

    fn configured() -> Value {
        json!({
            "dial_entity_id": "light.office",
            "dial_step_size": 10,
            "dial_turn_service": "light.turn_on",
            "dial_press_service": "light.toggle",
        })
    }

    #[test]
    fn turn_direction_follows_tick_sign() {
        assert_eq!(turn_direction(3), Some(DialEvent::TurnClockwise));
        assert_eq!(turn_direction(-1), Some(DialEvent::TurnCounterClockwise));
        assert_eq!(turn_direction(0), None);
    }

    #[test]
    fn rotate_events_call_service_once_per_message() {
        let h = harness();
        h.send(json!({ "event": "willAppear", "context": "c1", "payload": { "settings": configured() } }));

        h.send(json!({ "event": "dialRotate", "context": "c1", "payload": { "settings": configured(), "ticks": 4 } }));
        h.send(json!({ "event": "dialRotate", "context": "c1", "payload": { "settings": configured(), "ticks": -2 } }));
        h.send(json!({ "event": "dialRotate", "context": "c1", "payload": { "settings": configured(), "ticks": 0 } }));

        let calls = h.invoker.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].2["brightness_step_pct"], json!(10));
        assert_eq!(calls[1].2["brightness_step_pct"], json!(-10));
    }

    #[test]
    fn dial_down_without_will_appear_uses_event_settings() {
        let h = harness();
        h.send(json!({ "event": "dialDown", "context": "c2", "payload": { "settings": configured() } }));

        assert_eq!(h.invoker.calls(), vec![(
            "light.office".to_string(),
            "toggle".to_string(),
            json!({ "entity_id": "light.office" }).as_object().unwrap().clone(),
        )]);
    }

    #[test]
    fn other_events_fall_through() {
        let h = harness();
        h.send(json!({ "event": "willAppear", "context": "c1", "payload": { "settings": configured() } }));

        assert!(h.send(json!({ "event": "dialUp", "context": "c1", "payload": { "settings": configured() } })));
        assert!(h.send(json!({ "event": "touchTap", "context": "c1", "payload": { "settings": configured() } })));
        assert!(h.send(json!({ "event": "keyDown", "context": "c1", "payload": { "settings": configured() } })));

        assert!(h.invoker.calls().is_empty());
        assert!(h.out.sent().is_empty());
    }

    #[test]
    fn field_change_from_inspector_writes_settings() {
        let h = harness();
        h.send(json!({ "event": "willAppear", "context": "c1", "payload": { "settings": { "title": "x" } } }));

        h.send(json!({
            "event": "sendToPlugin",
            "context": "c1",
            "payload": { "event": "fieldChanged", "key": "dial_entity_id", "value": "light.desk" },
        }));

        let writes = h.out.events("setSettings");
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0]["context"], "c1");
        assert_eq!(writes[0]["payload"], json!({
            "title": "x",
            "dial_entity_id": "light.desk",
            "dial_step_size": 1,
            "dial_turn_service": "",
            "dial_press_service": "",
        }));
    }

    #[test]
    fn did_receive_settings_reloads_controller() {
        let h = harness();
        h.send(json!({ "event": "willAppear", "context": "c1", "payload": { "settings": {} } }));
        h.send(json!({ "event": "didReceiveSettings", "context": "c1", "payload": { "settings": configured() } }));

        h.key.dispatch("c1", &Map::new(), DialEvent::Press);

        assert_eq!(h.invoker.calls().len(), 1);
    }

    #[test]
    fn inspector_receives_rows() {
        let h = harness();
        h.send(json!({ "event": "willAppear", "context": "c1", "payload": { "settings": configured() } }));
        h.send(json!({ "event": "propertyInspectorDidAppear", "context": "c1" }));

        let sent = h.out.events("sendToPropertyInspector");
        assert_eq!(sent.len(), 1);
        let groups = sent[0]["payload"]["groups"].as_array().unwrap();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0]["rows"][0]["key"], "ha_url");
        assert_eq!(groups[1]["rows"][1]["value"], 10);
    }

    #[test]
    fn connection_field_goes_to_global_settings() {
        let h = harness();
        h.send(json!({
            "event": "sendToPlugin",
            "context": "c1",
            "payload": { "event": "fieldChanged", "key": "ha_token", "value": "abc" },
        }));

        assert!(h.out.events("setSettings").is_empty());
        let globals = h.out.events("setGlobalSettings");
        assert_eq!(globals.len(), 1);
        assert_eq!(globals[0]["payload"]["ha_token"], "abc");
    }

    #[test]
    fn connection_applies_when_inspector_closes() {
        let h = harness();
        for (key, value) in [("ha_url", "http://127.0.0.1:9"), ("ha_token", "abc")] {
            h.send(json!({
                "event": "sendToPlugin",
                "context": "c1",
                "payload": { "event": "fieldChanged", "key": key, "value": value },
            }));
        }
        assert!(h.app.home_assistant.connection().is_none());

        h.send(json!({ "event": "propertyInspectorDidDisappear", "context": "c1" }));

        assert_eq!(h.app.home_assistant.connection().unwrap().token, "abc");
    }

    #[test]
    fn will_disappear_forgets_context() {
        let h = harness();
        h.send(json!({ "event": "willAppear", "context": "c1", "payload": { "settings": configured() } }));
        h.send(json!({ "event": "willDisappear", "context": "c1", "payload": { "settings": configured() } }));

        // recreated from an empty store
        h.key.dispatch("c1", &Map::new(), DialEvent::Press);
        assert!(h.invoker.calls().is_empty());
    }
}
