use std::{ collections::HashMap, sync::{ Arc, Mutex } };

use anyhow::{ anyhow, Context as _ };
use serde_json::{ Map, Value };
use websocket::{ ClientBuilder, OwnedMessage };

use crate::{
    action_handlers::{ dial::DialKey, ActionHandler },
    app::AppContext,
    config::Config,
    debug,
    error,
    info,
    logger::ActionLog,
    sd_client::{ SdClient, SdSettingsStore, WsOutbound },
    warn,
    LaunchArgs,
};

pub type Handlers = HashMap<&'static str, Arc<dyn ActionHandler>>;

pub fn build_handlers(sd: &SdClient, app: &AppContext, logger: &Arc<dyn ActionLog>) -> Handlers {
    let store = Arc::new(SdSettingsStore::new(sd.clone()));
    HashMap::from([
        (
            DialKey::PLUGIN_UUID,
            Arc::new(
                DialKey::new(Arc::clone(logger), store, app.home_assistant.clone())
            ) as Arc<dyn ActionHandler>,
        ),
    ])
}

/// Handles one inbound text frame. Bad frames are logged and skipped.
pub fn handle_message(
    text: &str,
    sd: &SdClient,
    app: &AppContext,
    handlers: &Handlers,
    logger: &Arc<dyn ActionLog>
) {
    debug!(logger, "📥 Received message: {}", text);
    let msg: Map<String, Value> = match serde_json::from_str(text) {
        Ok(val) => val,
        Err(e) => {
            error!(logger, "❌ parse: {e}");
            return;
        }
    };

    let action = msg.get("action").and_then(Value::as_str);
    let event = msg.get("event").and_then(Value::as_str);

    if let Some(name) = action {
        match handlers.get(name) {
            Some(h) => {
                if h.on_message(sd, app, &msg) {
                    debug!(logger, "🔧 Handled action {} (event {:?})", name, event);
                } else {
                    debug!(logger, "⚠️ Ignored event {:?} for {}", event, name);
                }
            }
            None => warn!(logger, "⚠️ No handler for action: {}", name),
        }
    } else if let Some(evt) = event {
        match evt {
            "didReceiveGlobalSettings" => {
                let settings = msg
                    .get("payload")
                    .and_then(|p| p.get("settings"))
                    .and_then(Value::as_object);
                if let Some(settings) = settings {
                    app.apply_global_settings(settings);
                }
            }
            "systemDidWakeUp" | "applicationDidLaunch" | "applicationDidTerminate" | "deviceDidConnect" | "deviceDidDisconnect" => {
                info!(logger, "🌀 Global event: {}", evt);
            }
            _ => debug!(logger, "⚠️ Unhandled event: {}", evt),
        }
    } else {
        warn!(logger, "⚠️ Message without action/event");
    }
}

pub fn run(args: &LaunchArgs, config: Config, logger: Arc<dyn ActionLog>) -> anyhow::Result<()> {
    let url = format!("ws://127.0.0.1:{}", args.port);
    let config_path = Config::config_path()
        .map_err(|e| warn!(logger, "Config will not be saved: {}", e))
        .ok();
    let app = AppContext::new(&args.plugin_uuid, config, config_path, Arc::clone(&logger));

    info!(logger, "🔌 Connecting to {}", url);
    let client = ClientBuilder::new(&url)
        .context("create WS")?
        .connect_insecure()
        .map_err(|e| anyhow!("connect WS: {e}"))?;
    let (mut receiver, sender) = client.split().context("split WS")?;

    let sd = SdClient::new(Arc::new(WsOutbound::new(Arc::new(Mutex::new(sender)))));

    info!(logger, "📨 Registering plugin with UUID: {}", args.plugin_uuid);
    sd.register(&args.register_event, &args.plugin_uuid).context("send register")?;
    sd.get_global_settings(&args.plugin_uuid).context("request global settings")?;
    info!(logger, "✅ Plugin registered successfully");

    let handlers = build_handlers(&sd, &app, &logger);

    info!(logger, "🔄 Starting message loop");
    for message in receiver.incoming_messages() {
        match message {
            Ok(OwnedMessage::Text(text)) => handle_message(&text, &sd, &app, &handlers, &logger),
            Ok(OwnedMessage::Close(_)) => {
                info!(logger, "🔌 Connection closed");
                break;
            }
            Ok(_) => {}
            Err(e) => {
                return Err(anyhow!("websocket error: {e}"));
            }
        }
    }

    info!(logger, "🛑 WebSocket loop terminated");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ logger::testing::MemoryLog, logger::Level, sd_client::testing::RecordingOutbound };

    struct Setup {
        out: Arc<RecordingOutbound>,
        sd: SdClient,
        app: AppContext,
        handlers: Handlers,
        log: Arc<MemoryLog>,
    }

    fn setup() -> Setup {
        let out = Arc::new(RecordingOutbound::default());
        let sd = SdClient::new(out.clone());
        let log = Arc::new(MemoryLog::default());
        let logger: Arc<dyn ActionLog> = log.clone();
        let app = AppContext::new("plugin-uuid", Config::default(), None, logger.clone());
        let handlers = build_handlers(&sd, &app, &logger);
        Setup { out, sd, app, handlers, log }
    }

    impl Setup {
        fn handle(&self, text: &str) {
            let logger: Arc<dyn ActionLog> = self.log.clone();
            handle_message(text, &self.sd, &self.app, &self.handlers, &logger);
        }
    }

    #[test]
    fn routes_to_dial_handler() {
        let s = setup();
        s.handle(
            r#"{"action":"de.gensyn.homeassistant.dial","event":"willAppear","context":"c1","payload":{"settings":{}}}"#
        );
        s.handle(
            r#"{"action":"de.gensyn.homeassistant.dial","event":"sendToPlugin","context":"c1","payload":{"event":"fieldChanged","key":"dial_step_size","value":"7"}}"#
        );

        let writes = s.out.events("setSettings");
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0]["payload"]["dial_step_size"], 7);
    }

    #[test]
    fn bad_json_and_unknown_actions_are_logged() {
        let s = setup();
        s.handle("not json");
        s.handle(r#"{"action":"other.action","event":"keyDown","context":"c"}"#);

        assert!(s.log.contains(Level::Error, "parse"));
        assert!(s.log.contains(Level::Warn, "No handler for action: other.action"));
        assert!(s.out.sent().is_empty());
    }

    #[test]
    fn global_settings_reach_app() {
        let s = setup();
        s.handle(
            r#"{"event":"didReceiveGlobalSettings","payload":{"settings":{"ha_url":"http://ha.local:8123"}}}"#
        );
        assert_eq!(s.app.config().ha_url.as_deref(), Some("http://ha.local:8123"));
    }
}
