use std::{ env, fmt, process::ExitCode, sync::Arc };

mod action_handlers;
mod app;
mod config;
mod dial;
mod home_assistant;
mod locale;
mod logger;
mod plugin;
mod rows;
mod sd_client;

use config::Config;
use logger::{ ActionLog, FileLogger };

pub const PLUGIN_UUID: &str = "de.gensyn.homeassistant";

/// Values passed by the deck application on launch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LaunchArgs {
    pub port: u16,
    pub plugin_uuid: String,
    pub register_event: String,
}

#[derive(Debug)]
enum MainError {
    MissingPort,
    MissingPluginUUID,
    MissingRegisterEvent,
    InvalidPort(String),
    PluginError(anyhow::Error),
}

impl fmt::Display for MainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MainError::MissingPort => write!(f, "missing -port"),
            MainError::MissingPluginUUID => write!(f, "missing -pluginUUID"),
            MainError::MissingRegisterEvent => write!(f, "missing -registerEvent"),
            MainError::InvalidPort(v) => write!(f, "invalid port '{}'", v),
            MainError::PluginError(e) => write!(f, "plugin error: {e:#}"),
        }
    }
}

fn main() -> ExitCode {
    let config = Config::load().unwrap_or_else(|e| {
        eprintln!("{e}, using defaults");
        Config::default()
    });

    let logger: Arc<dyn ActionLog> = match FileLogger::from_appdata(PLUGIN_UUID, config.log_level) {
        Ok(l) => Arc::new(l),
        Err(e) => {
            eprintln!("Failed to initialize logger: {e}");
            return ExitCode::from(1);
        }
    };

    std::panic::set_hook({
        let logger = Arc::clone(&logger);
        Box::new(move |info| {
            let msg = if let Some(s) = info.payload().downcast_ref::<&str>() {
                *s
            } else if let Some(s) = info.payload().downcast_ref::<String>() {
                s.as_str()
            } else {
                "unknown panic"
            };
            error!(logger, "💥 panic: {} at {:?}", msg, info.location());
        })
    });

    match run(config, logger.clone()) {
        Ok(()) => {
            info!(logger, "Plugin exited successfully.");
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!(logger, "fatal: {err}");
            match err {
                MainError::MissingPort => ExitCode::from(2),
                MainError::MissingPluginUUID => ExitCode::from(3),
                MainError::MissingRegisterEvent => ExitCode::from(4),
                MainError::InvalidPort(_) | MainError::PluginError(_) => ExitCode::from(5),
            }
        }
    }
}

fn run(config: Config, logger: Arc<dyn ActionLog>) -> Result<(), MainError> {
    let argv: Vec<String> = env::args().collect();
    let args = parse_launch_args(&argv).map_err(|e| {
        eprintln!("Usage: plugin -port <PORT> -pluginUUID <UUID> -registerEvent <EVENT> [-info <JSON>]");
        e
    })?;

    info!(
        logger,
        "Starting uuid={} registerEvent={} port={}",
        args.plugin_uuid,
        args.register_event,
        args.port
    );

    plugin::run(&args, config, logger).map_err(MainError::PluginError)
}

fn parse_launch_args(argv: &[String]) -> Result<LaunchArgs, MainError> {
    let port_str = value_after(argv, "-port").ok_or(MainError::MissingPort)?;
    let plugin_uuid = value_after(argv, "-pluginUUID").ok_or(MainError::MissingPluginUUID)?;
    let register_event = value_after(argv, "-registerEvent").ok_or(
        MainError::MissingRegisterEvent
    )?;

    let port = port_str.parse::<u16>().map_err(|_| MainError::InvalidPort(port_str.to_string()))?;

    Ok(LaunchArgs {
        port,
        plugin_uuid: plugin_uuid.to_string(),
        register_event: register_event.to_string(),
    })
}

fn value_after<'a>(argv: &'a [String], flag: &str) -> Option<&'a str> {
    argv.iter()
        .position(|a| a == flag)
        .and_then(|i| argv.get(i + 1))
        .map(|s| s.as_str())
}
