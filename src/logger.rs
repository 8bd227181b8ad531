use std::{
    fmt,
    fs::{ self, File, OpenOptions },
    io::Write,
    path::Path,
    sync::{ Arc, Mutex },
};

use chrono::Local;
use directories::BaseDirs;
use serde::{ Deserialize, Serialize };

const MAX_LOG_ROTATIONS: usize = 3;

#[macro_export]
macro_rules! log {
    ($logger:expr, $level:expr, $($arg:tt)*) => {
        {
            $logger.log($level, &format!($($arg)*));
        }
    };
}

#[macro_export]
macro_rules! debug {
    ($logger:expr, $($arg:tt)*) => {
        $crate::log!($logger, $crate::logger::Level::Debug, $($arg)*)
    };
}

#[macro_export]
macro_rules! info {
    ($logger:expr, $($arg:tt)*) => {
        $crate::log!($logger, $crate::logger::Level::Info, $($arg)*)
    };
}

#[macro_export]
macro_rules! warn {
    ($logger:expr, $($arg:tt)*) => {
        $crate::log!($logger, $crate::logger::Level::Warn, $($arg)*)
    };
}

#[macro_export]
macro_rules! error {
    ($logger:expr, $($arg:tt)*) => {
        $crate::log!($logger, $crate::logger::Level::Error, $($arg)*)
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            Level::Debug => "DEBUG",
            Level::Info => "INFO",
            Level::Warn => "WARN",
            Level::Error => "ERROR",
        };
        f.pad(tag)
    }
}

pub trait ActionLog: Send + Sync {
    fn log(&self, level: Level, message: &str);
}

pub struct FileLogger {
    file: Arc<Mutex<File>>,
    min_level: Level,
}

impl FileLogger {
    pub fn init<P: AsRef<Path>>(path: P, min_level: Level) -> Result<Self, String> {
        let path_buf = path.as_ref().to_path_buf();
        Self::rotate_logs(&path_buf)?;

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path_buf)
            .map_err(|e| format!("Failed to open log file: {e}"))?;

        Ok(Self {
            file: Arc::new(Mutex::new(file)),
            min_level,
        })
    }

    pub fn from_appdata(plugin_uuid: &str, min_level: Level) -> Result<Self, String> {
        let base = BaseDirs::new().ok_or("Could not find user data directory")?;
        let log_dir = base.data_dir().join(plugin_uuid);

        fs::create_dir_all(&log_dir).map_err(|e| format!("Failed to create log directory: {e}"))?;

        Self::init(log_dir.join("plugin.log"), min_level)
    }

    fn rotate_logs(base_path: &Path) -> Result<(), String> {
        for i in (1..=MAX_LOG_ROTATIONS).rev() {
            let src = base_path.with_extension(format!("{i}.log"));
            let dst = base_path.with_extension(format!("{}.log", i + 1));
            if src.exists() {
                if i == MAX_LOG_ROTATIONS {
                    fs::remove_file(&src).map_err(|e| format!("Failed to remove old log: {e}"))?;
                } else {
                    fs::rename(&src, &dst).map_err(|e| format!("Failed to rotate log: {e}"))?;
                }
            }
        }

        if base_path.exists() {
            let rotated = base_path.with_extension("1.log");
            fs::rename(base_path, rotated).map_err(|e| format!("Failed to archive log: {e}"))?;
        }

        Ok(())
    }
}

impl ActionLog for FileLogger {
    fn log(&self, level: Level, message: &str) {
        if level < self.min_level {
            return;
        }
        let timestamp = Local::now().format("[%Y-%m-%d %H:%M:%S]").to_string();
        let formatted = format!("{timestamp} {level:<5} {message}\n");

        match self.file.lock() {
            Ok(mut file) => {
                if let Err(e) = file.write_all(formatted.as_bytes()) {
                    eprintln!("Failed to write to log file: {e}");
                }
            }
            Err(_) => eprint!("{formatted}"),
        }
    }
}
