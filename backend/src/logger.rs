use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Mutex, OnceLock};

use tracing_subscriber::EnvFilter;

/// Log levels representing increasing verbosity.
///
/// Setting a level enables that level and all less verbose levels below it:
///
/// - **Silent (0)**: No logging output
/// - **Error (1)**: Only error messages
/// - **Warn (2)**: Warning and error messages
/// - **Info (3)**: Informational, warning, and error messages (default)
/// - **Debug (4)**: All messages, including each missing alignment found while parsing
///
/// The level is read from the `LOG_LEVEL` environment variable, or set at runtime
/// with `set_log_level()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    Silent = 0,
    Error = 1,
    Warn = 2,
    Info = 3,
    Debug = 4,
}

impl Level {
    /// Parse a log level from a string (case insensitive)
    ///
    /// Valid values: "silent", "error", "warn", "info", "debug"
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "silent" => Some(Level::Silent),
            "error" => Some(Level::Error),
            "warn" => Some(Level::Warn),
            "info" => Some(Level::Info),
            "debug" => Some(Level::Debug),
            _ => None,
        }
    }

    /// `EnvFilter` directive used when `RUST_LOG` is not set.
    pub fn filter_directive(&self) -> &'static str {
        match self {
            Level::Silent => "off",
            Level::Error => "error",
            Level::Warn => "warn",
            Level::Info => "info",
            Level::Debug => "debug",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Silent => "Silent",
            Level::Error => "Error",
            Level::Warn => "Warn",
            Level::Info => "Info",
            Level::Debug => "Debug",
        }
    }
}

pub struct Logger {
    /// Append-only log file, from `TEI_READER_LOG_FILE`.
    log_file: Option<PathBuf>,
    level: Mutex<Level>,
}

impl Logger {
    pub fn new() -> Self {
        let log_file = std::env::var("TEI_READER_LOG_FILE")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from);

        let level = std::env::var("LOG_LEVEL")
            .ok()
            .and_then(|v| Level::from_str(&v))
            .unwrap_or(Level::Info);

        Logger {
            log_file,
            level: Mutex::new(level),
        }
    }

    /// Install the global tracing subscriber. The library never calls this itself,
    /// binaries do it once at startup.
    pub fn init_tracing() -> Result<(), Box<dyn std::error::Error>> {
        let env_filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(get_log_level().filter_directive()));

        let subscriber = tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .with_file(false)
            .with_line_number(false)
            .with_writer(std::io::stderr)
            .finish();

        tracing::subscriber::set_global_default(subscriber)?;

        Ok(())
    }

    fn enabled(&self, at: Level) -> bool {
        self.get_level() >= at
    }

    fn write_to_file(&self, message: &str) -> Result<(), Box<dyn std::error::Error>> {
        let Some(log_file) = &self.log_file else {
            return Ok(());
        };

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_file)?;

        let timestamp = chrono::Utc::now().format("%Y-%m-%d %H:%M:%S%.3fZ");
        let log_line = format!("[{}] {}\n", timestamp, message);

        file.write_all(log_line.as_bytes())?;

        Ok(())
    }

    fn file_line(&self, prefix: &str, msg: &str) {
        if let Err(e) = self.write_to_file(&format!("{}: {}", prefix, msg)) {
            eprintln!("Failed to write to log file: {}", e);
        }
    }

    pub fn debug(&self, msg: &str) {
        if !self.enabled(Level::Debug) {
            return;
        }
        tracing::debug!("{}", msg);
        self.file_line("DEBUG", msg);
    }

    pub fn info(&self, msg: &str) {
        if !self.enabled(Level::Info) {
            return;
        }
        tracing::info!("{}", msg);
        self.file_line("INFO", msg);
    }

    pub fn warn(&self, msg: &str) {
        if !self.enabled(Level::Warn) {
            return;
        }
        tracing::warn!("{}", msg);
        self.file_line("WARN", msg);
    }

    pub fn error(&self, msg: &str) {
        if !self.enabled(Level::Error) {
            return;
        }
        tracing::error!("{}", msg);
        self.file_line("ERROR", msg);
    }

    /// If the lock is poisoned, returns Level::Info.
    pub fn get_level(&self) -> Level {
        self.level.lock().map(|l| *l).unwrap_or(Level::Info)
    }

    pub fn set_level(&self, new_level: Level) {
        if let Ok(mut level) = self.level.lock() {
            *level = new_level;
        }
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::new()
    }
}

pub static LOGGER: OnceLock<Logger> = OnceLock::new();

fn with_logger<F, R>(f: F) -> R
where
    F: FnOnce(&Logger) -> R,
{
    f(LOGGER.get_or_init(Logger::new))
}

pub fn init_tracing() {
    if let Err(e) = Logger::init_tracing() {
        eprintln!("Failed to initialize tracing: {}", e);
    }
}

pub fn debug(msg: &str) {
    with_logger(|logger| logger.debug(msg));
}

pub fn info(msg: &str) {
    with_logger(|logger| logger.info(msg));
}

pub fn warn(msg: &str) {
    with_logger(|logger| logger.warn(msg));
}

pub fn error(msg: &str) {
    with_logger(|logger| logger.error(msg));
}

pub fn get_log_level() -> Level {
    with_logger(|logger| logger.get_level())
}

pub fn set_log_level(level: Level) {
    with_logger(|logger| logger.set_level(level));
}

/// Set the log level from a string (case insensitive).
///
/// Returns true if successful, false if the string is not a valid level.
pub fn set_log_level_str(level_str: &str) -> bool {
    if let Some(level) = Level::from_str(level_str) {
        set_log_level(level);
        true
    } else {
        false
    }
}
