//! JSON structured logging implementation for titlekit

use chrono::{Local, Utc};
use log::{Level, Log, Metadata, Record};
use serde_json::json;
use std::env;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::sync::Mutex;

/// Environment variable selecting the log level (`debug`, `json:trace`, ...)
pub const LOG_LEVEL_ENV: &str = "TITLEKIT_LOG_LEVEL";

/// Environment variable naming a file that JSON log lines are appended to
pub const LOG_PATH_ENV: &str = "TITLEKIT_LOG_PATH";

/// JSON logger implementation
#[derive(Debug)]
pub struct JsonLogger {
    level: Level,
    target_file: Mutex<Option<std::fs::File>>,
}

/// Split a level string into (json mode, bare level)
fn parse_level_spec(level_str: &str) -> (bool, &str) {
    if let Some(stripped) = level_str.strip_prefix("json:") {
        (true, stripped)
    } else if level_str == "json" {
        (true, "info")
    } else {
        (false, level_str)
    }
}

fn parse_level_filter(level: &str) -> log::LevelFilter {
    match level {
        "trace" => log::LevelFilter::Trace,
        "debug" => log::LevelFilter::Debug,
        "info" => log::LevelFilter::Info,
        "warn" => log::LevelFilter::Warn,
        "error" => log::LevelFilter::Error,
        "off" => log::LevelFilter::Off,
        _ => log::LevelFilter::Warn,
    }
}

impl JsonLogger {
    /// Create a new JSON logger
    pub fn new(level: Level, log_path: Option<String>) -> Self {
        let target_file = if let Some(path) = log_path {
            OpenOptions::new().create(true).append(true).open(path).ok()
        } else {
            None
        };

        JsonLogger {
            level,
            target_file: Mutex::new(target_file),
        }
    }

    /// Initialize the logger with specified level and source
    pub fn init_with_level(level_str: &str, source: &str) -> (String, String) {
        let log_path = env::var(LOG_PATH_ENV).ok();
        let (use_json, actual_level) = parse_level_spec(level_str);

        if !use_json {
            env_logger::Builder::new()
                .filter_level(parse_level_filter(actual_level))
                .format(|buf, record| {
                    use std::io::Write;

                    write!(
                        buf,
                        "[{} {} {}] ",
                        Local::now().format("%Y-%m-%dT%H:%M:%S"),
                        record.level(),
                        record.target()
                    )?;
                    writeln!(buf, "{}", record.args())
                })
                .try_init()
                .ok();
            return (actual_level.to_string(), source.to_string());
        }

        let level = match parse_level_filter(actual_level).to_level() {
            Some(level) => level,
            None => return (actual_level.to_string(), source.to_string()),
        };

        let logger = Box::new(JsonLogger::new(level, log_path));

        if let Err(e) = log::set_boxed_logger(logger) {
            eprintln!("Failed to initialize JSON logger: {e}");
            return (actual_level.to_string(), source.to_string());
        }

        log::set_max_level(level.to_level_filter());
        (actual_level.to_string(), source.to_string())
    }

    /// Initialize from `TITLEKIT_LOG_LEVEL`, defaulting to warnings only
    pub fn init() {
        let log_level = env::var(LOG_LEVEL_ENV).unwrap_or_else(|_| "warn".to_string());
        Self::init_with_level(&log_level, LOG_LEVEL_ENV);
    }

    fn write_line(&self, line: &str) {
        if let Ok(mut file_guard) = self.target_file.lock() {
            if let Some(ref mut file) = *file_guard {
                let _ = file.write_all(line.as_bytes());
                let _ = file.flush();
                return;
            }
        }
        let _ = io::stderr().write_all(line.as_bytes());
        let _ = io::stderr().flush();
    }
}

impl Log for JsonLogger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let log_entry = json!({
            "@timestamp": Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Micros, true),
            "@level": record.level().to_string().to_lowercase(),
            "@message": record.args().to_string(),
            "@module": record.target(),
            "@pid": std::process::id(),
            "@file": record.file().unwrap_or("unknown"),
            "@line": record.line().unwrap_or(0),
        });

        let json_string = format!(
            "{}\n",
            serde_json::to_string(&log_entry).unwrap_or_default()
        );
        self.write_line(&json_string);
    }

    fn flush(&self) {
        if let Ok(mut file_guard) = self.target_file.lock() {
            if let Some(ref mut file) = *file_guard {
                let _ = file.flush();
            }
        }
        let _ = io::stderr().flush();
    }
}
