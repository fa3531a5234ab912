//! The engine's event log: a console channel writing to stderr and a
//! database channel persisting into `role_manager_logs`. Each channel has
//! its own minimum level, adjustable at runtime.
//!
//! This is the audit/event log of the engine, not its internal diagnostics;
//! those go through the `log` macro facade and whatever subscriber the host
//! application installs.

use std::sync::atomic::{AtomicU8, Ordering};

use serde::{Deserialize, Serialize};
use tokio_postgres::GenericClient;


/// Log levels, ordered from least to most severe.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Debug,
    Info,
    Notice,
    Warning,
    Error,
    Critical,
    Alert,
    Fatal,
}

impl Level {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Notice => "notice",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Critical => "critical",
            Self::Alert => "alert",
            Self::Fatal => "fatal",
        }
    }

    fn from_u8(v: u8) -> Self {
        match v {
            0 => Self::Debug,
            1 => Self::Info,
            2 => Self::Notice,
            3 => Self::Warning,
            4 => Self::Error,
            5 => Self::Critical,
            6 => Self::Alert,
            _ => Self::Fatal,
        }
    }
}

impl std::fmt::Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

impl std::str::FromStr for Level {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "notice" => Ok(Self::Notice),
            "warning" => Ok(Self::Warning),
            "error" => Ok(Self::Error),
            "critical" => Ok(Self::Critical),
            "alert" => Ok(Self::Alert),
            "fatal" => Ok(Self::Fatal),
            other => Err(format!("invalid log level '{other}'")),
        }
    }
}


#[derive(Debug, confique::Config)]
pub struct LogConfig {
    /// Minimum level of events printed to stderr.
    #[config(default = "notice")]
    pub console_level: Level,

    /// Minimum level of events persisted into `role_manager_logs`.
    #[config(default = "warning")]
    pub db_level: Level,
}


/// The event logger. Cheap to share: level changes are atomic, and the
/// database handle is passed per call so the logger works inside and outside
/// of transactions alike.
pub struct Logger {
    console_level: AtomicU8,
    db_level: AtomicU8,
}

impl Logger {
    pub(crate) fn new(console_level: Level, db_level: Level) -> Self {
        Self {
            console_level: AtomicU8::new(console_level as u8),
            db_level: AtomicU8::new(db_level as u8),
        }
    }

    pub fn console_level(&self) -> Level {
        Level::from_u8(self.console_level.load(Ordering::Relaxed))
    }

    pub fn db_level(&self) -> Level {
        Level::from_u8(self.db_level.load(Ordering::Relaxed))
    }

    pub fn set_console_level(&self, level: Level) {
        self.console_level.store(level as u8, Ordering::Relaxed);
    }

    pub fn set_db_level(&self, level: Level) {
        self.db_level.store(level as u8, Ordering::Relaxed);
    }

    /// Logs one event. Console output goes to stderr if `level` passes the
    /// console filter; the event is persisted if `level` passes the database
    /// filter or `force_db` is set. A failing database write never
    /// propagates: correctness of the calling operation must not depend on
    /// the log, so the failure itself is reported on stderr instead.
    pub async fn log(
        &self,
        db: &impl GenericClient,
        level: Level,
        message: &str,
        context: Option<&serde_json::Value>,
        force_db: bool,
    ) {
        if level >= self.console_level() {
            let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S.%3f");
            match context {
                Some(ctx) => eprintln!("{timestamp} {level:8} {message} {ctx}"),
                None => eprintln!("{timestamp} {level:8} {message}"),
            }
        }

        if force_db || level >= self.db_level() {
            let result = db.execute(
                "insert into role_manager_logs (level, message, context) \
                    values ($1, $2, $3)",
                &[&level.as_str(), &message, &context],
            ).await;

            if let Err(e) = result {
                eprintln!("failed to write log entry to database: {e}");
            }
        }
    }

    pub async fn debug(&self, db: &impl GenericClient, message: &str) {
        self.log(db, Level::Debug, message, None, false).await;
    }

    pub async fn info(&self, db: &impl GenericClient, message: &str) {
        self.log(db, Level::Info, message, None, false).await;
    }

    pub async fn notice(&self, db: &impl GenericClient, message: &str) {
        self.log(db, Level::Notice, message, None, false).await;
    }

    pub async fn warning(&self, db: &impl GenericClient, message: &str) {
        self.log(db, Level::Warning, message, None, false).await;
    }

    pub async fn error(&self, db: &impl GenericClient, message: &str) {
        self.log(db, Level::Error, message, None, false).await;
    }

    pub async fn critical(&self, db: &impl GenericClient, message: &str) {
        self.log(db, Level::Critical, message, None, false).await;
    }

    pub async fn alert(&self, db: &impl GenericClient, message: &str) {
        self.log(db, Level::Alert, message, None, false).await;
    }

    pub async fn fatal(&self, db: &impl GenericClient, message: &str) {
        self.log(db, Level::Fatal, message, None, false).await;
    }
}


#[cfg(test)]
mod tests {
    use super::Level;

    #[test]
    fn levels_are_totally_ordered() {
        let levels = [
            Level::Debug,
            Level::Info,
            Level::Notice,
            Level::Warning,
            Level::Error,
            Level::Critical,
            Level::Alert,
            Level::Fatal,
        ];
        for pair in levels.windows(2) {
            assert!(pair[0] < pair[1], "{:?} should be below {:?}", pair[0], pair[1]);
        }
    }

    #[test]
    fn level_string_round_trip() {
        for s in ["debug", "info", "notice", "warning", "error", "critical", "alert", "fatal"] {
            let level: Level = s.parse().unwrap();
            assert_eq!(level.as_str(), s);
        }
        assert!("warn".parse::<Level>().is_err());
        assert!("".parse::<Level>().is_err());
    }

    #[test]
    fn from_u8_matches_discriminants() {
        for v in 0..=7u8 {
            assert_eq!(Level::from_u8(v) as u8, v);
        }
    }
}
