//! Log routing for hosts without a `log` implementation.

use std::sync::{Arc, OnceLock};

/// Receiver for the crate's log output.
///
/// Hosts that do not use a `log` implementation of their own (mobile apps,
/// test harnesses) implement this and install it with [`set_logger`].
///
/// # Examples
///
/// ```rust
/// use backupkit_core::logger::{LogLevel, Logger};
///
/// struct StderrLogger;
///
/// impl Logger for StderrLogger {
///     fn log(&self, level: LogLevel, message: String) {
///         eprintln!("[{level:?}] {message}");
///     }
/// }
/// ```
pub trait Logger: Sync + Send {
    /// Logs a message at the specified level.
    fn log(&self, level: LogLevel, message: String);
}

/// Severity of a log message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    /// Very detailed messages, such as per-block offsets.
    Trace,
    /// Debugging information.
    Debug,
    /// Progress of an import or export.
    Info,
    /// Something was skipped or looked suspicious.
    Warn,
    /// An operation failed.
    Error,
}

/// Forwards `log` records to the installed [`Logger`].
struct HostLogger;

impl log::Log for HostLogger {
    fn enabled(&self, _metadata: &log::Metadata) -> bool {
        true
    }

    fn log(&self, record: &log::Record) {
        let from_backupkit = record
            .module_path()
            .is_some_and(|module_path| module_path.starts_with("backupkit"));

        // Debug and trace output of dependencies is noise for the host.
        if record.level() >= log::Level::Debug && !from_backupkit {
            return;
        }

        if let Some(logger) = LOGGER_INSTANCE.get() {
            logger.log(log_level(record.level()), format!("{}", record.args()));
        } else {
            eprintln!("Logger not set: {}", record.args());
        }
    }

    fn flush(&self) {}
}

const fn log_level(level: log::Level) -> LogLevel {
    match level {
        log::Level::Error => LogLevel::Error,
        log::Level::Warn => LogLevel::Warn,
        log::Level::Info => LogLevel::Info,
        log::Level::Debug => LogLevel::Debug,
        log::Level::Trace => LogLevel::Trace,
    }
}

static LOGGER_INSTANCE: OnceLock<Arc<dyn Logger>> = OnceLock::new();

/// Installs `logger` as the destination of the crate's log output.
///
/// Only the first call has an effect. If the process already has a `log`
/// implementation (a CLI using `tracing-subscriber`, for example) that one
/// keeps receiving the records and this call only reports the conflict.
pub fn set_logger(logger: Arc<dyn Logger>) {
    if LOGGER_INSTANCE.set(logger).is_err() {
        eprintln!("Logger already set");
        return;
    }

    if let Err(e) = init_logger() {
        eprintln!("Failed to set logger: {e}");
    }
}

fn init_logger() -> Result<(), log::SetLoggerError> {
    static LOGGER: HostLogger = HostLogger;
    log::set_logger(&LOGGER)?;
    log::set_max_level(log::LevelFilter::Trace);
    Ok(())
}
