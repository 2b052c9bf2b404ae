//! Wires the `log` facade to syslog, facility `LOG_CRON`, the way any
//! traditional cron daemon reports job activity and errors to the system
//! log rather than to a terminal nobody is watching.

use log::LevelFilter;
use syslog::{BasicLogger, Facility, Formatter3164};

/// Initializes the global logger. Falls back to stderr (via `env_logger`'s
/// simpler cousin, a direct `eprintln!`) if the syslog socket can't be
/// opened, since a daemon that can't log its own startup failure is
/// useless for debugging that failure.
pub fn init(ident: &str) {
    let formatter = Formatter3164 {
        facility: Facility::LOG_CRON,
        hostname: None,
        process: ident.to_string(),
        pid: std::process::id() as i32,
    };

    match syslog::unix(formatter) {
        Ok(writer) => {
            let logger = BasicLogger::new(writer);
            if let Err(e) = log::set_boxed_logger(Box::new(logger)) {
                eprintln!("{ident}: failed to install the syslog logger: {e}");
            }
            log::set_max_level(LevelFilter::Info);
        }
        Err(e) => {
            eprintln!("{ident}: can't open syslog, logging to stderr instead: {e}");
            let _ = env_logger_fallback();
        }
    }
}

/// A minimal stderr logger used only when syslog is unreachable (e.g. when
/// developing outside of a real init system).
fn env_logger_fallback() -> Result<(), log::SetLoggerError> {
    struct StderrLogger;
    impl log::Log for StderrLogger {
        fn enabled(&self, metadata: &log::Metadata) -> bool {
            metadata.level() <= LevelFilter::Info
        }
        fn log(&self, record: &log::Record) {
            if self.enabled(record.metadata()) {
                eprintln!("{}: {}", record.level(), record.args());
            }
        }
        fn flush(&self) {}
    }
    log::set_boxed_logger(Box::new(StderrLogger))?;
    log::set_max_level(LevelFilter::Info);
    Ok(())
}
