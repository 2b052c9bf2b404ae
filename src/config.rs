//! Daemon configuration: compile-time defaults plus a builder so the
//! library crate can be exercised with alternate paths and tunables in
//! tests without relinking constants.
//!
//! Uses the same `derive_builder` owned-builder pattern common to
//! cron-pattern parsers in this ecosystem: a skipped `build_fn` so
//! `build()` can fill in defaults by hand instead of failing on missing
//! fields.

use derive_builder::Builder;

/// The crontab file that contains the job table. Absence is not an error.
pub const CRONTAB_PATH: &str = "/etc/crontab";
/// Shell used to run each job's command, invoked as `<shell> -c <command>`.
pub const SHELL_PATH: &str = "/bin/sh";
/// Program name the daemon identifies itself as in the system log.
pub const SYSLOG_IDENT: &str = "crond";

/// Minutes between forced wake-ups, even when the next job is far away.
/// Bounds how stale clock-change detection can get.
pub const WAKEUP_PERIOD_MINUTES: i64 = 60;
/// How many minutes past its scheduled time a job may still be run.
pub const CATCHUP_LIMIT_MINUTES: i64 = 60;
/// Day-advances the next-fire search may take before giving up and
/// evicting the job.
pub const MAX_LOOKAHEAD_DAYS: u32 = 2000;

#[derive(Debug, Clone, Builder)]
#[builder(default, build_fn(skip), pattern = "owned")]
pub struct DaemonConfig {
    pub crontab_path: String,
    pub shell_path: String,
    pub syslog_ident: String,
    pub wakeup_period_minutes: i64,
    pub catchup_limit_minutes: i64,
    pub max_lookahead_days: u32,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        DaemonConfig {
            crontab_path: CRONTAB_PATH.to_string(),
            shell_path: SHELL_PATH.to_string(),
            syslog_ident: SYSLOG_IDENT.to_string(),
            wakeup_period_minutes: WAKEUP_PERIOD_MINUTES,
            catchup_limit_minutes: CATCHUP_LIMIT_MINUTES,
            max_lookahead_days: MAX_LOOKAHEAD_DAYS,
        }
    }
}

impl DaemonConfig {
    pub fn builder() -> DaemonConfigBuilder {
        DaemonConfigBuilder::default()
    }
}

impl DaemonConfigBuilder {
    pub fn build(self) -> DaemonConfig {
        let DaemonConfigBuilder {
            crontab_path,
            shell_path,
            syslog_ident,
            wakeup_period_minutes,
            catchup_limit_minutes,
            max_lookahead_days,
        } = self;
        let default = DaemonConfig::default();
        DaemonConfig {
            crontab_path: crontab_path.unwrap_or(default.crontab_path),
            shell_path: shell_path.unwrap_or(default.shell_path),
            syslog_ident: syslog_ident.unwrap_or(default.syslog_ident),
            wakeup_period_minutes: wakeup_period_minutes.unwrap_or(default.wakeup_period_minutes),
            catchup_limit_minutes: catchup_limit_minutes.unwrap_or(default.catchup_limit_minutes),
            max_lookahead_days: max_lookahead_days.unwrap_or(default.max_lookahead_days),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_config_constants() {
        let cfg = DaemonConfig::default();
        assert_eq!(cfg.crontab_path, CRONTAB_PATH);
        assert_eq!(cfg.shell_path, SHELL_PATH);
        assert_eq!(cfg.wakeup_period_minutes, 60);
        assert_eq!(cfg.catchup_limit_minutes, 60);
        assert_eq!(cfg.max_lookahead_days, 2000);
    }

    #[test]
    fn builder_overrides_selected_fields() {
        let cfg = DaemonConfig::builder()
            .crontab_path("/tmp/test.crontab".to_string())
            .max_lookahead_days(10)
            .build();
        assert_eq!(cfg.crontab_path, "/tmp/test.crontab");
        assert_eq!(cfg.max_lookahead_days, 10);
        // Untouched fields keep their defaults.
        assert_eq!(cfg.shell_path, SHELL_PATH);
    }
}
