//! The `Job` record and the predicates the next-fire algorithm uses to
//! decide whether a given date is valid for a job.

use chrono::{DateTime, Local};
use nix::unistd::Pid;

use crate::field::Field;

/// One scheduled crontab entry.
#[derive(Debug, Clone)]
pub struct Job {
    pub minutes: Field,
    pub hours: Field,
    pub mdays: Field,
    pub months: Field,
    pub wdays: Field,
    /// Next planned firing instant, in local time. Only meaningful after
    /// `Scheduler::update_job` has run at least once for this job.
    pub time: Option<DateTime<Local>>,
    pub command: String,
    /// pid of the currently running child, `None` if idle.
    pub pid: Option<Pid>,
    /// 1-based line number in the crontab, for diagnostics.
    pub lineno: u32,
}

impl Job {
    pub fn new(lineno: u32, command: String) -> Self {
        Job {
            minutes: Field::EMPTY,
            hours: Field::EMPTY,
            mdays: Field::EMPTY,
            months: Field::EMPTY,
            wdays: Field::EMPTY,
            time: None,
            command,
            pid: None,
            lineno,
        }
    }

    pub fn is_running(&self) -> bool {
        self.pid.is_some()
    }

    /// day-of-month-or-day-of-week disjunction, AND month.
    pub fn valid_date(&self, mday: u8, wday: u8, month: u8) -> bool {
        (self.mdays.is_set(mday) || self.wdays.is_set(wday)) && self.months.is_set(month)
    }

    pub fn valid_hour(&self, hour: u8) -> bool {
        self.hours.is_set(hour)
    }
}
