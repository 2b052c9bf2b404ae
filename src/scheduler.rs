//! The next-fire algorithm and job selection.
//!
//! `next_fire` is a direct translation of the original `update_job`: it
//! exploits `Field::first_set_at_or_after` to answer "smallest allowed
//! minute/hour >= k" in O(1), so the common case (today still has a valid
//! hour and minute left) needs no day-axis loop at all. The day axis is a
//! bounded loop because month/weekday constraints interact non-linearly
//! with calendar structure (there is no O(1) way to jump to "the next
//! valid day of week that's also a valid month").

use chrono::{DateTime, Datelike, Duration, Local, LocalResult, NaiveDate, NaiveDateTime,
    NaiveTime, TimeZone, Timelike};

use crate::calendar;
use crate::errors::CronError;
use crate::job::Job;

/// Computes the strict-next firing instant for `job` after `after`.
///
/// Returns `Err(CronError::LookaheadExceeded)` if no valid date is found
/// within `max_lookahead_days` day-advances; the caller is responsible for
/// evicting the job from its table in that case.
pub fn next_fire(
    job: &Job,
    after: &DateTime<Local>,
    max_lookahead_days: u32,
) -> Result<DateTime<Local>, CronError> {
    let year0 = after.year();
    let month0 = after.month0();
    let mday0 = after.day();
    let hour0 = after.hour();
    let minute0 = after.minute();
    let wday0 = after.weekday().num_days_from_sunday();

    let today_ok = job.valid_date(mday0 as u8, wday0 as u8, month0 as u8);

    // Minute axis: if today and this hour are both valid, try to stay
    // within the current hour.
    if today_ok && job.valid_hour(hour0 as u8) {
        if let Some(m) = job.minutes.first_set_at_or_after(minute0 as u8 + 1) {
            return build_local(year0, month0, mday0, hour0, m as u32);
        }
    }
    let minute = job.minutes.first_set() as u32;

    // Hour axis: if today is valid, try to stay within today.
    if today_ok {
        if let Some(h) = job.hours.first_set_at_or_after(hour0 as u8 + 1) {
            return build_local(year0, month0, mday0, h as u32, minute);
        }
    }
    let hour = job.hours.first_set() as u32;

    // Day axis: advance one day at a time until month/day-of-month-or-
    // weekday all line up.
    let mut year = year0;
    let mut month = month0;
    let mut mday = mday0;
    let mut wday = wday0;
    let mut lookahead = 0u32;
    loop {
        lookahead += 1;
        if lookahead > max_lookahead_days {
            return Err(CronError::LookaheadExceeded);
        }

        wday = (wday + 1) % 7;
        mday += 1;
        if mday > calendar::days_in_month(month, year) {
            mday = 1;
            month += 1;
            if month >= 12 {
                month = 0;
                year += 1;
            }
        }

        if job.valid_date(mday as u8, wday as u8, month as u8) {
            break;
        }
    }

    build_local(year, month, mday, hour, minute)
}

/// Recomposes local calendar fields into an absolute instant, resolving
/// DST ambiguity/gaps the way `mktime(&tm)` with `tm_isdst = -1` would: an
/// ambiguous local time (the "doubled hour" on fall-back) resolves to its
/// earliest candidate; a nonexistent local time (the "lost hour" on
/// spring-forward) is folded forward minute by minute until a valid local
/// time is found.
fn build_local(year: i32, month0: u32, mday: u32, hour: u32, minute: u32) -> Result<DateTime<Local>, CronError> {
    let date = NaiveDate::from_ymd_opt(year, month0 + 1, mday).ok_or(CronError::InvalidDate)?;
    let time = NaiveTime::from_hms_opt(hour, minute, 0).ok_or(CronError::InvalidDate)?;
    let naive = NaiveDateTime::new(date, time);
    resolve_local(naive)
}

fn resolve_local(naive: NaiveDateTime) -> Result<DateTime<Local>, CronError> {
    match Local.from_local_datetime(&naive) {
        LocalResult::Single(dt) => Ok(dt),
        LocalResult::Ambiguous(earliest, _latest) => Ok(earliest),
        LocalResult::None => {
            let mut candidate = naive;
            for _ in 0..240 {
                candidate = candidate
                    .checked_add_signed(Duration::minutes(1))
                    .ok_or(CronError::InvalidDate)?;
                if let LocalResult::Single(dt) = Local.from_local_datetime(&candidate) {
                    return Ok(dt);
                }
            }
            Err(CronError::InvalidDate)
        }
    }
}

/// Owns the in-memory job table and recomputes/selects fire times.
#[derive(Debug, Default)]
pub struct Scheduler {
    pub jobs: Vec<Job>,
}

impl Scheduler {
    pub fn new(jobs: Vec<Job>) -> Self {
        Scheduler { jobs }
    }

    /// Recomputes `self.jobs[idx].time`. Evicts the job (swap-with-last)
    /// if its schedule is unreachable within `max_lookahead_days`.
    pub fn update_job(&mut self, idx: usize, now: DateTime<Local>, max_lookahead_days: u32) {
        match next_fire(&self.jobs[idx], &now, max_lookahead_days) {
            Ok(time) => self.jobs[idx].time = Some(time),
            Err(CronError::LookaheadExceeded) => {
                let job = &self.jobs[idx];
                log::warn!(
                    "job '{}' (line {}) exceeded the maximum lookahead and will be ignored",
                    job.command,
                    job.lineno
                );
                self.jobs.swap_remove(idx);
            }
            Err(e) => {
                log::warn!(
                    "job (line {}) could not be scheduled: {e}",
                    self.jobs[idx].lineno
                );
            }
        }
    }

    /// Recomputes every job's fire time. Iterates back-to-front so that
    /// evicting job `i` (a swap with the last element) never skips the
    /// job that gets swapped into position `i`.
    pub fn update_all(&mut self, now: DateTime<Local>, max_lookahead_days: u32) {
        let mut idx = self.jobs.len();
        while idx > 0 {
            idx -= 1;
            self.update_job(idx, now, max_lookahead_days);
        }
    }

    /// Index of the job with the earliest `time`, or `None` if the table
    /// is empty or no job currently has a scheduled time.
    pub fn closest_job(&self) -> Option<usize> {
        self.jobs
            .iter()
            .enumerate()
            .filter_map(|(i, j)| j.time.map(|t| (i, t)))
            .min_by_key(|&(_, t)| t)
            .map(|(i, _)| i)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_line;
    use chrono::TimeZone;

    fn job_from(line: &str) -> Job {
        parse_line(1, line).unwrap().unwrap()
    }

    fn local(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    #[test]
    fn every_fifteen_minutes() {
        let job = job_from("*/15 * * * * run");
        let anchor = local(2024, 1, 1, 0, 0);
        let t1 = next_fire(&job, &anchor, 2000).unwrap();
        assert_eq!(t1, local(2024, 1, 1, 0, 15));
        let t2 = next_fire(&job, &t1, 2000).unwrap();
        assert_eq!(t2, local(2024, 1, 1, 0, 30));
        let t3 = next_fire(&job, &t2, 2000).unwrap();
        assert_eq!(t3, local(2024, 1, 1, 0, 45));
    }

    #[test]
    fn weekday_range_skips_weekend() {
        let job = job_from("0 9 * * Mon-Fri run");
        // 2024-06-08 is a Saturday.
        let anchor = local(2024, 6, 8, 10, 0);
        let t1 = next_fire(&job, &anchor, 2000).unwrap();
        assert_eq!(t1, local(2024, 6, 10, 9, 0)); // Monday
        let t2 = next_fire(&job, &t1, 2000).unwrap();
        assert_eq!(t2, local(2024, 6, 11, 9, 0));
        let t3 = next_fire(&job, &t2, 2000).unwrap();
        assert_eq!(t3, local(2024, 6, 12, 9, 0));
    }

    #[test]
    fn leap_day_only_schedule_skips_to_next_leap_year() {
        let job = job_from("30 2 29 2 * run");
        let anchor = local(2023, 3, 1, 0, 0);
        let t1 = next_fire(&job, &anchor, 2000).unwrap();
        assert_eq!(t1, local(2024, 2, 29, 2, 30));
        let t2 = next_fire(&job, &t1, 2000).unwrap();
        assert_eq!(t2, local(2028, 2, 29, 2, 30));
        let t3 = next_fire(&job, &t2, 2000).unwrap();
        assert_eq!(t3, local(2032, 2, 29, 2, 30));
    }

    #[test]
    fn quarterly_months_alias_list() {
        let job = job_from("0 0 1 jan,apr,jul,oct * run");
        let anchor = local(2024, 5, 15, 12, 0);
        let t1 = next_fire(&job, &anchor, 2000).unwrap();
        assert_eq!(t1, local(2024, 7, 1, 0, 0));
        let t2 = next_fire(&job, &t1, 2000).unwrap();
        assert_eq!(t2, local(2024, 10, 1, 0, 0));
        let t3 = next_fire(&job, &t2, 2000).unwrap();
        assert_eq!(t3, local(2025, 1, 1, 0, 0));
    }

    #[test]
    fn mday_and_wday_disjunction() {
        let job = job_from("0 0 1 * Mon run");
        // anchor is itself a Monday and the 1st; strict-greater-than
        // should move past it even though it satisfies the pattern.
        let anchor = local(2024, 1, 1, 0, 0);
        let t1 = next_fire(&job, &anchor, 2000).unwrap();
        assert_eq!(t1, local(2024, 1, 8, 0, 0));
        let t2 = next_fire(&job, &t1, 2000).unwrap();
        assert_eq!(t2, local(2024, 1, 15, 0, 0));
        let t3 = next_fire(&job, &t2, 2000).unwrap();
        assert_eq!(t3, local(2024, 1, 22, 0, 0));
    }

    #[test]
    fn mutually_exclusive_schedule_is_evicted_within_lookahead() {
        // Feb 31st never exists.
        let job = job_from("0 0 31 2 * run");
        let mut sched = Scheduler::new(vec![job]);
        let anchor = local(2023, 1, 1, 0, 0);
        sched.update_job(0, anchor, 2000);
        assert!(sched.jobs.is_empty());
    }

    #[test]
    fn next_fire_is_strictly_monotone() {
        let job = job_from("0 0 1 * Mon run");
        let mut t = local(2024, 1, 1, 0, 0);
        for _ in 0..10 {
            let next = next_fire(&job, &t, 2000).unwrap();
            assert!(next > t);
            t = next;
        }
    }

    #[test]
    fn closest_job_picks_minimum_time() {
        let mut a = job_from("0 12 * * * a");
        a.time = Some(local(2024, 1, 2, 0, 0));
        let mut b = job_from("0 12 * * * b");
        b.time = Some(local(2024, 1, 1, 0, 0));
        let sched = Scheduler::new(vec![a, b]);
        assert_eq!(sched.closest_job(), Some(1));
    }

    #[test]
    fn closest_job_none_on_empty_table() {
        let sched = Scheduler::new(vec![]);
        assert_eq!(sched.closest_job(), None);
    }
}
