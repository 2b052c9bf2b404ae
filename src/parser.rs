//! Crontab lexer/parser.
//!
//! Transforms crontab file contents into a sequence of [`Job`] records,
//! per the five-field grammar:
//!
//! ```text
//! field  := range ("," range)*
//! range  := "*" ( "/" number )?
//!        |  value ( "-" value ( "/" number )? )?
//! value  := number | alias
//! ```
//!
//! Aliases are case-insensitive three-letter month/weekday abbreviations,
//! parsed with `strum`'s derived `FromStr` rather than a hand-rolled
//! string table — the idiomatic way to do enum-from-string conversion in
//! a codebase that already pulls in `strum` for its derive macros.

use std::str::FromStr;

use strum::EnumString;

use crate::errors::CronError;
use crate::field::Field;
use crate::job::Job;

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString)]
#[strum(ascii_case_insensitive)]
enum MonthAlias {
    Jan,
    Feb,
    Mar,
    Apr,
    May,
    Jun,
    Jul,
    Aug,
    Sep,
    Oct,
    Nov,
    Dec,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString)]
#[strum(ascii_case_insensitive)]
enum WeekdayAlias {
    Sun,
    Mon,
    Tue,
    Wed,
    Thu,
    Fri,
    Sat,
}

/// Which alias table (if any) a field's `value` production may draw from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Aliases {
    None,
    Month,
    Weekday,
}

impl Aliases {
    /// Tries to match a 3-letter alias at the start of `text`, returning
    /// the alias's ordinal and its byte length (always 3 when matched).
    fn try_match(&self, text: &str) -> Option<u32> {
        if text.len() < 3 {
            return None;
        }
        let prefix = &text[..3];
        match self {
            Aliases::None => None,
            Aliases::Month => MonthAlias::from_str(prefix).ok().map(|m| m as u32),
            Aliases::Weekday => WeekdayAlias::from_str(prefix).ok().map(|w| w as u32),
        }
    }
}

/// Cursor over a single crontab line, mirroring the `text`/`eol` pointer
/// pair of the original parser: scratch state that does not outlive the
/// line it parses.
struct LineCursor<'a> {
    text: &'a str,
    pos: usize,
}

impl<'a> LineCursor<'a> {
    fn new(text: &'a str) -> Self {
        LineCursor { text, pos: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.text[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn eat_char(&mut self, c: char) -> bool {
        if self.peek() == Some(c) {
            self.pos += c.len_utf8();
            true
        } else {
            false
        }
    }

    /// Consumes one or more horizontal whitespace characters. Returns an
    /// error if there isn't at least one.
    fn skip_space(&mut self) -> Result<(), &'static str> {
        if !matches!(self.peek(), Some(' ') | Some('\t') | Some('\r')) {
            return Err("expected whitespace between fields");
        }
        while matches!(self.peek(), Some(' ') | Some('\t') | Some('\r')) {
            self.pos += 1;
        }
        Ok(())
    }

    fn parse_number(&mut self) -> Result<u32, &'static str> {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            self.pos += 1;
        }
        if self.pos == start {
            return Err("expected a number");
        }
        self.text[start..self.pos]
            .parse::<u32>()
            .map_err(|_| "number too large")
    }

    fn parse_value(&mut self, aliases: Aliases) -> Result<u32, &'static str> {
        if matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            return self.parse_number();
        }
        if let Some(ordinal) = aliases.try_match(self.rest()) {
            self.pos += 3;
            return Ok(ordinal);
        }
        Err("expected a number or a recognized alias")
    }
}

/// Parses one field's range list (everything up to the next
/// field-separating whitespace) into a [`Field`] bitset.
fn parse_field(
    cursor: &mut LineCursor<'_>,
    min: u8,
    max: u8,
    aliases: Aliases,
) -> Result<Field, String> {
    let mut field = Field::EMPTY;
    loop {
        parse_range(cursor, min, max, aliases, &mut field)?;
        if !cursor.eat_char(',') {
            break;
        }
    }
    cursor.skip_space().map_err(|e| e.to_string())?;
    Ok(field)
}

fn parse_range(
    cursor: &mut LineCursor<'_>,
    min: u8,
    max: u8,
    aliases: Aliases,
    field: &mut Field,
) -> Result<(), String> {
    if cursor.eat_char('*') {
        if cursor.eat_char('/') {
            let step = cursor.parse_number().map_err(|e| e.to_string())?;
            if step < 1 {
                return Err("step cannot be zero".to_string());
            }
            let mut v = min as u32;
            while v <= max as u32 {
                field.set(v as u8);
                v += step;
            }
        }
        // A bare "*" with no step expands to the empty set; the
        // unrestricted-field coercion fills it in afterwards.
        return Ok(());
    }

    let first = cursor.parse_value(aliases).map_err(|e| e.to_string())?;
    let mut last = first;
    let mut step = 1u32;
    if cursor.eat_char('-') {
        last = cursor.parse_value(aliases).map_err(|e| e.to_string())?;
        if cursor.eat_char('/') {
            step = cursor.parse_number().map_err(|e| e.to_string())?;
        }
    }

    if first > last {
        return Err(format!("range start {first} is greater than end {last}"));
    }
    if first < min as u32 {
        return Err(format!("value {first} is below the minimum {min}"));
    }
    if last > max as u32 {
        return Err(format!("value {last} is above the maximum {max}"));
    }
    if step < 1 {
        return Err("step cannot be zero".to_string());
    }

    let mut v = first;
    while v <= last {
        field.set(v as u8);
        v += step;
    }
    Ok(())
}

/// Parses a single non-empty, non-comment crontab line into a [`Job`].
/// Returns `Ok(None)` for blank lines and comments, `Err` for malformed
/// lines (the caller logs and skips these).
pub fn parse_line(lineno: u32, line: &str) -> Result<Option<Job>, CronError> {
    let trimmed_start = line.trim_start_matches([' ', '\t']);
    if trimmed_start.is_empty() || trimmed_start.starts_with('#') {
        return Ok(None);
    }

    let mut cursor = LineCursor::new(trimmed_start);

    let minutes = parse_field(&mut cursor, 0, 59, Aliases::None)
        .map_err(|reason| CronError::InvalidPattern { lineno, reason })?;
    let hours = parse_field(&mut cursor, 0, 23, Aliases::None)
        .map_err(|reason| CronError::InvalidPattern { lineno, reason })?;
    let mdays = parse_field(&mut cursor, 1, 31, Aliases::None)
        .map_err(|reason| CronError::InvalidPattern { lineno, reason })?;
    let months = parse_field(&mut cursor, 0, 11, Aliases::Month)
        .map_err(|reason| CronError::InvalidPattern { lineno, reason })?;
    let mut wdays = parse_field(&mut cursor, 0, 7, Aliases::Weekday)
        .map_err(|reason| CronError::InvalidPattern { lineno, reason })?;

    let command = cursor.rest().trim_end_matches(['\r', '\n']).to_string();
    if command.is_empty() {
        return Err(CronError::InvalidPattern {
            lineno,
            reason: "command cannot be empty".to_string(),
        });
    }

    // Fold the Sunday alias (bit 7) into bit 0, then apply the
    // unrestricted-field coercions.
    wdays.fold_bit(7, 0);

    let mut job = Job::new(lineno, command);
    job.minutes = if minutes.is_empty() {
        Field::fill(0, 59)
    } else {
        minutes
    };
    job.hours = if hours.is_empty() {
        Field::fill(0, 23)
    } else {
        hours
    };
    job.months = if months.is_empty() {
        Field::fill(0, 11)
    } else {
        months
    };
    job.wdays = wdays;
    job.mdays = if mdays.is_empty() && wdays.is_empty() {
        Field::fill(1, 31)
    } else {
        mdays
    };

    Ok(Some(job))
}

/// Parses the full contents of a crontab file into a job table. Malformed
/// lines are logged at `warn` level and skipped; parsing continues.
pub fn parse_str(contents: &str, source: &str) -> Vec<Job> {
    let mut jobs = Vec::new();
    for (idx, line) in contents.lines().enumerate() {
        let lineno = idx as u32 + 1;
        match parse_line(lineno, line) {
            Ok(Some(job)) => jobs.push(job),
            Ok(None) => {}
            Err(e) => {
                log::warn!("{source}:{lineno}: ignoring line: {e}");
            }
        }
    }
    jobs
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ok(line: &str) -> Job {
        parse_line(1, line).unwrap().unwrap()
    }

    #[test]
    fn comment_and_blank_lines_produce_no_job() {
        assert!(parse_line(1, "# a comment").unwrap().is_none());
        assert!(parse_line(1, "").unwrap().is_none());
        assert!(parse_line(1, "   ").unwrap().is_none());
        assert!(parse_line(1, "  # indented comment").unwrap().is_none());
    }

    #[test]
    fn bare_star_is_unrestricted() {
        let job = parse_ok("* * * * * echo hi");
        assert_eq!(job.minutes, Field::fill(0, 59));
        assert_eq!(job.hours, Field::fill(0, 23));
        assert_eq!(job.months, Field::fill(0, 11));
        assert_eq!(job.mdays, Field::fill(1, 31));
        assert_eq!(job.command, "echo hi");
    }

    #[test]
    fn stepped_wildcard() {
        let job = parse_ok("*/15 * * * * run");
        for m in [0u8, 15, 30, 45] {
            assert!(job.minutes.is_set(m));
        }
        assert!(!job.minutes.is_set(1));
    }

    #[test]
    fn month_and_weekday_aliases_are_case_insensitive() {
        let job = parse_ok("0 0 1 jan,apr,jul,oct * run");
        for m in [0u8, 3, 6, 9] {
            assert!(job.months.is_set(m));
        }
        let job2 = parse_ok("0 9 * * Mon-Fri run");
        for d in 1u8..=5 {
            assert!(job2.wdays.is_set(d));
        }
        assert!(!job2.wdays.is_set(0));
        assert!(!job2.wdays.is_set(6));
    }

    #[test]
    fn weekday_seven_aliases_to_sunday() {
        let job = parse_ok("0 0 * * 7 run");
        assert!(job.wdays.is_set(0));
        assert!(job.wdays.is_set(7));
    }

    #[test]
    fn mdays_unrestricted_only_when_wdays_also_empty() {
        let job = parse_ok("0 0 * * 1 run");
        // wdays has Monday set, so mdays should NOT be coerced to all-ones.
        assert!(job.mdays.is_empty());
        let job2 = parse_ok("0 0 * * * run");
        assert_eq!(job2.mdays, Field::fill(1, 31));
    }

    #[test]
    fn out_of_range_minute_is_rejected() {
        let err = parse_line(1, "60 * * * * echo x").unwrap_err();
        assert!(matches!(err, CronError::InvalidPattern { lineno: 1, .. }));
    }

    #[test]
    fn empty_command_is_rejected() {
        let err = parse_line(1, "* * * * *").unwrap_err();
        assert!(matches!(err, CronError::InvalidPattern { .. }));
    }

    #[test]
    fn unrecognized_alias_is_rejected() {
        let err = parse_line(1, "0 0 1 xyz * run").unwrap_err();
        assert!(matches!(err, CronError::InvalidPattern { .. }));
    }

    #[test]
    fn reversed_range_is_rejected() {
        let err = parse_line(1, "10-5 * * * * run").unwrap_err();
        assert!(matches!(err, CronError::InvalidPattern { .. }));
    }

    #[test]
    fn parse_str_skips_bad_lines_and_keeps_going() {
        let contents = "60 * * * * bad\n*/5 * * * * good\n";
        let jobs = parse_str(contents, "test");
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].command, "good");
    }
}
