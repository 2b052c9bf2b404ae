//! A minimalist cron daemon.
//!
//! Reads a single crontab, computes each job's next firing instant, and
//! sleeps until either the nearest one is due or a signal arrives. See
//! [`daemon::Daemon`] for the main loop and [`parser::parse_str`] for the
//! crontab grammar.

pub mod calendar;
pub mod config;
pub mod daemon;
pub mod errors;
pub mod executor;
pub mod field;
pub mod job;
pub mod logging;
pub mod parser;
pub mod scheduler;
