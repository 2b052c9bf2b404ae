//! Main loop / event dispatcher.
//!
//! Blocks `SIGCHLD`, `SIGHUP`, `SIGTERM`, `SIGINT`, `SIGQUIT` at startup
//! and waits for them synchronously (`sigwaitinfo`/`sigtimedwait`) rather
//! than installing async signal handlers — this removes every
//! async-signal-safety concern a handler-based design would have, at the
//! cost of only being able to react to a signal between iterations of the
//! loop, which is exactly what a cron daemon needs.

use std::io;
use std::mem::MaybeUninit;
use std::time::Duration as StdDuration;

use chrono::Local;

use crate::config::DaemonConfig;
use crate::executor;
use crate::parser;
use crate::scheduler::Scheduler;

/// The blocked signal set, plus the two flavors of synchronous wait the
/// main loop needs.
struct SignalMask(libc::sigset_t);

impl SignalMask {
    fn new() -> Self {
        unsafe {
            let mut set = MaybeUninit::<libc::sigset_t>::uninit();
            libc::sigemptyset(set.as_mut_ptr());
            let mut set = set.assume_init();
            for sig in [libc::SIGCHLD, libc::SIGHUP, libc::SIGTERM, libc::SIGINT, libc::SIGQUIT] {
                libc::sigaddset(&mut set, sig);
            }
            SignalMask(set)
        }
    }

    fn block(&self) -> io::Result<()> {
        let ret = unsafe { libc::sigprocmask(libc::SIG_BLOCK, &self.0, std::ptr::null_mut()) };
        if ret != 0 {
            Err(io::Error::last_os_error())
        } else {
            Ok(())
        }
    }

    /// Blocks indefinitely for one of the masked signals, returning its
    /// number.
    fn wait(&self) -> libc::c_int {
        let mut info = MaybeUninit::<libc::siginfo_t>::uninit();
        loop {
            let ret = unsafe { libc::sigwaitinfo(&self.0, info.as_mut_ptr()) };
            if ret >= 0 || io::Error::last_os_error().raw_os_error() != Some(libc::EINTR) {
                return ret;
            }
        }
    }

    /// Waits up to `timeout` for one of the masked signals. `None` on
    /// timeout.
    fn wait_timeout(&self, timeout: StdDuration) -> Option<libc::c_int> {
        let ts = libc::timespec {
            tv_sec: timeout.as_secs() as libc::time_t,
            tv_nsec: 0,
        };
        let mut info = MaybeUninit::<libc::siginfo_t>::uninit();
        loop {
            let ret = unsafe { libc::sigtimedwait(&self.0, info.as_mut_ptr(), &ts) };
            if ret >= 0 {
                return Some(ret);
            }
            match io::Error::last_os_error().raw_os_error() {
                Some(e) if e == libc::EINTR => continue,
                _ => return None,
            }
        }
    }
}

/// An event the main loop reacts to. `TargetReached` is synthetic (no
/// signal was actually delivered) and fires when the selected job's time
/// has already passed by the time we'd otherwise sleep.
enum Event {
    TargetReached,
    Signal(libc::c_int),
    TimedOut,
}

pub struct Daemon {
    config: DaemonConfig,
    scheduler: Scheduler,
    mask: SignalMask,
}

impl Daemon {
    /// Installs the signal mask, reads the crontab (absence is not an
    /// error), and computes every job's initial fire time.
    pub fn bootstrap(config: DaemonConfig) -> Self {
        let mask = SignalMask::new();
        mask.block().expect("failed to block the daemon's signal set");

        log::info!("crond starting up with pid {}", std::process::id());

        let mut scheduler = Scheduler::new(load_crontab(&config.crontab_path));
        scheduler.update_all(Local::now(), config.max_lookahead_days);

        Daemon { config, scheduler, mask }
    }

    fn reload(&mut self) {
        log::info!("reloading {} because we received a SIGHUP", self.config.crontab_path);
        self.scheduler.jobs = load_crontab(&self.config.crontab_path);
        self.scheduler.update_all(Local::now(), self.config.max_lookahead_days);
    }

    /// Runs the scheduling loop forever. Returns only via `process::exit`
    /// on a graceful shutdown signal.
    pub fn run(&mut self) -> ! {
        loop {
            let begin = Local::now();
            let next_idx = self.scheduler.closest_job();

            let event = match next_idx {
                None => Event::Signal(self.mask.wait()),
                Some(idx) => {
                    let target = self.scheduler.jobs[idx]
                        .time
                        .expect("closest_job only returns indices that have a scheduled time");
                    if target > begin {
                        let wakeup_cap = self.config.wakeup_period_minutes * 60;
                        let wait_secs = (target - begin).num_seconds().min(wakeup_cap);
                        match self.mask.wait_timeout(StdDuration::from_secs(wait_secs as u64)) {
                            Some(sig) => Event::Signal(sig),
                            None => Event::TimedOut,
                        }
                    } else {
                        Event::TargetReached
                    }
                }
            };

            match event {
                Event::TargetReached => {
                    let idx = next_idx.expect("TargetReached implies closest_job found something");
                    self.dispatch_target_reached(idx);
                }
                Event::Signal(sig) if sig == libc::SIGCHLD => {
                    executor::reap_zombies(&mut self.scheduler.jobs);
                }
                Event::Signal(sig) if sig == libc::SIGHUP => {
                    self.reload();
                }
                Event::Signal(sig)
                    if sig == libc::SIGTERM || sig == libc::SIGINT || sig == libc::SIGQUIT =>
                {
                    log::info!("going down");
                    std::process::exit(0);
                }
                Event::Signal(_) => {
                    // Not one of the signals we blocked; nothing to do.
                }
                Event::TimedOut => {
                    if Local::now() < begin {
                        log::info!("detected that the system time was set back, recalculating");
                        self.scheduler.update_all(Local::now(), self.config.max_lookahead_days);
                    }
                }
            }
        }
    }

    fn dispatch_target_reached(&mut self, idx: usize) {
        let now = Local::now();
        let scheduled = self.scheduler.jobs[idx]
            .time
            .expect("dispatch_target_reached requires a scheduled time");
        let overdue_minutes = (now - scheduled).num_minutes();
        if overdue_minutes <= self.config.catchup_limit_minutes {
            executor::run_job(&mut self.scheduler.jobs[idx], &self.config.shell_path);
        } else {
            log::info!(
                "job #{} had to be skipped because it was too far in the past (was the system time set forward?)",
                self.scheduler.jobs[idx].lineno
            );
        }
        self.scheduler.update_job(idx, Local::now(), self.config.max_lookahead_days);
    }
}

fn load_crontab(path: &str) -> Vec<crate::job::Job> {
    match std::fs::read_to_string(path) {
        Ok(contents) => parser::parse_str(&contents, path),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Vec::new(),
        Err(e) => {
            log::error!("can't read {path}: {e}");
            std::process::exit(1);
        }
    }
}
