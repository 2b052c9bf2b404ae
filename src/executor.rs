//! Child process lifecycle: forking jobs into their own process group and
//! reaping them once they exit.

use std::ffi::CString;

use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::{execv, fork, setpgid, ForkResult, Pid};

use crate::job::Job;

/// Runs `job.command` through `<shell> -c <command>` unless it is already
/// running. Mirrors the original `run_job`: the child is placed in its
/// own process group (so signals sent to the daemon's terminal don't also
/// reach it) before exec'ing; a failed exec exits with status 137.
pub fn run_job(job: &mut Job, shell_path: &str) {
    if job.is_running() {
        log::warn!(
            "job #{} won't be executed since it is still running",
            job.lineno
        );
        return;
    }

    // Safety: the child only calls async-signal-safe functions
    // (`setpgid`, `execv`, `_exit`) between `fork` and exec/exit.
    match unsafe { fork() } {
        Err(e) => {
            log::error!("cannot start a new process: {e}");
        }
        Ok(ForkResult::Child) => {
            let _ = setpgid(Pid::from_raw(0), Pid::from_raw(0));
            let shell = CString::new(shell_path).unwrap_or_else(|_| CString::new("/bin/sh").unwrap());
            let flag = CString::new("-c").unwrap();
            let command = CString::new(job.command.as_str()).unwrap_or_else(|_| CString::new("").unwrap());
            let _ = execv(&shell, &[shell.clone(), flag, command]);
            // Only reached if execv failed.
            std::process::exit(137);
        }
        Ok(ForkResult::Parent { child }) => {
            log::info!("executing job #{} with pid {child}", job.lineno);
            job.pid = Some(child);
        }
    }
}

/// Drains exited children non-blockingly, logging each disposition and
/// clearing the owning job's `pid`. Stopped children keep running (their
/// job's `pid` is left set); exited/signaled children free their slot.
pub fn reap_zombies(jobs: &mut [Job]) {
    loop {
        match waitpid(Pid::from_raw(-1), Some(WaitPidFlag::WNOHANG)) {
            Ok(WaitStatus::Exited(pid, code)) => {
                log::info!("pid {pid} returned with status {code}");
                clear_pid(jobs, pid);
            }
            Ok(WaitStatus::Signaled(pid, sig, _core)) => {
                log::warn!("pid {pid} terminated by signal {sig}");
                clear_pid(jobs, pid);
            }
            Ok(WaitStatus::Stopped(pid, sig)) => {
                log::warn!("pid {pid} stopped by signal {sig}");
                // Stopped, not terminated: leave the job's pid set.
            }
            Ok(WaitStatus::StillAlive) | Err(_) => break,
            Ok(_) => continue,
        }
    }
}

fn clear_pid(jobs: &mut [Job], pid: Pid) {
    if let Some(job) = jobs.iter_mut().find(|j| j.pid == Some(pid)) {
        job.pid = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::Job;

    #[test]
    fn reap_with_no_children_is_a_no_op() {
        // No children exist in this process, so WNOHANG should report
        // "no status available" and the loop should return immediately
        // without panicking.
        let mut jobs: Vec<Job> = vec![];
        reap_zombies(&mut jobs);
    }

    #[test]
    fn run_job_skips_when_already_running() {
        let mut job = Job::new(1, "true".to_string());
        job.pid = Some(Pid::from_raw(1));
        run_job(&mut job, "/bin/sh");
        // pid is untouched (no fork attempted); this is mostly a
        // regression guard against accidentally removing the guard.
        assert_eq!(job.pid, Some(Pid::from_raw(1)));
    }
}
