//! Termination of processes that hold the profile open
//!
//! Stopping processes is destructive and irreversible; callers must have the
//! user's consent (the CLI asks for `--force` when `SHOW_KILL_WARNING` is on).
//!
//! The procedure per matched process is: ask it to close, wait up to the
//! grace window, kill it if still alive, then verify a bounded number of
//! times, killing again on every check that finds it alive. A process that
//! survives verification is reported as a warning; termination never fails
//! the surrounding backup or restore.

use std::time::{Duration, Instant};

use sysinfo::{Pid, Signal, System};

use crate::cancel::CancellationToken;
use crate::error::{ProfileError, ProfileResult};
use crate::progress::{ProgressEvent, ProgressSink};

/// A running process matched by name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessInfo {
    pub pid: u32,
    pub name: String,
}

impl std::fmt::Display for ProcessInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (PID: {})", self.name, self.pid)
    }
}

/// Access to the OS process table
///
/// Implemented by [`SystemProcesses`]; tests substitute a scripted table.
pub trait ProcessControl: Send {
    /// Running processes whose name is exactly `name`
    fn find_by_name(&mut self, name: &str) -> ProfileResult<Vec<ProcessInfo>>;

    /// Ask the process to exit on its own; false if the request could not be sent
    fn request_close(&mut self, pid: u32) -> bool;

    /// Forcefully terminate the process; false if the signal could not be sent
    fn kill(&mut self, pid: u32) -> bool;

    /// Whether the process is still running
    fn is_running(&mut self, pid: u32) -> bool;
}

/// [`ProcessControl`] backed by `sysinfo`
pub struct SystemProcesses {
    system: System,
}

impl SystemProcesses {
    pub fn new() -> Self {
        Self {
            system: System::new(),
        }
    }
}

impl Default for SystemProcesses {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessControl for SystemProcesses {
    fn find_by_name(&mut self, name: &str) -> ProfileResult<Vec<ProcessInfo>> {
        if name.trim().is_empty() {
            return Err(ProfileError::Process("empty process name".into()));
        }
        self.system.refresh_processes();
        Ok(self
            .system
            .processes_by_exact_name(name)
            .map(|p| ProcessInfo {
                pid: p.pid().as_u32(),
                name: p.name().to_string(),
            })
            .collect())
    }

    fn request_close(&mut self, pid: u32) -> bool {
        let pid = Pid::from_u32(pid);
        if !self.system.refresh_process(pid) {
            return false;
        }
        self.system
            .process(pid)
            .and_then(|p| p.kill_with(Signal::Term))
            .unwrap_or(false)
    }

    fn kill(&mut self, pid: u32) -> bool {
        let pid = Pid::from_u32(pid);
        if !self.system.refresh_process(pid) {
            return false;
        }
        self.system.process(pid).map(|p| p.kill()).unwrap_or(false)
    }

    fn is_running(&mut self, pid: u32) -> bool {
        self.system.refresh_process(Pid::from_u32(pid))
    }
}

/// Timing of the close/kill/verify sequence
#[derive(Debug, Clone, Copy)]
pub struct TerminationTimings {
    /// How long a process may take to exit after the close request
    pub grace_period: Duration,
    /// Number of post-kill checks
    pub verify_attempts: u32,
    /// Delay before each post-kill check
    pub verify_interval: Duration,
    /// Poll interval while waiting inside the grace period
    pub poll_interval: Duration,
}

impl Default for TerminationTimings {
    fn default() -> Self {
        Self {
            grace_period: Duration::from_millis(3000),
            verify_attempts: 10,
            verify_interval: Duration::from_millis(500),
            poll_interval: Duration::from_millis(100),
        }
    }
}

/// Outcome of a termination run
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TerminationReport {
    /// Processes matched across all name variants
    pub found: usize,
    /// Processes confirmed gone
    pub terminated: usize,
    /// Processes still running after the last verification
    pub survivors: Vec<ProcessInfo>,
    /// Names whose lookup failed, with the reason
    pub search_failures: Vec<(String, String)>,
}

impl TerminationReport {
    /// One-line summary for the progress display
    pub fn summary(&self) -> String {
        format!(
            "{} of {} process(es) stopped, {} failed",
            self.terminated,
            self.found,
            self.survivors.len()
        )
    }
}

/// Name variants searched for `name`, in search order
///
/// `qgis` -> [`qgis`, `qgis.exe`]; `qgis.exe` -> [`qgis.exe`, `qgis`].
/// The `.exe` variant is only searched when the plain name found nothing.
fn name_variants(name: &str) -> (String, Option<String>) {
    let lower = name.to_ascii_lowercase();
    let stripped = lower
        .ends_with(".exe")
        .then(|| name[..name.len() - 4].to_string());
    (name.to_string(), stripped)
}

/// Stops the configured processes
pub struct ProcessTerminator {
    control: Box<dyn ProcessControl>,
    timings: TerminationTimings,
}

impl ProcessTerminator {
    pub fn new(control: Box<dyn ProcessControl>, timings: TerminationTimings) -> Self {
        Self { control, timings }
    }

    /// Terminator over the real process table with default timings
    pub fn system() -> Self {
        Self::new(Box::new(SystemProcesses::new()), TerminationTimings::default())
    }

    /// Look up one name variant, recording a failed search in the report
    fn lookup(
        &mut self,
        name: &str,
        report: &mut TerminationReport,
        progress: &dyn ProgressSink,
    ) -> Vec<ProcessInfo> {
        match self.control.find_by_name(name) {
            Ok(found) => found,
            Err(e) => {
                progress.report(ProgressEvent::indeterminate(
                    format!("Warning while searching {}", name),
                    e.to_string(),
                ));
                report.search_failures.push((name.to_string(), e.to_string()));
                Vec::new()
            }
        }
    }

    /// Collect every running process matching any of `names`
    ///
    /// Matches from different name variants are appended without
    /// de-duplication.
    fn collect(
        &mut self,
        names: &[String],
        report: &mut TerminationReport,
        progress: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> ProfileResult<Vec<ProcessInfo>> {
        let mut matched = Vec::new();

        for name in names {
            cancel.check()?;
            let (exact, stripped) = name_variants(name);

            let mut found = self.lookup(&exact, report, progress);
            if found.is_empty() && stripped.is_none() {
                let with_exe = format!("{}.exe", exact);
                found.extend(self.lookup(&with_exe, report, progress));
            }
            if let Some(stripped) = stripped {
                found.extend(self.lookup(&stripped, report, progress));
            }

            progress.report(ProgressEvent::indeterminate(
                "Searching processes...",
                format!("Found: {}x {}", found.len(), name),
            ));
            matched.extend(found);
        }

        Ok(matched)
    }

    /// Wait until `pid` exits or `limit` passes; true if it exited
    fn wait_for_exit(
        &mut self,
        pid: u32,
        limit: Duration,
        cancel: &CancellationToken,
    ) -> ProfileResult<bool> {
        let deadline = Instant::now() + limit;
        loop {
            if !self.control.is_running(pid) {
                return Ok(true);
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(false);
            }
            cancel.sleep(self.timings.poll_interval.min(deadline - now))?;
        }
    }

    /// Stop one process; true if it is confirmed gone
    fn stop_one(
        &mut self,
        process: &ProcessInfo,
        progress: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> ProfileResult<bool> {
        if !self.control.is_running(process.pid) {
            return Ok(true);
        }

        self.control.request_close(process.pid);
        if self.wait_for_exit(process.pid, self.timings.grace_period, cancel)? {
            return Ok(true);
        }

        self.control.kill(process.pid);

        for attempt in 1..=self.timings.verify_attempts {
            cancel.sleep(self.timings.verify_interval)?;
            if !self.control.is_running(process.pid) {
                return Ok(true);
            }
            progress.report(ProgressEvent::indeterminate(
                "Process resisting...",
                format!(
                    "Attempt {}/{}: {}",
                    attempt, self.timings.verify_attempts, process.name
                ),
            ));
            self.control.kill(process.pid);
        }

        Ok(!self.control.is_running(process.pid))
    }

    /// Stop every running process matching `names`
    ///
    /// Finding nothing is a success. Only cancellation is returned as an
    /// error; lookup failures and survivors are recorded in the report.
    pub fn terminate(
        &mut self,
        names: &[String],
        progress: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> ProfileResult<TerminationReport> {
        let mut report = TerminationReport::default();
        let processes = self.collect(names, &mut report, progress, cancel)?;
        report.found = processes.len();

        if processes.is_empty() {
            progress.report(ProgressEvent::indeterminate(
                "No processes found",
                format!("Searched: {}", names.join(", ")),
            ));
            return Ok(report);
        }

        progress.report(ProgressEvent::indeterminate(
            format!("Stopping {} process(es)...", processes.len()),
            "Sending close request",
        ));

        let total = processes.len() as u64;
        for (index, process) in processes.iter().enumerate() {
            cancel.check()?;
            progress.report(ProgressEvent::determinate(
                "Stopping processes...",
                index as u64 + 1,
                total,
                process.to_string(),
            ));

            if self.stop_one(process, progress, cancel)? {
                report.terminated += 1;
            } else {
                progress.report(ProgressEvent::indeterminate(
                    "Process warning",
                    format!("{} could not be stopped", process),
                ));
                report.survivors.push(process.clone());
            }
        }

        progress.report(ProgressEvent::indeterminate(
            "Processes stopped",
            report.summary(),
        ));
        Ok(report)
    }
}
