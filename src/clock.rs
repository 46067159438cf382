use std::env;
use std::path::Path;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{bail, Context};
use chrono::Local;
use nix::errno::Errno;
use nix::sys::signal::{SigSet, Signal};
use nix::sys::wait::{self, WaitPidFlag, WaitStatus};
use nix::unistd::Pid;
use tracing::{debug, info, warn};

use crate::clock_error::ClockError;
use crate::executor::{Executor, Invocation};
use crate::schedule::Schedule;

pub const ENV_SCHEDULE: &str = "FOPS_CLOCK_CRON_SCHEDULE";
pub const ENV_COMMAND: &str = "FOPS_CLOCK_COMMAND";
pub const ENV_SHELL: &str = "FOPS_CLOCK_CRON_SHELL";
pub const DEFAULT_SHELL: &str = "/bin/sh";

/// Values given on the command line. Blank ones fall back to the environment.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub schedule: Option<String>,
    pub command: Option<String>,
    pub shell: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClockConfig {
    pub schedule: String,
    pub command: String,
    pub shell: String,
}

impl ClockConfig {
    pub fn from_env(overrides: &Overrides) -> Result<Self, ClockError> {
        Self::resolve(overrides, |key| env::var(key).ok())
    }

    pub fn resolve<F>(overrides: &Overrides, lookup: F) -> Result<Self, ClockError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let pick = |flag: &Option<String>, key: &str| {
            non_blank(flag.as_deref()).or_else(|| non_blank(lookup(key).as_deref()))
        };

        let schedule = pick(&overrides.schedule, ENV_SCHEDULE)
            .ok_or(ClockError::MissingSchedule(ENV_SCHEDULE))?;
        let command =
            pick(&overrides.command, ENV_COMMAND).ok_or(ClockError::MissingCommand(ENV_COMMAND))?;
        let shell = pick(&overrides.shell, ENV_SHELL).unwrap_or_else(|| DEFAULT_SHELL.to_owned());

        Ok(Self {
            schedule,
            command,
            shell,
        })
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_owned)
}

/// Build the job's command: through the shell when it is installed, split on
/// whitespace otherwise.
pub fn job_invocation<F>(
    command: &str,
    shell: &str,
    shell_exists: F,
) -> Result<Invocation, ClockError>
where
    F: Fn(&Path) -> bool,
{
    if command.is_empty() {
        return Err(ClockError::EmptyCommand);
    }

    if !shell.is_empty() && shell_exists(Path::new(shell)) {
        return Ok(Invocation::new(shell).arg("-c").arg(command));
    }

    let mut words = command.split_whitespace();
    match words.next() {
        Some(program) => Ok(Invocation::new(program).args(words)),
        None => Err(ClockError::EmptyCommand),
    }
}

enum Wake {
    Due,
    Shutdown(Signal),
}

/// Runs a command on a cron schedule until interrupted.
pub struct Clock<'a> {
    config: ClockConfig,
    schedule: Schedule,
    job: Invocation,
    executor: &'a dyn Executor,
}

impl<'a> Clock<'a> {
    pub fn new(config: ClockConfig, executor: &'a dyn Executor) -> Result<Self, ClockError> {
        let schedule = Schedule::parse(&config.schedule)?;
        let job = job_invocation(&config.command, &config.shell, Path::exists)?;

        Ok(Self {
            config,
            schedule,
            job,
            executor,
        })
    }

    pub fn run(&self) -> anyhow::Result<()> {
        // Route termination and child signals to a dedicated thread before
        // anything else is spawned.
        let signals = watch_signals().context("failed to install signal handling")?;

        info!(
            schedule = %self.schedule,
            command = %self.config.command,
            shell = %self.config.shell,
            "start"
        );

        loop {
            let delay = self.schedule.delay_after(&Local::now())?;
            info!("sleeping for {:?}", Duration::from_secs(delay.as_secs()));

            match wait_until(Instant::now() + delay, &signals)? {
                Wake::Due => {
                    self.run_job();

                    // The job may have left orphans behind.
                    reap_zombies();
                }
                Wake::Shutdown(signal) => {
                    info!("received signal {:?}, shutting down", signal);
                    return Ok(());
                }
            }
        }
    }

    fn run_job(&self) {
        info!("starting task");
        let start = Instant::now();

        match self.executor.execute(&self.job) {
            Ok(()) => info!("task completed in {}ms", start.elapsed().as_millis()),
            Err(e) => warn!(
                "task failed after {}ms: {}",
                start.elapsed().as_millis(),
                e
            ),
        }
    }
}

fn watch_signals() -> nix::Result<Receiver<Signal>> {
    let mut signals = SigSet::empty();
    signals.add(Signal::SIGINT);
    signals.add(Signal::SIGTERM);
    signals.add(Signal::SIGCHLD);
    signals.thread_block()?;

    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        while let Ok(signal) = signals.wait() {
            if tx.send(signal).is_err() {
                break;
            }
        }
    });

    Ok(rx)
}

fn wait_until(deadline: Instant, signals: &Receiver<Signal>) -> anyhow::Result<Wake> {
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining == Duration::from_secs(0) {
            return Ok(Wake::Due);
        }

        match signals.recv_timeout(remaining) {
            Ok(Signal::SIGCHLD) => reap_zombies(),
            Ok(signal) => return Ok(Wake::Shutdown(signal)),
            Err(RecvTimeoutError::Timeout) => return Ok(Wake::Due),
            Err(RecvTimeoutError::Disconnected) => bail!("signal watcher exited"),
        }
    }
}

/// Collect every exited child without blocking.
fn reap_zombies() {
    loop {
        match wait::waitpid(Pid::from_raw(-1), Some(WaitPidFlag::WNOHANG)) {
            Ok(WaitStatus::StillAlive) => return,
            Ok(status) => debug!(?status, "reaped child"),
            Err(Errno::EINTR) => continue,
            Err(_) => return,
        }
    }
}
