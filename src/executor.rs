use std::borrow::Cow;
use std::fmt;
use std::fs::File;
use std::iter;
use std::path::PathBuf;
use std::process::{Command, ExitStatus, Stdio};

use tracing::debug;

use crate::task_error::TaskError;

/// Exit code reported when a subprocess produced none.
const UNKNOWN_EXIT_CODE: i32 = 1;

/// Offset added to a terminating signal's number, the way shells report it.
#[cfg(unix)]
const SIGNAL_EXIT_OFFSET: i32 = 128;

/// A single external command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub stdin: Option<PathBuf>,
    /// Directory the command runs in. Relative paths, `stdin` included, resolve against it.
    pub current_dir: Option<PathBuf>,
}

impl Invocation {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            stdin: None,
            current_dir: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Feed the file at `path` to the command's standard input.
    pub fn stdin_from(mut self, path: impl Into<PathBuf>) -> Self {
        self.stdin = Some(path.into());
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    /// Render the invocation as a shell command line.
    pub fn command_line(&self) -> String {
        let mut line = iter::once(&self.program)
            .chain(&self.args)
            .map(|word| quote(word))
            .collect::<Vec<_>>()
            .join(" ");
        if let Some(path) = &self.stdin {
            line.push_str(" < ");
            line.push_str(&shell_words::quote(&path.to_string_lossy()));
        }
        line
    }
}

/// Shell-quote a word, leaving `NAME=value` assignments bare when both sides are safe.
fn quote(word: &str) -> Cow<'_, str> {
    let bare = !word.is_empty()
        && word.split('=').all(|part| part.is_empty() || shell_words::quote(part) == part);
    if bare {
        Cow::Borrowed(word)
    } else {
        shell_words::quote(word)
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.command_line())
    }
}

pub trait Executor {
    /// Run the invocation to completion. A non-zero exit is an error.
    fn execute(&self, invocation: &Invocation) -> Result<(), TaskError>;
}

/// Runs invocations as child processes sharing the caller's terminal.
#[derive(Debug, Default)]
pub struct SystemExecutor;

impl SystemExecutor {
    pub fn new() -> Self {
        Self
    }
}

impl Executor for SystemExecutor {
    fn execute(&self, invocation: &Invocation) -> Result<(), TaskError> {
        let spawn_error = |source| TaskError::Spawn {
            command: invocation.command_line(),
            source,
        };

        let mut command = Command::new(&invocation.program);
        command.args(&invocation.args);
        if let Some(dir) = &invocation.current_dir {
            command.current_dir(dir);
        }

        // Redirect standard input from a file if requested.
        if let Some(path) = &invocation.stdin {
            let path = match &invocation.current_dir {
                Some(dir) => dir.join(path),
                None => path.clone(),
            };
            let file = File::open(path).map_err(spawn_error)?;
            command.stdin(Stdio::from(file));
        }

        debug!(command = %invocation, "spawning");
        let status = command.status().map_err(spawn_error)?;
        if status.success() {
            return Ok(());
        }

        Err(TaskError::Failed {
            command: invocation.command_line(),
            code: exit_code(status),
        })
    }
}

/// Prints invocations instead of running them.
#[derive(Debug, Default)]
pub struct DryRunExecutor;

impl DryRunExecutor {
    pub fn new() -> Self {
        Self
    }
}

impl Executor for DryRunExecutor {
    fn execute(&self, invocation: &Invocation) -> Result<(), TaskError> {
        println!("{}", invocation);
        Ok(())
    }
}

#[cfg(unix)]
fn exit_code(status: ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;

    status
        .code()
        .or_else(|| status.signal().map(|signal| SIGNAL_EXIT_OFFSET + signal))
        .unwrap_or(UNKNOWN_EXIT_CODE)
}

#[cfg(not(unix))]
fn exit_code(status: ExitStatus) -> i32 {
    status.code().unwrap_or(UNKNOWN_EXIT_CODE)
}
