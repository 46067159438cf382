use std::io::{self, IsTerminal};
use std::process;

use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use fops::{Opts, TaskError};

/// Exit code for failures that did not come from a subprocess.
const FAILURE_EXIT_CODE: i32 = 1;

fn main() {
    // Log to stderr so stdout carries only subprocess output and dry-run listings.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .with_ansi(io::stderr().is_terminal())
        .init();

    let opts = Opts::parse();
    if let Err(e) = fops::run(opts) {
        error!("{:#}", e);

        // Surface the exit code of a failed subprocess as our own.
        let code = e
            .downcast_ref::<TaskError>()
            .and_then(TaskError::exit_code)
            .unwrap_or(FAILURE_EXIT_CODE);
        process::exit(code);
    }
}
