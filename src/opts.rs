use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "fops", version, about = "Build, lint, scan and run local tool images")]
pub struct Opts {
    /// Settings file (defaults to an optional `fops.toml` in the working directory)
    #[arg(short, long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Print the commands instead of running them
    #[arg(long, global = true)]
    pub dry_run: bool,

    #[command(subcommand)]
    pub task: Task,
}

#[derive(Subcommand, Debug)]
pub enum Task {
    /// Run a command in the image with the working directory mounted at /app
    Run {
        image_name: String,
        tool_version: String,
        /// One quoted command line, or the command's words
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        container_command: Vec<String>,
    },

    /// Lint the image's Dockerfile, build the image, then scan it
    Build {
        image_name: String,
        tool_version: String,
    },

    /// Run a command on a cron schedule until interrupted
    #[cfg(unix)]
    Clock {
        /// Cron expression (minute hour day-of-month month day-of-week)
        #[arg(long)]
        schedule: Option<String>,

        /// Command to run on every tick
        #[arg(long)]
        command: Option<String>,

        /// Shell used to run the command when it exists
        #[arg(long)]
        shell: Option<String>,
    },
}
