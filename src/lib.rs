use std::env;
use std::path::Path;

use anyhow::Context;
use tracing::info;

mod builder;
#[cfg(unix)]
mod clock;
mod clock_error;
mod container;
mod executor;
mod image;
mod opts;
mod schedule;
mod settings;
mod task_error;

pub use builder::{BuildReport, Builder};
#[cfg(unix)]
pub use clock::{Clock, ClockConfig, Overrides};
pub use clock_error::ClockError;
pub use container::Container;
pub use executor::{DryRunExecutor, Executor, Invocation, SystemExecutor};
pub use image::Image;
pub use opts::{Opts, Task};
pub use schedule::Schedule;
pub use settings::Settings;
pub use task_error::TaskError;

pub fn run(opts: Opts) -> anyhow::Result<()> {
    let Opts {
        config,
        dry_run,
        task,
    } = opts;

    // Choose how commands are carried out.
    let executor: Box<dyn Executor> = if dry_run {
        Box::new(DryRunExecutor::new())
    } else {
        Box::new(SystemExecutor::new())
    };

    match task {
        Task::Run {
            image_name,
            tool_version,
            container_command,
        } => {
            let settings = load_settings(config.as_deref())?;
            let image = Image::new(image_name, tool_version, &settings)?;
            let host_dir = env::current_dir().context("failed to resolve the working directory")?;

            let container = Container::new(&image, &host_dir, &container_command, &settings)?;
            container.run(&settings, executor.as_ref())?;
        }
        Task::Build {
            image_name,
            tool_version,
        } => {
            let settings = load_settings(config.as_deref())?;
            let image = Image::new(image_name, tool_version, &settings)?;
            let workdir = env::current_dir().context("failed to resolve the working directory")?;

            let report = Builder::new(&settings, executor.as_ref(), &workdir).build(&image)?;
            info!(
                lint_passed = report.lint_passed,
                scan_passed = report.scan_passed,
                "built {}",
                image.tag()
            );
        }
        #[cfg(unix)]
        Task::Clock {
            schedule,
            command,
            shell,
        } => {
            let overrides = Overrides {
                schedule,
                command,
                shell,
            };
            let config = ClockConfig::from_env(&overrides)?;
            Clock::new(config, executor.as_ref())?.run()?;
        }
    }

    Ok(())
}

fn load_settings(path: Option<&Path>) -> anyhow::Result<Settings> {
    Settings::new(path).context("failed to load settings")
}
