use std::path::{Path, PathBuf};

use tracing::info;

use crate::executor::{Executor, Invocation};
use crate::image::Image;
use crate::settings::Settings;
use crate::task_error::TaskError;

/// An interactive, throwaway container with a host directory mounted into it.
#[derive(Debug)]
pub struct Container {
    tag: String,
    host_dir: PathBuf,
    workdir: String,
    command: Vec<String>,
}

impl Container {
    pub fn new(
        image: &Image,
        host_dir: &Path,
        command: &[String],
        settings: &Settings,
    ) -> Result<Self, TaskError> {
        let command = Self::parse_command(command)?;

        Ok(Self {
            tag: image.tag(),
            host_dir: host_dir.to_path_buf(),
            workdir: settings.image.workdir.clone(),
            command,
        })
    }

    pub fn invocation(&self, settings: &Settings) -> Invocation {
        let volume = format!("{}:{}", self.host_dir.display(), self.workdir);

        Invocation::new(&settings.docker.binary)
            .args(["run", "-it", "--rm", "-v"])
            .arg(volume)
            .arg(&self.tag)
            .args(&self.command)
    }

    pub fn run(&self, settings: &Settings, executor: &dyn Executor) -> Result<(), TaskError> {
        info!("=== Running {} in {} ===", self.command.join(" "), self.tag);
        executor.execute(&self.invocation(settings))
    }

    fn parse_command(command: &[String]) -> Result<Vec<String>, TaskError> {
        // A single argument is a whole command line; several are already split.
        let words = match command {
            [line] => {
                shell_words::split(line).map_err(|_| TaskError::InvalidCommand(line.clone()))?
            }
            _ => command.to_vec(),
        };

        if words.is_empty() {
            return Err(TaskError::Empty("container command"));
        }

        Ok(words)
    }
}
