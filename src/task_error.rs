use std::io;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TaskError {
    #[error("empty {0}")]
    Empty(&'static str),

    #[error("invalid image name \"{0}\": must not contain ':'")]
    InvalidImageName(String),

    #[error("unbalanced quoting in command \"{0}\"")]
    InvalidCommand(String),

    #[error("failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("`{command}` exited with code {code}")]
    Failed { command: String, code: i32 },
}

impl TaskError {
    /// The exit code this error should surface as, if it came from a subprocess.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Self::Failed { code, .. } => Some(*code),
            _ => None,
        }
    }
}
