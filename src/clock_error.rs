use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ClockError {
    #[error("schedule is required via --schedule or {0}")]
    MissingSchedule(&'static str),

    #[error("command is required via --command or {0}")]
    MissingCommand(&'static str),

    #[error("invalid cron expression \"{expression}\": {reason}")]
    InvalidSchedule { expression: String, reason: String },

    #[error("cron expression \"{0}\" never fires")]
    NoUpcomingRun(String),

    #[error("command cannot be empty")]
    EmptyCommand,
}
