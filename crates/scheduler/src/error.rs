use thiserror::Error;

#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error("job '{0}' is already registered")]
    DuplicateJob(String),

    #[error("unknown job '{0}'")]
    UnknownJob(String),
}

pub type Result<T> = std::result::Result<T, SchedulerError>;
