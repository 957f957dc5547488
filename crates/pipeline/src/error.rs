use crate::report::RunStatus;

/// Errors surfaced by the ingestion engine boundary.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// The engine rejected the recipe before running it.
    #[error("pipeline configuration rejected: {0}")]
    Config(String),

    /// The engine process could not be started.
    #[error("failed to launch engine '{command}': {message}")]
    Spawn { command: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The run finished with a non-success status.
    #[error("pipeline run {status}: {message}")]
    RunFailed { status: RunStatus, message: String },
}
