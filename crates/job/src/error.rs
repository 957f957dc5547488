//! Job error type and its failure classification.

use metaload_core::VariableError;
use metaload_pipeline::PipelineError;
use metaload_recipe::TemplateError;

/// Errors that end a job run.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    /// A required variable or secret could not be resolved.
    #[error(transparent)]
    Variable(#[from] VariableError),

    #[error(transparent)]
    Template(#[from] TemplateError),

    /// The engine rejected the recipe or the run did not succeed.
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error("invalid job definition: {0}")]
    Definition(String),
}

/// Phase in which a run failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Parameter resolution, before the engine was contacted.
    Variable,
    /// The engine refused the configuration or could not be started.
    Configuration,
    /// The engine ran and reported a non-success status.
    Run,
    Definition,
}

impl JobError {
    pub fn kind(&self) -> FailureKind {
        match self {
            JobError::Variable(_) => FailureKind::Variable,
            JobError::Template(TemplateError::Variable(_)) => FailureKind::Variable,
            JobError::Template(_) => FailureKind::Definition,
            JobError::Pipeline(PipelineError::Config(_) | PipelineError::Spawn { .. }) => {
                FailureKind::Configuration
            }
            JobError::Pipeline(_) => FailureKind::Run,
            JobError::Definition(_) => FailureKind::Definition,
        }
    }
}

pub type Result<T> = std::result::Result<T, JobError>;
