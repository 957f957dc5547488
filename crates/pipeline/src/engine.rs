//! Engine and pipeline traits.

use async_trait::async_trait;
use metaload_recipe::Recipe;

use crate::error::PipelineError;
use crate::report::RunReport;

/// Factory for pipelines. One pipeline is created per scheduled run.
#[async_trait]
pub trait PipelineEngine: Send + Sync {
    /// Validate `recipe` and prepare a pipeline for it.
    ///
    /// Configuration problems the engine can detect up front are returned
    /// here as [`PipelineError::Config`].
    async fn create(&self, recipe: &Recipe) -> Result<Box<dyn Pipeline>, PipelineError>;

    fn name(&self) -> &str;
}

/// A prepared ingestion run.
#[async_trait]
pub trait Pipeline: Send {
    /// Run to completion. Ingestion failures are recorded in the report,
    /// not returned; `Err` means the run could not happen at all.
    async fn run(&mut self) -> Result<(), PipelineError>;

    /// Status of the most recent run.
    fn report(&self) -> &RunReport;

    /// Convert a non-success status into an error.
    fn raise_from_status(&self) -> Result<(), PipelineError> {
        let report = self.report();
        if report.is_success() {
            Ok(())
        } else {
            Err(PipelineError::RunFailed {
                status: report.status,
                message: report.failure_message(),
            })
        }
    }
}
