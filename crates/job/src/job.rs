//! [`IngestionJob`]: resolve → build → create → run → check status.

use std::fmt;
use std::sync::Arc;

use metaload_core::VariableStore;
use metaload_pipeline::{PipelineEngine, RunReport};
use metaload_recipe::Recipe;
use tracing::{info, instrument, warn};

use crate::builder::{BuildFn, RecipeBuilder};
use crate::definition::JobDocument;
use crate::error::{JobError, Result};
use crate::schedule::JobSchedule;

/// A scheduled unit of ingestion work.
///
/// Holds no per-run state: every [`execute`](IngestionJob::execute) resolves
/// its variables and builds a new recipe from scratch.
#[derive(Clone)]
pub struct IngestionJob {
    id: String,
    schedule: JobSchedule,
    enabled: bool,
    tags: Vec<String>,
    builder: Arc<dyn RecipeBuilder>,
}

impl IngestionJob {
    pub fn new(id: impl Into<String>, schedule: JobSchedule, builder: impl RecipeBuilder + 'static) -> Self {
        Self {
            id: id.into(),
            schedule,
            enabled: true,
            tags: Vec::new(),
            builder: Arc::new(builder),
        }
    }

    /// Job whose recipe is produced by a function of the variable store.
    pub fn from_fn<F>(id: impl Into<String>, schedule: JobSchedule, build: F) -> Self
    where
        F: Fn(&dyn VariableStore) -> Result<Recipe> + Send + Sync + 'static,
    {
        Self::new(id, schedule, BuildFn(build))
    }

    pub fn from_document(doc: JobDocument) -> Self {
        Self {
            id: doc.id,
            schedule: doc.schedule,
            enabled: doc.enabled,
            tags: doc.tags,
            builder: Arc::new(doc.recipe),
        }
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_tags(mut self, tags: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn schedule(&self) -> &JobSchedule {
        &self.schedule
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    /// Resolve variables and build this run's recipe.
    pub fn build_recipe(&self, vars: &dyn VariableStore) -> Result<Recipe> {
        self.builder.build(vars)
    }

    /// Run the job once against `engine`.
    ///
    /// Variable failures return before the engine is touched. Any
    /// non-success run status is returned as [`JobError::Pipeline`] so the
    /// host can retry or alert; nothing is retried here.
    #[instrument(skip_all, fields(job_id = %self.id))]
    pub async fn execute(&self, engine: &dyn PipelineEngine, vars: &dyn VariableStore) -> Result<RunReport> {
        let recipe = self.build_recipe(vars).map_err(|e| {
            warn!(error = %e, "failed to resolve job parameters");
            e
        })?;
        info!(
            source = %recipe.source.kind,
            sink = %recipe.sink.kind,
            engine = engine.name(),
            "built recipe"
        );

        let mut pipeline = engine.create(&recipe).await?;
        drop(recipe);

        pipeline.run().await?;
        pipeline.raise_from_status().map_err(|e| {
            warn!(error = %e, "ingestion run failed");
            JobError::from(e)
        })?;

        let report = pipeline.report().clone();
        for warning in &report.warnings {
            warn!(run_id = %report.run_id, warning = %warning, "engine reported a warning");
        }
        info!(
            run_id = %report.run_id,
            warnings = report.warnings.len(),
            "ingestion run succeeded"
        );
        Ok(report)
    }
}

impl fmt::Debug for IngestionJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IngestionJob")
            .field("id", &self.id)
            .field("schedule", &self.schedule)
            .field("enabled", &self.enabled)
            .field("tags", &self.tags)
            .finish_non_exhaustive()
    }
}
