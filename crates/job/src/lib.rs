//! Scheduled ingestion jobs.
//!
//! An [`IngestionJob`] pairs declarative [`JobSchedule`] metadata with a
//! [`RecipeBuilder`]. Running it resolves variables, builds a recipe, hands it
//! to a [`PipelineEngine`](metaload_pipeline::PipelineEngine) and turns any
//! non-success status into an error. Jobs come from code ([`builtin`]) or
//! from YAML files ([`JobLoader`]).

pub mod builder;
pub mod builtin;
pub mod definition;
pub mod error;
pub mod job;
pub mod loader;
pub mod schedule;

pub use builder::{BuildFn, RecipeBuilder};
pub use definition::JobDocument;
pub use error::{FailureKind, JobError, Result};
pub use job::IngestionJob;
pub use loader::{JobLoader, LoadReport, LoadResult, LoadStatus};
pub use schedule::{JobSchedule, ScheduleInterval, StartDate, TaskDefaults};
