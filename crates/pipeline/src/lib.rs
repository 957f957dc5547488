//! Boundary to the external ingestion engine.
//!
//! The engine is consumed, not implemented: a [`PipelineEngine`] turns a
//! recipe into a [`Pipeline`], the pipeline runs to completion, and its
//! [`RunReport`] carries the outcome. [`CliEngine`] drives the `datahub`
//! command line; the `test-utils` feature adds a scripted engine for tests.

pub mod cli;
pub mod engine;
pub mod error;
pub mod report;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use cli::{CliEngine, CliEngineConfig};
pub use engine::{Pipeline, PipelineEngine};
pub use error::PipelineError;
pub use report::{RunReport, RunStatus};
