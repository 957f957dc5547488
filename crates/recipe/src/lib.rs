//! Ingestion recipe model.
//!
//! A [`Recipe`] is the job configuration handed to the ingestion engine: one
//! source connector and one sink connector, each a type tag plus a free-form
//! config mapping. This crate provides:
//! - Connector type tags ([`SourceKind`], [`SinkKind`])
//! - The recipe itself with YAML/JSON serialization and secret redaction
//! - `${key}` templating resolved against a variable store

pub mod connector;
pub mod error;
pub mod recipe;
pub mod template;

pub use connector::{ConnectorSpec, SinkKind, SinkSpec, SourceKind, SourceSpec};
pub use error::{RecipeError, TemplateError};
pub use recipe::{Recipe, REDACTED};
pub use template::RecipeTemplate;
