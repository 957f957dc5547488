//! In-process scheduler for ingestion jobs.
//!
//! [`JobScheduler`] works out which logical dates of each registered job are
//! due, hands them to a [`TaskRunner`] (retries and execution timeout), and
//! records the result. It is a minimal stand-in for an external workflow
//! host: runs are sequential and state lives only in memory.

pub mod due;
pub mod error;
pub mod runner;
pub mod scheduler;

pub use scheduler::{JobScheduler, ScheduleEntry};
pub use due::{due_runs, next_tick, MAX_CATCHUP_RUNS};
pub use error::{Result, SchedulerError};
pub use runner::{TaskRun, TaskRunner, TaskState};
