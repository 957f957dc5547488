//! Run status and report returned by the engine after a run.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Created but not yet run.
    Pending,
    Success,
    Failure,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RunStatus::Pending => "pending",
            RunStatus::Success => "succeeded",
            RunStatus::Failure => "failed",
        })
    }
}

/// Outcome of a single pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub status: RunStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Engine failure messages, in the order reported.
    pub failures: Vec<String>,
    /// Warning lines from the engine output, most recent last.
    pub warnings: Vec<String>,
    /// Exit code of the engine process, when one was spawned.
    pub exit_code: Option<i32>,
}

impl RunReport {
    pub fn pending() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            status: RunStatus::Pending,
            started_at: None,
            finished_at: None,
            failures: Vec::new(),
            warnings: Vec::new(),
            exit_code: None,
        }
    }

    pub fn mark_started(&mut self) {
        self.started_at = Some(Utc::now());
    }

    pub fn mark_finished(&mut self, status: RunStatus) {
        self.status = status;
        self.finished_at = Some(Utc::now());
    }

    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Success
    }

    /// One-line failure summary; falls back to the status when the engine
    /// gave no message.
    pub fn failure_message(&self) -> String {
        if self.failures.is_empty() {
            match self.exit_code {
                Some(code) => format!("engine exited with status {code}"),
                None => format!("run {}", self.status),
            }
        } else {
            self.failures.join("; ")
        }
    }
}
