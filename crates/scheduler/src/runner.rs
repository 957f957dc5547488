//! [`TaskRunner`]: one scheduled run of a job, with the host's retry and
//! timeout policy applied around it.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use metaload_core::VariableStore;
use metaload_job::{FailureKind, IngestionJob};
use metaload_pipeline::PipelineEngine;
use serde::Serialize;
use tracing::{error, info, warn};

/// Final state of a task run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum TaskState {
    Success,
    /// The last attempt returned an error.
    Failed {
        error: String,
        #[serde(skip)]
        kind: Option<FailureKind>,
    },
    /// The last attempt exceeded the execution timeout.
    TimedOut {
        #[serde(with = "secs")]
        after: Duration,
    },
}

impl TaskState {
    pub fn is_success(&self) -> bool {
        matches!(self, TaskState::Success)
    }

    pub fn label(&self) -> &'static str {
        match self {
            TaskState::Success => "success",
            TaskState::Failed { .. } => "failed",
            TaskState::TimedOut { .. } => "timed_out",
        }
    }
}

/// Record of one scheduled run (all attempts).
#[derive(Debug, Clone, Serialize)]
pub struct TaskRun {
    pub job_id: String,
    pub logical_date: DateTime<Utc>,
    pub attempts: u32,
    pub state: TaskState,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Runs jobs against a shared engine and variable store.
#[derive(Clone)]
pub struct TaskRunner {
    engine: Arc<dyn PipelineEngine>,
    variables: Arc<dyn VariableStore>,
    retries_enabled: bool,
}

impl TaskRunner {
    pub fn new(engine: Arc<dyn PipelineEngine>, variables: Arc<dyn VariableStore>) -> Self {
        Self {
            engine,
            variables,
            retries_enabled: true,
        }
    }

    /// Make a single attempt regardless of the job's retry count.
    pub fn without_retries(mut self) -> Self {
        self.retries_enabled = false;
        self
    }

    /// Run `job` for `logical_date`.
    ///
    /// Makes up to `retries + 1` attempts, each bounded by the job's
    /// execution timeout, sleeping `retry_delay` between attempts. The result
    /// is always returned as a [`TaskRun`]; failure is in its state.
    pub async fn run(&self, job: &IngestionJob, logical_date: DateTime<Utc>) -> TaskRun {
        let defaults = &job.schedule().defaults;
        let max_attempts = if self.retries_enabled {
            defaults.retries.saturating_add(1)
        } else {
            1
        };
        let started_at = Utc::now();
        let mut attempts = 0;
        let mut state;

        loop {
            attempts += 1;
            info!(
                job_id = %job.id(),
                logical_date = %logical_date,
                attempt = attempts,
                max_attempts,
                "starting task attempt"
            );
            state = self.attempt(job, defaults.execution_timeout).await;

            if state.is_success() || attempts >= max_attempts {
                break;
            }

            warn!(
                job_id = %job.id(),
                attempt = attempts,
                state = state.label(),
                retry_in_secs = defaults.retry_delay.as_secs(),
                "task attempt failed, will retry"
            );
            if defaults.email_on_retry && !defaults.email.is_empty() {
                info!(job_id = %job.id(), recipients = ?defaults.email, "retry notification requested");
            }
            tokio::time::sleep(defaults.retry_delay).await;
        }

        match &state {
            TaskState::Success => {
                info!(job_id = %job.id(), logical_date = %logical_date, attempts, "task succeeded");
            }
            TaskState::Failed { error: message, .. } => {
                error!(job_id = %job.id(), logical_date = %logical_date, attempts, error = %message, "task failed");
            }
            TaskState::TimedOut { after } => {
                error!(
                    job_id = %job.id(),
                    logical_date = %logical_date,
                    attempts,
                    timeout_secs = after.as_secs(),
                    "task timed out"
                );
            }
        }
        if !state.is_success() && defaults.email_on_failure && !defaults.email.is_empty() {
            info!(job_id = %job.id(), recipients = ?defaults.email, "failure notification requested");
        }

        TaskRun {
            job_id: job.id().to_string(),
            logical_date,
            attempts,
            state,
            started_at,
            finished_at: Utc::now(),
        }
    }

    async fn attempt(&self, job: &IngestionJob, timeout: Option<Duration>) -> TaskState {
        let execution = job.execute(self.engine.as_ref(), self.variables.as_ref());
        let result = match timeout {
            Some(limit) => match tokio::time::timeout(limit, execution).await {
                Ok(result) => result,
                Err(_) => return TaskState::TimedOut { after: limit },
            },
            None => execution.await,
        };
        match result {
            Ok(_) => TaskState::Success,
            Err(e) => TaskState::Failed {
                error: e.to_string(),
                kind: Some(e.kind()),
            },
        }
    }
}

mod secs {
    use std::time::Duration;

    use serde::Serializer;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use metaload_core::MapVariables;
    use metaload_job::{JobSchedule, ScheduleInterval, TaskDefaults};
    use metaload_pipeline::testing::{Outcome, ScriptedEngine};
    use metaload_recipe::{Recipe, SinkSpec, SourceSpec};

    fn job(retries: u32, timeout: Option<Duration>) -> IngestionJob {
        let schedule = JobSchedule::new(ScheduleInterval::daily()).with_defaults(TaskDefaults {
            retries,
            retry_delay: Duration::from_secs(300),
            execution_timeout: timeout,
            ..TaskDefaults::default()
        });
        IngestionJob::from_fn("runner_test", schedule, |vars| {
            Ok(Recipe::new(
                SourceSpec::new("mysql").with("password", vars.get("pw")?),
                SinkSpec::new("console"),
            ))
        })
    }

    fn runner(engine: &ScriptedEngine) -> TaskRunner {
        TaskRunner::new(
            Arc::new(engine.clone()),
            Arc::new(MapVariables::from_pairs([("pw", "x")])),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn retries_then_succeeds() {
        let engine = ScriptedEngine::with_outcomes([Outcome::FailRun("transient".into())]);
        let run = runner(&engine).run(&job(1, None), Utc::now()).await;
        assert_eq!(run.state, TaskState::Success);
        assert_eq!(run.attempts, 2);
        assert_eq!(engine.run_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_retries_report_last_error() {
        let engine = ScriptedEngine::with_outcomes([
            Outcome::FailRun("first".into()),
            Outcome::FailRun("second".into()),
        ]);
        let run = runner(&engine).run(&job(1, None), Utc::now()).await;
        assert_eq!(run.attempts, 2);
        match run.state {
            TaskState::Failed { error, kind } => {
                assert!(error.contains("second"));
                assert_eq!(kind, Some(FailureKind::Run));
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_counts_as_failed_attempt() {
        let engine = ScriptedEngine::with_outcomes([
            Outcome::Hang(Duration::from_secs(3 * 3600)),
            Outcome::Hang(Duration::from_secs(3 * 3600)),
        ]);
        let run = runner(&engine)
            .run(&job(1, Some(Duration::from_secs(7200))), Utc::now())
            .await;
        assert_eq!(run.attempts, 2);
        assert_eq!(
            run.state,
            TaskState::TimedOut {
                after: Duration::from_secs(7200)
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn without_retries_makes_one_attempt() {
        let engine = ScriptedEngine::with_outcomes([Outcome::FailRun("boom".into())]);
        let run = runner(&engine).without_retries().run(&job(3, None), Utc::now()).await;
        assert_eq!(run.attempts, 1);
        assert!(!run.state.is_success());
    }

    #[tokio::test]
    async fn missing_variable_fails_without_engine_run() {
        let engine = ScriptedEngine::new();
        let runner = TaskRunner::new(Arc::new(engine.clone()), Arc::new(MapVariables::default()));
        let run = runner.without_retries().run(&job(0, None), Utc::now()).await;
        assert!(matches!(
            run.state,
            TaskState::Failed { kind: Some(FailureKind::Variable), .. }
        ));
        assert_eq!(engine.run_count(), 0);
    }
}
