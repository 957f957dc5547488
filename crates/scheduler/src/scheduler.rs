//! [`JobScheduler`]: tracks every registered job's schedule state and runs
//! due jobs on a fixed tick.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use metaload_job::IngestionJob;
use tokio::sync::Notify;
use tracing::{debug, info};

use crate::due::{due_runs, next_tick};
use crate::error::{Result, SchedulerError};
use crate::runner::{TaskRun, TaskRunner};

/// Scheduling state for a single job.
#[derive(Debug, Clone)]
pub struct ScheduleEntry {
    pub job: IngestionJob,
    /// Start date resolved at registration.
    pub start: DateTime<Utc>,
    /// Logical date of the last scheduled run (success or failure).
    pub last_logical: Option<DateTime<Utc>>,
    pub last_run: Option<TaskRun>,
}

impl ScheduleEntry {
    pub fn next_due(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let after = match self.last_logical {
            Some(last) if last > now => last,
            _ => now,
        };
        next_tick(self.job.schedule(), self.start, after)
    }
}

pub struct JobScheduler {
    entries: BTreeMap<String, ScheduleEntry>,
    runner: TaskRunner,
    tick: Duration,
}

impl JobScheduler {
    pub fn new(runner: TaskRunner, tick: Duration) -> Self {
        Self {
            entries: BTreeMap::new(),
            runner,
            tick,
        }
    }

    /// Register a job, resolving its start date against the current time.
    pub fn register(&mut self, job: IngestionJob) -> Result<()> {
        self.register_at(job, Utc::now())
    }

    pub fn register_at(&mut self, job: IngestionJob, now: DateTime<Utc>) -> Result<()> {
        if self.entries.contains_key(job.id()) {
            return Err(SchedulerError::DuplicateJob(job.id().to_string()));
        }
        let start = job.schedule().start_date.resolve(now);
        info!(
            job_id = %job.id(),
            interval = %job.schedule().interval,
            start = %start,
            enabled = job.enabled(),
            "registered job"
        );
        self.entries.insert(
            job.id().to_string(),
            ScheduleEntry {
                job,
                start,
                last_logical: None,
                last_run: None,
            },
        );
        Ok(())
    }

    pub fn get(&self, job_id: &str) -> Option<&ScheduleEntry> {
        self.entries.get(job_id)
    }

    pub fn entries(&self) -> impl Iterator<Item = &ScheduleEntry> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `(job_id, logical_date)` pairs due at `now`, ordered by job id then date.
    /// Disabled jobs are never due.
    pub fn due(&self, now: DateTime<Utc>) -> Vec<(String, DateTime<Utc>)> {
        self.entries
            .values()
            .filter(|e| e.job.enabled())
            .flat_map(|e| {
                due_runs(e.job.schedule(), e.start, e.last_logical, now)
                    .into_iter()
                    .map(|logical| (e.job.id().to_string(), logical))
            })
            .collect()
    }

    /// Mark `logical` as the latest handled logical date of `job_id`.
    pub fn record(&mut self, job_id: &str, logical: DateTime<Utc>) {
        if let Some(entry) = self.entries.get_mut(job_id) {
            if entry.last_logical.map_or(true, |last| logical > last) {
                entry.last_logical = Some(logical);
            }
        }
    }

    /// Run everything due at `now`, one run after another.
    ///
    /// A failed run still advances the job's logical date; retries already
    /// happened inside the runner.
    pub async fn tick_once(&mut self, now: DateTime<Utc>) -> Vec<TaskRun> {
        let due = self.due(now);
        if due.is_empty() {
            debug!("no jobs due");
            return Vec::new();
        }

        let mut runs = Vec::with_capacity(due.len());
        for (job_id, logical) in due {
            let Some(job) = self.entries.get(&job_id).map(|e| e.job.clone()) else {
                continue;
            };
            let run = self.runner.run(&job, logical).await;
            self.record(&job_id, logical);
            if let Some(entry) = self.entries.get_mut(&job_id) {
                entry.last_run = Some(run.clone());
            }
            runs.push(run);
        }
        runs
    }

    /// Manual trigger with the current time as logical date. Does not move
    /// the schedule.
    pub async fn run_now(&self, job_id: &str) -> Result<TaskRun> {
        let entry = self
            .entries
            .get(job_id)
            .ok_or_else(|| SchedulerError::UnknownJob(job_id.to_string()))?;
        Ok(self.runner.run(&entry.job, Utc::now()).await)
    }

    /// Tick until `shutdown` is notified. Signal it with
    /// [`Notify::notify_one`] so a notification sent between ticks is not
    /// lost. A run in progress at shutdown is dropped.
    pub async fn run_loop(&mut self, shutdown: Arc<Notify>) {
        info!(
            jobs = self.entries.len(),
            tick_secs = self.tick.as_secs(),
            "scheduler starting"
        );
        let tick = self.tick;
        loop {
            tokio::select! {
                _ = shutdown.notified() => {
                    info!("scheduler shutting down");
                    break;
                }
                _ = async {
                    self.tick_once(Utc::now()).await;
                    tokio::time::sleep(tick).await;
                } => {}
            }
        }
    }
}
