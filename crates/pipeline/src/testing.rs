//! Scripted engine for exercising jobs and schedulers without a real engine.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use metaload_recipe::Recipe;

use crate::engine::{Pipeline, PipelineEngine};
use crate::error::PipelineError;
use crate::report::{RunReport, RunStatus};

/// What the next created pipeline does.
#[derive(Debug, Clone)]
pub enum Outcome {
    Succeed,
    /// Run completes with a failure status carrying `message`.
    FailRun(String),
    /// `create` rejects the recipe.
    RejectConfig(String),
    /// Run sleeps before succeeding.
    Hang(Duration),
}

/// Records every recipe it receives and replays queued [`Outcome`]s.
///
/// When the queue is empty, runs succeed.
#[derive(Clone, Default)]
pub struct ScriptedEngine {
    outcomes: Arc<Mutex<VecDeque<Outcome>>>,
    received: Arc<Mutex<Vec<Recipe>>>,
    runs: Arc<Mutex<usize>>,
}

impl ScriptedEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_outcomes(outcomes: impl IntoIterator<Item = Outcome>) -> Self {
        let engine = Self::new();
        engine.outcomes.lock().unwrap().extend(outcomes);
        engine
    }

    pub fn push(&self, outcome: Outcome) {
        self.outcomes.lock().unwrap().push_back(outcome);
    }

    /// Recipes passed to `create`, in order.
    pub fn received(&self) -> Vec<Recipe> {
        self.received.lock().unwrap().clone()
    }

    /// Number of times `run` was called.
    pub fn run_count(&self) -> usize {
        *self.runs.lock().unwrap()
    }
}

#[async_trait]
impl PipelineEngine for ScriptedEngine {
    async fn create(&self, recipe: &Recipe) -> Result<Box<dyn Pipeline>, PipelineError> {
        self.received.lock().unwrap().push(recipe.clone());
        let outcome = self
            .outcomes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Outcome::Succeed);
        if let Outcome::RejectConfig(message) = outcome {
            return Err(PipelineError::Config(message));
        }
        Ok(Box::new(ScriptedPipeline {
            outcome,
            runs: Arc::clone(&self.runs),
            report: RunReport::pending(),
        }))
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

struct ScriptedPipeline {
    outcome: Outcome,
    runs: Arc<Mutex<usize>>,
    report: RunReport,
}

#[async_trait]
impl Pipeline for ScriptedPipeline {
    async fn run(&mut self) -> Result<(), PipelineError> {
        *self.runs.lock().unwrap() += 1;
        self.report.mark_started();
        match &self.outcome {
            Outcome::Succeed | Outcome::RejectConfig(_) => {
                self.report.mark_finished(RunStatus::Success)
            }
            Outcome::FailRun(message) => {
                self.report.failures.push(message.clone());
                self.report.mark_finished(RunStatus::Failure);
            }
            Outcome::Hang(duration) => {
                tokio::time::sleep(*duration).await;
                self.report.mark_finished(RunStatus::Success);
            }
        }
        Ok(())
    }

    fn report(&self) -> &RunReport {
        &self.report
    }
}
