//! Subcommand handlers.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use tokio::sync::Notify;
use tracing::{info, warn};

use metaload_core::config::{EngineConfig, VariablesConfig};
use metaload_core::{Config, EnvVariables, LayeredVariables, MapVariables, VariableStore};
use metaload_job::{builtin, IngestionJob, JobLoader};
use metaload_pipeline::{CliEngine, CliEngineConfig};
use metaload_scheduler::{next_tick, JobScheduler, TaskRunner};

use crate::cli::Format;

/// Everything a subcommand needs, assembled once at startup.
pub struct App {
    pub config: Config,
    pub jobs: Vec<IngestionJob>,
    pub variables: Arc<dyn VariableStore>,
}

impl App {
    pub fn new(
        mut config: Config,
        jobs_dir: Option<PathBuf>,
        variables_file: Option<PathBuf>,
    ) -> Result<Self> {
        if let Some(dir) = jobs_dir {
            config.jobs.dir = dir;
        }
        if let Some(file) = variables_file {
            config.variables.file = Some(file);
        }

        let variables = build_variables(&config.variables)?;
        let jobs = load_jobs(&config.jobs.dir);
        Ok(Self {
            config,
            jobs,
            variables: Arc::new(variables),
        })
    }

    fn job(&self, id: &str) -> Result<&IngestionJob> {
        match self.jobs.iter().find(|j| j.id() == id) {
            Some(job) => Ok(job),
            None => bail!(
                "unknown job '{}' (known: {})",
                id,
                self.jobs.iter().map(IngestionJob::id).collect::<Vec<_>>().join(", ")
            ),
        }
    }

    fn runner(&self, dry_run: bool) -> TaskRunner {
        let engine = build_engine(&self.config.engine, dry_run);
        TaskRunner::new(Arc::new(engine), Arc::clone(&self.variables))
    }
}

/// Environment first, then the optional variables file.
pub fn build_variables(config: &VariablesConfig) -> Result<LayeredVariables> {
    let mut layered = LayeredVariables::new().with_layer(EnvVariables::new(&config.env_prefix));
    if let Some(path) = &config.file {
        let file = MapVariables::from_file(path)
            .with_context(|| format!("failed to load variables file {}", path.display()))?;
        info!(path = %path.display(), count = file.len(), "loaded variables file");
        layered = layered.with_layer(file);
    }
    Ok(layered)
}

/// Built-in jobs followed by the YAML definitions under `dir`. A definition
/// reusing a built-in id is skipped.
pub fn load_jobs(dir: &Path) -> Vec<IngestionJob> {
    let mut jobs = builtin::builtin_jobs();
    let mut ids: HashSet<String> = jobs.iter().map(|j| j.id().to_string()).collect();

    let report = JobLoader::new(dir).load_all();
    let failures = report.failures().count();
    if failures > 0 {
        warn!(failures, dir = %dir.display(), "some job definitions failed to load");
    }
    for doc in report.documents {
        if !ids.insert(doc.id.clone()) {
            warn!(job_id = %doc.id, "job definition shadows a built-in job, skipping");
            continue;
        }
        jobs.push(IngestionJob::from_document(doc));
    }
    jobs
}

pub fn build_engine(config: &EngineConfig, dry_run: bool) -> CliEngine {
    CliEngine::new(CliEngineConfig {
        command: config.command.clone(),
        base_args: Vec::new(),
        work_dir: config.work_dir.clone(),
        dry_run: config.dry_run || dry_run,
    })
}

pub fn list(app: &App) {
    let now = Utc::now();
    for job in &app.jobs {
        let schedule = job.schedule();
        let start = schedule.start_date.resolve(now);
        let next = if job.enabled() {
            next_tick(schedule, start, now)
                .map(|t| t.to_rfc3339())
                .unwrap_or_else(|| "-".to_string())
        } else {
            "disabled".to_string()
        };
        println!(
            "{:<36} {:<14} catchup={:<5} retries={} next={}",
            job.id(),
            schedule.interval.to_string(),
            schedule.catchup,
            schedule.defaults.retries,
            next
        );
    }
}

pub fn render(app: &App, job_id: &str, format: Format, show_secrets: bool) -> Result<()> {
    let job = app.job(job_id)?;
    let mut recipe = job
        .build_recipe(app.variables.as_ref())
        .with_context(|| format!("failed to build recipe for '{job_id}'"))?;
    if !show_secrets {
        recipe = recipe.redacted();
    }
    let out = match format {
        Format::Yaml => recipe.to_yaml()?,
        Format::Json => recipe.to_json()?,
    };
    println!("{}", out.trim_end());
    Ok(())
}

pub async fn run(app: &App, job_id: &str, no_retry: bool, dry_run: bool) -> Result<()> {
    let job = app.job(job_id)?;
    let mut runner = app.runner(dry_run);
    if no_retry {
        runner = runner.without_retries();
    }

    let run = runner.run(job, Utc::now()).await;
    println!("{}", serde_json::to_string_pretty(&run)?);
    if !run.state.is_success() {
        bail!("job '{}' {} after {} attempt(s)", job_id, run.state.label(), run.attempts);
    }
    Ok(())
}

pub async fn serve(app: App) -> Result<()> {
    let runner = app.runner(false);
    let tick = Duration::from_secs(app.config.scheduler.tick_secs);
    let mut scheduler = JobScheduler::new(runner, tick);
    for job in app.jobs {
        scheduler.register(job)?;
    }

    let shutdown = Arc::new(Notify::new());
    let signal = Arc::clone(&shutdown);
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("shutdown signal received");
        signal.notify_one();
    });

    scheduler.run_loop(shutdown).await;
    info!("metaload scheduler exited cleanly");
    Ok(())
}

/// Wait for SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for ctrl_c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {},
                    _ = sigterm.recv() => {},
                }
            }
            Err(e) => {
                warn!(error = %e, "failed to register SIGTERM handler");
                ctrl_c.await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        ctrl_c.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const JOB: &str = "id: JOB_ID\nschedule:\n  interval: 1d\nrecipe:\n  source: {type: mysql}\n  sink: {type: console}\n";

    #[test]
    fn yaml_jobs_follow_builtins_and_cannot_shadow_them() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.yml"), JOB.replace("JOB_ID", "extra_job")).unwrap();
        fs::write(
            dir.path().join("b.yml"),
            JOB.replace("JOB_ID", builtin::MYSQL_JOB_ID),
        )
        .unwrap();

        let jobs = load_jobs(dir.path());
        let ids: Vec<&str> = jobs.iter().map(IngestionJob::id).collect();
        assert_eq!(
            ids,
            vec![builtin::MYSQL_JOB_ID, builtin::BIGQUERY_JOB_ID, "extra_job"]
        );
    }

    #[test]
    fn variables_file_is_layered_after_env() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vars.toml");
        fs::write(&path, "shared = \"from-file\"\nonly_file = \"f\"\n").unwrap();
        std::env::set_var("CLITESTVARS_SHARED", "from-env");

        let vars = build_variables(&VariablesConfig {
            env_prefix: "CLITESTVARS_".to_string(),
            file: Some(path),
        })
        .unwrap();
        assert_eq!(vars.get("shared").unwrap(), "from-env");
        assert_eq!(vars.get("only_file").unwrap(), "f");
        assert!(vars.get("absent").is_err());
    }

    #[test]
    fn missing_variables_file_is_an_error() {
        let result = build_variables(&VariablesConfig {
            env_prefix: "CLITESTMISSING_".to_string(),
            file: Some(PathBuf::from("/nonexistent/metaload/vars.toml")),
        });
        assert!(result.is_err());
    }

    #[test]
    fn dry_run_flag_or_config_enables_dry_run() {
        let config = EngineConfig {
            command: "datahub".to_string(),
            work_dir: std::env::temp_dir(),
            dry_run: false,
        };
        assert!(!build_engine(&config, false).config().dry_run);
        assert!(build_engine(&config, true).config().dry_run);
    }
}
