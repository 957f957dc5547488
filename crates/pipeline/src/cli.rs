//! [`CliEngine`]: runs recipes through the `datahub ingest` command line.
//!
//! `create` writes the recipe to a private temp file; `run` spawns
//! `{command} {base_args..} ingest -c <file> [--dry-run]` and waits for it.
//! The file is deleted when the pipeline is dropped, so resolved secrets
//! only live on disk for the duration of one run.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use metaload_recipe::Recipe;
use tempfile::NamedTempFile;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::engine::{Pipeline, PipelineEngine};
use crate::error::PipelineError;
use crate::report::{RunReport, RunStatus};

/// Lines of engine output kept as failure context.
const OUTPUT_TAIL_LINES: usize = 20;

#[derive(Debug, Clone)]
pub struct CliEngineConfig {
    /// Engine executable (`datahub`).
    pub command: String,
    /// Arguments placed before `ingest`, e.g. `["-m", "datahub"]` for a
    /// Python interpreter.
    pub base_args: Vec<String>,
    /// Directory for per-run recipe files.
    pub work_dir: PathBuf,
    pub dry_run: bool,
}

impl Default for CliEngineConfig {
    fn default() -> Self {
        Self {
            command: "datahub".to_string(),
            base_args: Vec::new(),
            work_dir: std::env::temp_dir(),
            dry_run: false,
        }
    }
}

pub struct CliEngine {
    config: CliEngineConfig,
}

impl CliEngine {
    pub fn new(config: CliEngineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CliEngineConfig {
        &self.config
    }

    /// Validate and stage `recipe`, returning the concrete pipeline.
    pub fn prepare(&self, recipe: &Recipe) -> Result<CliPipeline, PipelineError> {
        recipe
            .validate()
            .map_err(|e| PipelineError::Config(e.to_string()))?;
        let yaml = recipe
            .to_yaml()
            .map_err(|e| PipelineError::Config(e.to_string()))?;

        let mut file = tempfile::Builder::new()
            .prefix("metaload-recipe-")
            .suffix(".yml")
            .tempfile_in(&self.config.work_dir)?;
        file.write_all(yaml.as_bytes())?;
        file.flush()?;

        debug!(
            path = %file.path().display(),
            source = %recipe.source.kind,
            sink = %recipe.sink.kind,
            "staged recipe file"
        );

        Ok(CliPipeline {
            config: self.config.clone(),
            recipe_file: file,
            report: RunReport::pending(),
        })
    }
}

#[async_trait]
impl PipelineEngine for CliEngine {
    async fn create(&self, recipe: &Recipe) -> Result<Box<dyn Pipeline>, PipelineError> {
        Ok(Box::new(self.prepare(recipe)?))
    }

    fn name(&self) -> &str {
        "datahub-cli"
    }
}

/// One staged run of the CLI engine.
pub struct CliPipeline {
    config: CliEngineConfig,
    recipe_file: NamedTempFile,
    report: RunReport,
}

impl CliPipeline {
    pub fn recipe_path(&self) -> &Path {
        self.recipe_file.path()
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.config.command);
        cmd.args(&self.config.base_args)
            .arg("ingest")
            .arg("-c")
            .arg(self.recipe_file.path());
        if self.config.dry_run {
            cmd.arg("--dry-run");
        }
        // A host-side timeout drops the future; take the child down with it.
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl Pipeline for CliPipeline {
    async fn run(&mut self) -> Result<(), PipelineError> {
        self.report = RunReport::pending();
        self.report.mark_started();
        info!(
            run_id = %self.report.run_id,
            command = %self.config.command,
            dry_run = self.config.dry_run,
            "starting engine run"
        );

        let output = self
            .command()
            .output()
            .await
            .map_err(|e| PipelineError::Spawn {
                command: self.config.command.clone(),
                message: e.to_string(),
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        debug!(run_id = %self.report.run_id, output = %tail(&stdout), "engine stdout");

        self.report.exit_code = output.status.code();
        self.report.warnings = warning_lines(&stdout, &stderr);
        if output.status.success() {
            self.report.mark_finished(RunStatus::Success);
            info!(run_id = %self.report.run_id, "engine run succeeded");
        } else {
            let context = if stderr.trim().is_empty() { tail(&stdout) } else { tail(&stderr) };
            if !context.is_empty() {
                self.report.failures.push(context);
            }
            self.report.mark_finished(RunStatus::Failure);
            warn!(
                run_id = %self.report.run_id,
                exit_code = ?self.report.exit_code,
                "engine run failed"
            );
        }
        Ok(())
    }

    fn report(&self) -> &RunReport {
        &self.report
    }
}

/// Lines mentioning a warning, from both streams, capped to the last
/// [`OUTPUT_TAIL_LINES`].
fn warning_lines(stdout: &str, stderr: &str) -> Vec<String> {
    let mut lines: Vec<String> = stdout
        .lines()
        .chain(stderr.lines())
        .filter(|l| l.to_ascii_lowercase().contains("warn"))
        .map(|l| l.trim().to_string())
        .collect();
    let excess = lines.len().saturating_sub(OUTPUT_TAIL_LINES);
    lines.drain(..excess);
    lines
}

fn tail(text: &str) -> String {
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    let start = lines.len().saturating_sub(OUTPUT_TAIL_LINES);
    lines[start..].join("\n")
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use metaload_recipe::{SinkKind, SinkSpec, SourceKind, SourceSpec};

    fn recipe() -> Recipe {
        Recipe::new(
            SourceSpec::new(SourceKind::Mysql).with("host_port", "mysql:3306"),
            SinkSpec::new(SinkKind::DatahubRest).with("server", "http://datahub-gms:8080"),
        )
    }

    /// Engine config that runs `script` through `sh`, standing in for the CLI.
    fn script_engine(dir: &Path, script: &str) -> CliEngine {
        let path = dir.join("fake-datahub.sh");
        std::fs::write(&path, script).unwrap();
        CliEngine::new(CliEngineConfig {
            command: "sh".to_string(),
            base_args: vec![path.display().to_string()],
            work_dir: dir.to_path_buf(),
            dry_run: false,
        })
    }

    #[tokio::test]
    async fn successful_run_passes_recipe_file() {
        let dir = tempfile::tempdir().unwrap();
        let captured = dir.path().join("captured.yml");
        let script = format!(
            "[ \"$1\" = ingest ] && [ \"$2\" = -c ] || exit 9\ncp \"$3\" \"{}\"\n",
            captured.display()
        );
        let engine = script_engine(dir.path(), &script);

        let mut pipeline = engine.create(&recipe()).await.unwrap();
        pipeline.run().await.unwrap();
        assert!(pipeline.report().is_success());
        assert_eq!(pipeline.report().exit_code, Some(0));
        assert!(pipeline.raise_from_status().is_ok());

        let written = std::fs::read_to_string(&captured).unwrap();
        assert_eq!(Recipe::from_yaml(&written).unwrap(), recipe());
    }

    #[tokio::test]
    async fn failing_run_captures_stderr_tail() {
        let dir = tempfile::tempdir().unwrap();
        let engine = script_engine(dir.path(), "echo 'connection refused: mysql:3306' >&2\nexit 3\n");

        let mut pipeline = engine.create(&recipe()).await.unwrap();
        pipeline.run().await.unwrap();
        let report = pipeline.report();
        assert_eq!(report.status, RunStatus::Failure);
        assert_eq!(report.exit_code, Some(3));

        match pipeline.raise_from_status() {
            Err(PipelineError::RunFailed { status, message }) => {
                assert_eq!(status, RunStatus::Failure);
                assert!(message.contains("connection refused"));
            }
            other => panic!("expected RunFailed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn warning_lines_are_reported_on_success() {
        let dir = tempfile::tempdir().unwrap();
        let engine = script_engine(
            dir.path(),
            "echo 'Pipeline finished'\necho 'WARNING: table orders has no primary key' >&2\nexit 0\n",
        );

        let mut pipeline = engine.create(&recipe()).await.unwrap();
        pipeline.run().await.unwrap();
        let report = pipeline.report();
        assert!(report.is_success());
        assert_eq!(report.warnings, vec!["WARNING: table orders has no primary key"]);
        assert!(report.failures.is_empty());
    }

    #[tokio::test]
    async fn dry_run_flag_is_forwarded() {
        let dir = tempfile::tempdir().unwrap();
        let mut engine = script_engine(dir.path(), "[ \"$4\" = --dry-run ] || exit 5\n");
        engine.config.dry_run = true;

        let mut pipeline = engine.create(&recipe()).await.unwrap();
        pipeline.run().await.unwrap();
        assert!(pipeline.report().is_success());
    }

    #[tokio::test]
    async fn missing_executable_is_spawn_error() {
        let dir = tempfile::tempdir().unwrap();
        let engine = CliEngine::new(CliEngineConfig {
            command: "definitely-not-a-real-engine-binary".to_string(),
            base_args: Vec::new(),
            work_dir: dir.path().to_path_buf(),
            dry_run: false,
        });
        let mut pipeline = engine.create(&recipe()).await.unwrap();
        assert!(matches!(pipeline.run().await, Err(PipelineError::Spawn { .. })));
    }

    #[tokio::test]
    async fn empty_source_type_rejected_at_create() {
        let dir = tempfile::tempdir().unwrap();
        let engine = script_engine(dir.path(), "exit 0\n");
        let mut bad = recipe();
        bad.source.kind = SourceKind::Custom(String::new());
        assert!(matches!(engine.create(&bad).await, Err(PipelineError::Config(_))));
    }

    #[test]
    fn recipe_file_removed_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let engine = script_engine(dir.path(), "exit 0\n");
        let pipeline = engine.prepare(&recipe()).unwrap();
        let path = pipeline.recipe_path().to_path_buf();
        assert!(path.exists());
        drop(pipeline);
        assert!(!path.exists());
    }

    #[test]
    fn warning_lines_are_capped() {
        let text: String = (0..30).map(|i| format!("warn {i}\n")).collect();
        let warnings = warning_lines(&text, "");
        assert_eq!(warnings.len(), OUTPUT_TAIL_LINES);
        assert_eq!(warnings.last().map(String::as_str), Some("warn 29"));
    }

    #[test]
    fn tail_keeps_last_lines() {
        let text: String = (0..30).map(|i| format!("line {i}\n")).collect();
        let kept = tail(&text);
        assert_eq!(kept.lines().count(), OUTPUT_TAIL_LINES);
        assert!(kept.ends_with("line 29"));
    }
}
