use std::env;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

fn profiled_env_or(profile: &str, key: &str, default: &str) -> String {
    profiled_env_opt(profile, key).unwrap_or_else(|| default.to_string())
}

fn profiled_env_u64(profile: &str, key: &str, default: u64) -> u64 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn profiled_env_bool(profile: &str, key: &str) -> bool {
    profiled_env_opt(profile, key)
        .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false)
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Active profile name (empty = default).
    pub profile: String,
    pub jobs: JobsConfig,
    pub variables: VariablesConfig,
    pub engine: EngineConfig,
    pub scheduler: SchedulerConfig,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `METALOAD_PROFILE` env var. When set (e.g. `PROD`),
    /// every key is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Self {
        let profile = env_or("METALOAD_PROFILE", "").to_uppercase();
        Self::for_profile(&profile)
    }

    /// Build config for a specific named profile (empty string = default).
    pub fn for_profile(profile: &str) -> Self {
        let p = profile.to_uppercase();
        let p = p.as_str();
        Self {
            profile: p.to_string(),
            jobs: JobsConfig::from_env_profiled(p),
            variables: VariablesConfig::from_env_profiled(p),
            engine: EngineConfig::from_env_profiled(p),
            scheduler: SchedulerConfig::from_env_profiled(p),
        }
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    /// Print a summary for startup logs. Carries no variable values.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded (profile: {}):", self.profile_label());
        tracing::info!("  jobs:       dir={}", self.jobs.dir.display());
        tracing::info!(
            "  variables:  env_prefix={}, file={}",
            self.variables.env_prefix,
            self.variables
                .file
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "(none)".to_string())
        );
        tracing::info!(
            "  engine:     command={}, work_dir={}, dry_run={}",
            self.engine.command,
            self.engine.work_dir.display(),
            self.engine.dry_run
        );
        tracing::info!("  scheduler:  tick={}s", self.scheduler.tick_secs);
    }

    /// Return a redacted view safe for display (no secrets).
    pub fn redacted_summary(&self) -> serde_json::Value {
        serde_json::json!({
            "profile": self.profile_label(),
            "jobs": { "dir": self.jobs.dir },
            "variables": {
                "env_prefix": self.variables.env_prefix,
                "file_configured": self.variables.file.is_some(),
            },
            "engine": {
                "command": self.engine.command,
                "work_dir": self.engine.work_dir,
                "dry_run": self.engine.dry_run,
            },
            "scheduler": { "tick_secs": self.scheduler.tick_secs },
        })
    }
}

// ── Jobs ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobsConfig {
    /// Directory scanned for YAML job definitions.
    pub dir: PathBuf,
}

impl JobsConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            dir: PathBuf::from(profiled_env_or(p, "JOBS_DIR", "jobs")),
        }
    }
}

// ── Variables ─────────────────────────────────────────────────

pub const DEFAULT_VARIABLE_PREFIX: &str = "METALOAD_VAR_";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariablesConfig {
    pub env_prefix: String,
    /// Optional JSON or TOML file layered after the environment.
    pub file: Option<PathBuf>,
}

impl VariablesConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            env_prefix: profiled_env_or(p, "VARIABLE_ENV_PREFIX", DEFAULT_VARIABLE_PREFIX),
            file: profiled_env_opt(p, "VARIABLES_FILE").map(PathBuf::from),
        }
    }
}

// ── Engine ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Executable of the external ingestion engine.
    pub command: String,
    /// Where per-run recipe files are written.
    pub work_dir: PathBuf,
    pub dry_run: bool,
}

impl EngineConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            command: profiled_env_or(p, "ENGINE_COMMAND", "datahub"),
            work_dir: profiled_env_opt(p, "ENGINE_WORK_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(env::temp_dir),
            dry_run: profiled_env_bool(p, "ENGINE_DRY_RUN"),
        }
    }
}

// ── Scheduler ─────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    pub tick_secs: u64,
}

impl SchedulerConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            tick_secs: profiled_env_u64(p, "SCHEDULER_TICK_SECS", 30).max(1),
        }
    }
}
