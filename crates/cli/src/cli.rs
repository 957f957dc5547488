use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// Scheduled metadata ingestion.
///
/// Resolves job variables, builds source/sink recipes and runs them through
/// the external ingestion engine.
#[derive(Parser, Debug)]
#[command(name = "metaload", version, about)]
pub struct CliArgs {
    /// Directory of YAML job definitions (overrides JOBS_DIR).
    #[arg(long, global = true)]
    pub jobs_dir: Option<PathBuf>,

    /// JSON or TOML variables file layered after the environment
    /// (overrides VARIABLES_FILE).
    #[arg(long, global = true)]
    pub variables: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List registered jobs and their schedules.
    List,

    /// Print the recipe a job would run, after variable resolution.
    Render {
        job: String,

        #[arg(long, value_enum, default_value_t = Format::Yaml)]
        format: Format,

        /// Print sensitive values instead of masking them.
        #[arg(long)]
        show_secrets: bool,
    },

    /// Run a job once, now.
    Run {
        job: String,

        /// Single attempt, ignoring the job's retry count.
        #[arg(long)]
        no_retry: bool,

        /// Ask the engine to validate without writing to the sink.
        #[arg(long)]
        dry_run: bool,
    },

    /// Run the scheduler until interrupted.
    Serve,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Format {
    Yaml,
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_render_with_global_flags() {
        let args = CliArgs::try_parse_from([
            "metaload",
            "render",
            "ingest_bigquery_by_config",
            "--format",
            "json",
            "--jobs-dir",
            "/srv/jobs",
        ])
        .unwrap();
        assert_eq!(args.jobs_dir, Some(PathBuf::from("/srv/jobs")));
        match args.command {
            Command::Render { job, format, show_secrets } => {
                assert_eq!(job, "ingest_bigquery_by_config");
                assert_eq!(format, Format::Json);
                assert!(!show_secrets);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn run_requires_job() {
        assert!(CliArgs::try_parse_from(["metaload", "run"]).is_err());
        let args = CliArgs::try_parse_from(["metaload", "run", "x", "--no-retry"]).unwrap();
        assert!(matches!(args.command, Command::Run { no_retry: true, dry_run: false, .. }));
    }
}
