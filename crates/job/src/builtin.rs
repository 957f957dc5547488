//! Jobs that ship with the binary.
//!
//! Both read from a source warehouse/database and write to the catalog's
//! REST endpoint once a day. Credentials are looked up in the variable store
//! on every run; only non-secret connection details are literals.

use std::time::Duration;

use metaload_core::VariableStore;
use metaload_recipe::{Recipe, SinkKind, SinkSpec, SourceKind, SourceSpec};

use crate::error::Result;
use crate::job::IngestionJob;
use crate::schedule::{JobSchedule, ScheduleInterval, StartDate, TaskDefaults};

pub const MYSQL_JOB_ID: &str = "demo_ingest_mysql_by_config";
pub const BIGQUERY_JOB_ID: &str = "ingest_bigquery_by_config";

/// Catalog server used by the MySQL demo.
pub const MYSQL_DEMO_SERVER: &str = "http://datahub-gms:8080";

pub const MYSQL_USERNAME_VAR: &str = "mysql-username";
pub const MYSQL_PASSWORD_VAR: &str = "mysql-password";
pub const BIGQUERY_SECRET_VAR: &str = "bigquery_my_project_secret";
pub const GMS_IP_VAR: &str = "datahub-gms-ip";

/// Daily, starting two days back, no backfill, one retry after five minutes,
/// two-hour attempt limit.
pub fn default_schedule(description: &str) -> JobSchedule {
    JobSchedule::new(ScheduleInterval::daily())
        .starting(StartDate::days_ago(2))
        .catchup(false)
        .describe(description)
        .with_defaults(TaskDefaults {
            email: vec!["jdoe@example.com".to_string()],
            retries: 1,
            retry_delay: Duration::from_secs(5 * 60),
            execution_timeout: Some(Duration::from_secs(120 * 60)),
            ..TaskDefaults::default()
        })
}

pub fn mysql_recipe(vars: &dyn VariableStore) -> Result<Recipe> {
    let username = vars.get(MYSQL_USERNAME_VAR)?;
    let password = vars.get(MYSQL_PASSWORD_VAR)?;
    Ok(Recipe::new(
        SourceSpec::new(SourceKind::Mysql)
            .with("username", username)
            .with("password", password)
            .with("database", "datahub")
            .with("host_port", "mysql:3306"),
        SinkSpec::new(SinkKind::DatahubRest).with("server", MYSQL_DEMO_SERVER),
    ))
}

pub fn bigquery_recipe(vars: &dyn VariableStore) -> Result<Recipe> {
    let credentials_path = vars.get(BIGQUERY_SECRET_VAR)?;
    let gms_ip = vars.get(GMS_IP_VAR)?;
    Ok(Recipe::new(
        SourceSpec::new(SourceKind::Bigquery)
            .with("project_id", "<my-project-id>")
            .with(
                "options",
                serde_json::json!({ "credentials_path": credentials_path }),
            )
            .with("env", "DEV"),
        SinkSpec::new(SinkKind::DatahubRest).with("server", format!("http://{gms_ip}:8080")),
    ))
}

pub fn mysql_job() -> IngestionJob {
    IngestionJob::from_fn(
        MYSQL_JOB_ID,
        default_schedule("Ingests metadata from MySQL into the catalog"),
        mysql_recipe,
    )
}

pub fn bigquery_job() -> IngestionJob {
    IngestionJob::from_fn(
        BIGQUERY_JOB_ID,
        default_schedule("Ingests metadata from BigQuery into the catalog"),
        bigquery_recipe,
    )
}

pub fn builtin_jobs() -> Vec<IngestionJob> {
    vec![mysql_job(), bigquery_job()]
}
