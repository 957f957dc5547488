//! YAML job definitions.
//!
//! ```yaml
//! id: ingest_postgres_nightly
//! schedule:
//!   interval: "0 2 * * *"
//!   start_date: { days_ago: 1 }
//! recipe:
//!   source:
//!     type: postgres
//!     config:
//!       host_port: "pg.internal:5432"
//!       password: "${pg-password}"
//!   sink:
//!     type: datahub-rest
//!     config: { server: "http://${datahub-gms-ip}:8080" }
//! ```

use metaload_recipe::RecipeTemplate;
use serde::{Deserialize, Serialize};

use crate::error::{JobError, Result};
use crate::schedule::JobSchedule;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JobDocument {
    pub id: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub tags: Vec<String>,
    pub schedule: JobSchedule,
    pub recipe: RecipeTemplate,
}

fn default_true() -> bool {
    true
}

impl JobDocument {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let doc: Self = serde_yaml::from_str(yaml).map_err(|e| JobError::Definition(e.to_string()))?;
        doc.validate()?;
        Ok(doc)
    }

    /// Structural checks that do not need any variable values.
    pub fn validate(&self) -> Result<()> {
        validate_job_id(&self.id)?;
        self.schedule.validate().map_err(JobError::Definition)?;
        self.recipe.raw().validate().map_err(|e| JobError::Definition(e.to_string()))?;
        // Surfaces malformed placeholders at load time rather than at run time.
        self.recipe.placeholders()?;
        Ok(())
    }
}

/// Job ids are `[A-Za-z0-9_.-]+`.
pub fn validate_job_id(id: &str) -> Result<()> {
    if id.is_empty() {
        return Err(JobError::Definition("job id must not be empty".to_string()));
    }
    if let Some(bad) = id
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.')))
    {
        return Err(JobError::Definition(format!(
            "job id '{id}' contains invalid character '{bad}'"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::ScheduleInterval;

    const DOC: &str = r#"
id: ingest_postgres_nightly
tags: [nightly]
schedule:
  interval: "0 2 * * *"
  start_date: { days_ago: 1 }
recipe:
  source:
    type: postgres
    config:
      host_port: "pg.internal:5432"
      password: "${pg-password}"
  sink:
    type: datahub-rest
    config: { server: "http://${datahub-gms-ip}:8080" }
"#;

    #[test]
    fn parses_document() {
        let doc = JobDocument::from_yaml(DOC).unwrap();
        assert_eq!(doc.id, "ingest_postgres_nightly");
        assert!(doc.enabled);
        assert_eq!(doc.tags, vec!["nightly"]);
        assert_eq!(doc.schedule.interval, ScheduleInterval::Cron("0 0 2 * * *".to_string()));
        let keys: Vec<String> = doc.recipe.placeholders().unwrap().into_iter().collect();
        assert_eq!(keys, vec!["datahub-gms-ip", "pg-password"]);
    }

    #[test]
    fn rejects_bad_id() {
        let yaml = DOC.replace("ingest_postgres_nightly", "bad id");
        assert!(matches!(JobDocument::from_yaml(&yaml), Err(JobError::Definition(_))));
    }

    #[test]
    fn rejects_malformed_placeholder() {
        let yaml = DOC.replace("${pg-password}", "${pg-password");
        assert!(matches!(JobDocument::from_yaml(&yaml), Err(JobError::Template(_))));
    }

    #[test]
    fn rejects_out_of_range_start_date() {
        let yaml = DOC.replace("days_ago: 1", "days_ago: 4000000000");
        match JobDocument::from_yaml(&yaml) {
            Err(JobError::Definition(message)) => assert!(message.contains("days_ago")),
            other => panic!("expected definition error, got {other:?}"),
        }
    }

    #[test]
    fn rejects_out_of_range_interval() {
        let yaml = DOC.replace(r#"interval: "0 2 * * *""#, "interval: 100000000d");
        match JobDocument::from_yaml(&yaml) {
            Err(JobError::Definition(message)) => assert!(message.contains("exceeds the maximum")),
            other => panic!("expected definition error, got {other:?}"),
        }
    }

    #[test]
    fn rejects_unknown_field() {
        let yaml = format!("{DOC}owner: someone\n");
        assert!(matches!(JobDocument::from_yaml(&yaml), Err(JobError::Definition(_))));
    }
}
