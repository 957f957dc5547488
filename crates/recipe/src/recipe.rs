//! The [`Recipe`]: source + sink handed to the ingestion engine once per run.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::connector::{SinkSpec, SourceSpec};
use crate::error::RecipeError;

/// Replacement text for redacted values.
pub const REDACTED: &str = "********";

/// Substrings that mark a config key as security-sensitive.
const SENSITIVE_KEY_MARKERS: &[&str] = &[
    "password",
    "secret",
    "token",
    "credential",
    "private_key",
    "api_key",
];

/// Ingestion job configuration.
///
/// Built fresh for every run and passed once to the engine. Two recipes
/// built from the same inputs compare equal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Recipe {
    pub source: SourceSpec,
    pub sink: SinkSpec,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pipeline_name: Option<String>,
}

impl Recipe {
    pub fn new(source: SourceSpec, sink: SinkSpec) -> Self {
        Self {
            source,
            sink,
            pipeline_name: None,
        }
    }

    pub fn with_pipeline_name(mut self, name: impl Into<String>) -> Self {
        self.pipeline_name = Some(name.into());
        self
    }

    pub fn from_yaml(yaml: &str) -> Result<Self, RecipeError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn to_yaml(&self) -> Result<String, RecipeError> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn to_json(&self) -> Result<String, RecipeError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check that both connector tags are present.
    ///
    /// Connector fields are deliberately left alone: the engine owns them.
    pub fn validate(&self) -> Result<(), RecipeError> {
        if self.source.kind.as_str().trim().is_empty() {
            return Err(RecipeError::Invalid("source.type must not be empty".to_string()));
        }
        if self.sink.kind.as_str().trim().is_empty() {
            return Err(RecipeError::Invalid("sink.type must not be empty".to_string()));
        }
        Ok(())
    }

    /// Copy of this recipe with every security-sensitive value masked.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        redact_map(&mut copy.source.config);
        redact_map(&mut copy.sink.config);
        copy
    }
}

/// Whether a config key names a secret (case-insensitive substring match).
pub fn is_sensitive_key(key: &str) -> bool {
    let lower = key.to_ascii_lowercase();
    SENSITIVE_KEY_MARKERS.iter().any(|m| lower.contains(m))
}

fn redact_map(map: &mut Map<String, Value>) {
    for (key, value) in map.iter_mut() {
        if is_sensitive_key(key) && !value.is_object() {
            *value = Value::String(REDACTED.to_string());
        } else {
            redact_value(value);
        }
    }
}

fn redact_value(value: &mut Value) {
    match value {
        Value::Object(map) => redact_map(map),
        Value::Array(items) => items.iter_mut().for_each(redact_value),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connector::{SinkKind, SourceKind};

    fn mysql_recipe() -> Recipe {
        Recipe::new(
            SourceSpec::new(SourceKind::Mysql)
                .with("username", "datahub")
                .with("password", "hunter2")
                .with("database", "datahub")
                .with("host_port", "mysql:3306"),
            SinkSpec::new(SinkKind::DatahubRest).with("server", "http://datahub-gms:8080"),
        )
    }

    #[test]
    fn yaml_round_trip_preserves_structure() {
        let recipe = mysql_recipe();
        let yaml = recipe.to_yaml().unwrap();
        assert!(!yaml.contains("pipeline_name"));
        assert_eq!(Recipe::from_yaml(&yaml).unwrap(), recipe);
    }

    #[test]
    fn unknown_top_level_key_rejected() {
        let yaml = "source: {type: mysql}\nsink: {type: console}\nsinks: []\n";
        assert!(Recipe::from_yaml(yaml).is_err());
    }

    #[test]
    fn missing_config_defaults_to_empty_map() {
        let recipe = Recipe::from_yaml("source: {type: mysql}\nsink: {type: console}\n").unwrap();
        assert!(recipe.source.config.is_empty());
        assert_eq!(recipe.sink.kind, SinkKind::Console);
    }

    #[test]
    fn validate_rejects_empty_type() {
        let recipe = Recipe::from_yaml("source: {type: ''}\nsink: {type: console}\n").unwrap();
        assert!(matches!(recipe.validate(), Err(RecipeError::Invalid(_))));
        assert!(mysql_recipe().validate().is_ok());
    }

    #[test]
    fn redaction_masks_nested_secrets_only() {
        let recipe = Recipe::new(
            SourceSpec::new(SourceKind::Bigquery)
                .with("project_id", "my-project")
                .with("options", serde_json::json!({"credentials_path": "/secrets/bq.json"})),
            SinkSpec::new(SinkKind::DatahubRest)
                .with("server", "http://10.0.0.5:8080")
                .with("token", "abc"),
        );
        let redacted = recipe.redacted();
        assert_eq!(redacted.source.config["project_id"], "my-project");
        assert_eq!(redacted.source.config["options"]["credentials_path"], REDACTED);
        assert_eq!(redacted.sink.config["server"], "http://10.0.0.5:8080");
        assert_eq!(redacted.sink.config["token"], REDACTED);
        // Source recipe untouched.
        assert_eq!(recipe.sink.config["token"], "abc");
    }

    #[test]
    fn redaction_descends_into_arrays() {
        let recipe = Recipe::new(
            SourceSpec::new(SourceKind::Snowflake).with(
                "options",
                serde_json::json!([
                    {"password": "p1", "warehouse": "COMPUTE_WH"},
                    {"nested": [{"api_key": "k2"}]},
                    "plain",
                ]),
            ),
            SinkSpec::new(SinkKind::Console),
        );
        let redacted = recipe.redacted();
        let options = &redacted.source.config["options"];
        assert_eq!(options[0]["password"], REDACTED);
        assert_eq!(options[0]["warehouse"], "COMPUTE_WH");
        assert_eq!(options[1]["nested"][0]["api_key"], REDACTED);
        assert_eq!(options[2], "plain");
    }

    #[test]
    fn sensitive_key_detection_is_case_insensitive() {
        assert!(is_sensitive_key("PASSWORD"));
        assert!(is_sensitive_key("client_secret"));
        assert!(!is_sensitive_key("host_port"));
    }
}
