//! Connector type tags and the `{ type, config }` connector descriptor.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Source connector tag. Unknown names are preserved verbatim in
/// [`SourceKind::Custom`]; the engine decides whether it recognises them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SourceKind {
    Mysql,
    Postgres,
    Bigquery,
    Snowflake,
    Redshift,
    Mssql,
    Hive,
    Custom(String),
}

impl SourceKind {
    pub fn as_str(&self) -> &str {
        match self {
            SourceKind::Mysql => "mysql",
            SourceKind::Postgres => "postgres",
            SourceKind::Bigquery => "bigquery",
            SourceKind::Snowflake => "snowflake",
            SourceKind::Redshift => "redshift",
            SourceKind::Mssql => "mssql",
            SourceKind::Hive => "hive",
            SourceKind::Custom(name) => name,
        }
    }
}

impl From<String> for SourceKind {
    fn from(s: String) -> Self {
        match s.as_str() {
            "mysql" => SourceKind::Mysql,
            "postgres" => SourceKind::Postgres,
            "bigquery" => SourceKind::Bigquery,
            "snowflake" => SourceKind::Snowflake,
            "redshift" => SourceKind::Redshift,
            "mssql" => SourceKind::Mssql,
            "hive" => SourceKind::Hive,
            _ => SourceKind::Custom(s),
        }
    }
}

impl From<&str> for SourceKind {
    fn from(s: &str) -> Self {
        SourceKind::from(s.to_string())
    }
}

impl From<SourceKind> for String {
    fn from(kind: SourceKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sink connector tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SinkKind {
    /// Metadata catalog REST endpoint.
    DatahubRest,
    DatahubKafka,
    File,
    Console,
    Custom(String),
}

impl SinkKind {
    pub fn as_str(&self) -> &str {
        match self {
            SinkKind::DatahubRest => "datahub-rest",
            SinkKind::DatahubKafka => "datahub-kafka",
            SinkKind::File => "file",
            SinkKind::Console => "console",
            SinkKind::Custom(name) => name,
        }
    }
}

impl From<String> for SinkKind {
    fn from(s: String) -> Self {
        match s.as_str() {
            "datahub-rest" => SinkKind::DatahubRest,
            "datahub-kafka" => SinkKind::DatahubKafka,
            "file" => SinkKind::File,
            "console" => SinkKind::Console,
            _ => SinkKind::Custom(s),
        }
    }
}

impl From<&str> for SinkKind {
    fn from(s: &str) -> Self {
        SinkKind::from(s.to_string())
    }
}

impl From<SinkKind> for String {
    fn from(kind: SinkKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for SinkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A connector descriptor: type tag plus connector-specific parameters.
///
/// The config holds exactly the fields that were set. Nothing is defaulted
/// and nothing is validated here; required fields are the engine's concern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectorSpec<K> {
    #[serde(rename = "type")]
    pub kind: K,
    #[serde(default)]
    pub config: Map<String, Value>,
}

pub type SourceSpec = ConnectorSpec<SourceKind>;
pub type SinkSpec = ConnectorSpec<SinkKind>;

impl<K> ConnectorSpec<K> {
    pub fn new(kind: impl Into<K>) -> Self {
        Self {
            kind: kind.into(),
            config: Map::new(),
        }
    }

    /// Set a config field, replacing any previous value under `key`.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.config.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.config.get(key)
    }
}
