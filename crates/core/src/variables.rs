//! Variable and secret lookup.
//!
//! Jobs never read process state directly: every connection parameter that is
//! not a literal is resolved through a [`VariableStore`] handed to the job at
//! run time. Values are fetched on every call and never cached here.

use std::collections::HashMap;
use std::env;
use std::path::Path;

use tracing::debug;

/// Errors returned by a [`VariableStore`] lookup.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VariableError {
    /// The key is not defined in the store.
    #[error("variable '{key}' is not defined in {store}")]
    Missing { key: String, store: String },

    /// The store itself could not be read.
    #[error("variable store {store} failed: {message}")]
    Backend { store: String, message: String },
}

/// Key → string lookup used to resolve secrets and variables.
pub trait VariableStore: Send + Sync {
    /// Resolve `key`, failing with [`VariableError::Missing`] when absent.
    fn get(&self, key: &str) -> Result<String, VariableError>;

    /// Human-readable store name used in error messages.
    fn name(&self) -> &str;
}

// ── Environment ───────────────────────────────────────────────

/// Reads variables from the process environment as `{prefix}{KEY}`.
///
/// The key is upper-cased and every character outside `[A-Z0-9]` becomes `_`,
/// so `datahub-gms-ip` is read from `METALOAD_VAR_DATAHUB_GMS_IP`.
#[derive(Debug, Clone)]
pub struct EnvVariables {
    prefix: String,
}

impl EnvVariables {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Environment variable name that backs `key`.
    pub fn env_key(&self, key: &str) -> String {
        let normalized: String = key
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() {
                    c.to_ascii_uppercase()
                } else {
                    '_'
                }
            })
            .collect();
        format!("{}{}", self.prefix, normalized)
    }
}

impl Default for EnvVariables {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_VARIABLE_PREFIX)
    }
}

impl VariableStore for EnvVariables {
    fn get(&self, key: &str) -> Result<String, VariableError> {
        let env_key = self.env_key(key);
        debug!(key = %key, env_key = %env_key, "resolving variable from environment");
        match env::var(&env_key) {
            Ok(v) if !v.is_empty() => Ok(v),
            _ => Err(VariableError::Missing {
                key: key.to_string(),
                store: self.name().to_string(),
            }),
        }
    }

    fn name(&self) -> &str {
        "environment"
    }
}

// ── In-memory / file ──────────────────────────────────────────

/// In-memory variable map, optionally loaded from a JSON or TOML file.
#[derive(Debug, Clone, Default)]
pub struct MapVariables {
    name: String,
    values: HashMap<String, String>,
}

impl MapVariables {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            values: HashMap::new(),
        }
    }

    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let mut store = Self::new("memory");
        for (k, v) in pairs {
            store.insert(k, v);
        }
        store
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Load a flat JSON object (`.json`) or TOML table (any other extension).
    ///
    /// Numbers and booleans are stringified. Nested tables, arrays and nulls
    /// are rejected.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, VariableError> {
        let path = path.as_ref();
        let store_name = format!("file {}", path.display());
        let backend = |message: String| VariableError::Backend {
            store: store_name.clone(),
            message,
        };

        let content = std::fs::read_to_string(path).map_err(|e| backend(e.to_string()))?;
        let is_json = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        let value: serde_json::Value = if is_json {
            serde_json::from_str(&content).map_err(|e| backend(e.to_string()))?
        } else {
            let table: toml::Table = toml::from_str(&content).map_err(|e| backend(e.to_string()))?;
            serde_json::to_value(table).map_err(|e| backend(e.to_string()))?
        };

        let object = value
            .as_object()
            .ok_or_else(|| backend("expected a top-level object".to_string()))?;

        let mut store = Self::new(store_name.clone());
        for (key, value) in object {
            let text = match value {
                serde_json::Value::String(s) => s.clone(),
                serde_json::Value::Number(n) => n.to_string(),
                serde_json::Value::Bool(b) => b.to_string(),
                _ => return Err(backend(format!("variable '{key}' must be a scalar"))),
            };
            store.insert(key.clone(), text);
        }
        Ok(store)
    }
}

impl VariableStore for MapVariables {
    fn get(&self, key: &str) -> Result<String, VariableError> {
        debug!(key = %key, store = %self.name, "resolving variable");
        self.values
            .get(key)
            .cloned()
            .ok_or_else(|| VariableError::Missing {
                key: key.to_string(),
                store: self.name.clone(),
            })
    }

    fn name(&self) -> &str {
        &self.name
    }
}

// ── Layered ───────────────────────────────────────────────────

/// Ordered chain of stores. The first store that defines a key wins.
pub struct LayeredVariables {
    layers: Vec<Box<dyn VariableStore>>,
    name: String,
}

impl LayeredVariables {
    pub fn new() -> Self {
        Self {
            layers: Vec::new(),
            name: "layered".to_string(),
        }
    }

    pub fn with_layer(mut self, store: impl VariableStore + 'static) -> Self {
        self.layers.push(Box::new(store));
        self.name = format!(
            "layered [{}]",
            self.layers
                .iter()
                .map(|l| l.name())
                .collect::<Vec<_>>()
                .join(", ")
        );
        self
    }
}

impl Default for LayeredVariables {
    fn default() -> Self {
        Self::new()
    }
}

impl VariableStore for LayeredVariables {
    fn get(&self, key: &str) -> Result<String, VariableError> {
        for layer in &self.layers {
            match layer.get(key) {
                Ok(v) => return Ok(v),
                Err(VariableError::Missing { .. }) => continue,
                Err(e) => return Err(e),
            }
        }
        Err(VariableError::Missing {
            key: key.to_string(),
            store: self.name.clone(),
        })
    }

    fn name(&self) -> &str {
        &self.name
    }
}
