//! `${key}` placeholder templating for recipes.
//!
//! Placeholders may appear anywhere inside a string config value and are
//! replaced by the looked-up variable (`http://${datahub-gms-ip}:8080`).
//! `$${` produces a literal `${`. Keys and connector type tags are never
//! templated.

use std::collections::BTreeSet;

use metaload_core::VariableStore;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::TemplateError;
use crate::recipe::Recipe;

/// A recipe whose string values may contain `${key}` placeholders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecipeTemplate(Recipe);

impl RecipeTemplate {
    pub fn new(recipe: Recipe) -> Self {
        Self(recipe)
    }

    /// The unrendered recipe, placeholders intact.
    pub fn raw(&self) -> &Recipe {
        &self.0
    }

    /// All variable keys referenced by this template, sorted and deduplicated.
    pub fn placeholders(&self) -> Result<BTreeSet<String>, TemplateError> {
        let mut keys = BTreeSet::new();
        let mut collect = |key: &str| -> Result<String, TemplateError> {
            keys.insert(key.to_string());
            Ok(String::new())
        };
        walk_recipe(&self.0, &mut collect)?;
        Ok(keys)
    }

    /// Render every placeholder against `vars`, producing a fresh [`Recipe`].
    ///
    /// Fails on the first missing variable, before anything is returned.
    pub fn render(&self, vars: &dyn VariableStore) -> Result<Recipe, TemplateError> {
        let mut lookup = |key: &str| -> Result<String, TemplateError> { Ok(vars.get(key)?) };
        let rendered = walk_recipe(&self.0, &mut lookup)?;
        rendered.validate()?;
        debug!(
            source = %rendered.source.kind,
            sink = %rendered.sink.kind,
            store = vars.name(),
            "rendered recipe template"
        );
        Ok(rendered)
    }
}

impl From<Recipe> for RecipeTemplate {
    fn from(recipe: Recipe) -> Self {
        Self(recipe)
    }
}

type Resolver<'a> = dyn FnMut(&str) -> Result<String, TemplateError> + 'a;

fn walk_recipe(recipe: &Recipe, resolve: &mut Resolver<'_>) -> Result<Recipe, TemplateError> {
    let mut out = recipe.clone();
    out.source.config = walk_map(&recipe.source.config, "source.config", resolve)?;
    out.sink.config = walk_map(&recipe.sink.config, "sink.config", resolve)?;
    if let Some(name) = &recipe.pipeline_name {
        out.pipeline_name = Some(interpolate(name, "pipeline_name", resolve)?);
    }
    Ok(out)
}

fn walk_map(
    map: &Map<String, Value>,
    path: &str,
    resolve: &mut Resolver<'_>,
) -> Result<Map<String, Value>, TemplateError> {
    let mut out = Map::new();
    for (key, value) in map {
        let child = format!("{path}.{key}");
        out.insert(key.clone(), walk_value(value, &child, resolve)?);
    }
    Ok(out)
}

fn walk_value(value: &Value, path: &str, resolve: &mut Resolver<'_>) -> Result<Value, TemplateError> {
    Ok(match value {
        Value::String(s) => Value::String(interpolate(s, path, resolve)?),
        Value::Object(map) => Value::Object(walk_map(map, path, resolve)?),
        Value::Array(items) => Value::Array(
            items
                .iter()
                .enumerate()
                .map(|(i, v)| walk_value(v, &format!("{path}[{i}]"), resolve))
                .collect::<Result<_, _>>()?,
        ),
        other => other.clone(),
    })
}

/// Substitute every `${key}` in `input`.
pub(crate) fn interpolate(
    input: &str,
    path: &str,
    resolve: &mut Resolver<'_>,
) -> Result<String, TemplateError> {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(pos) = rest.find('$') {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];

        if let Some(after) = tail.strip_prefix("$${") {
            out.push_str("${");
            rest = after;
        } else if let Some(after) = tail.strip_prefix("${") {
            let end = after.find('}').ok_or_else(|| TemplateError::Syntax {
                path: path.to_string(),
                message: "unterminated '${' placeholder".to_string(),
            })?;
            let key = after[..end].trim();
            if key.is_empty() {
                return Err(TemplateError::Syntax {
                    path: path.to_string(),
                    message: "empty placeholder".to_string(),
                });
            }
            out.push_str(&resolve(key)?);
            rest = &after[end + 1..];
        } else {
            out.push('$');
            rest = &tail[1..];
        }
    }
    out.push_str(rest);
    Ok(out)
}
