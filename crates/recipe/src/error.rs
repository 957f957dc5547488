use metaload_core::VariableError;

/// Errors raised while parsing, serializing or validating a recipe.
#[derive(Debug, thiserror::Error)]
pub enum RecipeError {
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid recipe: {0}")]
    Invalid(String),
}

/// Errors raised while rendering a [`RecipeTemplate`](crate::RecipeTemplate).
#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    /// A placeholder references a variable the store does not define.
    #[error(transparent)]
    Variable(#[from] VariableError),

    /// Malformed placeholder syntax.
    #[error("template syntax error at {path}: {message}")]
    Syntax { path: String, message: String },

    #[error(transparent)]
    Recipe(#[from] RecipeError),
}
