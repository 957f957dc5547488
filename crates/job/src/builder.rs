//! Recipe builders: how a job turns resolved variables into a recipe.

use metaload_core::VariableStore;
use metaload_recipe::{Recipe, RecipeTemplate};

use crate::error::JobError;

/// Builds a fresh [`Recipe`] for one run.
pub trait RecipeBuilder: Send + Sync {
    fn build(&self, vars: &dyn VariableStore) -> Result<Recipe, JobError>;
}

impl RecipeBuilder for RecipeTemplate {
    fn build(&self, vars: &dyn VariableStore) -> Result<Recipe, JobError> {
        Ok(self.render(vars)?)
    }
}

/// Adapter for plain functions and closures.
pub struct BuildFn<F>(pub F);

impl<F> RecipeBuilder for BuildFn<F>
where
    F: Fn(&dyn VariableStore) -> Result<Recipe, JobError> + Send + Sync,
{
    fn build(&self, vars: &dyn VariableStore) -> Result<Recipe, JobError> {
        (self.0)(vars)
    }
}
