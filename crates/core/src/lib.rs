pub mod config;
pub mod variables;

pub use config::Config;
pub use variables::{EnvVariables, LayeredVariables, MapVariables, VariableError, VariableStore};
