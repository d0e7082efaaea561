use std::str::FromStr;

use thiserror::Error;

/// Errors produced while reading configuration from the process environment.
#[derive(Debug, Error)]
pub enum EnvVarError {
    /// The variable is set but its value could not be parsed.
    #[error("Invalid value for environment variable {name}: {value:?}")]
    Invalid { name: String, value: String },
}

/// Reads an optional environment variable.
///
/// Unset, non-unicode and whitespace-only values are all reported as `None`,
/// so an exported-but-empty override never replaces a configured value.
pub fn get_env_var_opt(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Reads and parses an optional environment variable.
///
/// Returns `Ok(None)` when the variable is absent and an error when it is
/// present but does not parse as `T`.
pub fn parse_env_var<T: FromStr>(name: &str) -> Result<Option<T>, EnvVarError> {
    match get_env_var_opt(name) {
        None => Ok(None),
        Some(value) => value
            .parse::<T>()
            .map(Some)
            .map_err(|_| EnvVarError::Invalid {
                name: name.to_string(),
                value,
            }),
    }
}
