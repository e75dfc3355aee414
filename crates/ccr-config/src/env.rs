use crate::error::{ConfigError, ConfigResult};

/// Expand `${VAR}` references from the process environment.
///
/// An unset variable is an error rather than an empty string, so a missing
/// password does not silently become an empty one.
pub fn resolve_env(value: &str) -> ConfigResult<String> {
    let mut result = String::with_capacity(value.len());
    let mut rest = value;

    while let Some(start) = rest.find("${") {
        result.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let end = after.find('}').ok_or_else(|| ConfigError::UnterminatedVar {
            value: value.to_string(),
        })?;

        let name = &after[..end];
        let resolved = std::env::var(name).map_err(|_| ConfigError::MissingEnvVar {
            name: name.to_string(),
        })?;
        result.push_str(&resolved);
        rest = &after[end + 1..];
    }

    result.push_str(rest);
    Ok(result)
}
