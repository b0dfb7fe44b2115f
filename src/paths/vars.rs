use crate::error::{AssetError, AssetResult};

/// Render the literal placeholder for a variable name.
fn placeholder(var: &str) -> String {
    format!("{{{var}}}")
}

/// Substitute declared `{variable}` placeholders in a reference.
///
/// Only declared variables are substituted; any other braced text is left
/// untouched. A declared variable that occurs in the input but has no value
/// in the supplied context is an error.
pub fn substitute(
    input: &str,
    vars: &[String],
    values: &std::collections::BTreeMap<String, String>,
) -> AssetResult<String> {
    let mut resolved = input.to_string();

    for var in vars {
        let token = placeholder(var);
        if !resolved.contains(&token) {
            continue;
        }

        let value = values.get(var).ok_or_else(|| AssetError::MissingVariable {
            input: input.to_string(),
            name: var.clone(),
        })?;
        resolved = resolved.replace(&token, value);
    }

    Ok(resolved)
}

/// Check that a target path carries a placeholder for every declared variable.
///
/// Enforced when the target path is staged, so that a missing placeholder
/// surfaces at construction time rather than at resolution time.
pub fn validate_target_path(target_path: &str, vars: &[String]) -> AssetResult<()> {
    for var in vars {
        if !target_path.contains(&placeholder(var)) {
            return Err(AssetError::MissingPlaceholder {
                target_path: target_path.to_string(),
                var: var.clone(),
            });
        }
    }

    Ok(())
}
