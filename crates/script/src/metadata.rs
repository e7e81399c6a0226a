//! Optional `metadata()` function of a build script

use serde::Serialize;
use starlark::values::dict::DictRef;
use starlark::values::Value;
use stevedore_errors::ScriptError;

/// What `metadata()` returned
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScriptMetadata {
    pub name: Option<String>,
    pub description: Option<String>,
}

impl ScriptMetadata {
    /// Workflow name: the declared name, else `fallback`
    #[must_use]
    pub fn workflow_name(&self, fallback: &str) -> String {
        self.name.clone().unwrap_or_else(|| fallback.to_string())
    }
}

/// Parse the dict returned by `metadata()`
///
/// # Errors
///
/// Returns `ScriptError::Metadata` if the value is not a dict, a field has
/// the wrong type, or `name` is blank.
pub fn parse_metadata(path: &str, value: Value<'_>) -> Result<ScriptMetadata, ScriptError> {
    let invalid = |message: String| ScriptError::Metadata {
        path: path.to_string(),
        message,
    };

    let dict = DictRef::from_value(value).ok_or_else(|| {
        invalid(format!(
            "metadata() must return a dict, got {}",
            value.get_type()
        ))
    })?;

    let get_string = |key: &str| -> Result<Option<String>, ScriptError> {
        match dict.get_str(key) {
            None => Ok(None),
            Some(val) if val.is_none() => Ok(None),
            Some(val) => val.unpack_str().map(|s| Some(s.to_string())).ok_or_else(|| {
                invalid(format!(
                    "metadata field '{key}' must be a string, got {}",
                    val.get_type()
                ))
            }),
        }
    };

    let name = get_string("name")?;
    if name.as_deref().is_some_and(|n| n.trim().is_empty()) {
        return Err(invalid("metadata 'name' cannot be empty".to_string()));
    }

    Ok(ScriptMetadata {
        name,
        description: get_string("description")?,
    })
}
