//! Props vetting.
//!
//! Props come from the caller, but they are deserialized inside the
//! runtime where a key like `__proto__` lands on object literals and can
//! pollute `Object.prototype` for every later render. Vetting rejects the
//! dangerous keys at any depth, and bounds nesting so a pathological value
//! cannot recurse the host.

use serde_json::Value;

const FORBIDDEN_KEYS: &[&str] = &["__proto__", "constructor", "prototype"];
const MAX_DEPTH: usize = 32;

#[derive(Debug, thiserror::Error)]
pub enum PropsError {
    #[error("forbidden key '{0}' in props")]
    ForbiddenKey(String),

    #[error("props nested deeper than {MAX_DEPTH} levels")]
    TooDeep,
}

/// Check `props` without copying it; an `Ok` value is safe to serialize
/// into the runtime.
pub fn vet(props: &Value) -> Result<(), PropsError> {
    walk(props, 0)
}

fn walk(value: &Value, depth: usize) -> Result<(), PropsError> {
    if depth > MAX_DEPTH {
        return Err(PropsError::TooDeep);
    }
    match value {
        Value::Object(map) => {
            for (key, nested) in map {
                if FORBIDDEN_KEYS.contains(&key.as_str()) {
                    return Err(PropsError::ForbiddenKey(key.clone()));
                }
                walk(nested, depth + 1)?;
            }
            Ok(())
        }
        Value::Array(items) => {
            for item in items {
                walk(item, depth + 1)?;
            }
            Ok(())
        }
        _ => Ok(()),
    }
}
