//! Dot-delimited access paths such as `"user.address.city"`.

use super::value::Value;

/// Split a path into segments.
///
/// Returns `None` if the path contains anything other than word characters,
/// `$` and `.`.
pub fn parse_path(path: &str) -> Option<Vec<String>> {
    let valid = path
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$' || c == '.');
    if !valid {
        return None;
    }
    Some(path.split('.').map(str::to_string).collect())
}

/// Resolve parsed segments against `root` with tracked reads.
///
/// Record segments read keys; numeric segments index lists. Anything that
/// cannot be walked resolves to `Undefined`.
pub fn resolve(root: &Value, segments: &[String]) -> Value {
    let mut current = root.clone();
    for segment in segments {
        current = match &current {
            Value::Record(record) => record.get(segment),
            Value::List(list) => segment
                .parse::<usize>()
                .ok()
                .and_then(|i| list.get(i))
                .unwrap_or_default(),
            _ => return Value::Undefined,
        };
    }
    current
}
