//! The value store: reads the user's `key=value` file and performs one-pass
//! `${NAME}` interpolation with process-environment fallback.

use std::collections::HashMap;
use std::path::Path;

use crate::error::{ShepherdError, ShepherdResult};

/// Flat string mapping loaded from a value file. This is the sole `${...}`
/// source consumed by the resolver (see [`crate::config::resolver`]).
pub type ValueMap = HashMap<String, String>;

/// Load a `key=value` file, skipping blank lines and `#`-comments, and
/// interpolating `${NAME}` references against keys already defined earlier
/// in the file, falling back to the process environment. A line with no `=`
/// is a fatal, not a silent skip.
pub fn load(path: &Path) -> ShepherdResult<ValueMap> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| ShepherdError::io(format!("read value file {}", path.display()), e))?;
    load_str(&contents, path)
}

fn load_str(contents: &str, path: &Path) -> ShepherdResult<ValueMap> {
    let mut values = ValueMap::new();

    for (idx, raw_line) in contents.lines().enumerate() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((key, raw_value)) = line.split_once('=') else {
            return Err(ShepherdError::MalformedValueLine {
                path: path.to_path_buf(),
                line_no: idx + 1,
                content: raw_line.to_string(),
            });
        };

        let key = key.trim().to_string();
        let value = interpolate(raw_value.trim(), &values);
        values.insert(key, value);
    }

    Ok(values)
}

/// Substitute `${NAME}` occurrences in `text` using `values` first, then the
/// process environment. Unresolved placeholders are left literal.
fn interpolate(text: &str, values: &ValueMap) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(start) = rest.find("${") {
        let Some(end) = rest[start..].find('}') else {
            out.push_str(rest);
            return out;
        };
        let end = start + end;

        out.push_str(&rest[..start]);
        let name = &rest[start + 2..end];

        if let Some(v) = values.get(name) {
            out.push_str(v);
        } else if let Ok(v) = std::env::var(name) {
            out.push_str(&v);
        } else {
            out.push_str("${");
            out.push_str(name);
            out.push('}');
        }

        rest = &rest[end + 1..];
    }

    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn skips_blanks_and_comments() {
        let values = load_str("\n# a comment\n\nHOME_DIR=/tmp\n", Path::new("test")).unwrap();
        assert_eq!(values.get("HOME_DIR"), Some(&"/tmp".to_string()));
        assert_eq!(values.len(), 1);
    }

    #[test]
    fn interpolates_earlier_keys() {
        let values = load_str("BASE=/opt\nCHILD=${BASE}/child\n", Path::new("test")).unwrap();
        assert_eq!(values.get("CHILD"), Some(&"/opt/child".to_string()));
    }

    #[test]
    #[serial]
    fn falls_back_to_process_env_then_literal() {
        std::env::set_var("SHEPHERD_TEST_VAR_STORE", "from-env");
        let values = load_str(
            "A=${SHEPHERD_TEST_VAR_STORE}\nB=${SHEPHERD_TEST_UNSET_VAR}\n",
            Path::new("test"),
        )
        .unwrap();
        std::env::remove_var("SHEPHERD_TEST_VAR_STORE");
        assert_eq!(values.get("A"), Some(&"from-env".to_string()));
        assert_eq!(values.get("B"), Some(&"${SHEPHERD_TEST_UNSET_VAR}".to_string()));
    }

    #[test]
    fn malformed_line_is_fatal() {
        let err = load_str("NO_EQUALS_HERE\n", Path::new("test")).unwrap_err();
        assert!(matches!(err, ShepherdError::MalformedValueLine { .. }));
    }
}
