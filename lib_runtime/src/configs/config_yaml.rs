use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::OnceLock;

use regex::{Captures, Regex};
use serde_json::Value;
use tracing::debug;

use super::{ConfigError, ConfigTree};

/// `$$`, `${NAME}` or `$NAME`.
fn template_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\$(?:(\$)|\{([A-Za-z_][A-Za-z0-9_]*)\}|([A-Za-z_][A-Za-z0-9_]*))")
            .expect("template pattern is a valid regex")
    })
}

impl ConfigTree {
    /// Loads `path`, substituting from the process environment.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let env: HashMap<String, String> = std::env::vars().collect();
        Self::load_with_env(path, &env)
    }

    pub fn load_with_env(
        path: impl AsRef<Path>,
        env: &HashMap<String, String>,
    ) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        debug!("Loading configuration from {}", path.display());
        let text = fs::read_to_string(path)?;
        Self::from_yaml_str(&text, env)
    }

    /// Parses a YAML document and resolves every string leaf against `env`.
    ///
    /// A string that contained a substitution and then reads as a YAML
    /// literal other than a string (number, boolean, null, list, map) is
    /// replaced by that literal. An empty document yields an empty tree.
    pub fn from_yaml_str(text: &str, env: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let root: Value = if text.trim().is_empty() {
            Value::Object(Default::default())
        } else {
            serde_yml::from_str(text).map_err(|e| ConfigError::Yaml(e.to_string()))?
        };
        let root = match root {
            Value::Null => Value::Object(Default::default()),
            other => other,
        };
        Ok(Self::from_value(resolve(root, env)?))
    }
}

fn resolve(value: Value, env: &HashMap<String, String>) -> Result<Value, ConfigError> {
    match value {
        Value::String(text) => resolve_string(&text, env),
        Value::Array(items) => items
            .into_iter()
            .map(|item| resolve(item, env))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        Value::Object(map) => map
            .into_iter()
            .map(|(key, item)| Ok((key, resolve(item, env)?)))
            .collect::<Result<serde_json::Map<_, _>, ConfigError>>()
            .map(Value::Object),
        other => Ok(other),
    }
}

fn resolve_string(text: &str, env: &HashMap<String, String>) -> Result<Value, ConfigError> {
    let substituted = substitute(text, env)?;
    if substituted == text {
        return Ok(Value::String(substituted));
    }
    Ok(coerce_literal(substituted))
}

/// Expands `$NAME`, `${NAME}` and `$$` in `text`. A `$` followed by anything
/// else is kept as-is.
pub fn substitute(text: &str, env: &HashMap<String, String>) -> Result<String, ConfigError> {
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for caps in template_pattern().captures_iter(text) {
        let Some(whole) = caps.get(0) else { continue };
        out.push_str(&text[last..whole.start()]);
        out.push_str(&expansion(&caps, env)?);
        last = whole.end();
    }
    out.push_str(&text[last..]);
    Ok(out)
}

fn expansion(caps: &Captures<'_>, env: &HashMap<String, String>) -> Result<String, ConfigError> {
    if caps.get(1).is_some() {
        return Ok("$".to_string());
    }
    let name = caps
        .get(2)
        .or_else(|| caps.get(3))
        .map(|m| m.as_str())
        .unwrap_or_default();
    env.get(name)
        .cloned()
        .ok_or_else(|| ConfigError::MissingEnvVar(name.to_string()))
}

fn coerce_literal(text: String) -> Value {
    if text.trim().is_empty() {
        return Value::String(text);
    }
    match serde_yml::from_str::<Value>(&text) {
        Ok(Value::String(_)) | Err(_) => Value::String(text),
        Ok(literal) => literal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn substitutes_both_forms_and_escapes() {
        let env = env(&[("HOME", "/home/ckir"), ("APP", "crisp")]);
        assert_eq!(substitute("$HOME/${APP}_data", &env).unwrap(), "/home/ckir/crisp_data");
        assert_eq!(substitute("cost: $$5", &env).unwrap(), "cost: $5");
        assert_eq!(substitute("trailing $", &env).unwrap(), "trailing $");
        assert_eq!(substitute("no templates", &env).unwrap(), "no templates");
    }

    #[test]
    fn undefined_variable_fails() {
        let err = substitute("${NOPE}", &env(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(name) if name == "NOPE"));
    }

    #[test]
    fn substituted_literals_are_coerced() {
        let env = env(&[("PORT", "8080"), ("DEBUG", "true"), ("LIST", "[1, 2]"), ("NAME", "007x")]);
        let yaml = "port: $PORT\ndebug: ${DEBUG}\nlist: $LIST\nname: $NAME\nquoted: '42'\n";
        let tree = ConfigTree::from_yaml_str(yaml, &env).unwrap();

        assert_eq!(tree.get("port"), Some(&json!(8080)));
        assert_eq!(tree.get("debug"), Some(&json!(true)));
        assert_eq!(tree.get("list"), Some(&json!([1, 2])));
        assert_eq!(tree.get_str("name"), Some("007x"));
        assert_eq!(tree.get_str("quoted"), Some("42"));
    }

    #[test]
    fn nested_structures_are_resolved() {
        let env = env(&[("DATA", "/srv/data")]);
        let yaml = "crisp:\n  dirs:\n    - $DATA/source\n    - $DATA/target\n  retries: 3\n";
        let tree = ConfigTree::from_yaml_str(yaml, &env).unwrap();

        assert_eq!(tree.get_str("crisp.dirs.0"), Some("/srv/data/source"));
        assert_eq!(tree.get_str("crisp.dirs.1"), Some("/srv/data/target"));
        assert_eq!(tree.get("crisp.retries"), Some(&json!(3)));
    }

    #[test]
    fn missing_variable_aborts_loading() {
        let result = ConfigTree::from_yaml_str("a:\n  b: $UNSET_FOR_TEST\n", &env(&[]));
        assert!(matches!(result, Err(ConfigError::MissingEnvVar(_))));
    }

    #[test]
    fn empty_document_is_an_empty_tree() {
        assert_eq!(ConfigTree::from_yaml_str("", &env(&[])).unwrap(), ConfigTree::default());
        assert_eq!(ConfigTree::from_yaml_str("~\n", &env(&[])).unwrap(), ConfigTree::default());
    }

    #[test]
    fn malformed_yaml_is_reported() {
        let result = ConfigTree::from_yaml_str("a: [1, 2\n", &env(&[]));
        assert!(matches!(result, Err(ConfigError::Yaml(_))));
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "crisp:\n  data_dir: ${{ROOT}}/data").unwrap();

        let tree = ConfigTree::load_with_env(file.path(), &env(&[("ROOT", "/opt")])).unwrap();
        assert_eq!(tree.require_str("crisp.data_dir").unwrap(), "/opt/data");
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = ConfigTree::load_with_env(dir.path().join("absent.yaml"), &env(&[]));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }
}
