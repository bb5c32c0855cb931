use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use lib_runtime::ConfigTree;

#[derive(Parser, Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
#[clap(about = "Extract order files, transform them and load them as Order entities", version)]
pub struct Config {
    #[clap(long, env = "CRISP_CONFIG_FILE", help = "Path to the YAML configuration file.")]
    #[serde(skip)]
    pub config_file: Option<PathBuf>,

    #[clap(long, env = "CRISP_DATA_DIR", help = "Directory holding the source, source.bak and target folders.")]
    pub data_dir: Option<PathBuf>,

    #[clap(long, env = "CRISP_TRANSFORMATIONS_FILE", help = "JSON file with the column transformation rules.")]
    pub transformations_file: Option<PathBuf>,

    #[clap(long, env = "CRISP_STREAM_KIND", help = "Stream backend (memory, none).")]
    pub stream_kind: Option<String>,

    #[clap(long, env = "CRISP_LOG_DIR", help = "Directory for log files.")]
    pub log_dir: Option<PathBuf>,

    #[clap(long, env = "CRISP_LOG_LEVEL", help = "Logging level (trace, debug, info, warn, error).")]
    pub log_level: Option<String>,
}

impl Config {
    // Merge two Config structs, where 'other' overrides 'self' for Some values
    fn merge(self, other: Config) -> Config {
        Config {
            config_file: other.config_file.or(self.config_file),
            data_dir: other.data_dir.or(self.data_dir),
            transformations_file: other.transformations_file.or(self.transformations_file),
            stream_kind: other.stream_kind.or(self.stream_kind),
            log_dir: other.log_dir.or(self.log_dir),
            log_level: other.log_level.or(self.log_level),
        }
    }

    pub fn defaults() -> Config {
        Config {
            config_file: Some(PathBuf::from("crisp.yml")),
            data_dir: Some(PathBuf::from("./data")),
            stream_kind: Some("memory".to_string()),
            log_dir: Some(PathBuf::from("./logs")),
            log_level: Some("info".to_string()),
            ..Default::default()
        }
    }
}

/// Result of `load_config`. Logging is not set up while the configuration is
/// read, so anything worth reporting is kept in `notes` for the caller.
#[derive(Debug)]
pub struct LoadedConfig {
    pub config: Config,
    pub tree: ConfigTree,
    pub notes: Vec<String>,
}

/// Loads the configuration the way `main` needs it: CLI and environment
/// (including a `.env` file already loaded by the caller) over the YAML
/// file's `crisp` section over built-in defaults.
pub fn load_config() -> Result<LoadedConfig> {
    let env: HashMap<String, String> = std::env::vars().collect();
    load_config_from(Config::parse(), &env)
}

pub fn load_config_from(cli: Config, env: &HashMap<String, String>) -> Result<LoadedConfig> {
    let mut notes = Vec::new();

    // 1. Defaults; the CLI may point at another config file
    let mut current_config = Config::defaults();
    let config_file_path = cli
        .config_file
        .clone()
        .or_else(|| current_config.config_file.clone())
        .unwrap_or_else(|| PathBuf::from("crisp.yml"));

    // 2. The YAML file, with $VARIABLES resolved from `env`
    let tree = if config_file_path.exists() {
        let tree = ConfigTree::load_with_env(&config_file_path, env)?;
        if tree.contains("crisp") {
            let file_config: Config = tree.get_as("crisp")?;
            current_config = current_config.merge(file_config);
        } else {
            notes.push(format!("No crisp section in {}", config_file_path.display()));
        }
        tree
    } else {
        notes.push(format!(
            "Config file not found at {}. Using defaults and environment/CLI variables.",
            config_file_path.display()
        ));
        ConfigTree::default()
    };

    // 3. CLI arguments and environment variables win
    current_config = current_config.merge(cli);
    current_config.config_file = Some(config_file_path);

    let tree = with_crisp_section(tree, &current_config)?;
    Ok(LoadedConfig {
        config: current_config,
        tree,
        notes,
    })
}

/// Writes the merged settings back into the tree's `crisp` section so service
/// constructors see the final values.
fn with_crisp_section(tree: ConfigTree, config: &Config) -> Result<ConfigTree> {
    let mut root = match tree.into_value() {
        Value::Object(map) => map,
        _ => serde_json::Map::new(),
    };
    let section = root
        .entry("crisp")
        .or_insert_with(|| Value::Object(serde_json::Map::new()));
    if !section.is_object() {
        *section = Value::Object(serde_json::Map::new());
    }

    if let (Value::Object(section), Value::Object(settings)) = (section, serde_json::to_value(config)?) {
        for (key, value) in settings.into_iter().filter(|(_, v)| !v.is_null()) {
            section.insert(key, value);
        }
    }
    Ok(ConfigTree::from_value(Value::Object(root)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn defaults_apply_without_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let cli = Config {
            config_file: Some(dir.path().join("absent.yml")),
            ..Default::default()
        };

        let LoadedConfig { config, tree, notes } = load_config_from(cli, &env(&[])).unwrap();
        assert_eq!(config.data_dir, Some(PathBuf::from("./data")));
        assert_eq!(notes.len(), 1);
        assert!(notes[0].starts_with("Config file not found at"));
        assert_eq!(config.log_level.as_deref(), Some("info"));
        assert_eq!(tree.get_str("crisp.data_dir"), Some("./data"));
        assert_eq!(tree.get_str("crisp.stream_kind"), Some("memory"));
    }

    #[test]
    fn cli_overrides_file_which_overrides_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "crisp:\n  data_dir: $ROOT/data\n  log_level: debug\n  transformations_file: ${{ROOT}}/rules.json\nextra:\n  answer: 42"
        )
        .unwrap();

        let cli = Config {
            config_file: Some(file.path().to_path_buf()),
            log_level: Some("warn".to_string()),
            ..Default::default()
        };
        let LoadedConfig { config, tree, notes } =
            load_config_from(cli, &env(&[("ROOT", "/srv/crisp")])).unwrap();
        assert!(notes.is_empty());

        assert_eq!(config.data_dir, Some(PathBuf::from("/srv/crisp/data")));
        assert_eq!(config.transformations_file, Some(PathBuf::from("/srv/crisp/rules.json")));
        assert_eq!(config.log_level.as_deref(), Some("warn"));
        assert_eq!(config.log_dir, Some(PathBuf::from("./logs")));

        assert_eq!(tree.get_str("crisp.data_dir"), Some("/srv/crisp/data"));
        assert_eq!(tree.get_str("crisp.log_level"), Some("warn"));
        assert_eq!(tree.get("extra.answer"), Some(&serde_json::json!(42)));
    }

    #[test]
    fn unresolved_variable_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "crisp:\n  data_dir: $NOT_DEFINED_ANYWHERE").unwrap();

        let cli = Config {
            config_file: Some(file.path().to_path_buf()),
            ..Default::default()
        };
        assert!(load_config_from(cli, &env(&[])).is_err());
    }

    #[test]
    fn file_without_crisp_section_is_noted() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "other:\n  key: value").unwrap();

        let cli = Config {
            config_file: Some(file.path().to_path_buf()),
            ..Default::default()
        };
        let loaded = load_config_from(cli, &env(&[])).unwrap();
        assert_eq!(loaded.notes, vec![format!("No crisp section in {}", file.path().display())]);
        assert_eq!(loaded.tree.get_str("other.key"), Some("value"));
        assert_eq!(loaded.config.stream_kind.as_deref(), Some("memory"));
    }
}
