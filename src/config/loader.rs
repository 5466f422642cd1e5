//! Configuration loading from disk and the environment.

use std::fs;
use std::path::Path;

use crate::config::schema::RotateConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Validation(Vec<ValidationError>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::Validation(errors) => {
                write!(f, "Validation failed: ")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Load configuration from an optional TOML file, fill blanks from the
/// environment, then validate.
pub fn load_config(path: Option<&Path>, require_node: bool) -> Result<RotateConfig, ConfigError> {
    let mut config = match path {
        Some(path) => parse_config(&fs::read_to_string(path).map_err(ConfigError::Io)?)?,
        None => RotateConfig::default(),
    };
    config.apply_env();

    validate_config(&config, require_node).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Parse configuration text without touching the environment.
pub fn parse_config(content: &str) -> Result<RotateConfig, ConfigError> {
    toml::from_str(content).map_err(ConfigError::Parse)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const CONFIG: &str = r#"
        [node]
        api_url = "https://public-en-kairos.node.kaia.io"
        chain_id = 1001

        [sender]
        address = "0x2c7536e3605d9c16a7a3d7b1898e529396a65c23"
        private_key = "0x4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318"
        recipient_address = "0x0000000000000000000000000000000000000002"
    "#;

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(CONFIG.as_bytes()).unwrap();

        let config = load_config(Some(file.path()), true).unwrap();
        assert_eq!(config.node.chain_id, Some(1001));
        assert_eq!(config.rotation.role_key_counts, [2, 1, 3]);
    }

    #[test]
    fn test_missing_file() {
        let err = load_config(Some(Path::new("/nonexistent/rotate.toml")), false).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn test_parse_error() {
        let err = parse_config("[node\napi_url = 1").unwrap_err();
        assert!(err.to_string().starts_with("Parse error"));
    }

    #[test]
    fn test_validation_error_lists_fields() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"[rotation]\ngas = 0\n[probe]\ngas = 0\n").unwrap();

        let err = load_config(Some(file.path()), false).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("rotation.gas"));
        assert!(message.contains("probe.gas"));
    }
}
