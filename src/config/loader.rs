//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use crate::config::schema::AgentConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", format_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn format_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from a TOML file.
///
/// No path, or a file with no content, yields the default (all-empty-rules)
/// configuration. Malformed content and semantic validation failures are
/// fatal.
pub fn load_config(path: Option<&Path>) -> Result<AgentConfig, ConfigError> {
    let config = match path {
        None => AgentConfig::default(),
        Some(path) => {
            let content = fs::read_to_string(path)?;
            if content.trim().is_empty() {
                AgentConfig::default()
            } else {
                toml::from_str(&content)?
            }
        }
    };

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_no_path_yields_default() {
        let config = load_config(None).unwrap();
        assert!(config.rules.input_metrics.is_empty());
    }

    #[test]
    fn test_empty_file_yields_default() {
        let mut file = tempfile();
        write!(file.1, "\n   \n").unwrap();
        let config = load_config(Some(&file.0)).unwrap();
        assert!(config.rules.output_metrics.is_empty());
        std::fs::remove_file(&file.0).unwrap_or_default();
    }

    #[test]
    fn test_malformed_content_is_fatal() {
        let mut file = tempfile();
        write!(file.1, "input_metrics = 42").unwrap();
        let result = load_config(Some(&file.0));
        assert!(matches!(result, Err(ConfigError::Parse(_))));
        std::fs::remove_file(&file.0).unwrap_or_default();
    }

    #[test]
    fn test_invalid_rules_are_fatal() {
        let mut file = tempfile();
        write!(
            file.1,
            r#"
            [[input_metrics]]
            name = "has spaces"
            simple_counter = {{}}
            "#
        )
        .unwrap();
        let result = load_config(Some(&file.0));
        assert!(matches!(result, Err(ConfigError::Validation(_))));
        std::fs::remove_file(&file.0).unwrap_or_default();
    }

    fn tempfile() -> (std::path::PathBuf, std::fs::File) {
        let path = std::env::temp_dir().join(format!(
            "metric-sidecar-loader-test-{}.toml",
            uuid::Uuid::new_v4()
        ));
        let file = std::fs::File::create(&path).unwrap();
        (path, file)
    }
}
