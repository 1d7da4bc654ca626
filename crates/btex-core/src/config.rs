use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Errors raised while loading [`Options`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid configuration: {0}")]
    Json(#[from] serde_json::Error),
}

/// Tuning knobs for the analysis core and its consumers.
///
/// Every field has a default, so a partial JSON object such as
/// `{"maxParsedLineLength": 2000}` is a valid configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Options {
    /// Lines longer than this (in UTF-16 code units) produce no tokens.
    pub max_parsed_line_length: usize,
    /// Upper bound on suggestion lists built by completion consumers.
    pub suggestions_limit: usize,
    /// Environments whose body is math mode.
    pub math_environments: Vec<String>,
    /// Quiet interval before a scheduled validation runs.
    pub validation_delay_ms: u64,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            max_parsed_line_length: 10_000,
            suggestions_limit: 10_000,
            math_environments: ["align", "align*", "equation", "equation*", "multline", "multline*"]
                .into_iter()
                .map(String::from)
                .collect(),
            validation_delay_ms: 500,
        }
    }
}

impl Options {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_value(value: serde_json::Value) -> Result<Self, ConfigError> {
        Ok(serde_json::from_value(value)?)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&text)
    }

    pub fn is_math_environment(&self, name: &str) -> bool {
        self.math_environments.iter().any(|env| env == name)
    }

    pub fn validation_delay(&self) -> Duration {
        Duration::from_millis(self.validation_delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_keeps_defaults() {
        let options = Options::from_json_str(r#"{"maxParsedLineLength": 80}"#).unwrap();
        assert_eq!(options.max_parsed_line_length, 80);
        assert_eq!(options.suggestions_limit, 10_000);
        assert!(options.is_math_environment("align*"));
        assert!(!options.is_math_environment("lign"));
    }

    #[test]
    fn test_unknown_keys_are_ignored() {
        let options = Options::from_json_value(serde_json::json!({
            "locale": "zh",
            "mathEnvironments": ["gather"]
        }))
        .unwrap();
        assert!(options.is_math_environment("gather"));
        assert!(!options.is_math_environment("align"));
    }

    #[test]
    fn test_malformed_json_is_an_error() {
        let err = Options::from_json_str("{maxParsedLineLength").unwrap_err();
        assert!(matches!(err, ConfigError::Json(_)));
    }

    #[test]
    fn test_missing_file_is_an_io_error() {
        let err = Options::from_file(Path::new("/nonexistent/btex.json")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/btex.json"));
    }
}
