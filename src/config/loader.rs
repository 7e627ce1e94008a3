//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::EngineConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<EngineConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<EngineConfig, ConfigError> {
    let config: EngineConfig = toml::from_str(content)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_minimal_file_uses_defaults() {
        let config = parse_config("").unwrap();
        assert_eq!(config.embargo.scientific_months, 12);
        assert_eq!(config.casa.max_uses, 3);
        assert_eq!(config.client_ip.debug_header, "client-ip");
        assert!(!config.identity.trust_headers);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[listener]
bind_address = "127.0.0.1:9000"

[embargo]
cultural_months = 24

[casa]
enabled = true
secret = "s3cret"
max_uses = 5
"#
        )
        .unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.listener.bind_address, "127.0.0.1:9000");
        assert_eq!(config.embargo.cultural_months, 24);
        assert_eq!(config.embargo.scientific_months, 12);
        assert_eq!(config.casa.max_uses, 5);
    }

    #[test]
    fn test_errors_are_typed() {
        assert!(matches!(
            load_config(Path::new("/nonexistent/journal-access.toml")),
            Err(ConfigError::Io(_))
        ));
        assert!(matches!(parse_config("[embargo"), Err(ConfigError::Parse(_))));
        assert!(matches!(
            parse_config("[casa]\nenabled = true\n"),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn test_sample_config_is_valid() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("demos/journal-access.toml");
        let config = load_config(&path).unwrap();
        assert!(config.casa.enabled);
        assert_eq!(config.embargo.cultural_months, 36);
    }

    #[test]
    fn test_short_nonce_window_rejected() {
        let toml = "[casa]\nenabled = true\nsecret = \"s\"\nnonce_window_secs = 1\n";
        match parse_config(toml) {
            Err(ConfigError::Validation(errors)) => {
                assert_eq!(errors[0].field, "casa.nonce_window_secs")
            }
            other => panic!("expected validation failure, got {:?}", other.map(|_| ())),
        }
    }
}
