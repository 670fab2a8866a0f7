//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::KsockConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Parse and validate configuration text.
pub fn parse_config(content: &str) -> Result<KsockConfig, ConfigError> {
    let config: KsockConfig = toml::from_str(content)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<KsockConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let config = parse_config(&content)?;

    tracing::debug!(path = %path.display(), "Configuration loaded");
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_io_error() {
        let err = load_config(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn syntax_error_is_parse_error() {
        let err = parse_config("[tcp_server\nbacklog = 5").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn semantic_error_lists_fields() {
        let err = parse_config("[udp_client]\nserver_address = \"x\"\nrecv_buffer_size = 0").unwrap_err();
        let text = err.to_string();
        assert!(text.contains("udp_client.server_address"));
        assert!(text.contains("udp_client.recv_buffer_size"));
    }

    #[test]
    fn file_round_trip() {
        let path = std::env::temp_dir().join(format!("ksock-config-{}.toml", std::process::id()));
        fs::write(&path, "[udp_server]\nbind_address = \"127.0.0.1:5555\"\n").unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.udp_server.bind_address, "127.0.0.1:5555");

        let _ = fs::remove_file(&path);
    }
}
