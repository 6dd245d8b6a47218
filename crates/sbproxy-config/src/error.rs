use std::path::PathBuf;
use thiserror::Error;

/// Failure to produce a [`Config`](crate::Config).
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An explicitly named config file does not exist.
    #[error("no configuration at {}", .0.display())]
    NotFound(PathBuf),

    /// The commented default file could not be written on first load.
    #[error("could not write default config: {0}")]
    CreateDefault(String),

    /// The file is not valid TOML or does not match the schema.
    #[error("invalid TOML: {0}")]
    Parse(String),

    /// A value is out of range.
    #[error("invalid {field}: {message}")]
    Validation {
        /// Dotted path of the offending key, e.g. `connection.channel_count`.
        field: String,
        message: String,
    },

    #[error("config I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_culprit() {
        let err = ConfigError::NotFound(PathBuf::from("/etc/sbproxy/missing.toml"));
        assert_eq!(err.to_string(), "no configuration at /etc/sbproxy/missing.toml");

        let err = ConfigError::Validation {
            field: "connection.retry_wait_ms".into(),
            message: "must be at least 1 when wait_for_ready is set".into(),
        };
        assert_eq!(
            err.to_string(),
            "invalid connection.retry_wait_ms: must be at least 1 when wait_for_ready is set"
        );
    }

    #[test]
    fn io_errors_convert() {
        let inner = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only");
        let err: ConfigError = inner.into();
        assert!(matches!(err, ConfigError::Io(_)));
        assert!(err.to_string().ends_with("read-only"));
    }
}
