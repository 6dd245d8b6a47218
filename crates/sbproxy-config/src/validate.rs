use crate::config::Config;
use crate::error::ConfigError;

/// Largest call pool the transport accepts.
pub const MAX_CHANNEL_COUNT: usize = 32;

/// Validate a [`Config`], returning all detected violations.
///
/// Returns `Ok(())` when the config is valid, or `Err` with a
/// vector of every validation error found.
pub fn validate(config: &Config) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();
    let conn = &config.connection;

    if conn.address.trim().is_empty() {
        errors.push(ConfigError::Validation {
            field: "connection.address".to_string(),
            message: "must not be empty".to_string(),
        });
    }

    if conn.channel_count == 0 || conn.channel_count > MAX_CHANNEL_COUNT {
        errors.push(ConfigError::Validation {
            field: "connection.channel_count".to_string(),
            message: format!(
                "must be 1-{MAX_CHANNEL_COUNT}, got {}",
                conn.channel_count
            ),
        });
    }

    if conn.bulk_delete_batch_size == 0 {
        errors.push(ConfigError::Validation {
            field: "connection.bulk_delete_batch_size".to_string(),
            message: "must be at least 1".to_string(),
        });
    }

    if conn.wait_for_ready && conn.retry_wait_ms == 0 {
        errors.push(ConfigError::Validation {
            field: "connection.retry_wait_ms".to_string(),
            message: "must be at least 1 when wait_for_ready is set".to_string(),
        });
    }

    if conn.bootstrap_deadline_ms < conn.retry_wait_ms {
        errors.push(ConfigError::Validation {
            field: "connection.bootstrap_deadline_ms".to_string(),
            message: format!(
                "must not be shorter than retry_wait_ms ({}), got {}",
                conn.retry_wait_ms, conn.bootstrap_deadline_ms
            ),
        });
    }

    for (i, entry) in config.debugger.log_channels.iter().enumerate() {
        if entry.channel.trim().is_empty() {
            errors.push(ConfigError::Validation {
                field: format!("debugger.log_channels[{i}].channel"),
                message: "must not be empty".to_string(),
            });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
