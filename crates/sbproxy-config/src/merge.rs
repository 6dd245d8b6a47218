use toml::{Table, Value};

use crate::config::Config;
use crate::error::ConfigError;

/// Apply a partial TOML document on top of `base`.
///
/// Keys the overlay names replace the base values; tables are merged
/// key by key, while arrays (such as `debugger.log_channels`) replace
/// the base array as a whole.
pub fn merge_configs(base: &Config, overlay_toml: &str) -> Result<Config, ConfigError> {
    let overlay: Table = overlay_toml
        .parse()
        .map_err(|e: toml::de::Error| ConfigError::Parse(e.to_string()))?;

    let mut merged = match Value::try_from(base) {
        Ok(Value::Table(table)) => table,
        Ok(_) => Table::new(),
        Err(e) => return Err(ConfigError::Parse(e.to_string())),
    };
    let changed = overlay_table(&mut merged, overlay, "");
    if !changed.is_empty() {
        tracing::debug!(keys = ?changed, "config values overridden");
    }

    Value::Table(merged)
        .try_into()
        .map_err(|e: toml::de::Error| ConfigError::Parse(e.to_string()))
}

/// Merge `overlay` into `target`, returning the dotted paths of the
/// leaf values it set.
fn overlay_table(target: &mut Table, overlay: Table, prefix: &str) -> Vec<String> {
    let mut changed = Vec::new();
    for (key, value) in overlay {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        let value = match (value, target.get_mut(&key)) {
            (Value::Table(nested), Some(Value::Table(existing))) => {
                changed.extend(overlay_table(existing, nested, &path));
                continue;
            }
            (value, _) => value,
        };
        target.insert(key, value);
        changed.push(path);
    }
    changed
}
