use std::fs;
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::error::ConfigError;
use crate::merge::merge_configs;
use crate::validate::validate;

const CONFIG_FILE: &str = "config.toml";
const PROJECT_DIR: &str = ".sbproxy";

/// Written to `<config_dir>/config.toml` the first time the proxy runs.
/// Every line is a comment, so the file alone leaves the defaults intact.
const STARTER_FILE: &str = r#"# sbproxy configuration
# Remove the leading '#' from a line to override its default.

# [connection]
# address = "127.0.0.1:44321"
# channel_count = 4
# call_timeout_ms = 0
# bulk_delete_batch_size = 100
# bootstrap_deadline_ms = 10000
# retry_wait_ms = 100
# wait_for_ready = true

# [debugger]
# source_init_files = false
# async_mode = false

# [log]
# level = "info"
"#;

/// Where a config overlay came from, for log output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Layer {
    User,
    Project,
}

/// Build the effective configuration.
///
/// Defaults are overlaid by the user file in `config_dir` and then by
/// the nearest `.sbproxy/config.toml` at or above `project_dir`. The
/// user file is created as a commented-out starter when absent. The
/// merged result is validated before it is returned.
///
/// # Errors
///
/// Returns [`ConfigError`] when a file cannot be read or written, an
/// overlay is not valid TOML, or the merged values fail validation.
pub fn load_config(config_dir: &Path, project_dir: Option<&Path>) -> Result<Config, ConfigError> {
    let user_file = ensure_user_file(config_dir)?;

    let mut overlays = vec![(Layer::User, user_file)];
    if let Some(project_file) = project_dir.and_then(nearest_project_file) {
        overlays.push((Layer::Project, project_file));
    }

    let mut config = Config::default();
    for (layer, path) in overlays {
        let text = fs::read_to_string(&path)?;
        if is_blank(&text) {
            continue;
        }
        tracing::debug!(?layer, path = %path.display(), "applying config overlay");
        config = merge_configs(&config, &text)?;
    }

    check(config)
}

/// Load exactly one file, with no defaults file and no project lookup.
///
/// # Errors
///
/// [`ConfigError::NotFound`] when `path` is missing, otherwise the
/// errors of [`load_from_str`].
pub fn load_file(path: &Path) -> Result<Config, ConfigError> {
    if !path.is_file() {
        return Err(ConfigError::NotFound(path.to_path_buf()));
    }
    load_from_str(&fs::read_to_string(path)?)
}

/// Parse and validate a complete TOML document.
///
/// # Errors
///
/// [`ConfigError::Parse`] or the first validation failure.
pub fn load_from_str(text: &str) -> Result<Config, ConfigError> {
    let config = toml::from_str::<Config>(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
    check(config)
}

fn ensure_user_file(config_dir: &Path) -> Result<PathBuf, ConfigError> {
    let path = config_dir.join(CONFIG_FILE);
    if path.exists() {
        return Ok(path);
    }
    fs::create_dir_all(config_dir)?;
    fs::write(&path, STARTER_FILE).map_err(|e| ConfigError::CreateDefault(e.to_string()))?;
    tracing::info!(path = %path.display(), "wrote starter config");
    Ok(path)
}

fn nearest_project_file(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .map(|dir| dir.join(PROJECT_DIR).join(CONFIG_FILE))
        .find(|candidate| candidate.is_file())
}

/// Only comments and whitespace.
fn is_blank(text: &str) -> bool {
    text.lines()
        .map(str::trim)
        .all(|line| line.is_empty() || line.starts_with('#'))
}

fn check(config: Config) -> Result<Config, ConfigError> {
    match validate(&config) {
        Ok(()) => Ok(config),
        Err(errors) => Err(errors.into_iter().next().unwrap_or_else(|| {
            ConfigError::Validation {
                field: "config".to_string(),
                message: "rejected without a reason".to_string(),
            }
        })),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LogLevel;
    use tempfile::TempDir;

    fn write(path: &Path, text: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, text).unwrap();
    }

    #[test]
    fn first_run_writes_starter_and_keeps_defaults() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("sbproxy");

        assert_eq!(load_config(&dir, None).unwrap(), Config::default());
        let starter = fs::read_to_string(dir.join(CONFIG_FILE)).unwrap();
        assert_eq!(starter, STARTER_FILE);
    }

    #[test]
    fn user_file_overrides_only_what_it_names() {
        let tmp = TempDir::new().unwrap();
        write(&tmp.path().join(CONFIG_FILE), "[connection]\nchannel_count = 8\n");

        let config = load_config(tmp.path(), None).unwrap();
        assert_eq!(config.connection.channel_count, 8);
        assert_eq!(
            config.connection.bulk_delete_batch_size,
            Config::default().connection.bulk_delete_batch_size
        );
    }

    #[test]
    fn project_file_wins_over_user_file() {
        let tmp = TempDir::new().unwrap();
        let user = tmp.path().join("user");
        let project = tmp.path().join("workspace");
        write(
            &user.join(CONFIG_FILE),
            "[connection]\nbulk_delete_batch_size = 50\nretry_wait_ms = 7\n",
        );
        write(
            &project.join(PROJECT_DIR).join(CONFIG_FILE),
            "[connection]\nbulk_delete_batch_size = 5\n",
        );

        let config = load_config(&user, Some(&project)).unwrap();
        assert_eq!(config.connection.bulk_delete_batch_size, 5);
        assert_eq!(config.connection.retry_wait_ms, 7);
    }

    #[test]
    fn project_file_is_found_from_a_subdirectory() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("workspace");
        write(&root.join(PROJECT_DIR).join(CONFIG_FILE), "");
        let nested = root.join("target").join("debug");
        fs::create_dir_all(&nested).unwrap();

        assert_eq!(
            nearest_project_file(&nested),
            Some(root.join(PROJECT_DIR).join(CONFIG_FILE))
        );
    }

    #[test]
    fn merged_values_are_validated() {
        let tmp = TempDir::new().unwrap();
        write(&tmp.path().join(CONFIG_FILE), "[connection]\nchannel_count = 0\n");

        assert!(matches!(
            load_config(tmp.path(), None),
            Err(ConfigError::Validation { .. })
        ));
    }

    #[test]
    fn load_file_requires_an_existing_file() {
        let tmp = TempDir::new().unwrap();
        let missing = tmp.path().join("absent.toml");
        assert!(matches!(
            load_file(&missing),
            Err(ConfigError::NotFound(p)) if p == missing
        ));

        let present = tmp.path().join("session.toml");
        write(&present, "[log]\nlevel = \"debug\"\n");
        assert_eq!(load_file(&present).unwrap().log.level, LogLevel::Debug);
    }

    #[test]
    fn load_from_str_reports_parse_and_value_errors() {
        assert!(matches!(load_from_str("[[["), Err(ConfigError::Parse(_))));
        assert!(matches!(
            load_from_str("[connection]\nbulk_delete_batch_size = 0\n"),
            Err(ConfigError::Validation { .. })
        ));
    }

    #[test]
    fn blank_detection() {
        assert!(is_blank(STARTER_FILE));
        assert!(is_blank("\n   \n# only a note\n"));
        assert!(!is_blank("# note\nwait_for_ready = true\n"));
    }
}
