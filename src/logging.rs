//! Log file placement, rotation and subscriber setup for the `sbproxy` binary.

use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use sbproxy_config::LogLevel;
use tracing_subscriber::EnvFilter;

/// Rotate once the log reaches 10 MB.
pub const DEFAULT_MAX_LOG_SIZE: u64 = 10 * 1024 * 1024;

/// Rotated files kept next to the live log.
pub const DEFAULT_MAX_LOG_FILES: u32 = 5;

/// `<config dir>/sbproxy`, falling back to `./.sbproxy` when the
/// platform has no config directory.
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .map(|dir| dir.join("sbproxy"))
        .unwrap_or_else(|| PathBuf::from(".sbproxy"))
}

/// `<local data dir>/sbproxy/sbproxy.log`, or under the temp dir.
pub fn default_log_file_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("sbproxy")
        .join("sbproxy.log")
}

pub fn ensure_log_dir(log_path: &Path) -> io::Result<()> {
    match log_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => fs::create_dir_all(parent),
        _ => Ok(()),
    }
}

/// Shift `sbproxy.log` to `sbproxy.log.1`, `.1` to `.2` and so on once
/// it reaches `max_size`, dropping `.<max_files>`.
pub fn rotate_log_files(log_path: &Path, max_size: u64, max_files: u32) -> io::Result<()> {
    let Ok(metadata) = fs::metadata(log_path) else {
        return Ok(());
    };
    if metadata.len() < max_size {
        return Ok(());
    }

    let oldest = rotated_path(log_path, max_files);
    if oldest.exists() {
        fs::remove_file(&oldest)?;
    }
    for i in (1..max_files).rev() {
        let from = rotated_path(log_path, i);
        if from.exists() {
            fs::rename(&from, rotated_path(log_path, i + 1))?;
        }
    }
    fs::rename(log_path, rotated_path(log_path, 1))
}

fn rotated_path(base: &Path, index: u32) -> PathBuf {
    let name = base.file_name().unwrap_or_default().to_string_lossy();
    let parent = base.parent().unwrap_or_else(|| Path::new("."));
    parent.join(format!("{name}.{index}"))
}

/// Install the global subscriber writing to `log_path`. `RUST_LOG`
/// overrides the configured level.
pub fn init(log_path: &Path, level: LogLevel) -> Result<()> {
    ensure_log_dir(log_path)
        .with_context(|| format!("failed to create log dir for {}", log_path.display()))?;
    if let Err(e) = rotate_log_files(log_path, DEFAULT_MAX_LOG_SIZE, DEFAULT_MAX_LOG_FILES) {
        eprintln!("sbproxy: log rotation failed: {e}");
    }
    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)
        .with_context(|| format!("failed to open log file {}", log_path.display()))?;

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_filter()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::sync::Mutex::new(log_file))
        .with_ansi(false)
        .init();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_paths_name_the_tool() {
        let log = default_log_file_path();
        assert!(log.to_string_lossy().contains("sbproxy"));
        assert!(log.extension().is_some_and(|e| e == "log"));
        assert!(default_config_dir().ends_with("sbproxy"));
    }

    #[test]
    fn rotated_path_appends_index() {
        let base = Path::new("/tmp/sbproxy.log");
        assert_eq!(rotated_path(base, 2), PathBuf::from("/tmp/sbproxy.log.2"));
    }

    #[test]
    fn small_or_missing_log_is_left_alone() {
        let dir = tempfile::TempDir::new().unwrap();
        let log = dir.path().join("sbproxy.log");
        rotate_log_files(&log, 50, 3).unwrap();
        fs::write(&log, "short").unwrap();
        rotate_log_files(&log, 50, 3).unwrap();
        assert!(log.exists());
    }

    #[test]
    fn rotation_cascades_and_drops_oldest() {
        let dir = tempfile::TempDir::new().unwrap();
        let log = dir.path().join("sbproxy.log");
        fs::write(dir.path().join("sbproxy.log.1"), "old1").unwrap();
        fs::write(dir.path().join("sbproxy.log.2"), "old2").unwrap();
        fs::write(&log, "x".repeat(100)).unwrap();

        rotate_log_files(&log, 50, 2).unwrap();

        assert!(!log.exists());
        assert_eq!(
            fs::read_to_string(dir.path().join("sbproxy.log.1")).unwrap(),
            "x".repeat(100)
        );
        assert_eq!(
            fs::read_to_string(dir.path().join("sbproxy.log.2")).unwrap(),
            "old1"
        );
        assert!(!dir.path().join("sbproxy.log.3").exists());
    }

    #[test]
    fn ensure_log_dir_creates_parents() {
        let dir = tempfile::TempDir::new().unwrap();
        let log = dir.path().join("a").join("b").join("sbproxy.log");
        ensure_log_dir(&log).unwrap();
        ensure_log_dir(&log).unwrap();
        assert!(dir.path().join("a").join("b").is_dir());
    }
}
