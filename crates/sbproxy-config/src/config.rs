use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Log verbosity level.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    /// Most verbose. Logs every successful call.
    Trace,
    /// Debug messages.
    Debug,
    /// Informational messages (default).
    #[default]
    Info,
    /// Warnings only. Failed calls are still reported.
    Warn,
    /// Errors only.
    Error,
}

impl LogLevel {
    /// The directive understood by `tracing` filters.
    pub fn as_filter(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// Settings for the call channel to the remote debugger process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// `host:port` the `sbproxy` binary connects to.
    #[serde(default = "default_address")]
    pub address: String,
    /// Number of duplex channels in the call pool (1–32).
    #[serde(default = "default_channel_count")]
    pub channel_count: usize,
    /// Deadline for ordinary calls in milliseconds (0 = none).
    #[serde(default)]
    pub call_timeout_ms: u64,
    /// Queued handles of one type that trigger a bulk delete.
    #[serde(default = "default_batch_size")]
    pub bulk_delete_batch_size: usize,
    /// Deadline for the debugger bootstrap call in milliseconds.
    #[serde(default = "default_bootstrap_deadline")]
    pub bootstrap_deadline_ms: u64,
    /// Interval between bootstrap attempts while waiting for the
    /// remote endpoint.
    #[serde(default = "default_retry_wait")]
    pub retry_wait_ms: u64,
    /// Keep retrying the bootstrap call until the endpoint answers.
    #[serde(default = "default_true")]
    pub wait_for_ready: bool,
}

fn default_address() -> String {
    "127.0.0.1:44321".to_string()
}
fn default_channel_count() -> usize {
    4
}
fn default_batch_size() -> usize {
    100
}
fn default_bootstrap_deadline() -> u64 {
    10_000
}
fn default_retry_wait() -> u64 {
    100
}
fn default_true() -> bool {
    true
}

impl ConnectionConfig {
    /// Deadline applied to every non-bootstrap call, if any.
    pub fn call_timeout(&self) -> Option<Duration> {
        (self.call_timeout_ms > 0).then(|| Duration::from_millis(self.call_timeout_ms))
    }

    pub fn bootstrap_deadline(&self) -> Duration {
        Duration::from_millis(self.bootstrap_deadline_ms)
    }

    pub fn retry_wait(&self) -> Duration {
        Duration::from_millis(self.retry_wait_ms)
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            channel_count: 4,
            call_timeout_ms: 0,
            bulk_delete_batch_size: 100,
            bootstrap_deadline_ms: 10_000,
            retry_wait_ms: 100,
            wait_for_ready: true,
        }
    }
}

/// A debugger log channel to enable after bootstrap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogChannelEntry {
    /// Channel name, e.g. `lldb` or `gdb-remote`.
    pub channel: String,
    /// Categories within the channel.
    #[serde(default)]
    pub categories: Vec<String>,
}

/// Options applied when the remote debugger object is created.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DebuggerConfig {
    /// Let the remote debugger source `~/.lldbinit`.
    #[serde(default)]
    pub source_init_files: bool,
    /// Put the debugger in asynchronous mode.
    #[serde(default)]
    pub async_mode: bool,
    /// Channels passed to `enable_log`.
    #[serde(default)]
    pub log_channels: Vec<LogChannelEntry>,
}

/// Logging configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LogConfig {
    /// Log verbosity level.
    #[serde(default)]
    pub level: LogLevel,
    /// Optional path to a log file.
    pub file: Option<PathBuf>,
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Call channel and bulk-deletion tuning.
    #[serde(default)]
    pub connection: ConnectionConfig,
    /// Debugger bootstrap options.
    #[serde(default)]
    pub debugger: DebuggerConfig,
    /// Logging settings.
    #[serde(default)]
    pub log: LogConfig,
}
