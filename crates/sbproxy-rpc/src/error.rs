//! RPC error types.
use std::fmt;

/// Status codes carried by a failed call, numbered like the codes the
/// remote server reports in a response frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusCode {
    Ok,
    Cancelled,
    Unknown,
    InvalidArgument,
    DeadlineExceeded,
    NotFound,
    Aborted,
    Unimplemented,
    Internal,
    /// The endpoint is not reachable (yet). The only code the
    /// bootstrap call retries on.
    Unavailable,
}

impl StatusCode {
    /// Decode a wire status. Unrecognised values become `Unknown`.
    pub fn from_i32(code: i32) -> Self {
        match code {
            0 => Self::Ok,
            1 => Self::Cancelled,
            3 => Self::InvalidArgument,
            4 => Self::DeadlineExceeded,
            5 => Self::NotFound,
            10 => Self::Aborted,
            12 => Self::Unimplemented,
            13 => Self::Internal,
            14 => Self::Unavailable,
            _ => Self::Unknown,
        }
    }

    pub fn as_i32(self) -> i32 {
        match self {
            Self::Ok => 0,
            Self::Cancelled => 1,
            Self::Unknown => 2,
            Self::InvalidArgument => 3,
            Self::DeadlineExceeded => 4,
            Self::NotFound => 5,
            Self::Aborted => 10,
            Self::Unimplemented => 12,
            Self::Internal => 13,
            Self::Unavailable => 14,
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Errors from a single remote call.
#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    /// The call completed with a non-OK status.
    #[error("rpc failed with status {code}: {message}")]
    Status {
        /// The status code.
        code: StatusCode,
        /// Detail reported by the server or the transport.
        message: String,
    },

    /// Reading or writing a channel failed.
    #[error("transport I/O error: {0}")]
    Transport(#[from] std::io::Error),

    /// A request could not be encoded or a response decoded.
    #[error("codec error: {0}")]
    Codec(String),

    /// The connection was shut down before the call ran.
    #[error("connection is shut down")]
    Shutdown,
}

impl RpcError {
    pub fn status(code: StatusCode, message: impl Into<String>) -> Self {
        Self::Status {
            code,
            message: message.into(),
        }
    }

    /// Status code this error maps to.
    pub fn code(&self) -> StatusCode {
        match self {
            Self::Status { code, .. } => *code,
            Self::Transport(_) => StatusCode::Unavailable,
            Self::Codec(_) => StatusCode::Internal,
            Self::Shutdown => StatusCode::Cancelled,
        }
    }

    pub fn is_unavailable(&self) -> bool {
        self.code() == StatusCode::Unavailable
    }
}

impl From<serde_json::Error> for RpcError {
    fn from(err: serde_json::Error) -> Self {
        Self::Codec(err.to_string())
    }
}
