//! Remote-operation errors and proxy-level failures.
use serde::{Deserialize, Serialize};

/// Errors raised by the proxy layer itself.
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    /// The operation exists on the entity interface but has no remote
    /// counterpart. Callers must not rely on it.
    #[error("{entity}::{operation} is not implemented by the remote debugger")]
    NotImplemented {
        /// Entity kind, e.g. `target`.
        entity: &'static str,
        /// Operation name.
        operation: &'static str,
    },
}

/// Outcome of a remote operation that reports its own failure, as
/// returned by attach, watch, load-core and similar calls.
///
/// This is data shown to the user, not a Rust error: a call can
/// succeed at the RPC level and still carry a failed `LldbError`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LldbError {
    pub success: bool,
    pub code: u32,
    pub message: String,
}

impl LldbError {
    pub fn ok() -> Self {
        Self {
            success: true,
            code: 0,
            message: String::new(),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            code: 0,
            message: message.into(),
        }
    }

    /// The error reported when the call to `method` never reached the
    /// remote debugger.
    pub fn rpc_failure(method: &str) -> Self {
        Self::failure(format!("Rpc error while calling {method}."))
    }

    /// Like [`rpc_failure`](Self::rpc_failure), pointing the user at
    /// the logs. Used by platform calls.
    pub fn rpc_failure_see_logs(method: &str) -> Self {
        Self::failure(format!(
            "Rpc error while calling {method}. Inspect the logs for more information."
        ))
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    pub fn is_fail(&self) -> bool {
        !self.success
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_implemented_display() {
        let err = ProxyError::NotImplemented {
            entity: "target",
            operation: "find_breakpoint_by_id",
        };
        assert_eq!(
            err.to_string(),
            "target::find_breakpoint_by_id is not implemented by the remote debugger"
        );
    }

    #[test]
    fn canned_rpc_failures() {
        let err = LldbError::rpc_failure("AttachToProcessWithId");
        assert!(err.is_fail());
        assert_eq!(err.message, "Rpc error while calling AttachToProcessWithId.");

        let err = LldbError::rpc_failure_see_logs("ConnectRemote");
        assert_eq!(
            err.message,
            "Rpc error while calling ConnectRemote. Inspect the logs for more information."
        );
    }

    #[test]
    fn missing_fields_decode_as_failure() {
        let err: LldbError = serde_json::from_str(r#"{"message": "bad pid"}"#).unwrap();
        assert!(err.is_fail());
        assert_eq!(err.code, 0);
        assert_eq!(err.message, "bad pid");
    }

    #[test]
    fn ok_is_success() {
        assert!(LldbError::ok().is_success());
        assert!(LldbError::default().is_fail());
    }
}
