//! Per-service client stub.
//!
//! Requests are JSON objects naming the entity handle and parameters;
//! responses are JSON objects whose `result` field holds the answer.
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{RpcError, StatusCode};
use crate::invoker::{CallInvoker, CallOptions};

/// Client for one remote service, e.g. `RemoteValueRpcService`.
#[derive(Clone)]
pub struct ServiceClient {
    service: &'static str,
    invoker: Arc<dyn CallInvoker>,
}

impl ServiceClient {
    pub fn new(invoker: Arc<dyn CallInvoker>, service: &'static str) -> Self {
        Self { service, invoker }
    }

    pub fn service(&self) -> &'static str {
        self.service
    }

    /// `"Service/Method"`, the name sent on the wire.
    pub fn full_method(&self, method: &str) -> String {
        format!("{}/{}", self.service, method)
    }

    /// Blocking unary call.
    pub fn call<R: DeserializeOwned + Default>(
        &self,
        method: &str,
        request: &Value,
        options: &CallOptions,
    ) -> Result<R, RpcError> {
        call_blocking(self.invoker.as_ref(), &self.full_method(method), request, options)
    }

    /// Unary call run on the blocking pool.
    ///
    /// The call is detached from the returned future: dropping the
    /// future stops the wait but not the remote call.
    pub async fn call_async<R>(
        &self,
        method: &str,
        request: Value,
        options: CallOptions,
    ) -> Result<R, RpcError>
    where
        R: DeserializeOwned + Default + Send + 'static,
    {
        let invoker = Arc::clone(&self.invoker);
        let full_method = self.full_method(method);
        tokio::task::spawn_blocking(move || {
            call_blocking(invoker.as_ref(), &full_method, &request, &options)
        })
        .await
        .map_err(|e| RpcError::status(StatusCode::Cancelled, e.to_string()))?
    }
}

fn call_blocking<R: DeserializeOwned + Default>(
    invoker: &dyn CallInvoker,
    full_method: &str,
    request: &Value,
    options: &CallOptions,
) -> Result<R, RpcError> {
    let payload = serde_json::to_vec(request)?;
    let response = invoker.unary_call(full_method, &payload, options)?;
    decode_result(&response)
}

/// Extract `result` from a response body. A missing or null result
/// decodes as `R::default()`.
pub fn decode_result<R: DeserializeOwned + Default>(body: &[u8]) -> Result<R, RpcError> {
    if body.is_empty() {
        return Ok(R::default());
    }
    let mut value: Value = serde_json::from_slice(body)?;
    match value.get_mut("result").map(Value::take) {
        None | Some(Value::Null) => Ok(R::default()),
        Some(result) => Ok(serde_json::from_value(result)?),
    }
}
