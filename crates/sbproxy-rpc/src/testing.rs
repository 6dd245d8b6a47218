//! Scripted in-memory invoker for tests.
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use serde_json::{json, Value};

use crate::error::{RpcError, StatusCode};
use crate::invoker::{CallInvoker, CallOptions};

type Responder = Box<dyn Fn(&Value) -> Result<Value, RpcError> + Send + Sync>;

/// One call seen by a [`FakeInvoker`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    /// Full method name, `Service/Method`.
    pub method: String,
    pub request: Value,
}

/// Answers calls from per-method responders and records every request.
///
/// Responders are looked up by full method name first, then by the
/// bare method name. Unscripted methods fail with `Unimplemented`.
#[derive(Default)]
pub struct FakeInvoker {
    responders: Mutex<HashMap<String, Responder>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl FakeInvoker {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Answer `method` with `{"result": result}`.
    pub fn respond(&self, method: &str, result: Value) {
        self.respond_with(method, move |_| Ok(result.clone()));
    }

    /// Answer `method` by running `f` on the request; `Ok` values
    /// become the `result` field.
    pub fn respond_with<F>(&self, method: &str, f: F)
    where
        F: Fn(&Value) -> Result<Value, RpcError> + Send + Sync + 'static,
    {
        self.responders
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(method.to_string(), Box::new(f));
    }

    /// Fail `method` with `code`.
    pub fn fail(&self, method: &str, code: StatusCode) {
        let name = method.to_string();
        self.respond_with(method, move |_| {
            Err(RpcError::status(code, format!("scripted failure of {name}")))
        });
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Requests sent to `method` (full or bare name), in order.
    pub fn calls_to(&self, method: &str) -> Vec<Value> {
        self.calls()
            .into_iter()
            .filter(|c| matches_method(&c.method, method))
            .map(|c| c.request)
            .collect()
    }

    pub fn call_count(&self, method: &str) -> usize {
        self.calls_to(method).len()
    }

    pub fn clear_calls(&self) {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

fn matches_method(full: &str, wanted: &str) -> bool {
    full == wanted || full.rsplit('/').next() == Some(wanted)
}

impl CallInvoker for FakeInvoker {
    fn unary_call(
        &self,
        method: &str,
        request: &[u8],
        _options: &CallOptions,
    ) -> Result<Vec<u8>, RpcError> {
        let request: Value = serde_json::from_slice(request)?;
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(RecordedCall {
                method: method.to_string(),
                request: request.clone(),
            });

        let responders = self
            .responders
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let bare = method.rsplit('/').next().unwrap_or(method);
        let responder = responders.get(method).or_else(|| responders.get(bare));
        match responder {
            Some(respond) => {
                let result = respond(&request)?;
                Ok(serde_json::to_vec(&json!({ "result": result }))?)
            }
            None => Err(RpcError::status(
                StatusCode::Unimplemented,
                format!("no scripted response for {method}"),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unscripted_method_is_unimplemented() {
        let fake = FakeInvoker::new();
        let err = fake
            .unary_call("Svc/Nope", b"{}", &CallOptions::default())
            .unwrap_err();
        assert_eq!(err.code(), StatusCode::Unimplemented);
        assert_eq!(fake.call_count("Nope"), 1);
    }

    #[test]
    fn bare_name_responder_matches_any_service() {
        let fake = FakeInvoker::new();
        fake.respond("GetId", json!(3));
        let body = fake
            .unary_call("Svc/GetId", b"{}", &CallOptions::default())
            .unwrap();
        assert_eq!(body, br#"{"result":3}"#);
    }

    #[test]
    fn full_name_wins_over_bare_name() {
        let fake = FakeInvoker::new();
        fake.respond("GetId", json!(1));
        fake.respond("B/GetId", json!(2));
        let body = fake
            .unary_call("B/GetId", b"{}", &CallOptions::default())
            .unwrap();
        assert_eq!(body, br#"{"result":2}"#);
    }
}
