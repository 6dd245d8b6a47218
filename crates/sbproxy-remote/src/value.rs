//! Values: variables, registers, expression results and their children.
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use sbproxy_rpc::OwnedHandle;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::cached_value::CachedValue;
use crate::error::LldbError;
use crate::handle::{TypeHandle, ValueHandle};
use crate::protocol::{service, ValueFormat, ValueInfo, ValueType};
use crate::proxy::{self, Stub};
use crate::session::Session;
use crate::types::RemoteType;

/// Bytes read through a pointer, with the reader's error text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PointeeBytes {
    pub data: Vec<u8>,
    pub error: String,
}

/// A value in the remote debugger.
///
/// Every method degrades to an empty result when the call fails: `""`,
/// `0`, `false` or `None`.
#[async_trait]
pub trait RemoteValue: Send + Sync {
    fn handle(&self) -> &ValueHandle;

    /// Captured when the handle was created; costs no call.
    fn name(&self) -> String;

    /// Captured when the handle was created; costs no call.
    fn error(&self) -> Option<LldbError>;

    fn value(&self, format: ValueFormat) -> String;

    fn summary(&self, format: ValueFormat) -> String;

    fn type_info(&self) -> Option<Arc<dyn RemoteType>>;

    fn type_name(&self) -> String;

    fn value_type(&self) -> ValueType;

    fn num_children(&self) -> u32;

    /// Children `offset..offset + count`. The result always has `count`
    /// entries; children the debugger did not return are `None`.
    fn children(&self, offset: u32, count: u32) -> Vec<Option<Arc<dyn RemoteValue>>>;

    fn child_at_index(&self, index: u32) -> Option<Arc<dyn RemoteValue>>;

    fn create_value_from_expression(
        &self,
        name: &str,
        expression: &str,
    ) -> Option<Arc<dyn RemoteValue>>;

    async fn create_value_from_expression_async(
        &self,
        name: &str,
        expression: &str,
    ) -> Option<Arc<dyn RemoteValue>>;

    fn create_value_from_address(
        &self,
        name: &str,
        address: u64,
        type_info: &dyn RemoteType,
    ) -> Option<Arc<dyn RemoteValue>>;

    fn evaluate_expression(&self, expression: &str) -> Option<Arc<dyn RemoteValue>>;

    async fn evaluate_expression_async(&self, expression: &str) -> Option<Arc<dyn RemoteValue>>;

    /// Evaluate with lldb-eval, binding `scratch_variables` by name.
    async fn evaluate_expression_lldb_eval(
        &self,
        expression: &str,
        scratch_variables: &HashMap<String, Arc<dyn RemoteValue>>,
    ) -> Option<Arc<dyn RemoteValue>>;

    fn clone_value(&self) -> Option<Arc<dyn RemoteValue>>;

    fn dereference(&self) -> Option<Arc<dyn RemoteValue>>;

    fn child_member_with_name(&self, name: &str) -> Option<Arc<dyn RemoteValue>>;

    fn address_of(&self) -> Option<Arc<dyn RemoteValue>>;

    fn type_is_pointer_type(&self) -> bool;

    fn value_for_expression_path(&self, expression_path: &str) -> Option<Arc<dyn RemoteValue>>;

    /// The expression that names this value, if it has one.
    fn expression_path(&self) -> Option<String>;

    /// A snapshot answering the immutable queries without further calls.
    fn cached_view(self: Arc<Self>, format: ValueFormat) -> Option<Arc<dyn RemoteValue>>;

    fn byte_size(&self) -> u64;

    fn value_as_unsigned(&self) -> u64;

    fn pointee_as_byte_string(&self, char_size: u32, max_string_size: u32)
        -> Option<PointeeBytes>;
}

#[derive(Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ExpressionPathResult {
    path: String,
    has_path: bool,
}

#[derive(Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct CachedViewResult {
    value_info: Option<ValueInfo>,
    address_value: Option<ValueHandle>,
    address_info: Option<ValueInfo>,
}

/// Live proxy for a value handle. Releases the handle when dropped.
pub struct ValueProxy {
    stub: Stub,
    handle: OwnedHandle<ValueHandle>,
}

impl ValueProxy {
    pub fn new(session: &Session, handle: ValueHandle) -> Self {
        Self {
            stub: Stub::new(session, service::VALUE),
            handle: OwnedHandle::new(session.connection().clone(), handle),
        }
    }

    fn request(&self) -> Value {
        self.request_with(Value::Null)
    }

    fn request_with(&self, params: Value) -> Value {
        proxy::request("value", self.handle.get(), params)
    }

    fn wrap(&self, handle: Option<ValueHandle>) -> Option<Arc<dyn RemoteValue>> {
        self.stub.session().wrap(handle)
    }

    fn call_for_value(&self, method: &str, params: Value) -> Option<Arc<dyn RemoteValue>> {
        let handle = self
            .stub
            .call::<Option<ValueHandle>>(method, self.request_with(params))
            .flatten();
        self.wrap(handle)
    }

    async fn call_for_value_async(&self, method: &str, params: Value) -> Option<Arc<dyn RemoteValue>> {
        let handle = self
            .stub
            .call_async::<Option<ValueHandle>>(method, self.request_with(params))
            .await
            .flatten();
        self.wrap(handle)
    }

    fn snapshot(
        &self,
        inner: Arc<dyn RemoteValue>,
        info: ValueInfo,
        address_of: Option<Arc<dyn RemoteValue>>,
        format: ValueFormat,
    ) -> Arc<dyn RemoteValue> {
        let type_info = self.stub.session().wrap(info.type_info.clone());
        Arc::new(CachedValue::new(inner, address_of, type_info, info, format))
    }
}

#[async_trait]
impl RemoteValue for ValueProxy {
    fn handle(&self) -> &ValueHandle {
        self.handle.get()
    }

    fn name(&self) -> String {
        self.handle.get().name.clone()
    }

    fn error(&self) -> Option<LldbError> {
        self.handle.get().error.clone()
    }

    fn value(&self, format: ValueFormat) -> String {
        self.stub
            .call("GetValue", self.request_with(json!({ "format": format })))
            .unwrap_or_default()
    }

    fn summary(&self, format: ValueFormat) -> String {
        self.stub
            .call("GetSummary", self.request_with(json!({ "format": format })))
            .unwrap_or_default()
    }

    fn type_info(&self) -> Option<Arc<dyn RemoteType>> {
        let handle = self
            .stub
            .call::<Option<TypeHandle>>("GetTypeInfo", self.request())
            .flatten();
        self.stub.session().wrap(handle)
    }

    fn type_name(&self) -> String {
        self.stub.call("GetTypeName", self.request()).unwrap_or_default()
    }

    fn value_type(&self) -> ValueType {
        self.stub.call("GetValueType", self.request()).unwrap_or_default()
    }

    fn num_children(&self) -> u32 {
        self.stub.call("GetNumChildren", self.request()).unwrap_or_default()
    }

    fn children(&self, offset: u32, count: u32) -> Vec<Option<Arc<dyn RemoteValue>>> {
        let mut returned = self
            .stub
            .call::<HashMap<u32, ValueHandle>>(
                "GetChildren",
                self.request_with(json!({ "offset": offset, "count": count })),
            )
            .unwrap_or_default();
        (0..count)
            .map(|n| {
                let index = offset.checked_add(n)?;
                self.wrap(returned.remove(&index))
            })
            .collect()
    }

    fn child_at_index(&self, index: u32) -> Option<Arc<dyn RemoteValue>> {
        self.call_for_value("GetChildAtIndex", json!({ "index": index }))
    }

    fn create_value_from_expression(
        &self,
        name: &str,
        expression: &str,
    ) -> Option<Arc<dyn RemoteValue>> {
        self.call_for_value(
            "CreateValueFromExpression",
            json!({ "name": name, "expression": expression }),
        )
    }

    async fn create_value_from_expression_async(
        &self,
        name: &str,
        expression: &str,
    ) -> Option<Arc<dyn RemoteValue>> {
        self.call_for_value_async(
            "CreateValueFromExpression",
            json!({ "name": name, "expression": expression }),
        )
        .await
    }

    fn create_value_from_address(
        &self,
        name: &str,
        address: u64,
        type_info: &dyn RemoteType,
    ) -> Option<Arc<dyn RemoteValue>> {
        self.call_for_value(
            "CreateValueFromAddress",
            json!({
                "name": name,
                "address": address,
                "type": { "id": type_info.handle().id },
            }),
        )
    }

    fn evaluate_expression(&self, expression: &str) -> Option<Arc<dyn RemoteValue>> {
        self.call_for_value("EvaluateExpression", json!({ "expression": expression }))
    }

    async fn evaluate_expression_async(&self, expression: &str) -> Option<Arc<dyn RemoteValue>> {
        self.call_for_value_async("EvaluateExpression", json!({ "expression": expression }))
            .await
    }

    async fn evaluate_expression_lldb_eval(
        &self,
        expression: &str,
        scratch_variables: &HashMap<String, Arc<dyn RemoteValue>>,
    ) -> Option<Arc<dyn RemoteValue>> {
        let context: HashMap<&str, &ValueHandle> = scratch_variables
            .iter()
            .map(|(name, value)| (name.as_str(), value.handle()))
            .collect();
        let params = json!({ "expression": expression, "contextArguments": context });
        self.call_for_value_async("EvaluateExpressionLldbEval", params)
            .await
    }

    fn clone_value(&self) -> Option<Arc<dyn RemoteValue>> {
        self.call_for_value("Clone", json!({}))
    }

    fn dereference(&self) -> Option<Arc<dyn RemoteValue>> {
        self.call_for_value("Dereference", json!({}))
    }

    fn child_member_with_name(&self, name: &str) -> Option<Arc<dyn RemoteValue>> {
        self.call_for_value("GetChildMemberWithName", json!({ "name": name }))
    }

    fn address_of(&self) -> Option<Arc<dyn RemoteValue>> {
        self.call_for_value("AddressOf", json!({}))
    }

    fn type_is_pointer_type(&self) -> bool {
        self.stub
            .call("TypeIsPointerType", self.request())
            .unwrap_or_default()
    }

    fn value_for_expression_path(&self, expression_path: &str) -> Option<Arc<dyn RemoteValue>> {
        self.call_for_value(
            "GetValueForExpressionPath",
            json!({ "expressionPath": expression_path }),
        )
    }

    fn expression_path(&self) -> Option<String> {
        self.stub
            .call::<ExpressionPathResult>("GetExpressionPath", self.request())
            .filter(|result| result.has_path)
            .map(|result| result.path)
    }

    fn cached_view(self: Arc<Self>, format: ValueFormat) -> Option<Arc<dyn RemoteValue>> {
        let result = self.stub.call::<CachedViewResult>(
            "GetCachedView",
            self.request_with(json!({ "format": format })),
        )?;
        let info = result.value_info?;
        let address_of = self.wrap(result.address_value).map(|address| {
            match result.address_info {
                Some(address_info) => {
                    self.snapshot(address, address_info, None, ValueFormat::Default)
                }
                None => address,
            }
        });
        let inner: Arc<dyn RemoteValue> = self.clone();
        Some(self.snapshot(inner, info, address_of, format))
    }

    fn byte_size(&self) -> u64 {
        self.stub.call("GetByteSize", self.request()).unwrap_or_default()
    }

    fn value_as_unsigned(&self) -> u64 {
        self.stub
            .call("GetValueAsUnsigned", self.request())
            .unwrap_or_default()
    }

    fn pointee_as_byte_string(
        &self,
        char_size: u32,
        max_string_size: u32,
    ) -> Option<PointeeBytes> {
        self.stub.call(
            "GetPointeeAsByteString",
            self.request_with(json!({ "charSize": char_size, "maxStringSize": max_string_size })),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::fake_session;
    use sbproxy_rpc::StatusCode;

    fn value(session: &Session, id: u64) -> Arc<dyn RemoteValue> {
        session.wrap(Some(ValueHandle::new(id))).unwrap()
    }

    #[test]
    fn children_wraps_every_returned_handle() {
        let (fake, session) = fake_session();
        fake.respond("GetNumChildren", json!(3));
        fake.respond(
            "GetChildren",
            json!({ "0": { "id": 100 }, "1": { "id": 101 }, "2": { "id": 102 } }),
        );
        let parent = value(&session, 42);

        let count = parent.num_children();
        let children = parent.children(0, count);

        assert_eq!(children.len(), 3);
        let ids: Vec<u64> = children
            .iter()
            .map(|c| c.as_ref().map_or(0, |c| c.handle().id))
            .collect();
        assert_eq!(ids, vec![100, 101, 102]);
        let request = &fake.calls_to("GetChildren")[0];
        assert_eq!(request["value"]["id"], json!(42));
        assert_eq!(request["count"], json!(3));
    }

    #[test]
    fn missing_or_null_children_are_none() {
        let (fake, session) = fake_session();
        fake.respond("GetChildren", json!({ "0": { "id": 100 }, "2": { "id": 0 } }));
        let children = value(&session, 42).children(0, 3);
        assert_eq!(children.len(), 3);
        assert!(children[0].is_some());
        assert!(children[1].is_none());
        assert!(children[2].is_none());
    }

    #[test]
    fn children_are_keyed_by_absolute_index() {
        let (fake, session) = fake_session();
        fake.respond("GetChildren", json!({ "10": { "id": 7 }, "11": { "id": 8 } }));
        let children = value(&session, 1).children(10, 2);
        assert_eq!(children[0].as_ref().map(|c| c.handle().id), Some(7));
        assert_eq!(children[1].as_ref().map(|c| c.handle().id), Some(8));
    }

    #[test]
    fn failed_calls_return_sentinels() {
        let (fake, session) = fake_session();
        let v = value(&session, 42);

        assert_eq!(v.value(ValueFormat::Hex), "");
        assert_eq!(v.summary(ValueFormat::Default), "");
        assert!(v.type_info().is_none());
        assert_eq!(v.type_name(), "");
        assert_eq!(v.value_type(), ValueType::Invalid);
        assert_eq!(v.num_children(), 0);
        let children = v.children(0, 2);
        assert_eq!(children.len(), 2);
        assert!(children.iter().all(Option::is_none));
        assert!(v.dereference().is_none());
        assert!(v.evaluate_expression("1 + 1").is_none());
        assert!(!v.type_is_pointer_type());
        assert_eq!(v.expression_path(), None);
        assert_eq!(v.byte_size(), 0);
        assert_eq!(v.value_as_unsigned(), 0);
        assert!(v.pointee_as_byte_string(1, 32).is_none());
        assert!(v.clone().cached_view(ValueFormat::Default).is_none());
        assert!(fake.call_count("GetValue") == 1);
    }

    #[test]
    fn prefetched_fields_cost_no_calls() {
        let (fake, session) = fake_session();
        let handle = ValueHandle {
            id: 5,
            name: "argc".into(),
            error: Some(LldbError::ok()),
        };
        let v = session.wrap(Some(handle)).unwrap();
        assert_eq!(v.name(), "argc");
        assert!(v.error().is_some_and(|e| e.is_success()));
        assert!(fake.calls().is_empty());
    }

    #[test]
    fn scalar_results_are_read() {
        let (fake, session) = fake_session();
        fake.respond("GetValue", json!("0x2a"));
        fake.respond("GetValueType", json!("variableLocal"));
        fake.respond("GetByteSize", json!(8));
        fake.respond(
            "GetPointeeAsByteString",
            json!({ "data": [104, 105], "error": "" }),
        );
        let v = value(&session, 3);
        assert_eq!(v.value(ValueFormat::Hex), "0x2a");
        assert_eq!(v.value_type(), ValueType::VariableLocal);
        assert_eq!(v.byte_size(), 8);
        let bytes = v.pointee_as_byte_string(1, 16).unwrap();
        assert_eq!(bytes.data, b"hi");
        assert_eq!(fake.calls_to("GetValue")[0]["format"], json!("hex"));
    }

    #[test]
    fn expression_path_requires_flag() {
        let (fake, session) = fake_session();
        fake.respond("GetExpressionPath", json!({ "path": "a.b", "hasPath": false }));
        assert_eq!(value(&session, 1).expression_path(), None);
        fake.respond("GetExpressionPath", json!({ "path": "a.b", "hasPath": true }));
        assert_eq!(value(&session, 1).expression_path().as_deref(), Some("a.b"));
    }

    #[test]
    fn failure_is_reported_to_error_handler() {
        let (fake, session) = fake_session();
        fake.fail("GetTypeName", StatusCode::Unavailable);
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let sink = seen.clone();
        session
            .connection()
            .set_rpc_error_handler(Box::new(move |method, _| {
                sink.lock().unwrap().push(method.to_string());
            }));
        assert_eq!(value(&session, 1).type_name(), "");
        assert_eq!(
            *seen.lock().unwrap(),
            vec!["RemoteValueRpcService/GetTypeName".to_string()]
        );
    }

    #[test]
    fn dropping_proxy_queues_handle() {
        let (fake, session) = fake_session();
        drop(value(&session, 77));
        assert_eq!(session.connection().pending_deletions(), 1);
        session.flush_deletions();
        let request = &fake.calls_to("RemoteValueRpcService/BulkDelete")[0];
        assert_eq!(request["values"][0]["id"], json!(77));
    }

    #[tokio::test]
    async fn async_evaluation_wraps_result() {
        let (fake, session) = fake_session();
        fake.respond("EvaluateExpression", json!({ "id": 9, "name": "$0" }));
        let v = value(&session, 1);
        let result = v.evaluate_expression_async("x * 2").await.unwrap();
        assert_eq!(result.name(), "$0");
        assert_eq!(fake.calls_to("EvaluateExpression")[0]["expression"], json!("x * 2"));
    }

    #[tokio::test]
    async fn lldb_eval_sends_scratch_variables() {
        let (fake, session) = fake_session();
        fake.respond("EvaluateExpressionLldbEval", json!({ "id": 11 }));
        let mut scratch = HashMap::new();
        scratch.insert("$tmp".to_string(), value(&session, 4));
        let result = value(&session, 1)
            .evaluate_expression_lldb_eval("$tmp + 1", &scratch)
            .await;
        assert_eq!(result.map(|r| r.handle().id), Some(11));
        let request = &fake.calls_to("EvaluateExpressionLldbEval")[0];
        assert_eq!(request["contextArguments"]["$tmp"]["id"], json!(4));
    }
}
