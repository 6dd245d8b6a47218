//! A value snapshot that answers immutable queries locally.
//!
//! The immutable fields are captured once, when the snapshot is built.
//! The value and summary strings depend on the display format; they are
//! kept for the last format asked for and refetched together, one call
//! each, when a different format is requested.
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;

use crate::error::LldbError;
use crate::handle::ValueHandle;
use crate::protocol::{ValueFormat, ValueInfo, ValueType};
use crate::types::RemoteType;
use crate::value::{PointeeBytes, RemoteValue};

struct Formatted {
    format: ValueFormat,
    value: String,
    summary: String,
}

pub struct CachedValue {
    inner: Arc<dyn RemoteValue>,
    address_of: Option<Arc<dyn RemoteValue>>,
    type_info: Option<Arc<dyn RemoteType>>,
    name: String,
    error: Option<LldbError>,
    type_name: String,
    expression_path: Option<String>,
    num_children: u32,
    value_type: ValueType,
    is_pointer_type: bool,
    byte_size: u64,
    formatted: Mutex<Formatted>,
}

impl CachedValue {
    /// Snapshot `inner` from `info`, whose value and summary were
    /// computed under `format`.
    pub fn new(
        inner: Arc<dyn RemoteValue>,
        address_of: Option<Arc<dyn RemoteValue>>,
        type_info: Option<Arc<dyn RemoteType>>,
        info: ValueInfo,
        format: ValueFormat,
    ) -> Self {
        Self {
            name: inner.name(),
            error: inner.error(),
            address_of,
            type_info,
            type_name: info.type_name,
            expression_path: info.has_expression_path.then_some(info.expression_path),
            num_children: info.num_children,
            value_type: info.value_type,
            is_pointer_type: info.is_pointer_type,
            byte_size: info.byte_size,
            formatted: Mutex::new(Formatted {
                format,
                value: info.value,
                summary: info.summary,
            }),
            inner,
        }
    }

    /// Build a snapshot with one call per field, for debuggers that
    /// cannot answer a cached-view call.
    pub fn prefetch(inner: Arc<dyn RemoteValue>, format: ValueFormat) -> Self {
        let info = ValueInfo {
            type_info: None,
            type_name: inner.type_name(),
            expression_path: String::new(),
            has_expression_path: false,
            num_children: inner.num_children(),
            summary: inner.summary(format),
            value: inner.value(format),
            value_type: inner.value_type(),
            is_pointer_type: inner.type_is_pointer_type(),
            byte_size: inner.byte_size(),
        };
        let mut cached = Self::new(
            Arc::clone(&inner),
            inner.address_of(),
            inner.type_info(),
            info,
            format,
        );
        cached.expression_path = inner.expression_path();
        cached
    }

    pub fn inner(&self) -> &Arc<dyn RemoteValue> {
        &self.inner
    }

    /// Value and summary under `format`, refetching both if the stored
    /// pair was computed under another format.
    fn formatted<R>(&self, format: ValueFormat, read: impl FnOnce(&Formatted) -> R) -> R {
        let mut formatted = self
            .formatted
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if formatted.format != format {
            tracing::trace!(id = self.inner.handle().id, ?format, "refreshing formatted value");
            formatted.value = self.inner.value(format);
            formatted.summary = self.inner.summary(format);
            formatted.format = format;
        }
        read(&formatted)
    }
}

#[async_trait]
impl RemoteValue for CachedValue {
    fn handle(&self) -> &ValueHandle {
        self.inner.handle()
    }

    fn name(&self) -> String {
        self.name.clone()
    }

    fn error(&self) -> Option<LldbError> {
        self.error.clone()
    }

    fn value(&self, format: ValueFormat) -> String {
        self.formatted(format, |f| f.value.clone())
    }

    fn summary(&self, format: ValueFormat) -> String {
        self.formatted(format, |f| f.summary.clone())
    }

    fn type_info(&self) -> Option<Arc<dyn RemoteType>> {
        self.type_info.clone()
    }

    fn type_name(&self) -> String {
        self.type_name.clone()
    }

    fn value_type(&self) -> ValueType {
        self.value_type
    }

    fn num_children(&self) -> u32 {
        self.num_children
    }

    fn children(&self, offset: u32, count: u32) -> Vec<Option<Arc<dyn RemoteValue>>> {
        self.inner.children(offset, count)
    }

    fn child_at_index(&self, index: u32) -> Option<Arc<dyn RemoteValue>> {
        self.inner.child_at_index(index)
    }

    fn create_value_from_expression(
        &self,
        name: &str,
        expression: &str,
    ) -> Option<Arc<dyn RemoteValue>> {
        self.inner.create_value_from_expression(name, expression)
    }

    async fn create_value_from_expression_async(
        &self,
        name: &str,
        expression: &str,
    ) -> Option<Arc<dyn RemoteValue>> {
        self.inner
            .create_value_from_expression_async(name, expression)
            .await
    }

    fn create_value_from_address(
        &self,
        name: &str,
        address: u64,
        type_info: &dyn RemoteType,
    ) -> Option<Arc<dyn RemoteValue>> {
        self.inner.create_value_from_address(name, address, type_info)
    }

    fn evaluate_expression(&self, expression: &str) -> Option<Arc<dyn RemoteValue>> {
        self.inner.evaluate_expression(expression)
    }

    async fn evaluate_expression_async(&self, expression: &str) -> Option<Arc<dyn RemoteValue>> {
        self.inner.evaluate_expression_async(expression).await
    }

    async fn evaluate_expression_lldb_eval(
        &self,
        expression: &str,
        scratch_variables: &HashMap<String, Arc<dyn RemoteValue>>,
    ) -> Option<Arc<dyn RemoteValue>> {
        self.inner
            .evaluate_expression_lldb_eval(expression, scratch_variables)
            .await
    }

    fn clone_value(&self) -> Option<Arc<dyn RemoteValue>> {
        self.inner.clone_value()
    }

    fn dereference(&self) -> Option<Arc<dyn RemoteValue>> {
        self.inner.dereference()
    }

    fn child_member_with_name(&self, name: &str) -> Option<Arc<dyn RemoteValue>> {
        self.inner.child_member_with_name(name)
    }

    fn address_of(&self) -> Option<Arc<dyn RemoteValue>> {
        self.address_of.clone()
    }

    fn type_is_pointer_type(&self) -> bool {
        self.is_pointer_type
    }

    fn value_for_expression_path(&self, expression_path: &str) -> Option<Arc<dyn RemoteValue>> {
        self.inner.value_for_expression_path(expression_path)
    }

    fn expression_path(&self) -> Option<String> {
        self.expression_path.clone()
    }

    fn cached_view(self: Arc<Self>, _format: ValueFormat) -> Option<Arc<dyn RemoteValue>> {
        Some(self)
    }

    fn byte_size(&self) -> u64 {
        self.byte_size
    }

    fn value_as_unsigned(&self) -> u64 {
        self.inner.value_as_unsigned()
    }

    fn pointee_as_byte_string(
        &self,
        char_size: u32,
        max_string_size: u32,
    ) -> Option<PointeeBytes> {
        self.inner.pointee_as_byte_string(char_size, max_string_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::fake_session;
    use serde_json::json;

    fn cached_view_response() -> serde_json::Value {
        json!({
            "valueInfo": {
                "type": { "id": 12, "name": "int" },
                "typeName": "int",
                "expressionPath": "argc",
                "hasExpressionPath": true,
                "numChildren": 0,
                "summary": "",
                "value": "3",
                "valueType": "variableArgument",
                "isPointerType": false,
                "byteSize": 4
            },
            "addressValue": { "id": 43 },
            "addressInfo": { "typeName": "int *", "value": "0x1000", "isPointerType": true }
        })
    }

    fn snapshot() -> (std::sync::Arc<sbproxy_rpc::testing::FakeInvoker>, Arc<dyn RemoteValue>) {
        let (fake, session) = fake_session();
        fake.respond("GetCachedView", cached_view_response());
        let live: Arc<dyn RemoteValue> = session
            .wrap(Some(ValueHandle {
                id: 42,
                name: "argc".into(),
                error: None,
            }))
            .unwrap();
        let cached = live.cached_view(ValueFormat::Default).unwrap();
        (fake, cached)
    }

    #[test]
    fn immutable_fields_cost_no_further_calls() {
        let (fake, cached) = snapshot();
        assert_eq!(fake.calls().len(), 1);

        assert_eq!(cached.name(), "argc");
        assert_eq!(cached.type_name(), "int");
        assert_eq!(cached.num_children(), 0);
        assert_eq!(cached.byte_size(), 4);
        assert_eq!(cached.value_type(), ValueType::VariableArgument);
        assert!(!cached.type_is_pointer_type());
        assert_eq!(cached.expression_path().as_deref(), Some("argc"));
        assert_eq!(cached.type_info().map(|t| t.handle().id), Some(12));
        assert_eq!(cached.value(ValueFormat::Default), "3");
        assert_eq!(cached.summary(ValueFormat::Default), "");

        let address = cached.address_of().unwrap();
        assert_eq!(address.handle().id, 43);
        assert!(address.type_is_pointer_type());
        assert_eq!(address.value(ValueFormat::Default), "0x1000");

        assert_eq!(fake.calls().len(), 1);
    }

    #[test]
    fn format_change_refetches_value_and_summary_once() {
        let (fake, cached) = snapshot();
        fake.respond("GetValue", json!("0x3"));
        fake.respond("GetSummary", json!("three"));

        assert_eq!(cached.value(ValueFormat::Hex), "0x3");
        assert_eq!(cached.value(ValueFormat::Hex), "0x3");
        assert_eq!(cached.summary(ValueFormat::Hex), "three");
        assert_eq!(fake.call_count("GetValue"), 1);
        assert_eq!(fake.call_count("GetSummary"), 1);

        fake.respond("GetValue", json!("3"));
        fake.respond("GetSummary", json!(""));
        assert_eq!(cached.summary(ValueFormat::Decimal), "");
        assert_eq!(cached.value(ValueFormat::Decimal), "3");
        assert_eq!(fake.call_count("GetValue"), 2);
        assert_eq!(fake.call_count("GetSummary"), 2);
        assert_eq!(fake.calls_to("GetValue")[1]["format"], json!("decimal"));
    }

    #[test]
    fn live_operations_delegate() {
        let (fake, cached) = snapshot();
        fake.respond("GetChildren", json!({ "0": { "id": 50 } }));
        let children = cached.children(0, 1);
        assert_eq!(children[0].as_ref().map(|c| c.handle().id), Some(50));
        assert_eq!(fake.calls_to("GetChildren")[0]["value"]["id"], json!(42));
    }

    #[test]
    fn cached_view_of_snapshot_is_itself() {
        let (fake, cached) = snapshot();
        let again = Arc::clone(&cached).cached_view(ValueFormat::Hex).unwrap();
        assert!(Arc::ptr_eq(&cached, &again));
        assert_eq!(fake.call_count("GetCachedView"), 1);
    }

    #[test]
    fn prefetch_builds_snapshot_from_individual_calls() {
        let (fake, session) = fake_session();
        fake.respond("GetTypeName", json!("char *"));
        fake.respond("GetNumChildren", json!(1));
        fake.respond("GetValue", json!("0x2000"));
        fake.respond("GetSummary", json!("\"hi\""));
        fake.respond("TypeIsPointerType", json!(true));
        fake.respond("GetByteSize", json!(8));
        fake.respond("GetExpressionPath", json!({ "path": "s", "hasPath": true }));
        let live = session.wrap(Some(ValueHandle::new(8))).unwrap();

        let cached = CachedValue::prefetch(live, ValueFormat::Default);
        let calls = fake.calls().len();

        assert_eq!(cached.type_name(), "char *");
        assert_eq!(cached.num_children(), 1);
        assert_eq!(cached.summary(ValueFormat::Default), "\"hi\"");
        assert!(cached.type_is_pointer_type());
        assert_eq!(cached.byte_size(), 8);
        assert_eq!(cached.expression_path().as_deref(), Some("s"));
        assert!(cached.address_of().is_none());
        assert_eq!(fake.calls().len(), calls);
    }
}
