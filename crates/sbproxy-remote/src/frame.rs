//! Stack frames.
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use sbproxy_rpc::{CancellationToken, OwnedHandle};
use serde_json::{json, Value};

use crate::handle::{
    FrameHandle, FunctionHandle, ModuleHandle, SymbolHandle, ThreadHandle, ValueHandle,
};
use crate::module::RemoteModule;
use crate::protocol::{service, AddressRange, FrameInfo, FrameInfoFlags, LineEntry, ValueType};
use crate::proxy::{self, Stub};
use crate::session::Session;
use crate::symbol::{RemoteFunction, RemoteSymbol};
use crate::thread::RemoteThread;
use crate::value::RemoteValue;

/// A frame of a stopped thread.
#[async_trait]
pub trait RemoteFrame: Send + Sync {
    fn handle(&self) -> &FrameHandle;

    fn function_name(&self) -> String {
        self.handle().function_name.clone()
    }

    fn function_name_with_signature(&self) -> String {
        self.handle().function_name_with_signature.clone()
    }

    fn pc(&self) -> u64 {
        self.handle().program_counter
    }

    fn line_entry(&self) -> Option<LineEntry> {
        self.handle().line_entry.clone()
    }

    fn function(&self) -> Option<Arc<dyn RemoteFunction>>;

    fn symbol(&self) -> Option<Arc<dyn RemoteSymbol>>;

    fn module(&self) -> Option<Arc<dyn RemoteModule>>;

    fn thread(&self) -> Option<Arc<dyn RemoteThread>>;

    fn registers(&self) -> Vec<Arc<dyn RemoteValue>>;

    fn variables(
        &self,
        arguments: bool,
        locals: bool,
        statics: bool,
        only_in_scope: bool,
    ) -> Vec<Arc<dyn RemoteValue>>;

    fn value_for_variable_path(&self, variable_path: &str) -> Option<Arc<dyn RemoteValue>>;

    fn find_value(&self, name: &str, value_type: ValueType) -> Option<Arc<dyn RemoteValue>>;

    fn evaluate_expression(&self, expression: &str) -> Option<Arc<dyn RemoteValue>>;

    async fn evaluate_expression_async(&self, expression: &str) -> Option<Arc<dyn RemoteValue>>;

    /// Like [`evaluate_expression_async`](Self::evaluate_expression_async),
    /// but gives up waiting once `token` is cancelled. The evaluation
    /// itself still runs to completion remotely.
    async fn evaluate_expression_cancellable(
        &self,
        token: &CancellationToken,
        expression: &str,
    ) -> Option<Arc<dyn RemoteValue>>;

    async fn evaluate_expression_lldb_eval(
        &self,
        expression: &str,
        scratch_variables: &HashMap<String, Arc<dyn RemoteValue>>,
    ) -> Option<Arc<dyn RemoteValue>>;

    fn physical_stack_range(&self) -> Option<AddressRange>;

    fn info(&self, fields: FrameInfoFlags) -> Option<FrameInfo<Arc<dyn RemoteModule>>>;

    fn set_pc(&self, address: u64) -> bool;
}

pub struct FrameProxy {
    stub: Stub,
    handle: OwnedHandle<FrameHandle>,
}

impl FrameProxy {
    pub fn new(session: &Session, handle: FrameHandle) -> Self {
        Self {
            stub: Stub::new(session, service::FRAME),
            handle: OwnedHandle::new(session.connection().clone(), handle),
        }
    }

    fn request(&self, params: Value) -> Value {
        proxy::request("frame", self.handle.get(), params)
    }

    fn values(&self, method: &str, params: Value) -> Vec<Arc<dyn RemoteValue>> {
        self.stub
            .call::<Vec<ValueHandle>>(method, self.request(params))
            .unwrap_or_default()
            .into_iter()
            .filter_map(|h| self.stub.session().wrap(Some(h)))
            .collect()
    }

    fn value(&self, method: &str, params: Value) -> Option<Arc<dyn RemoteValue>> {
        let handle = self
            .stub
            .call::<Option<ValueHandle>>(method, self.request(params))
            .flatten();
        self.stub.session().wrap(handle)
    }

    async fn value_async(&self, method: &str, params: Value) -> Option<Arc<dyn RemoteValue>> {
        let handle = self
            .stub
            .call_async::<Option<ValueHandle>>(method, self.request(params))
            .await
            .flatten();
        self.stub.session().wrap(handle)
    }
}

#[async_trait]
impl RemoteFrame for FrameProxy {
    fn handle(&self) -> &FrameHandle {
        self.handle.get()
    }

    fn function(&self) -> Option<Arc<dyn RemoteFunction>> {
        let handle = self
            .stub
            .call::<Option<FunctionHandle>>("GetFunction", self.request(Value::Null))
            .flatten();
        self.stub.session().wrap(handle)
    }

    fn symbol(&self) -> Option<Arc<dyn RemoteSymbol>> {
        let handle = self
            .stub
            .call::<Option<SymbolHandle>>("GetSymbol", self.request(Value::Null))
            .flatten();
        self.stub.session().wrap(handle)
    }

    fn module(&self) -> Option<Arc<dyn RemoteModule>> {
        let handle = self
            .stub
            .call::<Option<ModuleHandle>>("GetModule", self.request(Value::Null))
            .flatten();
        self.stub.session().wrap(handle)
    }

    fn thread(&self) -> Option<Arc<dyn RemoteThread>> {
        let handle = self
            .stub
            .call::<Option<ThreadHandle>>("GetThread", self.request(Value::Null))
            .flatten();
        self.stub.session().wrap(handle)
    }

    fn registers(&self) -> Vec<Arc<dyn RemoteValue>> {
        self.values("GetRegisters", Value::Null)
    }

    fn variables(
        &self,
        arguments: bool,
        locals: bool,
        statics: bool,
        only_in_scope: bool,
    ) -> Vec<Arc<dyn RemoteValue>> {
        self.values(
            "GetVariables",
            json!({
                "arguments": arguments,
                "locals": locals,
                "statics": statics,
                "onlyInScope": only_in_scope,
            }),
        )
    }

    fn value_for_variable_path(&self, variable_path: &str) -> Option<Arc<dyn RemoteValue>> {
        self.value(
            "GetValueForVariablePath",
            json!({ "variablePath": variable_path }),
        )
    }

    fn find_value(&self, name: &str, value_type: ValueType) -> Option<Arc<dyn RemoteValue>> {
        self.value(
            "FindValue",
            json!({ "variableName": name, "valueType": value_type }),
        )
    }

    fn evaluate_expression(&self, expression: &str) -> Option<Arc<dyn RemoteValue>> {
        self.value("EvaluateExpression", json!({ "expression": expression }))
    }

    async fn evaluate_expression_async(&self, expression: &str) -> Option<Arc<dyn RemoteValue>> {
        self.value_async("EvaluateExpression", json!({ "expression": expression }))
            .await
    }

    async fn evaluate_expression_cancellable(
        &self,
        token: &CancellationToken,
        expression: &str,
    ) -> Option<Arc<dyn RemoteValue>> {
        let handle = self
            .stub
            .call_async_cancellable::<Option<ValueHandle>>(
                token,
                "EvaluateExpression",
                self.request(json!({ "expression": expression })),
            )
            .await
            .flatten();
        self.stub.session().wrap(handle)
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
        self.value_async(
            "EvaluateExpressionLldbEval",
            json!({ "expression": expression, "contextArguments": context }),
        )
        .await
    }

    fn physical_stack_range(&self) -> Option<AddressRange> {
        self.stub
            .call::<Option<AddressRange>>("GetPhysicalStackRange", self.request(Value::Null))
            .flatten()
    }

    fn info(&self, fields: FrameInfoFlags) -> Option<FrameInfo<Arc<dyn RemoteModule>>> {
        let info = self
            .stub
            .call::<Option<FrameInfo>>("GetInfo", self.request(json!({ "fields": fields })))
            .flatten()?;
        Some(info.map_module(|m| self.stub.session().wrap(Some(m))))
    }

    fn set_pc(&self, address: u64) -> bool {
        self.stub
            .call("SetPC", self.request(json!({ "address": address })))
            .unwrap_or_default()
    }
}
