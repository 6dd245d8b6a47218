//! Debug targets: breakpoints, modules, watchpoints and core files.
use std::sync::Arc;

use serde::Deserialize;
use serde_json::{json, Value};

use crate::breakpoint::RemoteBreakpoint;
use crate::error::{LldbError, ProxyError};
use crate::handle::{
    AddressHandle, BreakpointHandle, ModuleHandle, ProcessHandle, TargetHandle, WatchpointHandle,
};
use crate::listener::RemoteListener;
use crate::module::RemoteModule;
use crate::process::RemoteProcess;
use crate::protocol::{service, BreakpointError, InstructionInfo};
use crate::proxy::{self, Stub};
use crate::session::Session;
use crate::symbol::RemoteAddress;
use crate::watchpoint::RemoteWatchpoint;

pub trait RemoteTarget: Send + Sync {
    fn handle(&self) -> &TargetHandle;

    fn id(&self) -> u64 {
        self.handle().id
    }

    /// Attach to `pid`. The process is `None` when attaching failed;
    /// the error says why.
    fn attach_to_process_with_id(
        &self,
        listener: &dyn RemoteListener,
        pid: u64,
    ) -> (Option<Arc<dyn RemoteProcess>>, LldbError);

    fn breakpoint_create_by_location(&self, file: &str, line: u32)
        -> Option<Arc<dyn RemoteBreakpoint>>;

    fn breakpoint_create_by_name(&self, symbol_name: &str) -> Option<Arc<dyn RemoteBreakpoint>>;

    fn breakpoint_create_by_address(&self, address: u64) -> Option<Arc<dyn RemoteBreakpoint>>;

    fn create_function_offset_breakpoint(
        &self,
        symbol_name: &str,
        offset: u32,
    ) -> (Option<Arc<dyn RemoteBreakpoint>>, BreakpointError);

    fn breakpoint_delete(&self, breakpoint_id: i32) -> bool;

    fn find_breakpoint_by_id(&self, id: i32) -> Result<Option<Arc<dyn RemoteBreakpoint>>, ProxyError>;

    fn num_modules(&self) -> u32;

    fn module_at_index(&self, index: u32) -> Option<Arc<dyn RemoteModule>>;

    fn watch_address(
        &self,
        address: u64,
        size: u64,
        read: bool,
        write: bool,
    ) -> (Option<Arc<dyn RemoteWatchpoint>>, LldbError);

    fn delete_watchpoint(&self, watch_id: i32) -> bool;

    fn resolve_load_address(&self, address: u64) -> Option<Arc<dyn RemoteAddress>>;

    fn load_core(&self, core_file: &str) -> Option<Arc<dyn RemoteProcess>>;

    fn add_module(&self, path: &str, triple: &str, uuid: &str) -> Option<Arc<dyn RemoteModule>>;

    fn remove_module(&self, module: &dyn RemoteModule) -> bool;

    fn set_module_load_address(&self, module: &dyn RemoteModule, sections_offset: i64)
        -> LldbError;

    /// Disassemble `count` instructions from `address`. Empty on failure.
    fn read_instruction_infos(
        &self,
        address: &dyn RemoteAddress,
        count: u32,
        flavor: &str,
    ) -> Vec<InstructionInfo>;
}

#[derive(Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct AttachResult {
    process: Option<ProcessHandle>,
    error: LldbError,
}

#[derive(Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct FunctionOffsetResult {
    breakpoint: Option<BreakpointHandle>,
    error: BreakpointError,
}

#[derive(Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct WatchResult {
    watchpoint: Option<WatchpointHandle>,
    error: LldbError,
}

pub struct TargetProxy {
    stub: Stub,
    handle: TargetHandle,
}

impl TargetProxy {
    pub fn new(session: &Session, handle: TargetHandle) -> Self {
        Self {
            stub: Stub::new(session, service::TARGET),
            handle,
        }
    }

    fn request(&self, params: Value) -> Value {
        proxy::request("target", &self.handle, params)
    }

    fn breakpoint(&self, method: &str, params: Value) -> Option<Arc<dyn RemoteBreakpoint>> {
        let handle = self
            .stub
            .call::<Option<BreakpointHandle>>(method, self.request(params))
            .flatten();
        self.stub.session().wrap(handle)
    }

    fn module(&self, method: &str, params: Value) -> Option<Arc<dyn RemoteModule>> {
        let handle = self
            .stub
            .call::<Option<ModuleHandle>>(method, self.request(params))
            .flatten();
        self.stub.session().wrap(handle)
    }

    fn process(&self, handle: Option<ProcessHandle>) -> Option<Arc<dyn RemoteProcess>> {
        self.stub.session().wrap(handle)
    }
}

impl RemoteTarget for TargetProxy {
    fn handle(&self) -> &TargetHandle {
        &self.handle
    }

    fn attach_to_process_with_id(
        &self,
        listener: &dyn RemoteListener,
        pid: u64,
    ) -> (Option<Arc<dyn RemoteProcess>>, LldbError) {
        let request = self.request(json!({ "listener": listener.handle(), "pid": pid }));
        match self.stub.call::<AttachResult>("AttachToProcessWithID", request) {
            Some(result) => (self.process(result.process), result.error),
            None => (None, LldbError::rpc_failure("AttachToProcessWithId")),
        }
    }

    fn breakpoint_create_by_location(
        &self,
        file: &str,
        line: u32,
    ) -> Option<Arc<dyn RemoteBreakpoint>> {
        self.breakpoint(
            "BreakpointCreateByLocation",
            json!({ "file": file, "line": line }),
        )
    }

    fn breakpoint_create_by_name(&self, symbol_name: &str) -> Option<Arc<dyn RemoteBreakpoint>> {
        self.breakpoint(
            "BreakpointCreateByName",
            json!({ "symbolName": symbol_name }),
        )
    }

    fn breakpoint_create_by_address(&self, address: u64) -> Option<Arc<dyn RemoteBreakpoint>> {
        self.breakpoint("BreakpointCreateByAddress", json!({ "address": address }))
    }

    fn create_function_offset_breakpoint(
        &self,
        symbol_name: &str,
        offset: u32,
    ) -> (Option<Arc<dyn RemoteBreakpoint>>, BreakpointError) {
        let result = self
            .stub
            .call::<FunctionOffsetResult>(
                "CreateFunctionOffsetBreakpoint",
                self.request(json!({ "symbolName": symbol_name, "offset": offset })),
            )
            .unwrap_or_default();
        (self.stub.session().wrap(result.breakpoint), result.error)
    }

    fn breakpoint_delete(&self, breakpoint_id: i32) -> bool {
        self.stub
            .call(
                "BreakpointDelete",
                self.request(json!({ "breakpointId": breakpoint_id })),
            )
            .unwrap_or_default()
    }

    fn find_breakpoint_by_id(&self, _id: i32) -> Result<Option<Arc<dyn RemoteBreakpoint>>, ProxyError> {
        Err(ProxyError::NotImplemented {
            entity: "target",
            operation: "find_breakpoint_by_id",
        })
    }

    fn num_modules(&self) -> u32 {
        self.stub
            .call("GetNumModules", self.request(Value::Null))
            .unwrap_or_default()
    }

    fn module_at_index(&self, index: u32) -> Option<Arc<dyn RemoteModule>> {
        self.module("GetModuleAtIndex", json!({ "index": index }))
    }

    fn watch_address(
        &self,
        address: u64,
        size: u64,
        read: bool,
        write: bool,
    ) -> (Option<Arc<dyn RemoteWatchpoint>>, LldbError) {
        let request = self.request(json!({
            "address": address,
            "size": size,
            "read": read,
            "write": write,
        }));
        match self.stub.call::<WatchResult>("WatchAddress", request) {
            Some(result) => (self.stub.session().wrap(result.watchpoint), result.error),
            None => (None, LldbError::rpc_failure("WatchAddress")),
        }
    }

    fn delete_watchpoint(&self, watch_id: i32) -> bool {
        self.stub
            .call("DeleteWatchpoint", self.request(json!({ "watchId": watch_id })))
            .unwrap_or_default()
    }

    fn resolve_load_address(&self, address: u64) -> Option<Arc<dyn RemoteAddress>> {
        let handle = self
            .stub
            .call::<Option<AddressHandle>>(
                "ResolveLoadAddress",
                self.request(json!({ "address": address })),
            )
            .flatten();
        self.stub.session().wrap(handle)
    }

    fn load_core(&self, core_file: &str) -> Option<Arc<dyn RemoteProcess>> {
        let handle = self
            .stub
            .call::<Option<ProcessHandle>>("LoadCore", self.request(json!({ "corePath": core_file })))
            .flatten();
        self.process(handle)
    }

    fn add_module(&self, path: &str, triple: &str, uuid: &str) -> Option<Arc<dyn RemoteModule>> {
        self.module(
            "AddModule",
            json!({ "path": path, "triple": triple, "uuid": uuid }),
        )
    }

    fn remove_module(&self, module: &dyn RemoteModule) -> bool {
        self.stub
            .call("RemoveModule", self.request(json!({ "module": module.handle() })))
            .unwrap_or_default()
    }

    fn set_module_load_address(
        &self,
        module: &dyn RemoteModule,
        sections_offset: i64,
    ) -> LldbError {
        self.stub
            .call::<Option<LldbError>>(
                "SetModuleLoadAddress",
                self.request(json!({
                    "module": module.handle(),
                    "sectionsOffset": sections_offset,
                })),
            )
            .flatten()
            .unwrap_or_else(|| LldbError::rpc_failure("SetModuleLoadAddress"))
    }

    fn read_instruction_infos(
        &self,
        address: &dyn RemoteAddress,
        count: u32,
        flavor: &str,
    ) -> Vec<InstructionInfo> {
        self.stub
            .call(
                "ReadInstructionInfos",
                self.request(json!({
                    "address": address.handle(),
                    "count": count,
                    "flavor": flavor,
                })),
            )
            .unwrap_or_default()
    }
}
