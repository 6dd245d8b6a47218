//! Breakpoints and their resolved locations.
use std::sync::Arc;

use serde_json::{json, Value};

use crate::error::ProxyError;
use crate::handle::{AddressHandle, BreakpointHandle, BreakpointLocationHandle};
use crate::protocol::service;
use crate::proxy::{self, Stub};
use crate::session::Session;
use crate::symbol::RemoteAddress;

/// A breakpoint. Mutators return whether the call reached the debugger.
pub trait RemoteBreakpoint: Send + Sync {
    fn handle(&self) -> &BreakpointHandle;

    fn id(&self) -> i32 {
        self.handle().id
    }

    fn delete(&self) -> bool;

    fn set_enabled(&self, enabled: bool) -> bool;

    fn num_locations(&self) -> u32;

    fn location_at_index(&self, index: u32) -> Option<Arc<dyn RemoteBreakpointLocation>>;

    fn find_location_by_id(
        &self,
        id: i32,
    ) -> Result<Option<Arc<dyn RemoteBreakpointLocation>>, ProxyError>;

    fn hit_count(&self) -> u32;

    fn set_ignore_count(&self, ignore_count: u32) -> bool;

    fn set_one_shot(&self, one_shot: bool) -> bool;

    fn set_condition(&self, condition: &str) -> bool;

    fn set_command_line_commands(&self, commands: &[String]) -> bool;
}

pub struct BreakpointProxy {
    stub: Stub,
    handle: BreakpointHandle,
}

impl BreakpointProxy {
    pub fn new(session: &Session, handle: BreakpointHandle) -> Self {
        Self {
            stub: Stub::new(session, service::BREAKPOINT),
            handle,
        }
    }

    fn request(&self, params: Value) -> Value {
        proxy::request("breakpoint", &self.handle, params)
    }
}

impl RemoteBreakpoint for BreakpointProxy {
    fn handle(&self) -> &BreakpointHandle {
        &self.handle
    }

    fn delete(&self) -> bool {
        self.stub.call_ok("Delete", self.request(Value::Null))
    }

    fn set_enabled(&self, enabled: bool) -> bool {
        self.stub
            .call_ok("SetEnabled", self.request(json!({ "enabled": enabled })))
    }

    fn num_locations(&self) -> u32 {
        self.stub
            .call("GetNumLocations", self.request(Value::Null))
            .unwrap_or_default()
    }

    fn location_at_index(&self, index: u32) -> Option<Arc<dyn RemoteBreakpointLocation>> {
        let handle = self
            .stub
            .call::<Option<BreakpointLocationHandle>>(
                "GetLocationAtIndex",
                self.request(json!({ "index": index })),
            )
            .flatten();
        self.stub.session().wrap(handle)
    }

    fn find_location_by_id(
        &self,
        _id: i32,
    ) -> Result<Option<Arc<dyn RemoteBreakpointLocation>>, ProxyError> {
        Err(ProxyError::NotImplemented {
            entity: "breakpoint",
            operation: "find_location_by_id",
        })
    }

    fn hit_count(&self) -> u32 {
        self.stub
            .call("GetHitCount", self.request(Value::Null))
            .unwrap_or_default()
    }

    fn set_ignore_count(&self, ignore_count: u32) -> bool {
        self.stub.call_ok(
            "SetIgnoreCount",
            self.request(json!({ "ignoreCount": ignore_count })),
        )
    }

    fn set_one_shot(&self, one_shot: bool) -> bool {
        self.stub
            .call_ok("SetOneShot", self.request(json!({ "isOneShot": one_shot })))
    }

    fn set_condition(&self, condition: &str) -> bool {
        self.stub
            .call_ok("SetCondition", self.request(json!({ "condition": condition })))
    }

    fn set_command_line_commands(&self, commands: &[String]) -> bool {
        self.stub.call_ok(
            "SetCommandLineCommands",
            self.request(json!({ "commands": commands })),
        )
    }
}

/// One address a breakpoint resolved to.
pub trait RemoteBreakpointLocation: Send + Sync {
    fn handle(&self) -> &BreakpointLocationHandle;

    fn id(&self) -> i32 {
        self.handle().id
    }

    fn address(&self) -> Option<Arc<dyn RemoteAddress>>;

    fn load_address(&self) -> u64;

    fn set_enabled(&self, enabled: bool) -> bool;

    fn hit_count(&self) -> u32;

    fn set_ignore_count(&self, ignore_count: u32) -> bool;

    fn set_condition(&self, condition: &str) -> bool;

    fn breakpoint(&self) -> Option<Arc<dyn RemoteBreakpoint>>;
}

pub struct BreakpointLocationProxy {
    stub: Stub,
    handle: BreakpointLocationHandle,
}

impl BreakpointLocationProxy {
    pub fn new(session: &Session, handle: BreakpointLocationHandle) -> Self {
        Self {
            stub: Stub::new(session, service::BREAKPOINT_LOCATION),
            handle,
        }
    }

    fn request(&self, params: Value) -> Value {
        proxy::request("breakpointLocation", &self.handle, params)
    }
}

impl RemoteBreakpointLocation for BreakpointLocationProxy {
    fn handle(&self) -> &BreakpointLocationHandle {
        &self.handle
    }

    fn address(&self) -> Option<Arc<dyn RemoteAddress>> {
        let handle = self
            .stub
            .call::<Option<AddressHandle>>("GetAddress", self.request(Value::Null))
            .flatten();
        self.stub.session().wrap(handle)
    }

    fn load_address(&self) -> u64 {
        self.stub
            .call("GetLoadAddress", self.request(Value::Null))
            .unwrap_or_default()
    }

    fn set_enabled(&self, enabled: bool) -> bool {
        self.stub
            .call_ok("SetEnabled", self.request(json!({ "enabled": enabled })))
    }

    fn hit_count(&self) -> u32 {
        self.stub
            .call("GetHitCount", self.request(Value::Null))
            .unwrap_or_default()
    }

    fn set_ignore_count(&self, ignore_count: u32) -> bool {
        self.stub.call_ok(
            "SetIgnoreCount",
            self.request(json!({ "ignoreCount": ignore_count })),
        )
    }

    fn set_condition(&self, condition: &str) -> bool {
        self.stub
            .call_ok("SetCondition", self.request(json!({ "condition": condition })))
    }

    fn breakpoint(&self) -> Option<Arc<dyn RemoteBreakpoint>> {
        let handle = self
            .stub
            .call::<Option<BreakpointHandle>>("GetBreakpoint", self.request(Value::Null))
            .flatten();
        self.stub.session().wrap(handle)
    }
}
