//! Data watchpoints.
use serde_json::{json, Value};

use crate::handle::WatchpointHandle;
use crate::protocol::service;
use crate::proxy::{self, Stub};
use crate::session::Session;

pub trait RemoteWatchpoint: Send + Sync {
    fn handle(&self) -> &WatchpointHandle;

    /// The debugger-assigned watchpoint id.
    fn id(&self) -> i32 {
        i32::try_from(self.handle().id).unwrap_or(-1)
    }

    fn set_enabled(&self, enabled: bool) -> bool;

    fn set_condition(&self, condition: &str) -> bool;

    fn set_ignore_count(&self, ignore_count: u32) -> bool;

    fn hit_count(&self) -> u32;
}

pub struct WatchpointProxy {
    stub: Stub,
    handle: WatchpointHandle,
}

impl WatchpointProxy {
    pub fn new(session: &Session, handle: WatchpointHandle) -> Self {
        Self {
            stub: Stub::new(session, service::WATCHPOINT),
            handle,
        }
    }

    fn request(&self, params: Value) -> Value {
        proxy::request("watchpoint", &self.handle, params)
    }
}

impl RemoteWatchpoint for WatchpointProxy {
    fn handle(&self) -> &WatchpointHandle {
        &self.handle
    }

    fn set_enabled(&self, enabled: bool) -> bool {
        self.stub
            .call_ok("SetEnabled", self.request(json!({ "enabled": enabled })))
    }

    fn set_condition(&self, condition: &str) -> bool {
        self.stub
            .call_ok("SetCondition", self.request(json!({ "condition": condition })))
    }

    fn set_ignore_count(&self, ignore_count: u32) -> bool {
        self.stub.call_ok(
            "SetIgnoreCount",
            self.request(json!({ "ignoreCount": ignore_count })),
        )
    }

    fn hit_count(&self) -> u32 {
        self.stub
            .call("GetHitCount", self.request(Value::Null))
            .unwrap_or_default()
    }
}
