//! Typed handles for every remote entity.
//!
//! Some handles carry fields the server fills in when it hands the
//! handle out (a value's name, a frame's function name), so reading
//! them costs no call.
use sbproxy_rpc::{BulkDeletable, Connection, RemoteHandle};
use serde::{Deserialize, Serialize};

use crate::error::LldbError;
use crate::protocol::{service, LineEntry};

macro_rules! id_handle {
    ($(#[$meta:meta])* $name:ident, $kind:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name {
            pub id: u64,
        }

        impl $name {
            pub fn new(id: u64) -> Self {
                Self { id }
            }
        }

        impl RemoteHandle for $name {
            const KIND: &'static str = $kind;

            fn id(&self) -> u64 {
                self.id
            }
        }
    };
}

id_handle!(ThreadHandle, "thread");
id_handle!(ProcessHandle, "process");
id_handle!(TargetHandle, "target");
id_handle!(ModuleHandle, "module");
id_handle!(SectionHandle, "section");
id_handle!(TypeMemberHandle, "type_member");
id_handle!(SymbolHandle, "symbol");
id_handle!(AddressHandle, "address");
id_handle!(FunctionHandle, "function");
id_handle!(UnixSignalsHandle, "unix_signals");
id_handle!(WatchpointHandle, "watchpoint");
id_handle!(CommandInterpreterHandle, "command_interpreter");
id_handle!(ReturnObjectHandle, "return_object");
id_handle!(PlatformHandle, "platform");
id_handle!(ListenerHandle, "listener");
id_handle!(DebuggerHandle, "debugger");

/// A value, with its name and error captured at creation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ValueHandle {
    pub id: u64,
    pub name: String,
    pub error: Option<LldbError>,
}

impl ValueHandle {
    pub fn new(id: u64) -> Self {
        Self {
            id,
            ..Self::default()
        }
    }
}

impl RemoteHandle for ValueHandle {
    const KIND: &'static str = "value";

    fn id(&self) -> u64 {
        self.id
    }
}

/// A stack frame with the fields the call stack window always shows.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FrameHandle {
    pub id: u64,
    pub function_name: String,
    pub function_name_with_signature: String,
    pub program_counter: u64,
    pub line_entry: Option<LineEntry>,
}

impl FrameHandle {
    pub fn new(id: u64) -> Self {
        Self {
            id,
            ..Self::default()
        }
    }
}

impl RemoteHandle for FrameHandle {
    const KIND: &'static str = "frame";

    fn id(&self) -> u64 {
        self.id
    }
}

/// A type with its flags, name and base-class count.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TypeHandle {
    pub id: u64,
    pub name: String,
    pub flags: u32,
    pub number_of_direct_base_classes: u32,
}

impl TypeHandle {
    pub fn new(id: u64) -> Self {
        Self {
            id,
            ..Self::default()
        }
    }
}

impl RemoteHandle for TypeHandle {
    const KIND: &'static str = "type";

    fn id(&self) -> u64 {
        self.id
    }
}

/// A breakpoint, named by its debugger-assigned id within a target.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BreakpointHandle {
    pub target: TargetHandle,
    pub id: i32,
}

impl RemoteHandle for BreakpointHandle {
    const KIND: &'static str = "breakpoint";

    fn id(&self) -> u64 {
        u64::try_from(self.id).unwrap_or(0)
    }
}

/// A location of a breakpoint, named by its id within the breakpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BreakpointLocationHandle {
    pub breakpoint: BreakpointHandle,
    pub id: i32,
}

impl RemoteHandle for BreakpointLocationHandle {
    const KIND: &'static str = "breakpoint_location";

    fn id(&self) -> u64 {
        u64::try_from(self.id).unwrap_or(0)
    }
}

/// Body of a bulk delete call. Only the field of the handle type being
/// released is set.
#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkDeleteRequest {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<ValueHandle>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub frames: Vec<FrameHandle>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub threads: Vec<ThreadHandle>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub types: Vec<TypeHandle>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub modules: Vec<ModuleHandle>,
}

fn send_bulk_delete(connection: &Connection, service: &'static str, request: BulkDeleteRequest) {
    let client = connection.client(service);
    let body = match serde_json::to_value(&request) {
        Ok(body) => body,
        Err(e) => {
            tracing::error!(service, "failed to encode bulk delete: {e}");
            return;
        }
    };
    connection.invoke_background_rpc(&client.full_method("BulkDelete"), |opts| {
        client.call::<()>("BulkDelete", &body, opts)
    });
}

impl BulkDeletable for ValueHandle {
    fn bulk_delete(connection: &Connection, handles: Vec<Self>) {
        let request = BulkDeleteRequest {
            values: handles,
            ..BulkDeleteRequest::default()
        };
        send_bulk_delete(connection, service::VALUE, request);
    }
}

impl BulkDeletable for FrameHandle {
    fn bulk_delete(connection: &Connection, handles: Vec<Self>) {
        let request = BulkDeleteRequest {
            frames: handles,
            ..BulkDeleteRequest::default()
        };
        send_bulk_delete(connection, service::FRAME, request);
    }
}

impl BulkDeletable for ThreadHandle {
    fn bulk_delete(connection: &Connection, handles: Vec<Self>) {
        let request = BulkDeleteRequest {
            threads: handles,
            ..BulkDeleteRequest::default()
        };
        send_bulk_delete(connection, service::THREAD, request);
    }
}

impl BulkDeletable for TypeHandle {
    fn bulk_delete(connection: &Connection, handles: Vec<Self>) {
        let request = BulkDeleteRequest {
            types: handles,
            ..BulkDeleteRequest::default()
        };
        send_bulk_delete(connection, service::TYPE, request);
    }
}

impl BulkDeletable for ModuleHandle {
    fn bulk_delete(connection: &Connection, handles: Vec<Self>) {
        let request = BulkDeleteRequest {
            modules: handles,
            ..BulkDeleteRequest::default()
        };
        send_bulk_delete(connection, service::MODULE, request);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sbproxy_config::ConnectionConfig;
    use sbproxy_rpc::testing::FakeInvoker;
    use serde_json::json;

    #[test]
    fn zero_ids_are_null() {
        assert!(ValueHandle::new(0).is_null());
        assert!(!ThreadHandle::new(3).is_null());
        assert!(BreakpointHandle::default().is_null());
        let negative = BreakpointHandle {
            target: TargetHandle::new(1),
            id: -1,
        };
        assert!(negative.is_null());
    }

    #[test]
    fn value_handle_decodes_prefetched_fields() {
        let handle: ValueHandle = serde_json::from_value(json!({
            "id": 42,
            "name": "argc",
            "error": { "success": true }
        }))
        .unwrap();
        assert_eq!(handle.id, 42);
        assert_eq!(handle.name, "argc");
        assert!(handle.error.is_some_and(|e| e.success));
    }

    #[test]
    fn bulk_delete_sends_only_the_matching_field() {
        let fake = FakeInvoker::new();
        let config = ConnectionConfig {
            bulk_delete_batch_size: 2,
            ..ConnectionConfig::default()
        };
        let conn = Connection::new(fake.clone(), &config);
        conn.queue_for_deletion(ThreadHandle::new(1));
        conn.queue_for_deletion(ThreadHandle::new(2));

        let calls = fake.calls_to("RemoteThreadRpcService/BulkDelete");
        assert_eq!(calls, vec![json!({ "threads": [{ "id": 1 }, { "id": 2 }] })]);
    }
}
