//! The debugged process.
use std::sync::Arc;

use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::{LldbError, ProxyError};
use crate::handle::{ProcessHandle, TargetHandle, ThreadHandle, UnixSignalsHandle};
use crate::protocol::service;
use crate::proxy::{self, Stub};
use crate::session::Session;
use crate::signals::RemoteUnixSignals;
use crate::target::RemoteTarget;
use crate::thread::RemoteThread;

pub trait RemoteProcess: Send + Sync {
    fn handle(&self) -> &ProcessHandle;

    fn target(&self) -> Option<Arc<dyn RemoteTarget>>;

    fn num_threads(&self) -> u32;

    fn thread_at_index(&self, index: u32) -> Option<Arc<dyn RemoteThread>>;

    fn thread_by_id(&self, id: u64) -> Result<Option<Arc<dyn RemoteThread>>, ProxyError>;

    fn selected_thread(&self) -> Option<Arc<dyn RemoteThread>>;

    fn set_selected_thread_by_id(&self, thread_id: u64) -> bool;

    fn resume(&self) -> bool;

    fn detach(&self, keep_stopped: bool) -> bool;

    fn kill(&self) -> bool;

    fn stop(&self) -> bool;

    fn unique_id(&self) -> Result<u32, ProxyError>;

    fn unix_signals(&self) -> Option<Arc<dyn RemoteUnixSignals>>;

    /// Read into `buffer`, returning the number of bytes read. If the
    /// debugger returns more than fits, the leading bytes are dropped.
    fn read_memory(&self, address: u64, buffer: &mut [u8]) -> (u64, LldbError);

    fn write_memory(&self, address: u64, buffer: &[u8]) -> (u64, LldbError);
}

#[derive(Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ReadMemoryResult {
    memory: Vec<u8>,
    size: u64,
    error: LldbError,
}

#[derive(Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct WriteMemoryResult {
    size: u64,
    error: LldbError,
}

pub struct ProcessProxy {
    stub: Stub,
    handle: ProcessHandle,
}

impl ProcessProxy {
    pub fn new(session: &Session, handle: ProcessHandle) -> Self {
        Self {
            stub: Stub::new(session, service::PROCESS),
            handle,
        }
    }

    fn request(&self, params: Value) -> Value {
        proxy::request("process", &self.handle, params)
    }

    fn flag(&self, method: &str, params: Value) -> bool {
        self.stub
            .call(method, self.request(params))
            .unwrap_or_default()
    }

    fn thread(&self, method: &str, params: Value) -> Option<Arc<dyn RemoteThread>> {
        let handle = self
            .stub
            .call::<Option<ThreadHandle>>(method, self.request(params))
            .flatten();
        self.stub.session().wrap(handle)
    }
}

impl RemoteProcess for ProcessProxy {
    fn handle(&self) -> &ProcessHandle {
        &self.handle
    }

    fn target(&self) -> Option<Arc<dyn RemoteTarget>> {
        let handle = self
            .stub
            .call::<Option<TargetHandle>>("GetTarget", self.request(Value::Null))
            .flatten();
        self.stub.session().wrap(handle)
    }

    fn num_threads(&self) -> u32 {
        self.stub
            .call("GetNumThreads", self.request(Value::Null))
            .unwrap_or_default()
    }

    fn thread_at_index(&self, index: u32) -> Option<Arc<dyn RemoteThread>> {
        self.thread("GetThreadAtIndex", json!({ "index": index }))
    }

    fn thread_by_id(&self, _id: u64) -> Result<Option<Arc<dyn RemoteThread>>, ProxyError> {
        Err(ProxyError::NotImplemented {
            entity: "process",
            operation: "thread_by_id",
        })
    }

    fn selected_thread(&self) -> Option<Arc<dyn RemoteThread>> {
        self.thread("GetSelectedThread", Value::Null)
    }

    fn set_selected_thread_by_id(&self, thread_id: u64) -> bool {
        self.flag(
            "SetSelectedThreadById",
            json!({ "threadId": thread_id }),
        )
    }

    fn resume(&self) -> bool {
        self.flag("Continue", Value::Null)
    }

    fn detach(&self, keep_stopped: bool) -> bool {
        self.flag("Detach", json!({ "keepStopped": keep_stopped }))
    }

    fn kill(&self) -> bool {
        self.flag("Kill", Value::Null)
    }

    fn stop(&self) -> bool {
        self.flag("Stop", Value::Null)
    }

    fn unique_id(&self) -> Result<u32, ProxyError> {
        Err(ProxyError::NotImplemented {
            entity: "process",
            operation: "unique_id",
        })
    }

    fn unix_signals(&self) -> Option<Arc<dyn RemoteUnixSignals>> {
        let handle = self
            .stub
            .call::<Option<UnixSignalsHandle>>("GetUnixSignals", self.request(Value::Null))
            .flatten();
        self.stub.session().wrap(handle)
    }

    fn read_memory(&self, address: u64, buffer: &mut [u8]) -> (u64, LldbError) {
        let Some(result) = self.stub.call::<ReadMemoryResult>(
            "ReadMemory",
            self.request(json!({ "address": address, "size": buffer.len() })),
        ) else {
            return (0, LldbError::rpc_failure("ReadMemory"));
        };
        let memory = &result.memory;
        let skip = memory.len().saturating_sub(buffer.len());
        if skip > 0 {
            tracing::warn!(
                returned = memory.len(),
                capacity = buffer.len(),
                "read memory buffer too small, dropping leading bytes"
            );
        }
        let copied = &memory[skip..];
        buffer[..copied.len()].copy_from_slice(copied);
        (result.size, result.error)
    }

    fn write_memory(&self, address: u64, buffer: &[u8]) -> (u64, LldbError) {
        self.stub
            .call::<WriteMemoryResult>(
                "WriteMemory",
                self.request(json!({
                    "address": address,
                    "buffer": buffer,
                    "size": buffer.len(),
                })),
            )
            .map_or_else(
                || (0, LldbError::rpc_failure("WriteMemory")),
                |result| (result.size, result.error),
            )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::fake_session;

    fn process(session: &Session) -> Arc<dyn RemoteProcess> {
        session.wrap(Some(ProcessHandle::new(1))).unwrap()
    }

    #[test]
    fn read_memory_copies_into_buffer() {
        let (fake, session) = fake_session();
        fake.respond(
            "ReadMemory",
            json!({ "memory": [1, 2, 3], "size": 3, "error": { "success": true } }),
        );
        let mut buffer = [0u8; 4];
        let (read, error) = process(&session).read_memory(0x1000, &mut buffer);
        assert_eq!(read, 3);
        assert!(error.is_success());
        assert_eq!(buffer, [1, 2, 3, 0]);
        let request = &fake.calls_to("ReadMemory")[0];
        assert_eq!(request["address"], json!(0x1000));
        assert_eq!(request["size"], json!(4));
    }

    #[test]
    fn oversized_read_keeps_trailing_bytes() {
        let (fake, session) = fake_session();
        fake.respond("ReadMemory", json!({ "memory": [1, 2, 3, 4], "size": 4 }));
        let mut buffer = [0u8; 2];
        process(&session).read_memory(0, &mut buffer);
        assert_eq!(buffer, [3, 4]);
    }

    #[test]
    fn memory_calls_report_rpc_failure() {
        let (_fake, session) = fake_session();
        let p = process(&session);
        let mut buffer = [0u8; 2];
        let (read, error) = p.read_memory(0, &mut buffer);
        assert_eq!(read, 0);
        assert_eq!(error.message, "Rpc error while calling ReadMemory.");
        let (written, error) = p.write_memory(0, &[9]);
        assert_eq!(written, 0);
        assert_eq!(error.message, "Rpc error while calling WriteMemory.");
    }

    #[test]
    fn write_memory_sends_buffer() {
        let (fake, session) = fake_session();
        fake.respond("WriteMemory", json!({ "size": 2, "error": { "success": true } }));
        let (written, error) = process(&session).write_memory(0x20, &[7, 8]);
        assert_eq!(written, 2);
        assert!(error.is_success());
        assert_eq!(fake.calls_to("WriteMemory")[0]["buffer"], json!([7, 8]));
    }

    #[test]
    fn control_calls_and_threads() {
        let (fake, session) = fake_session();
        fake.respond("Continue", json!(true));
        fake.respond("Detach", json!(true));
        fake.respond("GetThreadAtIndex", json!({ "id": 12 }));
        fake.respond("GetSelectedThread", json!({ "id": 0 }));
        let p = process(&session);
        assert!(p.resume());
        assert!(p.detach(false));
        assert!(!p.kill());
        assert_eq!(p.thread_at_index(0).map(|t| t.handle().id), Some(12));
        assert!(p.selected_thread().is_none());
        assert_eq!(fake.calls_to("Detach")[0]["keepStopped"], json!(false));
    }

    #[test]
    fn unsupported_operations_are_errors() {
        let (fake, session) = fake_session();
        let p = process(&session);
        assert!(matches!(
            p.thread_by_id(3),
            Err(ProxyError::NotImplemented { operation: "thread_by_id", .. })
        ));
        assert!(p.unique_id().is_err());
        assert!(fake.calls().is_empty());
    }
}
