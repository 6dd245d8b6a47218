//! Threads of the debugged process.
use std::sync::Arc;

use async_trait::async_trait;
use sbproxy_rpc::OwnedHandle;
use serde_json::{json, Value};

use crate::error::LldbError;
use crate::frame::RemoteFrame;
use crate::handle::{FrameHandle, ProcessHandle, ThreadHandle};
use crate::module::RemoteModule;
use crate::process::RemoteProcess;
use crate::protocol::{service, FrameInfo, FrameInfoFlags, FrameWithInfo, StopReason};
use crate::proxy::{self, Stub};
use crate::session::Session;

/// A frame with the description the call stack window asked for.
pub struct FrameInfoPair {
    pub frame: Arc<dyn RemoteFrame>,
    pub info: Option<FrameInfo<Arc<dyn RemoteModule>>>,
}

#[async_trait]
pub trait RemoteThread: Send + Sync {
    fn handle(&self) -> &ThreadHandle;

    fn process(&self) -> Option<Arc<dyn RemoteProcess>>;

    fn name(&self) -> String;

    fn thread_id(&self) -> u64;

    fn status(&self) -> String;

    /// The step calls return whether the request reached the debugger.
    fn step_into(&self) -> bool;

    fn step_over(&self) -> bool;

    fn step_out(&self) -> bool;

    fn step_instruction(&self, step_over: bool) -> bool;

    fn stop_reason(&self) -> StopReason;

    fn stop_reason_data_count(&self) -> u32;

    fn stop_reason_data_at_index(&self, index: u32) -> u64;

    fn num_frames(&self) -> u32;

    fn frame_at_index(&self, index: u32) -> Option<Arc<dyn RemoteFrame>>;

    fn jump_to_line(&self, file_path: &str, line: u32) -> LldbError;

    /// Up to `max_count` frames from `start_index`, each with the
    /// `fields` of its description. `None` when the call fails.
    fn frames_with_info(
        &self,
        fields: FrameInfoFlags,
        start_index: u32,
        max_count: u32,
    ) -> Option<Vec<FrameInfoPair>>;

    async fn frames_with_info_async(
        &self,
        fields: FrameInfoFlags,
        start_index: u32,
        max_count: u32,
    ) -> Option<Vec<FrameInfoPair>>;
}

pub struct ThreadProxy {
    stub: Stub,
    handle: OwnedHandle<ThreadHandle>,
}

impl ThreadProxy {
    pub fn new(session: &Session, handle: ThreadHandle) -> Self {
        Self {
            stub: Stub::new(session, service::THREAD),
            handle: OwnedHandle::new(session.connection().clone(), handle),
        }
    }

    fn request(&self, params: Value) -> Value {
        proxy::request("thread", self.handle.get(), params)
    }

    fn frames_request(&self, fields: FrameInfoFlags, start_index: u32, max_count: u32) -> Value {
        self.request(json!({
            "fields": fields,
            "startIndex": start_index,
            "maxCount": max_count,
        }))
    }

    fn pair_frames(&self, frames: Vec<FrameWithInfo>) -> Vec<FrameInfoPair> {
        let session = self.stub.session();
        frames
            .into_iter()
            .filter_map(|entry| {
                let frame = session.wrap(Some(entry.frame))?;
                let info = entry.info.map(|info| info.map_module(|m| session.wrap(Some(m))));
                Some(FrameInfoPair { frame, info })
            })
            .collect()
    }
}

#[async_trait]
impl RemoteThread for ThreadProxy {
    fn handle(&self) -> &ThreadHandle {
        self.handle.get()
    }

    fn process(&self) -> Option<Arc<dyn RemoteProcess>> {
        let handle = self
            .stub
            .call::<Option<ProcessHandle>>("GetProcess", self.request(Value::Null))
            .flatten();
        self.stub.session().wrap(handle)
    }

    fn name(&self) -> String {
        self.stub
            .call("GetName", self.request(Value::Null))
            .unwrap_or_default()
    }

    fn thread_id(&self) -> u64 {
        self.stub
            .call("GetThreadId", self.request(Value::Null))
            .unwrap_or_default()
    }

    fn status(&self) -> String {
        self.stub
            .call("GetStatus", self.request(Value::Null))
            .unwrap_or_default()
    }

    fn step_into(&self) -> bool {
        self.stub.call_ok("StepInto", self.request(Value::Null))
    }

    fn step_over(&self) -> bool {
        self.stub.call_ok("StepOver", self.request(Value::Null))
    }

    fn step_out(&self) -> bool {
        self.stub.call_ok("StepOut", self.request(Value::Null))
    }

    fn step_instruction(&self, step_over: bool) -> bool {
        self.stub.call_ok(
            "StepInstruction",
            self.request(json!({ "stepOver": step_over })),
        )
    }

    fn stop_reason(&self) -> StopReason {
        self.stub
            .call("GetStopReason", self.request(Value::Null))
            .unwrap_or_default()
    }

    fn stop_reason_data_count(&self) -> u32 {
        self.stub
            .call("GetStopReasonDataCount", self.request(Value::Null))
            .unwrap_or_default()
    }

    fn stop_reason_data_at_index(&self, index: u32) -> u64 {
        self.stub
            .call(
                "GetStopReasonDataAtIndex",
                self.request(json!({ "index": index })),
            )
            .unwrap_or_default()
    }

    fn num_frames(&self) -> u32 {
        self.stub
            .call("GetNumFrames", self.request(Value::Null))
            .unwrap_or_default()
    }

    fn frame_at_index(&self, index: u32) -> Option<Arc<dyn RemoteFrame>> {
        let handle = self
            .stub
            .call::<Option<FrameHandle>>("GetFrameAtIndex", self.request(json!({ "index": index })))
            .flatten();
        self.stub.session().wrap(handle)
    }

    fn jump_to_line(&self, file_path: &str, line: u32) -> LldbError {
        self.stub
            .call::<Option<LldbError>>(
                "JumpToLine",
                self.request(json!({ "filePath": file_path, "line": line })),
            )
            .flatten()
            .unwrap_or_else(|| LldbError::rpc_failure("JumpToLine"))
    }

    fn frames_with_info(
        &self,
        fields: FrameInfoFlags,
        start_index: u32,
        max_count: u32,
    ) -> Option<Vec<FrameInfoPair>> {
        let frames = self.stub.call::<Vec<FrameWithInfo>>(
            "GetFramesWithInfo",
            self.frames_request(fields, start_index, max_count),
        )?;
        Some(self.pair_frames(frames))
    }

    async fn frames_with_info_async(
        &self,
        fields: FrameInfoFlags,
        start_index: u32,
        max_count: u32,
    ) -> Option<Vec<FrameInfoPair>> {
        let frames = self
            .stub
            .call_async::<Vec<FrameWithInfo>>(
                "GetFramesWithInfo",
                self.frames_request(fields, start_index, max_count),
            )
            .await?;
        Some(self.pair_frames(frames))
    }
}
