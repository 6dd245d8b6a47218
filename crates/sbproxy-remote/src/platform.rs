//! The remote platform: connecting to a device and running shell
//! commands on it.
use std::sync::Arc;

use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::LldbError;
use crate::handle::PlatformHandle;
use crate::protocol::{service, ConnectOptions, ShellCommand};
use crate::proxy::{self, Stub};
use crate::session::Session;

pub trait RemotePlatform: Send + Sync {
    fn handle(&self) -> &PlatformHandle;

    fn connect_remote(&self, options: &ConnectOptions) -> LldbError;

    /// Run `command` and return it with its status, signal and output
    /// filled in.
    fn run(&self, command: ShellCommand) -> (LldbError, ShellCommand);
}

/// Create the named platform on the remote debugger.
pub fn create(session: &Session, name: &str) -> Option<Arc<dyn RemotePlatform>> {
    let stub = Stub::new(session, service::PLATFORM);
    let handle = stub
        .call::<Option<PlatformHandle>>("Create", json!({ "platformName": name }))
        .flatten();
    if handle.is_none() {
        tracing::warn!(name, "platform was not created");
    }
    session.wrap(handle)
}

#[derive(Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ConnectRemoteResult {
    error: LldbError,
}

#[derive(Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RunResult {
    error: LldbError,
    output: String,
    signal: i32,
    status: i32,
}

pub struct PlatformProxy {
    stub: Stub,
    handle: PlatformHandle,
}

impl PlatformProxy {
    pub fn new(session: &Session, handle: PlatformHandle) -> Self {
        Self {
            stub: Stub::new(session, service::PLATFORM),
            handle,
        }
    }

    fn request(&self, params: Value) -> Value {
        proxy::request("platform", &self.handle, params)
    }
}

impl RemotePlatform for PlatformProxy {
    fn handle(&self) -> &PlatformHandle {
        &self.handle
    }

    fn connect_remote(&self, options: &ConnectOptions) -> LldbError {
        self.stub
            .call::<ConnectRemoteResult>(
                "ConnectRemote",
                self.request(json!({ "connectOptions": options })),
            )
            .map_or_else(
                || LldbError::rpc_failure_see_logs("ConnectRemote"),
                |result| result.error,
            )
    }

    fn run(&self, mut command: ShellCommand) -> (LldbError, ShellCommand) {
        let Some(result) = self
            .stub
            .call::<RunResult>("Run", self.request(json!({ "shellCommand": &command })))
        else {
            return (LldbError::rpc_failure_see_logs("Run"), command);
        };
        command.output = result.output;
        command.signal = result.signal;
        command.status = result.status;
        (result.error, command)
    }
}
