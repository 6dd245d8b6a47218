//! The remote debugger object: session bootstrap and global settings.
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};

use crate::command::RemoteCommandInterpreter;
use crate::handle::{CommandInterpreterHandle, DebuggerHandle, PlatformHandle, TargetHandle};
use crate::platform::RemotePlatform;
use crate::protocol::service;
use crate::proxy::{self, Stub};
use crate::session::Session;
use crate::target::RemoteTarget;

/// Settings applied to every new debugger by
/// [`RemoteDebugger::apply_default_settings`].
pub const DEFAULT_SETTINGS: &[&str] = &[
    // Fix-its can change what an expression calls.
    "settings set target.auto-apply-fixits false",
    "settings set target.process.memory-cache-line-size 4096",
    "settings set target.experimental.infer-class-templates true",
    "settings set plugin.process.gdb-remote.packet-timeout 5",
];

pub const FAST_EXPRESSION_EVALUATION: &str =
    "settings set target.experimental.inject-local-vars false";

/// Create the remote debugger. This is the session's bootstrap call:
/// it is made under `deadline` and, with `wait_for_ready`, retried
/// while the remote end is still starting.
pub fn create(
    session: &Session,
    source_init_files: bool,
    deadline: Duration,
    wait_for_ready: bool,
) -> Option<Arc<dyn RemoteDebugger>> {
    let connection = session.connection();
    let client = connection.client(service::DEBUGGER);
    let request = json!({ "sourceInitFiles": source_init_files });
    let handle = connection
        .invoke_bootstrap_rpc(
            &client.full_method("Create"),
            deadline,
            wait_for_ready,
            |options| client.call::<Option<DebuggerHandle>>("Create", &request, options),
        )
        .flatten();
    match handle {
        Some(handle) => {
            tracing::info!(id = handle.id, "remote debugger created");
            session.wrap(Some(handle))
        }
        None => {
            tracing::error!("failed to create remote debugger");
            None
        }
    }
}

pub trait RemoteDebugger: Send + Sync {
    fn handle(&self) -> &DebuggerHandle;

    fn set_async(&self, async_mode: bool) -> bool;

    fn skip_lldb_init_files(&self, skip: bool) -> bool;

    fn command_interpreter(&self) -> Option<Arc<dyn RemoteCommandInterpreter>>;

    fn create_target(&self, filename: &str) -> Option<Arc<dyn RemoteTarget>>;

    fn set_selected_platform(&self, platform: &dyn RemotePlatform) -> bool;

    fn selected_platform(&self) -> Option<Arc<dyn RemotePlatform>>;

    fn enable_log(&self, channel: &str, categories: &[String]) -> bool;

    fn is_platform_available(&self, platform_name: &str) -> bool;

    /// Targets are released with the remote process, so this only
    /// reports success.
    fn delete_target(&self, _target: &dyn RemoteTarget) -> bool {
        true
    }

    /// Run each of [`DEFAULT_SETTINGS`] through the command
    /// interpreter. Returns false when there is no interpreter.
    fn apply_default_settings(&self) -> bool {
        let Some(interpreter) = self.command_interpreter() else {
            tracing::warn!("no command interpreter, default settings not applied");
            return false;
        };
        for command in DEFAULT_SETTINGS {
            interpreter.handle_and_log_command(command);
        }
        true
    }

    fn enable_fast_expression_evaluation(&self) -> bool {
        let Some(interpreter) = self.command_interpreter() else {
            return false;
        };
        interpreter.handle_and_log_command(FAST_EXPRESSION_EVALUATION);
        true
    }

    fn set_library_search_path(&self, path: &str) -> bool {
        let Some(interpreter) = self.command_interpreter() else {
            return false;
        };
        interpreter
            .handle_and_log_command(&format!("settings append target.exec-search-paths \"{path}\""));
        true
    }
}

pub struct DebuggerProxy {
    stub: Stub,
    handle: DebuggerHandle,
}

impl DebuggerProxy {
    pub fn new(session: &Session, handle: DebuggerHandle) -> Self {
        Self {
            stub: Stub::new(session, service::DEBUGGER),
            handle,
        }
    }

    fn request(&self, params: Value) -> Value {
        proxy::request("debugger", &self.handle, params)
    }

    fn flag(&self, method: &str, params: Value) -> bool {
        self.stub
            .call(method, self.request(params))
            .unwrap_or_default()
    }
}

impl RemoteDebugger for DebuggerProxy {
    fn handle(&self) -> &DebuggerHandle {
        &self.handle
    }

    fn set_async(&self, async_mode: bool) -> bool {
        self.stub
            .call_ok("SetAsync", self.request(json!({ "async": async_mode })))
    }

    fn skip_lldb_init_files(&self, skip: bool) -> bool {
        self.stub
            .call_ok("SkipLLDBInitFiles", self.request(json!({ "skip": skip })))
    }

    fn command_interpreter(&self) -> Option<Arc<dyn RemoteCommandInterpreter>> {
        let handle = self
            .stub
            .call::<Option<CommandInterpreterHandle>>(
                "GetCommandInterpreter",
                self.request(Value::Null),
            )
            .flatten();
        self.stub.session().wrap(handle)
    }

    fn create_target(&self, filename: &str) -> Option<Arc<dyn RemoteTarget>> {
        let handle = self
            .stub
            .call::<Option<TargetHandle>>(
                "CreateTarget",
                self.request(json!({ "filename": filename })),
            )
            .flatten();
        self.stub.session().wrap(handle)
    }

    fn set_selected_platform(&self, platform: &dyn RemotePlatform) -> bool {
        self.stub.call_ok(
            "SetSelectedPlatform",
            self.request(json!({ "platform": platform.handle() })),
        )
    }

    fn selected_platform(&self) -> Option<Arc<dyn RemotePlatform>> {
        let handle = self
            .stub
            .call::<Option<PlatformHandle>>("GetSelectedPlatform", self.request(Value::Null))
            .flatten();
        self.stub.session().wrap(handle)
    }

    fn enable_log(&self, channel: &str, categories: &[String]) -> bool {
        self.flag(
            "EnableLog",
            json!({ "channel": channel, "types": categories }),
        )
    }

    fn is_platform_available(&self, platform_name: &str) -> bool {
        self.flag(
            "IsPlatformAvailable",
            json!({ "platformName": platform_name }),
        )
    }
}
