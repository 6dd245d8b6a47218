//! Command interpreter and command results.
//!
//! Both proxies release their remote object with a direct `Delete`
//! call when dropped.
use std::sync::Arc;

use serde::Deserialize;
use serde_json::{json, Value};

use crate::handle::{CommandInterpreterHandle, ReturnObjectHandle};
use crate::protocol::{service, ReturnStatus};
use crate::proxy::{self, Stub};
use crate::session::Session;

pub trait RemoteCommandInterpreter: Send + Sync {
    fn handle(&self) -> &CommandInterpreterHandle;

    /// Run one command line. The status is
    /// [`ReturnStatus::Invalid`] and there is no result when the call
    /// fails or the debugger returns no result object.
    fn handle_command(
        &self,
        command: &str,
    ) -> (ReturnStatus, Option<Arc<dyn RemoteCommandReturnObject>>);

    fn source_init_file_in_home_directory(&self) -> bool;

    /// Run `command` and log its outcome.
    fn handle_and_log_command(&self, command: &str) {
        let (_, result) = self.handle_command(command);
        match result {
            Some(result) => tracing::info!(
                command,
                description = %result.description(),
                error = %result.error(),
                output = %result.output(),
                "executed lldb command"
            ),
            None => tracing::warn!(command, "lldb command failed to return a result"),
        }
    }
}

#[derive(Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct HandleCommandResult {
    return_status: ReturnStatus,
    return_object: Option<ReturnObjectHandle>,
}

pub struct CommandInterpreterProxy {
    stub: Stub,
    handle: CommandInterpreterHandle,
}

impl CommandInterpreterProxy {
    pub fn new(session: &Session, handle: CommandInterpreterHandle) -> Self {
        Self {
            stub: Stub::new(session, service::COMMAND_INTERPRETER),
            handle,
        }
    }

    fn request(&self, params: Value) -> Value {
        proxy::request("interpreter", &self.handle, params)
    }
}

impl RemoteCommandInterpreter for CommandInterpreterProxy {
    fn handle(&self) -> &CommandInterpreterHandle {
        &self.handle
    }

    fn handle_command(
        &self,
        command: &str,
    ) -> (ReturnStatus, Option<Arc<dyn RemoteCommandReturnObject>>) {
        let response = self
            .stub
            .call::<HandleCommandResult>(
                "HandleCommand",
                self.request(json!({ "command": command })),
            )
            .unwrap_or_default();
        match self.stub.session().wrap(response.return_object) {
            Some(result) => (response.return_status, Some(result)),
            None => (ReturnStatus::Invalid, None),
        }
    }

    fn source_init_file_in_home_directory(&self) -> bool {
        self.stub
            .call_ok("SourceInitFileInHomeDirectory", self.request(Value::Null))
    }
}

impl Drop for CommandInterpreterProxy {
    fn drop(&mut self) {
        self.stub.call_background_ok("Delete", self.request(Value::Null));
    }
}

/// Output of one interpreted command.
pub trait RemoteCommandReturnObject: Send + Sync {
    fn handle(&self) -> &ReturnObjectHandle;

    fn succeeded(&self) -> bool;

    fn output(&self) -> String;

    fn error(&self) -> String;

    fn description(&self) -> String;
}

pub struct ReturnObjectProxy {
    stub: Stub,
    handle: ReturnObjectHandle,
}

impl ReturnObjectProxy {
    pub fn new(session: &Session, handle: ReturnObjectHandle) -> Self {
        Self {
            stub: Stub::new(session, service::RETURN_OBJECT),
            handle,
        }
    }

    fn request(&self) -> Value {
        proxy::request("returnObject", &self.handle, Value::Null)
    }

    fn text(&self, method: &str) -> String {
        self.stub.call(method, self.request()).unwrap_or_default()
    }
}

impl RemoteCommandReturnObject for ReturnObjectProxy {
    fn handle(&self) -> &ReturnObjectHandle {
        &self.handle
    }

    fn succeeded(&self) -> bool {
        self.stub
            .call("Succeeded", self.request())
            .unwrap_or_default()
    }

    fn output(&self) -> String {
        self.text("GetOutput")
    }

    fn error(&self) -> String {
        self.text("GetError")
    }

    fn description(&self) -> String {
        self.text("GetDescription")
    }
}

impl Drop for ReturnObjectProxy {
    fn drop(&mut self) {
        self.stub.call_background_ok("Delete", self.request());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::fake_session;

    fn interpreter(session: &Session) -> Arc<dyn RemoteCommandInterpreter> {
        session
            .wrap(Some(CommandInterpreterHandle::new(1)))
            .unwrap()
    }

    #[test]
    fn handle_command_wraps_result() {
        let (fake, session) = fake_session();
        fake.respond(
            "HandleCommand",
            json!({ "returnStatus": "successFinishResult", "returnObject": { "id": 8 } }),
        );
        fake.respond("GetOutput", json!("0x1000\n"));
        fake.respond("Succeeded", json!(true));

        let (status, result) = interpreter(&session).handle_command("p &x");
        assert_eq!(status, ReturnStatus::SuccessFinishResult);
        let result = result.unwrap();
        assert!(result.succeeded());
        assert_eq!(result.output(), "0x1000\n");
        assert_eq!(result.error(), "");
        assert_eq!(fake.calls_to("HandleCommand")[0]["command"], json!("p &x"));
    }

    #[test]
    fn missing_result_is_invalid() {
        let (fake, session) = fake_session();
        let i = interpreter(&session);
        assert_eq!(i.handle_command("bt").0, ReturnStatus::Invalid);

        fake.respond(
            "HandleCommand",
            json!({ "returnStatus": "failed", "returnObject": { "id": 0 } }),
        );
        let (status, result) = i.handle_command("bt");
        assert_eq!(status, ReturnStatus::Invalid);
        assert!(result.is_none());
    }

    #[test]
    fn handle_and_log_command_reads_result() {
        let (fake, session) = fake_session();
        fake.respond(
            "HandleCommand",
            json!({ "returnStatus": "successFinishNoResult", "returnObject": { "id": 8 } }),
        );
        interpreter(&session).handle_and_log_command("settings set a b");
        assert_eq!(fake.call_count("GetDescription"), 1);
        assert_eq!(fake.call_count("GetError"), 1);
        assert_eq!(fake.call_count("GetOutput"), 1);
    }

    #[test]
    fn dropping_proxies_deletes_remote_objects() {
        let (fake, session) = fake_session();
        fake.respond(
            "HandleCommand",
            json!({ "returnStatus": "successFinishNoResult", "returnObject": { "id": 8 } }),
        );
        let i = interpreter(&session);
        drop(i.handle_command("version"));
        assert_eq!(
            fake.calls_to("SbCommandReturnObjectRpcService/Delete"),
            vec![json!({ "returnObject": { "id": 8 } })]
        );
        drop(i);
        assert_eq!(
            fake.calls_to("SbCommandInterpreterRpcService/Delete"),
            vec![json!({ "interpreter": { "id": 1 } })]
        );
    }
}
