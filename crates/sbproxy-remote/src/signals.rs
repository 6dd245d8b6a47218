//! Signal disposition of the debugged process.
use serde_json::json;

use crate::handle::UnixSignalsHandle;
use crate::protocol::service;
use crate::proxy::{self, Stub};
use crate::session::Session;

pub trait RemoteUnixSignals: Send + Sync {
    fn handle(&self) -> &UnixSignalsHandle;

    /// Whether the process stops when it receives `signal`. False when
    /// the call fails.
    fn should_stop(&self, signal: i32) -> bool;

    fn set_should_stop(&self, signal: i32, value: bool) -> bool;
}

pub struct UnixSignalsProxy {
    stub: Stub,
    handle: UnixSignalsHandle,
}

impl UnixSignalsProxy {
    pub fn new(session: &Session, handle: UnixSignalsHandle) -> Self {
        Self {
            stub: Stub::new(session, service::UNIX_SIGNALS),
            handle,
        }
    }
}

impl RemoteUnixSignals for UnixSignalsProxy {
    fn handle(&self) -> &UnixSignalsHandle {
        &self.handle
    }

    fn should_stop(&self, signal: i32) -> bool {
        self.stub
            .call(
                "GetShouldStop",
                proxy::request("signals", &self.handle, json!({ "signalNumber": signal })),
            )
            .unwrap_or_default()
    }

    fn set_should_stop(&self, signal: i32, value: bool) -> bool {
        self.stub
            .call(
                "SetShouldStop",
                proxy::request(
                    "signals",
                    &self.handle,
                    json!({ "signalNumber": signal, "value": value }),
                ),
            )
            .unwrap_or_default()
    }
}
