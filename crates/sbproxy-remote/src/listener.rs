//! Event listeners.
use std::sync::Arc;

use serde::Deserialize;
use serde_json::json;

use crate::handle::ListenerHandle;
use crate::protocol::{service, Event};
use crate::proxy::{self, Stub};
use crate::session::Session;

pub trait RemoteListener: Send + Sync {
    fn handle(&self) -> &ListenerHandle;

    fn id(&self) -> u64 {
        self.handle().id
    }

    /// Block for up to `seconds` for the next event. `None` on timeout
    /// or when the call fails.
    fn wait_for_event(&self, seconds: u32) -> Option<Event>;
}

/// Create a listener named `name` on the remote debugger.
pub fn create(session: &Session, name: &str) -> Option<Arc<dyn RemoteListener>> {
    let stub = Stub::new(session, service::LISTENER);
    let handle = stub
        .call::<Option<ListenerHandle>>("Create", json!({ "name": name }))
        .flatten();
    session.wrap(handle)
}

#[derive(Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct WaitForEventResult {
    result: bool,
    event: Option<Event>,
}

pub struct ListenerProxy {
    stub: Stub,
    handle: ListenerHandle,
}

impl ListenerProxy {
    pub fn new(session: &Session, handle: ListenerHandle) -> Self {
        Self {
            stub: Stub::new(session, service::LISTENER),
            handle,
        }
    }
}

impl RemoteListener for ListenerProxy {
    fn handle(&self) -> &ListenerHandle {
        &self.handle
    }

    fn wait_for_event(&self, seconds: u32) -> Option<Event> {
        let response = self.stub.call::<WaitForEventResult>(
            "WaitForEvent",
            proxy::request("listener", &self.handle, json!({ "numSeconds": seconds })),
        )?;
        if !response.result {
            return None;
        }
        response.event
    }
}
