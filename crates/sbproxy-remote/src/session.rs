//! A debug session: the connection plus the factories that wrap the
//! handles it returns.
use std::sync::Arc;

use sbproxy_rpc::Connection;

use crate::factory::{Factories, ProxiedHandle};

struct Inner {
    connection: Connection,
    factories: Factories,
}

/// Shared by every proxy created in the session. Cheap to clone.
#[derive(Clone)]
pub struct Session {
    inner: Arc<Inner>,
}

impl Session {
    /// A session using the live proxy for every entity.
    pub fn new(connection: Connection) -> Self {
        Self::with_factories(connection, Factories::default())
    }

    pub fn with_factories(connection: Connection, factories: Factories) -> Self {
        Self {
            inner: Arc::new(Inner {
                connection,
                factories,
            }),
        }
    }

    pub fn connection(&self) -> &Connection {
        &self.inner.connection
    }

    pub fn factories(&self) -> &Factories {
        &self.inner.factories
    }

    /// Wrap a handle read from a response through the matching
    /// factory. Absent and null handles give `None`.
    pub fn wrap<H: ProxiedHandle>(&self, handle: Option<H>) -> Option<Arc<H::Proxy>> {
        H::factory(self.factories()).create(self, handle)
    }

    /// End-of-refresh signal: release every queued handle now.
    pub fn flush_deletions(&self) -> usize {
        self.inner.connection.flush_deletions()
    }

    pub fn shutdown(&self) {
        self.inner.connection.shutdown();
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("shut_down", &self.inner.connection.is_shut_down())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handle::{ThreadHandle, ValueHandle};
    use crate::test_util::fake_session;
    use serde_json::json;

    #[test]
    fn dropped_proxies_are_released_on_flush() {
        let (fake, session) = fake_session();
        let a = session.wrap(Some(ValueHandle::new(1)));
        let b = session.wrap(Some(ValueHandle::new(2)));
        let t = session.wrap(Some(ThreadHandle::new(9)));
        drop((a, b, t));
        assert_eq!(fake.call_count("BulkDelete"), 0);

        assert_eq!(session.flush_deletions(), 2);
        let values = fake.calls_to("RemoteValueRpcService/BulkDelete");
        assert_eq!(values.len(), 1);
        assert_eq!(values[0]["values"][0]["id"], json!(1));
        assert_eq!(values[0]["values"][1]["id"], json!(2));
        assert_eq!(fake.call_count("RemoteThreadRpcService/BulkDelete"), 1);

        assert_eq!(session.flush_deletions(), 0);
    }

    #[test]
    fn shared_handle_is_queued_once_per_proxy() {
        let (fake, session) = fake_session();
        let first = session.wrap(Some(ValueHandle::new(5)));
        let second = session.wrap(Some(ValueHandle::new(5)));
        drop((first, second));
        session.flush_deletions();
        let calls = fake.calls_to("RemoteValueRpcService/BulkDelete");
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0]["values"].as_array().map(Vec::len), Some(2));
    }

    #[test]
    fn nothing_is_released_after_shutdown() {
        let (fake, session) = fake_session();
        let value = session.wrap(Some(ValueHandle::new(3)));
        session.shutdown();
        drop(value);
        assert_eq!(session.flush_deletions(), 0);
        assert!(fake.calls().is_empty());
    }
}
