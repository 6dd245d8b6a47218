//! Typed remote handles and their release on drop.
use std::fmt;

use crate::connection::Connection;

/// Identifier of an object living in the remote debugger process.
///
/// Each entity kind has its own handle type so a value handle can
/// never be passed where a frame handle is expected. An id of `0`
/// means "no object" and is never sent back to the server.
pub trait RemoteHandle: Clone + Send + Sync + 'static {
    /// Entity name used in logs and request fields.
    const KIND: &'static str;

    fn id(&self) -> u64;

    fn is_null(&self) -> bool {
        self.id() == 0
    }
}

/// A handle whose remote object must be released through a bulk
/// delete call once the local owner goes away.
pub trait BulkDeletable: RemoteHandle {
    /// Issue one delete call covering every handle in `handles`.
    fn bulk_delete(connection: &Connection, handles: Vec<Self>);
}

/// Owns a handle for the lifetime of a proxy and queues it for bulk
/// deletion when dropped.
pub struct OwnedHandle<H: BulkDeletable> {
    handle: H,
    connection: Connection,
}

impl<H: BulkDeletable> OwnedHandle<H> {
    pub fn new(connection: Connection, handle: H) -> Self {
        Self { handle, connection }
    }

    pub fn get(&self) -> &H {
        &self.handle
    }

    pub fn connection(&self) -> &Connection {
        &self.connection
    }
}

impl<H: BulkDeletable> Drop for OwnedHandle<H> {
    fn drop(&mut self) {
        self.connection.queue_for_deletion(self.handle.clone());
    }
}

impl<H: BulkDeletable + fmt::Debug> fmt::Debug for OwnedHandle<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("OwnedHandle").field(&self.handle).finish()
    }
}
