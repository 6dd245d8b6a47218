//! sbproxy-rpc: call transport and connection policy for the remote
//! debugger proxy.
//!
//! This crate owns everything below the entity proxies: the framed
//! call channel pool, the JSON service client, the [`Connection`] that
//! turns call failures into `None`, and the per-type bulk deletion
//! queues that release remote handles.

pub mod bulk_delete;
pub mod client;
pub mod connection;
pub mod error;
pub mod handle;
pub mod invoker;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;
pub mod transport;

// Re-export key types for convenience.
pub use bulk_delete::BulkDeleter;
pub use client::ServiceClient;
pub use connection::{AsyncCompletedHandler, Connection, RpcErrorHandler};
pub use error::{RpcError, StatusCode};
pub use handle::{BulkDeletable, OwnedHandle, RemoteHandle};
pub use invoker::{CallInvoker, CallOptions, Channel, PipeCallInvoker};
pub use tokio_util::sync::CancellationToken;
