//! sbproxy-remote: local proxies for objects living in a remote LLDB.
//!
//! Every debugger entity (value, frame, thread, breakpoint, ...) is
//! exposed as a trait object backed by a proxy that forwards each
//! operation to the remote debugger through the session's
//! [`Connection`](sbproxy_rpc::Connection). Failed calls degrade to
//! empty results; handles the proxies own are released through the
//! connection's bulk deletion queues when the proxies are dropped.

pub mod breakpoint;
pub mod cached_value;
pub mod command;
pub mod debugger;
pub mod error;
pub mod factory;
pub mod frame;
pub mod handle;
pub mod listener;
pub mod module;
pub mod platform;
pub mod process;
pub mod protocol;
mod proxy;
pub mod session;
pub mod signals;
pub mod symbol;
pub mod target;
pub mod thread;
pub mod types;
pub mod value;
pub mod watchpoint;

#[cfg(test)]
mod test_util;

// Re-export key types for convenience.
pub use breakpoint::{RemoteBreakpoint, RemoteBreakpointLocation};
pub use cached_value::CachedValue;
pub use command::{RemoteCommandInterpreter, RemoteCommandReturnObject};
pub use debugger::RemoteDebugger;
pub use error::{LldbError, ProxyError};
pub use factory::{Factories, LiveProxies, ProxyFactory};
pub use frame::RemoteFrame;
pub use listener::RemoteListener;
pub use module::{RemoteModule, RemoteSection};
pub use platform::RemotePlatform;
pub use process::RemoteProcess;
pub use session::Session;
pub use signals::RemoteUnixSignals;
pub use symbol::{RemoteAddress, RemoteFunction, RemoteSymbol};
pub use target::RemoteTarget;
pub use thread::RemoteThread;
pub use types::{RemoteType, RemoteTypeMember};
pub use value::RemoteValue;
pub use watchpoint::RemoteWatchpoint;
