//! Entity factories: the one place a handle becomes a proxy.
//!
//! Every nested handle read from a response goes through the session's
//! [`Factories`], which map null handles to `None`. Tests swap
//! individual factories to observe or fake proxy creation.
use std::sync::Arc;

use sbproxy_rpc::RemoteHandle;

use crate::breakpoint::{
    BreakpointLocationProxy, BreakpointProxy, RemoteBreakpoint, RemoteBreakpointLocation,
};
use crate::command::{
    CommandInterpreterProxy, RemoteCommandInterpreter, RemoteCommandReturnObject,
    ReturnObjectProxy,
};
use crate::debugger::{DebuggerProxy, RemoteDebugger};
use crate::frame::{FrameProxy, RemoteFrame};
use crate::handle::*;
use crate::listener::{ListenerProxy, RemoteListener};
use crate::module::{ModuleProxy, RemoteModule, RemoteSection, SectionProxy};
use crate::platform::{PlatformProxy, RemotePlatform};
use crate::process::{ProcessProxy, RemoteProcess};
use crate::session::Session;
use crate::signals::{RemoteUnixSignals, UnixSignalsProxy};
use crate::symbol::{
    AddressProxy, FunctionProxy, RemoteAddress, RemoteFunction, RemoteSymbol, SymbolProxy,
};
use crate::target::{RemoteTarget, TargetProxy};
use crate::thread::{RemoteThread, ThreadProxy};
use crate::types::{RemoteType, RemoteTypeMember, TypeMemberProxy, TypeProxy};
use crate::value::{RemoteValue, ValueProxy};
use crate::watchpoint::{RemoteWatchpoint, WatchpointProxy};

/// Turns handles of type `H` into proxies.
pub trait ProxyFactory<H: RemoteHandle>: Send + Sync {
    type Proxy: ?Sized;

    /// Wrap a handle known to be non-null.
    fn build(&self, session: &Session, handle: H) -> Arc<Self::Proxy>;

    /// Wrap `handle`, or return `None` when it is absent or null.
    fn create(&self, session: &Session, handle: Option<H>) -> Option<Arc<Self::Proxy>> {
        handle
            .filter(|h| !h.is_null())
            .map(|h| self.build(session, h))
    }
}

/// A handle type with a slot in [`Factories`].
pub trait ProxiedHandle: RemoteHandle {
    type Proxy: ?Sized;

    fn factory(factories: &Factories) -> &dyn ProxyFactory<Self, Proxy = Self::Proxy>;
}

/// The production factory: builds the live proxy for every entity.
#[derive(Debug, Clone, Copy, Default)]
pub struct LiveProxies;

macro_rules! factories {
    ($($field:ident, $with:ident: $handle:ty => $proxy:ident as $remote:ident;)*) => {
        /// The factory used for each entity kind.
        #[derive(Clone)]
        pub struct Factories {
            $(pub $field: Arc<dyn ProxyFactory<$handle, Proxy = dyn $remote>>,)*
        }

        impl Default for Factories {
            fn default() -> Self {
                Self {
                    $($field: Arc::new(LiveProxies),)*
                }
            }
        }

        impl Factories {
            $(
                pub fn $with(
                    mut self,
                    factory: Arc<dyn ProxyFactory<$handle, Proxy = dyn $remote>>,
                ) -> Self {
                    self.$field = factory;
                    self
                }
            )*
        }

        $(
            impl ProxyFactory<$handle> for LiveProxies {
                type Proxy = dyn $remote;

                fn build(&self, session: &Session, handle: $handle) -> Arc<dyn $remote> {
                    Arc::new($proxy::new(session, handle))
                }
            }

            impl ProxiedHandle for $handle {
                type Proxy = dyn $remote;

                fn factory(factories: &Factories) -> &dyn ProxyFactory<Self, Proxy = dyn $remote> {
                    factories.$field.as_ref()
                }
            }
        )*
    };
}

factories! {
    value, with_value: ValueHandle => ValueProxy as RemoteValue;
    frame, with_frame: FrameHandle => FrameProxy as RemoteFrame;
    thread, with_thread: ThreadHandle => ThreadProxy as RemoteThread;
    process, with_process: ProcessHandle => ProcessProxy as RemoteProcess;
    target, with_target: TargetHandle => TargetProxy as RemoteTarget;
    breakpoint, with_breakpoint: BreakpointHandle => BreakpointProxy as RemoteBreakpoint;
    breakpoint_location, with_breakpoint_location:
        BreakpointLocationHandle => BreakpointLocationProxy as RemoteBreakpointLocation;
    module, with_module: ModuleHandle => ModuleProxy as RemoteModule;
    section, with_section: SectionHandle => SectionProxy as RemoteSection;
    type_info, with_type_info: TypeHandle => TypeProxy as RemoteType;
    type_member, with_type_member: TypeMemberHandle => TypeMemberProxy as RemoteTypeMember;
    symbol, with_symbol: SymbolHandle => SymbolProxy as RemoteSymbol;
    address, with_address: AddressHandle => AddressProxy as RemoteAddress;
    function, with_function: FunctionHandle => FunctionProxy as RemoteFunction;
    unix_signals, with_unix_signals: UnixSignalsHandle => UnixSignalsProxy as RemoteUnixSignals;
    watchpoint, with_watchpoint: WatchpointHandle => WatchpointProxy as RemoteWatchpoint;
    command_interpreter, with_command_interpreter:
        CommandInterpreterHandle => CommandInterpreterProxy as RemoteCommandInterpreter;
    return_object, with_return_object:
        ReturnObjectHandle => ReturnObjectProxy as RemoteCommandReturnObject;
    platform, with_platform: PlatformHandle => PlatformProxy as RemotePlatform;
    listener, with_listener: ListenerHandle => ListenerProxy as RemoteListener;
    debugger, with_debugger: DebuggerHandle => DebuggerProxy as RemoteDebugger;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::fake_session;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Counts builds and delegates to the live proxies.
    #[derive(Default)]
    struct CountingThreads {
        built: AtomicUsize,
    }

    impl ProxyFactory<ThreadHandle> for CountingThreads {
        type Proxy = dyn RemoteThread;

        fn build(&self, session: &Session, handle: ThreadHandle) -> Arc<dyn RemoteThread> {
            self.built.fetch_add(1, Ordering::SeqCst);
            LiveProxies.build(session, handle)
        }
    }

    macro_rules! assert_null_maps_to_none {
        ($session:expr, $($handle:expr),* $(,)?) => {
            $(
                assert!($session.wrap(Some($handle)).is_none());
            )*
        };
    }

    #[test]
    fn zero_handles_map_to_none_for_every_entity() {
        let (fake, session) = fake_session();
        assert_null_maps_to_none!(
            session,
            ValueHandle::default(),
            FrameHandle::default(),
            ThreadHandle::default(),
            ProcessHandle::default(),
            TargetHandle::default(),
            BreakpointHandle::default(),
            BreakpointLocationHandle::default(),
            ModuleHandle::default(),
            SectionHandle::default(),
            TypeHandle::default(),
            TypeMemberHandle::default(),
            SymbolHandle::default(),
            AddressHandle::default(),
            FunctionHandle::default(),
            UnixSignalsHandle::default(),
            WatchpointHandle::default(),
            CommandInterpreterHandle::default(),
            ReturnObjectHandle::default(),
            PlatformHandle::default(),
            ListenerHandle::default(),
            DebuggerHandle::default(),
        );
        assert!(session.wrap::<ValueHandle>(None).is_none());
        assert!(fake.calls().is_empty());
    }

    #[test]
    fn non_null_handles_are_wrapped() {
        let (_fake, session) = fake_session();
        let thread = session.wrap(Some(ThreadHandle::new(7))).unwrap();
        assert_eq!(thread.handle().id, 7);
        let location = BreakpointLocationHandle {
            breakpoint: BreakpointHandle {
                target: TargetHandle::new(1),
                id: 2,
            },
            id: 1,
        };
        assert!(session.wrap(Some(location)).is_some());
    }

    #[test]
    fn overridden_factory_is_used() {
        let (fake, _) = fake_session();
        let counting = Arc::new(CountingThreads::default());
        let factories = Factories::default().with_thread(counting.clone());
        let session = Session::with_factories(
            sbproxy_rpc::Connection::with_defaults(fake.clone()),
            factories,
        );

        assert!(session.wrap(Some(ThreadHandle::new(0))).is_none());
        assert!(session.wrap(Some(ThreadHandle::new(3))).is_some());
        assert_eq!(counting.built.load(Ordering::SeqCst), 1);
    }
}
