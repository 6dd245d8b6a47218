//! Symbols, addresses and functions.
use std::sync::Arc;

use serde_json::{json, Value};

use crate::handle::{AddressHandle, FunctionHandle, SymbolHandle};
use crate::protocol::{service, InstructionInfo, LanguageType, LineEntry};
use crate::proxy::{self, Stub};
use crate::session::Session;
use crate::target::RemoteTarget;

pub trait RemoteSymbol: Send + Sync {
    fn handle(&self) -> &SymbolHandle;

    fn name(&self) -> String;

    fn start_address(&self) -> Option<Arc<dyn RemoteAddress>>;

    fn end_address(&self) -> Option<Arc<dyn RemoteAddress>>;
}

pub struct SymbolProxy {
    stub: Stub,
    handle: SymbolHandle,
}

impl SymbolProxy {
    pub fn new(session: &Session, handle: SymbolHandle) -> Self {
        Self {
            stub: Stub::new(session, service::SYMBOL),
            handle,
        }
    }

    fn address(&self, method: &str) -> Option<Arc<dyn RemoteAddress>> {
        let handle = self
            .stub
            .call::<Option<AddressHandle>>(
                method,
                proxy::request("symbol", &self.handle, Value::Null),
            )
            .flatten();
        self.stub.session().wrap(handle)
    }
}

impl RemoteSymbol for SymbolProxy {
    fn handle(&self) -> &SymbolHandle {
        &self.handle
    }

    fn name(&self) -> String {
        self.stub
            .call("GetName", proxy::request("symbol", &self.handle, Value::Null))
            .unwrap_or_default()
    }

    fn start_address(&self) -> Option<Arc<dyn RemoteAddress>> {
        self.address("GetStartAddress")
    }

    fn end_address(&self) -> Option<Arc<dyn RemoteAddress>> {
        self.address("GetEndAddress")
    }
}

/// An address resolved against a module, usable in any target that
/// loads it.
pub trait RemoteAddress: Send + Sync {
    fn handle(&self) -> &AddressHandle;

    fn id(&self) -> u64 {
        self.handle().id
    }

    fn line_entry(&self) -> Option<LineEntry>;

    /// The address in `target`'s memory, or 0 when the call fails.
    fn load_address(&self, target: &dyn RemoteTarget) -> u64;

    fn function(&self) -> Option<Arc<dyn RemoteFunction>>;

    fn symbol(&self) -> Option<Arc<dyn RemoteSymbol>>;
}

pub struct AddressProxy {
    stub: Stub,
    handle: AddressHandle,
}

impl AddressProxy {
    pub fn new(session: &Session, handle: AddressHandle) -> Self {
        Self {
            stub: Stub::new(session, service::ADDRESS),
            handle,
        }
    }

    fn request(&self, params: Value) -> Value {
        proxy::request("address", &self.handle, params)
    }
}

impl RemoteAddress for AddressProxy {
    fn handle(&self) -> &AddressHandle {
        &self.handle
    }

    fn line_entry(&self) -> Option<LineEntry> {
        self.stub
            .call::<Option<LineEntry>>("GetLineEntry", self.request(Value::Null))
            .flatten()
    }

    fn load_address(&self, target: &dyn RemoteTarget) -> u64 {
        self.stub
            .call(
                "GetLoadAddress",
                self.request(json!({ "target": target.handle() })),
            )
            .unwrap_or_default()
    }

    fn function(&self) -> Option<Arc<dyn RemoteFunction>> {
        let handle = self
            .stub
            .call::<Option<FunctionHandle>>("GetFunction", self.request(Value::Null))
            .flatten();
        self.stub.session().wrap(handle)
    }

    fn symbol(&self) -> Option<Arc<dyn RemoteSymbol>> {
        let handle = self
            .stub
            .call::<Option<SymbolHandle>>("GetSymbol", self.request(Value::Null))
            .flatten();
        self.stub.session().wrap(handle)
    }
}

pub trait RemoteFunction: Send + Sync {
    fn handle(&self) -> &FunctionHandle;

    fn start_address(&self) -> Option<Arc<dyn RemoteAddress>>;

    fn end_address(&self) -> Option<Arc<dyn RemoteAddress>>;

    fn language(&self) -> LanguageType;

    fn name(&self) -> String;

    /// Up to `count` instructions of the function body as loaded in
    /// `target`. Empty when the call fails.
    fn instructions(&self, target: &dyn RemoteTarget, count: u32) -> Vec<InstructionInfo>;
}

pub struct FunctionProxy {
    stub: Stub,
    handle: FunctionHandle,
}

impl FunctionProxy {
    pub fn new(session: &Session, handle: FunctionHandle) -> Self {
        Self {
            stub: Stub::new(session, service::FUNCTION),
            handle,
        }
    }

    fn request(&self, params: Value) -> Value {
        proxy::request("function", &self.handle, params)
    }

    fn address(&self, method: &str) -> Option<Arc<dyn RemoteAddress>> {
        let handle = self
            .stub
            .call::<Option<AddressHandle>>(method, self.request(Value::Null))
            .flatten();
        self.stub.session().wrap(handle)
    }
}

impl RemoteFunction for FunctionProxy {
    fn handle(&self) -> &FunctionHandle {
        &self.handle
    }

    fn start_address(&self) -> Option<Arc<dyn RemoteAddress>> {
        self.address("GetStartAddress")
    }

    fn end_address(&self) -> Option<Arc<dyn RemoteAddress>> {
        self.address("GetEndAddress")
    }

    fn language(&self) -> LanguageType {
        self.stub
            .call("GetLanguage", self.request(Value::Null))
            .unwrap_or_default()
    }

    fn name(&self) -> String {
        self.stub
            .call("GetName", self.request(Value::Null))
            .unwrap_or_default()
    }

    fn instructions(&self, target: &dyn RemoteTarget, count: u32) -> Vec<InstructionInfo> {
        self.stub
            .call(
                "GetInstructions",
                self.request(json!({ "target": target.handle(), "count": count })),
            )
            .unwrap_or_default()
    }
}
