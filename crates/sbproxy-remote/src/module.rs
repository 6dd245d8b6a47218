//! Loaded modules and their sections.
use std::sync::Arc;

use sbproxy_rpc::OwnedHandle;
use serde_json::{json, Value};

use crate::handle::{AddressHandle, ModuleHandle, SectionHandle};
use crate::protocol::{service, FileSpec, SectionType};
use crate::proxy::{self, Stub};
use crate::session::Session;
use crate::symbol::RemoteAddress;
use crate::target::RemoteTarget;

pub trait RemoteModule: Send + Sync {
    fn handle(&self) -> &ModuleHandle;

    fn id(&self) -> u64 {
        self.handle().id
    }

    fn file_spec(&self) -> Option<FileSpec>;

    fn platform_file_spec(&self) -> Option<FileSpec>;

    fn set_platform_file_spec(&self, file_spec: &FileSpec) -> bool;

    fn symbol_file_spec(&self) -> Option<FileSpec>;

    fn code_load_address(&self) -> u64;

    fn object_file_header_address(&self) -> Option<Arc<dyn RemoteAddress>>;

    fn code_size(&self) -> u64;

    fn is_64_bit(&self) -> bool;

    fn has_symbols(&self) -> bool;

    fn has_compile_units(&self) -> bool;

    fn num_compile_units(&self) -> u32;

    fn uuid_string(&self) -> String;

    fn triple(&self) -> String;

    fn find_section(&self, name: &str) -> Option<Arc<dyn RemoteSection>>;

    fn num_sections(&self) -> u64;

    fn section_at_index(&self, index: u64) -> Option<Arc<dyn RemoteSection>>;
}

pub struct ModuleProxy {
    stub: Stub,
    handle: OwnedHandle<ModuleHandle>,
}

impl ModuleProxy {
    pub fn new(session: &Session, handle: ModuleHandle) -> Self {
        Self {
            stub: Stub::new(session, service::MODULE),
            handle: OwnedHandle::new(session.connection().clone(), handle),
        }
    }

    fn request(&self, params: Value) -> Value {
        proxy::request("module", self.handle.get(), params)
    }

    fn query<R: serde::de::DeserializeOwned + Default>(&self, method: &str) -> R {
        self.stub
            .call(method, self.request(Value::Null))
            .unwrap_or_default()
    }

    fn section(&self, method: &str, params: Value) -> Option<Arc<dyn RemoteSection>> {
        let handle = self
            .stub
            .call::<Option<SectionHandle>>(method, self.request(params))
            .flatten();
        self.stub.session().wrap(handle)
    }
}

impl RemoteModule for ModuleProxy {
    fn handle(&self) -> &ModuleHandle {
        self.handle.get()
    }

    fn file_spec(&self) -> Option<FileSpec> {
        self.query("GetFileSpec")
    }

    fn platform_file_spec(&self) -> Option<FileSpec> {
        self.query("GetPlatformFileSpec")
    }

    fn set_platform_file_spec(&self, file_spec: &FileSpec) -> bool {
        self.stub
            .call(
                "SetPlatformFileSpec",
                self.request(json!({
                    "fileDirectory": file_spec.directory,
                    "fileName": file_spec.filename,
                })),
            )
            .unwrap_or_default()
    }

    fn symbol_file_spec(&self) -> Option<FileSpec> {
        self.query("GetSymbolFileSpec")
    }

    fn code_load_address(&self) -> u64 {
        self.query("GetCodeLoadAddress")
    }

    fn object_file_header_address(&self) -> Option<Arc<dyn RemoteAddress>> {
        let handle: Option<AddressHandle> = self.query("GetObjectFileHeaderAddress");
        self.stub.session().wrap(handle)
    }

    fn code_size(&self) -> u64 {
        self.query("GetCodeSize")
    }

    fn is_64_bit(&self) -> bool {
        self.query("Is64Bit")
    }

    fn has_symbols(&self) -> bool {
        self.query("HasSymbols")
    }

    fn has_compile_units(&self) -> bool {
        self.query("HasCompileUnits")
    }

    fn num_compile_units(&self) -> u32 {
        self.query("GetNumCompileUnits")
    }

    fn uuid_string(&self) -> String {
        self.query("GetUUIDString")
    }

    fn triple(&self) -> String {
        self.query("GetTriple")
    }

    fn find_section(&self, name: &str) -> Option<Arc<dyn RemoteSection>> {
        self.section("FindSection", json!({ "name": name }))
    }

    fn num_sections(&self) -> u64 {
        self.query("GetNumSections")
    }

    fn section_at_index(&self, index: u64) -> Option<Arc<dyn RemoteSection>> {
        self.section("GetSectionAtIndex", json!({ "index": index }))
    }
}

/// A section of a module's object file.
pub trait RemoteSection: Send + Sync {
    fn handle(&self) -> &SectionHandle;

    fn name(&self) -> String;

    fn section_type(&self) -> SectionType;

    fn file_address(&self) -> u64;

    fn file_offset(&self) -> u64;

    /// Where the section is loaded in `target`, or
    /// [`INVALID_ADDRESS`](crate::protocol::INVALID_ADDRESS) when it is
    /// not loaded or the call fails.
    fn load_address(&self, target: &dyn RemoteTarget) -> u64;

    fn num_sub_sections(&self) -> u64;

    fn sub_section_at_index(&self, index: u64) -> Option<Arc<dyn RemoteSection>>;
}

pub struct SectionProxy {
    stub: Stub,
    handle: SectionHandle,
}

impl SectionProxy {
    pub fn new(session: &Session, handle: SectionHandle) -> Self {
        Self {
            stub: Stub::new(session, service::SECTION),
            handle,
        }
    }

    fn request(&self, params: Value) -> Value {
        proxy::request("section", &self.handle, params)
    }

    fn query<R: serde::de::DeserializeOwned + Default>(&self, method: &str) -> R {
        self.stub
            .call(method, self.request(Value::Null))
            .unwrap_or_default()
    }
}

impl RemoteSection for SectionProxy {
    fn handle(&self) -> &SectionHandle {
        &self.handle
    }

    fn name(&self) -> String {
        self.query("GetName")
    }

    fn section_type(&self) -> SectionType {
        self.query("GetSectionType")
    }

    fn file_address(&self) -> u64 {
        self.query("GetFileAddress")
    }

    fn file_offset(&self) -> u64 {
        self.query("GetFileOffset")
    }

    fn load_address(&self, target: &dyn RemoteTarget) -> u64 {
        self.stub
            .call(
                "GetLoadAddress",
                self.request(json!({ "target": target.handle() })),
            )
            .unwrap_or(crate::protocol::INVALID_ADDRESS)
    }

    fn num_sub_sections(&self) -> u64 {
        self.query("GetNumSubSections")
    }

    fn sub_section_at_index(&self, index: u64) -> Option<Arc<dyn RemoteSection>> {
        let handle = self
            .stub
            .call::<Option<SectionHandle>>(
                "GetSubSectionAtIndex",
                self.request(json!({ "index": index })),
            )
            .flatten();
        self.stub.session().wrap(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handle::TargetHandle;
    use crate::protocol::INVALID_ADDRESS;
    use crate::test_util::fake_session;

    fn module(session: &Session) -> Arc<dyn RemoteModule> {
        session.wrap(Some(ModuleHandle::new(40))).unwrap()
    }

    #[test]
    fn file_specs_and_flags() {
        let (fake, session) = fake_session();
        fake.respond(
            "GetPlatformFileSpec",
            json!({ "directory": "/usr/lib", "filename": "libc.so.6" }),
        );
        fake.respond("Is64Bit", json!(true));
        fake.respond("GetUUIDString", json!("1234-ABCD"));
        let m = module(&session);
        assert_eq!(
            m.platform_file_spec().map(|f| f.path()),
            Some("/usr/lib/libc.so.6".to_string())
        );
        assert!(m.file_spec().is_none());
        assert!(m.is_64_bit());
        assert!(!m.has_symbols());
        assert_eq!(m.uuid_string(), "1234-ABCD");
    }

    #[test]
    fn set_platform_file_spec_sends_parts() {
        let (fake, session) = fake_session();
        fake.respond("SetPlatformFileSpec", json!(true));
        let spec = FileSpec::new("/data", "game.so");
        assert!(module(&session).set_platform_file_spec(&spec));
        let request = &fake.calls_to("SetPlatformFileSpec")[0];
        assert_eq!(request["module"]["id"], json!(40));
        assert_eq!(request["fileDirectory"], json!("/data"));
        assert_eq!(request["fileName"], json!("game.so"));
    }

    #[test]
    fn sections_navigate() {
        let (fake, session) = fake_session();
        fake.respond("FindSection", json!({ "id": 7 }));
        fake.respond("GetSectionType", json!("code"));
        fake.respond("GetSubSectionAtIndex", json!({ "id": 0 }));
        fake.respond("SbSectionRpcService/GetLoadAddress", json!(0x7000));
        let section = module(&session).find_section(".text").unwrap();
        assert_eq!(section.handle().id, 7);
        assert_eq!(section.section_type(), SectionType::Code);
        assert!(section.sub_section_at_index(0).is_none());
        let target = session.wrap(Some(TargetHandle::new(1))).unwrap();
        assert_eq!(section.load_address(target.as_ref()), 0x7000);
    }

    #[test]
    fn unloaded_section_address_is_invalid() {
        let (_fake, session) = fake_session();
        let section = session.wrap(Some(SectionHandle::new(3))).unwrap();
        let target = session.wrap(Some(TargetHandle::new(1))).unwrap();
        assert_eq!(section.load_address(target.as_ref()), INVALID_ADDRESS);
    }

    #[test]
    fn module_is_released_in_bulk() {
        let (fake, session) = fake_session();
        drop(module(&session));
        session.flush_deletions();
        assert_eq!(
            fake.calls_to("SbModuleRpcService/BulkDelete")[0],
            json!({ "modules": [{ "id": 40 }] })
        );
    }
}
