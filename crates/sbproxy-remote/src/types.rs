//! Types and their members.
use std::sync::Arc;

use sbproxy_rpc::OwnedHandle;
use serde_json::{json, Value};

use crate::handle::{TypeHandle, TypeMemberHandle};
use crate::protocol::{service, TypeFlags};
use crate::proxy::{self, Stub};
use crate::session::Session;

/// A type. Flags, name and base-class count arrive with the handle.
pub trait RemoteType: Send + Sync {
    fn handle(&self) -> &TypeHandle;

    fn type_flags(&self) -> TypeFlags {
        TypeFlags::from_bits_retain(self.handle().flags)
    }

    fn name(&self) -> String {
        self.handle().name.clone()
    }

    fn number_of_direct_base_classes(&self) -> u32 {
        self.handle().number_of_direct_base_classes
    }

    fn id(&self) -> u64 {
        self.handle().id
    }

    fn direct_base_class_at_index(&self, index: u32) -> Option<Arc<dyn RemoteTypeMember>>;

    fn canonical_type(&self) -> Option<Arc<dyn RemoteType>>;

    fn pointee_type(&self) -> Option<Arc<dyn RemoteType>>;

    fn byte_size(&self) -> u64;
}

pub struct TypeProxy {
    stub: Stub,
    handle: OwnedHandle<TypeHandle>,
}

impl TypeProxy {
    pub fn new(session: &Session, handle: TypeHandle) -> Self {
        Self {
            stub: Stub::new(session, service::TYPE),
            handle: OwnedHandle::new(session.connection().clone(), handle),
        }
    }

    fn request(&self, params: Value) -> Value {
        proxy::request("type", self.handle.get(), params)
    }

    fn related_type(&self, method: &str) -> Option<Arc<dyn RemoteType>> {
        let handle = self
            .stub
            .call::<Option<TypeHandle>>(method, self.request(Value::Null))
            .flatten();
        self.stub.session().wrap(handle)
    }
}

impl RemoteType for TypeProxy {
    fn handle(&self) -> &TypeHandle {
        self.handle.get()
    }

    fn direct_base_class_at_index(&self, index: u32) -> Option<Arc<dyn RemoteTypeMember>> {
        let handle = self
            .stub
            .call::<Option<TypeMemberHandle>>(
                "GetDirectBaseClassAtIndex",
                self.request(json!({ "index": index })),
            )
            .flatten();
        self.stub.session().wrap(handle)
    }

    fn canonical_type(&self) -> Option<Arc<dyn RemoteType>> {
        self.related_type("GetCanonicalType")
    }

    fn pointee_type(&self) -> Option<Arc<dyn RemoteType>> {
        self.related_type("GetPointeeType")
    }

    fn byte_size(&self) -> u64 {
        self.stub
            .call("GetByteSize", self.request(Value::Null))
            .unwrap_or_default()
    }
}

/// A member of a type: a field or a base class.
pub trait RemoteTypeMember: Send + Sync {
    fn handle(&self) -> &TypeMemberHandle;

    fn name(&self) -> String;

    fn offset_in_bytes(&self) -> u64;

    fn type_info(&self) -> Option<Arc<dyn RemoteType>>;
}

pub struct TypeMemberProxy {
    stub: Stub,
    handle: TypeMemberHandle,
}

impl TypeMemberProxy {
    pub fn new(session: &Session, handle: TypeMemberHandle) -> Self {
        Self {
            stub: Stub::new(session, service::TYPE_MEMBER),
            handle,
        }
    }

    fn request(&self) -> Value {
        proxy::request("typeMember", &self.handle, Value::Null)
    }
}

impl RemoteTypeMember for TypeMemberProxy {
    fn handle(&self) -> &TypeMemberHandle {
        &self.handle
    }

    fn name(&self) -> String {
        self.stub.call("GetName", self.request()).unwrap_or_default()
    }

    fn offset_in_bytes(&self) -> u64 {
        self.stub
            .call("GetOffsetInBytes", self.request())
            .unwrap_or_default()
    }

    fn type_info(&self) -> Option<Arc<dyn RemoteType>> {
        let handle = self
            .stub
            .call::<Option<TypeHandle>>("GetTypeInfo", self.request())
            .flatten();
        self.stub.session().wrap(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::fake_session;

    #[test]
    fn prefetched_fields_cost_no_calls() {
        let (fake, session) = fake_session();
        let handle = TypeHandle {
            id: 3,
            name: "Derived".into(),
            flags: (TypeFlags::IS_CLASS | TypeFlags::HAS_CHILDREN).bits(),
            number_of_direct_base_classes: 1,
        };
        let t = session.wrap(Some(handle)).unwrap();
        assert_eq!(t.name(), "Derived");
        assert_eq!(t.id(), 3);
        assert_eq!(t.number_of_direct_base_classes(), 1);
        assert!(t.type_flags().contains(TypeFlags::IS_CLASS));
        assert!(fake.calls().is_empty());
    }

    #[test]
    fn base_class_members_are_wrapped() {
        let (fake, session) = fake_session();
        fake.respond("GetDirectBaseClassAtIndex", json!({ "id": 21 }));
        fake.respond("GetName", json!("Base"));
        fake.respond("GetOffsetInBytes", json!(8));
        fake.respond("GetTypeInfo", json!({ "id": 4, "name": "Base" }));

        let t = session.wrap(Some(TypeHandle::new(3))).unwrap();
        let member = t.direct_base_class_at_index(0).unwrap();
        assert_eq!(member.handle().id, 21);
        assert_eq!(member.name(), "Base");
        assert_eq!(member.offset_in_bytes(), 8);
        assert_eq!(member.type_info().map(|t| t.name()), Some("Base".to_string()));
        assert_eq!(
            fake.calls_to("SbTypeMemberRpcService/GetName")[0],
            json!({ "typeMember": { "id": 21 } })
        );
    }

    #[test]
    fn related_types_and_failures() {
        let (fake, session) = fake_session();
        fake.respond("GetPointeeType", json!({ "id": 0 }));
        fake.respond("GetCanonicalType", json!({ "id": 9, "name": "int" }));
        let t = session.wrap(Some(TypeHandle::new(3))).unwrap();
        assert!(t.pointee_type().is_none());
        assert_eq!(t.canonical_type().map(|c| c.id()), Some(9));
        assert_eq!(t.byte_size(), 0);
        assert!(t.direct_base_class_at_index(0).is_none());
    }
}
