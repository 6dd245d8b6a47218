use std::sync::Arc;

use sbproxy_rpc::testing::FakeInvoker;
use sbproxy_rpc::Connection;

use crate::session::Session;

/// A session over a fresh fake invoker.
pub fn fake_session() -> (Arc<FakeInvoker>, Session) {
    let fake = FakeInvoker::new();
    let session = Session::new(Connection::with_defaults(fake.clone()));
    (fake, session)
}
