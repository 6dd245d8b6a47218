//! The call skeleton shared by every proxy.
use sbproxy_rpc::{CancellationToken, ServiceClient};
use serde::de::{DeserializeOwned, IgnoredAny};
use serde::Serialize;
use serde_json::{json, Value};

use crate::session::Session;

/// A service client bound to a session. Calls go through the session's
/// connection, so a failure comes back as `None`.
#[derive(Clone)]
pub(crate) struct Stub {
    session: Session,
    client: ServiceClient,
}

impl Stub {
    pub fn new(session: &Session, service: &'static str) -> Self {
        Self {
            session: session.clone(),
            client: session.connection().client(service),
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn call<R: DeserializeOwned + Default>(&self, method: &str, request: Value) -> Option<R> {
        let full_method = self.client.full_method(method);
        self.session
            .connection()
            .invoke_rpc(&full_method, |options| {
                self.client.call(method, &request, options)
            })
    }

    /// A call whose answer carries nothing but success.
    pub fn call_ok(&self, method: &str, request: Value) -> bool {
        self.call::<IgnoredAny>(method, request).is_some()
    }

    /// [`call_ok`](Self::call_ok) without waiting for an async call in
    /// flight. Used from destructors.
    pub fn call_background_ok(&self, method: &str, request: Value) -> bool {
        let full_method = self.client.full_method(method);
        self.session
            .connection()
            .invoke_background_rpc(&full_method, |options| {
                self.client.call::<IgnoredAny>(method, &request, options)
            })
            .is_some()
    }

    pub async fn call_async<R>(&self, method: &str, request: Value) -> Option<R>
    where
        R: DeserializeOwned + Default + Send + 'static,
    {
        let full_method = self.client.full_method(method);
        let client = self.client.clone();
        let method = method.to_string();
        self.session
            .connection()
            .invoke_rpc_async(&full_method, move |options| async move {
                client.call_async(&method, request, options).await
            })
            .await
    }

    pub async fn call_async_cancellable<R>(
        &self,
        token: &CancellationToken,
        method: &str,
        request: Value,
    ) -> Option<R>
    where
        R: DeserializeOwned + Default + Send + 'static,
    {
        let full_method = self.client.full_method(method);
        let client = self.client.clone();
        let method = method.to_string();
        self.session
            .connection()
            .invoke_rpc_async_cancellable(token, &full_method, move |options| async move {
                client.call_async(&method, request, options).await
            })
            .await
    }
}

/// `{ "<key>": handle, ...params }`, the shape of every request.
pub(crate) fn request<H: Serialize>(key: &str, handle: &H, params: Value) -> Value {
    let mut request = json!({ key: handle });
    if let (Some(fields), Value::Object(params)) = (request.as_object_mut(), params) {
        fields.extend(params);
    }
    request
}
