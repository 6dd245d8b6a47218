//! Shared connection state: the call invoker, failure policy and the
//! per-type bulk deletion queues.
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::{Duration, Instant};

use sbproxy_config::ConnectionConfig;
use tokio_util::sync::CancellationToken;

use crate::bulk_delete::BulkDeleter;
use crate::client::ServiceClient;
use crate::error::RpcError;
use crate::handle::BulkDeletable;
use crate::invoker::{CallInvoker, CallOptions};

/// Called with the method name and error of every failed call made
/// while the connection is up.
pub type RpcErrorHandler = Box<dyn Fn(&str, &RpcError) + Send + Sync>;

/// Called with the method name after every async call.
pub type AsyncCompletedHandler = Box<dyn Fn(&str) + Send + Sync>;

/// Type-erased view of one `BulkDeleter<H>`.
trait PendingDeletions: Send + Sync {
    fn flush(&self, connection: &Connection) -> bool;
    fn pending(&self) -> usize;
    fn kind(&self) -> &'static str;
}

impl<H: BulkDeletable> PendingDeletions for BulkDeleter<H> {
    fn flush(&self, connection: &Connection) -> bool {
        BulkDeleter::flush(self, |batch| H::bulk_delete(connection, batch))
    }

    fn pending(&self) -> usize {
        self.len()
    }

    fn kind(&self) -> &'static str {
        H::KIND
    }
}

struct RegisteredDeleter {
    typed: Arc<dyn Any + Send + Sync>,
    erased: Arc<dyn PendingDeletions>,
}

struct Inner {
    invoker: Arc<dyn CallInvoker>,
    call_timeout: Option<Duration>,
    batch_size: usize,
    retry_wait: Duration,
    shut_down: AtomicBool,
    /// Async calls run one at a time.
    async_gate: tokio::sync::Mutex<()>,
    /// Async calls between start and completion. Blocking calls wait
    /// for this to reach zero.
    async_in_flight: Mutex<usize>,
    async_idle: Condvar,
    deleters: Mutex<HashMap<TypeId, RegisteredDeleter>>,
    rpc_error_handler: RwLock<Option<RpcErrorHandler>>,
    async_completed_handler: RwLock<Option<AsyncCompletedHandler>>,
}

/// Process-wide connection to the remote debugger. Cheap to clone;
/// clones share all state.
#[derive(Clone)]
pub struct Connection {
    inner: Arc<Inner>,
}

impl Connection {
    pub fn new(invoker: Arc<dyn CallInvoker>, config: &ConnectionConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                invoker,
                call_timeout: config.call_timeout(),
                batch_size: config.bulk_delete_batch_size,
                retry_wait: config.retry_wait(),
                shut_down: AtomicBool::new(false),
                async_gate: tokio::sync::Mutex::new(()),
                async_in_flight: Mutex::new(0),
                async_idle: Condvar::new(),
                deleters: Mutex::new(HashMap::new()),
                rpc_error_handler: RwLock::new(None),
                async_completed_handler: RwLock::new(None),
            }),
        }
    }

    pub fn with_defaults(invoker: Arc<dyn CallInvoker>) -> Self {
        Self::new(invoker, &ConnectionConfig::default())
    }

    pub fn invoker(&self) -> Arc<dyn CallInvoker> {
        Arc::clone(&self.inner.invoker)
    }

    /// A client stub for `service` sharing this connection's invoker.
    pub fn client(&self, service: &'static str) -> ServiceClient {
        ServiceClient::new(self.invoker(), service)
    }

    pub fn set_rpc_error_handler(&self, handler: RpcErrorHandler) {
        *self
            .inner
            .rpc_error_handler
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(handler);
    }

    pub fn set_async_completed_handler(&self, handler: AsyncCompletedHandler) {
        *self
            .inner
            .async_completed_handler
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(handler);
    }

    /// Stop issuing calls. Later calls return `None` without running
    /// and failures of calls already in flight are no longer reported.
    pub fn shutdown(&self) {
        if !self.inner.shut_down.swap(true, Ordering::SeqCst) {
            tracing::info!("connection shut down");
        }
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.shut_down.load(Ordering::SeqCst)
    }

    /// Options for an ordinary call under the default timeout policy.
    pub fn call_options(&self) -> CallOptions {
        CallOptions::with_timeout(self.inner.call_timeout)
    }

    /// Run a blocking call. Returns `None` if the connection is shut
    /// down or the call fails; failures are logged and reported, never
    /// propagated.
    ///
    /// Waits for an async call in flight to complete first, so the two
    /// never overlap on the server. Must not be called from the task
    /// that is driving that async call.
    pub fn invoke_rpc<T>(
        &self,
        method: &str,
        call: impl FnOnce(&CallOptions) -> Result<T, RpcError>,
    ) -> Option<T> {
        self.join_async_call(method);
        self.invoke_background_rpc(method, call)
    }

    /// Like [`invoke_rpc`](Self::invoke_rpc), but does not wait for an
    /// async call in flight. For calls made off the main flow, e.g.
    /// releasing handles from a destructor.
    pub fn invoke_background_rpc<T>(
        &self,
        method: &str,
        call: impl FnOnce(&CallOptions) -> Result<T, RpcError>,
    ) -> Option<T> {
        if self.is_shut_down() {
            tracing::debug!(method, "skipping call on shut down connection");
            return None;
        }
        let result = call(&self.call_options());
        self.complete(method, result)
    }

    fn join_async_call(&self, method: &str) {
        let mut in_flight = self
            .inner
            .async_in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if *in_flight > 0 {
            tracing::trace!(method, "waiting for async call to complete");
        }
        while *in_flight > 0 {
            in_flight = self
                .inner
                .async_idle
                .wait(in_flight)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Boolean form of [`invoke_rpc`](Self::invoke_rpc).
    pub fn invoke_rpc_ok(
        &self,
        method: &str,
        call: impl FnOnce(&CallOptions) -> Result<(), RpcError>,
    ) -> bool {
        self.invoke_rpc(method, call).is_some()
    }

    /// Async counterpart of [`invoke_rpc`](Self::invoke_rpc). Async
    /// calls are serialised: a second one waits until the first has
    /// completed.
    pub async fn invoke_rpc_async<T, F, Fut>(&self, method: &str, call: F) -> Option<T>
    where
        F: FnOnce(CallOptions) -> Fut,
        Fut: Future<Output = Result<T, RpcError>>,
    {
        if self.is_shut_down() {
            tracing::debug!(method, "skipping async call on shut down connection");
            return None;
        }
        let _gate = self.inner.async_gate.lock().await;
        if self.is_shut_down() {
            return None;
        }
        let in_flight = AsyncInFlight::enter(&self.inner);
        let result = call(self.call_options()).await;
        drop(in_flight);
        let output = self.complete(method, result);
        if let Some(handler) = self
            .inner
            .async_completed_handler
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
        {
            handler(method);
        }
        output
    }

    /// Like [`invoke_rpc_async`](Self::invoke_rpc_async), but stops
    /// waiting when `token` is cancelled. A call already sent still
    /// runs to completion on the server.
    pub async fn invoke_rpc_async_cancellable<T, F, Fut>(
        &self,
        token: &CancellationToken,
        method: &str,
        call: F,
    ) -> Option<T>
    where
        F: FnOnce(CallOptions) -> Fut,
        Fut: Future<Output = Result<T, RpcError>>,
    {
        tokio::select! {
            biased;
            _ = token.cancelled() => {
                tracing::debug!(method, "stopped waiting for cancelled call");
                None
            }
            output = self.invoke_rpc_async(method, call) => output,
        }
    }

    /// The session bootstrap call. With `wait_for_ready`, an
    /// `Unavailable` failure is retried every `retry_wait` until
    /// `deadline` has elapsed; no other call is ever retried.
    pub fn invoke_bootstrap_rpc<T>(
        &self,
        method: &str,
        deadline: Duration,
        wait_for_ready: bool,
        mut call: impl FnMut(&CallOptions) -> Result<T, RpcError>,
    ) -> Option<T> {
        if self.is_shut_down() {
            return None;
        }
        let options = CallOptions {
            deadline: Some(Instant::now() + deadline),
            wait_for_ready,
        };
        let mut attempt = 1u32;
        loop {
            match call(&options) {
                Ok(value) => {
                    tracing::info!(method, attempt, "bootstrap call succeeded");
                    return Some(value);
                }
                Err(err) if wait_for_ready && err.is_unavailable() && !options.is_expired() => {
                    tracing::debug!(method, attempt, %err, "remote not ready, retrying");
                    let remaining = options
                        .deadline
                        .map_or(Duration::ZERO, |d| d.saturating_duration_since(Instant::now()));
                    std::thread::sleep(self.inner.retry_wait.min(remaining));
                    attempt += 1;
                }
                Err(err) => return self.complete(method, Err(err)),
            }
        }
    }

    fn complete<T>(&self, method: &str, result: Result<T, RpcError>) -> Option<T> {
        match result {
            Ok(value) => {
                tracing::trace!(method, "rpc succeeded");
                Some(value)
            }
            Err(err) => {
                if self.is_shut_down() {
                    tracing::debug!(method, %err, "rpc failed after shutdown");
                    return None;
                }
                tracing::warn!(method, code = %err.code(), %err, "rpc failed");
                if let Some(handler) = self
                    .inner
                    .rpc_error_handler
                    .read()
                    .unwrap_or_else(PoisonError::into_inner)
                    .as_ref()
                {
                    handler(method, &err);
                }
                None
            }
        }
    }

    fn lock_deleters(&self) -> MutexGuard<'_, HashMap<TypeId, RegisteredDeleter>> {
        self.inner
            .deleters
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// The deletion queue for handle type `H`, created on first use.
    pub fn bulk_deleter<H: BulkDeletable>(&self) -> Arc<BulkDeleter<H>> {
        let batch_size = self.inner.batch_size;
        let typed = {
            let mut deleters = self.lock_deleters();
            let entry = deleters.entry(TypeId::of::<H>()).or_insert_with(|| {
                tracing::debug!(kind = H::KIND, batch_size, "creating bulk deleter");
                let deleter = Arc::new(BulkDeleter::<H>::new(batch_size));
                RegisteredDeleter {
                    typed: deleter.clone(),
                    erased: deleter,
                }
            });
            Arc::clone(&entry.typed)
        };
        typed.downcast::<BulkDeleter<H>>().unwrap_or_else(|_| {
            tracing::error!(kind = H::KIND, "bulk deleter registered under wrong type");
            Arc::new(BulkDeleter::new(batch_size))
        })
    }

    /// Queue `handle` for release. Null handles and queues on a shut
    /// down connection are ignored: the server frees everything when
    /// the session ends.
    pub fn queue_for_deletion<H: BulkDeletable>(&self, handle: H) {
        if handle.is_null() || self.is_shut_down() {
            return;
        }
        self.bulk_deleter::<H>()
            .queue_for_deletion(handle, |batch| H::bulk_delete(self, batch));
    }

    /// Flush every deletion queue, e.g. at the end of a UI refresh.
    /// Returns the number of delete calls issued.
    pub fn flush_deletions(&self) -> usize {
        let deleters: Vec<_> = self
            .lock_deleters()
            .values()
            .map(|d| Arc::clone(&d.erased))
            .collect();
        let mut flushed = 0;
        for deleter in deleters {
            let pending = deleter.pending();
            if deleter.flush(self) {
                tracing::debug!(kind = deleter.kind(), pending, "flushed deletions");
                flushed += 1;
            }
        }
        flushed
    }

    /// Handles waiting for deletion, across all types.
    pub fn pending_deletions(&self) -> usize {
        self.lock_deleters()
            .values()
            .map(|d| d.erased.pending())
            .sum()
    }
}

/// Marks an async call as in flight until dropped, including when the
/// caller stops waiting for it.
struct AsyncInFlight<'a> {
    inner: &'a Inner,
}

impl<'a> AsyncInFlight<'a> {
    fn enter(inner: &'a Inner) -> Self {
        *inner
            .async_in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner) += 1;
        Self { inner }
    }
}

impl Drop for AsyncInFlight<'_> {
    fn drop(&mut self) {
        let mut in_flight = self
            .inner
            .async_in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *in_flight -= 1;
        if *in_flight == 0 {
            self.inner.async_idle.notify_all();
        }
    }
}
