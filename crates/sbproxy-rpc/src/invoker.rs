//! Call invoker seam and the pooled pipe implementation.
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::sync::{Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};

use crate::error::{RpcError, StatusCode};
use crate::transport::{self, CONNECTION_LOST};

/// Per-call options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallOptions {
    /// Give up once this instant has passed.
    pub deadline: Option<Instant>,
    /// Only meaningful for the bootstrap call; see
    /// [`crate::Connection::invoke_bootstrap_rpc`].
    pub wait_for_ready: bool,
}

impl CallOptions {
    /// Options with a deadline `timeout` from now, or none.
    pub fn with_timeout(timeout: Option<Duration>) -> Self {
        Self {
            deadline: timeout.map(|t| Instant::now() + t),
            wait_for_ready: false,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }
}

/// Executes one encoded unary call against the remote server.
///
/// Implementations must be callable from any thread.
pub trait CallInvoker: Send + Sync {
    fn unary_call(
        &self,
        method: &str,
        request: &[u8],
        options: &CallOptions,
    ) -> Result<Vec<u8>, RpcError>;
}

/// One duplex byte channel to the server.
pub struct Channel {
    reader: Box<dyn Read + Send>,
    writer: Box<dyn Write + Send>,
    /// Set for socket channels, whose I/O can be bounded by a deadline.
    socket: Option<TcpStream>,
}

impl Channel {
    pub fn new(reader: impl Read + Send + 'static, writer: impl Write + Send + 'static) -> Self {
        Self {
            reader: Box::new(BufReader::new(reader)),
            writer: Box::new(BufWriter::new(writer)),
            socket: None,
        }
    }

    /// A channel over a connected TCP stream.
    pub fn tcp(stream: TcpStream) -> io::Result<Self> {
        stream.set_nodelay(true)?;
        let reader = stream.try_clone()?;
        let socket = stream.try_clone()?;
        Ok(Self {
            socket: Some(socket),
            ..Self::new(reader, stream)
        })
    }

    /// Run one call. The flag reports whether the channel is still
    /// positioned on a frame boundary.
    fn call(
        &mut self,
        method: &str,
        request: &[u8],
        options: &CallOptions,
    ) -> (Result<Vec<u8>, RpcError>, bool) {
        if let Err(err) = self.bound_io(options) {
            // Nothing was sent, so the stream is still aligned.
            return (Err(err), true);
        }
        if let Err(e) = transport::write_request(&mut self.writer, method, request) {
            let err = match e.kind() {
                io::ErrorKind::BrokenPipe => {
                    RpcError::status(StatusCode::Unavailable, CONNECTION_LOST)
                }
                kind if is_timeout(kind) => deadline_exceeded(method),
                _ => RpcError::Transport(e),
            };
            return (Err(err), false);
        }
        match transport::read_frame(&mut self.reader) {
            Ok(frame) => (transport::frame_into_result(frame), true),
            Err(RpcError::Transport(e)) if is_timeout(e.kind()) => {
                (Err(deadline_exceeded(method)), false)
            }
            Err(e) => (Err(e), false),
        }
    }

    /// Limit socket reads and writes to the time left before the
    /// deadline, or lift the limit for calls without one.
    fn bound_io(&self, options: &CallOptions) -> Result<(), RpcError> {
        let Some(socket) = &self.socket else {
            return Ok(());
        };
        let timeout = match options.deadline {
            None => None,
            Some(deadline) => {
                let remaining = deadline.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    return Err(RpcError::status(
                        StatusCode::DeadlineExceeded,
                        "deadline passed before the call was sent",
                    ));
                }
                Some(remaining)
            }
        };
        socket.set_read_timeout(timeout)?;
        socket.set_write_timeout(timeout)?;
        Ok(())
    }
}

fn is_timeout(kind: io::ErrorKind) -> bool {
    matches!(kind, io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut)
}

fn deadline_exceeded(method: &str) -> RpcError {
    RpcError::status(
        StatusCode::DeadlineExceeded,
        format!("{method} did not complete before the deadline"),
    )
}

struct Pool {
    idle: Vec<Channel>,
    /// Channels not yet discarded, idle, in use or being dialled.
    live: usize,
    /// Most channels open at once.
    capacity: usize,
}

/// A pool of up to `capacity` [`Channel`]s. Each call borrows one
/// channel for its whole round trip, so up to `capacity` calls run
/// concurrently.
///
/// A pool built by [`connect_tcp`](Self::connect_tcp) dials channels
/// on demand and replaces broken ones. Until the server listens, calls
/// fail with `Unavailable`, which the bootstrap call retries.
pub struct PipeCallInvoker {
    pool: Mutex<Pool>,
    available: Condvar,
    /// Where to dial new channels; empty for a fixed pool.
    addrs: Vec<SocketAddr>,
}

impl PipeCallInvoker {
    /// A fixed pool. Broken channels are not replaced.
    pub fn new(channels: Vec<Channel>) -> Self {
        let live = channels.len();
        Self {
            pool: Mutex::new(Pool {
                idle: channels,
                live,
                capacity: live,
            }),
            available: Condvar::new(),
            addrs: Vec::new(),
        }
    }

    /// A pool of `count` TCP channels to `addr`. Only the address is
    /// resolved here; connections are opened by the calls that need
    /// them.
    pub fn connect_tcp(addr: impl ToSocketAddrs, count: usize) -> io::Result<Self> {
        let addrs: Vec<_> = addr.to_socket_addrs()?.collect();
        if addrs.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "address resolved to nothing",
            ));
        }
        tracing::debug!(?addrs, count, "call pool ready to dial");
        Ok(Self {
            pool: Mutex::new(Pool {
                idle: Vec::with_capacity(count),
                live: 0,
                capacity: count,
            }),
            available: Condvar::new(),
            addrs,
        })
    }

    pub fn idle_channels(&self) -> usize {
        self.lock().idle.len()
    }

    pub fn live_channels(&self) -> usize {
        self.lock().live
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Pool> {
        self.pool.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn acquire(&self, options: &CallOptions) -> Result<Channel, RpcError> {
        let mut pool = self.lock();
        loop {
            if let Some(channel) = pool.idle.pop() {
                return Ok(channel);
            }
            if pool.capacity == 0 {
                return Err(RpcError::status(StatusCode::Unavailable, CONNECTION_LOST));
            }
            if pool.live < pool.capacity {
                pool.live += 1;
                drop(pool);
                return self.dial(options).map_err(|err| {
                    self.release(None);
                    err
                });
            }
            pool = match options.deadline {
                None => self
                    .available
                    .wait(pool)
                    .unwrap_or_else(PoisonError::into_inner),
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Err(RpcError::status(
                            StatusCode::DeadlineExceeded,
                            "no call channel became free before the deadline",
                        ));
                    }
                    self.available
                        .wait_timeout(pool, deadline - now)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0
                }
            };
        }
    }

    /// Open a new channel, trying each resolved address in turn.
    fn dial(&self, options: &CallOptions) -> Result<Channel, RpcError> {
        let mut last_error = None;
        for addr in &self.addrs {
            let connected = match options.deadline {
                None => TcpStream::connect(addr),
                Some(deadline) => {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    if remaining.is_zero() {
                        return Err(RpcError::status(
                            StatusCode::DeadlineExceeded,
                            "deadline passed before a call channel was opened",
                        ));
                    }
                    TcpStream::connect_timeout(addr, remaining)
                }
            };
            match connected.and_then(Channel::tcp) {
                Ok(channel) => {
                    tracing::debug!(%addr, "opened call channel");
                    return Ok(channel);
                }
                Err(e) => last_error = Some((addr, e)),
            }
        }
        Err(match last_error {
            Some((addr, e)) => RpcError::status(
                StatusCode::Unavailable,
                format!("server at {addr} is not reachable: {e}"),
            ),
            None => RpcError::status(StatusCode::Unavailable, CONNECTION_LOST),
        })
    }

    fn release(&self, channel: Option<Channel>) {
        let mut pool = self.lock();
        match channel {
            Some(channel) => pool.idle.push(channel),
            None => {
                pool.live -= 1;
                tracing::debug!("call channel closed, {} left", pool.live);
            }
        }
        // Waiters must re-check `live` when a channel is discarded.
        self.available.notify_all();
    }
}

impl CallInvoker for PipeCallInvoker {
    fn unary_call(
        &self,
        method: &str,
        request: &[u8],
        options: &CallOptions,
    ) -> Result<Vec<u8>, RpcError> {
        let mut channel = self.acquire(options)?;
        let (result, healthy) = channel.call(method, request, options);
        if !healthy {
            tracing::warn!(method, "discarding broken call channel");
        }
        self.release(healthy.then_some(channel));
        result
    }
}
