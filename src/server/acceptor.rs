//! TCP connection acceptor.
//!
//! The acceptor starts once. It waits for the WiFi join to settle, binds
//! the listening socket and admits clients into the registry.
//!
//! Accept errors that leave the socket usable (descriptor or buffer
//! exhaustion, a peer resetting mid-handshake) are logged and retried
//! after [`ACCEPT_RETRY_DELAY`]. Only an error saying the listening socket
//! itself is broken closes the listener; the acceptor then reports
//! [`AcceptorState::Draining`] for the rest of the process lifetime.

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use chrono::Utc;
use socket2::{SockRef, TcpKeepalive};
use tokio::net::{TcpListener, TcpSocket, TcpStream};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::reader::run_client;
use crate::app_state::AppState;
use crate::config::{GatewayConfig, KeepaliveConfig};
use crate::domain::{Admission, StatusEvent};
use crate::error::GatewayError;
use crate::network::ConnectivityState;

/// Pause after a recoverable accept error before accepting again.
pub const ACCEPT_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Lifecycle of the acceptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcceptorState {
    /// Not listening yet.
    Idle,
    /// Bound and accepting clients.
    Listening,
    /// Stopped after a fatal error; existing clients are left to finish.
    Draining,
}

/// Accepts TCP clients and spawns a reader for each.
#[derive(Debug)]
pub struct Acceptor {
    listen_addr: SocketAddr,
    backlog: u32,
    read_buffer_size: usize,
    keepalive: KeepaliveConfig,
    state: AppState,
    started: AtomicBool,
    phase: watch::Sender<AcceptorState>,
    local_addr: OnceLock<SocketAddr>,
}

impl Acceptor {
    /// Creates an idle acceptor.
    #[must_use]
    pub fn new(config: &GatewayConfig, state: AppState) -> Self {
        let (phase, _) = watch::channel(AcceptorState::Idle);
        Self {
            listen_addr: config.listen_addr,
            backlog: u32::try_from(config.client_capacity).unwrap_or(u32::MAX).max(1),
            read_buffer_size: config.read_buffer_size,
            keepalive: config.keepalive,
            state,
            started: AtomicBool::new(false),
            phase,
            local_addr: OnceLock::new(),
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> AcceptorState {
        *self.phase.borrow()
    }

    /// Watches lifecycle changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<AcceptorState> {
        self.phase.subscribe()
    }

    /// Bound address, once listening.
    #[must_use]
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr.get().copied()
    }

    /// Starts the accept task. Only the first call spawns anything; later
    /// calls return `None`.
    ///
    /// The task resolves with [`GatewayError::NetworkUnavailable`] if the
    /// WiFi join fails, [`GatewayError::Bind`] if the socket cannot be
    /// bound, or [`GatewayError::Accept`] on a fatal accept error.
    pub fn start(self: &Arc<Self>) -> Option<JoinHandle<Result<(), GatewayError>>> {
        if self.started.swap(true, Ordering::AcqRel) {
            tracing::warn!("acceptor already started");
            return None;
        }
        let this = Arc::clone(self);
        Some(tokio::spawn(async move { this.run().await }))
    }

    async fn run(&self) -> Result<(), GatewayError> {
        let link = self.state.connectivity.wait_settled().await;
        if link != ConnectivityState::Connected {
            tracing::warn!(state = %link, "wifi not ready, command server not started");
            self.server_down(format!("wifi {link}"));
            return Err(GatewayError::NetworkUnavailable(link));
        }

        let listener = match bind(self.listen_addr, self.backlog) {
            Ok(listener) => listener,
            Err(source) => {
                tracing::error!(addr = %self.listen_addr, error = %source, "bind failed");
                self.server_down(format!("bind failed: {source}"));
                return Err(GatewayError::Bind {
                    addr: self.listen_addr,
                    source,
                });
            }
        };
        let addr = listener.local_addr().unwrap_or(self.listen_addr);
        let _ = self.local_addr.set(addr);
        self.phase.send_replace(AcceptorState::Listening);
        tracing::info!(%addr, "command server listening");
        let _ = self.state.status.publish(StatusEvent::ServerListening {
            addr,
            timestamp: Utc::now(),
        });

        self.serve(listener).await
    }

    async fn serve<L: Incoming>(&self, mut listener: L) -> Result<(), GatewayError> {
        loop {
            match listener.next_client().await {
                Ok((stream, peer)) => self.admit(stream, peer),
                Err(e) if !listener_broken(&e) => {
                    tracing::warn!(error = %e, "accept failed, retrying");
                    tokio::time::sleep(ACCEPT_RETRY_DELAY).await;
                }
                Err(e) => {
                    self.phase.send_replace(AcceptorState::Draining);
                    drop(listener);
                    let err = GatewayError::Accept(e);
                    tracing::error!(
                        code = err.error_code(),
                        class = ?err.class(),
                        error = %err,
                        "listening socket broken, closing listener"
                    );
                    self.server_down(err.to_string());
                    return Err(err);
                }
            }
        }
    }

    fn admit(&self, stream: TcpStream, peer: SocketAddr) {
        if let Err(e) = set_keepalive(&stream, &self.keepalive) {
            tracing::warn!(%peer, error = %e, "could not configure keepalive");
        }
        let (read_half, write_half) = stream.into_split();

        match self.state.registry.add(peer, write_half) {
            Admission::Admitted(slot) => {
                tracing::info!(%peer, client_id = %slot.client_id, slot = slot.index, "client connected");
                let _ = self.state.status.publish(StatusEvent::ClientConnected {
                    client_id: slot.client_id,
                    slot: slot.index,
                    peer,
                    timestamp: Utc::now(),
                });
                let reader = tokio::spawn(run_client(
                    read_half,
                    slot,
                    self.state.clone(),
                    self.read_buffer_size,
                ));
                let _ = self.state.registry.attach_reader(slot, reader.abort_handle());
            }
            Admission::Full(write_half) => {
                let err = GatewayError::RegistryFull {
                    capacity: self.state.registry.capacity(),
                };
                tracing::warn!(
                    %peer,
                    code = err.error_code(),
                    class = ?err.class(),
                    error = %err,
                    "dropping new client"
                );
                let _ = self.state.status.publish(StatusEvent::ClientRejected {
                    peer,
                    timestamp: Utc::now(),
                });
                drop(read_half.reunite(write_half));
            }
        }
    }

    fn server_down(&self, reason: String) {
        let _ = self.state.status.publish(StatusEvent::ServerDown {
            reason,
            timestamp: Utc::now(),
        });
    }
}

/// Source of inbound connections.
trait Incoming: Send {
    fn next_client(&mut self) -> impl Future<Output = io::Result<(TcpStream, SocketAddr)>> + Send;
}

impl Incoming for TcpListener {
    fn next_client(&mut self) -> impl Future<Output = io::Result<(TcpStream, SocketAddr)>> + Send {
        self.accept()
    }
}

/// Returns `true` when an accept error means the listening socket can no
/// longer produce connections.
fn listener_broken(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::InvalidInput || err.raw_os_error().is_some_and(broken_socket_errno)
}

#[cfg(unix)]
fn broken_socket_errno(code: i32) -> bool {
    matches!(
        code,
        libc::EBADF | libc::EINVAL | libc::ENOTSOCK | libc::EOPNOTSUPP | libc::EFAULT
    )
}

#[cfg(not(unix))]
fn broken_socket_errno(_code: i32) -> bool {
    false
}

fn bind(addr: SocketAddr, backlog: u32) -> io::Result<TcpListener> {
    let socket = if addr.is_ipv4() {
        TcpSocket::new_v4()?
    } else {
        TcpSocket::new_v6()?
    };
    socket.set_reuseaddr(true)?;
    socket.bind(addr)?;
    socket.listen(backlog)
}

fn set_keepalive(stream: &TcpStream, config: &KeepaliveConfig) -> io::Result<()> {
    let keepalive = TcpKeepalive::new()
        .with_time(config.idle)
        .with_interval(config.interval);
    #[cfg(not(windows))]
    let keepalive = keepalive.with_retries(config.count);
    SockRef::from(stream).set_tcp_keepalive(&keepalive)
}
