//! The socket collaborator the engine talks through.
//!
//! # Design
//! The engine never reaches into global modem state: every operation takes an
//! explicit `&mut dyn Transport` (or a generic `T: Transport`) plus the
//! [`SocketHandle`] it opened. A transport models a constrained modem socket:
//! it only says "some bytes are ready" through ring notifications and hands
//! out bytes through a bounded `receive`.
//!
//! A stale length hint is a normal event on these links, so `receive`
//! reports it as [`ReceiveError::StaleHint`] rather than as a failure the
//! caller has to catch.

use async_trait::async_trait;
use thiserror::Error;

/// Opaque identifier of one open socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SocketHandle(pub u32);

impl std::fmt::Display for SocketHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "socket#{}", self.0)
    }
}

/// One entry of the transport's readiness queue.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RingNotification {
    /// Best-effort count of bytes ready to read. May be absent or stale.
    pub length: Option<usize>,
    /// Bytes some transports attach to the notification itself.
    pub data: Option<Vec<u8>>,
}

impl RingNotification {
    pub fn with_length(length: usize) -> Self {
        Self {
            length: Some(length),
            data: None,
        }
    }
}

/// Lifecycle state of a socket as reported by the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketState {
    Free,
    Opening,
    Connected,
    Closing,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SocketStatus {
    pub connected: bool,
    pub state: SocketState,
}

impl SocketStatus {
    /// True once the peer can no longer deliver bytes on this socket.
    pub fn is_closed(&self) -> bool {
        !self.connected || matches!(self.state, SocketState::Closed | SocketState::Free)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("could not open socket: {0}")]
    Open(String),
    #[error("unknown socket {0}")]
    UnknownSocket(SocketHandle),
    #[error("transport failure: {0}")]
    Other(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReceiveError {
    /// The length hint did not match what the socket holds; any bytes carried
    /// on the notification are still usable.
    #[error("stale length hint")]
    StaleHint,
    #[error("socket closed")]
    Closed,
    #[error("receive failed: {0}")]
    Other(String),
}

/// Modem socket collaborator.
///
/// Network attachment defaults to "always attached" so transports backed by
/// an ordinary network stack only implement the socket half.
#[async_trait]
pub trait Transport: Send {
    /// Bring up the packet data link. Returns false if attachment failed.
    async fn attach(&mut self) -> bool {
        true
    }

    /// Whether the packet data link is currently usable.
    fn is_attached(&self) -> bool {
        true
    }

    async fn open(&mut self, host: &str, port: u16) -> Result<SocketHandle, TransportError>;

    /// Hand one chunk to the socket. Returns false if the write failed.
    async fn send(&mut self, handle: SocketHandle, bytes: &[u8]) -> bool;

    async fn close(&mut self, handle: SocketHandle);

    /// Pop the oldest pending ring notification. Never waits.
    fn next_notification(&mut self, handle: SocketHandle) -> Option<RingNotification>;

    /// Read at most `max_len` bytes.
    async fn receive(&mut self, handle: SocketHandle, max_len: usize) -> Result<Vec<u8>, ReceiveError>;

    async fn status(&mut self, handle: SocketHandle) -> Result<SocketStatus, TransportError>;
}
