//! A [`Transport`] over plain TCP that behaves like a modem socket.
//!
//! # Design
//! Each open socket gets a reader task that copies whatever the peer sends
//! into a shared receive buffer and queues one ring notification per read,
//! with the read size as the length hint. The engine then sees the same
//! surface a cellular modem offers: non-blocking notifications and bounded
//! reads. Writes go straight to the stream.
//!
//! TLS is not handled here; point the host at a plain HTTP endpoint or a
//! local TLS-terminating proxy.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use gemlink_core::reader::MAX_RECEIVE;
use gemlink_core::transport::{
    ReceiveError, RingNotification, SocketHandle, SocketState, SocketStatus, Transport,
    TransportError,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Default)]
struct Inbox {
    buffer: VecDeque<u8>,
    notifications: VecDeque<RingNotification>,
    connected: bool,
}

type SharedInbox = Arc<Mutex<Inbox>>;

fn lock(inbox: &SharedInbox) -> MutexGuard<'_, Inbox> {
    inbox.lock().unwrap_or_else(PoisonError::into_inner)
}

struct Socket {
    writer: OwnedWriteHalf,
    inbox: SharedInbox,
    reader: JoinHandle<()>,
}

/// TCP-backed modem socket emulation.
pub struct TcpTransport {
    sockets: HashMap<SocketHandle, Socket>,
    next_id: u32,
    connect_timeout: Duration,
}

impl Default for TcpTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl TcpTransport {
    pub fn new() -> Self {
        Self {
            sockets: HashMap::new(),
            next_id: 1,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Number of sockets currently open.
    pub fn open_sockets(&self) -> usize {
        self.sockets.len()
    }
}

async fn read_loop(mut stream: tokio::net::tcp::OwnedReadHalf, inbox: SharedInbox) {
    let mut chunk = [0u8; MAX_RECEIVE];
    loop {
        match stream.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => {
                let mut inbox = lock(&inbox);
                inbox.buffer.extend(&chunk[..n]);
                inbox.notifications.push_back(RingNotification::with_length(n));
                trace!(n, buffered = inbox.buffer.len(), "ring");
            }
            Err(err) => {
                debug!(%err, "socket read failed");
                break;
            }
        }
    }
    lock(&inbox).connected = false;
}

#[async_trait]
impl Transport for TcpTransport {
    async fn open(&mut self, host: &str, port: u16) -> Result<SocketHandle, TransportError> {
        let stream = tokio::time::timeout(self.connect_timeout, TcpStream::connect((host, port)))
            .await
            .map_err(|_| TransportError::Open(format!("connect to {host}:{port} timed out")))?
            .map_err(|err| TransportError::Open(err.to_string()))?;
        // Best effort: small request chunks should not wait on Nagle.
        let _ = stream.set_nodelay(true);

        let (read_half, writer) = stream.into_split();
        let inbox = Arc::new(Mutex::new(Inbox {
            connected: true,
            ..Inbox::default()
        }));
        let reader = tokio::spawn(read_loop(read_half, Arc::clone(&inbox)));

        let handle = SocketHandle(self.next_id);
        self.next_id = self.next_id.wrapping_add(1);
        self.sockets.insert(handle, Socket {
            writer,
            inbox,
            reader,
        });
        debug!(%handle, host, port, "tcp socket open");
        Ok(handle)
    }

    async fn send(&mut self, handle: SocketHandle, bytes: &[u8]) -> bool {
        let Some(socket) = self.sockets.get_mut(&handle) else {
            return false;
        };
        match socket.writer.write_all(bytes).await {
            Ok(()) => true,
            Err(err) => {
                debug!(%handle, %err, "tcp write failed");
                false
            }
        }
    }

    async fn close(&mut self, handle: SocketHandle) {
        if let Some(mut socket) = self.sockets.remove(&handle) {
            let _ = socket.writer.shutdown().await;
            socket.reader.abort();
            debug!(%handle, "tcp socket closed");
        }
    }

    fn next_notification(&mut self, handle: SocketHandle) -> Option<RingNotification> {
        let socket = self.sockets.get(&handle)?;
        lock(&socket.inbox).notifications.pop_front()
    }

    async fn receive(
        &mut self,
        handle: SocketHandle,
        max_len: usize,
    ) -> Result<Vec<u8>, ReceiveError> {
        let socket = self.sockets.get(&handle).ok_or(ReceiveError::Closed)?;
        let mut inbox = lock(&socket.inbox);
        if inbox.buffer.is_empty() && !inbox.connected {
            return Err(ReceiveError::Closed);
        }
        let take = max_len.min(inbox.buffer.len());
        Ok(inbox.buffer.drain(..take).collect())
    }

    async fn status(&mut self, handle: SocketHandle) -> Result<SocketStatus, TransportError> {
        let socket = self
            .sockets
            .get(&handle)
            .ok_or(TransportError::UnknownSocket(handle))?;
        let connected = lock(&socket.inbox).connected;
        Ok(SocketStatus {
            connected,
            state: if connected {
                SocketState::Connected
            } else {
                SocketState::Closed
            },
        })
    }
}

impl Drop for TcpTransport {
    fn drop(&mut self) {
        for socket in self.sockets.values() {
            socket.reader.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn rings_and_reads_peer_bytes() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let peer = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut request = [0u8; 4];
            stream.read_exact(&mut request).await.unwrap();
            stream.write_all(b"pong").await.unwrap();
        });

        let mut transport = TcpTransport::new();
        let handle = transport.open("127.0.0.1", port).await.unwrap();
        assert!(transport.send(handle, b"ping").await);
        peer.await.unwrap();

        let mut received = Vec::new();
        for _ in 0..100 {
            if let Some(n) = transport.next_notification(handle) {
                let hint = n.length.unwrap_or(MAX_RECEIVE);
                received.extend(transport.receive(handle, hint).await.unwrap());
            }
            if received.len() == 4 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(received, b"pong");

        let mut closed = false;
        for _ in 0..100 {
            if transport.status(handle).await.unwrap().is_closed() {
                closed = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(closed, "peer hang-up should be reported");

        transport.close(handle).await;
        assert_eq!(transport.open_sockets(), 0);
        assert!(transport.status(handle).await.is_err());
        assert!(!transport.send(handle, b"late").await);
    }

    #[tokio::test]
    async fn refused_connection_is_open_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let mut transport = TcpTransport::new();
        let err = transport.open("127.0.0.1", port).await.unwrap_err();
        assert!(matches!(err, TransportError::Open(_)));
    }
}
