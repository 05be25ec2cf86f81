//! A [`Transport`] that replays a timed script of response bytes.
//!
//! # Design
//! Deliveries are scheduled relative to the moment the socket is opened and
//! are released lazily, when the engine next asks for a notification. Time
//! comes from `tokio::time`, so tests running on a paused clock see the same
//! schedule without waiting for real time.
//!
//! A delivery larger than one modem read is split into several
//! notifications, the way a modem raises one ring per received segment.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use gemlink_core::reader::MAX_RECEIVE;
use gemlink_core::transport::{
    ReceiveError, RingNotification, SocketHandle, SocketState, SocketStatus, Transport,
    TransportError,
};
use tokio::time::Instant;

/// How released bytes reach the reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeliveryMode {
    /// Notifications carry a correct length hint; bytes come from `receive`.
    #[default]
    Read,
    /// Notifications carry the bytes and a wrong hint; `receive` reports
    /// the hint as stale.
    StaleHint,
    /// Notifications carry the bytes; `receive` returns nothing.
    Inline,
}

#[derive(Debug, Clone)]
struct Delivery {
    at: Duration,
    bytes: Vec<u8>,
}

/// Scripted modem socket.
#[derive(Debug)]
pub struct ScriptedTransport {
    script: Vec<Delivery>,
    mode: DeliveryMode,
    close_after_delivery: bool,
    refuse_open: bool,
    fail_send_at: Option<usize>,
    fail_receive_from: Option<usize>,
    attached: bool,
    attach_succeeds: bool,

    handle: Option<SocketHandle>,
    next_handle: u32,
    opened_at: Option<Instant>,
    released: usize,
    notifications: VecDeque<RingNotification>,
    ready: VecDeque<u8>,

    opens: usize,
    closes: usize,
    send_calls: usize,
    receive_calls: usize,
    status_probes: usize,
    sent: Vec<u8>,
}

impl Default for ScriptedTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedTransport {
    /// A transport that accepts everything and never answers.
    pub fn new() -> Self {
        Self {
            script: Vec::new(),
            mode: DeliveryMode::Read,
            close_after_delivery: true,
            refuse_open: false,
            fail_send_at: None,
            fail_receive_from: None,
            attached: true,
            attach_succeeds: true,
            handle: None,
            next_handle: 1,
            opened_at: None,
            released: 0,
            notifications: VecDeque::new(),
            ready: VecDeque::new(),
            opens: 0,
            closes: 0,
            send_calls: 0,
            receive_calls: 0,
            status_probes: 0,
            sent: Vec::new(),
        }
    }

    /// Release `bytes` `after` the previous delivery (or the open, for the
    /// first one).
    pub fn deliver_after(mut self, after: Duration, bytes: impl Into<Vec<u8>>) -> Self {
        let base = self.script.last().map(|d| d.at).unwrap_or_default();
        self.script.push(Delivery {
            at: base + after,
            bytes: bytes.into(),
        });
        self
    }

    /// Release `bytes` as soon as the engine looks.
    pub fn deliver(self, bytes: impl Into<Vec<u8>>) -> Self {
        self.deliver_after(Duration::ZERO, bytes)
    }

    /// Split `bytes` at `cuts` and release each piece `gap` after the last.
    pub fn deliver_split(mut self, bytes: &[u8], cuts: &[usize], gap: Duration) -> Self {
        let mut start = 0;
        for &cut in cuts.iter().chain(std::iter::once(&bytes.len())) {
            let end = cut.clamp(start, bytes.len());
            self = self.deliver_after(gap, bytes[start..end].to_vec());
            start = end;
        }
        self
    }

    pub fn mode(mut self, mode: DeliveryMode) -> Self {
        self.mode = mode;
        self
    }

    /// Keep reporting the socket as connected after the script runs out.
    pub fn keep_open(mut self) -> Self {
        self.close_after_delivery = false;
        self
    }

    pub fn refuse_open(mut self) -> Self {
        self.refuse_open = true;
        self
    }

    /// Make the `n`th send call (zero-based) report failure.
    pub fn fail_send_at(mut self, n: usize) -> Self {
        self.fail_send_at = Some(n);
        self
    }

    /// Make every receive call from the `n`th (zero-based) on fail.
    pub fn fail_receive_from(mut self, n: usize) -> Self {
        self.fail_receive_from = Some(n);
        self
    }

    /// Start detached; `attach` brings the link up when `succeeds`.
    pub fn detached(mut self, succeeds: bool) -> Self {
        self.attached = false;
        self.attach_succeeds = succeeds;
        self
    }

    pub fn opens(&self) -> usize {
        self.opens
    }

    pub fn closes(&self) -> usize {
        self.closes
    }

    pub fn send_calls(&self) -> usize {
        self.send_calls
    }

    pub fn receive_calls(&self) -> usize {
        self.receive_calls
    }

    pub fn status_probes(&self) -> usize {
        self.status_probes
    }

    /// Every byte handed to `send`, in order.
    pub fn sent(&self) -> &[u8] {
        &self.sent
    }

    fn check(&self, handle: SocketHandle) -> Result<(), TransportError> {
        match self.handle {
            Some(open) if open == handle => Ok(()),
            _ => Err(TransportError::UnknownSocket(handle)),
        }
    }

    fn release_due(&mut self) {
        let Some(opened_at) = self.opened_at else {
            return;
        };
        let elapsed = opened_at.elapsed();
        while let Some(delivery) = self.script.get(self.released) {
            if delivery.at > elapsed {
                break;
            }
            for piece in delivery.bytes.chunks(MAX_RECEIVE) {
                let notification = match self.mode {
                    DeliveryMode::Read => {
                        self.ready.extend(piece);
                        RingNotification::with_length(piece.len())
                    }
                    DeliveryMode::StaleHint => RingNotification {
                        length: Some(piece.len() + 7),
                        data: Some(piece.to_vec()),
                    },
                    DeliveryMode::Inline => RingNotification {
                        length: None,
                        data: Some(piece.to_vec()),
                    },
                };
                self.notifications.push_back(notification);
            }
            self.released += 1;
        }
    }

    fn drained(&self) -> bool {
        !self.script.is_empty()
            && self.released == self.script.len()
            && self.notifications.is_empty()
            && self.ready.is_empty()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn attach(&mut self) -> bool {
        self.attached = self.attach_succeeds;
        self.attached
    }

    fn is_attached(&self) -> bool {
        self.attached
    }

    async fn open(&mut self, host: &str, port: u16) -> Result<SocketHandle, TransportError> {
        if self.refuse_open {
            return Err(TransportError::Open(format!("{host}:{port} refused")));
        }
        let handle = SocketHandle(self.next_handle);
        self.next_handle += 1;
        self.handle = Some(handle);
        self.opened_at = Some(Instant::now());
        self.released = 0;
        self.notifications.clear();
        self.ready.clear();
        self.opens += 1;
        Ok(handle)
    }

    async fn send(&mut self, handle: SocketHandle, bytes: &[u8]) -> bool {
        let call = self.send_calls;
        self.send_calls += 1;
        if self.check(handle).is_err() || self.fail_send_at == Some(call) {
            return false;
        }
        self.sent.extend_from_slice(bytes);
        true
    }

    async fn close(&mut self, handle: SocketHandle) {
        if self.check(handle).is_ok() {
            self.handle = None;
        }
        self.closes += 1;
    }

    fn next_notification(&mut self, handle: SocketHandle) -> Option<RingNotification> {
        self.check(handle).ok()?;
        self.release_due();
        self.notifications.pop_front()
    }

    async fn receive(
        &mut self,
        handle: SocketHandle,
        max_len: usize,
    ) -> Result<Vec<u8>, ReceiveError> {
        self.check(handle).map_err(|_| ReceiveError::Closed)?;
        let call = self.receive_calls;
        self.receive_calls += 1;
        if self.fail_receive_from.is_some_and(|n| call >= n) {
            return Err(ReceiveError::Other("scripted read failure".to_string()));
        }
        match self.mode {
            DeliveryMode::Read => {
                let take = max_len.min(self.ready.len());
                Ok(self.ready.drain(..take).collect())
            }
            DeliveryMode::StaleHint => Err(ReceiveError::StaleHint),
            DeliveryMode::Inline => Ok(Vec::new()),
        }
    }

    async fn status(&mut self, handle: SocketHandle) -> Result<SocketStatus, TransportError> {
        self.check(handle)?;
        self.status_probes += 1;
        self.release_due();
        let closed = self.close_after_delivery && self.drained();
        Ok(SocketStatus {
            connected: !closed,
            state: if closed {
                SocketState::Closed
            } else {
                SocketState::Connected
            },
        })
    }
}

/// A `200 OK` response with a `Content-Length` body.
pub fn http_response(body: &str) -> Vec<u8> {
    format!(
        "HTTP/1.1 200 OK\r\nContent-Type: application/json; charset=UTF-8\r\nContent-Length: {}\r\n\r\n{body}",
        body.len()
    )
    .into_bytes()
}

/// A `200 OK` response with the body cut into chunks at `cuts`.
pub fn chunked_response(body: &str, cuts: &[usize]) -> Vec<u8> {
    let mut out = b"HTTP/1.1 200 OK\r\nContent-Type: application/json; charset=UTF-8\r\nTransfer-Encoding: chunked\r\n\r\n".to_vec();
    let bytes = body.as_bytes();
    let mut start = 0;
    for &cut in cuts.iter().chain(std::iter::once(&bytes.len())) {
        let end = cut.clamp(start, bytes.len());
        if end > start {
            out.extend_from_slice(format!("{:x}\r\n", end - start).as_bytes());
            out.extend_from_slice(&bytes[start..end]);
            out.extend_from_slice(b"\r\n");
        }
        start = end;
    }
    out.extend_from_slice(b"0\r\n\r\n");
    out
}

/// A `generateContent` body with one text candidate.
pub fn text_body(text: &str) -> String {
    serde_json::json!({
        "candidates": [{"content": {"parts": [{"text": text}], "role": "model"}}]
    })
    .to_string()
}

/// A `generateContent` body with one inline audio candidate.
pub fn audio_body(pcm_b64: &str) -> String {
    serde_json::json!({
        "candidates": [{"content": {"parts": [{"inlineData": {
            "mimeType": "audio/L16;codec=pcm;rate=24000",
            "data": pcm_b64
        }}]}}]
    })
    .to_string()
}

pub fn error_body(message: &str) -> String {
    serde_json::json!({"error": {"code": 429, "message": message}}).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const H: SocketHandle = SocketHandle(1);

    #[tokio::test(start_paused = true)]
    async fn releases_on_schedule() {
        let mut transport = ScriptedTransport::new()
            .deliver_after(Duration::from_millis(100), "abc")
            .deliver_after(Duration::from_millis(100), "def");
        let handle = transport.open("h", 1).await.unwrap();
        assert_eq!(handle, H);
        assert!(transport.next_notification(H).is_none());

        tokio::time::sleep(Duration::from_millis(150)).await;
        let n = transport.next_notification(H).unwrap();
        assert_eq!(n.length, Some(3));
        assert_eq!(transport.receive(H, 1500).await.unwrap(), b"abc");
        assert!(transport.next_notification(H).is_none());

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(transport.next_notification(H).is_some());
        assert_eq!(transport.receive(H, 2).await.unwrap(), b"de");
        assert_eq!(transport.receive(H, 2).await.unwrap(), b"f");
    }

    #[tokio::test(start_paused = true)]
    async fn large_delivery_raises_several_rings() {
        let mut transport = ScriptedTransport::new().deliver(vec![b'x'; 4000]);
        transport.open("h", 1).await.unwrap();
        let lengths: Vec<_> = std::iter::from_fn(|| transport.next_notification(H))
            .map(|n| n.length)
            .collect();
        assert_eq!(lengths, vec![Some(1500), Some(1500), Some(1000)]);
    }

    #[tokio::test(start_paused = true)]
    async fn stale_and_inline_modes_carry_bytes() {
        let mut stale = ScriptedTransport::new().deliver("xyz").mode(DeliveryMode::StaleHint);
        stale.open("h", 1).await.unwrap();
        let n = stale.next_notification(H).unwrap();
        assert_eq!(n.data.as_deref(), Some(&b"xyz"[..]));
        assert_eq!(stale.receive(H, 10).await, Err(ReceiveError::StaleHint));

        let mut inline = ScriptedTransport::new().deliver("xyz").mode(DeliveryMode::Inline);
        inline.open("h", 1).await.unwrap();
        assert!(inline.next_notification(H).unwrap().data.is_some());
        assert_eq!(inline.receive(H, 10).await.unwrap(), Vec::<u8>::new());
    }

    #[tokio::test(start_paused = true)]
    async fn receive_fails_from_configured_call() {
        let mut transport = ScriptedTransport::new()
            .deliver("ab")
            .deliver("cd")
            .fail_receive_from(1);
        transport.open("h", 1).await.unwrap();
        transport.next_notification(H);
        assert_eq!(transport.receive(H, 1).await.unwrap(), b"a");
        assert!(matches!(transport.receive(H, 1).await, Err(ReceiveError::Other(_))));
        assert!(matches!(transport.receive(H, 1).await, Err(ReceiveError::Other(_))));
        assert_eq!(transport.receive_calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn status_closes_once_drained() {
        let mut transport = ScriptedTransport::new().deliver("ab");
        transport.open("h", 1).await.unwrap();
        assert!(!transport.status(H).await.unwrap().is_closed());
        transport.next_notification(H);
        transport.receive(H, 10).await.unwrap();
        assert!(transport.status(H).await.unwrap().is_closed());
        assert_eq!(transport.status_probes(), 2);

        let mut open = ScriptedTransport::new().deliver("ab").keep_open();
        open.open("h", 1).await.unwrap();
        open.next_notification(H);
        open.receive(H, 10).await.unwrap();
        assert!(!open.status(H).await.unwrap().is_closed());
    }

    #[tokio::test]
    async fn send_failure_and_bookkeeping() {
        let mut transport = ScriptedTransport::new().fail_send_at(1);
        transport.open("h", 1).await.unwrap();
        assert!(transport.send(H, b"one").await);
        assert!(!transport.send(H, b"two").await);
        transport.close(H).await;
        assert_eq!(transport.sent(), b"one");
        assert_eq!(transport.send_calls(), 2);
        assert_eq!((transport.opens(), transport.closes()), (1, 1));
        assert!(transport.status(H).await.is_err());
    }

    #[test]
    fn chunked_response_frames_body() {
        let wire = chunked_response("hello world", &[5]);
        let text = String::from_utf8(wire).unwrap();
        assert!(text.ends_with("5\r\nhello\r\n6\r\n world\r\n0\r\n\r\n"));
    }

    #[test]
    fn http_response_declares_length() {
        let text = String::from_utf8(http_response("{}")).unwrap();
        assert!(text.contains("Content-Length: 2\r\n\r\n{}"));
    }
}
