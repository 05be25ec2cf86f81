//! Turns one ring notification into bytes.

use tracing::{debug, warn};

use crate::transport::{ReceiveError, RingNotification, SocketHandle, Transport};

/// Largest single read the modem socket accepts.
pub const MAX_RECEIVE: usize = 1500;

/// Read the bytes announced by one dequeued notification.
///
/// Performs at most one `receive` of `min(hint or MAX_RECEIVE, MAX_RECEIVE)`
/// bytes. When the read comes back empty, or the transport flags the hint
/// as stale, bytes carried on the notification itself are used instead.
///
/// Returns `Some(bytes)` (possibly empty) or `None` when the read failed
/// and the notification carried nothing to fall back on.
pub async fn poll<T: Transport + ?Sized>(
    transport: &mut T,
    handle: SocketHandle,
    notification: RingNotification,
) -> Option<Vec<u8>> {
    let hint = notification.length.filter(|&n| n > 0).unwrap_or(MAX_RECEIVE);
    let max_len = hint.min(MAX_RECEIVE);

    match transport.receive(handle, max_len).await {
        Ok(bytes) if !bytes.is_empty() => Some(bytes),
        Ok(_) => Some(notification.data.unwrap_or_default()),
        Err(ReceiveError::StaleHint) => {
            debug!(hint = ?notification.length, "stale length hint, using notification bytes");
            Some(notification.data.unwrap_or_default())
        }
        Err(err) => {
            warn!(%err, "receive failed");
            notification.data
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{SocketStatus, TransportError};
    use async_trait::async_trait;

    /// Answers every receive with a fixed result and records the requested size.
    struct FixedTransport {
        result: Result<Vec<u8>, ReceiveError>,
        requested: Vec<usize>,
    }

    impl FixedTransport {
        fn new(result: Result<Vec<u8>, ReceiveError>) -> Self {
            Self {
                result,
                requested: Vec::new(),
            }
        }
    }

    #[async_trait]
    impl Transport for FixedTransport {
        async fn open(&mut self, _host: &str, _port: u16) -> Result<SocketHandle, TransportError> {
            Ok(SocketHandle(0))
        }

        async fn send(&mut self, _handle: SocketHandle, _bytes: &[u8]) -> bool {
            true
        }

        async fn close(&mut self, _handle: SocketHandle) {}

        fn next_notification(&mut self, _handle: SocketHandle) -> Option<RingNotification> {
            None
        }

        async fn receive(&mut self, _handle: SocketHandle, max_len: usize) -> Result<Vec<u8>, ReceiveError> {
            self.requested.push(max_len);
            self.result.clone()
        }

        async fn status(&mut self, handle: SocketHandle) -> Result<SocketStatus, TransportError> {
            Err(TransportError::UnknownSocket(handle))
        }
    }

    fn ring(length: Option<usize>, data: Option<&[u8]>) -> RingNotification {
        RingNotification {
            length,
            data: data.map(<[u8]>::to_vec),
        }
    }

    #[tokio::test]
    async fn read_size_is_capped_at_max_receive() {
        let mut t = FixedTransport::new(Ok(b"abc".to_vec()));
        let h = SocketHandle(0);
        assert_eq!(poll(&mut t, h, ring(Some(4000), None)).await, Some(b"abc".to_vec()));
        poll(&mut t, h, ring(Some(200), None)).await;
        poll(&mut t, h, ring(None, None)).await;
        poll(&mut t, h, ring(Some(0), None)).await;
        assert_eq!(t.requested, vec![1500, 200, 1500, 1500]);
    }

    #[tokio::test]
    async fn stale_hint_falls_back_to_inline_bytes() {
        let mut t = FixedTransport::new(Err(ReceiveError::StaleHint));
        let got = poll(&mut t, SocketHandle(0), ring(Some(9), Some(b"inline"))).await;
        assert_eq!(got, Some(b"inline".to_vec()));

        let got = poll(&mut t, SocketHandle(0), ring(Some(9), None)).await;
        assert_eq!(got, Some(Vec::new()));
    }

    #[tokio::test]
    async fn empty_read_uses_inline_bytes() {
        let mut t = FixedTransport::new(Ok(Vec::new()));
        let got = poll(&mut t, SocketHandle(0), ring(Some(3), Some(b"xyz"))).await;
        assert_eq!(got, Some(b"xyz".to_vec()));
    }

    #[tokio::test]
    async fn hard_failure_without_inline_bytes_is_none() {
        let mut t = FixedTransport::new(Err(ReceiveError::Other("modem reset".into())));
        assert_eq!(poll(&mut t, SocketHandle(0), ring(Some(3), None)).await, None);
        let got = poll(&mut t, SocketHandle(0), ring(Some(3), Some(b"ok"))).await;
        assert_eq!(got, Some(b"ok".to_vec()));
    }
}
