//! Paced, chunked transmission of one request.

use tracing::{debug, warn};

use crate::error::ExchangeError;
use crate::options::TransmitOptions;
use crate::transport::{SocketHandle, Transport};

/// Progress is logged each time this many more bytes have gone out.
const PROGRESS_EVERY: usize = 40_000;

/// Send `payload` in chunks of at most `chunk_size` bytes, pausing
/// `inter_chunk_delay` after each chunk.
///
/// The first failed chunk aborts the whole send with
/// [`ExchangeError::Send`] carrying that chunk's offset; nothing is retried.
pub async fn send_chunked<T: Transport + ?Sized>(
    transport: &mut T,
    handle: SocketHandle,
    payload: &[u8],
    options: &TransmitOptions,
) -> Result<(), ExchangeError> {
    let chunk_size = options.chunk_size.max(1);
    let delay = options.inter_chunk_delay();
    let total = payload.len();
    debug!(total, chunk_size, delay_ms = options.inter_chunk_delay_ms, "sending request");

    let mut next_report = PROGRESS_EVERY;
    for (index, chunk) in payload.chunks(chunk_size).enumerate() {
        let offset = index * chunk_size;
        if !transport.send(handle, chunk).await {
            warn!(offset, total, "send failed");
            return Err(ExchangeError::Send { offset });
        }

        let sent = offset + chunk.len();
        if sent >= next_report && sent < total {
            debug!(sent, total, pct = sent * 100 / total, "send progress");
            next_report += PROGRESS_EVERY;
        }

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }

    debug!(total, "request sent");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{ReceiveError, RingNotification, SocketStatus, TransportError};
    use async_trait::async_trait;

    /// Records every chunk; fails the send at `fail_at` (chunk index).
    #[derive(Default)]
    struct RecordingTransport {
        chunks: Vec<Vec<u8>>,
        fail_at: Option<usize>,
    }

    #[async_trait]
    impl Transport for RecordingTransport {
        async fn open(&mut self, _host: &str, _port: u16) -> Result<SocketHandle, TransportError> {
            Ok(SocketHandle(1))
        }

        async fn send(&mut self, _handle: SocketHandle, bytes: &[u8]) -> bool {
            if self.fail_at == Some(self.chunks.len()) {
                return false;
            }
            self.chunks.push(bytes.to_vec());
            true
        }

        async fn close(&mut self, _handle: SocketHandle) {}

        fn next_notification(&mut self, _handle: SocketHandle) -> Option<RingNotification> {
            None
        }

        async fn receive(&mut self, _handle: SocketHandle, _max_len: usize) -> Result<Vec<u8>, ReceiveError> {
            Err(ReceiveError::Closed)
        }

        async fn status(&mut self, handle: SocketHandle) -> Result<SocketStatus, TransportError> {
            Err(TransportError::UnknownSocket(handle))
        }
    }

    fn opts(chunk_size: usize, delay_ms: u64) -> TransmitOptions {
        TransmitOptions {
            chunk_size,
            inter_chunk_delay_ms: delay_ms,
        }
    }

    #[tokio::test]
    async fn splits_into_bounded_chunks_in_order() {
        let mut transport = RecordingTransport::default();
        let payload: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();
        send_chunked(&mut transport, SocketHandle(1), &payload, &opts(4096, 0))
            .await
            .unwrap();

        let sizes: Vec<usize> = transport.chunks.iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![4096, 4096, 1808]);
        assert_eq!(transport.chunks.concat(), payload);
    }

    #[tokio::test]
    async fn failure_reports_chunk_offset_and_stops() {
        let mut transport = RecordingTransport {
            fail_at: Some(2),
            ..Default::default()
        };
        let payload = vec![0u8; 5000];
        let err = send_chunked(&mut transport, SocketHandle(1), &payload, &opts(1000, 0))
            .await
            .unwrap_err();
        assert!(matches!(err, ExchangeError::Send { offset: 2000 }));
        assert_eq!(transport.chunks.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn pacing_delay_applies_per_chunk() {
        let mut transport = RecordingTransport::default();
        let start = tokio::time::Instant::now();
        send_chunked(&mut transport, SocketHandle(1), &[7u8; 30], &opts(10, 5))
            .await
            .unwrap();
        assert_eq!(transport.chunks.len(), 3);
        assert!(start.elapsed() >= std::time::Duration::from_millis(15));
    }

    #[tokio::test]
    async fn empty_payload_sends_nothing() {
        let mut transport = RecordingTransport::default();
        send_chunked(&mut transport, SocketHandle(1), &[], &opts(4096, 0))
            .await
            .unwrap();
        assert!(transport.chunks.is_empty());
    }
}
