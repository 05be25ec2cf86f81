//! Drives one request/response exchange over a [`Transport`].
//!
//! # Design
//! One exchange owns one socket handle and one [`CompletionDetector`]; nothing
//! is shared between exchanges, so no locking is needed. The loop has two
//! suspension points, the pacing delay inside the transmitter and the poll
//! interval here, both of which are `tokio::time::sleep` and yield to other
//! tasks.
//!
//! The socket is closed exactly once on every path: the drive step returns
//! its result by value and the close happens before that result is handed
//! back.

use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::completion::{CompletionDetector, Verdict};
use crate::error::ExchangeError;
use crate::http::HttpRequest;
use crate::options::ExchangeOptions;
use crate::reader;
use crate::transmit;
use crate::transport::{SocketHandle, Transport};

/// A completed exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeOutput {
    pub payload: String,
    /// Wall-clock time from the first byte sent to completion.
    pub latency: Duration,
}

impl ExchangeOutput {
    pub fn latency_ms(&self) -> i64 {
        i64::try_from(self.latency.as_millis()).unwrap_or(i64::MAX)
    }
}

/// Runs exchanges against one remote endpoint.
pub struct Exchange<'a, T: Transport + ?Sized> {
    transport: &'a mut T,
    host: String,
    port: u16,
}

impl<'a, T: Transport + ?Sized> Exchange<'a, T> {
    pub fn new(transport: &'a mut T, host: &str, port: u16) -> Self {
        Self {
            transport,
            host: host.to_string(),
            port,
        }
    }

    /// Open a socket, send `request`, collect and parse the response, close.
    pub async fn run(
        &mut self,
        request: &HttpRequest,
        options: &ExchangeOptions,
    ) -> Result<ExchangeOutput, ExchangeError> {
        let span = info_span!("exchange", id = %Uuid::new_v4(), host = %self.host);
        async {
            let handle = self
                .transport
                .open(&self.host, self.port)
                .await
                .map_err(|err| ExchangeError::Connect {
                    host: self.host.clone(),
                    port: self.port,
                    reason: err.to_string(),
                })?;
            debug!(%handle, "socket open");

            let result = self.drive(handle, request, options).await;
            self.transport.close(handle).await;

            match &result {
                Ok(output) => info!(latency_ms = output.latency_ms(), bytes = output.payload.len(), "exchange complete"),
                Err(err) => warn!(%err, "exchange failed"),
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn drive(
        &mut self,
        handle: SocketHandle,
        request: &HttpRequest,
        options: &ExchangeOptions,
    ) -> Result<ExchangeOutput, ExchangeError> {
        let started = Instant::now();
        let wire = request.to_bytes();
        transmit::send_chunked(&mut *self.transport, handle, &wire, &options.transmit).await?;

        tokio::time::sleep(options.settle_delay()).await;

        let mut detector = CompletionDetector::new(options.field, options.completion);
        let deadline = started + options.hard_timeout();

        loop {
            if Instant::now() >= deadline {
                debug!(received = detector.received(), "hard timeout reached");
                detector.expire();
                break;
            }

            let (verdict, pause) = match self.transport.next_notification(handle) {
                Some(notification) => {
                    match reader::poll(&mut *self.transport, handle, notification).await {
                        Some(bytes) => (detector.on_data(&bytes), options.busy_poll_interval()),
                        None => {
                            warn!(received = detector.received(), "read failed, counting an idle cycle");
                            (self.idle_cycle(handle, &mut detector).await, options.idle_poll_interval())
                        }
                    }
                }
                None => (self.idle_cycle(handle, &mut detector).await, options.idle_poll_interval()),
            };
            detector.record_elapsed(started.elapsed());

            match verdict {
                Verdict::Complete | Verdict::Abandon => break,
                Verdict::Pending | Verdict::ProbeStatus => tokio::time::sleep(pause).await,
            }
        }

        let latency = started.elapsed();
        detector
            .finish()
            .map(|payload| ExchangeOutput { payload, latency })
    }

    /// One poll cycle without new bytes, probing socket status on request.
    async fn idle_cycle(&mut self, handle: SocketHandle, detector: &mut CompletionDetector) -> Verdict {
        let verdict = detector.on_idle();
        if verdict != Verdict::ProbeStatus {
            return verdict;
        }
        match self.transport.status(handle).await {
            Ok(status) => detector.on_status(status),
            Err(err) => {
                debug!(%err, "status probe failed");
                Verdict::Pending
            }
        }
    }
}
