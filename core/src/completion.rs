//! Decides when an accumulating response is complete.
//!
//! # Design
//! The detector owns the response buffer of one exchange and is fed three
//! kinds of events: bytes from a notification ([`CompletionDetector::on_data`]),
//! a poll cycle with an empty queue ([`CompletionDetector::on_idle`]) and a
//! socket status answer ([`CompletionDetector::on_status`]). It performs no
//! I/O, so the async orchestrator and an FFI host drive the same machine.
//!
//! No single signal is trusted on its own. The terminal-chunk marker, a
//! satisfied `Content-Length`, an idle streak and a closed socket each only
//! trigger a parse attempt; the detector reaches [`Phase::Complete`] only
//! when that parse yields a definitive outcome.

use std::time::Duration;

use tracing::{debug, trace};

use crate::chunked::TERMINAL_CHUNK;
use crate::error::{ExchangeError, ParseError};
use crate::extract::{self, FieldPath};
use crate::http::{self, HEADER_TERMINATOR};
use crate::options::CompletionThresholds;
use crate::transport::SocketStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    AwaitingHeaders,
    AwaitingBody,
    /// A parse produced a definitive outcome (payload or API error).
    Complete,
    /// The wall-clock budget ran out before any byte arrived.
    TimedOut,
}

/// What the driver should do after feeding an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Keep polling.
    Pending,
    /// Ask the transport for socket status and feed it to `on_status`.
    ProbeStatus,
    /// Stop polling; `finish` will make a best-effort parse.
    Abandon,
    /// Stop polling; `finish` returns the definitive outcome.
    Complete,
}

/// Which event caused a parse attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    TerminalChunk,
    ContentLength,
    Idle,
    SocketClosed,
}

/// Per-exchange bookkeeping.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompletionState {
    /// Declared body length; `None` until parsed, or if absent.
    pub content_length: Option<usize>,
    /// Offset of the `\r\n\r\n` separator; `None` until it arrives.
    pub header_end: Option<usize>,
    /// Consecutive poll cycles without a notification.
    pub idle_polls: u32,
    pub elapsed: Duration,
}

#[derive(Debug)]
pub struct CompletionDetector {
    field: FieldPath,
    thresholds: CompletionThresholds,
    buffer: Vec<u8>,
    state: CompletionState,
    phase: Phase,
    scanned: usize,
    terminal_seen: bool,
    outcome: Option<Result<String, ParseError>>,
}

impl CompletionDetector {
    pub fn new(field: FieldPath, thresholds: CompletionThresholds) -> Self {
        Self {
            field,
            thresholds,
            buffer: Vec::new(),
            state: CompletionState::default(),
            phase: Phase::AwaitingHeaders,
            scanned: 0,
            terminal_seen: false,
            outcome: None,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn state(&self) -> &CompletionState {
        &self.state
    }

    pub fn received(&self) -> usize {
        self.buffer.len()
    }

    pub fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    /// Bytes after the head/body separator, if the head has arrived.
    pub fn body_received(&self) -> Option<usize> {
        self.state
            .header_end
            .map(|end| self.buffer.len().saturating_sub(end + HEADER_TERMINATOR.len()))
    }

    pub fn record_elapsed(&mut self, elapsed: Duration) {
        self.state.elapsed = elapsed;
    }

    /// Feed the bytes read for one notification. Only a non-empty read
    /// resets the idle streak.
    pub fn on_data(&mut self, bytes: &[u8]) -> Verdict {
        if self.is_finished() {
            return self.verdict();
        }
        if bytes.is_empty() {
            return Verdict::Pending;
        }

        self.buffer.extend_from_slice(bytes);
        self.state.idle_polls = 0;
        trace!(added = bytes.len(), total = self.buffer.len(), "response bytes");

        if self.state.header_end.is_none() {
            self.locate_head();
        }

        if !self.terminal_seen {
            let from = self.scanned.saturating_sub(TERMINAL_CHUNK.len() - 1);
            self.terminal_seen = http::find(&self.buffer[from..], TERMINAL_CHUNK).is_some();
            self.scanned = self.buffer.len();
        }
        if self.terminal_seen && self.attempt(Signal::TerminalChunk) {
            return Verdict::Complete;
        }

        let length_satisfied = matches!(
            (self.state.content_length, self.body_received()),
            (Some(declared), Some(received)) if received >= declared
        );
        if length_satisfied && self.attempt(Signal::ContentLength) {
            return Verdict::Complete;
        }

        Verdict::Pending
    }

    /// Record a poll cycle that found no notification.
    pub fn on_idle(&mut self) -> Verdict {
        if self.is_finished() {
            return self.verdict();
        }

        self.state.idle_polls += 1;
        if self.buffer.is_empty() {
            return Verdict::Pending;
        }

        let idle = self.state.idle_polls;
        if idle >= self.thresholds.idle_parse_after && self.attempt(Signal::Idle) {
            return Verdict::Complete;
        }
        if idle > self.thresholds.idle_ceiling {
            debug!(idle, received = self.buffer.len(), "idle ceiling exceeded, abandoning");
            return Verdict::Abandon;
        }
        if self
            .thresholds
            .status_probe_after
            .is_some_and(|after| idle > after)
        {
            return Verdict::ProbeStatus;
        }
        Verdict::Pending
    }

    /// Feed the answer to a status probe.
    pub fn on_status(&mut self, status: SocketStatus) -> Verdict {
        if self.is_finished() {
            return self.verdict();
        }
        debug!(?status, "socket status");
        if status.is_closed() && self.attempt(Signal::SocketClosed) {
            return Verdict::Complete;
        }
        Verdict::Pending
    }

    /// The wall-clock budget ran out. Moves to `TimedOut` if nothing was
    /// ever received; otherwise the phase is left for `finish` to resolve.
    pub fn expire(&mut self) {
        if !self.is_finished() && self.buffer.is_empty() {
            self.phase = Phase::TimedOut;
        }
    }

    /// Resolve the exchange: the definitive outcome if one was reached,
    /// otherwise a best-effort parse of whatever was collected.
    pub fn finish(self) -> Result<String, ExchangeError> {
        if let Some(outcome) = self.outcome {
            return outcome.map_err(ExchangeError::from);
        }
        if self.buffer.is_empty() {
            return Err(ExchangeError::NoResponse);
        }
        debug!(received = self.buffer.len(), "best-effort parse of collected bytes");
        extract::extract(&self.buffer, self.field).map_err(ExchangeError::from)
    }

    fn is_finished(&self) -> bool {
        matches!(self.phase, Phase::Complete | Phase::TimedOut)
    }

    fn verdict(&self) -> Verdict {
        match self.phase {
            Phase::Complete => Verdict::Complete,
            Phase::TimedOut => Verdict::Abandon,
            Phase::AwaitingHeaders | Phase::AwaitingBody => Verdict::Pending,
        }
    }

    fn locate_head(&mut self) {
        let Some(end) = http::find_header_end(&self.buffer) else {
            return;
        };
        let head = &self.buffer[..end];
        self.state.header_end = Some(end);
        self.state.content_length = http::content_length(head);
        self.phase = Phase::AwaitingBody;
        debug!(
            header_end = end,
            content_length = ?self.state.content_length,
            status = ?http::status_code(head),
            "response head received"
        );
    }

    /// Try to parse; true when the outcome is definitive.
    fn attempt(&mut self, signal: Signal) -> bool {
        match extract::extract(&self.buffer, self.field) {
            Err(err) if !err.is_definitive() => {
                trace!(?signal, %err, "signal fired but response not parseable yet");
                false
            }
            outcome => {
                debug!(?signal, ok = outcome.is_ok(), received = self.buffer.len(), "response complete");
                self.outcome = Some(outcome);
                self.phase = Phase::Complete;
                true
            }
        }
    }
}
