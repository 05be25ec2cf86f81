//! Tunables for one exchange.
//!
//! # Design
//! One options record drives every exchange; the text and speech paths only
//! differ in the values loaded into it. All durations are stored as
//! milliseconds so the record maps one-to-one onto a TOML table, and every
//! field has a default so a config file may override a single knob.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::extract::FieldPath;

/// Largest chunk handed to `Transport::send` in one call.
pub const DEFAULT_CHUNK_SIZE: usize = 4096;

/// Thresholds for the idle heuristics of the completion detector, counted
/// in consecutive poll cycles without a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompletionThresholds {
    /// Attempt a parse once this many idle cycles have passed.
    pub idle_parse_after: u32,
    /// Give up waiting once the idle streak exceeds this many cycles.
    pub idle_ceiling: u32,
    /// Query socket status once the idle streak exceeds this many cycles.
    pub status_probe_after: Option<u32>,
}

impl Default for CompletionThresholds {
    fn default() -> Self {
        Self {
            idle_parse_after: 3,
            idle_ceiling: 15,
            status_probe_after: None,
        }
    }
}

/// Outbound pacing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransmitOptions {
    pub chunk_size: usize,
    pub inter_chunk_delay_ms: u64,
}

impl Default for TransmitOptions {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            inter_chunk_delay_ms: 5,
        }
    }
}

impl TransmitOptions {
    pub fn inter_chunk_delay(&self) -> Duration {
        Duration::from_millis(self.inter_chunk_delay_ms)
    }
}

/// Everything that parameterizes one exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExchangeOptions {
    #[serde(flatten)]
    pub transmit: TransmitOptions,
    /// Pause between the last chunk and the first poll.
    pub settle_delay_ms: u64,
    /// Pause after a poll cycle that delivered a notification.
    pub busy_poll_interval_ms: u64,
    /// Pause after a poll cycle that found the queue empty.
    pub idle_poll_interval_ms: u64,
    /// Absolute wall-clock budget for the receive phase.
    pub hard_timeout_ms: u64,
    pub completion: CompletionThresholds,
    pub field: FieldPath,
}

impl Default for ExchangeOptions {
    fn default() -> Self {
        Self::text()
    }
}

impl ExchangeOptions {
    /// Small text answers: slow polling, quick idle give-up.
    pub fn text() -> Self {
        Self {
            transmit: TransmitOptions::default(),
            settle_delay_ms: 500,
            busy_poll_interval_ms: 500,
            idle_poll_interval_ms: 500,
            hard_timeout_ms: 60_000,
            completion: CompletionThresholds::default(),
            field: FieldPath::Text,
        }
    }

    /// Large base64 audio answers: fast polling, long idle tolerance and a
    /// socket status probe when notifications stall. The idle parse waits
    /// longer than the probe so a closed socket decides first.
    pub fn speech() -> Self {
        Self {
            transmit: TransmitOptions::default(),
            settle_delay_ms: 500,
            busy_poll_interval_ms: 10,
            idle_poll_interval_ms: 100,
            hard_timeout_ms: 500_000,
            completion: CompletionThresholds {
                idle_parse_after: 30,
                idle_ceiling: 300,
                status_probe_after: Some(5),
            },
            field: FieldPath::InlineData,
        }
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn busy_poll_interval(&self) -> Duration {
        Duration::from_millis(self.busy_poll_interval_ms)
    }

    pub fn idle_poll_interval(&self) -> Duration {
        Duration::from_millis(self.idle_poll_interval_ms)
    }

    pub fn hard_timeout(&self) -> Duration {
        Duration::from_millis(self.hard_timeout_ms)
    }
}
