//! Streaming request/response engine for `generateContent` over a
//! constrained modem socket.
//!
//! # Overview
//! Requests are built as plain data (`GeminiClient`), pushed through a
//! [`Transport`] in paced chunks, and the response is reassembled from ring
//! notifications and bounded reads until a [`CompletionDetector`] declares it
//! complete. The payload is then pulled out of the JSON body; speech payloads
//! are base64 PCM and get wrapped as WAV.
//!
//! # Design
//! - The transport is always passed in explicitly; the engine holds no
//!   global socket or modem state.
//! - The completion detector is sans-IO: it consumes bytes, idle ticks and
//!   status answers. The async [`Exchange`] drives it for Rust callers and the
//!   FFI crate exposes it to firmware that runs its own modem loop.
//! - One [`ExchangeOptions`] record parameterizes both the text and the
//!   speech path.

pub mod audio;
pub mod chunked;
pub mod client;
pub mod completion;
pub mod error;
pub mod exchange;
pub mod extract;
pub mod http;
pub mod options;
pub mod reader;
pub mod session;
pub mod transmit;
pub mod transport;
pub mod types;
pub mod wav;

pub use audio::{decode_pcm_to_wav, AudioClip};
pub use client::GeminiClient;
pub use completion::{CompletionDetector, CompletionState, Phase, Verdict};
pub use error::{AudioError, ExchangeError, ParseError};
pub use exchange::{Exchange, ExchangeOutput};
pub use extract::{extract, FieldPath};
pub use http::HttpRequest;
pub use options::{CompletionThresholds, ExchangeOptions, TransmitOptions};
pub use session::{GeminiSession, SpeechOutput};
pub use transport::{
    ReceiveError, RingNotification, SocketHandle, SocketState, SocketStatus, Transport,
    TransportError,
};
pub use wav::{to_wav, PcmFormat};
