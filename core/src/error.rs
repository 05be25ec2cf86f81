//! Error types for the exchange engine.
//!
//! # Design
//! `ExchangeError` is what an exchange surfaces to its caller. Transport-level
//! problems are mapped into it at the orchestrator boundary so callers only
//! match on one enum. `ParseError` is narrower: it is what the extractor
//! reports for a given byte buffer, and it separates "not enough bytes yet"
//! (`Incomplete`) from outcomes that are final no matter how many more bytes
//! arrive (`Api`, `Malformed`).

use thiserror::Error;

/// Errors returned by an exchange.
#[derive(Debug, Error)]
pub enum ExchangeError {
    /// A chunk write failed mid-transmission. The exchange must be restarted.
    #[error("transport send failed at byte {offset}")]
    Send { offset: usize },

    /// The socket could not be opened.
    #[error("could not connect to {host}:{port}: {reason}")]
    Connect {
        host: String,
        port: u16,
        reason: String,
    },

    /// The network attachment collaborator reported it could not attach.
    #[error("network is not attached")]
    NotAttached,

    /// The wall-clock budget elapsed without a single byte being received.
    #[error("no response received before the timeout")]
    NoResponse,

    /// The upstream API returned a structured error.
    #[error("API error: {message}")]
    Api { message: String },

    /// The response was valid JSON but lacked the expected shape.
    #[error("malformed response: missing {missing_field}")]
    MalformedResponse { missing_field: String },

    /// Bytes were collected but never formed a parseable response.
    #[error("partial response ({received} bytes) could not be parsed")]
    PartialResponse { received: usize },

    /// The request body could not be serialized.
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The returned audio payload could not be decoded.
    #[error(transparent)]
    Audio(#[from] AudioError),
}

impl From<ParseError> for ExchangeError {
    fn from(err: ParseError) -> Self {
        match err {
            ParseError::Api { message } => ExchangeError::Api { message },
            ParseError::Malformed { missing_field } => {
                ExchangeError::MalformedResponse { missing_field }
            }
            ParseError::Incomplete { received, .. } => ExchangeError::PartialResponse { received },
        }
    }
}

/// Outcome of trying to extract the payload from a raw response buffer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// The buffer does not (yet) contain a complete JSON document.
    #[error("incomplete response after {received} bytes: {reason}")]
    Incomplete {
        reason: &'static str,
        received: usize,
    },

    /// The document carries an `error` object.
    #[error("API error: {message}")]
    Api { message: String },

    /// The document parsed but the expected field is absent.
    #[error("missing field {missing_field}")]
    Malformed { missing_field: String },
}

impl ParseError {
    /// True when more bytes cannot change this outcome.
    pub fn is_definitive(&self) -> bool {
        !matches!(self, ParseError::Incomplete { .. })
    }
}

/// Errors raised while loading or transcoding audio.
#[derive(Debug, Error)]
pub enum AudioError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid WAV: {0}")]
    Wav(String),

    #[error("invalid MP3: {0}")]
    Mp3(String),

    #[error("unsupported audio file: {0}")]
    Unsupported(String),

    #[error("base64 decode failed: {0}")]
    Base64(#[from] base64::DecodeError),
}

impl From<hound::Error> for AudioError {
    fn from(err: hound::Error) -> Self {
        AudioError::Wav(err.to_string())
    }
}
