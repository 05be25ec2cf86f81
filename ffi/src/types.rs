//! `#[repr(C)]` types for the FFI boundary.
//!
//! # Design
//! Each type mirrors a core type with a C-compatible representation:
//! `*mut c_char` instead of `String`, pointer plus length instead of `Vec`,
//! and enums with explicit discriminants. Conversion functions live here to
//! keep `lib.rs` focused on the `extern "C"` surface.

use std::ffi::{c_void, CString};
use std::os::raw::c_char;

use gemlink_core::{
    CompletionDetector, ExchangeError, FieldPath, ParseError, SocketState, Verdict,
};

/// Opaque handle to a `GeminiClient`.
pub struct FfiClient {
    pub(crate) inner: gemlink_core::GeminiClient,
}

/// Opaque handle to a completion detector driven by the host's modem loop.
pub struct FfiDetector {
    pub(crate) inner: CompletionDetector,
}

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Which response field carries the payload.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FfiField {
    Text = 0,
    InlineData = 1,
}

impl From<FfiField> for FieldPath {
    fn from(field: FfiField) -> Self {
        match field {
            FfiField::Text => FieldPath::Text,
            FfiField::InlineData => FieldPath::InlineData,
        }
    }
}

/// What the host should do after feeding the detector.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FfiVerdict {
    /// Keep polling.
    Pending = 0,
    /// Query the socket status and pass it to `gl_detector_on_status`.
    ProbeStatus = 1,
    /// Stop polling; call `gl_detector_finish` for the best-effort result.
    Abandon = 2,
    /// Stop polling; call `gl_detector_finish`.
    Complete = 3,
    /// The detector pointer was null.
    Invalid = 4,
}

impl From<Verdict> for FfiVerdict {
    fn from(verdict: Verdict) -> Self {
        match verdict {
            Verdict::Pending => FfiVerdict::Pending,
            Verdict::ProbeStatus => FfiVerdict::ProbeStatus,
            Verdict::Abandon => FfiVerdict::Abandon,
            Verdict::Complete => FfiVerdict::Complete,
        }
    }
}

/// Socket state as reported by the modem.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FfiSocketState {
    Free = 0,
    Opening = 1,
    Connected = 2,
    Closing = 3,
    Closed = 4,
}

impl From<FfiSocketState> for SocketState {
    fn from(state: FfiSocketState) -> Self {
        match state {
            FfiSocketState::Free => SocketState::Free,
            FfiSocketState::Opening => SocketState::Opening,
            FfiSocketState::Connected => SocketState::Connected,
            FfiSocketState::Closing => SocketState::Closing,
            FfiSocketState::Closed => SocketState::Closed,
        }
    }
}

/// Error codes returned in `FfiResult`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FfiErrorCode {
    Ok = 0,
    Send = 1,
    Connect = 2,
    NotAttached = 3,
    NoResponse = 4,
    Api = 5,
    Malformed = 6,
    Partial = 7,
    Serialization = 8,
    Audio = 9,
    Panic = 10,
    NullArg = 11,
}

/// Tag that tells `gl_free_result` what `FfiResult::data` points to.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FfiDataTag {
    None = 0,
    /// `data` is a NUL-terminated C string.
    Text = 1,
    /// `data` is an `FfiBuffer`.
    Bytes = 2,
}

// ---------------------------------------------------------------------------
// Buffers
// ---------------------------------------------------------------------------

/// Bytes owned by Rust and lent to C. Free with `gl_free_buffer`.
#[repr(C)]
pub struct FfiBuffer {
    pub data: *mut u8,
    pub len: usize,
}

impl FfiBuffer {
    pub(crate) fn from_vec(bytes: Vec<u8>) -> *mut Self {
        let len = bytes.len();
        let data = Box::into_raw(bytes.into_boxed_slice()) as *mut u8;
        Box::into_raw(Box::new(FfiBuffer { data, len }))
    }

    /// Release a buffer created by `from_vec`.
    ///
    /// # Safety
    /// `buffer` must come from `from_vec` and not have been freed.
    pub(crate) unsafe fn free(buffer: *mut Self) {
        let buffer = unsafe { Box::from_raw(buffer) };
        if !buffer.data.is_null() {
            drop(unsafe { Box::from_raw(std::ptr::slice_from_raw_parts_mut(buffer.data, buffer.len)) });
        }
    }
}

/// Build a C string, dropping any interior NUL bytes.
pub(crate) fn c_string(s: impl Into<String>) -> *mut c_char {
    let mut s: String = s.into();
    s.retain(|c| c != '\0');
    CString::new(s).unwrap_or_default().into_raw()
}

// ---------------------------------------------------------------------------
// Result envelope
// ---------------------------------------------------------------------------

/// Result envelope for extraction, exchange completion and transcoding.
///
/// On success `error_code` is `Ok`, `error_message` is null and `data`
/// points to the payload tagged by `data_tag`. `latency_ms` is the elapsed
/// time the host last reported to the detector, or 0 when not applicable.
/// On failure `data` is null and `latency_ms` is -1.
#[repr(C)]
pub struct FfiResult {
    pub error_code: FfiErrorCode,
    pub error_message: *mut c_char,
    pub latency_ms: i64,
    pub data_tag: FfiDataTag,
    pub data: *mut c_void,
}

impl FfiResult {
    pub(crate) fn ok_text(text: String, latency_ms: i64) -> *mut Self {
        Box::into_raw(Box::new(FfiResult {
            error_code: FfiErrorCode::Ok,
            error_message: std::ptr::null_mut(),
            latency_ms,
            data_tag: FfiDataTag::Text,
            data: c_string(text) as *mut c_void,
        }))
    }

    pub(crate) fn ok_bytes(bytes: Vec<u8>) -> *mut Self {
        Box::into_raw(Box::new(FfiResult {
            error_code: FfiErrorCode::Ok,
            error_message: std::ptr::null_mut(),
            latency_ms: 0,
            data_tag: FfiDataTag::Bytes,
            data: FfiBuffer::from_vec(bytes) as *mut c_void,
        }))
    }

    pub(crate) fn from_error(err: ExchangeError) -> *mut Self {
        let code = match &err {
            ExchangeError::Send { .. } => FfiErrorCode::Send,
            ExchangeError::Connect { .. } => FfiErrorCode::Connect,
            ExchangeError::NotAttached => FfiErrorCode::NotAttached,
            ExchangeError::NoResponse => FfiErrorCode::NoResponse,
            ExchangeError::Api { .. } => FfiErrorCode::Api,
            ExchangeError::MalformedResponse { .. } => FfiErrorCode::Malformed,
            ExchangeError::PartialResponse { .. } => FfiErrorCode::Partial,
            ExchangeError::Serialization(_) => FfiErrorCode::Serialization,
            ExchangeError::Audio(_) => FfiErrorCode::Audio,
        };
        Self::error(code, err.to_string())
    }

    pub(crate) fn from_parse_error(err: ParseError) -> *mut Self {
        Self::from_error(err.into())
    }

    pub(crate) fn null_arg(name: &str) -> *mut Self {
        Self::error(FfiErrorCode::NullArg, format!("null argument: {name}"))
    }

    pub(crate) fn panic(msg: &str) -> *mut Self {
        Self::error(FfiErrorCode::Panic, msg.to_string())
    }

    fn error(error_code: FfiErrorCode, message: String) -> *mut Self {
        Box::into_raw(Box::new(FfiResult {
            error_code,
            error_message: c_string(message),
            latency_ms: -1,
            data_tag: FfiDataTag::None,
            data: std::ptr::null_mut(),
        }))
    }
}
