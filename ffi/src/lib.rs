//! C-ABI wrapper around `gemlink-core`.
//!
//! # Overview
//! Firmware that owns its modem loop links this library to build requests,
//! decide when a response is complete and extract the payload, without
//! linking an async runtime. The host keeps doing all socket I/O.
//!
//! # Design
//! - Every `extern "C"` function wraps its body in `catch_unwind` so panics
//!   never cross the FFI boundary.
//! - Requests come back as raw wire bytes (`FfiBuffer`) ready to be handed
//!   to the modem in chunks.
//! - The completion detector is exposed as an opaque handle. The host feeds
//!   it bytes, idle ticks and status answers and acts on the returned
//!   `FfiVerdict`.
//! - A single `FfiResult` envelope with `FfiDataTag` + `void* data` conveys
//!   payloads and errors uniformly. `latency_ms` is -1 on every failure.
//! - The C caller owns all returned pointers and must call the matching
//!   `gl_free_*` function to release them.

pub mod types;

use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::panic::catch_unwind;
use std::time::Duration;

use gemlink_core::client::DEFAULT_VOICE;
use gemlink_core::{
    CompletionDetector, CompletionThresholds, ExchangeOptions, FieldPath, PcmFormat,
    SocketStatus,
};

use types::*;

/// Borrow a C string, treating invalid UTF-8 as empty.
///
/// # Safety
/// `ptr` must be non-null and point to a NUL-terminated string.
unsafe fn str_arg<'a>(ptr: *const c_char) -> &'a str {
    unsafe { CStr::from_ptr(ptr) }.to_str().unwrap_or("")
}

// ---------------------------------------------------------------------------
// Client lifecycle
// ---------------------------------------------------------------------------

/// Create a request builder for `host`, authenticating with `api_key`.
///
/// Returns null if either argument is null. Free with `gl_client_free`.
#[unsafe(no_mangle)]
pub extern "C" fn gl_client_new(host: *const c_char, api_key: *const c_char) -> *mut FfiClient {
    catch_unwind(|| {
        if host.is_null() || api_key.is_null() {
            return std::ptr::null_mut();
        }
        let (host, key) = unsafe { (str_arg(host), str_arg(api_key)) };
        let client = gemlink_core::GeminiClient::new(host, key);
        Box::into_raw(Box::new(FfiClient { inner: client }))
    })
    .unwrap_or(std::ptr::null_mut())
}

/// Free a client created by `gl_client_new`. Safe to call with null.
#[unsafe(no_mangle)]
pub extern "C" fn gl_client_free(client: *mut FfiClient) {
    if !client.is_null() {
        let _ = catch_unwind(|| {
            drop(unsafe { Box::from_raw(client) });
        });
    }
}

// ---------------------------------------------------------------------------
// Request builders
// ---------------------------------------------------------------------------

/// Build the wire bytes of a transcription request: `audio_b64` (already
/// base64) followed by `prompt`.
///
/// Returns null if any pointer argument is null or serialization fails.
/// Free with `gl_free_buffer`.
#[unsafe(no_mangle)]
pub extern "C" fn gl_build_transcribe_request(
    client: *const FfiClient,
    audio_b64: *const c_char,
    mime_type: *const c_char,
    prompt: *const c_char,
    max_tokens: u32,
) -> *mut FfiBuffer {
    catch_unwind(|| {
        if client.is_null() || audio_b64.is_null() || mime_type.is_null() || prompt.is_null() {
            return std::ptr::null_mut();
        }
        let client = unsafe { &*client };
        let (audio, mime, prompt) =
            unsafe { (str_arg(audio_b64), str_arg(mime_type), str_arg(prompt)) };
        match client.inner.build_transcribe(audio, mime, prompt, max_tokens) {
            Ok(req) => FfiBuffer::from_vec(req.to_bytes()),
            Err(_) => std::ptr::null_mut(),
        }
    })
    .unwrap_or(std::ptr::null_mut())
}

/// Build the wire bytes of a speech synthesis request.
///
/// `voice` may be null for the default voice. Returns null if `client` or
/// `text` is null. Free with `gl_free_buffer`.
#[unsafe(no_mangle)]
pub extern "C" fn gl_build_speech_request(
    client: *const FfiClient,
    text: *const c_char,
    voice: *const c_char,
) -> *mut FfiBuffer {
    catch_unwind(|| {
        if client.is_null() || text.is_null() {
            return std::ptr::null_mut();
        }
        let client = unsafe { &*client };
        let text = unsafe { str_arg(text) };
        let voice = if voice.is_null() {
            DEFAULT_VOICE
        } else {
            unsafe { str_arg(voice) }
        };
        match client.inner.build_speech(text, voice) {
            Ok(req) => FfiBuffer::from_vec(req.to_bytes()),
            Err(_) => std::ptr::null_mut(),
        }
    })
    .unwrap_or(std::ptr::null_mut())
}

/// Build the wire bytes of a plain text prompt.
#[unsafe(no_mangle)]
pub extern "C" fn gl_build_text_request(
    client: *const FfiClient,
    text: *const c_char,
) -> *mut FfiBuffer {
    catch_unwind(|| {
        if client.is_null() || text.is_null() {
            return std::ptr::null_mut();
        }
        let client = unsafe { &*client };
        match client.inner.build_text(unsafe { str_arg(text) }) {
            Ok(req) => FfiBuffer::from_vec(req.to_bytes()),
            Err(_) => std::ptr::null_mut(),
        }
    })
    .unwrap_or(std::ptr::null_mut())
}

// ---------------------------------------------------------------------------
// Completion detector
// ---------------------------------------------------------------------------

/// Create a detector with the preset thresholds for `field`: the text
/// preset for `Text`, the speech preset for `InlineData`.
///
/// Free with `gl_detector_free`, or consume with `gl_detector_finish`.
#[unsafe(no_mangle)]
pub extern "C" fn gl_detector_new(field: FfiField) -> *mut FfiDetector {
    catch_unwind(|| {
        let options = match field {
            FfiField::Text => ExchangeOptions::text(),
            FfiField::InlineData => ExchangeOptions::speech(),
        };
        let detector = CompletionDetector::new(options.field, options.completion);
        Box::into_raw(Box::new(FfiDetector { inner: detector }))
    })
    .unwrap_or(std::ptr::null_mut())
}

/// Create a detector with explicit thresholds. A negative
/// `status_probe_after` disables status probing.
#[unsafe(no_mangle)]
pub extern "C" fn gl_detector_new_with(
    field: FfiField,
    idle_parse_after: u32,
    idle_ceiling: u32,
    status_probe_after: i32,
) -> *mut FfiDetector {
    catch_unwind(|| {
        let thresholds = CompletionThresholds {
            idle_parse_after,
            idle_ceiling,
            status_probe_after: u32::try_from(status_probe_after).ok(),
        };
        let detector = CompletionDetector::new(FieldPath::from(field), thresholds);
        Box::into_raw(Box::new(FfiDetector { inner: detector }))
    })
    .unwrap_or(std::ptr::null_mut())
}

/// Feed the `len` bytes read for one ring notification. `data` may be null
/// when `len` is 0; an empty read leaves the idle streak as it is.
#[unsafe(no_mangle)]
pub extern "C" fn gl_detector_on_data(
    detector: *mut FfiDetector,
    data: *const u8,
    len: usize,
) -> FfiVerdict {
    catch_unwind(|| {
        if detector.is_null() || (data.is_null() && len > 0) {
            return FfiVerdict::Invalid;
        }
        let detector = unsafe { &mut *detector };
        let bytes: &[u8] = if len == 0 {
            &[]
        } else {
            unsafe { std::slice::from_raw_parts(data, len) }
        };
        detector.inner.on_data(bytes).into()
    })
    .unwrap_or(FfiVerdict::Invalid)
}

/// Record a poll cycle that found no notification.
#[unsafe(no_mangle)]
pub extern "C" fn gl_detector_on_idle(detector: *mut FfiDetector) -> FfiVerdict {
    catch_unwind(|| {
        if detector.is_null() {
            return FfiVerdict::Invalid;
        }
        unsafe { &mut *detector }.inner.on_idle().into()
    })
    .unwrap_or(FfiVerdict::Invalid)
}

/// Answer a `ProbeStatus` verdict with the socket's current status.
#[unsafe(no_mangle)]
pub extern "C" fn gl_detector_on_status(
    detector: *mut FfiDetector,
    connected: bool,
    state: FfiSocketState,
) -> FfiVerdict {
    catch_unwind(|| {
        if detector.is_null() {
            return FfiVerdict::Invalid;
        }
        let status = SocketStatus {
            connected,
            state: state.into(),
        };
        unsafe { &mut *detector }.inner.on_status(status).into()
    })
    .unwrap_or(FfiVerdict::Invalid)
}

/// Report the time since the first request byte was sent. The last
/// reported value becomes the result's `latency_ms`.
#[unsafe(no_mangle)]
pub extern "C" fn gl_detector_record_elapsed(detector: *mut FfiDetector, elapsed_ms: u64) {
    if detector.is_null() {
        return;
    }
    let _ = catch_unwind(|| {
        unsafe { &mut *detector }
            .inner
            .record_elapsed(Duration::from_millis(elapsed_ms));
    });
}

/// The host's hard timeout elapsed.
#[unsafe(no_mangle)]
pub extern "C" fn gl_detector_expire(detector: *mut FfiDetector) {
    if detector.is_null() {
        return;
    }
    let _ = catch_unwind(|| {
        unsafe { &mut *detector }.inner.expire();
    });
}

/// Resolve the exchange and free the detector.
///
/// Returns a result with `data_tag = Text` holding the payload on success.
/// `detector` must not be used again.
#[unsafe(no_mangle)]
pub extern "C" fn gl_detector_finish(detector: *mut FfiDetector) -> *mut FfiResult {
    catch_unwind(|| {
        if detector.is_null() {
            return FfiResult::null_arg("detector");
        }
        let detector = unsafe { Box::from_raw(detector) }.inner;
        let latency_ms = i64::try_from(detector.state().elapsed.as_millis()).unwrap_or(i64::MAX);
        match detector.finish() {
            Ok(payload) => FfiResult::ok_text(payload, latency_ms),
            Err(err) => FfiResult::from_error(err),
        }
    })
    .unwrap_or_else(|_| FfiResult::panic("panic in gl_detector_finish"))
}

/// Free a detector without resolving it. Safe to call with null.
#[unsafe(no_mangle)]
pub extern "C" fn gl_detector_free(detector: *mut FfiDetector) {
    if !detector.is_null() {
        let _ = catch_unwind(|| {
            drop(unsafe { Box::from_raw(detector) });
        });
    }
}

// ---------------------------------------------------------------------------
// One-shot helpers
// ---------------------------------------------------------------------------

/// Extract the payload from a complete raw HTTP response.
#[unsafe(no_mangle)]
pub extern "C" fn gl_extract(data: *const u8, len: usize, field: FfiField) -> *mut FfiResult {
    catch_unwind(|| {
        if data.is_null() {
            return FfiResult::null_arg("data");
        }
        let raw = unsafe { std::slice::from_raw_parts(data, len) };
        match gemlink_core::extract(raw, field.into()) {
            Ok(payload) => FfiResult::ok_text(payload, 0),
            Err(err) => FfiResult::from_parse_error(err),
        }
    })
    .unwrap_or_else(|_| FfiResult::panic("panic in gl_extract"))
}

/// Decode base64 PCM and wrap it as a WAV file.
///
/// Returns a result with `data_tag = Bytes` on success.
#[unsafe(no_mangle)]
pub extern "C" fn gl_pcm_to_wav(
    pcm_b64: *const c_char,
    sample_rate: u32,
    channels: u16,
    bits_per_sample: u16,
) -> *mut FfiResult {
    catch_unwind(|| {
        if pcm_b64.is_null() {
            return FfiResult::null_arg("pcm_b64");
        }
        let format = PcmFormat {
            sample_rate,
            channels,
            bits_per_sample,
        };
        match gemlink_core::decode_pcm_to_wav(unsafe { str_arg(pcm_b64) }, format) {
            Ok(wav) => FfiResult::ok_bytes(wav),
            Err(err) => FfiResult::from_error(err.into()),
        }
    })
    .unwrap_or_else(|_| FfiResult::panic("panic in gl_pcm_to_wav"))
}

// ---------------------------------------------------------------------------
// Free functions
// ---------------------------------------------------------------------------

/// Free a buffer returned by any `gl_build_*` function. Safe to call with null.
#[unsafe(no_mangle)]
pub extern "C" fn gl_free_buffer(buffer: *mut FfiBuffer) {
    if buffer.is_null() {
        return;
    }
    let _ = catch_unwind(|| unsafe { FfiBuffer::free(buffer) });
}

/// Free a result. Safe to call with null. Uses `data_tag` to determine what
/// `data` points to.
#[unsafe(no_mangle)]
pub extern "C" fn gl_free_result(result: *mut FfiResult) {
    if result.is_null() {
        return;
    }
    let _ = catch_unwind(|| {
        let result = unsafe { Box::from_raw(result) };
        if !result.error_message.is_null() {
            drop(unsafe { CString::from_raw(result.error_message) });
        }
        if !result.data.is_null() {
            match result.data_tag {
                FfiDataTag::Text => drop(unsafe { CString::from_raw(result.data as *mut c_char) }),
                FfiDataTag::Bytes => unsafe { FfiBuffer::free(result.data as *mut FfiBuffer) },
                FfiDataTag::None => {}
            }
        }
    });
}
