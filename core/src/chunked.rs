//! HTTP/1.1 chunked transfer-encoding removal.
//!
//! # Design
//! The decoder is a pure function over whatever bytes have arrived so far.
//! It is re-run from the raw buffer every time the completion detector wants
//! to test parseability, so it has to tolerate truncation anywhere: a chunk
//! whose data is still arriving contributes the bytes that are present, and
//! a size line without its CRLF ends decoding. Output on a truncated input
//! is always a prefix of the output on the complete input.

use crate::http;

/// Marker that ends a chunked body: CRLF after the last chunk, then a zero size.
pub const TERMINAL_CHUNK: &[u8] = b"\r\n0\r\n";

/// True if the response head declares `Transfer-Encoding: chunked`.
pub fn is_chunked(head: &[u8]) -> bool {
    http::header_value(head, "transfer-encoding").is_some_and(|value| {
        value
            .split(',')
            .any(|coding| coding.trim().eq_ignore_ascii_case("chunked"))
    })
}

/// Strip chunk framing from `body`.
///
/// Stops at the zero-size chunk, at a size line that is missing or not hex,
/// or at the end of input. Chunk extensions (`;name=value`) are ignored.
pub fn decode(body: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(body.len());
    let mut rest = body;

    loop {
        let Some(line_end) = http::find(rest, b"\r\n") else {
            break;
        };
        let Some(size) = parse_size(&rest[..line_end]) else {
            break;
        };
        if size == 0 {
            break;
        }

        let data_start = line_end + 2;
        let available = rest.len() - data_start;
        if available < size {
            out.extend_from_slice(&rest[data_start..]);
            break;
        }

        let data_end = data_start + size;
        out.extend_from_slice(&rest[data_start..data_end]);
        rest = rest.get(data_end + 2..).unwrap_or_default();
    }

    out
}

/// Decode the body only when the head says it is chunked.
pub fn decode_body(head: &[u8], body: &[u8]) -> Vec<u8> {
    if is_chunked(head) {
        decode(body)
    } else {
        body.to_vec()
    }
}

fn parse_size(line: &[u8]) -> Option<usize> {
    let line = std::str::from_utf8(line).ok()?;
    let digits = line.split(';').next().unwrap_or_default().trim();
    if digits.is_empty() {
        return None;
    }
    usize::from_str_radix(digits, 16).ok()
}

/// Frame `chunks` the way a server would, including the terminal chunk.
#[cfg(test)]
pub(crate) fn encode(chunks: &[Vec<u8>]) -> Vec<u8> {
    let mut out = Vec::new();
    for chunk in chunks {
        out.extend_from_slice(format!("{:x}\r\n", chunk.len()).as_bytes());
        out.extend_from_slice(chunk);
        out.extend_from_slice(b"\r\n");
    }
    out.extend_from_slice(b"0\r\n\r\n");
    out
}
