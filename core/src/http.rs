//! HTTP/1.1 framing helpers for the host-does-IO pattern.
//!
//! # Design
//! `HttpRequest` describes one outbound request as plain data; `to_bytes`
//! renders the exact wire form the transmitter pushes through the socket.
//! Only `POST` with a JSON body is ever produced, and every request asks the
//! server to close the connection so the socket carries a single exchange.
//!
//! The response side never builds a full response object. Bytes arrive in
//! small pieces, so the helpers here work directly on the accumulated
//! buffer: find the head/body boundary, look up a header, read
//! `Content-Length`.

/// The head/body separator of an HTTP/1.1 message.
pub const HEADER_TERMINATOR: &[u8] = b"\r\n\r\n";

/// An outbound HTTP request described as plain data.
///
/// Built by `GeminiClient::build_*`. Immutable once built; the transmitter
/// only reads the bytes returned by [`HttpRequest::to_bytes`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub host: String,
    /// Path including the query string, e.g. `/v1beta/models/m:generateContent?key=k`.
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpRequest {
    /// Build a JSON `POST` with the fixed header set the upstream API expects.
    pub fn post_json(host: &str, path: String, body: Vec<u8>) -> Self {
        let headers = vec![
            ("Host".to_string(), host.to_string()),
            ("Content-Type".to_string(), "application/json".to_string()),
            ("Content-Length".to_string(), body.len().to_string()),
            ("Connection".to_string(), "close".to_string()),
            ("Accept".to_string(), "application/json".to_string()),
        ];
        Self {
            host: host.to_string(),
            path,
            headers,
            body,
        }
    }

    /// Render the request line, headers and body as wire bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut head = format!("POST {} HTTP/1.1\r\n", self.path);
        for (name, value) in &self.headers {
            head.push_str(name);
            head.push_str(": ");
            head.push_str(value);
            head.push_str("\r\n");
        }
        head.push_str("\r\n");

        let mut out = Vec::with_capacity(head.len() + self.body.len());
        out.extend_from_slice(head.as_bytes());
        out.extend_from_slice(&self.body);
        out
    }

    /// Look up a request header by case-insensitive name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Offset of the `\r\n\r\n` separator, if the head has fully arrived.
pub fn find_header_end(buf: &[u8]) -> Option<usize> {
    find(buf, HEADER_TERMINATOR)
}

/// Value of the first header named `name` (ASCII case-insensitive) in `head`.
pub fn header_value<'a>(head: &'a [u8], name: &str) -> Option<&'a str> {
    let text = std::str::from_utf8(head).ok()?;
    text.split("\r\n").skip(1).find_map(|line| {
        let (key, value) = line.split_once(':')?;
        key.trim()
            .eq_ignore_ascii_case(name)
            .then(|| value.trim())
    })
}

/// Parse the `Content-Length` header from a response head.
pub fn content_length(head: &[u8]) -> Option<usize> {
    header_value(head, "content-length")?.parse().ok()
}

/// Status code from the response status line, if it parses.
pub fn status_code(head: &[u8]) -> Option<u16> {
    let line_end = find(head, b"\r\n").unwrap_or(head.len());
    let line = std::str::from_utf8(&head[..line_end]).ok()?;
    line.split_whitespace().nth(1)?.parse().ok()
}

/// Byte-string search. Returns the offset of the first occurrence of `needle`.
pub fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}
