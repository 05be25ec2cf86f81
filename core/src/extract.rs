//! Pulls the payload field out of a raw HTTP response buffer.
//!
//! # Design
//! The buffer handed in is whatever the reader accumulated: head, possibly
//! chunk framing, possibly garbage before the JSON. Extraction therefore
//! splits at the head boundary, strips chunk framing, skips to the first `{`
//! and parses one JSON value from there, ignoring anything after it.
//!
//! A JSON document that fails to parse is reported as
//! [`ParseError::Incomplete`]: on this transport that almost always means
//! more bytes are on the way.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::chunked;
use crate::error::ParseError;
use crate::http::{self, HEADER_TERMINATOR};

/// Which leaf of `candidates[0].content.parts[0]` holds the payload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldPath {
    /// `.text`: transcription and chat answers.
    #[default]
    Text,
    /// `.inlineData.data`: base64 PCM from speech synthesis.
    InlineData,
}

impl FieldPath {
    pub fn as_str(self) -> &'static str {
        match self {
            FieldPath::Text => "candidates[0].content.parts[0].text",
            FieldPath::InlineData => "candidates[0].content.parts[0].inlineData.data",
        }
    }
}

impl std::fmt::Display for FieldPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Extract the `field` string from a raw response.
pub fn extract(raw: &[u8], field: FieldPath) -> Result<String, ParseError> {
    let document = parse_document(raw)?;
    read_field(&document, field)
}

/// Locate and parse the JSON document inside a raw HTTP response.
pub fn parse_document(raw: &[u8]) -> Result<Value, ParseError> {
    let incomplete = |reason| ParseError::Incomplete {
        reason,
        received: raw.len(),
    };

    let header_end = http::find_header_end(raw).ok_or_else(|| incomplete("no header boundary"))?;
    let head = &raw[..header_end];
    let body = chunked::decode_body(head, &raw[header_end + HEADER_TERMINATOR.len()..]);

    let json_start = body
        .iter()
        .position(|&b| b == b'{')
        .ok_or_else(|| incomplete("no JSON object in body"))?;

    serde_json::Deserializer::from_slice(&body[json_start..])
        .into_iter::<Value>()
        .next()
        .and_then(Result::ok)
        .ok_or_else(|| incomplete("JSON document not complete"))
}

/// Read the payload from an already-parsed document.
pub fn read_field(document: &Value, field: FieldPath) -> Result<String, ParseError> {
    if let Some(error) = document.get("error") {
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .map_or_else(|| error.to_string(), str::to_string);
        return Err(ParseError::Api { message });
    }

    let missing = |name: &str| ParseError::Malformed {
        missing_field: name.to_string(),
    };

    let part = document
        .get("candidates")
        .ok_or_else(|| missing("candidates"))?
        .get(0)
        .ok_or_else(|| missing("candidates[0]"))?
        .get("content")
        .ok_or_else(|| missing("candidates[0].content"))?
        .get("parts")
        .ok_or_else(|| missing("candidates[0].content.parts"))?
        .get(0)
        .ok_or_else(|| missing("candidates[0].content.parts[0]"))?;

    let leaf = match field {
        FieldPath::Text => part.get("text"),
        FieldPath::InlineData => part
            .get("inlineData")
            .or_else(|| part.get("inline_data"))
            .and_then(|inline| inline.get("data")),
    };

    leaf.and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| missing(field.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(headers: &str, body: &str) -> Vec<u8> {
        format!("HTTP/1.1 200 OK\r\n{headers}\r\n\r\n{body}").into_bytes()
    }

    const HELLO: &str = r#"{"candidates":[{"content":{"parts":[{"text":"hello"}]}}]}"#;

    #[test]
    fn plain_body_success() {
        let raw = response("Content-Length: 57", HELLO);
        assert_eq!(extract(&raw, FieldPath::Text).unwrap(), "hello");
    }

    #[test]
    fn chunked_body_success() {
        let body = format!("{:x}\r\n{}\r\n{:x}\r\n{}\r\n0\r\n\r\n", 20, &HELLO[..20], HELLO.len() - 20, &HELLO[20..]);
        let raw = response("Transfer-Encoding: chunked", &body);
        assert_eq!(extract(&raw, FieldPath::Text).unwrap(), "hello");
    }

    #[test]
    fn leading_garbage_and_trailing_bytes_are_tolerated() {
        let raw = response("Content-Type: application/json", &format!("\n  )]}}'\n{HELLO}\r\n\r\n"));
        assert_eq!(extract(&raw, FieldPath::Text).unwrap(), "hello");
    }

    #[test]
    fn inline_audio_is_read() {
        let body = r#"{"candidates":[{"content":{"parts":[{"inlineData":{"mimeType":"audio/L16;codec=pcm;rate=24000","data":"AAEC"}}]}}]}"#;
        let raw = response("Content-Length: 1", body);
        assert_eq!(extract(&raw, FieldPath::InlineData).unwrap(), "AAEC");
    }

    #[test]
    fn api_error_message_is_surfaced() {
        let raw = response("", r#"{"error":{"code":429,"message":"quota exceeded"}}"#);
        assert_eq!(
            extract(&raw, FieldPath::Text),
            Err(ParseError::Api {
                message: "quota exceeded".into()
            })
        );
    }

    #[test]
    fn api_error_without_message_uses_whole_object() {
        let raw = response("", r#"{"error":{"code":500}}"#);
        let err = extract(&raw, FieldPath::Text).unwrap_err();
        assert_eq!(err, ParseError::Api { message: r#"{"code":500}"#.into() });
    }

    #[test]
    fn missing_leaf_is_malformed() {
        let raw = response("", HELLO);
        assert_eq!(
            extract(&raw, FieldPath::InlineData),
            Err(ParseError::Malformed {
                missing_field: "candidates[0].content.parts[0].inlineData.data".into()
            })
        );
    }

    #[test]
    fn empty_candidates_is_malformed() {
        let raw = response("", r#"{"candidates":[]}"#);
        assert_eq!(
            extract(&raw, FieldPath::Text),
            Err(ParseError::Malformed {
                missing_field: "candidates[0]".into()
            })
        );
    }

    #[test]
    fn incomplete_inputs() {
        for raw in [
            b"HTTP/1.1 200 OK\r\nContent-Le".to_vec(),
            response("", ""),
            response("", &HELLO[..30]),
        ] {
            let err = extract(&raw, FieldPath::Text).unwrap_err();
            assert!(!err.is_definitive(), "{err:?}");
        }
    }

    #[test]
    fn field_path_deserializes_snake_case() {
        let field: FieldPath = serde_json::from_str(r#""inline_data""#).unwrap();
        assert_eq!(field, FieldPath::InlineData);
    }
}
