//! Test doubles for the exchange engine.
//!
//! - [`scripted`]: an in-process [`Transport`](gemlink_core::Transport) that
//!   replays timed response bytes.
//! - [`app`]: a small HTTP server answering `generateContent` the way the
//!   real service shapes its responses, for end-to-end runs over TCP.

pub mod scripted;

pub use scripted::{
    audio_body, chunked_response, error_body, http_response, text_body, DeliveryMode,
    ScriptedTransport,
};

use axum::{
    extract::{Path, Query},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tracing::{debug, info};
use uuid::Uuid;

/// Samples of synthesized audio returned per input character.
const SAMPLES_PER_CHAR: usize = 240;
const MAX_SAMPLES: usize = 24_000;

#[derive(Deserialize)]
pub struct KeyQuery {
    pub key: Option<String>,
}

pub fn app() -> Router {
    Router::new().route("/v1beta/models/{model_action}", post(generate_content))
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

async fn generate_content(
    Path(model_action): Path<String>,
    Query(query): Query<KeyQuery>,
    Json(request): Json<Value>,
) -> Response {
    let Some(model) = model_action.strip_suffix(":generateContent") else {
        return api_error(StatusCode::NOT_FOUND, &format!("unknown action {model_action}"));
    };
    if query.key.as_deref().unwrap_or_default().is_empty() {
        return api_error(
            StatusCode::BAD_REQUEST,
            "API key not valid. Please pass a valid API key.",
        );
    }

    let parts = request
        .pointer("/contents/0/parts")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    let prompt = parts
        .iter()
        .find_map(|part| part.get("text").and_then(Value::as_str))
        .unwrap_or_default();
    let wants_audio = request
        .pointer("/generationConfig/responseModalities")
        .and_then(Value::as_array)
        .is_some_and(|modes| modes.iter().any(|m| m == "AUDIO"));

    info!(model, wants_audio, prompt_len = prompt.len(), "generateContent");

    let part = if wants_audio {
        json!({"inlineData": {
            "mimeType": "audio/L16;codec=pcm;rate=24000",
            "data": STANDARD.encode(synthesize(prompt)),
        }})
    } else if let Some(inline) = parts.iter().find_map(|part| part.get("inline_data")) {
        let mime = inline.get("mime_type").and_then(Value::as_str).unwrap_or("audio");
        let encoded = inline.get("data").and_then(Value::as_str).unwrap_or_default();
        debug!(mime, encoded = encoded.len(), "audio part");
        json!({"text": format!("heard {} base64 bytes of {mime}: {prompt}", encoded.len())})
    } else {
        json!({"text": format!("echo: {prompt}")})
    };

    Json(json!({
        "candidates": [{
            "content": {"parts": [part], "role": "model"},
            "finishReason": "STOP",
        }],
        "modelVersion": model,
        "responseId": Uuid::new_v4().to_string(),
    }))
    .into_response()
}

/// A short sawtooth whose length follows the input, as 16-bit LE PCM.
fn synthesize(text: &str) -> Vec<u8> {
    let samples = (text.chars().count() * SAMPLES_PER_CHAR).min(MAX_SAMPLES);
    (0..samples)
        .flat_map(|i| (((i % 100) as i16 - 50) * 200).to_le_bytes())
        .collect()
}

fn api_error(status: StatusCode, message: &str) -> Response {
    let body = json!({"error": {
        "code": status.as_u16(),
        "message": message,
        "status": status.canonical_reason().unwrap_or_default(),
    }});
    (status, Json(body)).into_response()
}
