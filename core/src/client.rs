//! Stateless request builder for the `generateContent` API.
//!
//! # Design
//! `GeminiClient` holds only the endpoint identity (host, key, model names)
//! and carries no mutable state between calls. Each `build_*` method produces
//! an [`HttpRequest`]; running it over a socket is the orchestrator's job.

use crate::error::ExchangeError;
use crate::http::HttpRequest;
use crate::types::{Content, GenerateContentRequest, GenerationConfig, Part, SpeechConfig};

pub const DEFAULT_HOST: &str = "generativelanguage.googleapis.com";
pub const DEFAULT_PORT: u16 = 443;
pub const DEFAULT_TEXT_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_SPEECH_MODEL: &str = "gemini-2.5-flash-preview-tts";
pub const DEFAULT_VOICE: &str = "Kore";

const TRANSCRIBE_TEMPERATURE: f32 = 0.7;

/// Synchronous, stateless builder for `generateContent` requests.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    host: String,
    api_key: String,
    text_model: String,
    speech_model: String,
}

impl GeminiClient {
    pub fn new(host: &str, api_key: &str) -> Self {
        Self {
            host: host.to_string(),
            api_key: api_key.to_string(),
            text_model: DEFAULT_TEXT_MODEL.to_string(),
            speech_model: DEFAULT_SPEECH_MODEL.to_string(),
        }
    }

    pub fn with_models(mut self, text_model: &str, speech_model: &str) -> Self {
        self.text_model = text_model.to_string();
        self.speech_model = speech_model.to_string();
        self
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Audio in, text out: the clip followed by the instruction prompt.
    pub fn build_transcribe(
        &self,
        audio_b64: &str,
        mime_type: &str,
        prompt: &str,
        max_tokens: u32,
    ) -> Result<HttpRequest, ExchangeError> {
        let body = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![Part::inline(mime_type, audio_b64), Part::text(prompt)],
            }],
            generation_config: Some(GenerationConfig {
                max_output_tokens: Some(max_tokens),
                temperature: Some(TRANSCRIBE_TEMPERATURE),
                ..Default::default()
            }),
        };
        self.build(&self.text_model, &body)
    }

    /// Text in, base64 PCM out.
    pub fn build_speech(&self, text: &str, voice: &str) -> Result<HttpRequest, ExchangeError> {
        let body = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![Part::text(text)],
            }],
            generation_config: Some(GenerationConfig {
                response_modalities: Some(vec!["AUDIO".to_string()]),
                speech_config: Some(SpeechConfig::prebuilt(voice)),
                ..Default::default()
            }),
        };
        self.build(&self.speech_model, &body)
    }

    /// Text in, text out, with no generation config.
    pub fn build_text(&self, text: &str) -> Result<HttpRequest, ExchangeError> {
        let body = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![Part::text(text)],
            }],
            generation_config: None,
        };
        self.build(&self.text_model, &body)
    }

    fn build(&self, model: &str, body: &GenerateContentRequest) -> Result<HttpRequest, ExchangeError> {
        let body = serde_json::to_vec(body)?;
        let path = format!("/v1beta/models/{model}:generateContent?key={}", self.api_key);
        Ok(HttpRequest::post_json(&self.host, path, body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> GeminiClient {
        GeminiClient::new("api.test", "secret")
    }

    fn body_json(req: &HttpRequest) -> serde_json::Value {
        serde_json::from_slice(&req.body).unwrap()
    }

    #[test]
    fn build_transcribe_produces_audio_then_prompt() {
        let req = client()
            .build_transcribe("UklGRg==", "audio/wav", "Answer briefly.", 512)
            .unwrap();
        assert_eq!(
            req.path,
            "/v1beta/models/gemini-2.5-flash:generateContent?key=secret"
        );
        let body = body_json(&req);
        let parts = &body["contents"][0]["parts"];
        assert_eq!(parts[0]["inline_data"]["mime_type"], "audio/wav");
        assert_eq!(parts[0]["inline_data"]["data"], "UklGRg==");
        assert_eq!(parts[1]["text"], "Answer briefly.");
        assert_eq!(body["generationConfig"]["maxOutputTokens"], 512);
        assert!((body["generationConfig"]["temperature"].as_f64().unwrap() - 0.7).abs() < 1e-6);
    }

    #[test]
    fn build_speech_requests_audio_modality() {
        let req = client().build_speech("Hello there", "Puck").unwrap();
        assert!(req.path.contains("gemini-2.5-flash-preview-tts:generateContent"));
        let body = body_json(&req);
        assert_eq!(body["contents"][0]["parts"][0]["text"], "Hello there");
        assert_eq!(body["generationConfig"]["responseModalities"][0], "AUDIO");
        assert_eq!(
            body["generationConfig"]["speechConfig"]["voiceConfig"]["prebuiltVoiceConfig"]["voiceName"],
            "Puck"
        );
    }

    #[test]
    fn content_length_matches_body() {
        let req = client().build_text("hi").unwrap();
        assert_eq!(req.body, br#"{"contents":[{"parts":[{"text":"hi"}]}]}"#.to_vec());
        assert_eq!(req.header("Content-Length"), Some(req.body.len().to_string().as_str()));
        assert_eq!(req.header("Host"), Some("api.test"));
    }

    #[test]
    fn custom_models_are_used() {
        let req = client()
            .with_models("text-m", "speech-m")
            .build_speech("x", DEFAULT_VOICE)
            .unwrap();
        assert_eq!(req.path, "/v1beta/models/speech-m:generateContent?key=secret");
    }
}
