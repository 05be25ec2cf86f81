//! Request DTOs for the `generateContent` API.
//!
//! # Design
//! Only the request side is typed. Responses are navigated as
//! `serde_json::Value` by the extractor so a missing field can be reported by
//! its path instead of as a generic deserialization failure.
//!
//! The request body uses `inline_data` / `mime_type` for media parts and
//! camelCase for `generationConfig`, which is what the upstream accepts.

use serde::{Deserialize, Serialize};

/// Top-level `generateContent` request body.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GenerateContentRequest {
    pub contents: Vec<Content>,
    #[serde(
        rename = "generationConfig",
        skip_serializing_if = "Option::is_none",
        default
    )]
    pub generation_config: Option<GenerationConfig>,
}

/// One conversation turn.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Content {
    pub parts: Vec<Part>,
}

/// A single part: inline media or text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Part {
    InlineData { inline_data: InlineData },
    Text { text: String },
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Part::Text { text: text.into() }
    }

    pub fn inline(mime_type: impl Into<String>, data: impl Into<String>) -> Self {
        Part::InlineData {
            inline_data: InlineData {
                mime_type: mime_type.into(),
                data: data.into(),
            },
        }
    }
}

/// Base64 media embedded in the request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InlineData {
    pub mime_type: String,
    pub data: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub max_output_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub response_modalities: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub speech_config: Option<SpeechConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SpeechConfig {
    pub voice_config: VoiceConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VoiceConfig {
    pub prebuilt_voice_config: PrebuiltVoiceConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PrebuiltVoiceConfig {
    pub voice_name: String,
}

impl SpeechConfig {
    pub fn prebuilt(voice: &str) -> Self {
        Self {
            voice_config: VoiceConfig {
                prebuilt_voice_config: PrebuiltVoiceConfig {
                    voice_name: voice.to_string(),
                },
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_only_request_serializes_minimally() {
        let req = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![Part::text("hi")],
            }],
            generation_config: None,
        };
        let json = serde_json::to_string(&req).unwrap();
        assert_eq!(json, r#"{"contents":[{"parts":[{"text":"hi"}]}]}"#);
    }

    #[test]
    fn inline_part_uses_snake_case_keys() {
        let value = serde_json::to_value(Part::inline("audio/wav", "AAAA")).unwrap();
        assert_eq!(value["inline_data"]["mime_type"], "audio/wav");
        assert_eq!(value["inline_data"]["data"], "AAAA");
    }

    #[test]
    fn generation_config_uses_camel_case_and_skips_unset() {
        let config = GenerationConfig {
            response_modalities: Some(vec!["AUDIO".to_string()]),
            speech_config: Some(SpeechConfig::prebuilt("Kore")),
            ..Default::default()
        };
        let value = serde_json::to_value(config).unwrap();
        assert_eq!(value["responseModalities"][0], "AUDIO");
        assert_eq!(
            value["speechConfig"]["voiceConfig"]["prebuiltVoiceConfig"]["voiceName"],
            "Kore"
        );
        assert!(value.get("maxOutputTokens").is_none());
        assert!(value.get("temperature").is_none());
    }

    #[test]
    fn parts_deserialize_by_shape() {
        let parts: Vec<Part> = serde_json::from_str(
            r#"[{"inline_data":{"mime_type":"audio/mpeg","data":"QQ=="}},{"text":"prompt"}]"#,
        )
        .unwrap();
        assert_eq!(parts[0], Part::inline("audio/mpeg", "QQ=="));
        assert_eq!(parts[1], Part::text("prompt"));
    }
}
