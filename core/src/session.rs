//! High-level calls: transcribe a clip, synthesize speech.
//!
//! # Design
//! `GeminiSession` pairs a transport with a request builder and the two
//! option presets. Each call is one independent exchange on a fresh socket;
//! the session itself keeps no per-request state.

use std::time::Duration;

use tracing::info;

use crate::audio::{self, AudioClip};
use crate::client::{GeminiClient, DEFAULT_PORT, DEFAULT_VOICE};
use crate::error::ExchangeError;
use crate::exchange::{Exchange, ExchangeOutput};
use crate::http::HttpRequest;
use crate::options::ExchangeOptions;
use crate::transport::Transport;
use crate::wav::PcmFormat;

/// Synthesized speech, already wrapped as WAV.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeechOutput {
    pub wav: Vec<u8>,
    pub latency: Duration,
}

pub struct GeminiSession<T: Transport> {
    transport: T,
    client: GeminiClient,
    port: u16,
    voice: String,
    pcm_format: PcmFormat,
    text_options: ExchangeOptions,
    speech_options: ExchangeOptions,
}

impl<T: Transport> GeminiSession<T> {
    pub fn new(transport: T, client: GeminiClient) -> Self {
        Self {
            transport,
            client,
            port: DEFAULT_PORT,
            voice: DEFAULT_VOICE.to_string(),
            pcm_format: PcmFormat::default(),
            text_options: ExchangeOptions::text(),
            speech_options: ExchangeOptions::speech(),
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_voice(mut self, voice: &str) -> Self {
        self.voice = voice.to_string();
        self
    }

    pub fn with_pcm_format(mut self, format: PcmFormat) -> Self {
        self.pcm_format = format;
        self
    }

    pub fn with_options(mut self, text: ExchangeOptions, speech: ExchangeOptions) -> Self {
        self.text_options = text;
        self.speech_options = speech;
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn into_transport(self) -> T {
        self.transport
    }

    /// Attach to the network if the transport reports it is not attached.
    pub async fn ensure_attached(&mut self) -> Result<(), ExchangeError> {
        if self.transport.is_attached() {
            return Ok(());
        }
        info!("network not attached, connecting");
        if self.transport.attach().await {
            Ok(())
        } else {
            Err(ExchangeError::NotAttached)
        }
    }

    /// Send an audio clip with an instruction prompt; returns the text answer.
    pub async fn transcribe(
        &mut self,
        clip: &AudioClip,
        prompt: &str,
        max_tokens: u32,
    ) -> Result<ExchangeOutput, ExchangeError> {
        let request = self
            .client
            .build_transcribe(&clip.base64, clip.mime_type, prompt, max_tokens)?;
        self.run(&request, Preset::Text).await
    }

    /// Send a plain text prompt; returns the text answer.
    pub async fn ask(&mut self, text: &str) -> Result<ExchangeOutput, ExchangeError> {
        let request = self.client.build_text(text)?;
        self.run(&request, Preset::Text).await
    }

    /// Synthesize `text` with the session voice; returns WAV bytes.
    pub async fn speak(&mut self, text: &str) -> Result<SpeechOutput, ExchangeError> {
        let request = self.client.build_speech(text, &self.voice)?;
        let output = self.run(&request, Preset::Speech).await?;
        let wav = audio::decode_pcm_to_wav(&output.payload, self.pcm_format)?;
        info!(wav_bytes = wav.len(), latency_ms = output.latency_ms(), "speech synthesized");
        Ok(SpeechOutput {
            wav,
            latency: output.latency,
        })
    }

    async fn run(
        &mut self,
        request: &HttpRequest,
        preset: Preset,
    ) -> Result<ExchangeOutput, ExchangeError> {
        self.ensure_attached().await?;
        let options = match preset {
            Preset::Text => &self.text_options,
            Preset::Speech => &self.speech_options,
        };
        let host = self.client.host().to_string();
        Exchange::new(&mut self.transport, &host, self.port)
            .run(request, options)
            .await
    }
}

#[derive(Clone, Copy)]
enum Preset {
    Text,
    Speech,
}
