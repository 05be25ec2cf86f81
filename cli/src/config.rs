//! `gemlink.toml` loading.
//!
//! Every section is optional. Command-line flags and `GEMLINK_*` variables
//! are applied on top by the binary.

use std::path::{Path, PathBuf};

use gemlink_core::client::{
    DEFAULT_HOST, DEFAULT_PORT, DEFAULT_SPEECH_MODEL, DEFAULT_TEXT_MODEL, DEFAULT_VOICE,
};
use gemlink_core::ExchangeOptions;
use serde::Deserialize;
use thiserror::Error;

pub const CONFIG_FILE: &str = "gemlink.toml";

const DEFAULT_PROMPT: &str = "Listen to this audio and respond to the user's question or request. \
If it's a question, answer it directly. If it's a statement, acknowledge and respond appropriately. \
Keep your response concise and helpful.";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub api: ApiConfig,
    pub audio: AudioConfig,
    pub bench: BenchConfig,
    pub exchange: ExchangeConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ApiConfig {
    pub key: Option<String>,
    pub host: String,
    pub port: u16,
    pub text_model: String,
    pub speech_model: String,
    pub voice: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            key: None,
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            text_model: DEFAULT_TEXT_MODEL.to_string(),
            speech_model: DEFAULT_SPEECH_MODEL.to_string(),
            voice: DEFAULT_VOICE.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AudioConfig {
    /// Clip sent by `transcribe` and `bench`.
    pub file: Option<PathBuf>,
    pub prompt: String,
    pub max_tokens: u32,
    /// Sample rate of the PCM returned by speech synthesis.
    pub sample_rate: u32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            file: None,
            prompt: DEFAULT_PROMPT.to_string(),
            max_tokens: 512,
            sample_rate: 24_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BenchConfig {
    pub iterations: u32,
    /// A run fails when fewer than this share of iterations succeed.
    pub min_success_ratio: f64,
    /// Pause between iterations.
    pub cooldown_ms: u64,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            iterations: 10,
            min_success_ratio: 0.3,
            cooldown_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExchangeConfig {
    pub text: ExchangeOverrides,
    pub speech: ExchangeOverrides,
}

impl ExchangeConfig {
    pub fn text_options(&self) -> ExchangeOptions {
        self.text.apply(ExchangeOptions::text())
    }

    pub fn speech_options(&self) -> ExchangeOptions {
        self.speech.apply(ExchangeOptions::speech())
    }
}

/// Per-preset tuning. Unset keys keep the preset's value.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExchangeOverrides {
    pub chunk_size: Option<usize>,
    pub inter_chunk_delay_ms: Option<u64>,
    pub settle_delay_ms: Option<u64>,
    pub busy_poll_interval_ms: Option<u64>,
    pub idle_poll_interval_ms: Option<u64>,
    pub hard_timeout_ms: Option<u64>,
    pub idle_parse_after: Option<u32>,
    pub idle_ceiling: Option<u32>,
    pub status_probe_after: Option<u32>,
}

impl ExchangeOverrides {
    pub fn apply(&self, mut options: ExchangeOptions) -> ExchangeOptions {
        fn set<T: Copy>(slot: &mut T, value: Option<T>) {
            if let Some(value) = value {
                *slot = value;
            }
        }
        set(&mut options.transmit.chunk_size, self.chunk_size);
        set(&mut options.transmit.inter_chunk_delay_ms, self.inter_chunk_delay_ms);
        set(&mut options.settle_delay_ms, self.settle_delay_ms);
        set(&mut options.busy_poll_interval_ms, self.busy_poll_interval_ms);
        set(&mut options.idle_poll_interval_ms, self.idle_poll_interval_ms);
        set(&mut options.hard_timeout_ms, self.hard_timeout_ms);
        set(&mut options.completion.idle_parse_after, self.idle_parse_after);
        set(&mut options.completion.idle_ceiling, self.idle_ceiling);
        if self.status_probe_after.is_some() {
            options.completion.status_probe_after = self.status_probe_after;
        }
        options
    }
}

impl Config {
    pub fn from_toml(content: &str, path: &Path) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load `path`, or the default location when `path` is `None`.
    ///
    /// A missing default file yields the defaults; a missing explicit file
    /// is an error.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let (path, required) = match path {
            Some(path) => (path.to_path_buf(), true),
            None => match default_path() {
                Some(path) => (path, false),
                None => return Ok(Self::default()),
            },
        };

        if !required && !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        let config = Self::from_toml(&content, &path)?;
        tracing::info!(path = %path.display(), "loaded config");
        Ok(config)
    }
}

/// `<config dir>/gemlink/gemlink.toml` for the current platform.
pub fn default_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("dev", "gemlink", "gemlink")
        .map(|dirs| dirs.config_dir().join(CONFIG_FILE))
}

#[cfg(test)]
mod tests {
    use super::*;
    use gemlink_core::FieldPath;

    #[test]
    fn empty_file_is_all_defaults() {
        let config = Config::from_toml("", Path::new("x.toml")).unwrap();
        assert_eq!(config.api.host, DEFAULT_HOST);
        assert_eq!(config.api.voice, "Kore");
        assert_eq!(config.audio.max_tokens, 512);
        assert_eq!(config.bench.iterations, 10);
        assert!((config.bench.min_success_ratio - 0.3).abs() < f64::EPSILON);
        assert_eq!(config.exchange.text_options(), ExchangeOptions::text());
        assert_eq!(config.exchange.speech_options(), ExchangeOptions::speech());
    }

    #[test]
    fn full_file_overrides_sections() {
        let toml = r#"
            [api]
            key = "secret"
            host = "127.0.0.1"
            port = 8080
            voice = "Puck"

            [audio]
            file = "clip.wav"
            prompt = "What is said?"

            [bench]
            iterations = 3
            min_success_ratio = 0.5

            [exchange.text]
            hard_timeout_ms = 5000

            [exchange.speech]
            idle_ceiling = 50
            status_probe_after = 2
        "#;
        let config = Config::from_toml(toml, Path::new("x.toml")).unwrap();

        assert_eq!(config.api.key.as_deref(), Some("secret"));
        assert_eq!(config.api.port, 8080);
        assert_eq!(config.api.text_model, DEFAULT_TEXT_MODEL);
        assert_eq!(config.audio.file.as_deref(), Some(Path::new("clip.wav")));
        assert_eq!(config.bench.iterations, 3);

        let text = config.exchange.text_options();
        assert_eq!(text.hard_timeout_ms, 5000);
        assert_eq!(text.busy_poll_interval_ms, 500);

        let speech = config.exchange.speech_options();
        assert_eq!(speech.completion.idle_ceiling, 50);
        assert_eq!(speech.completion.status_probe_after, Some(2));
        assert_eq!(speech.busy_poll_interval_ms, 10);
        assert_eq!(speech.field, FieldPath::InlineData);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = Config::from_toml("[api]\nkye = \"x\"", Path::new("bad.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("bad.toml"));
    }

    #[test]
    fn load_reads_explicit_path_and_requires_it() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, "[bench]\niterations = 7\n").unwrap();
        assert_eq!(Config::load(Some(&path)).unwrap().bench.iterations, 7);

        let missing = dir.path().join("missing.toml");
        assert!(matches!(
            Config::load(Some(&missing)),
            Err(ConfigError::Read { .. })
        ));
    }
}
