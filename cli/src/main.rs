use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use gemlink_cli::bench::{self, BenchSettings};
use gemlink_cli::{Config, TcpTransport};
use gemlink_core::{AudioClip, GeminiClient, GeminiSession, PcmFormat};

/// gemlink - generateContent over a constrained socket
#[derive(Parser)]
#[command(name = "gemlink", version, about)]
struct Cli {
    /// Config file (defaults to the platform config dir)
    #[arg(short, long, env = "GEMLINK_CONFIG")]
    config: Option<PathBuf>,

    /// API key
    #[arg(long, env = "GEMLINK_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// API host
    #[arg(long, env = "GEMLINK_HOST")]
    host: Option<String>,

    /// API port
    #[arg(long, env = "GEMLINK_PORT")]
    port: Option<u16>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Send a text prompt and print the answer
    Ask {
        /// Prompt text
        text: String,
    },
    /// Send an audio clip with the configured prompt and print the answer
    Transcribe {
        /// WAV or MP3 file (defaults to `[audio] file`)
        file: Option<PathBuf>,
        /// Instruction sent with the clip
        #[arg(short, long)]
        prompt: Option<String>,
    },
    /// Synthesize speech
    Speak {
        /// Text to speak
        text: String,
        /// Write the WAV here
        #[arg(short, long)]
        out: Option<PathBuf>,
        /// Prebuilt voice name
        #[arg(long)]
        voice: Option<String>,
    },
    /// Repeat transcribe-then-speak and report latency
    Bench {
        /// Number of iterations
        #[arg(short = 'n', long)]
        iterations: Option<u32>,
        /// WAV or MP3 file (defaults to `[audio] file`)
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "info,gemlink_core=warn",
        1 => "info,gemlink_core=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .init();

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("fatal: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(key) = cli.api_key {
        config.api.key = Some(key);
    }
    if let Some(host) = cli.host {
        config.api.host = host;
    }
    if let Some(port) = cli.port {
        config.api.port = port;
    }
    tracing::debug!(host = %config.api.host, port = config.api.port, "resolved endpoint");

    let mut session = session(&config)?;

    match cli.command {
        Command::Ask { text } => {
            let output = session.ask(&text).await?;
            println!("{}", output.payload);
            tracing::info!(latency_ms = output.latency_ms(), "done");
        }
        Command::Transcribe { file, prompt } => {
            let clip = load_clip(file.as_ref().or(config.audio.file.as_ref()))?;
            let prompt = prompt.unwrap_or_else(|| config.audio.prompt.clone());
            let output = session
                .transcribe(&clip, &prompt, config.audio.max_tokens)
                .await?;
            println!("{}", output.payload);
            tracing::info!(latency_ms = output.latency_ms(), "done");
        }
        Command::Speak { text, out, voice } => {
            if let Some(voice) = voice {
                session = session.with_voice(&voice);
            }
            let speech = session.speak(&text).await?;
            let latency_ms = u64::try_from(speech.latency.as_millis()).unwrap_or(u64::MAX);
            match out {
                Some(path) => {
                    std::fs::write(&path, &speech.wav)
                        .with_context(|| format!("writing {}", path.display()))?;
                    tracing::info!(path = %path.display(), bytes = speech.wav.len(), latency_ms, "saved speech");
                }
                None => tracing::info!(bytes = speech.wav.len(), latency_ms, "speech received (use --out to save)"),
            }
        }
        Command::Bench { iterations, file } => {
            let clip = load_clip(file.as_ref().or(config.audio.file.as_ref()))?;
            let settings = BenchSettings {
                iterations: iterations.unwrap_or(config.bench.iterations).max(1),
                prompt: config.audio.prompt.clone(),
                max_tokens: config.audio.max_tokens,
                cooldown: Duration::from_millis(config.bench.cooldown_ms),
            };
            let report = bench::run(&mut session, &clip, &settings).await;
            print!("{}", report.render());
            if !report.passed(config.bench.min_success_ratio) {
                tracing::error!(
                    ratio = report.success_ratio(),
                    required = config.bench.min_success_ratio,
                    "benchmark failed"
                );
                return Ok(ExitCode::FAILURE);
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn session(config: &Config) -> anyhow::Result<GeminiSession<TcpTransport>> {
    let key = config
        .api
        .key
        .as_deref()
        .context("no API key: set GEMLINK_API_KEY, --api-key or [api] key")?;
    let client = GeminiClient::new(&config.api.host, key)
        .with_models(&config.api.text_model, &config.api.speech_model);
    let format = PcmFormat {
        sample_rate: config.audio.sample_rate,
        ..PcmFormat::default()
    };
    Ok(GeminiSession::new(TcpTransport::new(), client)
        .with_port(config.api.port)
        .with_voice(&config.api.voice)
        .with_pcm_format(format)
        .with_options(config.exchange.text_options(), config.exchange.speech_options()))
}

fn load_clip(path: Option<&PathBuf>) -> anyhow::Result<AudioClip> {
    let path = path.context("no audio file: pass one or set [audio] file")?;
    AudioClip::load(path).with_context(|| format!("loading {}", path.display()))
}
