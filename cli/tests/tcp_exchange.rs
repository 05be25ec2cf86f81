//! Full exchanges through `TcpTransport` against the fake server.
//!
//! # Design
//! The fake server runs on a random local port inside the test runtime.
//! Poll intervals are shortened so the real-time waits stay small; the
//! completion thresholds are the production presets.

use std::net::SocketAddr;

use gemlink_cli::bench::{self, BenchSettings};
use gemlink_cli::TcpTransport;
use gemlink_core::{
    to_wav, AudioClip, ExchangeError, ExchangeOptions, GeminiClient, GeminiSession, PcmFormat,
};
use tokio::net::TcpListener;

async fn start_server() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(mock_server::run(listener));
    addr
}

fn fast(base: ExchangeOptions) -> ExchangeOptions {
    ExchangeOptions {
        settle_delay_ms: 20,
        busy_poll_interval_ms: 5,
        idle_poll_interval_ms: 10,
        hard_timeout_ms: 10_000,
        ..base
    }
}

fn session(addr: SocketAddr, key: &str) -> GeminiSession<TcpTransport> {
    let client = GeminiClient::new(&addr.ip().to_string(), key);
    GeminiSession::new(TcpTransport::new(), client)
        .with_port(addr.port())
        .with_options(fast(ExchangeOptions::text()), fast(ExchangeOptions::speech()))
}

fn clip() -> AudioClip {
    let pcm: Vec<u8> = (0..1600u32).flat_map(|i| ((i % 64) as i16 * 100).to_le_bytes()).collect();
    AudioClip::from_wav(to_wav(&pcm, PcmFormat { sample_rate: 16_000, ..PcmFormat::default() })).unwrap()
}

#[tokio::test]
async fn ask_over_tcp() {
    let addr = start_server().await;
    let mut session = session(addr, "test-key");

    let output = session.ask("hi").await.unwrap();

    assert_eq!(output.payload, "echo: hi");
    assert!(output.latency_ms() >= 0);
    assert_eq!(session.transport().open_sockets(), 0);
}

#[tokio::test]
async fn transcribe_then_speak_over_tcp() {
    let addr = start_server().await;
    let mut session = session(addr, "test-key");
    let clip = clip();

    let answer = session.transcribe(&clip, "what is said?", 64).await.unwrap();
    assert_eq!(
        answer.payload,
        format!("heard {} base64 bytes of audio/wav: what is said?", clip.base64.len())
    );

    let speech = session.speak("hello").await.unwrap();
    assert_eq!(&speech.wav[..4], b"RIFF");
    assert_eq!(speech.wav.len(), 44 + 5 * 240 * 2);
}

#[tokio::test]
async fn missing_key_is_api_error() {
    let addr = start_server().await;
    let mut session = session(addr, "");

    let err = session.ask("hi").await.unwrap_err();

    match err {
        ExchangeError::Api { message } => assert!(message.contains("API key")),
        other => panic!("expected API error, got {other}"),
    }
}

#[tokio::test]
async fn closed_port_is_connect_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    let mut session = session(addr, "test-key");

    let err = session.ask("hi").await.unwrap_err();

    assert!(matches!(err, ExchangeError::Connect { .. }), "{err}");
}

#[tokio::test]
async fn bench_runs_all_iterations() {
    let addr = start_server().await;
    let mut session = session(addr, "test-key");
    let settings = BenchSettings {
        iterations: 2,
        prompt: "answer briefly".to_string(),
        max_tokens: 32,
        cooldown: std::time::Duration::ZERO,
    };

    let report = bench::run(&mut session, &clip(), &settings).await;

    assert_eq!(report.successes(), 2);
    assert!(report.failure.is_none());
    assert!(report.passed(0.3));
    let rendered = report.render();
    assert!(rendered.starts_with("Success: 2/2\n"));
    assert!(rendered.contains("latency_ms,cdf\n"));
}

#[tokio::test]
async fn bench_stops_at_first_failure() {
    let addr = start_server().await;
    let mut session = session(addr, "");
    let settings = BenchSettings {
        iterations: 5,
        prompt: "p".to_string(),
        max_tokens: 8,
        cooldown: std::time::Duration::ZERO,
    };

    let report = bench::run(&mut session, &clip(), &settings).await;

    assert_eq!(report.successes(), 0);
    assert!(report.transcribe_ms.is_empty());
    assert!(report.failure.unwrap().contains("API key"));
}
