//! Latency benchmark: transcribe a clip, speak the answer, repeat.

use std::time::Duration;

use gemlink_core::{AudioClip, ExchangeError, GeminiSession, Transport};
use tracing::{info, warn};

/// Summary of one latency series, in milliseconds.
#[derive(Debug, Clone, PartialEq)]
pub struct LatencyStats {
    pub count: usize,
    pub min: f64,
    pub mean: f64,
    pub p50: f64,
    pub p90: f64,
    pub max: f64,
}

impl LatencyStats {
    pub fn from_samples(samples: &[u64]) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }
        let mut sorted = samples.to_vec();
        sorted.sort_unstable();
        let sum: u64 = sorted.iter().sum();
        Some(Self {
            count: sorted.len(),
            min: sorted[0] as f64,
            mean: sum as f64 / sorted.len() as f64,
            p50: percentile(&sorted, 50.0),
            p90: percentile(&sorted, 90.0),
            max: sorted[sorted.len() - 1] as f64,
        })
    }
}

/// Linear-interpolated percentile of an ascending, non-empty slice.
pub fn percentile(sorted: &[u64], pct: f64) -> f64 {
    let Some(&last) = sorted.last() else {
        return 0.0;
    };
    if sorted.len() == 1 {
        return last as f64;
    }
    let rank = (pct.clamp(0.0, 100.0) / 100.0) * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let weight = rank - lower as f64;
    sorted[lower] as f64 * (1.0 - weight) + sorted[upper] as f64 * weight
}

/// Empirical CDF points `(latency_ms, fraction <= latency)`.
pub fn cdf(samples: &[u64]) -> Vec<(u64, f64)> {
    let mut sorted = samples.to_vec();
    sorted.sort_unstable();
    let n = sorted.len() as f64;
    sorted
        .into_iter()
        .enumerate()
        .map(|(i, latency)| (latency, (i + 1) as f64 / n))
        .collect()
}

#[derive(Debug, Clone)]
pub struct BenchSettings {
    pub iterations: u32,
    pub prompt: String,
    pub max_tokens: u32,
    pub cooldown: Duration,
}

/// Outcome of a benchmark run.
#[derive(Debug, Default)]
pub struct BenchReport {
    pub iterations: u32,
    /// Latency of each successful transcription.
    pub transcribe_ms: Vec<u64>,
    /// Speech latency of each fully successful iteration.
    pub speech_ms: Vec<u64>,
    /// The error that stopped the run early, if any.
    pub failure: Option<String>,
}

impl BenchReport {
    pub fn successes(&self) -> usize {
        self.speech_ms.len()
    }

    pub fn success_ratio(&self) -> f64 {
        if self.iterations == 0 {
            return 0.0;
        }
        self.successes() as f64 / f64::from(self.iterations)
    }

    pub fn passed(&self, min_success_ratio: f64) -> bool {
        self.success_ratio() >= min_success_ratio
    }

    /// Human-readable summary with the CDF of transcription latency.
    pub fn render(&self) -> String {
        let mut out = format!("Success: {}/{}\n", self.successes(), self.iterations);
        for (name, samples) in [("transcribe", &self.transcribe_ms), ("speech", &self.speech_ms)] {
            if let Some(stats) = LatencyStats::from_samples(samples) {
                out.push_str(&format!(
                    "{name}: n={} min={:.0} mean={:.1} p50={:.1} p90={:.1} max={:.0} ms\n",
                    stats.count, stats.min, stats.mean, stats.p50, stats.p90, stats.max
                ));
            }
        }
        if !self.transcribe_ms.is_empty() {
            out.push_str("latency_ms,cdf\n");
            for (latency, fraction) in cdf(&self.transcribe_ms) {
                out.push_str(&format!("{latency},{fraction:.3}\n"));
            }
        }
        if let Some(failure) = &self.failure {
            out.push_str(&format!("Stopped early: {failure}\n"));
        }
        out
    }
}

fn millis(latency: Duration) -> u64 {
    u64::try_from(latency.as_millis()).unwrap_or(u64::MAX)
}

/// Run `settings.iterations` rounds of transcribe-then-speak. The first
/// failure of either step ends the run.
pub async fn run<T: Transport>(
    session: &mut GeminiSession<T>,
    clip: &AudioClip,
    settings: &BenchSettings,
) -> BenchReport {
    let mut report = BenchReport {
        iterations: settings.iterations,
        ..BenchReport::default()
    };

    for i in 0..settings.iterations {
        info!(iteration = i + 1, of = settings.iterations, "bench iteration");
        if let Err(err) = round(session, clip, settings, &mut report).await {
            warn!(iteration = i + 1, %err, "bench iteration failed");
            report.failure = Some(err.to_string());
            break;
        }
        if i + 1 < settings.iterations && !settings.cooldown.is_zero() {
            tokio::time::sleep(settings.cooldown).await;
        }
    }
    report
}

async fn round<T: Transport>(
    session: &mut GeminiSession<T>,
    clip: &AudioClip,
    settings: &BenchSettings,
    report: &mut BenchReport,
) -> Result<(), ExchangeError> {
    let answer = session
        .transcribe(clip, &settings.prompt, settings.max_tokens)
        .await?;
    info!(latency_ms = answer.latency_ms(), reply = %answer.payload, "transcribed");
    report.transcribe_ms.push(millis(answer.latency));

    let speech = session.speak(&answer.payload).await?;
    info!(latency_ms = millis(speech.latency), wav_bytes = speech.wav.len(), "spoken");
    report.speech_ms.push(millis(speech.latency));
    Ok(())
}
