//! PCM to WAV wrapping.
//!
//! Writes the canonical 44-byte RIFF header by hand rather than going
//! through a sample writer: the PCM is passed through byte-for-byte, so odd
//! lengths and partial frames survive unchanged.

/// Size of the canonical PCM WAV header.
pub const WAV_HEADER_LEN: usize = 44;

const FORMAT_PCM: u16 = 1;
const FMT_CHUNK_LEN: u32 = 16;

/// Layout of raw little-endian PCM samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PcmFormat {
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
}

impl Default for PcmFormat {
    /// 24 kHz mono PCM16, what speech synthesis returns.
    fn default() -> Self {
        Self {
            sample_rate: 24_000,
            channels: 1,
            bits_per_sample: 16,
        }
    }
}

impl PcmFormat {
    /// Bytes per frame. Saturates at `u16::MAX` for formats the header
    /// cannot describe.
    pub fn block_align(&self) -> u16 {
        self.channels.saturating_mul(self.bits_per_sample / 8)
    }

    /// Saturates at `u32::MAX`.
    pub fn byte_rate(&self) -> u32 {
        self.sample_rate.saturating_mul(u32::from(self.block_align()))
    }
}

/// Prefix `pcm` with a 44-byte WAV header describing `format`.
///
/// Sizes are 32-bit fields; a payload over 4 GiB saturates them.
pub fn to_wav(pcm: &[u8], format: PcmFormat) -> Vec<u8> {
    let data_len = u32::try_from(pcm.len()).unwrap_or(u32::MAX);
    let riff_len = data_len.saturating_add(36);

    let mut out = Vec::with_capacity(WAV_HEADER_LEN + pcm.len());
    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&riff_len.to_le_bytes());
    out.extend_from_slice(b"WAVE");

    out.extend_from_slice(b"fmt ");
    out.extend_from_slice(&FMT_CHUNK_LEN.to_le_bytes());
    out.extend_from_slice(&FORMAT_PCM.to_le_bytes());
    out.extend_from_slice(&format.channels.to_le_bytes());
    out.extend_from_slice(&format.sample_rate.to_le_bytes());
    out.extend_from_slice(&format.byte_rate().to_le_bytes());
    out.extend_from_slice(&format.block_align().to_le_bytes());
    out.extend_from_slice(&format.bits_per_sample.to_le_bytes());

    out.extend_from_slice(b"data");
    out.extend_from_slice(&data_len.to_le_bytes());
    out.extend_from_slice(pcm);
    out
}
