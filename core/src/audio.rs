//! Audio clips going up and PCM coming back.

use std::path::Path;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use tracing::info;

use crate::error::AudioError;
use crate::wav::{self, PcmFormat, WAV_HEADER_LEN};

/// An audio file ready to embed in a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioClip {
    pub mime_type: &'static str,
    pub base64: String,
    /// Format read from the header; `None` for compressed clips.
    pub format: Option<PcmFormat>,
}

impl AudioClip {
    /// Load a `.wav` or `.mp3` file, validating its container.
    pub fn load(path: &Path) -> Result<Self, AudioError> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        let bytes = std::fs::read(path)?;
        let clip = match extension.as_deref() {
            Some("wav") => Self::from_wav(bytes)?,
            Some("mp3") => Self::from_mp3(bytes)?,
            _ => return Err(AudioError::Unsupported(path.display().to_string())),
        };
        info!(
            path = %path.display(),
            mime = clip.mime_type,
            encoded = clip.base64.len(),
            "loaded audio clip"
        );
        Ok(clip)
    }

    pub fn from_wav(bytes: Vec<u8>) -> Result<Self, AudioError> {
        if bytes.len() < WAV_HEADER_LEN {
            return Err(AudioError::Wav(format!("{} bytes is too small for a header", bytes.len())));
        }
        if &bytes[0..4] != b"RIFF" || &bytes[8..12] != b"WAVE" {
            return Err(AudioError::Wav("missing RIFF/WAVE magic".to_string()));
        }
        let spec = hound::WavReader::new(std::io::Cursor::new(&bytes))?.spec();
        Ok(Self {
            mime_type: "audio/wav",
            base64: STANDARD.encode(&bytes),
            format: Some(PcmFormat {
                sample_rate: spec.sample_rate,
                channels: spec.channels,
                bits_per_sample: spec.bits_per_sample,
            }),
        })
    }

    pub fn from_mp3(bytes: Vec<u8>) -> Result<Self, AudioError> {
        if bytes.len() < 4 {
            return Err(AudioError::Mp3("file too small".to_string()));
        }
        let has_id3 = bytes.starts_with(b"ID3");
        let has_sync = bytes[0] == 0xFF && (bytes[1] & 0xE0) == 0xE0;
        if !has_id3 && !has_sync {
            return Err(AudioError::Mp3(format!(
                "no ID3 tag or frame sync (header {:02x?})",
                &bytes[..4]
            )));
        }
        Ok(Self {
            mime_type: "audio/mpeg",
            base64: STANDARD.encode(&bytes),
            format: None,
        })
    }
}

/// Decode base64 PCM returned by speech synthesis and wrap it as WAV.
pub fn decode_pcm_to_wav(pcm_b64: &str, format: PcmFormat) -> Result<Vec<u8>, AudioError> {
    let pcm = STANDARD.decode(pcm_b64.trim())?;
    Ok(wav::to_wav(&pcm, format))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_wav() -> Vec<u8> {
        wav::to_wav(&[1, 0, 2, 0, 3, 0], PcmFormat {
            sample_rate: 16_000,
            channels: 1,
            bits_per_sample: 16,
        })
    }

    #[test]
    fn wav_clip_reads_format() {
        let clip = AudioClip::from_wav(sample_wav()).unwrap();
        assert_eq!(clip.mime_type, "audio/wav");
        assert_eq!(clip.format.unwrap().sample_rate, 16_000);
        assert_eq!(STANDARD.decode(&clip.base64).unwrap(), sample_wav());
    }

    #[test]
    fn wav_rejects_bad_magic_and_short_files() {
        let mut bad = sample_wav();
        bad[0..4].copy_from_slice(b"RIFX");
        assert!(matches!(AudioClip::from_wav(bad), Err(AudioError::Wav(_))));
        assert!(matches!(AudioClip::from_wav(vec![0; 10]), Err(AudioError::Wav(_))));
    }

    #[test]
    fn mp3_accepts_id3_and_frame_sync() {
        assert!(AudioClip::from_mp3(b"ID3\x04rest".to_vec()).is_ok());
        assert!(AudioClip::from_mp3(vec![0xFF, 0xFB, 0x90, 0x00]).is_ok());
        assert!(matches!(
            AudioClip::from_mp3(b"OggS".to_vec()),
            Err(AudioError::Mp3(_))
        ));
    }

    #[test]
    fn load_dispatches_on_extension() {
        let dir = tempfile::tempdir().unwrap();
        let wav_path = dir.path().join("clip.WAV");
        std::fs::write(&wav_path, sample_wav()).unwrap();
        assert_eq!(AudioClip::load(&wav_path).unwrap().mime_type, "audio/wav");

        let ogg = dir.path().join("clip.ogg");
        std::fs::write(&ogg, b"OggS").unwrap();
        assert!(matches!(AudioClip::load(&ogg), Err(AudioError::Unsupported(_))));
    }

    #[test]
    fn pcm_base64_becomes_wav() {
        let wav_bytes = decode_pcm_to_wav("AAEC\n", PcmFormat::default()).unwrap();
        assert_eq!(wav_bytes.len(), WAV_HEADER_LEN + 3);
        assert_eq!(&wav_bytes[WAV_HEADER_LEN..], &[0, 1, 2]);
        assert!(matches!(
            decode_pcm_to_wav("not base64!", PcmFormat::default()),
            Err(AudioError::Base64(_))
        ));
    }
}
