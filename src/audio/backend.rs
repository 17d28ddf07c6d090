use anyhow::Result;
use tokio::sync::mpsc;

use crate::config::AudioConfig;

/// Audio sample data (16-bit PCM, interleaved)
#[derive(Debug, Clone)]
pub struct AudioFrame {
    /// Raw audio samples (i16 PCM, interleaved)
    pub samples: Vec<i16>,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of channels
    pub channels: u16,
    /// Timestamp in milliseconds since capture started
    pub timestamp_ms: u64,
}

impl AudioFrame {
    /// Duration covered by this frame in milliseconds
    pub fn duration_ms(&self) -> u64 {
        if self.sample_rate == 0 || self.channels == 0 {
            return 0;
        }
        let frames = self.samples.len() as u64 / self.channels as u64;
        frames * 1000 / self.sample_rate as u64
    }
}

/// Configuration for audio backend
#[derive(Debug, Clone)]
pub struct AudioBackendConfig {
    /// Target sample rate
    pub target_sample_rate: u32,
    /// Target channel count (1 = mono, 2 = stereo)
    pub target_channels: u16,
    /// Frames per tap buffer (the recognizer receives one `AudioFrame` per buffer)
    pub buffer_size: usize,
}

impl Default for AudioBackendConfig {
    fn default() -> Self {
        Self {
            target_sample_rate: 16000,
            target_channels: 1,
            buffer_size: 1024,
        }
    }
}

impl From<&AudioConfig> for AudioBackendConfig {
    fn from(audio: &AudioConfig) -> Self {
        Self {
            target_sample_rate: audio.sample_rate,
            target_channels: audio.channels,
            buffer_size: audio.buffer_size,
        }
    }
}

impl AudioBackendConfig {
    /// Wall-clock duration of one tap buffer in milliseconds
    pub fn buffer_duration_ms(&self) -> u64 {
        if self.target_sample_rate == 0 {
            return 0;
        }
        self.buffer_size as u64 * 1000 / self.target_sample_rate as u64
    }
}

/// Audio capture backend trait
///
/// The session owns exactly one backend and drives it through
/// `prepare` → `start` → `stop`. `stop` must be safe to call when the
/// backend is not capturing; teardown can reach it from several paths.
#[async_trait::async_trait]
pub trait AudioBackend: Send + Sync {
    /// Acquire the input device and configure the tap
    async fn prepare(&mut self) -> Result<()>;

    /// Start capturing audio
    ///
    /// Returns a channel receiver that will receive audio frames
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>>;

    /// Stop capturing audio and release the tap
    async fn stop(&mut self) -> Result<()>;

    /// Check if backend is currently capturing
    fn is_capturing(&self) -> bool;

    /// Get backend name for logging
    fn name(&self) -> &str;
}
