// Synthetic audio backend producing silent buffers at real-time pace.
//
// Stands in for the microphone when replaying recognizer scripts and in tests.

use anyhow::{bail, Result};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::info;

use super::backend::{AudioBackend, AudioBackendConfig, AudioFrame};

/// Counters shared between a `SyntheticBackend` and whoever inspects it
#[derive(Debug, Clone, Default)]
pub struct CaptureProbe {
    prepares: Arc<AtomicUsize>,
    starts: Arc<AtomicUsize>,
    stops: Arc<AtomicUsize>,
    capturing: Arc<AtomicBool>,
}

impl CaptureProbe {
    pub fn prepares(&self) -> usize {
        self.prepares.load(Ordering::SeqCst)
    }

    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    /// Number of stops that actually released a running capture
    pub fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }

    pub fn is_capturing(&self) -> bool {
        self.capturing.load(Ordering::SeqCst)
    }
}

pub struct SyntheticBackend {
    config: AudioBackendConfig,
    probe: CaptureProbe,
    producer: Option<JoinHandle<()>>,
    fail_start: Option<String>,
}

impl SyntheticBackend {
    pub fn new(config: AudioBackendConfig) -> Self {
        Self {
            config,
            probe: CaptureProbe::default(),
            producer: None,
            fail_start: None,
        }
    }

    /// A backend whose `start` fails with `message`, like a device that
    /// refuses to open
    pub fn failing(config: AudioBackendConfig, message: impl Into<String>) -> Self {
        Self {
            fail_start: Some(message.into()),
            ..Self::new(config)
        }
    }

    pub fn probe(&self) -> CaptureProbe {
        self.probe.clone()
    }
}

#[async_trait::async_trait]
impl AudioBackend for SyntheticBackend {
    async fn prepare(&mut self) -> Result<()> {
        self.probe.prepares.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>> {
        if self.probe.is_capturing() {
            bail!("Already capturing");
        }
        if let Some(message) = &self.fail_start {
            bail!("{}", message);
        }

        info!(
            "Starting synthetic capture ({}Hz, {} channels, {} frames per buffer)",
            self.config.target_sample_rate, self.config.target_channels, self.config.buffer_size
        );

        let (tx, rx) = mpsc::channel(32);
        let config = self.config.clone();
        let period = Duration::from_millis(config.buffer_duration_ms().max(1));

        let producer = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            let mut timestamp_ms = 0u64;
            loop {
                ticker.tick().await;
                let frame = AudioFrame {
                    samples: vec![0i16; config.buffer_size * config.target_channels as usize],
                    sample_rate: config.target_sample_rate,
                    channels: config.target_channels,
                    timestamp_ms,
                };
                timestamp_ms += frame.duration_ms();
                if tx.send(frame).await.is_err() {
                    break;
                }
            }
        });

        self.producer = Some(producer);
        self.probe.starts.fetch_add(1, Ordering::SeqCst);
        self.probe.capturing.store(true, Ordering::SeqCst);

        Ok(rx)
    }

    async fn stop(&mut self) -> Result<()> {
        if !self.probe.is_capturing() {
            return Ok(());
        }

        if let Some(producer) = self.producer.take() {
            producer.abort();
        }

        self.probe.capturing.store(false, Ordering::SeqCst);
        self.probe.stops.fetch_add(1, Ordering::SeqCst);

        info!("Synthetic capture stopped");

        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.probe.is_capturing()
    }

    fn name(&self) -> &str {
        "synthetic"
    }
}
