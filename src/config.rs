use anyhow::{Context, Result};
use serde::Deserialize;

use crate::recognition::TaskHint;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub service: ServiceConfig,
    pub recognition: RecognitionConfig,
    pub audio: AudioConfig,
    pub session: SessionPolicyConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub name: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: "transcription-session".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RecognitionConfig {
    /// BCP-47 locale the recognizer is created for
    pub locale: String,
    pub report_partial_results: bool,
    pub requires_on_device: bool,
    pub task_hint: TaskHint,
    /// Phrase hints biasing the recognizer (names, jargon)
    pub contextual_strings: Vec<String>,
}

impl Default for RecognitionConfig {
    fn default() -> Self {
        Self {
            locale: "en-US".to_string(),
            report_partial_results: true,
            requires_on_device: false,
            task_hint: TaskHint::Dictation,
            contextual_strings: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub sample_rate: u32,
    pub channels: u16,
    /// Frames per tap buffer handed to the recognizer
    pub buffer_size: usize,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16000,
            channels: 1,
            buffer_size: 1024,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionPolicyConfig {
    /// Return the status indicator to Idle when a session ends in error
    pub idle_on_error: bool,
    /// Capacity of the recognition event broadcast channel
    pub event_capacity: usize,
}

impl Default for SessionPolicyConfig {
    fn default() -> Self {
        Self {
            idle_on_error: true,
            event_capacity: 64,
        }
    }
}

impl Config {
    /// Load configuration from `path` (any format the `config` crate
    /// recognises by extension), overlaid with `TRANSCRIBE__*` env vars.
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(config::Environment::with_prefix("TRANSCRIBE").separator("__"))
            .build()
            .with_context(|| format!("Failed to read config from {}", path))?;

        settings
            .try_deserialize()
            .context("Failed to deserialize config")
    }
}
