//! Playback pipeline configuration
//!
//! Typed configuration with per-table defaults, loadable from a TOML file.
//! Every field has a default so a missing or partial file still yields a
//! working configuration.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub transcoder: TranscoderConfig,
    pub selection: SelectionConfig,
    pub session: SessionConfig,
}

/// External transcoder invocation parameters
///
/// The base argument template reads raw bytes from standard input and emits a
/// fixed sample rate, channel count, and container on standard output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscoderConfig {
    /// Transcoder executable, resolved via PATH when not absolute
    pub bin: PathBuf,
    /// Output sample rate in Hz
    pub sample_rate: u32,
    /// Output channel count
    pub channels: u8,
    /// Output container format
    pub container: String,
}

impl Default for TranscoderConfig {
    fn default() -> Self {
        Self {
            bin: PathBuf::from("ffmpeg"),
            sample_rate: 44_100,
            channels: 2,
            container: "mp3".to_string(),
        }
    }
}

/// Target profile for selecting among the provider's encodings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionConfig {
    /// Quality identifiers in priority order; the first match wins
    pub quality_priority: Vec<u32>,
    /// Accepted container formats
    pub containers: Vec<String>,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            quality_priority: vec![91, 92, 93, 140],
            containers: vec!["mp4".to_string(), "ts".to_string()],
        }
    }
}

/// Session-level tunables
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// How long to wait for a voice connection to report ready
    pub join_timeout_ms: u64,
    /// Buffer size of the session event broadcast channel
    pub event_buffer: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            join_timeout_ms: 5_000,
            event_buffer: 64,
        }
    }
}

impl SessionConfig {
    pub fn join_timeout(&self) -> Duration {
        Duration::from_millis(self.join_timeout_ms)
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read {}: {}", path.display(), e)))?;
        toml::from_str(&raw)
            .map_err(|e| Error::Config(format!("failed to parse {}: {}", path.display(), e)))
    }
}
