//! Capture and replay configuration.
//!
//! A [`Config`] is an explicit value passed at construction to each component
//! — there is no ambient global. It loads from and saves to a JSON file;
//! a missing file yields the defaults, which match the game's out-of-the-box
//! telemetry settings (UDP port 20777).

use crate::{Result, TelemetryError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default UDP telemetry port of the game.
pub const DEFAULT_UDP_PORT: u16 = 20777;
/// Default bind address (all interfaces).
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0";
/// Default directory for recording files.
pub const DEFAULT_RECORDING_DIR: &str = "./recordings";
/// Default socket read buffer size in bytes.
pub const DEFAULT_BUFFER_SIZE: usize = 65536;
/// Default per-iteration socket read deadline in milliseconds.
pub const DEFAULT_READ_TIMEOUT_MS: u64 = 100;
/// Default session-detection window in milliseconds.
pub const DEFAULT_DETECTION_WINDOW_MS: u64 = 5000;

/// Validated configuration for all capture/replay components.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// UDP port the receiver binds.
    pub udp_port: u16,
    /// Address the receiver binds.
    pub bind_address: String,
    /// Directory recording files are written to.
    pub recording_dir: PathBuf,
    /// Socket read buffer size in bytes.
    pub buffer_size: usize,
    /// Per-iteration read deadline for the ingestion loop, in milliseconds.
    pub read_timeout_ms: u64,
    /// Session-detection window, in milliseconds.
    pub detection_window_ms: u64,
    /// Default playback speed factor (1.0 = real time).
    pub playback_speed: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            udp_port: DEFAULT_UDP_PORT,
            bind_address: DEFAULT_BIND_ADDRESS.to_string(),
            recording_dir: PathBuf::from(DEFAULT_RECORDING_DIR),
            buffer_size: DEFAULT_BUFFER_SIZE,
            read_timeout_ms: DEFAULT_READ_TIMEOUT_MS,
            detection_window_ms: DEFAULT_DETECTION_WINDOW_MS,
            playback_speed: 1.0,
        }
    }
}

impl Config {
    /// Loads configuration from a JSON file.
    ///
    /// A missing file is not an error: the defaults are returned so a fresh
    /// installation works without any setup.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = match std::fs::read(path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => {
                return Err(TelemetryError::io(format!("reading config {}", path.display()), e));
            }
        };

        serde_json::from_slice(&data).map_err(|e| {
            TelemetryError::configuration(format!("failed to parse {}: {e}", path.display()))
        })
    }

    /// Saves the configuration as pretty-printed JSON, creating parent
    /// directories as needed.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)
                .map_err(|e| TelemetryError::io(format!("creating {}", dir.display()), e))?;
        }

        let data = serde_json::to_vec_pretty(self)
            .map_err(|e| TelemetryError::configuration(format!("failed to serialize: {e}")))?;
        std::fs::write(path, data)
            .map_err(|e| TelemetryError::io(format!("writing config {}", path.display()), e))
    }

    /// Checks the configuration for values no component could start with.
    pub fn validate(&self) -> Result<()> {
        if self.udp_port == 0 {
            return Err(TelemetryError::configuration("UDP port must be non-zero"));
        }
        if self.bind_address.trim().is_empty() {
            return Err(TelemetryError::configuration("bind address cannot be empty"));
        }
        if self.recording_dir.as_os_str().is_empty() {
            return Err(TelemetryError::configuration("recording directory cannot be empty"));
        }
        if self.buffer_size < 1024 {
            return Err(TelemetryError::configuration(format!(
                "buffer size too small: {} (minimum 1024)",
                self.buffer_size
            )));
        }
        if self.read_timeout_ms == 0 {
            return Err(TelemetryError::configuration("read timeout must be non-zero"));
        }
        if !(self.playback_speed > 0.0) {
            return Err(TelemetryError::configuration(format!(
                "invalid playback speed: {} (must be > 0)",
                self.playback_speed
            )));
        }
        Ok(())
    }

    /// Per-iteration read deadline as a [`Duration`].
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    /// Session-detection window as a [`Duration`].
    pub fn detection_window(&self) -> Duration {
        Duration::from_millis(self.detection_window_ms)
    }
}
