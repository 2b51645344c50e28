//! Durable appender for captured packets.
//!
//! The recorder has no background task: `record_packet` executes on the
//! caller's thread under an internal lock, so concurrent callers are safe
//! even though the design intends a single feeder. Durability is best-effort
//! — writes go through a `BufWriter` and are flushed on `stop()`, but nothing
//! forces them to disk before that.

use crate::f1tr::format::{ENTRY_OVERHEAD, FileHeader, encode_entry_framing};
use crate::packet::CapturedPacket;
use crate::{Result, TelemetryError};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Instant;
use tracing::{debug, info};

/// Recording statistics, snapshotted as an independent copy.
#[derive(Debug, Clone)]
pub struct RecorderStats {
    pub packets_recorded: u64,
    pub bytes_written: u64,
    pub errors: u64,
    pub started_at: Instant,
    pub session_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Running,
    Stopped,
}

struct Inner {
    file: Option<BufWriter<File>>,
    phase: Phase,
    stats: RecorderStats,
}

/// Appends timestamped packets to an F1TR recording file.
pub struct Recorder {
    output_dir: PathBuf,
    output_path: PathBuf,
    inner: Mutex<Inner>,
}

impl Recorder {
    /// Creates a recorder targeting `{output_dir}/{timestamp}_{session}.f1tr`.
    ///
    /// No filesystem access happens here; the directory and file are created
    /// by [`start`](Self::start).
    pub fn new<P: AsRef<Path>>(output_dir: P, session_name: &str) -> Self {
        let output_dir = output_dir.as_ref().to_path_buf();
        let timestamp = chrono::Local::now().format("%Y-%m-%d_%H-%M-%S");
        let output_path = output_dir.join(format!("{timestamp}_{session_name}.f1tr"));

        Self {
            output_dir,
            output_path,
            inner: Mutex::new(Inner {
                file: None,
                phase: Phase::Idle,
                stats: RecorderStats {
                    packets_recorded: 0,
                    bytes_written: 0,
                    errors: 0,
                    started_at: Instant::now(),
                    session_name: session_name.to_string(),
                },
            }),
        }
    }

    /// Creates the output directory and file and writes the file header.
    ///
    /// Fails with a `State` error when already running or already stopped
    /// (a recorder is not restartable), and with an `Io` error on any
    /// filesystem failure.
    pub fn start(&self) -> Result<()> {
        let mut inner = self.lock();
        match inner.phase {
            Phase::Idle => {}
            Phase::Running => return Err(TelemetryError::state("start recorder", "running")),
            Phase::Stopped => return Err(TelemetryError::state("start recorder", "stopped")),
        }

        std::fs::create_dir_all(&self.output_dir).map_err(|e| {
            TelemetryError::io(format!("creating {}", self.output_dir.display()), e)
        })?;
        let file = File::create(&self.output_path).map_err(|e| {
            TelemetryError::io(format!("creating {}", self.output_path.display()), e)
        })?;

        let mut writer = BufWriter::new(file);
        writer
            .write_all(&FileHeader::new().encode())
            .map_err(|e| TelemetryError::io("writing recording header", e))?;

        inner.file = Some(writer);
        inner.phase = Phase::Running;
        inner.stats.started_at = Instant::now();
        info!("recording to {}", self.output_path.display());
        Ok(())
    }

    /// Appends one packet: timestamp, payload length, payload.
    ///
    /// The byte counter includes the 12-byte entry framing. Requires a
    /// running recorder.
    pub fn record_packet(&self, packet: &CapturedPacket) -> Result<()> {
        let mut inner = self.lock();
        if inner.phase != Phase::Running {
            return Err(TelemetryError::state("record packet", "not running"));
        }

        let framing = encode_entry_framing(packet.received_at_nanos, packet.payload.len() as u32);
        let write = inner
            .file
            .as_mut()
            .map(|file| {
                file.write_all(&framing).and_then(|_| file.write_all(&packet.payload))
            })
            .unwrap_or_else(|| Err(std::io::Error::other("recording file missing")));

        if let Err(e) = write {
            inner.stats.errors += 1;
            return Err(TelemetryError::io("appending recording entry", e));
        }

        inner.stats.packets_recorded += 1;
        inner.stats.bytes_written += (packet.payload.len() + ENTRY_OVERHEAD) as u64;
        Ok(())
    }

    /// Flushes and closes the file. Idempotent: stopping a recorder that is
    /// not running does nothing.
    pub fn stop(&self) -> Result<()> {
        let mut inner = self.lock();
        if inner.phase != Phase::Running {
            return Ok(());
        }

        inner.phase = Phase::Stopped;
        if let Some(mut file) = inner.file.take() {
            file.flush().map_err(|e| TelemetryError::io("flushing recording", e))?;
        }
        debug!(
            "recording stopped: {} packets, {} bytes",
            inner.stats.packets_recorded, inner.stats.bytes_written
        );
        Ok(())
    }

    /// Snapshot of the current statistics.
    pub fn stats(&self) -> RecorderStats {
        self.lock().stats.clone()
    }

    /// Whether the recorder is currently accepting packets.
    pub fn is_running(&self) -> bool {
        self.lock().phase == Phase::Running
    }

    /// The file this recorder writes to.
    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // Poisoning would mean a panic inside one of the short critical
        // sections above; there is no state worth salvaging past that.
        self.inner.lock().expect("recorder lock poisoned")
    }
}
