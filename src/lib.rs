//! Capture and replay for the F1 game's UDP telemetry stream.
//!
//! The crate is built from four cooperating components:
//!
//! - [`Receiver`] binds a UDP socket and feeds decoded packets into a
//!   bounded queue, shedding load when the consumer lags.
//! - [`SessionDetector`] watches the first seconds of a stream to name the
//!   session (track, session type, player) for the recording filename.
//! - [`Recorder`] appends timestamped packets to an F1TR file.
//! - [`Player`] replays an F1TR file over UDP with the original timing,
//!   optionally scaled by a speed factor, with pause and resume.
//!
//! A typical capture wires them together:
//!
//! ```no_run
//! use f1tr::{Config, Receiver, ReceiverConfig, Recorder, SessionDetector};
//!
//! # async fn capture() -> f1tr::Result<()> {
//! let config = Config::default();
//! let receiver = Receiver::new(ReceiverConfig::from(&config));
//! receiver.start().await?;
//! let mut packets = receiver.take_packets().ok_or_else(|| {
//!     f1tr::TelemetryError::state("take packet queue", "already taken")
//! })?;
//!
//! let detector = SessionDetector::spawn(config.detection_window());
//! let mut buffered = Vec::new();
//! while let Some(packet) = packets.recv().await {
//!     detector.offer(&packet);
//!     buffered.push(packet);
//!     if buffered.len() >= 512 {
//!         break;
//!     }
//! }
//! let session = detector.wait().await?;
//!
//! let recorder = Recorder::new(&config.recording_dir, &session.filename_stem());
//! recorder.start()?;
//! for packet in &buffered {
//!     recorder.record_packet(packet)?;
//! }
//! while let Some(packet) = packets.recv().await {
//!     recorder.record_packet(&packet)?;
//! }
//! recorder.stop()?;
//! receiver.stop().await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod f1tr;
pub mod packet;
pub mod player;
pub mod receiver;
pub mod recorder;
pub mod session;

pub use config::Config;
pub use error::{Result, TelemetryError};
pub use f1tr::{FileHeader, RecordingEntry, RecordingReader};
pub use packet::car::{CarStatus, CarTelemetry, DashboardSnapshot};
pub use packet::{CapturedPacket, PacketHeader, PacketKind};
pub use player::{Player, PlayerState, PlayerStats};
pub use receiver::{Receiver, ReceiverConfig, ReceiverStats};
pub use recorder::{Recorder, RecorderStats};
pub use session::{SessionDetector, SessionInfo};
