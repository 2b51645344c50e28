//! Error types for telemetry capture and replay.
//!
//! All fallible operations in this crate return [`Result`] with a
//! [`TelemetryError`]. The taxonomy is small and maps directly onto the
//! failure surfaces of the system:
//!
//! - **Configuration**: a bind address, port, or playback parameter is invalid
//! - **Io**: a socket or filesystem operation failed
//! - **Protocol**: a datagram is too short to carry the common packet header
//! - **Format**: a recording file has a bad magic, an unsupported version, or
//!   a truncated entry
//! - **State**: an operation is invalid for the component's current lifecycle
//!   state (recording while stopped, starting twice, ...)
//! - **Timeout**: the session-detection window elapsed before both required
//!   packet kinds were seen
//!
//! Start-up failures are synchronous and abort the caller's flow. Steady-state
//! per-packet failures (malformed header, full output queue) are recovered
//! locally by the component: the packet is dropped, an error counter is
//! incremented, and the loop continues. Fatal failures inside a background
//! task stop the component and surface through its `last_error()` slot.

use std::time::Duration;
use thiserror::Error;

/// Result type alias for telemetry operations.
pub type Result<T, E = TelemetryError> = std::result::Result<T, E>;

/// Main error type for capture and replay operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum TelemetryError {
    #[error("invalid configuration: {reason}")]
    Configuration { reason: String },

    #[error("I/O error while {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("protocol error: {details}")]
    Protocol { details: String },

    #[error("recording format error: {details}")]
    Format { details: String },

    #[error("cannot {operation}: component is {state}")]
    State { operation: &'static str, state: &'static str },

    #[error("session detection timed out after {duration:?}")]
    Timeout { duration: Duration },
}

impl TelemetryError {
    /// Returns whether this error is potentially recoverable through retry.
    ///
    /// Transient conditions (I/O hiccups, detection timeouts) may succeed on a
    /// later attempt; contract violations (bad configuration, malformed data,
    /// lifecycle misuse) will not.
    pub fn is_retryable(&self) -> bool {
        match self {
            TelemetryError::Io { .. } => true,
            TelemetryError::Timeout { .. } => true,
            TelemetryError::Configuration { .. } => false,
            TelemetryError::Protocol { .. } => false,
            TelemetryError::Format { .. } => false,
            TelemetryError::State { .. } => false,
        }
    }

    /// Helper constructor for configuration errors.
    pub fn configuration(reason: impl Into<String>) -> Self {
        TelemetryError::Configuration { reason: reason.into() }
    }

    /// Helper constructor for I/O errors with operation context.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        TelemetryError::Io { context: context.into(), source }
    }

    /// Helper constructor for protocol errors.
    pub fn protocol(details: impl Into<String>) -> Self {
        TelemetryError::Protocol { details: details.into() }
    }

    /// Helper constructor for recording format errors.
    pub fn format(details: impl Into<String>) -> Self {
        TelemetryError::Format { details: details.into() }
    }

    /// Helper constructor for lifecycle state errors.
    pub fn state(operation: &'static str, state: &'static str) -> Self {
        TelemetryError::State { operation, state }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_traits_validation() {
        // Compile-time check: TelemetryError must be Send + Sync + 'static
        fn assert_send_sync_static<T: Send + Sync + 'static>() {}
        assert_send_sync_static::<TelemetryError>();

        let error = TelemetryError::protocol("short packet");
        let _: &dyn std::error::Error = &error;
    }

    #[test]
    fn error_messages_carry_context() {
        let err = TelemetryError::configuration("port must be non-zero");
        assert!(err.to_string().contains("port must be non-zero"));

        let err = TelemetryError::io(
            "binding UDP socket",
            std::io::Error::new(std::io::ErrorKind::AddrInUse, "in use"),
        );
        assert!(err.to_string().contains("binding UDP socket"));

        let err = TelemetryError::state("record packet", "stopped");
        assert!(err.to_string().contains("record packet"));
        assert!(err.to_string().contains("stopped"));
    }

    #[test]
    fn retryable_classification() {
        let io = TelemetryError::io(
            "reading recording",
            std::io::Error::new(std::io::ErrorKind::Interrupted, "eintr"),
        );
        assert!(io.is_retryable());
        assert!(TelemetryError::Timeout { duration: Duration::from_secs(5) }.is_retryable());

        assert!(!TelemetryError::configuration("bad").is_retryable());
        assert!(!TelemetryError::protocol("short").is_retryable());
        assert!(!TelemetryError::format("bad magic").is_retryable());
        assert!(!TelemetryError::state("start", "already running").is_retryable());
    }
}
