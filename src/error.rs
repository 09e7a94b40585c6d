//! Error types for bus verification

use crate::components::common::command::{Command, Phase};
use crate::components::common::seven_seg::DebugFrame;
use crate::components::memory::region::ExpectedByte;
use crate::pin::DirectionMask;
use crate::types::U24;
use thiserror::Error;

/// Result type alias for verification operations
pub type Result<T> = std::result::Result<T, VerificationError>;

/// Every way a bus or debug-port check can fail.
///
/// None of these are retried; the enclosing scenario stops at the first one.
#[derive(Debug, Error)]
pub enum VerificationError {
    /// Observed direction mask disagrees with the expected mask at a phase boundary
    #[error("Framing error during {command:?} at {phase:?}: expected mask {expected}, observed {observed}")]
    Framing {
        /// Command in flight
        command: Command,
        /// Phase being entered when the mask was sampled
        phase: Phase,
        /// Mask predicted by the direction tracker
        expected: DirectionMask,
        /// Mask reported by the device
        observed: DirectionMask,
    },

    /// Read bytes disagree with the golden model for a non-entropy region
    #[error("Data mismatch at {address} (length {length}): expected {expected:?}, actual {actual:02X?}")]
    DataMismatch {
        /// Start address of the read
        address: U24,
        /// Number of bytes read
        length: usize,
        /// Golden expectation
        expected: Vec<ExpectedByte>,
        /// Bytes returned by the device
        actual: Vec<u8>,
    },

    /// Repeated reads of the entropy region came back identical
    #[error("Entropy violation at {address}: {length} bytes repeated identically ({sample:02X?})")]
    EntropyViolation {
        /// Start address of the repeated reads
        address: U24,
        /// Length of each read
        length: usize,
        /// The repeated bytes
        sample: Vec<u8>,
    },

    /// Debug port shows a different nibble or segment pattern than the golden RAM
    #[error("Debug mismatch at nibble {nibble_index}: expected {expected:?}, observed {observed:?}")]
    DebugMismatch {
        /// Debug address that was scanned
        nibble_index: u8,
        /// Frame derived from the golden RAM window
        expected: DebugFrame,
        /// Frame read back from the device
        observed: DebugFrame,
    },

    /// Malformed operation sequencing
    #[error("Protocol violation: {reason}")]
    ProtocolViolation {
        /// What was out of order
        reason: String,
    },

    /// Revision descriptor is inconsistent
    #[error("Invalid revision config: {reason}")]
    Config {
        /// Reason for rejection
        reason: String,
    },

    /// I/O error while loading a revision descriptor
    #[error("I/O error: {source}")]
    Io {
        /// Underlying I/O error
        #[from]
        source: std::io::Error,
    },

    /// JSON error while parsing a revision descriptor
    #[error("JSON error: {source}")]
    Json {
        /// Underlying parse error
        #[from]
        source: serde_json::Error,
    },
}

impl VerificationError {
    /// Create a protocol violation error
    pub fn protocol(reason: impl Into<String>) -> Self {
        Self::ProtocolViolation {
            reason: reason.into(),
        }
    }

    /// Create a config error
    pub fn config(reason: impl Into<String>) -> Self {
        Self::Config {
            reason: reason.into(),
        }
    }

    pub fn is_framing(&self) -> bool {
        matches!(self, Self::Framing { .. })
    }

    pub fn is_data_mismatch(&self) -> bool {
        matches!(self, Self::DataMismatch { .. })
    }

    pub fn is_entropy_violation(&self) -> bool {
        matches!(self, Self::EntropyViolation { .. })
    }

    pub fn is_debug_mismatch(&self) -> bool {
        matches!(self, Self::DebugMismatch { .. })
    }

    pub fn is_protocol_violation(&self) -> bool {
        matches!(self, Self::ProtocolViolation { .. })
    }
}
