//! Error types for the corticore engine.
//!
//! This module provides a unified error type for all operations in the
//! crate, using the `thiserror` crate for ergonomic error handling. The
//! variants mirror the taxonomy every component is required to surface:
//! shape mismatches, invalid arguments, corrupted persisted state, and
//! (when a cap is configured as hard) exhausted capacity.

use thiserror::Error;

/// The main error type for corticore operations.
#[derive(Error, Debug)]
pub enum CoreError {
    /// SDR sizes disagree, an input width differs from a configured
    /// component width, or a peer count differs from a region's column
    /// count.
    #[error("shape mismatch: expected {expected}, got {actual}")]
    ShapeMismatch {
        /// Expected size/width/count.
        expected: usize,
        /// Actual size/width/count received.
        actual: usize,
    },

    /// A scalar argument was negative, out of `[0,1]`, or otherwise
    /// violated a documented precondition.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Deserialization checksum mismatch, magic/version mismatch, or an
    /// internal invariant violation discovered during maintenance.
    /// Reported, never silently recovered.
    #[error("state corruption: {0}")]
    StateCorruption(String),

    /// A cap configured as hard (rather than absorbed via LRU eviction)
    /// was exceeded.
    #[error("capacity exceeded: {resource} limit is {limit}")]
    CapacityExceeded {
        /// Name of the bounded resource (e.g. "segments_per_cell").
        resource: String,
        /// The configured hard limit.
        limit: usize,
    },

    /// Underlying I/O failure while persisting or loading state.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Underlying (de)serialization failure in the persistence layer.
    #[error("serialization error: {0}")]
    Serialization(#[from] bincode::Error),
}

/// A specialized `Result` type for corticore operations.
pub type Result<T> = std::result::Result<T, CoreError>;
