//! Error types for MARC pipeline operations.
//!
//! This module provides the [`MarcError`] type for all library operations,
//! the [`DecodeError`] marker produced for a single malformed record, and the
//! [`Result`] convenience type.

use thiserror::Error;

/// Error type for all library operations.
///
/// Represents the error conditions that can occur while parsing, writing or
/// transforming MARC records, loading configuration, or harvesting a record
/// store.
#[derive(Error, Debug)]
pub enum MarcError {
    /// Error indicating an invalid or malformed MARC record.
    #[error("Invalid MARC record: {0}")]
    InvalidRecord(String),

    /// Error indicating an invalid leader (24-byte header).
    #[error("Invalid leader: {0}")]
    InvalidLeader(String),

    /// Error indicating an invalid field structure.
    #[error("Invalid field: {0}")]
    InvalidField(String),

    /// Error related to character encoding conversion.
    #[error("Encoding error: {0}")]
    EncodingError(String),

    /// A single record in a stream could not be decoded.
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// A transformation rule is malformed.
    #[error("Invalid rule: {0}")]
    InvalidRule(String),

    /// Pipeline configuration is invalid.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// The paginated record store failed or returned an unusable page.
    #[error("Record store error: {0}")]
    Store(String),

    /// JSON (de)serialization failure.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error from the underlying source/destination.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// A malformed record unit found while reading a stream.
///
/// Carries the raw bytes of the offending unit so callers can log or
/// quarantine it. Reading continues with the next record.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("record {index} at byte {offset}: {message}")]
pub struct DecodeError {
    /// Zero-based ordinal of the unit within the stream.
    pub index: usize,
    /// Byte offset of the unit's first byte.
    pub offset: u64,
    /// Raw bytes of the unit, including its terminator when present.
    pub chunk: Vec<u8>,
    /// Why decoding failed.
    pub message: String,
}

/// Convenience type alias for [`std::result::Result`] with [`MarcError`].
pub type Result<T> = std::result::Result<T, MarcError>;
