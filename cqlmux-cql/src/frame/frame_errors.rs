//! Errors returned while encoding requests and decoding response frames.

use std::num::TryFromIntError;
use std::str::Utf8Error;
use std::sync::Arc;

use thiserror::Error;

use super::TryFromPrimitiveError;
use crate::Consistency;

/// An error that makes a response frame (or its header) undecodable.
///
/// Every variant is fatal for the connection the frame arrived on.
#[derive(Error, Debug, Clone)]
#[non_exhaustive]
pub enum FrameError {
    /// The version byte did not have the response bit set.
    #[error("Received frame marked as coming from a client")]
    FrameFromClient,

    /// The protocol version of the frame is not 1 or 2.
    #[error("Received a frame from version {0}, but only versions 1 and 2 are supported")]
    VersionNotSupported(u8),

    /// The opcode of the frame does not name a response.
    #[error("Unrecognized response opcode: {0}")]
    UnknownOpcode(TryFromPrimitiveError<u8>),

    /// A stream id outside of the client range was used for a request.
    #[error("The stream id must be between 0 and 127, got {0}")]
    InvalidStreamId(i16),

    /// The frame was flagged as compressed, but the connection has no compressor.
    #[error("Frame is compressed, but no compression negotiated for connection")]
    NoCompressionNegotiated,

    /// The compressed body was too short to hold its length prefix.
    #[error("Compressed frame body is {0} bytes long, which cannot hold the uncompressed length")]
    CompressedBodyTooShort(usize),

    /// The decompressed body did not have the announced length.
    #[error("Uncompressed length did not match expected value: expected {expected}, got {actual}")]
    UncompressedLengthMismatch { expected: usize, actual: usize },

    /// The compressor failed.
    #[error("Frame compression failed: {0}")]
    FrameCompression(String),

    /// The decompressor failed.
    #[error("Frame decompression failed: {0}")]
    FrameDecompression(String),

    /// The request could not be serialized.
    #[error(transparent)]
    RequestSerialization(#[from] RequestSerializationError),

    /// The body of the frame could not be parsed.
    #[error("Failed to parse response body: {0}")]
    Parse(#[from] ParseError),
}

/// An error that occurred while parsing the body of a response.
#[derive(Error, Debug, Clone)]
#[non_exhaustive]
pub enum ParseError {
    /// Low-level error while reading a protocol primitive.
    #[error(transparent)]
    LowLevel(#[from] LowLevelDeserializationError),

    /// RESULT frame with an unknown kind.
    #[error("Unknown result kind: {0}")]
    UnknownResultKind(i32),

    /// EVENT frame with an unknown event type.
    #[error("Unknown event type: {0}")]
    UnknownEventType(String),

    /// TOPOLOGY_CHANGE or STATUS_CHANGE event with an unknown change.
    #[error("Unknown {event_type} change: {change}")]
    UnknownClusterChange { event_type: &'static str, change: String },

    /// Column type id that this protocol version does not define.
    #[error("Unknown column type id: {0:#06x}")]
    UnknownColumnType(u16),

    /// A detail field of an ERROR body could not be read.
    #[error("Malformed {field} field of {db_error} error: {err}")]
    MalformedErrorField {
        db_error: &'static str,
        field: &'static str,
        err: LowLevelDeserializationError,
    },

    /// A column value did not fit its declared type.
    #[error("Malformed value of column {column}: {err}")]
    MalformedColumnValue {
        column: String,
        err: LowLevelDeserializationError,
    },
}

impl From<std::io::Error> for ParseError {
    fn from(err: std::io::Error) -> Self {
        ParseError::LowLevel(err.into())
    }
}

/// A low-level deserialization error, raised while reading the
/// primitives of the protocol (`[int]`, `[string]`, `[inet]`, ...).
#[derive(Error, Debug, Clone)]
#[non_exhaustive]
pub enum LowLevelDeserializationError {
    #[error(transparent)]
    IoError(Arc<std::io::Error>),
    #[error("Too few bytes received: expected {expected}, received {received}")]
    TooFewBytesReceived { expected: usize, received: usize },
    #[error("Invalid value length: {0}")]
    InvalidValueLength(i32),
    #[error("Invalid inet bytes length: {0}. Accepted lengths are 4 and 16 bytes.")]
    InvalidInetLength(u8),
    #[error("UTF8 deserialization failed: {0}")]
    UTF8DeserializationError(#[from] Utf8Error),
    #[error(transparent)]
    TryFromIntError(#[from] TryFromIntError),
    #[error("Unknown consistency: {0}")]
    UnknownConsistency(#[from] TryFromPrimitiveError<u16>),
}

impl From<std::io::Error> for LowLevelDeserializationError {
    fn from(err: std::io::Error) -> Self {
        Self::IoError(Arc::new(err))
    }
}

/// An error that occurred while serializing a request body.
#[derive(Error, Debug, Clone)]
#[non_exhaustive]
pub enum RequestSerializationError {
    /// A string, bytes value or collection was too long for its length prefix.
    #[error("Value too long to fit in its length prefix: {0}")]
    LengthOverflow(#[from] TryFromIntError),

    /// The request does not exist in the protocol version in use.
    #[error("{request} requests are not supported by protocol version {version}")]
    UnsupportedInVersion { request: &'static str, version: u8 },
}

/// An error returned by `DeserializableRequest::deserialize`.
/// This is not intended for direct usage. It's a testing utility.
#[doc(hidden)]
#[derive(Error, Debug, Clone)]
pub enum RequestDeserializationError {
    #[error("Low level deser error: {0}")]
    LowLevelDeserialization(#[from] LowLevelDeserializationError),
    #[error("Specified flags are not recognised: {flags:02x}")]
    UnknownFlags { flags: u8 },
    #[error("Unknown event type: {0}")]
    UnknownEventType(String),
    #[error("Expected SerialConsistency, got regular Consistency: {0}")]
    ExpectedSerialConsistency(Consistency),
    #[error("Unknown batch type: {0}")]
    UnknownBatchType(u8),
    #[error("Unexpected batch statement kind: {0}")]
    UnexpectedBatchStatementKind(u8),
    #[error("{request} requests do not exist in protocol version {version}")]
    UnsupportedInVersion { request: &'static str, version: u8 },
}

impl From<std::io::Error> for RequestDeserializationError {
    fn from(err: std::io::Error) -> Self {
        Self::LowLevelDeserialization(err.into())
    }
}
