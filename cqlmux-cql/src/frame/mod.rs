//! Framing of the CQL native protocol, versions 1 and 2.
//!
//! A frame is an 8-byte header followed by a body:
//!
//! ```text
//! [version: u8][flags: u8][stream: i8][opcode: u8][length: u32 BE][body: length bytes]
//! ```
//!
//! Requests carry the bare version, responses have the `0x80` bit set.
//! Stream ids `0..=127` belong to client requests, `-1` marks events pushed by the server.

pub mod compression;
pub mod frame_errors;
pub mod request;
pub mod response;
pub mod server_event_type;
pub mod types;

use std::fmt::{Debug, Display};
use std::sync::Arc;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use thiserror::Error;
use uuid::Uuid;

use compression::Compressor;
use frame_errors::{FrameError, ParseError, RequestSerializationError};
use request::{RequestOpcode, SerializableRequest};
use response::{Response, ResponseOpcode};

/// Size of the frame header in protocol versions 1 and 2.
pub const HEADER_SIZE: usize = 8;

/// Offset of the stream id byte inside an encoded frame.
pub const STREAM_ID_OFFSET: usize = 2;

/// Stream id of frames pushed by the server (EVENT).
pub const EVENT_STREAM_ID: i8 = -1;

/// Number of stream ids a client can use on one connection.
pub const STREAM_ID_COUNT: usize = 128;

/// Bodies of at most this many bytes are never compressed.
pub const COMPRESSION_THRESHOLD: usize = 64;

// Frame flags
pub const FLAG_COMPRESSION: u8 = 0x01;
pub const FLAG_TRACING: u8 = 0x02;

const RESPONSE_BIT: u8 = 0x80;

/// Version of the native protocol spoken on a connection.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum ProtocolVersion {
    V1 = 0x01,
    #[default]
    V2 = 0x02,
}

impl ProtocolVersion {
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for ProtocolVersion {
    type Error = FrameError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x01 => Ok(Self::V1),
            0x02 => Ok(Self::V2),
            v => Err(FrameError::VersionNotSupported(v)),
        }
    }
}

impl Display for ProtocolVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_u8())
    }
}

/// Decoded frame header.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct FrameHeader {
    pub version: ProtocolVersion,
    pub is_response: bool,
    pub flags: u8,
    pub stream: i8,
    pub opcode: u8,
    pub length: u32,
}

impl FrameHeader {
    /// Parses the first [`HEADER_SIZE`] bytes of `buf`.
    ///
    /// The opcode is kept raw; its meaning depends on the direction of the frame.
    pub fn parse(mut buf: &[u8]) -> Result<Self, FrameError> {
        if buf.len() < HEADER_SIZE {
            return Err(ParseError::from(
                frame_errors::LowLevelDeserializationError::TooFewBytesReceived {
                    expected: HEADER_SIZE,
                    received: buf.len(),
                },
            )
            .into());
        }

        let raw_version = buf.get_u8();
        let is_response = raw_version & RESPONSE_BIT != 0;
        let version = ProtocolVersion::try_from(raw_version & !RESPONSE_BIT)?;
        let flags = buf.get_u8();
        let stream = buf.get_i8();
        let opcode = buf.get_u8();
        let length = buf.get_u32();

        Ok(Self {
            version,
            is_response,
            flags,
            stream,
            opcode,
            length,
        })
    }

    pub fn write(&self, buf: &mut impl BufMut) {
        let mut version = self.version.as_u8();
        if self.is_response {
            version |= RESPONSE_BIT;
        }
        buf.put_u8(version);
        buf.put_u8(self.flags);
        buf.put_i8(self.stream);
        buf.put_u8(self.opcode);
        buf.put_u32(self.length);
    }

    pub fn is_compressed(&self) -> bool {
        self.flags & FLAG_COMPRESSION != 0
    }

    pub fn has_tracing(&self) -> bool {
        self.flags & FLAG_TRACING != 0
    }
}

/// Encodes requests into frames for one connection.
///
/// The compressor is only set once it has been negotiated in STARTUP.
#[derive(Debug, Clone, Default)]
pub struct FrameCodec {
    version: ProtocolVersion,
    compressor: Option<Arc<dyn Compressor>>,
}

impl FrameCodec {
    pub fn new(version: ProtocolVersion) -> Self {
        Self {
            version,
            compressor: None,
        }
    }

    pub fn version(&self) -> ProtocolVersion {
        self.version
    }

    pub fn compressor(&self) -> Option<&Arc<dyn Compressor>> {
        self.compressor.as_ref()
    }

    pub fn set_compressor(&mut self, compressor: Option<Arc<dyn Compressor>>) {
        self.compressor = compressor;
    }

    /// Serializes `req` into a complete frame on `stream`.
    ///
    /// The body is compressed when a compressor is set, the request is not
    /// STARTUP and the body is longer than [`COMPRESSION_THRESHOLD`].
    pub fn encode<R: SerializableRequest>(
        &self,
        req: &R,
        stream: i8,
        tracing: bool,
    ) -> Result<SerializedRequest, FrameError> {
        if stream < 0 {
            return Err(FrameError::InvalidStreamId(stream.into()));
        }

        let mut data = vec![0; HEADER_SIZE];
        req.serialize(self.version, &mut data)?;

        let mut flags = 0;
        let body_len = data.len() - HEADER_SIZE;
        let compressor = self
            .compressor
            .as_ref()
            .filter(|_| R::OPCODE != RequestOpcode::Startup && body_len > COMPRESSION_THRESHOLD);
        if let Some(compressor) = compressor {
            let uncompressed_len =
                u32::try_from(body_len).map_err(RequestSerializationError::from)?;
            let compressed = compressor.compress(&data[HEADER_SIZE..])?;
            data.truncate(HEADER_SIZE);
            data.reserve_exact(std::mem::size_of::<u32>() + compressed.len());
            data.put_u32(uncompressed_len);
            data.extend_from_slice(&compressed);
            flags |= FLAG_COMPRESSION;
        }

        if tracing {
            flags |= FLAG_TRACING;
        }

        let header = FrameHeader {
            version: self.version,
            is_response: false,
            flags,
            stream,
            opcode: R::OPCODE as u8,
            length: u32::try_from(data.len() - HEADER_SIZE)
                .map_err(RequestSerializationError::from)?,
        };
        let mut header_buf = &mut data[..HEADER_SIZE];
        header.write(&mut header_buf);

        Ok(SerializedRequest { data })
    }
}

/// An encoded request frame whose stream id can still be changed.
#[derive(Debug, Clone)]
pub struct SerializedRequest {
    data: Vec<u8>,
}

impl SerializedRequest {
    pub fn set_stream(&mut self, stream: i8) {
        patch_stream_id(&mut self.data, stream);
    }

    pub fn stream(&self) -> i8 {
        self.data[STREAM_ID_OFFSET] as i8
    }

    pub fn get_data(&self) -> &[u8] {
        &self.data[..]
    }

    pub fn into_bytes(self) -> Bytes {
        self.data.into()
    }
}

/// Overwrites the stream id of an already encoded frame.
pub fn patch_stream_id(frame: &mut [u8], stream: i8) {
    frame[STREAM_ID_OFFSET] = stream as u8;
}

/// A frame whose body has not been interpreted yet.
#[derive(Debug, Clone)]
pub struct RawFrame {
    pub header: FrameHeader,
    pub body: Bytes,
}

impl RawFrame {
    /// Returns the body with compression removed.
    pub fn decompressed_body(
        self,
        compressor: Option<&dyn Compressor>,
    ) -> Result<Bytes, FrameError> {
        if !self.header.is_compressed() {
            return Ok(self.body);
        }

        let compressor = compressor.ok_or(FrameError::NoCompressionNegotiated)?;
        if self.body.len() < std::mem::size_of::<u32>() {
            return Err(FrameError::CompressedBodyTooShort(self.body.len()));
        }

        let mut payload = &self.body[..];
        let expected = payload.get_u32() as usize;
        // Empty compressed payloads stand for an empty body.
        if payload.is_empty() || payload == [0x00] {
            return Ok(Bytes::new());
        }

        let body = compressor.decompress(payload, expected)?;
        if body.len() != expected {
            return Err(FrameError::UncompressedLengthMismatch {
                expected,
                actual: body.len(),
            });
        }

        Ok(body.into())
    }
}

/// A fully decoded response frame.
#[derive(Debug)]
pub struct ResponseFrame {
    pub header: FrameHeader,
    pub trace_id: Option<Uuid>,
    pub response: Response,
}

impl ResponseFrame {
    pub fn parse(raw: RawFrame, compressor: Option<&dyn Compressor>) -> Result<Self, FrameError> {
        let header = raw.header;
        let opcode = ResponseOpcode::try_from(header.opcode).map_err(FrameError::UnknownOpcode)?;
        let body = raw.decompressed_body(compressor)?;

        let buf = &mut &*body;
        let trace_id = if header.has_tracing() {
            Some(types::read_uuid(buf).map_err(ParseError::from)?)
        } else {
            None
        };
        let response = Response::deserialize(header.version, opcode, buf)?;

        Ok(Self {
            header,
            trace_id,
            response,
        })
    }

    pub fn stream(&self) -> i8 {
        self.header.stream
    }

    pub fn is_event(&self) -> bool {
        self.header.stream == EVENT_STREAM_ID
    }
}

/// Incremental frame decoder.
///
/// Bytes are appended to a buffer owned by the caller; `decode` consumes one
/// complete frame at a time and remembers a header whose body has not fully
/// arrived yet, so decoding resumes however the bytes were split.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    header: Option<FrameHeader>,
    accept_requests: bool,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// A decoder for frames sent by clients. Used by test servers.
    #[doc(hidden)]
    pub fn for_requests() -> Self {
        Self {
            header: None,
            accept_requests: true,
        }
    }

    /// Whether a header has been read and its body is still incomplete.
    pub fn has_partial_frame(&self) -> bool {
        self.header.is_some()
    }

    pub fn decode_raw(&mut self, buf: &mut BytesMut) -> Result<Option<RawFrame>, FrameError> {
        let header = match self.header {
            Some(header) => header,
            None => {
                if buf.len() < HEADER_SIZE {
                    return Ok(None);
                }
                let header = FrameHeader::parse(&buf[..HEADER_SIZE])?;
                if !header.is_response && !self.accept_requests {
                    return Err(FrameError::FrameFromClient);
                }
                buf.advance(HEADER_SIZE);
                self.header = Some(header);
                header
            }
        };

        let length = header.length as usize;
        if buf.len() < length {
            buf.reserve(length - buf.len());
            return Ok(None);
        }

        let body = buf.split_to(length).freeze();
        self.header = None;
        Ok(Some(RawFrame { header, body }))
    }

    /// Decodes the next complete response frame out of `buf`, if there is one.
    pub fn decode(
        &mut self,
        buf: &mut BytesMut,
        compressor: Option<&dyn Compressor>,
    ) -> Result<Option<ResponseFrame>, FrameError> {
        match self.decode_raw(buf)? {
            Some(raw) => ResponseFrame::parse(raw, compressor).map(Some),
            None => Ok(None),
        }
    }
}

/// An error type for parsing an enum value from a primitive.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("No discrimant in enum `{enum_name}` matches the value `{primitive:?}`")]
pub struct TryFromPrimitiveError<T: Copy + Debug> {
    enum_name: &'static str,
    primitive: T,
}
