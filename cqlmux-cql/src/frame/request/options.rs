use crate::frame::frame_errors::{RequestDeserializationError, RequestSerializationError};
use crate::frame::request::{DeserializableRequest, RequestOpcode, SerializableRequest};
use crate::frame::ProtocolVersion;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Options;

impl SerializableRequest for Options {
    const OPCODE: RequestOpcode = RequestOpcode::Options;

    fn serialize(
        &self,
        _version: ProtocolVersion,
        _buf: &mut Vec<u8>,
    ) -> Result<(), RequestSerializationError> {
        Ok(())
    }
}

impl DeserializableRequest for Options {
    fn deserialize(
        _version: ProtocolVersion,
        _buf: &mut &[u8],
    ) -> Result<Self, RequestDeserializationError> {
        Ok(Options)
    }
}

/* Key names for options in SUPPORTED/STARTUP */
pub const COMPRESSION: &str = "COMPRESSION";
pub const CQL_VERSION: &str = "CQL_VERSION";

/* Value names for options in SUPPORTED/STARTUP */
pub const DEFAULT_CQL_VERSION: &str = "3.0.0";
