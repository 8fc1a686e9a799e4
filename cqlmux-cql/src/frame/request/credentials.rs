//! `CREDENTIALS` request of protocol v1.

use std::collections::HashMap;

use crate::frame::frame_errors::{RequestDeserializationError, RequestSerializationError};
use crate::frame::request::{
    unsupported_in, DeserializableRequest, RequestOpcode, SerializableRequest,
};
use crate::frame::{types, ProtocolVersion};

/// A map of credentials (typically `username` and `password`) sent in reply
/// to AUTHENTICATE. Replaced by AUTH_RESPONSE in protocol v2.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub credentials: HashMap<String, String>,
}

impl SerializableRequest for Credentials {
    const OPCODE: RequestOpcode = RequestOpcode::Credentials;

    fn serialize(
        &self,
        version: ProtocolVersion,
        buf: &mut Vec<u8>,
    ) -> Result<(), RequestSerializationError> {
        if version != ProtocolVersion::V1 {
            return Err(unsupported_in(Self::OPCODE, version));
        }
        types::write_string_map(&self.credentials, buf)?;
        Ok(())
    }
}

impl DeserializableRequest for Credentials {
    fn deserialize(
        _version: ProtocolVersion,
        buf: &mut &[u8],
    ) -> Result<Self, RequestDeserializationError> {
        let credentials = types::read_string_map(buf)?;
        Ok(Self { credentials })
    }
}
