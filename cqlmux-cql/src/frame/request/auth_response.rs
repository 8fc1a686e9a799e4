use crate::frame::frame_errors::{RequestDeserializationError, RequestSerializationError};
use crate::frame::request::{
    unsupported_in, DeserializableRequest, RequestOpcode, SerializableRequest,
};
use crate::frame::types::{read_bytes_opt, write_bytes_opt};
use crate::frame::ProtocolVersion;

// Implements Authenticate Response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthResponse {
    pub response: Option<Vec<u8>>,
}

impl SerializableRequest for AuthResponse {
    const OPCODE: RequestOpcode = RequestOpcode::AuthResponse;

    fn serialize(
        &self,
        version: ProtocolVersion,
        buf: &mut Vec<u8>,
    ) -> Result<(), RequestSerializationError> {
        if version < ProtocolVersion::V2 {
            return Err(unsupported_in(Self::OPCODE, version));
        }
        write_bytes_opt(self.response.as_ref(), buf)?;
        Ok(())
    }
}

impl DeserializableRequest for AuthResponse {
    fn deserialize(
        _version: ProtocolVersion,
        buf: &mut &[u8],
    ) -> Result<Self, RequestDeserializationError> {
        let response = read_bytes_opt(buf)?.map(ToOwned::to_owned);
        Ok(Self { response })
    }
}
