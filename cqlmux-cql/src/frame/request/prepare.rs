//! CQL protocol-level representation of a `PREPARE` request.

use std::borrow::Cow;

use crate::frame::frame_errors::{RequestDeserializationError, RequestSerializationError};
use crate::frame::request::{DeserializableRequest, RequestOpcode, SerializableRequest};
use crate::frame::{types, ProtocolVersion};

/// CQL protocol-level representation of a `PREPARE` request,
/// used to prepare a single statement for further execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prepare<'a> {
    /// CQL statement string to prepare.
    pub query: Cow<'a, str>,
}

impl SerializableRequest for Prepare<'_> {
    const OPCODE: RequestOpcode = RequestOpcode::Prepare;

    fn serialize(
        &self,
        _version: ProtocolVersion,
        buf: &mut Vec<u8>,
    ) -> Result<(), RequestSerializationError> {
        types::write_long_string(&self.query, buf)?;
        Ok(())
    }

    fn cql(&self) -> Option<&str> {
        Some(&self.query)
    }
}

impl DeserializableRequest for Prepare<'_> {
    fn deserialize(
        _version: ProtocolVersion,
        buf: &mut &[u8],
    ) -> Result<Self, RequestDeserializationError> {
        let query = Cow::Owned(types::read_long_string(buf)?.to_owned());
        Ok(Self { query })
    }
}
