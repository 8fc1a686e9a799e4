//! CQL protocol-level representation of a `STARTUP` request.

use std::{borrow::Cow, collections::HashMap};

use crate::frame::frame_errors::{RequestDeserializationError, RequestSerializationError};
use crate::frame::request::{DeserializableRequest, RequestOpcode, SerializableRequest};
use crate::frame::{types, ProtocolVersion};

/// The CQL protocol-level representation of a `STARTUP` request,
/// used to finalise connection negotiation phase and establish the CQL connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Startup<'a> {
    /// The protocol options chosen by the client, out of the ones the server supports.
    pub options: HashMap<Cow<'a, str>, Cow<'a, str>>,
}

impl SerializableRequest for Startup<'_> {
    const OPCODE: RequestOpcode = RequestOpcode::Startup;

    fn serialize(
        &self,
        _version: ProtocolVersion,
        buf: &mut Vec<u8>,
    ) -> Result<(), RequestSerializationError> {
        types::write_string_map(&self.options, buf)?;
        Ok(())
    }
}

impl DeserializableRequest for Startup<'_> {
    fn deserialize(
        _version: ProtocolVersion,
        buf: &mut &[u8],
    ) -> Result<Self, RequestDeserializationError> {
        // Note: this is inefficient, but it's only used for tests and it's not common
        // to deserialize STARTUP frames anyway.
        let options = types::read_string_map(buf)?
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Ok(Self { options })
    }
}
