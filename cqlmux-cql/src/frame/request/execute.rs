//! CQL protocol-level representation of an `EXECUTE` request.

use std::borrow::Cow;

use bytes::Bytes;

use crate::frame::frame_errors::{RequestDeserializationError, RequestSerializationError};
use crate::frame::request::query::QueryParameters;
use crate::frame::request::{
    read_values, unsupported_in, write_values, DeserializableRequest, RequestOpcode,
    SerializableRequest,
};
use crate::frame::{types, ProtocolVersion};

/// CQL protocol-level representation of an `EXECUTE` request,
/// used to execute a single prepared statement.
///
/// Protocol v1 lays out the values before the consistency and has no other parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Execute<'a> {
    /// ID of the prepared statement to execute.
    pub id: Bytes,

    /// Various parameters controlling the execution of the statement.
    pub parameters: QueryParameters<'a>,
}

impl SerializableRequest for Execute<'_> {
    const OPCODE: RequestOpcode = RequestOpcode::Execute;

    fn serialize(
        &self,
        version: ProtocolVersion,
        buf: &mut Vec<u8>,
    ) -> Result<(), RequestSerializationError> {
        // Serializing statement id
        types::write_short_bytes(&self.id[..], buf)?;

        // Serializing params
        match version {
            ProtocolVersion::V1 => {
                if self.parameters.has_v2_options() {
                    return Err(unsupported_in(Self::OPCODE, version));
                }
                write_values(&self.parameters.values, buf)?;
                types::write_consistency(self.parameters.consistency, buf);
            }
            ProtocolVersion::V2 => self.parameters.serialize(buf)?,
        }
        Ok(())
    }
}

impl DeserializableRequest for Execute<'_> {
    fn deserialize(
        version: ProtocolVersion,
        buf: &mut &[u8],
    ) -> Result<Self, RequestDeserializationError> {
        let id = types::read_short_bytes(buf)?.to_vec().into();
        let parameters = match version {
            ProtocolVersion::V1 => {
                let values = read_values(buf)?;
                QueryParameters {
                    consistency: types::read_consistency(buf)?,
                    values: Cow::Owned(values),
                    ..Default::default()
                }
            }
            ProtocolVersion::V2 => QueryParameters::deserialize(buf)?,
        };

        Ok(Self { id, parameters })
    }
}
