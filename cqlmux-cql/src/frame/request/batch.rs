//! `BATCH` request, available from protocol v2.

use std::borrow::Cow;

use bytes::{BufMut, Bytes};

use crate::frame::frame_errors::{RequestDeserializationError, RequestSerializationError};
use crate::frame::request::{
    read_values, unsupported_in, write_values, DeserializableRequest, RequestOpcode,
    SerializableRequest,
};
use crate::frame::{types, ProtocolVersion};
use crate::Consistency;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch<'b> {
    pub batch_type: BatchType,
    pub statements: Vec<BatchStatement<'b>>,
    pub consistency: Consistency,
}

/// The type of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchType {
    Logged = 0,
    Unlogged = 1,
    Counter = 2,
}

impl TryFrom<u8> for BatchType {
    type Error = RequestDeserializationError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Logged),
            1 => Ok(Self::Unlogged),
            2 => Ok(Self::Counter),
            _ => Err(RequestDeserializationError::UnknownBatchType(value)),
        }
    }
}

/// One statement of a batch with its already serialized values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchStatement<'a> {
    Query {
        text: Cow<'a, str>,
        values: Vec<Option<Bytes>>,
    },
    Prepared {
        id: Bytes,
        values: Vec<Option<Bytes>>,
    },
}

impl BatchStatement<'_> {
    fn serialize(&self, buf: &mut Vec<u8>) -> Result<(), RequestSerializationError> {
        match self {
            Self::Query { text, values } => {
                buf.put_u8(0);
                types::write_long_string(text, buf)?;
                write_values(values, buf)?;
            }
            Self::Prepared { id, values } => {
                buf.put_u8(1);
                types::write_short_bytes(id, buf)?;
                write_values(values, buf)?;
            }
        }

        Ok(())
    }

    fn deserialize(
        buf: &mut &[u8],
    ) -> Result<BatchStatement<'static>, RequestDeserializationError> {
        let kind = types::read_byte(buf)?;
        match kind {
            0 => {
                let text = Cow::Owned(types::read_long_string(buf)?.to_owned());
                let values = read_values(buf)?;
                Ok(BatchStatement::Query { text, values })
            }
            1 => {
                let id = Bytes::copy_from_slice(types::read_short_bytes(buf)?);
                let values = read_values(buf)?;
                Ok(BatchStatement::Prepared { id, values })
            }
            _ => Err(RequestDeserializationError::UnexpectedBatchStatementKind(
                kind,
            )),
        }
    }
}

impl SerializableRequest for Batch<'_> {
    const OPCODE: RequestOpcode = RequestOpcode::Batch;

    fn serialize(
        &self,
        version: ProtocolVersion,
        buf: &mut Vec<u8>,
    ) -> Result<(), RequestSerializationError> {
        if version < ProtocolVersion::V2 {
            return Err(unsupported_in(Self::OPCODE, version));
        }

        // Serializing type of batch
        buf.put_u8(self.batch_type as u8);

        // Serializing queries
        types::write_short_length(self.statements.len(), buf)?;
        for statement in &self.statements {
            statement.serialize(buf)?;
        }

        // Serializing consistency
        types::write_consistency(self.consistency, buf);

        Ok(())
    }
}

impl DeserializableRequest for Batch<'_> {
    fn deserialize(
        version: ProtocolVersion,
        buf: &mut &[u8],
    ) -> Result<Self, RequestDeserializationError> {
        if version < ProtocolVersion::V2 {
            return Err(RequestDeserializationError::UnsupportedInVersion {
                request: Self::OPCODE.name(),
                version: version.as_u8(),
            });
        }

        let batch_type = BatchType::try_from(types::read_byte(buf)?)?;

        let statements_count = types::read_short(buf)? as usize;
        let statements = (0..statements_count)
            .map(|_| BatchStatement::deserialize(buf))
            .collect::<Result<Vec<_>, _>>()?;

        let consistency = types::read_consistency(buf)?;

        Ok(Self {
            batch_type,
            statements,
            consistency,
        })
    }
}
