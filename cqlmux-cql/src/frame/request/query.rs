use std::borrow::Cow;

use bytes::{BufMut, Bytes};

use crate::frame::frame_errors::{RequestDeserializationError, RequestSerializationError};
use crate::frame::request::{
    read_values, unsupported_in, write_values, DeserializableRequest, RequestOpcode,
    SerializableRequest,
};
use crate::frame::types::{self, SerialConsistency};
use crate::frame::ProtocolVersion;
use crate::Consistency;

// Query flags (protocol v2)
const FLAG_VALUES: u8 = 0x01;
const FLAG_SKIP_METADATA: u8 = 0x02;
const FLAG_PAGE_SIZE: u8 = 0x04;
const FLAG_WITH_PAGING_STATE: u8 = 0x08;
const FLAG_WITH_SERIAL_CONSISTENCY: u8 = 0x10;
const ALL_FLAGS: u8 = FLAG_VALUES
    | FLAG_SKIP_METADATA
    | FLAG_PAGE_SIZE
    | FLAG_WITH_PAGING_STATE
    | FLAG_WITH_SERIAL_CONSISTENCY;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query<'q> {
    pub contents: Cow<'q, str>,
    pub parameters: QueryParameters<'q>,
}

impl Query<'_> {
    pub fn into_owned(self) -> Query<'static> {
        Query {
            contents: Cow::Owned(self.contents.into_owned()),
            parameters: self.parameters.into_owned(),
        }
    }
}

impl SerializableRequest for Query<'_> {
    const OPCODE: RequestOpcode = RequestOpcode::Query;

    fn serialize(
        &self,
        version: ProtocolVersion,
        buf: &mut Vec<u8>,
    ) -> Result<(), RequestSerializationError> {
        types::write_long_string(&self.contents, buf)?;
        match version {
            ProtocolVersion::V1 => {
                if !self.parameters.is_plain() {
                    return Err(unsupported_in(Self::OPCODE, version));
                }
                types::write_consistency(self.parameters.consistency, buf);
            }
            ProtocolVersion::V2 => self.parameters.serialize(buf)?,
        }
        Ok(())
    }

    fn cql(&self) -> Option<&str> {
        Some(&self.contents)
    }
}

impl DeserializableRequest for Query<'_> {
    fn deserialize(
        version: ProtocolVersion,
        buf: &mut &[u8],
    ) -> Result<Self, RequestDeserializationError> {
        let contents = Cow::Owned(types::read_long_string(buf)?.to_owned());
        let parameters = match version {
            ProtocolVersion::V1 => QueryParameters {
                consistency: types::read_consistency(buf)?,
                ..Default::default()
            },
            ProtocolVersion::V2 => QueryParameters::deserialize(buf)?,
        };

        Ok(Self {
            contents,
            parameters,
        })
    }
}

/// Parameters of QUERY and EXECUTE.
///
/// Values are already serialized; `None` is a `null` value.
/// Everything except the consistency and the values of EXECUTE requires protocol v2.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryParameters<'a> {
    pub consistency: Consistency,
    pub serial_consistency: Option<SerialConsistency>,
    pub page_size: Option<i32>,
    pub paging_state: Option<Bytes>,
    pub skip_metadata: bool,
    pub values: Cow<'a, [Option<Bytes>]>,
}

impl Default for QueryParameters<'_> {
    fn default() -> Self {
        Self {
            consistency: Default::default(),
            serial_consistency: None,
            page_size: None,
            paging_state: None,
            skip_metadata: false,
            values: Cow::Borrowed(&[]),
        }
    }
}

impl QueryParameters<'_> {
    pub fn into_owned(self) -> QueryParameters<'static> {
        QueryParameters {
            consistency: self.consistency,
            serial_consistency: self.serial_consistency,
            page_size: self.page_size,
            paging_state: self.paging_state,
            skip_metadata: self.skip_metadata,
            values: Cow::Owned(self.values.into_owned()),
        }
    }

    // Whether these parameters need nothing beyond what protocol v1 can express for QUERY.
    pub(crate) fn is_plain(&self) -> bool {
        self.values.is_empty() && !self.has_v2_options()
    }

    pub(crate) fn has_v2_options(&self) -> bool {
        self.serial_consistency.is_some()
            || self.page_size.is_some()
            || self.paging_state.is_some()
            || self.skip_metadata
    }

    pub fn serialize(&self, buf: &mut Vec<u8>) -> Result<(), RequestSerializationError> {
        types::write_consistency(self.consistency, buf);

        let mut flags = 0;
        if !self.values.is_empty() {
            flags |= FLAG_VALUES;
        }

        if self.skip_metadata {
            flags |= FLAG_SKIP_METADATA;
        }

        if self.page_size.is_some() {
            flags |= FLAG_PAGE_SIZE;
        }

        if self.paging_state.is_some() {
            flags |= FLAG_WITH_PAGING_STATE;
        }

        if self.serial_consistency.is_some() {
            flags |= FLAG_WITH_SERIAL_CONSISTENCY;
        }

        buf.put_u8(flags);

        if !self.values.is_empty() {
            write_values(&self.values, buf)?;
        }

        if let Some(page_size) = self.page_size {
            types::write_int(page_size, buf);
        }

        if let Some(paging_state) = &self.paging_state {
            types::write_bytes(paging_state, buf)?;
        }

        if let Some(serial_consistency) = self.serial_consistency {
            types::write_serial_consistency(serial_consistency, buf);
        }

        Ok(())
    }

    pub fn deserialize(
        buf: &mut &[u8],
    ) -> Result<QueryParameters<'static>, RequestDeserializationError> {
        let consistency = types::read_consistency(buf)?;

        let flags = types::read_byte(buf)?;
        let unknown_flags = flags & (!ALL_FLAGS);
        if unknown_flags != 0 {
            return Err(RequestDeserializationError::UnknownFlags {
                flags: unknown_flags,
            });
        }
        let values_flag = (flags & FLAG_VALUES) != 0;
        let skip_metadata = (flags & FLAG_SKIP_METADATA) != 0;
        let page_size_flag = (flags & FLAG_PAGE_SIZE) != 0;
        let paging_state_flag = (flags & FLAG_WITH_PAGING_STATE) != 0;
        let serial_consistency_flag = (flags & FLAG_WITH_SERIAL_CONSISTENCY) != 0;

        let values = if values_flag {
            read_values(buf)?
        } else {
            Vec::new()
        };

        let page_size = page_size_flag.then(|| types::read_int(buf)).transpose()?;
        let paging_state = if paging_state_flag {
            Some(Bytes::copy_from_slice(types::read_bytes(buf)?))
        } else {
            None
        };
        let serial_consistency = serial_consistency_flag
            .then(|| types::read_consistency(buf))
            .transpose()?
            .map(|consistency| {
                SerialConsistency::try_from(consistency as u16).map_err(|_| {
                    RequestDeserializationError::ExpectedSerialConsistency(consistency)
                })
            })
            .transpose()?;

        Ok(QueryParameters {
            consistency,
            serial_consistency,
            page_size,
            paging_state,
            skip_metadata,
            values: Cow::Owned(values),
        })
    }
}
