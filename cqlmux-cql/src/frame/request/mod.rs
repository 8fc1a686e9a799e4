//! CQL requests sent by the client.

pub mod auth_response;
pub mod batch;
pub mod credentials;
pub mod execute;
pub mod options;
pub mod prepare;
pub mod query;
pub mod register;
pub mod startup;

use bytes::Bytes;

pub use auth_response::AuthResponse;
pub use batch::Batch;
pub use credentials::Credentials;
pub use execute::Execute;
pub use options::Options;
pub use prepare::Prepare;
pub use query::Query;
pub use register::Register;
pub use startup::Startup;

use super::frame_errors::{RequestDeserializationError, RequestSerializationError};
use super::types;
use super::{ProtocolVersion, TryFromPrimitiveError};

/// Opcode of a request, used to identify the request type in a CQL frame.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum RequestOpcode {
    /// Initializes the connection. Answered with READY or AUTHENTICATE.
    Startup = 0x01,
    /// Protocol v1 authentication: a map of credentials, answered with READY or ERROR.
    Credentials = 0x04,
    /// Asks which STARTUP options the server supports. Answered with SUPPORTED.
    Options = 0x05,
    Query = 0x07,
    Prepare = 0x09,
    Execute = 0x0A,
    /// Subscribes the connection to server events. Answered with READY.
    Register = 0x0B,
    /// Protocol v2 only.
    Batch = 0x0D,
    /// Protocol v2 SASL exchange. Answered with AUTH_CHALLENGE, AUTH_SUCCESS or ERROR.
    AuthResponse = 0x0F,
}

impl TryFrom<u8> for RequestOpcode {
    type Error = TryFromPrimitiveError<u8>;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x01 => Ok(Self::Startup),
            0x04 => Ok(Self::Credentials),
            0x05 => Ok(Self::Options),
            0x07 => Ok(Self::Query),
            0x09 => Ok(Self::Prepare),
            0x0A => Ok(Self::Execute),
            0x0B => Ok(Self::Register),
            0x0D => Ok(Self::Batch),
            0x0F => Ok(Self::AuthResponse),
            _ => Err(TryFromPrimitiveError {
                enum_name: "RequestOpcode",
                primitive: value,
            }),
        }
    }
}

impl std::fmt::Display for RequestOpcode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Requests that can be serialized into a CQL frame.
pub trait SerializableRequest {
    /// Opcode of the request, used to identify the request type in the CQL frame.
    const OPCODE: RequestOpcode;

    /// Serializes the request body into the provided buffer.
    fn serialize(
        &self,
        version: ProtocolVersion,
        buf: &mut Vec<u8>,
    ) -> Result<(), RequestSerializationError>;

    /// Serializes the request body into a heap-allocated `Bytes` object.
    fn to_bytes(&self, version: ProtocolVersion) -> Result<Bytes, RequestSerializationError> {
        let mut v = Vec::new();
        self.serialize(version, &mut v)?;
        Ok(v.into())
    }

    /// The query string carried by the request, if it has one.
    fn cql(&self) -> Option<&str> {
        None
    }
}

/// Requests that can be deserialized from a CQL frame.
///
/// Not used by the client itself, but very useful for testing
/// (e.g. fake servers asserting that the sent requests have proper parameters set).
pub trait DeserializableRequest: SerializableRequest + Sized {
    fn deserialize(
        version: ProtocolVersion,
        buf: &mut &[u8],
    ) -> Result<Self, RequestDeserializationError>;
}

pub(crate) fn unsupported_in(
    request: RequestOpcode,
    version: ProtocolVersion,
) -> RequestSerializationError {
    RequestSerializationError::UnsupportedInVersion {
        request: request.name(),
        version: version.as_u8(),
    }
}

impl RequestOpcode {
    pub fn name(self) -> &'static str {
        match self {
            RequestOpcode::Startup => "STARTUP",
            RequestOpcode::Credentials => "CREDENTIALS",
            RequestOpcode::Options => "OPTIONS",
            RequestOpcode::Query => "QUERY",
            RequestOpcode::Prepare => "PREPARE",
            RequestOpcode::Execute => "EXECUTE",
            RequestOpcode::Register => "REGISTER",
            RequestOpcode::Batch => "BATCH",
            RequestOpcode::AuthResponse => "AUTH_RESPONSE",
        }
    }
}

/// Any request, as decoded by a server.
#[doc(hidden)]
#[derive(Debug, PartialEq)]
pub enum Request {
    Startup(Startup<'static>),
    Credentials(Credentials),
    Options(Options),
    Query(Query<'static>),
    Prepare(Prepare<'static>),
    Execute(Execute<'static>),
    Register(Register),
    Batch(Batch<'static>),
    AuthResponse(AuthResponse),
}

impl Request {
    pub fn deserialize(
        version: ProtocolVersion,
        opcode: RequestOpcode,
        buf: &mut &[u8],
    ) -> Result<Self, RequestDeserializationError> {
        let request = match opcode {
            RequestOpcode::Startup => Self::Startup(Startup::deserialize(version, buf)?),
            RequestOpcode::Credentials => {
                Self::Credentials(Credentials::deserialize(version, buf)?)
            }
            RequestOpcode::Options => Self::Options(Options::deserialize(version, buf)?),
            RequestOpcode::Query => Self::Query(Query::deserialize(version, buf)?),
            RequestOpcode::Prepare => Self::Prepare(Prepare::deserialize(version, buf)?),
            RequestOpcode::Execute => Self::Execute(Execute::deserialize(version, buf)?),
            RequestOpcode::Register => Self::Register(Register::deserialize(version, buf)?),
            RequestOpcode::Batch => Self::Batch(Batch::deserialize(version, buf)?),
            RequestOpcode::AuthResponse => {
                Self::AuthResponse(AuthResponse::deserialize(version, buf)?)
            }
        };

        Ok(request)
    }
}

fn write_values(
    values: &[Option<Bytes>],
    buf: &mut Vec<u8>,
) -> Result<(), RequestSerializationError> {
    types::write_short_length(values.len(), buf)?;
    for value in values {
        types::write_bytes_opt(value.as_ref(), buf)?;
    }
    Ok(())
}

fn read_values(buf: &mut &[u8]) -> Result<Vec<Option<Bytes>>, RequestDeserializationError> {
    let count = types::read_short_length(buf)?;
    let mut values = Vec::with_capacity(count);
    for _ in 0..count {
        values.push(types::read_bytes_opt(buf)?.map(Bytes::copy_from_slice));
    }
    Ok(values)
}

#[cfg(test)]
mod tests {
    use std::borrow::Cow;

    use assert_matches::assert_matches;
    use bytes::Bytes;

    use super::query::QueryParameters;
    use super::*;
    use crate::frame::frame_errors::RequestSerializationError;
    use crate::frame::types::SerialConsistency;
    use crate::Consistency;

    #[test]
    fn v2_query_parameters_survive_a_server_decode() {
        let query = Query {
            contents: Cow::Borrowed("SELECT host_id FROM system.peers"),
            parameters: QueryParameters {
                consistency: Consistency::LocalQuorum,
                serial_consistency: Some(SerialConsistency::LocalSerial),
                page_size: Some(5000),
                paging_state: Some(Bytes::from_static(&[2, 1, 3, 7])),
                skip_metadata: true,
                values: Cow::Owned(vec![Some(Bytes::from_static(&[0, 0, 8, 0x59])), None]),
            },
        };

        let body = query.to_bytes(ProtocolVersion::V2).unwrap();
        let decoded = Request::deserialize(ProtocolVersion::V2, RequestOpcode::Query, &mut &*body)
            .unwrap();
        assert_eq!(decoded, Request::Query(query.into_owned()));
    }

    #[test]
    fn v1_query_is_string_and_consistency_only() {
        let query = Query {
            contents: Cow::Borrowed("USE ks"),
            parameters: QueryParameters {
                consistency: Consistency::Quorum,
                ..Default::default()
            },
        };

        let body = query.to_bytes(ProtocolVersion::V1).unwrap();
        assert_eq!(&body[..], b"\0\0\0\x06USE ks\0\x04");

        let with_values = Query {
            parameters: QueryParameters {
                values: Cow::Owned(vec![None]),
                ..Default::default()
            },
            ..query
        };
        assert_matches!(
            with_values.to_bytes(ProtocolVersion::V1),
            Err(RequestSerializationError::UnsupportedInVersion {
                request: "QUERY",
                version: 1
            })
        );
    }

    #[test]
    fn version_specific_requests() {
        let auth = AuthResponse {
            response: Some(b"token".to_vec()),
        };
        assert_matches!(
            auth.to_bytes(ProtocolVersion::V1),
            Err(RequestSerializationError::UnsupportedInVersion { .. })
        );

        let credentials = Credentials {
            credentials: [("username".to_owned(), "u".to_owned())].into(),
        };
        assert_matches!(
            credentials.to_bytes(ProtocolVersion::V2),
            Err(RequestSerializationError::UnsupportedInVersion { .. })
        );
        assert!(credentials.to_bytes(ProtocolVersion::V1).is_ok());
    }

    #[test]
    fn deser_rejects_unknown_flags() {
        let query = Query {
            contents: Cow::Borrowed("SELECT * FROM t"),
            parameters: QueryParameters::default(),
        };
        let mut body = query.to_bytes(ProtocolVersion::V2).unwrap().to_vec();

        // Flags are the last byte when no optional parameter is set.
        *body.last_mut().unwrap() |= 0x80;
        assert_matches!(
            Query::deserialize(ProtocolVersion::V2, &mut &body[..]),
            Err(RequestDeserializationError::UnknownFlags { flags: 0x80 })
        );
    }
}
