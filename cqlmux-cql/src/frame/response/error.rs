use crate::frame::frame_errors::{LowLevelDeserializationError, ParseError};
use crate::frame::types;
use crate::Consistency;
use byteorder::ReadBytesExt;
use bytes::Bytes;
use thiserror::Error;

/// Body of an ERROR response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Error {
    pub error: DbError,
    pub reason: String,
}

fn make_error_field_err(
    db_error: &'static str,
    field: &'static str,
    err: impl Into<LowLevelDeserializationError>,
) -> ParseError {
    ParseError::MalformedErrorField {
        db_error,
        field,
        err: err.into(),
    }
}

impl Error {
    pub fn deserialize(buf: &mut &[u8]) -> Result<Self, ParseError> {
        let code = types::read_int(buf)?;
        let reason = types::read_string(buf)?.to_owned();

        let error: DbError = match code {
            0x0000 => DbError::ServerError,
            0x000A => DbError::ProtocolError,
            0x0100 => DbError::AuthenticationError,
            0x1000 => DbError::Unavailable {
                consistency: types::read_consistency(buf)
                    .map_err(|err| make_error_field_err("UNAVAILABLE", "CONSISTENCY", err))?,
                required: types::read_int(buf)
                    .map_err(|err| make_error_field_err("UNAVAILABLE", "REQUIRED", err))?,
                alive: types::read_int(buf)
                    .map_err(|err| make_error_field_err("UNAVAILABLE", "ALIVE", err))?,
            },
            0x1001 => DbError::Overloaded,
            0x1002 => DbError::IsBootstrapping,
            0x1003 => DbError::TruncateError,
            0x1100 => DbError::WriteTimeout {
                consistency: types::read_consistency(buf)
                    .map_err(|err| make_error_field_err("WRITE_TIMEOUT", "CONSISTENCY", err))?,
                received: types::read_int(buf)
                    .map_err(|err| make_error_field_err("WRITE_TIMEOUT", "RECEIVED", err))?,
                required: types::read_int(buf)
                    .map_err(|err| make_error_field_err("WRITE_TIMEOUT", "BLOCKFOR", err))?,
                write_type: WriteType::from(
                    types::read_string(buf)
                        .map_err(|err| make_error_field_err("WRITE_TIMEOUT", "WRITE_TYPE", err))?,
                ),
            },
            0x1200 => DbError::ReadTimeout {
                consistency: types::read_consistency(buf)
                    .map_err(|err| make_error_field_err("READ_TIMEOUT", "CONSISTENCY", err))?,
                received: types::read_int(buf)
                    .map_err(|err| make_error_field_err("READ_TIMEOUT", "RECEIVED", err))?,
                required: types::read_int(buf)
                    .map_err(|err| make_error_field_err("READ_TIMEOUT", "BLOCKFOR", err))?,
                data_present: buf
                    .read_u8()
                    .map_err(|err| make_error_field_err("READ_TIMEOUT", "DATA_PRESENT", err))?
                    != 0,
            },
            0x2000 => DbError::SyntaxError,
            0x2100 => DbError::Unauthorized,
            0x2200 => DbError::Invalid,
            0x2300 => DbError::ConfigError,
            0x2400 => DbError::AlreadyExists {
                keyspace: types::read_string(buf)
                    .map_err(|err| make_error_field_err("ALREADY_EXISTS", "KEYSPACE", err))?
                    .to_string(),
                table: types::read_string(buf)
                    .map_err(|err| make_error_field_err("ALREADY_EXISTS", "TABLE", err))?
                    .to_string(),
            },
            0x2500 => DbError::Unprepared {
                statement_id: Bytes::from(
                    types::read_short_bytes(buf)
                        .map_err(|err| make_error_field_err("UNPREPARED", "STATEMENT_ID", err))?
                        .to_owned(),
                ),
            },
            _ => DbError::Other(code),
        };

        Ok(Error { error, reason })
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (code {:#06x}): {}", self.reason, self.error.code(), self.error)
    }
}

/// Error code of an ERROR response, with the extra fields protocol v1 and
/// v2 attach to some codes.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DbError {
    /// 0x2000: the query text does not parse.
    #[error("The submitted query has a syntax error")]
    SyntaxError,

    /// 0x2200: the query parses but cannot be executed as written.
    #[error("The query is syntactically correct but invalid")]
    Invalid,

    /// 0x2400: a CREATE targeted a keyspace or table that exists.
    #[error("Keyspace or table already exists (keyspace: {keyspace}, table: {table})")]
    AlreadyExists {
        /// The keyspace created, or the keyspace of the table created.
        keyspace: String,
        /// Empty when a keyspace was created.
        table: String,
    },

    /// 0x0100: the server refused the CREDENTIALS (v1) or the AUTH_RESPONSE (v2).
    #[error("Authentication failed: the server did not accept the credentials")]
    AuthenticationError,

    /// 0x2100: the authenticated user lacks the permission the query needs.
    #[error("The logged user is not authorized to perform the query")]
    Unauthorized,

    /// 0x2300: the query conflicts with the node's configuration.
    #[error("The query is invalid because of the node configuration")]
    ConfigError,

    /// 0x1000: too few replicas were known alive when the coordinator
    /// received the request.
    #[error(
        "Not enough replicas alive to reach consistency {consistency} \
        (required: {required}, alive: {alive})"
    )]
    Unavailable {
        /// Consistency level the query was sent with.
        consistency: Consistency,
        /// Replicas that had to be alive.
        required: i32,
        /// Replicas known alive.
        alive: i32,
    },

    /// 0x1001: the coordinator is overloaded and did not process the request.
    #[error("The coordinator node is overloaded")]
    Overloaded,

    /// 0x1002: the request reached a node that is still bootstrapping.
    #[error("The coordinator node is still bootstrapping")]
    IsBootstrapping,

    /// 0x1003: a TRUNCATE failed.
    #[error("Error during truncate operation")]
    TruncateError,

    /// 0x1200: too few replicas answered a read before the server-side timeout.
    #[error(
        "Read timed out at consistency {consistency} \
        (received: {received}, block for: {required}, data present: {data_present})"
    )]
    ReadTimeout {
        /// Consistency level the query was sent with.
        consistency: Consistency,
        /// Replicas that answered.
        received: i32,
        /// Replicas whose answer was needed ("blockfor" in the protocol).
        required: i32,
        /// `false` when the replica asked for the data itself did not answer.
        data_present: bool,
    },

    /// 0x1100: too few replicas acknowledged a write before the server-side timeout.
    #[error(
        "Write timed out at consistency {consistency} \
        (received: {received}, block for: {required}, write type: {write_type})"
    )]
    WriteTimeout {
        /// Consistency level the query was sent with.
        consistency: Consistency,
        /// Replicas that acknowledged the write.
        received: i32,
        /// Acknowledgements needed ("blockfor" in the protocol).
        required: i32,
        /// Kind of write that timed out.
        write_type: WriteType,
    },

    /// 0x2500: EXECUTE named a statement id the node does not know; it has
    /// to be prepared again.
    #[error("Statement is not prepared on this node")]
    Unprepared {
        /// The id sent with EXECUTE.
        statement_id: Bytes,
    },

    /// 0x0000: something unexpected happened on the server.
    #[error("Internal server error")]
    ServerError,

    /// 0x000A: the client broke the protocol, e.g. sent QUERY before STARTUP.
    #[error("Protocol violation reported by the server")]
    ProtocolError,

    /// A code protocol v1 and v2 do not define.
    #[error("Unknown error code: {0:#06x}")]
    Other(i32),
}

impl DbError {
    pub fn code(&self) -> i32 {
        match self {
            DbError::ServerError => 0x0000,
            DbError::ProtocolError => 0x000A,
            DbError::AuthenticationError => 0x0100,
            DbError::Unavailable { .. } => 0x1000,
            DbError::Overloaded => 0x1001,
            DbError::IsBootstrapping => 0x1002,
            DbError::TruncateError => 0x1003,
            DbError::WriteTimeout { .. } => 0x1100,
            DbError::ReadTimeout { .. } => 0x1200,
            DbError::SyntaxError => 0x2000,
            DbError::Unauthorized => 0x2100,
            DbError::Invalid => 0x2200,
            DbError::ConfigError => 0x2300,
            DbError::AlreadyExists { .. } => 0x2400,
            DbError::Unprepared { .. } => 0x2500,
            DbError::Other(code) => *code,
        }
    }
}

/// `writeType` of a WRITE_TIMEOUT error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteType {
    /// A non-batched, non-counter write.
    Simple,
    /// A logged batch whose batch log was written; the timeout hit the batch
    /// itself.
    Batch,
    /// An unlogged batch; no batch log write was attempted.
    UnloggedBatch,
    /// A counter update, batched or not.
    Counter,
    /// Writing the batch log of a logged batch timed out.
    BatchLog,
    /// A compare-and-set write (protocol v2).
    Cas,
    /// A write type neither protocol version defines.
    Other(String),
}

impl std::fmt::Display for WriteType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for WriteType {
    fn from(write_type: &str) -> WriteType {
        match write_type {
            "SIMPLE" => WriteType::Simple,
            "BATCH" => WriteType::Batch,
            "UNLOGGED_BATCH" => WriteType::UnloggedBatch,
            "COUNTER" => WriteType::Counter,
            "BATCH_LOG" => WriteType::BatchLog,
            "CAS" => WriteType::Cas,
            _ => WriteType::Other(write_type.to_owned()),
        }
    }
}

impl WriteType {
    pub fn as_str(&self) -> &str {
        match self {
            WriteType::Simple => "SIMPLE",
            WriteType::Batch => "BATCH",
            WriteType::UnloggedBatch => "UNLOGGED_BATCH",
            WriteType::Counter => "COUNTER",
            WriteType::BatchLog => "BATCH_LOG",
            WriteType::Cas => "CAS",
            WriteType::Other(write_type) => write_type.as_str(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{DbError, Error, WriteType};
    use crate::frame::frame_errors::ParseError;
    use crate::Consistency;
    use assert_matches::assert_matches;
    use bytes::Bytes;

    // Serializes the beginning of an ERROR body (code + reason)
    fn make_error_request_bytes(code: i32, message: &str) -> Vec<u8> {
        let mut bytes: Vec<u8> = Vec::new();
        let message_len: u16 = message.len().try_into().unwrap();

        bytes.extend(code.to_be_bytes());
        bytes.extend(message_len.to_be_bytes());
        bytes.extend(message.as_bytes());

        bytes
    }

    // Tests deserialization of all errors without additional data
    #[test]
    fn deserialize_simple_errors() {
        let simple_error_mappings: [(i32, DbError); 11] = [
            (0x0000, DbError::ServerError),
            (0x000A, DbError::ProtocolError),
            (0x0100, DbError::AuthenticationError),
            (0x1001, DbError::Overloaded),
            (0x1002, DbError::IsBootstrapping),
            (0x1003, DbError::TruncateError),
            (0x2000, DbError::SyntaxError),
            (0x2100, DbError::Unauthorized),
            (0x2200, DbError::Invalid),
            (0x2300, DbError::ConfigError),
            (0x1234, DbError::Other(0x1234)),
        ];

        for (error_code, expected_error) in &simple_error_mappings {
            let bytes: Vec<u8> = make_error_request_bytes(*error_code, "simple message");
            let error: Error = Error::deserialize(&mut bytes.as_slice()).unwrap();
            assert_eq!(error.error, *expected_error);
            assert_eq!(error.reason, "simple message");
            assert_eq!(error.error.code(), *error_code);
        }
    }

    #[test]
    fn deserialize_unavailable() {
        let mut bytes = make_error_request_bytes(0x1000, "message 2");
        bytes.extend(1_i16.to_be_bytes());
        bytes.extend(2_i32.to_be_bytes());
        bytes.extend(3_i32.to_be_bytes());

        let error: Error = Error::deserialize(&mut bytes.as_slice()).unwrap();

        assert_eq!(
            error.error,
            DbError::Unavailable {
                consistency: Consistency::One,
                required: 2,
                alive: 3,
            }
        );
        assert_eq!(error.reason, "message 2");
    }

    #[test]
    fn deserialize_write_timeout() {
        let mut bytes = make_error_request_bytes(0x1100, "message 2");
        bytes.extend(0x0004_i16.to_be_bytes());
        bytes.extend((-5_i32).to_be_bytes());
        bytes.extend(100_i32.to_be_bytes());

        let write_type_str = "SIMPLE";
        let write_type_str_len: u16 = write_type_str.len().try_into().unwrap();
        bytes.extend(write_type_str_len.to_be_bytes());
        bytes.extend(write_type_str.as_bytes());

        let error: Error = Error::deserialize(&mut bytes.as_slice()).unwrap();

        assert_eq!(
            error.error,
            DbError::WriteTimeout {
                consistency: Consistency::Quorum,
                received: -5, // Allow negative values when they don't make sense, it's better than crashing with ProtocolError
                required: 100,
                write_type: WriteType::Simple,
            }
        );
        assert_eq!(error.reason, "message 2");
    }

    #[test]
    fn deserialize_read_timeout() {
        let mut bytes = make_error_request_bytes(0x1200, "message 2");
        bytes.extend(0x0002_i16.to_be_bytes());
        bytes.extend(8_i32.to_be_bytes());
        bytes.extend(32_i32.to_be_bytes());
        bytes.push(0_u8);

        let error: Error = Error::deserialize(&mut bytes.as_slice()).unwrap();

        assert_eq!(
            error.error,
            DbError::ReadTimeout {
                consistency: Consistency::Two,
                received: 8,
                required: 32,
                data_present: false,
            }
        );
    }

    #[test]
    fn deserialize_already_exists_and_unprepared() {
        let mut bytes = make_error_request_bytes(0x2400, "message 2");
        bytes.extend(5_u16.to_be_bytes());
        bytes.extend("my_ks".as_bytes());
        bytes.extend(0_u16.to_be_bytes());

        let error: Error = Error::deserialize(&mut bytes.as_slice()).unwrap();
        assert_eq!(
            error.error,
            DbError::AlreadyExists {
                keyspace: "my_ks".to_string(),
                table: String::new(),
            }
        );

        let mut bytes = make_error_request_bytes(0x2500, "message 3");
        bytes.extend(4_u16.to_be_bytes());
        bytes.extend([1, 2, 3, 4]);

        let error: Error = Error::deserialize(&mut bytes.as_slice()).unwrap();
        assert_eq!(
            error.error,
            DbError::Unprepared {
                statement_id: Bytes::from_static(&[1, 2, 3, 4]),
            }
        );
    }

    #[test]
    fn write_timeout_of_a_compare_and_set() {
        let mut bytes = make_error_request_bytes(0x1100, "cas timeout");
        bytes.extend(0x0008_i16.to_be_bytes());
        bytes.extend(0_i32.to_be_bytes());
        bytes.extend(1_i32.to_be_bytes());
        bytes.extend(3_u16.to_be_bytes());
        bytes.extend("CAS".as_bytes());

        let error: Error = Error::deserialize(&mut bytes.as_slice()).unwrap();
        assert_eq!(
            error.error,
            DbError::WriteTimeout {
                consistency: Consistency::Serial,
                received: 0,
                required: 1,
                write_type: WriteType::Cas,
            }
        );
        assert_eq!(
            error.to_string(),
            "cas timeout (code 0x1100): Write timed out at consistency Serial \
             (received: 0, block for: 1, write type: CAS)"
        );
        assert_eq!(WriteType::from("VIEW"), WriteType::Other("VIEW".to_owned()));
    }

    #[test]
    fn truncated_detail_names_the_field() {
        let mut bytes = make_error_request_bytes(0x1000, "unavailable");
        bytes.extend(1_i16.to_be_bytes());

        assert_matches!(
            Error::deserialize(&mut bytes.as_slice()),
            Err(ParseError::MalformedErrorField {
                db_error: "UNAVAILABLE",
                field: "REQUIRED",
                ..
            })
        );
    }
}
