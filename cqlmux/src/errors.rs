//! Errors returned by the transport core.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

pub use cqlmux_cql::frame::frame_errors::{
    FrameError, LowLevelDeserializationError, ParseError, RequestSerializationError,
};
pub use cqlmux_cql::frame::response::error::{DbError, WriteType};

/// Error code the server uses for rejected credentials.
pub const BAD_CREDENTIALS_CODE: i32 = 0x0100;

/// Failure of the byte transport underneath a connection.
#[derive(Error, Debug, Clone)]
#[non_exhaustive]
pub enum TransportError {
    /// Input/Output error has occurred, connection broken etc.
    #[error("IO Error: {0}")]
    Io(Arc<std::io::Error>),

    /// The TCP connection could not be established in time.
    #[error("Timed out after {timeout:?} while connecting to {host}:{port}")]
    ConnectTimeout {
        host: String,
        port: u16,
        timeout: Duration,
    },

    /// The connection is closed.
    #[error("Connection closed")]
    Closed,
}

impl From<std::io::Error> for TransportError {
    fn from(err: std::io::Error) -> Self {
        TransportError::Io(Arc::new(err))
    }
}

/// The reason a connection was closed abruptly.
///
/// Every request that was in flight or queued on the connection fails with it.
#[derive(Error, Debug, Clone)]
#[non_exhaustive]
pub enum ConnectionError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A frame received from the server could not be decoded.
    #[error("Failed to decode a response frame: {0}")]
    ProtocolDecoding(#[from] FrameError),

    /// All stream ids are held by requests that timed out and whose responses never came.
    #[error("Too many timed out requests hold stream ids: {count}")]
    TooManyTimedOutStreams { count: usize },
}

/// Database sent a response containing an error.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message} (code {code:#06x}): {error}{}", cql_suffix(.cql), code = .error.code())]
pub struct ServerError {
    pub error: DbError,
    pub message: String,
    /// Text of the request the error answers, when it had one.
    pub cql: Option<String>,
}

fn cql_suffix(cql: &Option<String>) -> String {
    match cql {
        Some(cql) => format!(" (request: \"{cql}\")"),
        None => String::new(),
    }
}

impl ServerError {
    pub fn new(error: cqlmux_cql::frame::response::Error, cql: Option<String>) -> Self {
        ServerError {
            error: error.error,
            message: error.reason,
            cql,
        }
    }

    pub fn code(&self) -> i32 {
        self.error.code()
    }

    pub fn is_bad_credentials(&self) -> bool {
        self.code() == BAD_CREDENTIALS_CODE
    }
}

/// Authentication of a connection failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum AuthenticationError {
    #[error("Server requested authentication, but no authenticator provided")]
    MissingAuthenticator,

    #[error("Authenticator does not support the required authentication class \"{class}\" and/or protocol version {protocol_version}")]
    UnsupportedAuthenticator { class: String, protocol_version: u8 },

    #[error("Bad credentials: {0}")]
    BadCredentials(String),

    /// The server refused the authentication exchange for another reason.
    #[error("Authentication rejected: {0}")]
    Rejected(String),

    /// The local authenticator session failed.
    #[error("Authenticator session failed: {0}")]
    Session(String),
}

/// No connection is available to send a request on.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("Not connected")]
pub struct NotConnectedError;

/// Error of a single request sent on a connection.
#[derive(Error, Debug, Clone)]
#[non_exhaustive]
pub enum RequestError {
    #[error(transparent)]
    NotConnected(#[from] NotConnectedError),

    /// No response arrived before the deadline.
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// The connection broke before the response arrived.
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// The request could not be encoded.
    #[error("Failed to serialize request: {0}")]
    Serialization(#[source] FrameError),

    #[error(transparent)]
    Server(#[from] ServerError),

    /// The server answered with a response that makes no sense for the request.
    #[error("Unexpected {response} response to {request} request")]
    UnexpectedResponse {
        request: &'static str,
        response: &'static str,
    },
}

impl RequestError {
    pub fn as_server_error(&self) -> Option<&ServerError> {
        match self {
            RequestError::Server(err) => Some(err),
            _ => None,
        }
    }
}

/// Failure of one attempt to open and set up a connection.
#[derive(Error, Debug, Clone)]
#[non_exhaustive]
pub enum ConnectionSetupError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Request(#[from] RequestError),

    #[error(transparent)]
    Authentication(#[from] AuthenticationError),
}

impl ConnectionSetupError {
    pub fn as_server_error(&self) -> Option<&ServerError> {
        match self {
            ConnectionSetupError::Request(err) => err.as_server_error(),
            _ => None,
        }
    }
}

/// Invalid keyspace name given to `Cluster::use_keyspace`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum BadKeyspaceName {
    /// Keyspace name is empty
    #[error("Keyspace name is empty")]
    Empty,

    /// Keyspace name too long, must be up to 48 characters
    #[error("Keyspace name too long, must be up to 48 characters, found {1} characters. Bad keyspace name: '{0}'")]
    TooLong(String, usize),

    /// Illegal character - only alphanumeric and underscores allowed.
    #[error("Illegal character found: '{1}', only alphanumeric and underscores allowed. Bad keyspace name: '{0}'")]
    IllegalCharacter(String, char),
}

/// Error returned by `Cluster::use_keyspace`.
#[derive(Error, Debug, Clone)]
#[non_exhaustive]
pub enum UseKeyspaceError {
    #[error(transparent)]
    BadKeyspaceName(#[from] BadKeyspaceName),

    #[error(transparent)]
    Request(#[from] RequestError),

    /// The server switched to a keyspace other than the one requested.
    #[error("Keyspace name mismatch; expected: {expected_keyspace_name_lowercase}, received: {result_keyspace_name_lowercase}")]
    KeyspaceNameMismatch {
        expected_keyspace_name_lowercase: String,
        result_keyspace_name_lowercase: String,
    },
}

/// Error returned by `Cluster::connect`.
#[derive(Error, Debug, Clone)]
#[non_exhaustive]
pub enum NewClusterError {
    /// No seed node could be connected to.
    #[error("Could not connect to any node: {0}")]
    Connect(#[from] ConnectionSetupError),

    /// The configured keyspace could not be used.
    #[error("Failed to use keyspace: {0}")]
    UseKeyspace(#[from] UseKeyspaceError),
}
