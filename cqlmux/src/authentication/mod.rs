use std::collections::HashMap;

use async_trait::async_trait;
use bytes::{BufMut, BytesMut};
use cqlmux_cql::frame::ProtocolVersion;

/// Type to represent an authentication error message.
pub type AuthError = String;

/// What the client sends first, once the server asked for authentication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InitialResponse {
    /// Protocol v1: a single CREDENTIALS request carrying this map,
    /// answered by READY.
    Credentials(HashMap<String, String>),
    /// Protocol v2: the first AUTH_RESPONSE token of a SASL exchange.
    Token(Option<Vec<u8>>),
}

/// Trait used to represent a user-defined custom authentication.
#[async_trait]
pub trait AuthenticatorSession: Send + Sync {
    /// To handle an authentication challenge initiated by the server.
    /// The information contained in the token parameter is authentication protocol specific.
    /// It may be NULL or empty.
    async fn evaluate_challenge(
        &mut self,
        token: Option<&[u8]>,
    ) -> Result<Option<Vec<u8>>, AuthError>;

    /// To handle the success phase of exchange.
    /// The token parameters contain information that may be used to finalize the request.
    async fn success(&mut self, token: Option<&[u8]>) -> Result<(), AuthError>;
}

/// Trait used to represent a factory of [`AuthenticatorSession`] instances.
/// A new [`AuthenticatorSession`] instance will be created for each connection
/// the server asks to authenticate.
///
/// The authenticator is set with `ClusterBuilder::authenticator_provider`,
/// or `ClusterBuilder::user` for [`PlainTextAuthenticator`].
#[async_trait]
pub trait AuthenticatorProvider: Sync + Send {
    /// Whether this provider can authenticate against the server-side
    /// authenticator `authentication_class` over `protocol_version`.
    fn supports(&self, authentication_class: &str, protocol_version: ProtocolVersion) -> bool;

    /// The initial response and a boxed [`AuthenticatorSession`] that answers
    /// the rest of the exchange.
    async fn start_authentication_session(
        &self,
        authentication_class: &str,
        protocol_version: ProtocolVersion,
    ) -> Result<(InitialResponse, Box<dyn AuthenticatorSession>), AuthError>;
}

struct PlainTextAuthenticatorSession;

#[async_trait]
impl AuthenticatorSession for PlainTextAuthenticatorSession {
    async fn evaluate_challenge(
        &mut self,
        _token: Option<&[u8]>,
    ) -> Result<Option<Vec<u8>>, AuthError> {
        Err("Challenges are not expected during PlainTextAuthentication".to_string())
    }

    async fn success(&mut self, _token: Option<&[u8]>) -> Result<(), AuthError> {
        Ok(())
    }
}

/// Authenticator provider for username/password authentication.
#[derive(Clone)]
pub struct PlainTextAuthenticator {
    username: String,
    password: String,
}

impl std::fmt::Debug for PlainTextAuthenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlainTextAuthenticator")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

impl PlainTextAuthenticator {
    /// Creates new [`PlainTextAuthenticator`] instance with provided username and password.
    pub fn new(username: String, password: String) -> Self {
        PlainTextAuthenticator { username, password }
    }

    fn sasl_plain_token(&self) -> Vec<u8> {
        let mut response = BytesMut::new();
        response.put_u8(0);
        response.put_slice(self.username.as_bytes());
        response.put_u8(0);
        response.put_slice(self.password.as_bytes());
        response.to_vec()
    }
}

#[async_trait]
impl AuthenticatorProvider for PlainTextAuthenticator {
    fn supports(&self, authentication_class: &str, _protocol_version: ProtocolVersion) -> bool {
        // org.apache.cassandra.auth.PasswordAuthenticator and its look-alikes.
        authentication_class.ends_with("PasswordAuthenticator")
    }

    async fn start_authentication_session(
        &self,
        _authentication_class: &str,
        protocol_version: ProtocolVersion,
    ) -> Result<(InitialResponse, Box<dyn AuthenticatorSession>), AuthError> {
        let initial_response = match protocol_version {
            ProtocolVersion::V1 => InitialResponse::Credentials(HashMap::from([
                ("username".to_owned(), self.username.clone()),
                ("password".to_owned(), self.password.clone()),
            ])),
            ProtocolVersion::V2 => InitialResponse::Token(Some(self.sasl_plain_token())),
        };

        Ok((initial_response, Box::new(PlainTextAuthenticatorSession)))
    }
}
