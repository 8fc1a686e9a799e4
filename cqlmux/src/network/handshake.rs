//! Turning a host name into a ready-to-use [`Channel`].
//!
//! A [`Connector`] runs a [`PendingConnection`] through a list of
//! [`HandshakeStep`]s. The default steps open the transport, ask the server
//! for its options, send STARTUP, authenticate when asked to, and read the
//! node's identity from `system.local`.

use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use cqlmux_cql::frame::compression::Compressor;
use cqlmux_cql::frame::request::options::{self, DEFAULT_CQL_VERSION};
use cqlmux_cql::frame::request::{AuthResponse, Credentials, Options, RequestOpcode, Startup};
use cqlmux_cql::frame::response::{result, NonErrorResponse};
use cqlmux_cql::frame::ProtocolVersion;
use cqlmux_cql::Consistency;
use itertools::Itertools;
use tracing::{debug, warn};

use super::channel::{Channel, ChannelConfig};
use super::reactor::{Reactor, TokioReactor};
use crate::authentication::{AuthenticatorProvider, InitialResponse};
use crate::errors::{
    AuthenticationError, ConnectionSetupError, NotConnectedError, RequestError,
};

pub(crate) const LOCAL_QUERY: &str = "SELECT data_center, host_id FROM system.local";

/// Configuration of every connection opened by a [`Connector`].
#[derive(Clone)]
pub struct ConnectionConfig {
    pub port: u16,
    /// Bounds the TCP connect and each request of the handshake.
    pub connect_timeout: Duration,
    pub protocol_version: ProtocolVersion,
    pub cql_version: String,
    pub compressor: Option<Arc<dyn Compressor>>,
    pub authenticator: Option<Arc<dyn AuthenticatorProvider>>,
    pub max_timed_out_streams: Option<usize>,
    pub reactor: Arc<dyn Reactor>,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            port: 9042,
            connect_timeout: Duration::from_secs(5),
            protocol_version: ProtocolVersion::V2,
            cql_version: DEFAULT_CQL_VERSION.to_owned(),
            compressor: None,
            authenticator: None,
            max_timed_out_streams: None,
            reactor: Arc::new(TokioReactor::default()),
        }
    }
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("port", &self.port)
            .field("connect_timeout", &self.connect_timeout)
            .field("protocol_version", &self.protocol_version)
            .field("cql_version", &self.cql_version)
            .field("compressor", &self.compressor)
            .field("authenticator", &self.authenticator.is_some())
            .field("max_timed_out_streams", &self.max_timed_out_streams)
            .field("reactor", &self.reactor)
            .finish()
    }
}

/// A connection while it is being set up.
#[derive(Debug)]
pub struct PendingConnection {
    pub host: String,
    pub port: u16,
    /// Set by the step that opens the transport.
    pub channel: Option<Arc<Channel>>,
    /// Class of the server-side authenticator, if STARTUP was answered with AUTHENTICATE.
    pub authentication_class: Option<String>,
}

impl PendingConnection {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            channel: None,
            authentication_class: None,
        }
    }

    /// The channel opened by an earlier step.
    pub fn channel(&self) -> Result<&Arc<Channel>, ConnectionSetupError> {
        self.channel
            .as_ref()
            .ok_or_else(|| RequestError::from(NotConnectedError).into())
    }
}

/// One stage of the connection handshake.
#[async_trait]
pub trait HandshakeStep: Send + Sync + fmt::Debug {
    async fn run(&self, pending: &mut PendingConnection) -> Result<(), ConnectionSetupError>;
}

/// Opens connections by running every step in order.
///
/// A failing step aborts the attempt; the channel opened so far is closed.
#[derive(Debug, Clone)]
pub struct Connector {
    port: u16,
    steps: Vec<Arc<dyn HandshakeStep>>,
}

impl Connector {
    pub fn new(port: u16, steps: Vec<Arc<dyn HandshakeStep>>) -> Self {
        Self { port, steps }
    }

    /// The standard handshake: connect, OPTIONS, STARTUP, authentication,
    /// and node properties.
    pub fn with_default_steps(config: &ConnectionConfig) -> Self {
        let timeout = config.connect_timeout;
        let steps: Vec<Arc<dyn HandshakeStep>> = vec![
            Arc::new(ConnectStep {
                reactor: config.reactor.clone(),
                timeout,
                channel_config: ChannelConfig {
                    protocol_version: config.protocol_version,
                    max_timed_out_streams: config.max_timed_out_streams,
                },
            }),
            Arc::new(CacheOptionsStep { timeout }),
            Arc::new(InitializeStep {
                cql_version: config.cql_version.clone(),
                compressor: config.compressor.clone(),
                timeout,
            }),
            Arc::new(AuthenticationStep {
                authenticator: config.authenticator.clone(),
                timeout,
            }),
            Arc::new(CachePropertiesStep { timeout }),
        ];
        Self::new(config.port, steps)
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub async fn connect(&self, host: &str) -> Result<Arc<Channel>, ConnectionSetupError> {
        let mut pending = PendingConnection::new(host, self.port);
        for step in &self.steps {
            if let Err(err) = step.run(&mut pending).await {
                if let Some(channel) = pending.channel.take() {
                    channel.close();
                }
                return Err(err);
            }
        }
        match pending.channel {
            Some(channel) => Ok(channel),
            None => Err(RequestError::from(NotConnectedError).into()),
        }
    }
}

fn unexpected(request: RequestOpcode, response: NonErrorResponse) -> ConnectionSetupError {
    RequestError::UnexpectedResponse {
        request: request.name(),
        response: response.kind(),
    }
    .into()
}

/// Opens the transport and wraps it in a [`Channel`].
#[derive(Debug)]
pub struct ConnectStep {
    reactor: Arc<dyn Reactor>,
    timeout: Duration,
    channel_config: ChannelConfig,
}

#[async_trait]
impl HandshakeStep for ConnectStep {
    async fn run(&self, pending: &mut PendingConnection) -> Result<(), ConnectionSetupError> {
        debug!("Connecting to node at {}:{}", pending.host, pending.port);
        let handle = self
            .reactor
            .connect(&pending.host, pending.port, self.timeout)
            .await?;
        pending.channel = Some(Channel::new(
            pending.host.clone(),
            pending.port,
            handle,
            self.channel_config.clone(),
        ));
        Ok(())
    }
}

/// Sends OPTIONS and remembers what the server supports.
#[derive(Debug)]
pub struct CacheOptionsStep {
    timeout: Duration,
}

#[async_trait]
impl HandshakeStep for CacheOptionsStep {
    async fn run(&self, pending: &mut PendingConnection) -> Result<(), ConnectionSetupError> {
        let channel = pending.channel()?;
        match channel.execute(&Options, Some(self.timeout)).await? {
            NonErrorResponse::Supported(supported) => {
                channel.update_metadata(|metadata| {
                    metadata.cql_versions = supported.cql_versions().to_vec();
                    metadata.compression = supported.compression().to_vec();
                });
                Ok(())
            }
            other => Err(unexpected(RequestOpcode::Options, other)),
        }
    }
}

/// Sends STARTUP, negotiating compression when both sides support the
/// configured algorithm.
#[derive(Debug)]
pub struct InitializeStep {
    cql_version: String,
    compressor: Option<Arc<dyn Compressor>>,
    timeout: Duration,
}

#[async_trait]
impl HandshakeStep for InitializeStep {
    async fn run(&self, pending: &mut PendingConnection) -> Result<(), ConnectionSetupError> {
        let channel = pending.channel()?.clone();

        let mut startup_options: HashMap<Cow<'_, str>, Cow<'_, str>> = HashMap::new();
        startup_options.insert(
            Cow::Borrowed(options::CQL_VERSION),
            Cow::Borrowed(self.cql_version.as_str()),
        );

        let compressor = self.compressor.as_ref().and_then(|compressor| {
            let algorithm = compressor.algorithm();
            let supported = channel.metadata().compression;
            if supported.iter().any(|name| name == algorithm) {
                debug!("Using \"{}\" compression", algorithm);
                startup_options.insert(Cow::Borrowed(options::COMPRESSION), Cow::Borrowed(algorithm));
                Some(compressor.clone())
            } else {
                warn!(
                    "Compression algorithm \"{}\" not supported (server supports \"{}\")",
                    algorithm,
                    supported.iter().join("\", \"")
                );
                None
            }
        });

        let startup = Startup {
            options: startup_options,
        };
        match channel.execute(&startup, Some(self.timeout)).await? {
            NonErrorResponse::Ready => {}
            NonErrorResponse::Authenticate(authenticate) => {
                pending.authentication_class = Some(authenticate.authenticator_name);
            }
            other => return Err(unexpected(RequestOpcode::Startup, other)),
        }

        // Everything after STARTUP may be compressed.
        if let Some(compressor) = compressor {
            channel.enable_compression(compressor);
        }
        Ok(())
    }
}

/// Authenticates the connection if STARTUP asked for it.
pub struct AuthenticationStep {
    authenticator: Option<Arc<dyn AuthenticatorProvider>>,
    timeout: Duration,
}

impl fmt::Debug for AuthenticationStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthenticationStep")
            .field("authenticator", &self.authenticator.is_some())
            .field("timeout", &self.timeout)
            .finish()
    }
}

// Server errors answering an authentication request are authentication failures.
fn authentication_error(err: RequestError) -> ConnectionSetupError {
    match err {
        RequestError::Server(err) if err.is_bad_credentials() => {
            AuthenticationError::BadCredentials(err.message).into()
        }
        RequestError::Server(err) => AuthenticationError::Rejected(err.to_string()).into(),
        other => other.into(),
    }
}

#[async_trait]
impl HandshakeStep for AuthenticationStep {
    async fn run(&self, pending: &mut PendingConnection) -> Result<(), ConnectionSetupError> {
        let Some(class) = pending.authentication_class.as_deref() else {
            return Ok(());
        };
        let channel = pending.channel()?;
        let Some(provider) = &self.authenticator else {
            return Err(AuthenticationError::MissingAuthenticator.into());
        };

        let protocol_version = channel.protocol_version();
        if !provider.supports(class, protocol_version) {
            return Err(AuthenticationError::UnsupportedAuthenticator {
                class: class.to_owned(),
                protocol_version: protocol_version.as_u8(),
            }
            .into());
        }

        let (initial_response, mut session) = provider
            .start_authentication_session(class, protocol_version)
            .await
            .map_err(AuthenticationError::Session)?;

        let mut token = match initial_response {
            InitialResponse::Credentials(credentials) => {
                let credentials = Credentials { credentials };
                return match channel
                    .execute(&credentials, Some(self.timeout))
                    .await
                    .map_err(authentication_error)?
                {
                    NonErrorResponse::Ready => Ok(()),
                    other => Err(unexpected(RequestOpcode::Credentials, other)),
                };
            }
            InitialResponse::Token(token) => token,
        };

        loop {
            let auth_response = AuthResponse { response: token };
            match channel
                .execute(&auth_response, Some(self.timeout))
                .await
                .map_err(authentication_error)?
            {
                NonErrorResponse::AuthChallenge(challenge) => {
                    token = session
                        .evaluate_challenge(challenge.authenticate_message.as_deref())
                        .await
                        .map_err(AuthenticationError::Session)?;
                }
                NonErrorResponse::AuthSuccess(success) => {
                    session
                        .success(success.success_message.as_deref())
                        .await
                        .map_err(AuthenticationError::Session)?;
                    return Ok(());
                }
                other => return Err(unexpected(RequestOpcode::AuthResponse, other)),
            }
        }
    }
}

/// Reads the node's data center and host id from `system.local`.
#[derive(Debug)]
pub struct CachePropertiesStep {
    timeout: Duration,
}

#[async_trait]
impl HandshakeStep for CachePropertiesStep {
    async fn run(&self, pending: &mut PendingConnection) -> Result<(), ConnectionSetupError> {
        let channel = pending.channel()?;
        let rows = match channel
            .query(LOCAL_QUERY, Consistency::One, Some(self.timeout))
            .await?
        {
            result::Result::Rows(rows) => rows,
            _ => {
                debug!("system.local query did not return rows, node properties unknown");
                return Ok(());
            }
        };

        if let Some(row) = rows.rows.first() {
            let data_center = rows
                .value(row, "data_center")
                .and_then(|value| value.as_text())
                .cloned();
            let host_id = rows.value(row, "host_id").and_then(|value| value.as_uuid());
            channel.update_metadata(|metadata| {
                metadata.data_center = data_center;
                metadata.host_id = host_id;
            });
        }
        Ok(())
    }
}
