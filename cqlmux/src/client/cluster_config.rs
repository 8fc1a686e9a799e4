use std::sync::Arc;
use std::time::Duration;

use cqlmux_cql::frame::compression::Compressor;
use cqlmux_cql::frame::request::options::DEFAULT_CQL_VERSION;
use cqlmux_cql::frame::ProtocolVersion;

use crate::authentication::AuthenticatorProvider;
use crate::network::handshake::ConnectionConfig;
use crate::network::reactor::{Reactor, TokioReactor};
use crate::policies::connection_strategy::ConnectionStrategy;
use crate::policies::reconnection::{ExponentialReconnectionPolicy, ReconnectionPolicy};
use crate::policies::selection::{RandomSelection, SelectionStrategy};

/// Configuration options for [`Cluster`](crate::cluster::Cluster).
/// Can be created manually, but usually it's easier to use
/// [ClusterBuilder](super::cluster_builder::ClusterBuilder)
#[derive(Clone)]
#[non_exhaustive]
pub struct ClusterConfig {
    /// Hosts to connect to first. Peers are discovered through them.
    /// `localhost` is used when empty.
    pub known_nodes: Vec<String>,

    /// Port of every node, seeds and discovered peers alike.
    pub port: u16,

    /// Bounds opening a connection and each request of its handshake.
    pub connection_timeout: Duration,

    pub connections_per_host: usize,

    pub protocol_version: ProtocolVersion,

    pub cql_version: String,

    /// Preferred compression algorithm. Used only if the server supports it.
    pub compressor: Option<Arc<dyn Compressor>>,

    pub authenticator: Option<Arc<dyn AuthenticatorProvider>>,

    /// Decides which discovered peers to connect to. When `None`, only peers
    /// in the data centers of the seed nodes are connected to.
    pub connection_strategy: Option<Arc<dyn ConnectionStrategy>>,

    /// Picks the connection each request goes to.
    pub selection_strategy: Arc<dyn SelectionStrategy>,

    /// Spaces out peer discovery and seed reconnection attempts.
    pub reconnection_policy: Arc<dyn ReconnectionPolicy>,

    /// Keyspace to use on every connection, double-quoted if case sensitive.
    pub keyspace: Option<String>,

    /// Deadline of requests submitted through the cluster, counted from submission.
    pub request_timeout: Option<Duration>,

    /// Close a connection once this many of its stream ids are held by
    /// requests that timed out.
    pub max_timed_out_streams: Option<usize>,

    pub tcp_nodelay: bool,

    pub tcp_keepalive_interval: Option<Duration>,

    /// Opens transports. When `None`, a [`TokioReactor`] with the TCP options above.
    pub reactor: Option<Arc<dyn Reactor>>,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl ClusterConfig {
    /// Creates a [`ClusterConfig`] with default configuration
    /// # Default configuration
    /// * Known nodes: `localhost`
    /// * Port: 9042
    /// * Connection timeout: 5 seconds
    /// * One connection per host
    /// * Protocol version 2, CQL version 3.0.0
    /// * No compression, no authentication
    /// * Random selection, exponential reconnection from 1 to 60 seconds
    pub fn new() -> Self {
        Self {
            known_nodes: Vec::new(),
            port: 9042,
            connection_timeout: Duration::from_secs(5),
            connections_per_host: 1,
            protocol_version: ProtocolVersion::V2,
            cql_version: DEFAULT_CQL_VERSION.to_owned(),
            compressor: None,
            authenticator: None,
            connection_strategy: None,
            selection_strategy: Arc::new(RandomSelection),
            reconnection_policy: Arc::new(ExponentialReconnectionPolicy::default()),
            keyspace: None,
            request_timeout: None,
            max_timed_out_streams: None,
            tcp_nodelay: true,
            tcp_keepalive_interval: None,
            reactor: None,
        }
    }

    /// The configured known nodes, or `localhost` if there are none.
    pub fn seeds(&self) -> Vec<String> {
        if self.known_nodes.is_empty() {
            vec!["localhost".to_owned()]
        } else {
            self.known_nodes.clone()
        }
    }

    /// Settings of each connection opened by the cluster.
    pub fn connection_config(&self) -> ConnectionConfig {
        ConnectionConfig {
            port: self.port,
            connect_timeout: self.connection_timeout,
            protocol_version: self.protocol_version,
            cql_version: self.cql_version.clone(),
            compressor: self.compressor.clone(),
            authenticator: self.authenticator.clone(),
            max_timed_out_streams: self.max_timed_out_streams,
            reactor: self.reactor.clone().unwrap_or_else(|| {
                Arc::new(TokioReactor::new(
                    self.tcp_nodelay,
                    self.tcp_keepalive_interval,
                ))
            }),
        }
    }
}

impl std::fmt::Debug for ClusterConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClusterConfig")
            .field("known_nodes", &self.known_nodes)
            .field("port", &self.port)
            .field("connection_timeout", &self.connection_timeout)
            .field("connections_per_host", &self.connections_per_host)
            .field("protocol_version", &self.protocol_version)
            .field("cql_version", &self.cql_version)
            .field("compressor", &self.compressor)
            .field("authenticator", &self.authenticator.is_some())
            .field("connection_strategy", &self.connection_strategy)
            .field("selection_strategy", &self.selection_strategy)
            .field("reconnection_policy", &self.reconnection_policy)
            .field("keyspace", &self.keyspace)
            .field("request_timeout", &self.request_timeout)
            .field("max_timed_out_streams", &self.max_timed_out_streams)
            .field("tcp_nodelay", &self.tcp_nodelay)
            .field("tcp_keepalive_interval", &self.tcp_keepalive_interval)
            .field("reactor", &self.reactor)
            .finish()
    }
}
