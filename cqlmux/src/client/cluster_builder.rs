//! ClusterBuilder provides an easy way to connect to a cluster

use std::sync::Arc;
use std::time::Duration;

use cqlmux_cql::frame::compression::Compressor;
use cqlmux_cql::frame::ProtocolVersion;

use super::cluster_config::ClusterConfig;
use super::Compression;
use crate::authentication::{AuthenticatorProvider, PlainTextAuthenticator};
use crate::cluster::Cluster;
use crate::errors::NewClusterError;
use crate::network::reactor::Reactor;
use crate::policies::connection_strategy::ConnectionStrategy;
use crate::policies::reconnection::ReconnectionPolicy;
use crate::policies::selection::SelectionStrategy;

/// ClusterBuilder is used to create new Cluster instances
/// # Example
///
/// ```
/// # use cqlmux::client::cluster_builder::ClusterBuilder;
/// # use cqlmux::client::Compression;
/// # use cqlmux::cluster::Cluster;
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let cluster: Cluster = ClusterBuilder::new()
///     .known_node("127.0.0.1")
///     .compression(Some(Compression::Snappy))
///     .connect()
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug, Default)]
pub struct ClusterBuilder {
    pub config: ClusterConfig,
}

impl ClusterBuilder {
    /// Creates new ClusterBuilder with default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a known node by hostname or IP address
    pub fn known_node(mut self, hostname: impl AsRef<str>) -> Self {
        self.config.known_nodes.push(hostname.as_ref().to_owned());
        self
    }

    /// Add a list of known nodes
    pub fn known_nodes(mut self, hostnames: impl IntoIterator<Item = impl AsRef<str>>) -> Self {
        self.config
            .known_nodes
            .extend(hostnames.into_iter().map(|host| host.as_ref().to_owned()));
        self
    }

    /// Port every node listens on, seeds and discovered peers alike.
    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    /// Changes connection timeout
    /// The default is 5 seconds.
    /// If it's higher than underlying os's default connection timeout it won't effect.
    pub fn connection_timeout(mut self, duration: Duration) -> Self {
        self.config.connection_timeout = duration;
        self
    }

    pub fn connections_per_host(mut self, connections: usize) -> Self {
        self.config.connections_per_host = connections;
        self
    }

    pub fn protocol_version(mut self, version: ProtocolVersion) -> Self {
        self.config.protocol_version = version;
        self
    }

    pub fn cql_version(mut self, cql_version: impl Into<String>) -> Self {
        self.config.cql_version = cql_version.into();
        self
    }

    /// Set preferred Compression algorithm.
    /// The default is no compression.
    /// If it is not supported by database server Cluster will fall back to no compression.
    pub fn compression(mut self, compression: Option<Compression>) -> Self {
        self.config.compressor = compression.map(Compression::compressor);
        self
    }

    /// Like [`compression`](Self::compression), with a custom algorithm.
    pub fn compressor(mut self, compressor: Arc<dyn Compressor>) -> Self {
        self.config.compressor = Some(compressor);
        self
    }

    /// Set username and password for plain text authentication.\
    /// If the database server will require authentication\
    pub fn user(mut self, username: impl Into<String>, passwd: impl Into<String>) -> Self {
        self.config.authenticator = Some(Arc::new(PlainTextAuthenticator::new(
            username.into(),
            passwd.into(),
        )));
        self
    }

    /// Set custom authenticator provider to create an authenticator instance during a connection setup.
    pub fn authenticator_provider(
        mut self,
        authenticator_provider: Arc<dyn AuthenticatorProvider>,
    ) -> Self {
        self.config.authenticator = Some(authenticator_provider);
        self
    }

    /// Decides which discovered peers the cluster connects to.
    pub fn connection_strategy(mut self, strategy: Arc<dyn ConnectionStrategy>) -> Self {
        self.config.connection_strategy = Some(strategy);
        self
    }

    pub fn selection_strategy(mut self, strategy: Arc<dyn SelectionStrategy>) -> Self {
        self.config.selection_strategy = strategy;
        self
    }

    pub fn reconnection_policy(mut self, policy: Arc<dyn ReconnectionPolicy>) -> Self {
        self.config.reconnection_policy = policy;
        self
    }

    /// Set keyspace to be used on all connections.\
    /// Each connection will send `"USE <keyspace_name>"` before sending any requests.\
    /// Double quotes around the name make it case sensitive.
    pub fn use_keyspace(mut self, keyspace_name: impl Into<String>) -> Self {
        self.config.keyspace = Some(keyspace_name.into());
        self
    }

    /// Deadline of every request submitted through the cluster.
    pub fn request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    /// Closes a connection once `max` of its stream ids are held by timed-out requests.
    pub fn max_timed_out_streams(mut self, max: Option<usize>) -> Self {
        self.config.max_timed_out_streams = max;
        self
    }

    /// Set the nodelay TCP flag.
    /// The default is true.
    pub fn tcp_nodelay(mut self, nodelay: bool) -> Self {
        self.config.tcp_nodelay = nodelay;
        self
    }

    /// Set the TCP keepalive interval.
    /// The default is `None`, which implies that no keepalive messages
    /// are sent **on TCP layer** when a connection is idle.
    pub fn tcp_keepalive_interval(mut self, interval: Duration) -> Self {
        if interval <= Duration::from_secs(1) {
            tracing::warn!(
                "Setting the TCP keepalive interval to low values ({:?}) is not recommended as it can have a negative impact on performance. Consider setting it above 1 second.",
                interval
            );
        }

        self.config.tcp_keepalive_interval = Some(interval);
        self
    }

    /// Opens transports with `reactor` instead of plain TCP.
    pub fn reactor(mut self, reactor: Arc<dyn Reactor>) -> Self {
        self.config.reactor = Some(reactor);
        self
    }

    /// Builds the ClusterConfig without connecting.
    pub fn build(self) -> ClusterConfig {
        self.config
    }

    /// Connects to the cluster with the configured options.
    pub async fn connect(self) -> Result<Cluster, NewClusterError> {
        Cluster::connect(self.config).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policies::reconnection::ConstantReconnectionPolicy;

    #[test]
    fn default_config() {
        let config = ClusterBuilder::new().build();
        assert_eq!(config.seeds(), vec!["localhost"]);
        assert_eq!(config.port, 9042);
        assert_eq!(config.connection_timeout, Duration::from_secs(5));
        assert_eq!(config.connections_per_host, 1);
        assert_eq!(config.protocol_version, ProtocolVersion::V2);
        assert_eq!(config.cql_version, "3.0.0");
        assert!(config.compressor.is_none());
        assert!(config.authenticator.is_none());
        assert!(config.connection_strategy.is_none());
        assert!(config.keyspace.is_none());
        assert!(config.request_timeout.is_none());
        assert!(config.max_timed_out_streams.is_none());
        assert!(config.tcp_nodelay);
        assert!(config.tcp_keepalive_interval.is_none());
    }

    #[test]
    fn builder_sets_options() {
        let config = ClusterBuilder::new()
            .known_node("10.0.0.1")
            .known_nodes(["10.0.0.2", "10.0.0.3"])
            .port(19042)
            .connections_per_host(3)
            .protocol_version(ProtocolVersion::V1)
            .compression(Some(Compression::Lz4))
            .user("cassandra", "cassandra")
            .reconnection_policy(Arc::new(ConstantReconnectionPolicy::new(
                Duration::from_millis(10),
            )))
            .use_keyspace("\"MyKs\"")
            .request_timeout(Some(Duration::from_secs(2)))
            .build();

        assert_eq!(config.seeds(), vec!["10.0.0.1", "10.0.0.2", "10.0.0.3"]);
        assert_eq!(config.port, 19042);
        assert_eq!(config.connections_per_host, 3);
        assert_eq!(
            config.compressor.as_ref().map(|c| c.algorithm()),
            Some("lz4")
        );
        assert!(config.authenticator.is_some());
        assert_eq!(config.keyspace.as_deref(), Some("\"MyKs\""));

        let connection_config = config.connection_config();
        assert_eq!(connection_config.port, 19042);
        assert_eq!(connection_config.protocol_version, ProtocolVersion::V1);
        assert_eq!(connection_config.connect_timeout, Duration::from_secs(5));
    }
}
