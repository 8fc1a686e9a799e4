//! Opening connections to many hosts at once.

use std::sync::Arc;

use futures::future::join_all;
use itertools::Itertools;
use tracing::{debug, info, warn};

use crate::errors::{AuthenticationError, ConnectionSetupError};
use crate::network::handshake::Connector;
use crate::network::Channel;

/// A connection attempt that did not produce a channel.
#[derive(Debug, Clone)]
pub struct FailedConnection {
    pub error: ConnectionSetupError,
    pub host: String,
}

/// Runs the handshake pipeline against several hosts concurrently.
#[derive(Debug)]
pub struct ClusterConnector {
    connector: Connector,
}

impl ClusterConnector {
    pub fn new(connector: Connector) -> Self {
        Self { connector }
    }

    /// Opens `connections_per_host` connections to every host in `hosts`.
    ///
    /// Returns every connection that could be set up. When none could, and
    /// there was at least one host, the first failure is returned; a rejected
    /// password is reported as [`AuthenticationError::BadCredentials`].
    pub async fn connect_all(
        &self,
        hosts: &[String],
        connections_per_host: usize,
    ) -> Result<Vec<Arc<Channel>>, ConnectionSetupError> {
        let attempts = hosts.iter().flat_map(|host| {
            itertools::repeat_n(host, connections_per_host).map(|host| self.connect_one(host))
        });
        let (channels, failures): (Vec<_>, Vec<FailedConnection>) =
            join_all(attempts).await.into_iter().partition_result();

        match failures.into_iter().next() {
            Some(failure) if channels.is_empty() => Err(bad_credentials_or(failure.error)),
            _ => Ok(channels),
        }
    }

    async fn connect_one(&self, host: &str) -> Result<Arc<Channel>, FailedConnection> {
        match self.connector.connect(host).await {
            Ok(channel) => {
                info!("Connected to node {}", channel.describe());
                channel.on_closed(|channel, result| match result {
                    Ok(()) => info!("Connection to node {} closed", channel.describe()),
                    Err(cause) => warn!(
                        "Connection to node {} closed unexpectedly: {}",
                        channel.describe(),
                        cause
                    ),
                });
                Ok(channel)
            }
            Err(error) => {
                warn!(
                    "Failed connecting to node at {}:{}: {}",
                    host,
                    self.connector.port(),
                    error
                );
                Err(FailedConnection {
                    error,
                    host: host.to_owned(),
                })
            }
        }
    }
}

fn bad_credentials_or(error: ConnectionSetupError) -> ConnectionSetupError {
    match error.as_server_error() {
        Some(server_error) if server_error.is_bad_credentials() => {
            debug!("Authentication failed with a server error, reporting bad credentials");
            AuthenticationError::BadCredentials(server_error.message.clone()).into()
        }
        _ => error,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::TransportError;
    use crate::network::handshake::ConnectionConfig;
    use crate::utils::test_utils::{setup_tracing, MockNode, MockReactor};
    use assert_matches::assert_matches;

    fn cluster_connector(reactor: Arc<MockReactor>) -> ClusterConnector {
        let config = ConnectionConfig {
            reactor,
            ..Default::default()
        };
        ClusterConnector::new(Connector::with_default_steps(&config))
    }

    fn hosts(hosts: &[&str]) -> Vec<String> {
        hosts.iter().map(|&host| host.to_owned()).collect()
    }

    #[tokio::test]
    async fn unreachable_hosts_are_left_out() {
        setup_tracing();
        let reactor = MockReactor::new([
            MockNode::new("10.0.0.1", "dc1"),
            MockNode::new("10.0.0.2", "dc1"),
        ]);
        reactor.set_down("10.0.0.2");
        let connector = cluster_connector(reactor.clone());

        let channels = connector
            .connect_all(&hosts(&["10.0.0.1", "10.0.0.2"]), 2)
            .await
            .unwrap();
        assert_eq!(channels.len(), 2);
        assert!(channels.iter().all(|channel| channel.host() == "10.0.0.1"));
        assert_eq!(reactor.connection_attempts("10.0.0.2"), 2);
        assert_eq!(reactor.open_connections("10.0.0.1"), 2);
    }

    #[tokio::test]
    async fn no_hosts_is_not_an_error() {
        let connector = cluster_connector(MockReactor::new([]));
        assert!(connector.connect_all(&[], 1).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn all_failed_returns_first_error() {
        setup_tracing();
        let reactor = MockReactor::new([]);
        let connector = cluster_connector(reactor);
        let result = connector.connect_all(&hosts(&["10.0.0.1"]), 1).await;
        assert_matches!(
            result,
            Err(ConnectionSetupError::Transport(TransportError::Io(_)))
        );
    }

    #[tokio::test]
    async fn rejected_password_is_bad_credentials() {
        setup_tracing();
        let reactor = MockReactor::new([
            MockNode::new("10.0.0.1", "dc1").with_password_authentication("cassandra", "secret")
        ]);
        let config = ConnectionConfig {
            reactor,
            authenticator: Some(Arc::new(crate::authentication::PlainTextAuthenticator::new(
                "cassandra".to_owned(),
                "wrong".to_owned(),
            ))),
            ..Default::default()
        };
        let connector = ClusterConnector::new(Connector::with_default_steps(&config));

        let result = connector.connect_all(&hosts(&["10.0.0.1"]), 1).await;
        assert_matches!(
            result,
            Err(ConnectionSetupError::Authentication(
                AuthenticationError::BadCredentials(_)
            ))
        );
    }
}
