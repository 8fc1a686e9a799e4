//! This module holds the cluster as a whole: the pool of connections to its
//! nodes and the logic that keeps the pool populated.
//!
//! This includes:
//! - [Cluster], the handle requests are submitted through,
//! - [ClusterConnector](connector::ClusterConnector), which opens connections
//!   to many hosts at once,
//! - [discovery], which finds nodes the pool has no connections to,
//! - a background worker that listens to cluster events on one elected
//!   connection and reconnects when nodes come up or the pool empties.

pub mod connector;
pub mod discovery;
mod worker;

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use arc_swap::ArcSwapOption;
use cqlmux_cql::frame::request::SerializableRequest;
use cqlmux_cql::frame::response::{NonErrorResponse, Response};
use futures::future::{join_all, RemoteHandle};
use futures::FutureExt;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::client::ClusterConfig;
use crate::errors::{
    ConnectionSetupError, NewClusterError, NotConnectedError, RequestError, UseKeyspaceError,
};
use crate::network::handshake::Connector;
use crate::network::{Channel, ConnectionPool, VerifiedKeyspaceName};
use crate::policies::connection_strategy::{
    AcceptAllConnectionStrategy, ConnectionStrategy, DataCenterAwareConnectionStrategy,
};
use crate::policies::reconnection::ReconnectionPolicy;

use self::connector::ClusterConnector;
use self::discovery::discover_new_peers;
use self::worker::ClusterWorker;

#[derive(Debug, Error)]
enum PeerConnectError {
    #[error("Peer discovery query failed: {0}")]
    Discovery(#[from] RequestError),
    #[error("Could not connect to any discovered peer: {0}")]
    Connect(#[from] ConnectionSetupError),
}

// State shared by `Cluster` and `ClusterWorker`
#[derive(Debug)]
struct ClusterInner {
    pool: ConnectionPool,
    connector: ClusterConnector,
    seeds: Vec<String>,
    connections_per_host: usize,
    connection_strategy: Arc<dyn ConnectionStrategy>,
    reconnection_policy: Arc<dyn ReconnectionPolicy>,
    request_timeout: Option<Duration>,

    // Keyspace every connection should be using
    keyspace: ArcSwapOption<VerifiedKeyspaceName>,
}

impl ClusterInner {
    // Adds channels to the pool and switches them to the current keyspace.
    // Channels are added first, so that a concurrent `use_keyspace` either
    // sees them in the pool or has stored its keyspace before we read it.
    async fn add_channels(&self, channels: Vec<Arc<Channel>>) {
        self.pool.add(channels.iter().cloned());

        let Some(keyspace) = self.keyspace.load_full() else {
            return;
        };
        let results = join_all(
            channels
                .iter()
                .filter(|channel| !uses_keyspace(channel, &keyspace))
                .map(|channel| channel.use_keyspace(&keyspace, self.request_timeout)),
        )
        .await;
        for error in results.into_iter().filter_map(Result::err) {
            warn!(
                "Failed to use keyspace {} on a new connection: {}",
                keyspace.as_str(),
                error
            );
        }
    }

    // One discovery pass: finds peers the pool has no connection to and
    // connects to them.
    async fn connect_to_new_peers(&self, channel: &Channel) -> Result<(), PeerConnectError> {
        let candidates = discover_new_peers(
            channel,
            &self.pool.known_host_ids(),
            self.connection_strategy.as_ref(),
            self.request_timeout,
        )
        .await?;
        if candidates.is_empty() {
            return Ok(());
        }

        let channels = self
            .connector
            .connect_all(&candidates, self.connections_per_host)
            .await?;
        self.add_channels(channels).await;
        Ok(())
    }

    async fn use_keyspace(&self, keyspace: VerifiedKeyspaceName) -> Result<(), UseKeyspaceError> {
        let keyspace = Arc::new(keyspace);
        self.keyspace.store(Some(keyspace.clone()));

        let mut switches = Vec::new();
        self.pool.for_each(|channel| {
            if !uses_keyspace(channel, &keyspace) {
                let channel = channel.clone();
                let keyspace = keyspace.clone();
                let timeout = self.request_timeout;
                switches.push(async move { channel.use_keyspace(&keyspace, timeout).await });
            }
        })
        .map_err(RequestError::from)?;

        join_all(switches).await.into_iter().collect()
    }
}

fn uses_keyspace(channel: &Channel, keyspace: &VerifiedKeyspaceName) -> bool {
    channel
        .keyspace()
        .is_some_and(|current| keyspace.matches(&current))
}

/// Connections to the nodes of a cluster.
///
/// Requests go to a connection picked by the configured selection strategy.
/// In the background, the cluster listens to topology and status events and
/// connects to nodes as they appear or come back up.
pub struct Cluster {
    inner: Arc<ClusterInner>,
    closed: AtomicBool,
    worker_handle: Mutex<Option<RemoteHandle<()>>>,
}

impl std::fmt::Debug for Cluster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cluster")
            .field("connections", &self.inner.pool.len())
            .field("keyspace", &self.keyspace())
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

impl Cluster {
    /// Connects to the seed nodes of `config`, discovers and connects to
    /// their peers, switches to the configured keyspace and starts listening
    /// to cluster events.
    ///
    /// Fails if no seed node could be connected to, or if the keyspace could
    /// not be used. Failing to reach discovered peers is not an error.
    pub async fn connect(config: ClusterConfig) -> Result<Cluster, NewClusterError> {
        match Self::try_connect(config).await {
            Ok(cluster) => {
                info!("Cluster connection complete");
                Ok(cluster)
            }
            Err(error) => {
                error!("Failed connecting to cluster: {}", error);
                Err(error)
            }
        }
    }

    async fn try_connect(config: ClusterConfig) -> Result<Cluster, NewClusterError> {
        let keyspace = config
            .keyspace
            .as_deref()
            .map(VerifiedKeyspaceName::parse)
            .transpose()
            .map_err(UseKeyspaceError::from)?;

        let connector = ClusterConnector::new(Connector::with_default_steps(
            &config.connection_config(),
        ));
        let seeds = config.seeds();
        let seed_channels = connector
            .connect_all(&seeds, config.connections_per_host)
            .await?;
        if seed_channels.is_empty() {
            return Err(ConnectionSetupError::from(RequestError::from(NotConnectedError)).into());
        }

        let connection_strategy = match &config.connection_strategy {
            Some(strategy) => strategy.clone(),
            None => {
                let strategy = DataCenterAwareConnectionStrategy::new(
                    seed_channels.iter().filter_map(|channel| channel.data_center()),
                );
                if strategy.data_centers().is_empty() {
                    debug!("Seed nodes reported no data center, accepting all peers");
                    Arc::new(AcceptAllConnectionStrategy) as Arc<dyn ConnectionStrategy>
                } else {
                    debug!(
                        "Connecting only to data centers {:?} of the seed nodes",
                        strategy.data_centers()
                    );
                    Arc::new(strategy)
                }
            }
        };

        let inner = Arc::new(ClusterInner {
            pool: ConnectionPool::new(config.selection_strategy.clone()),
            connector,
            seeds,
            connections_per_host: config.connections_per_host,
            connection_strategy,
            reconnection_policy: config.reconnection_policy.clone(),
            request_timeout: config.request_timeout,
            keyspace: ArcSwapOption::empty(),
        });
        inner.pool.add(seed_channels);

        let mut discovery_failed = false;
        if let Ok(channel) = inner.pool.select() {
            if let Err(error) = inner.connect_to_new_peers(&channel).await {
                warn!("Failed connecting to discovered peers: {}", error);
                discovery_failed = true;
            }
        }

        if let Some(keyspace) = keyspace {
            if let Err(error) = inner.use_keyspace(keyspace).await {
                inner.pool.close_all();
                return Err(error.into());
            }
        }

        let worker = ClusterWorker::new(inner.clone(), discovery_failed);
        let (fut, worker_handle) = worker.work().remote_handle();
        tokio::spawn(fut);

        Ok(Cluster {
            inner,
            closed: AtomicBool::new(false),
            worker_handle: Mutex::new(Some(worker_handle)),
        })
    }

    /// Sends `request` on one of the pool's connections.
    ///
    /// The request is registered when this is called, not when the future is
    /// first polled. Fails with [`RequestError::NotConnected`] when the pool is
    /// empty.
    pub fn submit<R: SerializableRequest>(
        &self,
        request: &R,
    ) -> impl Future<Output = Result<Response, RequestError>> + Send + 'static {
        let response = self
            .inner
            .pool
            .select()
            .map(|channel| channel.submit(request, self.inner.request_timeout));
        async move { response?.await }
    }

    /// Like [`Cluster::submit`], with server errors turned into
    /// [`RequestError::Server`].
    pub async fn execute<R: SerializableRequest>(
        &self,
        request: &R,
    ) -> Result<NonErrorResponse, RequestError> {
        let channel = self.inner.pool.select()?;
        channel.execute(request, self.inner.request_timeout).await
    }

    /// Switches every connection to `keyspace`, which is case sensitive when
    /// double-quoted. Connections opened later use it too.
    ///
    /// Connections already using the keyspace are left alone.
    pub async fn use_keyspace(&self, keyspace: &str) -> Result<(), UseKeyspaceError> {
        let keyspace = VerifiedKeyspaceName::parse(keyspace)?;
        self.inner.use_keyspace(keyspace).await
    }

    /// The keyspace set by the last [`Cluster::use_keyspace`].
    pub fn keyspace(&self) -> Option<String> {
        self.inner
            .keyspace
            .load()
            .as_ref()
            .map(|keyspace| keyspace.as_str().to_owned())
    }

    pub fn pool(&self) -> &ConnectionPool {
        &self.inner.pool
    }

    /// Stops reconnecting and closes every connection. Calling it again does
    /// nothing.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        // Dropping the handle cancels the worker.
        drop(self.worker_handle.lock().unwrap().take());
        self.inner.pool.close_all();
        info!("Cluster disconnect complete");
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}
