use std::sync::Arc;

use cqlmux_cql::frame::response::event::{Event, StatusChangeEvent, TopologyChangeEvent};
use cqlmux_cql::frame::server_event_type::EventType;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::ClusterInner;
use crate::errors::{ConnectionSetupError, NotConnectedError, RequestError};
use crate::network::Channel;
use crate::policies::reconnection::ReconnectionSchedule;

// The channel the cluster listens to events on
struct ElectedChannel {
    channel: Arc<Channel>,
    events: mpsc::UnboundedReceiver<Event>,
}

#[derive(Debug, Error)]
enum ElectionError {
    #[error("Could not reconnect to any seed node: {0}")]
    Reconnect(#[from] ConnectionSetupError),
    #[error(transparent)]
    NotConnected(#[from] NotConnectedError),
    #[error("Failed to register for events: {0}")]
    Register(#[from] RequestError),
}

enum Wakeup {
    Event(Option<Event>),
    DiscoveryDue,
}

// Works in the background to keep the pool populated
pub(super) struct ClusterWorker {
    inner: Arc<ClusterInner>,
    elected: Option<ElectedChannel>,

    // Present while a series of attempts is failing
    election_schedule: Option<Box<dyn ReconnectionSchedule>>,
    discovery_schedule: Option<Box<dyn ReconnectionSchedule>>,

    // When the next peer discovery pass runs, if one is wanted
    discovery_due: Option<Instant>,
}

impl ClusterWorker {
    /// `discovery_failed` tells whether the discovery pass made while
    /// connecting failed; if so, the worker retries it on the reconnection
    /// schedule.
    pub(super) fn new(inner: Arc<ClusterInner>, discovery_failed: bool) -> Self {
        let mut worker = Self {
            inner,
            elected: None,
            election_schedule: None,
            discovery_schedule: None,
            discovery_due: None,
        };
        if discovery_failed {
            worker.schedule_discovery_retry();
        }
        worker
    }

    // Runs until the cluster drops the handle of this future.
    pub(super) async fn work(mut self) {
        loop {
            let Some(elected) = self.elected.as_mut() else {
                self.elect_or_wait().await;
                continue;
            };

            let discovery_due = self.discovery_due;
            let discovery_timer = async move {
                match discovery_due {
                    Some(at) => tokio::time::sleep_until(at).await,
                    None => futures::future::pending().await,
                }
            };

            let wakeup = tokio::select! {
                event = elected.events.recv() => Wakeup::Event(event),
                _ = discovery_timer => Wakeup::DiscoveryDue,
            };

            match wakeup {
                Wakeup::Event(Some(event)) => {
                    if let Some((kind, change)) = discovery_trigger(&event) {
                        debug!(change, "Received {} event", kind);
                        self.discovery_due = Some(Instant::now());
                    }
                }
                Wakeup::Event(None) => {
                    // Listeners are dropped when the channel closes.
                    if let Some(elected) = self.elected.take() {
                        debug!(
                            "Event channel to node {} closed, electing another",
                            elected.channel.describe()
                        );
                    }
                }
                Wakeup::DiscoveryDue => self.run_discovery().await,
            }
        }
    }

    async fn elect_or_wait(&mut self) {
        match self.elect().await {
            Ok(reconnected_seeds) => {
                self.election_schedule = None;
                if reconnected_seeds {
                    // Peers were lost together with the seeds.
                    self.discovery_due = Some(Instant::now());
                }
            }
            Err(error) => {
                let delay = self
                    .election_schedule
                    .get_or_insert_with(|| self.inner.reconnection_policy.new_schedule())
                    .next_delay();
                warn!(
                    "Failed to restore the cluster event channel: {}. Retrying in {:?}",
                    error, delay
                );
                tokio::time::sleep(delay).await;
            }
        }
    }

    // Picks a channel from the pool and registers it for topology and status
    // events. With an empty pool, the seeds are connected to first.
    async fn elect(&mut self) -> Result<bool, ElectionError> {
        let mut reconnected_seeds = false;
        let channel = match self.inner.pool.select() {
            Ok(channel) => channel,
            Err(NotConnectedError) => {
                debug!("No connections left, reconnecting to the seed nodes");
                let channels = self
                    .inner
                    .connector
                    .connect_all(&self.inner.seeds, self.inner.connections_per_host)
                    .await?;
                self.inner.add_channels(channels).await;
                reconnected_seeds = true;
                self.inner.pool.select()?
            }
        };

        let events = channel.on_event();
        channel
            .register_for_events(
                vec![EventType::TopologyChange, EventType::StatusChange],
                self.inner.request_timeout,
            )
            .await?;
        debug!("Listening to cluster events from node {}", channel.describe());

        self.elected = Some(ElectedChannel { channel, events });
        Ok(reconnected_seeds)
    }

    async fn run_discovery(&mut self) {
        self.discovery_due = None;
        let Some(channel) = self.elected.as_ref().map(|e| e.channel.clone()) else {
            return;
        };

        match self.inner.connect_to_new_peers(&channel).await {
            Ok(()) => self.discovery_schedule = None,
            Err(error) => {
                debug!("Peer discovery failed: {}", error);
                self.schedule_discovery_retry();
            }
        }
    }

    fn schedule_discovery_retry(&mut self) {
        let delay = self
            .discovery_schedule
            .get_or_insert_with(|| self.inner.reconnection_policy.new_schedule())
            .next_delay();
        debug!("Scheduling new peer discovery in {:?}", delay);
        self.discovery_due = Some(Instant::now() + delay);
    }
}

// Events after which nodes the pool lacks may be reachable.
fn discovery_trigger(event: &Event) -> Option<(EventType, &'static str)> {
    match event {
        Event::StatusChange(StatusChangeEvent::Up(_)) => Some((EventType::StatusChange, "UP")),
        Event::TopologyChange(TopologyChangeEvent::NewNode(_)) => {
            Some((EventType::TopologyChange, "NEW_NODE"))
        }
        _ => None,
    }
}
