//! Finding nodes of the cluster that the pool has no connections to yet.

use std::collections::HashSet;
use std::net::IpAddr;
use std::time::Duration;

use cqlmux_cql::frame::request::RequestOpcode;
use cqlmux_cql::frame::response::result::{self, Row, Rows};
use cqlmux_cql::Consistency;
use tracing::debug;
use uuid::Uuid;

use crate::errors::RequestError;
use crate::network::Channel;
use crate::policies::connection_strategy::ConnectionStrategy;

pub(crate) const PEERS_QUERY: &str =
    "SELECT peer, data_center, host_id, rpc_address FROM system.peers";

/// A row of `system.peers`, as seen by the node a discovery query went to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerInfo {
    /// Address the node uses to talk to other nodes.
    pub peer: IpAddr,
    pub data_center: Option<String>,
    pub host_id: Option<Uuid>,
    /// Address the node accepts client connections on. May be the
    /// unspecified address, meaning the same as `peer`.
    pub rpc_address: IpAddr,
}

impl PeerInfo {
    fn from_row(rows: &Rows, row: &Row) -> Option<Self> {
        let peer = rows.value(row, "peer")?.as_inet()?;
        Some(Self {
            peer,
            data_center: rows
                .value(row, "data_center")
                .and_then(|value| value.as_text())
                .cloned(),
            host_id: rows.value(row, "host_id").and_then(|value| value.as_uuid()),
            rpc_address: rows
                .value(row, "rpc_address")
                .and_then(|value| value.as_inet())
                .unwrap_or(peer),
        })
    }

    /// Where a client should connect to reach this node.
    pub fn connect_address(&self) -> IpAddr {
        if self.rpc_address.is_unspecified() {
            self.peer
        } else {
            self.rpc_address
        }
    }
}

/// Asks `channel`'s node about its peers and returns the addresses of those
/// that are not in `known_host_ids` and that `strategy` accepts.
pub(crate) async fn discover_new_peers(
    channel: &Channel,
    known_host_ids: &HashSet<Uuid>,
    strategy: &dyn ConnectionStrategy,
    timeout: Option<Duration>,
) -> Result<Vec<String>, RequestError> {
    debug!("Looking for additional nodes");
    let rows = match channel
        .query(PEERS_QUERY, Consistency::One, timeout)
        .await?
    {
        result::Result::Rows(rows) => rows,
        _ => {
            return Err(RequestError::UnexpectedResponse {
                request: RequestOpcode::Query.name(),
                response: "RESULT",
            })
        }
    };

    let candidates: Vec<String> = rows
        .rows
        .iter()
        .filter_map(|row| PeerInfo::from_row(&rows, row))
        .filter(|peer| {
            !peer
                .host_id
                .is_some_and(|host_id| known_host_ids.contains(&host_id))
        })
        .filter(|peer| strategy.accepts(peer))
        .map(|peer| peer.connect_address().to_string())
        .collect();

    debug!("{} additional nodes found", candidates.len());
    Ok(candidates)
}
