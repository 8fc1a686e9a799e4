//! Connection strategies.
//!
//! A connection strategy is a predicate over [`PeerInfo`]s found by peer
//! discovery. The cluster only opens connections to peers it accepts.

use std::collections::HashSet;

use crate::cluster::discovery::PeerInfo;

/// The `ConnectionStrategy` trait.
pub trait ConnectionStrategy: std::fmt::Debug + Send + Sync {
    /// Returns whether a peer should be connected to or not.
    fn accepts(&self, peer: &PeerInfo) -> bool;
}

/// Unconditionally accepts all peers.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAllConnectionStrategy;

impl ConnectionStrategy for AcceptAllConnectionStrategy {
    fn accepts(&self, _peer: &PeerInfo) -> bool {
        true
    }
}

/// Accepts peers from the given data centers.
///
/// Without an explicit strategy, the cluster uses one of these built from
/// the data centers of the seed nodes it connected to.
#[derive(Debug, Clone)]
pub struct DataCenterAwareConnectionStrategy {
    data_centers: HashSet<String>,
}

impl DataCenterAwareConnectionStrategy {
    pub fn new<I, S>(data_centers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            data_centers: data_centers.into_iter().map(Into::into).collect(),
        }
    }

    pub fn data_centers(&self) -> &HashSet<String> {
        &self.data_centers
    }
}

impl ConnectionStrategy for DataCenterAwareConnectionStrategy {
    fn accepts(&self, peer: &PeerInfo) -> bool {
        peer.data_center
            .as_ref()
            .is_some_and(|dc| self.data_centers.contains(dc))
    }
}
