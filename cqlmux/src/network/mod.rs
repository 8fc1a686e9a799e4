//! This module holds entities that represent connections to the cluster
//! and the layers they are built from.
//!
//! This includes:
//! - the [Reactor](reactor::Reactor), which opens byte transports,
//! - [Channel], which multiplexes requests over one transport by stream id,
//! - the [handshake] that turns a fresh channel into a ready one,
//! - [ConnectionPool], the set of ready channels of a cluster.

pub mod channel;
pub use channel::{Channel, ChannelConfig, ChannelMetadata, QueryResponse, VerifiedKeyspaceName};

pub mod handshake;
pub use handshake::{ConnectionConfig, Connector};

mod pool;
pub use pool::ConnectionPool;

pub mod reactor;
