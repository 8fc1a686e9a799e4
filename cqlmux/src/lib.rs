//! Async transport core for databases speaking the CQL native protocol,
//! versions 1 and 2.
//!
//! # Overview
//! ### Connecting
//! All activity revolves around the [Cluster]\
//! `Cluster` is created by specifying a few known nodes and connecting to them:
//!
//! ```rust,no_run
//! use cqlmux::{Cluster, ClusterBuilder};
//! use std::error::Error;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn Error>> {
//!    let cluster: Cluster = ClusterBuilder::new()
//!         .known_node("127.0.0.1")
//!         .known_node("10.0.0.2")
//!         .connections_per_host(2)
//!         .connect()
//!         .await?;
//!
//!    Ok(())
//! }
//! ```
//! The cluster discovers the peers of the known nodes through `system.peers`
//! and connects to the ones its [connection strategy](policies::connection_strategy)
//! accepts. It keeps listening to topology and status events on one of its
//! connections and reconnects as nodes come back.
//!
//! ### Sending requests
//! Any request of the protocol crate can be submitted. The request gets a
//! stream id on one of the pool's connections as soon as it is submitted:
//!
//! ```rust
//! # use cqlmux::Cluster;
//! # use std::error::Error;
//! # async fn check_only_compiles(cluster: &Cluster) -> Result<(), Box<dyn Error>> {
//! use cqlmux::frame::request::query::{Query, QueryParameters};
//!
//! let query = Query {
//!     contents: "SELECT release_version FROM system.local".into(),
//!     parameters: QueryParameters::default(),
//! };
//! let _response = cluster.submit(&query).await?;
//! # Ok(())
//! # }
//! ```

pub mod authentication;
pub mod client;
pub mod cluster;
pub mod errors;
pub mod network;
pub mod policies;

pub(crate) mod utils;

pub use cqlmux_cql::frame;
pub use cqlmux_cql::Consistency;

pub use client::cluster_builder::ClusterBuilder;
pub use client::{ClusterConfig, Compression};
pub use cluster::Cluster;
