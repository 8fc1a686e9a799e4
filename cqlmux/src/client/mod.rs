//! Entry points for connecting to a cluster.

use std::sync::Arc;

use cqlmux_cql::frame::compression::{Compressor, Lz4Compressor, SnappyCompressor};

pub mod cluster_builder;

mod cluster_config;
pub use cluster_config::ClusterConfig;

/// The compression algorithms built into the protocol crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum Compression {
    /// LZ4 compression algorithm.
    Lz4,
    /// Snappy compression algorithm.
    Snappy,
}

impl Compression {
    pub fn as_str(&self) -> &'static str {
        match self {
            Compression::Lz4 => "lz4",
            Compression::Snappy => "snappy",
        }
    }

    pub(crate) fn compressor(self) -> Arc<dyn Compressor> {
        match self {
            Compression::Lz4 => Arc::new(Lz4Compressor),
            Compression::Snappy => Arc::new(SnappyCompressor),
        }
    }
}

impl std::fmt::Display for Compression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
