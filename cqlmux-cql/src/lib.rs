//! Defines the CQL native protocol (v1 and v2 framing) used by `cqlmux`.
//!
//! This crate knows how to turn requests into frames, how to incrementally
//! decode response frames from a byte stream, and how to compress frame
//! bodies. It does no I/O on its own.

pub mod frame;

pub use crate::frame::types::{Consistency, SerialConsistency};
