//! This module holds policies, which are entities that allow configuring
//! the transport's behaviour in various aspects. The common feature of all policies
//! is that users can implement a policy on their own (because they simply need
//! to implement a certain trait), allowing flexible customizability.
//!
//! This includes:
//! - connection strategies, which decide which discovered peers to connect to,
//! - selection strategies, which pick the connection a request goes to,
//! - reconnection policies, which space out attempts to restore connectivity.

pub mod connection_strategy;
pub mod reconnection;
pub mod selection;
