//! Choosing the connection a request is sent on.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use rand::Rng;

use crate::network::Channel;

/// Picks one of the pool's channels for a request.
pub trait SelectionStrategy: std::fmt::Debug + Send + Sync {
    /// `channels` is never empty.
    fn select<'a>(&self, channels: &'a [Arc<Channel>]) -> &'a Arc<Channel>;
}

/// Picks a channel uniformly at random.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomSelection;

impl SelectionStrategy for RandomSelection {
    fn select<'a>(&self, channels: &'a [Arc<Channel>]) -> &'a Arc<Channel> {
        if channels.len() == 1 {
            &channels[0]
        } else {
            &channels[rand::rng().random_range(0..channels.len())]
        }
    }
}

/// Cycles through the channels.
#[derive(Debug, Default)]
pub struct RoundRobinSelection {
    next: AtomicUsize,
}

impl SelectionStrategy for RoundRobinSelection {
    fn select<'a>(&self, channels: &'a [Arc<Channel>]) -> &'a Arc<Channel> {
        let index = self.next.fetch_add(1, Ordering::Relaxed);
        &channels[index % channels.len()]
    }
}
