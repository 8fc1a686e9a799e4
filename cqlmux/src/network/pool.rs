//! The set of open channels of a cluster.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, Weak};

use arc_swap::ArcSwap;
use tracing::trace;
use uuid::Uuid;

use super::channel::Channel;
use crate::errors::NotConnectedError;
use crate::policies::selection::{RandomSelection, SelectionStrategy};

#[derive(Debug, Default)]
struct PoolChannels {
    snapshot: ArcSwap<Vec<Arc<Channel>>>,
    // Serializes writers; readers only load the snapshot.
    write_lock: Mutex<()>,
}

impl PoolChannels {
    fn update(&self, f: impl FnOnce(&mut Vec<Arc<Channel>>)) {
        let _guard = self.write_lock.lock().unwrap();
        let mut channels = Vec::clone(&self.snapshot.load());
        f(&mut channels);
        self.snapshot.store(Arc::new(channels));
    }

    fn remove(&self, channel: &Channel) {
        self.update(|channels| channels.retain(|c| !std::ptr::eq(Arc::as_ptr(c), channel)));
    }
}

/// Open channels, each removed automatically when it closes.
#[derive(Debug)]
pub struct ConnectionPool {
    channels: Arc<PoolChannels>,
    selection: Arc<dyn SelectionStrategy>,
}

impl Default for ConnectionPool {
    fn default() -> Self {
        Self::new(Arc::new(RandomSelection))
    }
}

impl ConnectionPool {
    pub fn new(selection: Arc<dyn SelectionStrategy>) -> Self {
        Self {
            channels: Arc::new(PoolChannels::default()),
            selection,
        }
    }

    pub fn add(&self, new_channels: impl IntoIterator<Item = Arc<Channel>>) {
        let new_channels: Vec<_> = new_channels.into_iter().collect();
        self.channels
            .update(|channels| channels.extend(new_channels.iter().cloned()));

        for channel in new_channels {
            let pool: Weak<PoolChannels> = Arc::downgrade(&self.channels);
            // Runs right away for a channel that is already closed.
            channel.on_closed(move |channel, _| {
                if let Some(pool) = pool.upgrade() {
                    trace!(
                        "Removing closed channel to {}:{} from the pool",
                        channel.host(),
                        channel.port()
                    );
                    pool.remove(channel);
                }
            });
        }
    }

    pub fn remove(&self, channel: &Channel) {
        self.channels.remove(channel);
    }

    /// A channel chosen by the selection strategy.
    pub fn select(&self) -> Result<Arc<Channel>, NotConnectedError> {
        let snapshot = self.snapshot();
        if snapshot.is_empty() {
            return Err(NotConnectedError);
        }
        Ok(self.selection.select(&snapshot).clone())
    }

    /// Calls `f` for every channel of the current snapshot. Channels added or
    /// removed meanwhile do not affect the iteration.
    pub fn for_each(&self, mut f: impl FnMut(&Arc<Channel>)) -> Result<(), NotConnectedError> {
        let snapshot = self.snapshot();
        if snapshot.is_empty() {
            return Err(NotConnectedError);
        }
        snapshot.iter().for_each(|channel| f(channel));
        Ok(())
    }

    pub fn snapshot(&self) -> Arc<Vec<Arc<Channel>>> {
        self.channels.snapshot.load_full()
    }

    pub fn len(&self) -> usize {
        self.channels.snapshot.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Host ids of the nodes the pool has channels to.
    pub fn known_host_ids(&self) -> HashSet<Uuid> {
        self.snapshot()
            .iter()
            .filter_map(|channel| channel.host_id())
            .collect()
    }

    pub fn close_all(&self) {
        for channel in self.snapshot().iter() {
            channel.close();
        }
    }
}
