use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use coreup_core::Channel;
use coreup_installer::InstalledBinary;
use tracing::debug;

use crate::debounce::Debouncer;
use crate::state::LifecycleState;

pub const BACKUP_REFRESH_DELAY: Duration = Duration::from_millis(500);

/// Lifecycle state of one channel plus the binary it tracks.
pub struct ChannelSlot {
    channel: Channel,
    binary: InstalledBinary,
    state: Arc<Mutex<LifecycleState>>,
    backup_refresh: Debouncer,
}

impl ChannelSlot {
    fn new(channel: Channel, binary: InstalledBinary, backup_delay: Duration) -> Self {
        let state = Arc::new(Mutex::new(LifecycleState::default()));
        let watched_state = Arc::clone(&state);
        let watched_binary = binary.clone();
        let backup_refresh = Debouncer::spawn(channel.as_str(), backup_delay, move || {
            let exists = watched_binary.backup_exists();
            lock_state(&watched_state).backup_exists = exists;
            debug!(backup = %watched_binary.backup().display(), exists, "refreshed backup state");
        });

        let slot = Self {
            channel,
            binary,
            state,
            backup_refresh,
        };
        slot.refresh_backup_now();
        slot
    }

    pub fn channel(&self) -> Channel {
        self.channel
    }

    pub fn binary(&self) -> &InstalledBinary {
        &self.binary
    }

    pub fn snapshot(&self) -> LifecycleState {
        lock_state(&self.state).clone()
    }

    /// Applies `change` to the state. A change to the local version or the
    /// download-completed flag schedules a debounced backup check.
    pub fn update<R>(&self, change: impl FnOnce(&mut LifecycleState) -> R) -> R {
        let mut state = lock_state(&self.state);
        let local_before = state.local_version.clone();
        let completed_before = state.download_completed;
        let out = change(&mut state);
        let changed =
            state.local_version != local_before || state.download_completed != completed_before;
        drop(state);

        if changed {
            self.backup_refresh.trigger();
        }
        out
    }

    /// Checks the backup file immediately, bypassing the debounce window.
    pub fn refresh_backup_now(&self) -> bool {
        let exists = self.binary.backup_exists();
        lock_state(&self.state).backup_exists = exists;
        exists
    }
}

fn lock_state(state: &Mutex<LifecycleState>) -> MutexGuard<'_, LifecycleState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Host-owned mapping from channel to its lifecycle state.
pub struct ChannelRegistry {
    slots: Mutex<BTreeMap<Channel, Arc<ChannelSlot>>>,
    active: Mutex<Channel>,
    backup_delay: Duration,
}

impl ChannelRegistry {
    pub fn new(active: Channel) -> Self {
        Self {
            slots: Mutex::new(BTreeMap::new()),
            active: Mutex::new(active),
            backup_delay: BACKUP_REFRESH_DELAY,
        }
    }

    pub fn with_backup_delay(mut self, delay: Duration) -> Self {
        self.backup_delay = delay;
        self
    }

    /// Returns the channel's slot, creating it on first observation.
    pub fn observe(
        &self,
        channel: Channel,
        binary: impl FnOnce() -> InstalledBinary,
    ) -> Arc<ChannelSlot> {
        let mut slots = self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let slot = slots
            .entry(channel)
            .or_insert_with(|| Arc::new(ChannelSlot::new(channel, binary(), self.backup_delay)));
        Arc::clone(slot)
    }

    pub fn observed(&self) -> Vec<Arc<ChannelSlot>> {
        self.slots
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .values()
            .cloned()
            .collect()
    }

    pub fn active_channel(&self) -> Channel {
        *self.active.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Switches the host's active channel. A completed download on one
    /// channel says nothing about another, so every observed channel loses
    /// its download-completed flag on a switch.
    pub fn set_active_channel(&self, channel: Channel) -> bool {
        {
            let mut active = self.active.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            if *active == channel {
                return false;
            }
            *active = channel;
        }

        for slot in self.observed() {
            slot.update(|state| state.download_completed = false);
        }
        debug!(%channel, "active channel switched");
        true
    }
}
