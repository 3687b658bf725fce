//! Typed option snapshot and a change-notified store.

use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, mpsc};

/// Update-related options, read as one snapshot per check cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Options {
    /// Days between automatic sweeps; 0 disables the scheduler.
    pub auto_update: u32,
    /// Epoch milliseconds of the last completed sweep.
    pub last_update: u64,
    /// Automatic sweeps skip disabled scripts.
    pub update_enabled_scripts_only: bool,
    /// General default for outcome notifications.
    pub notify_updates: bool,
    /// Force notifications for every script, overriding per-script settings.
    pub notify_updates_global: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            auto_update: 1,
            last_update: 0,
            update_enabled_scripts_only: true,
            notify_updates: true,
            notify_updates_global: false,
        }
    }
}

/// Shared option state with change subscriptions.
///
/// Every mutation delivers a full snapshot to each live subscriber;
/// closed subscribers are dropped on the next change.
pub struct OptionsStore {
    state: Mutex<Options>,
    watchers: Mutex<Vec<mpsc::UnboundedSender<Options>>>,
}

impl OptionsStore {
    pub fn new(initial: Options) -> Self {
        Self {
            state: Mutex::new(initial),
            watchers: Mutex::new(Vec::new()),
        }
    }

    /// Current options as an owned snapshot.
    pub async fn snapshot(&self) -> Options {
        self.state.lock().await.clone()
    }

    /// Apply `mutate` to the options and notify subscribers.
    pub async fn update(&self, mutate: impl FnOnce(&mut Options)) {
        let snapshot = {
            let mut state = self.state.lock().await;
            mutate(&mut state);
            state.clone()
        };
        let mut watchers = self.watchers.lock().await;
        watchers.retain(|tx| tx.send(snapshot.clone()).is_ok());
    }

    /// Record the completion time of a full sweep.
    pub async fn set_last_update(&self, epoch_ms: u64) {
        self.update(|options| options.last_update = epoch_ms).await;
    }

    /// Subscribe to option changes; each change delivers a full snapshot.
    pub async fn subscribe(&self) -> mpsc::UnboundedReceiver<Options> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.watchers.lock().await.push(tx);
        rx
    }
}

impl Default for OptionsStore {
    fn default() -> Self {
        Self::new(Options::default())
    }
}
