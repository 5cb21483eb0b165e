// ============================
// crates/panel-lib/src/sweeper.rs
// ============================
//! Periodic cleanup of in-memory stores.
//!
//! Every store with expiring entries implements [`Sweep`]. [`spawn`] runs
//! one background task per store that calls [`Sweep::sweep`] on a fixed
//! interval until its [`SweeperHandle`] is shut down or dropped.
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use metrics::counter;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, warn};

use crate::metrics::SWEEP_REMOVED;

/// A store that can drop its expired or idle entries
#[async_trait]
pub trait Sweep: Send + Sync + 'static {
    /// Store name used in logs and metric labels
    fn name(&self) -> &'static str;

    /// Remove stale entries, returning how many were removed
    async fn sweep(&self) -> usize;
}

/// Handle to a running sweep task
pub struct SweeperHandle {
    name: &'static str,
    stop: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SweeperHandle {
    /// Name of the swept store
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Signal the task to stop and wait for it to finish
    pub async fn shutdown(self) {
        let _ = self.stop.send(true);
        if let Err(e) = self.task.await {
            warn!(store = self.name, "sweeper task ended abnormally: {e}");
        }
    }
}

/// Start sweeping `target` every `every`. The first sweep happens one full
/// interval after the call.
pub fn spawn<S: Sweep>(target: Arc<S>, every: Duration) -> SweeperHandle {
    let name = target.name();
    let (stop, mut stopped) = watch::channel(false);

    let task = tokio::spawn(async move {
        let mut ticker = time::interval_at(Instant::now() + every, every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let removed = target.sweep().await;
                    if removed > 0 {
                        debug!(store = name, removed, "sweep removed stale entries");
                        counter!(SWEEP_REMOVED, "store" => name).increment(removed as u64);
                    }
                }
                // A dropped handle stops the task as well
                _ = stopped.changed() => break,
            }
        }

        debug!(store = name, "sweeper stopped");
    });

    SweeperHandle { name, stop, task }
}
