//! Interval polling that keeps cached collections from going stale
//!
//! A tick only invalidates; the next read refetches. Polling is suspended
//! while the application reports itself hidden.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{debug, info};

use crate::cache::{CacheKey, Invalidate};

/// Visibility switch of the embedding application
#[derive(Clone, Debug)]
pub struct Visibility {
    sender: Arc<watch::Sender<bool>>,
}

impl Default for Visibility {
    fn default() -> Self {
        Self::new()
    }
}

impl Visibility {
    /// Starts visible
    pub fn new() -> Self {
        let (sender, _) = watch::channel(true);
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn set_visible(&self, visible: bool) {
        self.sender.send_replace(visible);
    }

    pub fn is_visible(&self) -> bool {
        *self.sender.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.sender.subscribe()
    }
}

/// Set of cache keys to invalidate on a fixed interval
pub struct Poller {
    interval: Duration,
    targets: Vec<(Arc<dyn Invalidate>, CacheKey)>,
    visibility: Visibility,
}

impl Poller {
    pub fn new(interval: Duration, visibility: Visibility) -> Self {
        Self {
            interval,
            targets: Vec::new(),
            visibility,
        }
    }

    pub fn watch(mut self, cache: Arc<dyn Invalidate>, key: CacheKey) -> Self {
        self.targets.push((cache, key));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Spawn the polling task. It stops when the handle is dropped.
    pub fn start(self) -> PollHandle {
        let ticks = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&ticks);
        let mut visible = self.visibility.subscribe();
        let period = self.interval;
        let targets = self.targets;

        info!(
            "Polling {} collection(s) every {:?}",
            targets.len(),
            period
        );

        let task = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut watching = true;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if !*visible.borrow() {
                            continue;
                        }
                        for (cache, key) in &targets {
                            cache.invalidate_key(key);
                        }
                        counter.fetch_add(1, Ordering::Relaxed);
                    }
                    changed = visible.changed(), if watching => {
                        if changed.is_err() {
                            watching = false;
                            continue;
                        }
                        if *visible.borrow_and_update() {
                            debug!("Visible again, resuming polling");
                            ticker.reset();
                        } else {
                            debug!("Hidden, suspending polling");
                        }
                    }
                }
            }
        });

        PollHandle { task, ticks }
    }
}

/// Running poller
#[derive(Debug)]
pub struct PollHandle {
    task: JoinHandle<()>,
    ticks: Arc<AtomicU64>,
}

impl PollHandle {
    /// Ticks that invalidated their targets
    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }

    pub fn stop(&self) {
        self.task.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}
