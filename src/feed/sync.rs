//! Background feed synchronization loop.

use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam::channel::{bounded, tick, Sender};

use super::manager::{FeedManager, NOT_FOLLOWING_SUMMARY};

pub const DEFAULT_SYNC_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Periodic poller over followed feeds.
///
/// One OS thread; each tick probes daemon availability, then runs a full
/// check. All errors are logged, never propagated. `stop` signals the loop
/// and joins it: the current tick finishes, no new tick starts.
pub struct FeedSyncer {
    stop_tx: Sender<()>,
    handle: Option<JoinHandle<()>>,
}

impl FeedSyncer {
    pub fn start(manager: Arc<FeedManager>, interval: Duration) -> Self {
        let (stop_tx, stop_rx) = bounded::<()>(1);

        let handle = std::thread::spawn(move || {
            let ticker = tick(interval);
            loop {
                crossbeam::select! {
                    recv(stop_rx) -> _ => return,
                    recv(ticker) -> _ => {
                        if !manager.kubo().is_available() {
                            continue;
                        }
                        let summary = manager.check_feeds();
                        if summary != NOT_FOLLOWING_SUMMARY {
                            tracing::info!("feed sync: {summary}");
                        }
                    }
                }
            }
        });

        Self {
            stop_tx,
            handle: Some(handle),
        }
    }

    /// Signal the loop to stop and wait for it to finish.
    pub fn stop(mut self) {
        let _ = self.stop_tx.send(());
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
