use super::group::BackendGroup;
use std::{sync::Arc, time::Duration};
use tokio::{
    sync::broadcast,
    time::{interval, MissedTickBehavior},
};
use tracing::{debug, info};

/// Runs [`BackendGroup::run_round`] on a fixed interval until shutdown.
pub struct ConsensusDriver {
    group: Arc<BackendGroup>,
    poll_interval: Duration,
}

impl ConsensusDriver {
    #[must_use]
    pub fn new(group: Arc<BackendGroup>, poll_interval: Duration) -> Self {
        Self { group, poll_interval }
    }

    /// Starts the round loop in a background task.
    ///
    /// The first round runs immediately. A shutdown signal received mid-round aborts that
    /// round before it publishes.
    pub fn start_with_shutdown(
        &self,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) -> tokio::task::JoinHandle<()> {
        let group = Arc::clone(&self.group);
        let poll_interval = self.poll_interval;

        tokio::spawn(async move {
            let mut ticker = interval(poll_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        tokio::select! {
                            snapshot = group.run_round() => {
                                debug!(
                                    round = snapshot.round,
                                    members = snapshot.group.len(),
                                    latest = snapshot.latest.number,
                                    "round complete"
                                );
                            }
                            _ = shutdown_rx.recv() => {
                                info!("consensus driver shutting down mid-round");
                                break;
                            }
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        info!("consensus driver shutting down");
                        break;
                    }
                }
            }
        })
    }
}
