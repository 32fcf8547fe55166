//! Monitor task: update tick, block tick, reconnect attempts.

use std::sync::Arc;
use std::time::Instant;
use tokio::sync::broadcast;
use tokio::time::MissedTickBehavior;

use super::BitcoinService;

impl BitcoinService {
    /// Connect if needed and spawn the polling loop.
    ///
    /// A failed connect leaves the service in no-node mode; the loop still
    /// starts and retries every `reconnect_interval`. The loop exits on
    /// shutdown and disconnects.
    pub async fn start_monitoring(self: &Arc<Self>, mut shutdown: broadcast::Receiver<()>) -> tokio::task::JoinHandle<()> {
        if !self.is_connected() {
            if let Err(e) = self.connect_to_node().await {
                tracing::warn!(error = %e, "starting monitor without a node");
            }
        }

        let service = Arc::clone(self);
        let poll = self.poll.clone();
        tokio::spawn(async move {
            let mut update_tick = tokio::time::interval(poll.update_interval());
            update_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut block_tick = tokio::time::interval(poll.block_poll_interval());
            block_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

            tracing::info!(
                update_ms = poll.update_interval_ms,
                block_ms = poll.block_poll_interval_ms,
                "monitor started"
            );

            loop {
                tokio::select! {
                    _ = shutdown.recv() => break,
                    _ = update_tick.tick() => service.update_cycle().await,
                    _ = block_tick.tick() => {
                        if !service.is_connected() {
                            continue;
                        }
                        if let Err(e) = service.check_new_block().await {
                            tracing::debug!(error = %e, "block check failed, backing off");
                            tokio::select! {
                                _ = shutdown.recv() => break,
                                _ = tokio::time::sleep(poll.block_error_backoff()) => {}
                            }
                        }
                    }
                }
            }

            service.disconnect();
            tracing::info!("monitor stopped");
        })
    }

    async fn update_cycle(&self) {
        if self.is_connected() {
            if let Err(e) = self.update_data().await {
                tracing::debug!(error = %e, "node poll failed");
            }
            // Addresses refresh even when a poll method failed
            if self.is_connected() {
                self.update_all_monitored_addresses().await;
            }
        } else if self.reconnect_due(Instant::now()) {
            tracing::info!(endpoint = %self.endpoint(), "attempting reconnect");
            if self.connect_to_node().await.is_ok() {
                self.update_all_monitored_addresses().await;
            }
        }
    }
}
