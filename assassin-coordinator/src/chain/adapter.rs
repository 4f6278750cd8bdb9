//! Chain event consumption in strict block order.
//!
//! One logical consumer polls the settlement contract for new events and
//! applies them to the coordinator, persisting the sync cursor after each
//! fully-processed block. A handler error stops the pass *before* the
//! cursor moves past the offending block, so the next poll naturally
//! retries it; restarts and transient failures recover the same way.

use std::sync::Arc;

use tokio::time::{Duration, sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument};

use settlement_client::SettlementReader;

use crate::error::{InfraError, Result};
use crate::game::Coordinator;
use crate::ports::store::Store;
use crate::types::primitives::BlockNumber;

/// Polling consumer that drives chain events into the coordinator.
pub struct ChainAdapter {
    store: Arc<dyn Store>,
    reader: Arc<dyn SettlementReader>,
    coordinator: Arc<Coordinator>,
    poll_interval: Duration,
}

impl std::fmt::Debug for ChainAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChainAdapter")
            .field("poll_interval", &self.poll_interval)
            .finish_non_exhaustive()
    }
}

impl ChainAdapter {
    /// Build an adapter over its collaborators.
    #[must_use]
    pub fn new(
        store: Arc<dyn Store>,
        reader: Arc<dyn SettlementReader>,
        coordinator: Arc<Coordinator>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            store,
            reader,
            coordinator,
            poll_interval,
        }
    }

    /// Poll until the shutdown token fires.
    pub async fn run(self, shutdown: CancellationToken) {
        info!(poll_interval = ?self.poll_interval, "Chain adapter started");
        loop {
            tokio::select! {
                () = shutdown.cancelled() => {
                    info!("Chain adapter stopped");
                    break;
                }
                () = sleep(self.poll_interval) => {
                    if let Err(e) = self.run_once().await {
                        error!(error = %e, "Chain sync pass failed");
                    }
                }
            }
        }
    }

    /// One sync pass: apply every new event in block order and advance
    /// the cursor. Returns the number of events applied.
    ///
    /// # Errors
    ///
    /// Returns an error if fetching fails or a handler rejects an event;
    /// in the latter case the cursor stays before the offending block.
    #[instrument(skip(self))]
    pub async fn run_once(&self) -> Result<u64> {
        let latest = self
            .reader
            .latest_block()
            .await
            .map_err(|e| InfraError::ChainEventProcessingFailed(e.to_string()))?;
        let cursor = self.store.sync_cursor().await?.get();
        if latest <= cursor {
            return Ok(0);
        }

        let events = self
            .reader
            .fetch_events(cursor + 1, latest)
            .await
            .map_err(|e| InfraError::ChainEventProcessingFailed(e.to_string()))?;

        let mut applied = 0_u64;
        let mut events = events.into_iter().peekable();
        while let Some((block, event)) = events.next() {
            if let Err(e) = self.coordinator.apply_event(event).await {
                // The cursor still points before this block; the next
                // pass retries it.
                error!(block, error = %e, "Event handler failed, halting sync pass");
                return Err(InfraError::ChainEventProcessingFailed(e.to_string()).into());
            }
            applied += 1;

            // Advance the cursor once this block's events are done.
            let block_complete = events.peek().is_none_or(|(next, _)| *next > block);
            if block_complete {
                self.store.set_sync_cursor(BlockNumber::new(block)).await?;
            }
        }

        // Skip past trailing empty blocks.
        self.store.set_sync_cursor(BlockNumber::new(latest)).await?;

        if applied > 0 {
            debug!(applied, latest, "Chain sync pass complete");
        }
        Ok(applied)
    }
}
