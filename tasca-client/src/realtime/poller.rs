//! Polling notification source
//!
//! Fixed short-interval query for sales changed since a last-seen
//! watermark. Runs concurrently with the push channels as an independent,
//! redundant path; the watermark only advances on a successful poll.

use std::sync::Arc;
use std::time::Duration;

use shared::types::now_millis;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use super::{RefreshTx, TriggerSource};
use crate::gateway::SaleGateway;

pub(crate) async fn run<G: SaleGateway>(
    gateway: Arc<G>,
    sale_id: String,
    interval: Duration,
    trigger_tx: RefreshTx,
    shutdown: CancellationToken,
) {
    // Start just before session-open so a same-millisecond backend write is
    // not skipped by the strict comparison
    let mut watermark = now_millis().saturating_sub(1);
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => {
                match gateway.changed_since(watermark).await {
                    Ok(changed) => {
                        if let Some(newest) = changed.iter().map(|s| s.updated_at).max() {
                            watermark = watermark.max(newest);
                        }
                        if changed.iter().any(|s| s.id == sale_id) {
                            let _ = trigger_tx.send(TriggerSource::Poll);
                        }
                    }
                    Err(err) => {
                        // Watermark untouched; the change is picked up by the
                        // next successful poll
                        tracing::warn!(error = %err, "poll query failed");
                    }
                }
            }
        }
    }
    tracing::debug!(sale_id = %sale_id, "polling source stopped");
}
