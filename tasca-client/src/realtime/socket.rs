//! Push-socket notification source
//!
//! Persistent connection feed. In-process deployments subscribe directly to
//! the backend broadcast channel; networked deployments plug the transport's
//! receiver in here. Either way the engine only sees `PushMessage` values.

use shared::message::PushMessage;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use super::{RefreshTx, TriggerSource};

pub(crate) async fn run(
    mut rx: broadcast::Receiver<PushMessage>,
    sale_id: String,
    trigger_tx: RefreshTx,
    shutdown: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            msg = rx.recv() => match msg {
                Ok(msg) => {
                    if msg.sale_id() == sale_id {
                        let _ = trigger_tx.send(TriggerSource::Socket);
                    } else {
                        // Another device's edit on a different sale
                        tracing::trace!(
                            notified = %msg.sale_id(),
                            displayed = %sale_id,
                            "push-socket notification for a different sale ignored"
                        );
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    // Notifications are content-free and redundant with the
                    // polling path; a lag only delays the next refetch
                    tracing::warn!(skipped, "push-socket lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
        }
    }
    tracing::debug!(sale_id = %sale_id, "push-socket source stopped");
}
