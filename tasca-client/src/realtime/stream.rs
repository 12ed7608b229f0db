//! Push-stream notification source
//!
//! One-directional server-initiated stream with the same message shape as
//! the socket, used as a fallback where a persistent bidirectional
//! connection is unavailable.

use shared::message::PushMessage;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::{RefreshTx, TriggerSource};

pub(crate) async fn run(
    mut rx: mpsc::Receiver<PushMessage>,
    sale_id: String,
    trigger_tx: RefreshTx,
    shutdown: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            msg = rx.recv() => match msg {
                Some(msg) => {
                    if msg.sale_id() == sale_id {
                        let _ = trigger_tx.send(TriggerSource::Stream);
                    } else {
                        tracing::trace!(
                            notified = %msg.sale_id(),
                            displayed = %sale_id,
                            "push-stream notification for a different sale ignored"
                        );
                    }
                }
                None => break,
            },
        }
    }
    tracing::debug!(sale_id = %sale_id, "push-stream source stopped");
}
