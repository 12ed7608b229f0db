//! Realtime fan-in
//!
//! Merges three independent notification producers (push-socket,
//! push-stream, polling loop) into a single "refetch canonical sale"
//! trigger. All producers are filtered identically: a notification is acted
//! on only if it names the displayed sale. Delivery order across channels
//! is not guaranteed, so the consumer never applies payload deltas; it
//! always refetches the canonical sale by id. Bursts collapse to one fetch
//! through a short coalescing window.
//!
//! ```text
//! push-socket ──┐
//! push-stream ──┼── filter(id == displayed) ──► refresh queue ──► fetch ──► store
//! polling     ──┘                               (coalesced)
//! ```

mod poller;
mod socket;
mod stream;

use std::sync::Arc;
use std::time::Duration;

use shared::message::PushMessage;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::ClientConfig;
use crate::events::{EngineEvent, EventHub, Topic};
use crate::gateway::SaleGateway;
use crate::store::SaleStore;

/// Which channel produced a refresh trigger (for tracing only)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerSource {
    Socket,
    Stream,
    Poll,
}

pub(crate) type RefreshTx = mpsc::UnboundedSender<TriggerSource>;

/// Builder wiring notification sources to one watcher
pub struct SaleWatcherBuilder<G> {
    gateway: Arc<G>,
    store: Arc<SaleStore>,
    sale_id: String,
    coalesce_window: Duration,
    poll_interval: Duration,
    socket_rx: Option<broadcast::Receiver<PushMessage>>,
    stream_rx: Option<mpsc::Receiver<PushMessage>>,
    polling: bool,
    hub: Option<Arc<EventHub>>,
}

impl<G: SaleGateway + 'static> SaleWatcherBuilder<G> {
    pub fn new(
        gateway: Arc<G>,
        store: Arc<SaleStore>,
        sale_id: impl Into<String>,
        config: &ClientConfig,
    ) -> Self {
        Self {
            gateway,
            store,
            sale_id: sale_id.into(),
            coalesce_window: config.coalesce_window,
            poll_interval: config.poll_interval,
            socket_rx: None,
            stream_rx: None,
            polling: false,
            hub: None,
        }
    }

    /// Attach the persistent push-socket feed
    pub fn with_socket(mut self, rx: broadcast::Receiver<PushMessage>) -> Self {
        self.socket_rx = Some(rx);
        self
    }

    /// Attach the one-directional push-stream fallback feed
    pub fn with_stream(mut self, rx: mpsc::Receiver<PushMessage>) -> Self {
        self.stream_rx = Some(rx);
        self
    }

    /// Enable the fixed-interval polling loop
    pub fn with_polling(mut self) -> Self {
        self.polling = true;
        self
    }

    /// Publish a `SaleChanged` event after every canonical replace
    pub fn with_event_hub(mut self, hub: Arc<EventHub>) -> Self {
        self.hub = Some(hub);
        self
    }

    /// Spawn the source tasks and the coalescing refresh worker
    pub fn spawn(self) -> SaleWatcher {
        let shutdown = CancellationToken::new();
        let (trigger_tx, trigger_rx) = mpsc::unbounded_channel();
        let mut tasks = Vec::new();

        if let Some(rx) = self.socket_rx {
            tasks.push(tokio::spawn(socket::run(
                rx,
                self.sale_id.clone(),
                trigger_tx.clone(),
                shutdown.child_token(),
            )));
        }
        if let Some(rx) = self.stream_rx {
            tasks.push(tokio::spawn(stream::run(
                rx,
                self.sale_id.clone(),
                trigger_tx.clone(),
                shutdown.child_token(),
            )));
        }
        if self.polling {
            tasks.push(tokio::spawn(poller::run(
                Arc::clone(&self.gateway),
                self.sale_id.clone(),
                self.poll_interval,
                trigger_tx.clone(),
                shutdown.child_token(),
            )));
        }
        drop(trigger_tx);

        tasks.push(tokio::spawn(refresh_worker(
            self.gateway,
            self.store,
            self.sale_id.clone(),
            self.coalesce_window,
            trigger_rx,
            shutdown.child_token(),
            self.hub,
        )));

        SaleWatcher {
            sale_id: self.sale_id,
            shutdown,
            tasks,
        }
    }
}

/// Handle owning the realtime tasks for one displayed sale
///
/// Channels live for the lifetime of a screen; dropping the watcher (or
/// calling [`SaleWatcher::shutdown`]) tears them down on navigation away.
pub struct SaleWatcher {
    sale_id: String,
    shutdown: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl SaleWatcher {
    pub fn sale_id(&self) -> &str {
        &self.sale_id
    }

    /// Stop all source tasks and the refresh worker
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    /// Shut down and wait for the tasks to finish
    pub async fn join(mut self) {
        self.shutdown.cancel();
        for task in self.tasks.drain(..) {
            let _ = task.await;
        }
    }
}

impl Drop for SaleWatcher {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// Consume refresh triggers, coalesce bursts, refetch the canonical sale
async fn refresh_worker<G: SaleGateway>(
    gateway: Arc<G>,
    store: Arc<SaleStore>,
    sale_id: String,
    window: Duration,
    mut trigger_rx: mpsc::UnboundedReceiver<TriggerSource>,
    shutdown: CancellationToken,
    hub: Option<Arc<EventHub>>,
) {
    loop {
        let source = tokio::select! {
            _ = shutdown.cancelled() => break,
            trigger = trigger_rx.recv() => match trigger {
                Some(source) => source,
                None => break,
            },
        };

        // Collapse the burst: whatever else arrives inside the window is
        // covered by the same fetch
        if !window.is_zero() {
            tokio::time::sleep(window).await;
        }
        let mut collapsed = 0usize;
        while trigger_rx.try_recv().is_ok() {
            collapsed += 1;
        }

        tracing::debug!(
            sale_id = %sale_id,
            source = ?source,
            collapsed,
            "refetching canonical sale"
        );
        match gateway.fetch_sale(&sale_id).await {
            Ok(sale) => {
                store.replace(sale);
                if let Some(hub) = &hub {
                    hub.publish(
                        Topic::Sales,
                        EngineEvent::SaleChanged {
                            sale_id: sale_id.clone(),
                        },
                    );
                }
            }
            Err(err) => {
                // Recoverable: the next trigger or poll tick retries
                tracing::warn!(sale_id = %sale_id, error = %err, "canonical refetch failed");
            }
        }
    }
    tracing::debug!(sale_id = %sale_id, "refresh worker stopped");
}
