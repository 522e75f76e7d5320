//! Outbound update queue.
//!
//! Mutations never wait on the network. Each one leaves an
//! [`OutboundUpdate`] here; a dispatcher task takes it off the queue and
//! sends it exactly once, concurrently with any other in-flight update.
//! Nothing is retried: a failed send is reported and dropped, and the next
//! mutation pushes fresher state anyway.
//!
//! Every update is counted in the document's `pending_requests` from the
//! moment it is queued until its send settles, which is what drives the
//! loading indicator.

use crate::clock::Clock;
use crate::document::TribeDocument;
use crate::remote::{OutboundUpdate, Remote};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, watch};
use totem_core::{DayKey, MemberId};

/// Capacity of the delivery report channel.
const DELIVERY_CHANNEL_CAPACITY: usize = 64;

/// What kind of write an update was.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateKind {
    Push { date: DayKey },
    Delete,
}

/// Why an update never reached the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// No tribe URL is set
    Disconnected,
    /// The tribe URL selects offline mode
    Offline,
}

/// Outcome of one outbound update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The request was sent; whether the sheet applied it cannot be observed.
    Dispatched,
    /// The request could not be sent.
    Failed(String),
    Skipped(SkipReason),
}

/// Report published once per update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub user_id: MemberId,
    pub kind: UpdateKind,
    pub outcome: Outcome,
}

impl Delivery {
    fn new(update: &OutboundUpdate, outcome: Outcome) -> Self {
        let kind = match update {
            OutboundUpdate::Push(push) => UpdateKind::Push { date: push.date },
            OutboundUpdate::Delete(_) => UpdateKind::Delete,
        };
        Self {
            user_id: update.user_id().to_string(),
            kind,
            outcome,
        }
    }
}

struct Outgoing {
    url: String,
    update: OutboundUpdate,
}

/// Handle to the queue and its dispatcher.
pub struct Outbox {
    tx: mpsc::UnboundedSender<Outgoing>,
    deliveries: broadcast::Sender<Delivery>,
    state: Arc<watch::Sender<TribeDocument>>,
}

impl Outbox {
    /// Start the dispatcher. Must be called from within a Tokio runtime.
    pub fn spawn(
        remote: Arc<dyn Remote>,
        state: Arc<watch::Sender<TribeDocument>>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let (deliveries, _) = broadcast::channel(DELIVERY_CHANNEL_CAPACITY);

        tokio::spawn(dispatch(rx, remote, Arc::clone(&state), clock, deliveries.clone()));

        Self {
            tx,
            deliveries,
            state,
        }
    }

    /// Subscribe to delivery reports.
    pub fn subscribe(&self) -> broadcast::Receiver<Delivery> {
        self.deliveries.subscribe()
    }

    /// Queue `update` for `url`, or report it skipped when there is nowhere to send it.
    pub(crate) fn enqueue(&self, url: Result<String, SkipReason>, update: OutboundUpdate) {
        let url = match url {
            Ok(url) => url,
            Err(reason) => {
                tracing::debug!("Skipping update for {}: {:?}", update.user_id(), reason);
                let _ = self
                    .deliveries
                    .send(Delivery::new(&update, Outcome::Skipped(reason)));
                return;
            }
        };

        self.state.send_modify(TribeDocument::begin_request);
        tracing::debug!("Queued update for {}", update.user_id());

        if let Err(mpsc::error::SendError(outgoing)) = self.tx.send(Outgoing { url, update }) {
            tracing::error!("Outbox dispatcher has stopped; dropping update");
            self.state.send_modify(TribeDocument::settle_request);
            let _ = self.deliveries.send(Delivery::new(
                &outgoing.update,
                Outcome::Failed("dispatcher stopped".into()),
            ));
        }
    }
}

async fn dispatch(
    mut rx: mpsc::UnboundedReceiver<Outgoing>,
    remote: Arc<dyn Remote>,
    state: Arc<watch::Sender<TribeDocument>>,
    clock: Arc<dyn Clock>,
    deliveries: broadcast::Sender<Delivery>,
) {
    while let Some(outgoing) = rx.recv().await {
        let remote = Arc::clone(&remote);
        let state = Arc::clone(&state);
        let clock = Arc::clone(&clock);
        let deliveries = deliveries.clone();

        tokio::spawn(async move {
            let Outgoing { url, update } = outgoing;

            let outcome = match remote.send(&url, &update).await {
                Ok(()) => {
                    tracing::debug!("Dispatched update for {}", update.user_id());
                    Outcome::Dispatched
                }
                Err(e) => {
                    tracing::warn!("Sync failed for {}: {}", update.user_id(), e);
                    Outcome::Failed(e.to_string())
                }
            };

            let synced_at = clock.now().timestamp_millis();
            let dispatched = outcome == Outcome::Dispatched;
            state.send_modify(|doc| {
                doc.settle_request();
                if dispatched {
                    doc.last_synced = synced_at;
                }
            });

            let _ = deliveries.send(Delivery::new(&update, outcome));
        });
    }

    tracing::debug!("Outbox dispatcher stopped");
}
