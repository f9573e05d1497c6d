//! Live transcript delivery.
//!
//! Each room has a `watch` channel whose value is bumped whenever the room's
//! transcript or roster changes. Subscriptions wait on it and re-read the
//! store, so a notification carries no data and lost or duplicated bumps are
//! harmless. Other instances learn about changes through `pg_notify` on
//! [`MESSAGE_NOTIFY_CHANNEL`].

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use domain::models::message::GroupMessage;
use futures::stream::{self, Stream};
use persistence::repositories::{DiscussionGroupRepository, MessageRepository, MESSAGE_NOTIFY_CHANNEL};
use sqlx::postgres::PgListener;
use sqlx::PgPool;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Snapshots queued per subscriber.
const SUBSCRIPTION_BUFFER: usize = 8;

/// Pause before reconnecting the notification listener.
const LISTENER_RETRY_DELAY: Duration = Duration::from_secs(2);

type Signals = Arc<Mutex<HashMap<Uuid, watch::Sender<u64>>>>;

/// Per-room change signals and subscription factory.
#[derive(Clone)]
pub struct ChatHub {
    pool: PgPool,
    signals: Signals,
}

impl ChatHub {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            signals: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Wakes local subscribers of the room.
    pub fn notify(&self, group_id: Uuid) {
        let mut signals = self.signals.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(sender) = signals.get(&group_id) {
            if sender.receiver_count() == 0 {
                signals.remove(&group_id);
            } else {
                sender.send_modify(|version| *version = version.wrapping_add(1));
            }
        }
    }

    /// Wakes subscribers of the room on this and every other instance.
    pub async fn publish(&self, group_id: Uuid) {
        self.notify(group_id);
        if let Err(e) = MessageRepository::new(self.pool.clone())
            .notify_appended(group_id)
            .await
        {
            warn!(group_id = %group_id, error = %e, "Failed to publish room change");
        }
    }

    /// Number of rooms with a live signal.
    pub fn active_rooms(&self) -> usize {
        self.signals
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn signal(&self, group_id: Uuid) -> watch::Receiver<u64> {
        let mut signals = self.signals.lock().unwrap_or_else(PoisonError::into_inner);
        signals
            .entry(group_id)
            .or_insert_with(|| watch::channel(0).0)
            .subscribe()
    }

    fn release(signals: &Signals, group_id: Uuid) {
        let mut signals = signals.lock().unwrap_or_else(PoisonError::into_inner);
        if signals
            .get(&group_id)
            .is_some_and(|sender| sender.receiver_count() == 0)
        {
            signals.remove(&group_id);
        }
    }

    /// Streams the full ordered transcript to a member: once right away and
    /// again after each change.
    ///
    /// Membership is re-read before every snapshot. The stream ends when the
    /// user leaves, the room is deleted or the subscription is dropped.
    pub fn subscribe(&self, group_id: Uuid, uid: &str) -> MessageSubscription {
        let (sender, receiver) = mpsc::channel(SUBSCRIPTION_BUFFER);
        let cancel = CancellationToken::new();

        let token = cancel.clone();
        let mut signal = self.signal(group_id);
        let signals = Arc::clone(&self.signals);
        let groups = DiscussionGroupRepository::new(self.pool.clone());
        let messages = MessageRepository::new(self.pool.clone());
        let uid = uid.to_string();

        tokio::spawn(async move {
            let mut last_marker = None;

            loop {
                if token.is_cancelled() {
                    break;
                }

                match groups.is_member(group_id, &uid).await {
                    Ok(true) => {}
                    Ok(false) => {
                        debug!(group_id = %group_id, user_id = %uid, "Subscriber no longer a member");
                        break;
                    }
                    Err(e) => {
                        warn!(group_id = %group_id, user_id = %uid, error = %e, "Membership check failed");
                        break;
                    }
                }

                let batch = match messages.list_for_group(group_id, None).await {
                    Ok(batch) => batch,
                    Err(e) => {
                        warn!(group_id = %group_id, error = %e, "Transcript read failed");
                        break;
                    }
                };

                // Roster changes also wake us; only a grown transcript is sent.
                let marker = (batch.len(), batch.last().map(|m| m.id));
                if last_marker != Some(marker) {
                    last_marker = Some(marker);
                    let snapshot: Vec<GroupMessage> = batch.into_iter().map(Into::into).collect();

                    tokio::select! {
                        biased;
                        _ = token.cancelled() => break,
                        sent = sender.send(snapshot) => {
                            if sent.is_err() {
                                break;
                            }
                        }
                    }
                }

                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    changed = signal.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                }
            }

            drop(signal);
            ChatHub::release(&signals, group_id);
            debug!(group_id = %group_id, user_id = %uid, "Transcript subscription ended");
        });

        MessageSubscription { receiver, cancel }
    }

    /// Forwards change notifications from other instances to local
    /// subscribers. Reconnects after errors.
    pub fn spawn_listener(&self) -> JoinHandle<()> {
        let hub = self.clone();

        tokio::spawn(async move {
            loop {
                match hub.listen().await {
                    Ok(()) => return,
                    Err(e) => {
                        warn!(error = %e, "Room notification listener failed, reconnecting");
                        tokio::time::sleep(LISTENER_RETRY_DELAY).await;
                    }
                }
            }
        })
    }

    async fn listen(&self) -> Result<(), sqlx::Error> {
        let mut listener = PgListener::connect_with(&self.pool).await?;
        listener.listen(MESSAGE_NOTIFY_CHANNEL).await?;
        info!(channel = MESSAGE_NOTIFY_CHANNEL, "Listening for room notifications");

        loop {
            let notification = listener.recv().await?;
            match notification.payload().parse::<Uuid>() {
                Ok(group_id) => self.notify(group_id),
                Err(_) => {
                    warn!(payload = notification.payload(), "Ignoring malformed room notification")
                }
            }
        }
    }
}

/// A live transcript feed. Dropping it stops the background task.
pub struct MessageSubscription {
    receiver: mpsc::Receiver<Vec<GroupMessage>>,
    cancel: CancellationToken,
}

impl MessageSubscription {
    /// Next transcript snapshot, or `None` once the feed has ended.
    pub async fn next(&mut self) -> Option<Vec<GroupMessage>> {
        self.receiver.recv().await
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn into_stream(self) -> impl Stream<Item = Vec<GroupMessage>> + Send + 'static {
        stream::unfold(self, |mut subscription| async move {
            let snapshot = subscription.next().await?;
            Some((snapshot, subscription))
        })
    }
}

impl Drop for MessageSubscription {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
