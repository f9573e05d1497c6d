//! In-process fan-out of profile change notifications.

use std::sync::Arc;

use domain::models::profile::ProfileEvent;
use futures::stream::{self, Stream};
use tokio::sync::broadcast::{self, error::RecvError};

/// Events buffered per subscriber before the slowest one starts lagging.
const EVENT_BUFFER: usize = 256;

/// Broadcast hub for [`ProfileEvent`]s.
///
/// Only the profile service publishes, right after the repository call that
/// produced the new state.
#[derive(Clone)]
pub struct ProfileEvents {
    sender: broadcast::Sender<Arc<ProfileEvent>>,
}

impl ProfileEvents {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_BUFFER);
        Self { sender }
    }

    /// Publishes an event. Having no subscribers is not an error.
    pub fn publish(&self, event: ProfileEvent) {
        let _ = self.sender.send(Arc::new(event));
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Events for one user, in publish order.
    ///
    /// A lagging subscriber skips what it missed and carries on; the stream
    /// ends when the hub is dropped.
    pub fn subscribe(&self, uid: &str) -> impl Stream<Item = Arc<ProfileEvent>> + Send + 'static {
        let receiver = self.sender.subscribe();
        let uid = uid.to_string();

        stream::unfold((receiver, uid), |(mut receiver, uid)| async move {
            loop {
                match receiver.recv().await {
                    Ok(event) if event.uid() == uid => return Some((event, (receiver, uid))),
                    Ok(_) => continue,
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(user_id = %uid, skipped, "Profile event subscriber lagged");
                        continue;
                    }
                    Err(RecvError::Closed) => return None,
                }
            }
        })
    }
}

impl Default for ProfileEvents {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use domain::models::profile::{HistoryItem, HistoryKind, UserStats};
    use futures::StreamExt;

    fn history_added(uid: &str, title: &str) -> ProfileEvent {
        ProfileEvent::HistoryAdded {
            uid: uid.to_string(),
            item: HistoryItem {
                id: format!("h-{}", title),
                kind: HistoryKind::Aptitude,
                title: title.to_string(),
                score: Some(serde_json::json!(50)),
                percentage: None,
                completed_at: Utc::now(),
                details: None,
            },
            stats: UserStats::default(),
        }
    }

    #[tokio::test]
    async fn test_subscriber_only_sees_own_events() {
        let events = ProfileEvents::new();
        let mut stream = Box::pin(events.subscribe("u1"));

        events.publish(history_added("u2", "other"));
        events.publish(history_added("u1", "mine"));

        let event = stream.next().await.unwrap();
        match event.as_ref() {
            ProfileEvent::HistoryAdded { item, .. } => assert_eq!(item.title, "mine"),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_stream_ends_when_hub_dropped() {
        let events = ProfileEvents::new();
        let mut stream = Box::pin(events.subscribe("u1"));
        drop(events);
        assert!(stream.next().await.is_none());
    }

    #[test]
    fn test_publish_without_subscribers() {
        let events = ProfileEvents::new();
        events.publish(history_added("u1", "nobody listening"));
        assert_eq!(events.subscriber_count(), 0);
    }
}
