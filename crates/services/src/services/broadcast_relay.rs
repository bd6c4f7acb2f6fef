//! Topic fan-out for realtime clients.
//!
//! The relay keeps a registry of topic -> subscribed connections, each
//! connection represented by the sending half of its outgoing channel.
//! Delivery is at-most-once: a full or closed channel drops the message for
//! that subscriber and never blocks the publisher. Closed channels are
//! pruned on the next publish.

use std::{
    collections::{HashMap, HashSet},
    fmt,
    str::FromStr,
    sync::Arc,
};

use chrono::Utc;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::{RwLock, mpsc};
use uuid::Uuid;

pub type ConnectionId = Uuid;

pub type RelaySender = mpsc::Sender<Arc<RelayMessage>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    /// Collaborative editing of one post.
    Post(Uuid),
    /// Card activity on one board.
    Board(Uuid),
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Topic::Post(id) => write!(f, "post/{id}"),
            Topic::Board(id) => write!(f, "kanban/{id}"),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown topic '{0}'")]
pub struct TopicParseError(pub String);

impl FromStr for Topic {
    type Err = TopicParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim().trim_start_matches("/topic/");
        let (kind, id) = trimmed
            .split_once('/')
            .ok_or_else(|| TopicParseError(s.to_string()))?;
        let id = Uuid::parse_str(id).map_err(|_| TopicParseError(s.to_string()))?;
        match kind {
            "post" => Ok(Topic::Post(id)),
            "kanban" => Ok(Topic::Board(id)),
            _ => Err(TopicParseError(s.to_string())),
        }
    }
}

/// What subscribers receive: the topic and the stamped payload.
#[derive(Debug, Clone, Serialize)]
pub struct RelayMessage {
    pub topic: String,
    pub payload: serde_json::Value,
}

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("failed to serialize relay payload: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Debug, Default)]
struct RelayInner {
    topics: HashMap<Topic, HashMap<ConnectionId, RelaySender>>,
    subscriptions: HashMap<ConnectionId, HashSet<Topic>>,
}

impl RelayInner {
    fn remove(&mut self, topic: &Topic, connection_id: ConnectionId) -> bool {
        let removed = match self.topics.get_mut(topic) {
            Some(subscribers) => {
                let removed = subscribers.remove(&connection_id).is_some();
                if subscribers.is_empty() {
                    self.topics.remove(topic);
                }
                removed
            }
            None => false,
        };
        if let Some(topics) = self.subscriptions.get_mut(&connection_id) {
            topics.remove(topic);
            if topics.is_empty() {
                self.subscriptions.remove(&connection_id);
            }
        }
        removed
    }
}

#[derive(Debug, Clone, Default)]
pub struct BroadcastRelay {
    inner: Arc<RwLock<RelayInner>>,
}

impl BroadcastRelay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribing twice replaces the earlier sender.
    pub async fn subscribe(&self, topic: Topic, connection_id: ConnectionId, sender: RelaySender) {
        let mut inner = self.inner.write().await;
        inner
            .topics
            .entry(topic)
            .or_default()
            .insert(connection_id, sender);
        inner
            .subscriptions
            .entry(connection_id)
            .or_default()
            .insert(topic);

        tracing::debug!(%topic, %connection_id, "subscribed");
    }

    /// Returns false when the connection was not subscribed.
    pub async fn unsubscribe(&self, topic: &Topic, connection_id: ConnectionId) -> bool {
        let removed = self.inner.write().await.remove(topic, connection_id);
        if removed {
            tracing::debug!(%topic, %connection_id, "unsubscribed");
        }
        removed
    }

    /// Remove a connection from every topic it subscribed to.
    pub async fn disconnect(&self, connection_id: ConnectionId) {
        let mut inner = self.inner.write().await;
        let topics: Vec<Topic> = inner
            .subscriptions
            .get(&connection_id)
            .map(|topics| topics.iter().copied().collect())
            .unwrap_or_default();
        for topic in &topics {
            inner.remove(topic, connection_id);
        }
        tracing::debug!(%connection_id, topics = topics.len(), "connection left relay");
    }

    /// Stamp `payload` with the server time and hand it to every current
    /// subscriber of `topic`. Returns how many subscribers accepted it.
    pub async fn publish<T: Serialize>(&self, topic: &Topic, payload: &T) -> Result<usize, RelayError> {
        let mut value = serde_json::to_value(payload)?;
        if let serde_json::Value::Object(map) = &mut value {
            map.insert(
                "timestamp".to_string(),
                serde_json::Value::from(Utc::now().timestamp_millis()),
            );
        }
        let message = Arc::new(RelayMessage {
            topic: topic.to_string(),
            payload: value,
        });

        let mut delivered = 0;
        let mut closed = Vec::new();
        {
            let inner = self.inner.read().await;
            let Some(subscribers) = inner.topics.get(topic) else {
                return Ok(0);
            };
            for (connection_id, sender) in subscribers {
                match sender.try_send(Arc::clone(&message)) {
                    Ok(()) => delivered += 1,
                    Err(mpsc::error::TrySendError::Full(_)) => {
                        tracing::warn!(%topic, %connection_id, "subscriber lagging, message dropped");
                    }
                    Err(mpsc::error::TrySendError::Closed(_)) => closed.push(*connection_id),
                }
            }
        }

        if !closed.is_empty() {
            let mut inner = self.inner.write().await;
            for connection_id in closed {
                inner.remove(topic, connection_id);
            }
        }

        Ok(delivered)
    }

    pub async fn subscriber_count(&self, topic: &Topic) -> usize {
        self.inner
            .read()
            .await
            .topics
            .get(topic)
            .map(HashMap::len)
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn channel() -> (RelaySender, mpsc::Receiver<Arc<RelayMessage>>) {
        mpsc::channel(8)
    }

    #[test]
    fn test_topic_round_trips_through_text() {
        let id = Uuid::new_v4();
        let topic = Topic::Board(id);
        assert_eq!(topic.to_string(), format!("kanban/{id}"));
        assert_eq!(topic.to_string().parse::<Topic>().unwrap(), topic);
        assert_eq!(
            format!("/topic/post/{id}").parse::<Topic>().unwrap(),
            Topic::Post(id)
        );
        assert!("kanban/not-a-uuid".parse::<Topic>().is_err());
        assert!(format!("chat/{id}").parse::<Topic>().is_err());
    }

    #[tokio::test]
    async fn test_publish_reaches_only_topic_subscribers() {
        let relay = BroadcastRelay::new();
        let post = Topic::Post(Uuid::new_v4());
        let board = Topic::Board(Uuid::new_v4());

        let (tx_a, mut rx_a) = channel();
        let (tx_b, mut rx_b) = channel();
        relay.subscribe(post, Uuid::new_v4(), tx_a).await;
        relay.subscribe(board, Uuid::new_v4(), tx_b).await;

        let delivered = relay.publish(&post, &json!({"type": "SAVE"})).await.unwrap();
        assert_eq!(delivered, 1);

        let message = rx_a.recv().await.unwrap();
        assert_eq!(message.topic, post.to_string());
        assert_eq!(message.payload["type"], "SAVE");
        assert!(rx_b.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_publish_overrides_client_timestamp() {
        let relay = BroadcastRelay::new();
        let topic = Topic::Post(Uuid::new_v4());
        let (tx, mut rx) = channel();
        relay.subscribe(topic, Uuid::new_v4(), tx).await;

        let before = Utc::now().timestamp_millis();
        relay
            .publish(&topic, &json!({"timestamp": 1, "content": "hi"}))
            .await
            .unwrap();

        let message = rx.recv().await.unwrap();
        let stamped = message.payload["timestamp"].as_i64().unwrap();
        assert!(stamped >= before);
        assert_eq!(message.payload["content"], "hi");
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_a_noop() {
        let relay = BroadcastRelay::new();
        let delivered = relay
            .publish(&Topic::Board(Uuid::new_v4()), &json!({}))
            .await
            .unwrap();
        assert_eq!(delivered, 0);
    }

    #[tokio::test]
    async fn test_closed_subscribers_are_pruned() {
        let relay = BroadcastRelay::new();
        let topic = Topic::Board(Uuid::new_v4());

        let (tx_live, mut rx_live) = channel();
        let (tx_dead, rx_dead) = channel();
        relay.subscribe(topic, Uuid::new_v4(), tx_live).await;
        relay.subscribe(topic, Uuid::new_v4(), tx_dead).await;
        drop(rx_dead);

        assert_eq!(relay.publish(&topic, &json!({"n": 1})).await.unwrap(), 1);
        assert_eq!(relay.subscriber_count(&topic).await, 1);
        assert!(rx_live.recv().await.is_some());
    }

    #[tokio::test]
    async fn test_full_subscriber_does_not_block_others() {
        let relay = BroadcastRelay::new();
        let topic = Topic::Board(Uuid::new_v4());

        let (tx_slow, _rx_slow) = mpsc::channel(1);
        let (tx_fast, mut rx_fast) = channel();
        relay.subscribe(topic, Uuid::new_v4(), tx_slow).await;
        relay.subscribe(topic, Uuid::new_v4(), tx_fast).await;

        assert_eq!(relay.publish(&topic, &json!({"n": 1})).await.unwrap(), 2);
        assert_eq!(relay.publish(&topic, &json!({"n": 2})).await.unwrap(), 1);

        assert_eq!(rx_fast.recv().await.unwrap().payload["n"], 1);
        assert_eq!(rx_fast.recv().await.unwrap().payload["n"], 2);
        assert_eq!(relay.subscriber_count(&topic).await, 2);
    }

    #[tokio::test]
    async fn test_unsubscribe_and_disconnect() {
        let relay = BroadcastRelay::new();
        let post = Topic::Post(Uuid::new_v4());
        let board = Topic::Board(Uuid::new_v4());
        let connection = Uuid::new_v4();
        let (tx, _rx) = channel();

        relay.subscribe(post, connection, tx.clone()).await;
        relay.subscribe(board, connection, tx).await;

        assert!(relay.unsubscribe(&post, connection).await);
        assert!(!relay.unsubscribe(&post, connection).await);
        assert_eq!(relay.subscriber_count(&board).await, 1);

        relay.disconnect(connection).await;
        assert_eq!(relay.subscriber_count(&board).await, 0);
    }
}
