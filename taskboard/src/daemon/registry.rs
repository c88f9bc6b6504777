// Live board subscriptions
//
// Each subscribed connection owns one bounded channel per board. Publishing
// never blocks: a full channel drops the notification for that subscriber.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{mpsc, RwLock};
use tracing::debug;

use super::protocol::Notification;

/// Buffered notifications per subscriber
pub const SUBSCRIBER_BUFFER: usize = 10;

/// Identity of one accepted connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

#[derive(Default)]
pub struct SubscriberRegistry {
    boards: RwLock<HashMap<String, HashMap<ConnectionId, mpsc::Sender<Notification>>>>,
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `conn` for `board_id`, replacing an earlier registration of
    /// the same pair.
    pub async fn register(&self, board_id: &str, conn: ConnectionId) -> mpsc::Receiver<Notification> {
        let (tx, rx) = mpsc::channel(SUBSCRIBER_BUFFER);
        self.boards
            .write()
            .await
            .entry(board_id.to_string())
            .or_default()
            .insert(conn, tx);
        debug!(board_id, %conn, "Subscriber registered");
        rx
    }

    /// Drop one registration. Returns whether it existed.
    pub async fn unregister(&self, board_id: &str, conn: ConnectionId) -> bool {
        let mut boards = self.boards.write().await;
        let Some(subscribers) = boards.get_mut(board_id) else {
            return false;
        };
        let removed = subscribers.remove(&conn).is_some();
        if subscribers.is_empty() {
            boards.remove(board_id);
        }
        removed
    }

    /// Drop every registration of `conn`, closing its channels.
    pub async fn cleanup(&self, conn: ConnectionId) {
        let mut boards = self.boards.write().await;
        boards.retain(|_, subscribers| {
            subscribers.remove(&conn);
            !subscribers.is_empty()
        });
    }

    /// Best-effort delivery; returns how many subscribers accepted it.
    pub async fn publish(&self, board_id: &str, notification: Notification) -> usize {
        let boards = self.boards.read().await;
        let Some(subscribers) = boards.get(board_id) else {
            return 0;
        };
        let mut delivered = 0;
        for (conn, tx) in subscribers {
            match tx.try_send(notification.clone()) {
                Ok(()) => delivered += 1,
                Err(_) => debug!(board_id, %conn, "Subscriber full or gone, notification dropped"),
            }
        }
        delivered
    }

    pub async fn subscriber_count(&self, board_id: &str) -> usize {
        self.boards.read().await.get(board_id).map_or(0, |s| s.len())
    }

    pub async fn board_count(&self) -> usize {
        self.boards.read().await.len()
    }
}
