// Domain events and the event bus contract
//
// Events are created by mutation use cases and consumed once; they are never
// persisted. Dispatch is concurrent and unordered across handlers, and every
// handler observes the same immutable snapshot through an `Arc`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use super::task_id::TaskId;
use super::values::EventType;

#[derive(Debug, Clone, Serialize)]
pub struct DomainEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub timestamp: DateTime<Utc>,
    pub board_id: String,
    /// Column name, empty when the event is not tied to a column.
    pub column_id: String,
    pub task_id: Option<TaskId>,
    pub metadata: HashMap<String, serde_json::Value>,
}

impl DomainEvent {
    pub fn new(
        event_type: EventType,
        board_id: impl Into<String>,
        column_id: impl Into<String>,
        task_id: Option<TaskId>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            event_type,
            timestamp: Utc::now(),
            board_id: board_id.into(),
            column_id: column_id.into(),
            task_id,
            metadata: HashMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }
}

/// Receives events for the topics it was subscribed to.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, event: Arc<DomainEvent>);
}

/// Handle returned by `subscribe`, used to unsubscribe later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub Uuid);

pub trait EventBus: Send + Sync {
    /// Fire-and-forget: returns before handlers run.
    fn publish(&self, event: DomainEvent);
    fn subscribe(&self, event_type: EventType, handler: Arc<dyn EventHandler>) -> SubscriptionId;
    /// Receive every topic.
    fn subscribe_all(&self, handler: Arc<dyn EventHandler>) -> SubscriptionId;
    fn unsubscribe(&self, id: SubscriptionId) -> bool;
}
