// In-process event bus
//
// Every matching handler runs on its own tokio task, so dispatch is
// concurrent and unordered across handlers.

use std::sync::{Arc, RwLock};
use tokio::runtime::Handle;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::domain::event::{DomainEvent, EventBus, EventHandler, SubscriptionId};
use crate::domain::values::EventType;

struct Subscription {
    id: SubscriptionId,
    /// None receives every topic.
    topic: Option<EventType>,
    handler: Arc<dyn EventHandler>,
}

#[derive(Default)]
pub struct InProcessEventBus {
    subscriptions: RwLock<Vec<Subscription>>,
}

impl InProcessEventBus {
    pub fn new() -> Self {
        Self::default()
    }

    fn add(&self, topic: Option<EventType>, handler: Arc<dyn EventHandler>) -> SubscriptionId {
        let id = SubscriptionId(Uuid::new_v4());
        self.subscriptions
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(Subscription { id, topic, handler });
        id
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscriptions
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }
}

impl EventBus for InProcessEventBus {
    fn publish(&self, event: DomainEvent) {
        let handlers: Vec<Arc<dyn EventHandler>> = self
            .subscriptions
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|s| s.topic.map_or(true, |t| t == event.event_type))
            .map(|s| s.handler.clone())
            .collect();
        if handlers.is_empty() {
            return;
        }

        let Ok(runtime) = Handle::try_current() else {
            warn!(event = %event.event_type, "No async runtime, dropping event");
            return;
        };
        debug!(event = %event.event_type, handlers = handlers.len(), "Publishing event");

        let event = Arc::new(event);
        for handler in handlers {
            let event = event.clone();
            runtime.spawn(async move { handler.handle(event).await });
        }
    }

    fn subscribe(&self, event_type: EventType, handler: Arc<dyn EventHandler>) -> SubscriptionId {
        self.add(Some(event_type), handler)
    }

    fn subscribe_all(&self, handler: Arc<dyn EventHandler>) -> SubscriptionId {
        self.add(None, handler)
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subs = self.subscriptions.write().unwrap_or_else(|e| e.into_inner());
        let before = subs.len();
        subs.retain(|s| s.id != id);
        subs.len() != before
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{assert_eventually_bool, TICK, WAIT};
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Collector(Mutex<Vec<EventType>>);

    #[async_trait]
    impl EventHandler for Collector {
        async fn handle(&self, event: Arc<DomainEvent>) {
            self.0.lock().unwrap().push(event.event_type);
        }
    }

    impl Collector {
        fn seen(&self) -> Vec<EventType> {
            self.0.lock().unwrap().clone()
        }
    }

    #[tokio::test]
    async fn test_topic_and_wildcard_delivery() {
        let bus = InProcessEventBus::new();
        let created = Arc::new(Collector::default());
        let everything = Arc::new(Collector::default());
        bus.subscribe(EventType::TaskCreated, created.clone());
        bus.subscribe_all(everything.clone());

        bus.publish(DomainEvent::new(EventType::TaskCreated, "b", "", None));
        bus.publish(DomainEvent::new(EventType::TaskMoved, "b", "", None));

        assert_eventually_bool("wildcard to see both", WAIT, TICK, || {
            let everything = everything.clone();
            async move { everything.seen().len() == 2 }
        })
        .await;
        assert_eq!(created.seen(), vec![EventType::TaskCreated]);
    }

    #[tokio::test]
    async fn test_unsubscribe_stops_delivery() {
        let bus = InProcessEventBus::new();
        let collector = Arc::new(Collector::default());
        let id = bus.subscribe(EventType::TaskDeleted, collector.clone());
        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));
        assert_eq!(bus.subscriber_count(), 0);

        bus.publish(DomainEvent::new(EventType::TaskDeleted, "b", "", None));
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert!(collector.seen().is_empty());
    }

    #[test]
    fn test_publish_without_runtime_does_not_panic() {
        let bus = InProcessEventBus::new();
        bus.subscribe_all(Arc::new(Collector::default()));
        bus.publish(DomainEvent::new(EventType::TaskCreated, "b", "", None));
    }
}
