// Action manager: wires the pipeline to the event bus and the clock

use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::pipeline::ActionPipeline;
use crate::domain::event::{DomainEvent, EventBus, EventHandler, SubscriptionId};
use crate::domain::values::EventType;
use crate::worker::Worker;

pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_secs(60);

/// Topics that reach the pipeline. Due-date reminders are scheduled
/// through time triggers instead.
pub fn subscribed_topics() -> Vec<EventType> {
    EventType::ALL
        .into_iter()
        .filter(|t| {
            !matches!(
                t,
                EventType::TaskDueApproaching | EventType::TaskOverdue | EventType::TaskCompletedOnTime
            )
        })
        .collect()
}

#[derive(Debug, Clone)]
pub struct ActionManagerConfig {
    pub enabled: bool,
    pub check_interval: Duration,
}

impl Default for ActionManagerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            check_interval: DEFAULT_CHECK_INTERVAL,
        }
    }
}

struct Running {
    ticker: Worker,
    subscriptions: Vec<SubscriptionId>,
}

pub struct ActionManager {
    pipeline: ActionPipeline,
    bus: Arc<dyn EventBus>,
    config: ActionManagerConfig,
    running: Mutex<Option<Running>>,
}

/// Runs the pipeline off the async executor; repositories block.
struct PipelineHandler {
    pipeline: ActionPipeline,
}

#[async_trait]
impl EventHandler for PipelineHandler {
    async fn handle(&self, event: Arc<DomainEvent>) {
        let pipeline = self.pipeline.clone();
        let topic = event.event_type;
        match tokio::task::spawn_blocking(move || pipeline.process_event(event)).await {
            Ok(Ok(summary)) if summary.fired > 0 => {
                debug!(event = %topic, fired = summary.fired, failed = summary.failed, "Event actions processed");
            }
            Ok(Ok(_)) => {}
            Ok(Err(err)) => warn!(event = %topic, error = %err, "Failed to evaluate actions"),
            Err(err) => warn!(event = %topic, error = %err, "Action evaluation task panicked"),
        }
    }
}

impl ActionManager {
    pub fn new(pipeline: ActionPipeline, bus: Arc<dyn EventBus>, config: ActionManagerConfig) -> Self {
        Self {
            pipeline,
            bus,
            config,
            running: Mutex::new(None),
        }
    }

    pub fn pipeline(&self) -> &ActionPipeline {
        &self.pipeline
    }

    pub async fn is_running(&self) -> bool {
        self.running.lock().await.is_some()
    }

    /// Start the time ticker and event subscriptions. A disabled manager
    /// starts nothing; starting twice is a no-op.
    pub async fn start(&self) {
        if !self.config.enabled {
            info!("Action automation disabled");
            return;
        }
        let mut running = self.running.lock().await;
        if running.is_some() {
            return;
        }

        let handler: Arc<dyn EventHandler> = Arc::new(PipelineHandler {
            pipeline: self.pipeline.clone(),
        });
        let subscriptions = subscribed_topics()
            .into_iter()
            .map(|topic| self.bus.subscribe(topic, handler.clone()))
            .collect();

        let pipeline = self.pipeline.clone();
        let ticker = Worker::spawn_periodic("actions", self.config.check_interval, move || {
            let pipeline = pipeline.clone();
            async move {
                match tokio::task::spawn_blocking(move || pipeline.run_time_based(Utc::now())).await {
                    Ok(Ok(summary)) if summary.fired > 0 => {
                        info!(fired = summary.fired, failed = summary.failed, "Time-based actions run");
                    }
                    Ok(Ok(_)) => {}
                    Ok(Err(err)) => warn!(error = %err, "Failed to check time-based actions"),
                    Err(err) => warn!(error = %err, "Time-based check panicked"),
                }
            }
        });

        info!(
            interval_secs = self.config.check_interval.as_secs(),
            "Action manager started"
        );
        *running = Some(Running { ticker, subscriptions });
    }

    /// Unsubscribe and stop the ticker. Safe to call when not running.
    pub async fn stop(&self) {
        let Some(running) = self.running.lock().await.take() else {
            return;
        };
        for id in running.subscriptions {
            self.bus.unsubscribe(id);
        }
        running.ticker.shutdown().await;
        info!("Action manager stopped");
    }
}
