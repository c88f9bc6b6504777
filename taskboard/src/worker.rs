// Cancellable background loops owned by the managers

use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// A spawned loop plus the token that ends it.
pub struct Worker {
    name: &'static str,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl Worker {
    /// Run `tick` every `period` until shut down. The first tick happens one
    /// period after spawning.
    pub fn spawn_periodic<F, Fut>(name: &'static str, period: Duration, mut tick: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    () = token.cancelled() => break,
                    () = tokio::time::sleep(period) => tick().await,
                }
            }
            debug!(worker = name, "Worker loop exited");
        });
        Self { name, cancel, handle }
    }

    /// Cancel the loop and wait for the in-flight tick to finish.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(err) = self.handle.await {
            warn!(worker = self.name, error = %err, "Worker task ended abnormally");
        }
    }
}
