//! Background task that lifts expired endpoint bans

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::pool::EndpointRegistry;

/// Periodically runs the ban-expiry sweep so expired bans clear even
/// when no traffic triggers a selection.
pub struct BanSweeper {
    registry: Arc<EndpointRegistry>,
    task: RwLock<Option<JoinHandle<()>>>,
}

impl BanSweeper {
    pub fn new(registry: Arc<EndpointRegistry>) -> Self {
        Self {
            registry,
            task: RwLock::new(None),
        }
    }

    /// Start the sweep loop. A running loop is replaced.
    pub async fn start(&self, interval_secs: u64) {
        let registry = self.registry.clone();
        let interval = Duration::from_secs(interval_secs.max(1));

        let handle = tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;

                match registry.sweep_expired_bans().await {
                    Ok(0) => debug!("Ban sweep found nothing to lift"),
                    Ok(lifted) => info!(lifted, "Lifted expired endpoint bans"),
                    Err(e) => warn!(error = %e, "Ban sweep failed"),
                }
            }
        });

        if let Some(previous) = self.task.write().await.replace(handle) {
            previous.abort();
        }
        info!(interval_secs = interval.as_secs(), "Started ban sweeper");
    }

    pub async fn stop(&self) {
        if let Some(handle) = self.task.write().await.take() {
            handle.abort();
            info!("Stopped ban sweeper");
        }
    }

    pub async fn is_running(&self) -> bool {
        self.task
            .read()
            .await
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }
}
