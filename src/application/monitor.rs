//! Policy registry and lifecycle

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::info;

use super::poller::Poller;
use super::stream::PriceStream;
use crate::domain::policy::{Policy, PolicyFilter, PolicyHandle};
use crate::domain::price::{PriceCache, PricePoint};
use crate::infrastructure::PriceClientFactory;
use crate::shared::config::PollerConfig;
use crate::shared::errors::MonitorError;

pub(crate) struct PolicyEntry {
    policy: Policy,
    cache: Arc<PriceCache>,
    cancel: CancellationToken,
}

pub(crate) type Registry = Arc<RwLock<HashMap<PolicyHandle, PolicyEntry>>>;

/// A live subscription returned by [`Monitor::add_policy`]
pub struct Subscription {
    pub handle: PolicyHandle,
    pub stream: PriceStream,
}

/// Tracks spot price history for a set of policies, one poller task each
#[derive(Clone)]
pub struct Monitor {
    registry: Registry,
    factory: Arc<Mutex<Arc<dyn PriceClientFactory>>>,
    config: PollerConfig,
    shutdown: CancellationToken,
    tasks: TaskTracker,
}

impl Monitor {
    pub fn new(factory: Arc<dyn PriceClientFactory>, config: PollerConfig) -> Self {
        Self {
            registry: Arc::new(RwLock::new(HashMap::new())),
            factory: Arc::new(Mutex::new(factory)),
            config,
            shutdown: CancellationToken::new(),
            tasks: TaskTracker::new(),
        }
    }

    /// Register a policy and start polling it. The returned stream yields
    /// every price point observed after the initial history load.
    pub async fn add_policy(&self, filter: PolicyFilter) -> Result<Subscription, MonitorError> {
        filter.validate()?;

        let mut registry = self.registry.write().await;
        if self.shutdown.is_cancelled() {
            return Err(MonitorError::ShuttingDown);
        }

        let policy = Policy::new(filter);
        let handle = policy.handle();
        let (output, stream) = PriceStream::channel(self.config.stream_capacity);
        let cache = Arc::new(PriceCache::new());
        let cancel = self.shutdown.child_token();

        registry.insert(
            handle,
            PolicyEntry {
                policy: policy.clone(),
                cache: Arc::clone(&cache),
                cancel: cancel.clone(),
            },
        );

        info!(policy = %handle, filter = %policy.filter(), "policy added");

        let poller = Poller {
            policy,
            cache,
            factory: Arc::clone(&self.factory),
            registry: Arc::clone(&self.registry),
            config: self.config.clone(),
            cancel,
            output,
        };
        self.tasks.spawn(poller.run());

        Ok(Subscription { handle, stream })
    }

    /// Unregister a policy and signal its poller to stop. Returns without
    /// waiting; the poller closes the stream at its next cycle boundary.
    pub async fn remove_policy(&self, handle: PolicyHandle) -> Result<(), MonitorError> {
        let mut registry = self.registry.write().await;
        let entry = registry
            .remove(&handle)
            .ok_or(MonitorError::UnknownPolicy(handle))?;
        entry.cancel.cancel();

        info!(policy = %handle, filter = %entry.policy.filter(), "policy removed");
        Ok(())
    }

    pub async fn contains(&self, handle: PolicyHandle) -> bool {
        self.registry.read().await.contains_key(&handle)
    }

    /// Live policies and their filters
    pub async fn policies(&self) -> Vec<(PolicyHandle, PolicyFilter)> {
        self.registry
            .read()
            .await
            .iter()
            .map(|(handle, entry)| (*handle, entry.policy.filter().clone()))
            .collect()
    }

    /// Snapshot of a policy's cached history, oldest first
    pub async fn price_history(&self, handle: PolicyHandle) -> Result<Vec<PricePoint>, MonitorError> {
        let cache = {
            let registry = self.registry.read().await;
            let entry = registry.get(&handle).ok_or(MonitorError::UnknownPolicy(handle))?;
            Arc::clone(&entry.cache)
        };
        Ok(cache.snapshot().await)
    }

    /// Cancel every policy and wait for all pollers to exit
    pub async fn shutdown(&self) {
        {
            let _registry = self.registry.write().await;
            self.shutdown.cancel();
        }
        self.tasks.close();
        self.tasks.wait().await;
        info!("monitor shut down");
    }
}
