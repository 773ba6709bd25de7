//! Per-policy poller: bootstrap the history, then poll for new points

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, Mutex};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::monitor::Registry;
use super::stream::StreamItem;
use crate::domain::policy::Policy;
use crate::domain::price::{parse_records, select_new_points, PriceCache, PricePoint, SpotPriceRecord};
use crate::infrastructure::{PriceClientFactory, PriceHistoryClient, PriceHistoryQuery};
use crate::shared::config::PollerConfig;
use crate::shared::errors::{PollError, PriceClientError};

/// Poller lifecycle
#[derive(Debug)]
enum PollerState {
    Bootstrapping,
    Polling,
    Terminated(Termination),
}

/// How a poller ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Termination {
    Cancelled,
    /// The stream receiver was dropped
    ConsumerGone,
    Failed(PollError),
}

/// Outcome of one polling cycle
enum Cycle {
    Continue,
    Stop(Termination),
}

pub(crate) struct Poller {
    pub(crate) policy: Policy,
    pub(crate) cache: Arc<PriceCache>,
    pub(crate) factory: Arc<Mutex<Arc<dyn PriceClientFactory>>>,
    pub(crate) registry: Registry,
    pub(crate) config: PollerConfig,
    pub(crate) cancel: CancellationToken,
    pub(crate) output: mpsc::Sender<StreamItem>,
}

impl Poller {
    /// Drive the policy to termination, then close its stream.
    pub(crate) async fn run(self) -> Termination {
        let handle = self.policy.handle();
        let filter = self.policy.filter().to_string();

        let termination = match self.connect().await {
            Ok(client) => self.run_states(client.as_ref()).await,
            Err(err) => Termination::Failed(err),
        };

        match &termination {
            Termination::Cancelled => {
                info!(policy = %handle, filter = %filter, "poller cancelled, closing stream");
                // Already gone after remove_policy, still registered after shutdown.
                self.deregister().await;
            }
            Termination::ConsumerGone => {
                info!(policy = %handle, filter = %filter, "stream consumer dropped, stopping poller");
                self.deregister().await;
            }
            Termination::Failed(err) => {
                error!(policy = %handle, filter = %filter, error = %err, "poller failed");
                self.deregister().await;
                tokio::select! {
                    _ = self.output.send(Err(err.clone())) => {}
                    _ = self.cancel.cancelled() => {}
                }
            }
        }

        // Dropping `self` drops the only sender and closes the stream.
        termination
    }

    async fn run_states(&self, client: &dyn PriceHistoryClient) -> Termination {
        let mut state = PollerState::Bootstrapping;
        loop {
            state = match state {
                PollerState::Bootstrapping => match self.bootstrap(client).await {
                    Ok(()) => PollerState::Polling,
                    Err(err) => PollerState::Terminated(Termination::Failed(err)),
                },
                PollerState::Polling => match self.next_cycle(client).await {
                    Cycle::Continue => PollerState::Polling,
                    Cycle::Stop(termination) => PollerState::Terminated(termination),
                },
                PollerState::Terminated(termination) => return termination,
            };
        }
    }

    /// Build this policy's client. Construction is serialized across pollers.
    async fn connect(&self) -> Result<Arc<dyn PriceHistoryClient>, PollError> {
        let factory = self.factory.lock().await;
        factory
            .build(&self.policy.filter().region)
            .map_err(PollError::ClientConstruction)
    }

    /// Load the full available history into the cache. Not cancellable.
    async fn bootstrap(&self, client: &dyn PriceHistoryClient) -> Result<(), PollError> {
        let update = self.cache.begin_update().await;
        info!(policy = %self.policy.handle(), "fetching historical price data");

        let query = PriceHistoryQuery::from_filter(self.policy.filter());
        let records = self.fetch(client, &query).await.map_err(PollError::Bootstrap)?;
        let points = parse_records(records)?;
        let count = points.len();
        update.replace(points).await;

        info!(policy = %self.policy.handle(), points = count, "bootstrap complete");
        Ok(())
    }

    /// Wait one interval, or stop if cancelled or the consumer is gone, then poll once
    async fn next_cycle(&self, client: &dyn PriceHistoryClient) -> Cycle {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Cycle::Stop(Termination::Cancelled),
            _ = self.output.closed() => return Cycle::Stop(Termination::ConsumerGone),
            _ = sleep(self.config.poll_interval) => {}
        }

        match self.poll_once(client).await {
            Ok(cycle) => cycle,
            Err(err) => Cycle::Stop(Termination::Failed(err)),
        }
    }

    async fn poll_once(&self, client: &dyn PriceHistoryClient) -> Result<Cycle, PollError> {
        let update = self.cache.begin_update().await;

        let start_time = update
            .high_water_mark()
            .await
            .map(|mark| start_after(mark, self.config.start_time_epsilon));
        let query = PriceHistoryQuery::from_filter(self.policy.filter()).starting_at(start_time);

        let records = self.fetch(client, &query).await.map_err(PollError::Poll)?;
        let incoming = parse_records(records)?;
        let fetched = incoming.len();

        let outcome = update.inspect(|cached| select_new_points(cached, incoming)).await;
        if outcome.stale > 0 {
            warn!(policy = %self.policy.handle(), stale = outcome.stale, "dropped points older than the cache tail");
        }
        debug!(
            policy = %self.policy.handle(),
            fetched,
            accepted = outcome.accepted.len(),
            duplicates = outcome.duplicates,
            "poll complete"
        );

        update.append(&outcome.accepted).await;
        Ok(self.deliver(outcome.accepted).await)
    }

    /// Send points in order, blocking while the stream is full
    async fn deliver(&self, points: Vec<PricePoint>) -> Cycle {
        for point in points {
            tokio::select! {
                sent = self.output.send(Ok(point)) => {
                    if sent.is_err() {
                        return Cycle::Stop(Termination::ConsumerGone);
                    }
                }
                _ = self.cancel.cancelled() => return Cycle::Stop(Termination::Cancelled),
            }
        }
        Cycle::Continue
    }

    /// Query with the configured failure policy. Retries happen before any
    /// cache mutation, so they never reorder or re-deliver points.
    async fn fetch(
        &self,
        client: &dyn PriceHistoryClient,
        query: &PriceHistoryQuery,
    ) -> Result<Vec<SpotPriceRecord>, PriceClientError> {
        let policy = &self.config.failure_policy;
        let max_attempts = policy.max_attempts();
        let mut attempt = 1;

        loop {
            match client.fetch_history(query).await {
                Ok(records) => return Ok(records),
                Err(err) if attempt < max_attempts => {
                    let backoff = policy.backoff(attempt);
                    warn!(
                        policy = %self.policy.handle(),
                        attempt,
                        max_attempts,
                        error = %err,
                        "price query failed, retrying in {:?}",
                        backoff
                    );
                    sleep(backoff).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn deregister(&self) {
        let removed = self.registry.write().await.remove(&self.policy.handle());
        if removed.is_some() {
            debug!(policy = %self.policy.handle(), "policy deregistered");
        }
    }
}

/// Start of the next poll window: the high-water mark plus `epsilon`
fn start_after(mark: DateTime<Utc>, epsilon: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(epsilon)
        .ok()
        .and_then(|epsilon| mark.checked_add_signed(epsilon))
        .unwrap_or(mark)
}
