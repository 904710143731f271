use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use progress_core::model::UserId;

use crate::Clock;
use crate::aggregator::{ProgramOverviewItem, ProgressAggregator};
use crate::error::AggregationError;

/// Reference polling interval between overview refreshes.
pub const DEFAULT_SYNC_INTERVAL: Duration = Duration::from_secs(3);

/// One full fetch of a user's aggregated progress.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressSnapshot {
    pub fetched_at: DateTime<Utc>,
    pub items: Vec<ProgramOverviewItem>,
}

/// Interval-polling contract over the aggregator.
///
/// There is no push channel: consumers re-fetch on a timer and each fetch
/// replaces the previously rendered state wholesale. Any optimistic local
/// update must therefore be written to the store before (or atomically with)
/// updating local state — state held only in memory is overwritten by the
/// next tick.
#[derive(Clone)]
pub struct ProgressSyncService {
    clock: Clock,
    aggregator: Arc<ProgressAggregator>,
    interval: Duration,
}

impl ProgressSyncService {
    #[must_use]
    pub fn new(clock: Clock, aggregator: Arc<ProgressAggregator>) -> Self {
        Self {
            clock,
            aggregator,
            interval: DEFAULT_SYNC_INTERVAL,
        }
    }

    /// Overrides the polling interval (tests use milliseconds).
    #[must_use]
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    #[must_use]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// One poll: a full re-fetch of the user's overview.
    ///
    /// A pure read — a response that arrives after the consumer moved on can
    /// be dropped without side effects.
    ///
    /// # Errors
    ///
    /// Returns `AggregationError` on repository failures.
    pub async fn poll_once(&self, principal: UserId) -> Result<ProgressSnapshot, AggregationError> {
        let items = self.aggregator.overview(principal).await?;
        Ok(ProgressSnapshot {
            fetched_at: self.clock.now(),
            items,
        })
    }

    /// Polls until the callback declines the next tick.
    ///
    /// A failed poll delivers nothing; the retry is simply the next tick.
    /// There is no cancellation token — a consumer that loses interest
    /// returns `false` and no further polls are issued.
    pub async fn run<F>(&self, principal: UserId, mut on_tick: F)
    where
        F: FnMut(ProgressSnapshot) -> bool,
    {
        loop {
            if let Ok(snapshot) = self.poll_once(principal).await {
                if !on_tick(snapshot) {
                    break;
                }
            }
            tokio::time::sleep(self.interval).await;
        }
    }
}

/// Holder for the currently rendered snapshot.
///
/// The merge policy is wholesale replacement: the freshly fetched server
/// state is authoritative and there is no field-level merge.
#[derive(Debug, Default, Clone)]
pub struct SyncState {
    current: Option<ProgressSnapshot>,
}

impl SyncState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the rendered snapshot with a fresh fetch.
    pub fn replace(&mut self, snapshot: ProgressSnapshot) {
        self.current = Some(snapshot);
    }

    #[must_use]
    pub fn current(&self) -> Option<&ProgressSnapshot> {
        self.current.as_ref()
    }
}
