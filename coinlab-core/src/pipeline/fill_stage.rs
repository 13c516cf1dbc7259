//! Fill stage: fetch and persist updates for stale entities, one at a time.

use crate::data::{DatasetStore, MarketDataProvider};
use crate::domain::EntityDateInfo;
use chrono::NaiveDate;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Counts from one fill pass.
///
/// `processed` counts only entities flagged for update; the rest are
/// `skipped`. An entity succeeds when at least one of its bars or snapshot
/// was fetched and persisted. Once the provider reports itself unavailable
/// the remaining stale entities are counted as failed without a request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FillStats {
    pub processed: usize,
    pub succeeded: usize,
    pub skipped: usize,
    /// Ids of processed entities that persisted nothing.
    pub failed: Vec<String>,
}

pub struct FillStage<'a> {
    provider: &'a dyn MarketDataProvider,
    store: &'a DatasetStore,
    /// Pause after each processed entity.
    delay: Duration,
}

impl<'a> FillStage<'a> {
    pub fn new(provider: &'a dyn MarketDataProvider, store: &'a DatasetStore, delay: Duration) -> Self {
        Self {
            provider,
            store,
            delay,
        }
    }

    pub fn run(&self, infos: &[EntityDateInfo]) -> FillStats {
        let mut stats = FillStats::default();
        let total = infos.iter().filter(|i| i.needs_update).count();
        let mut provider_down = false;

        for info in infos {
            if !info.needs_update {
                stats.skipped += 1;
                continue;
            }

            stats.processed += 1;
            let entity = &info.entity;

            if provider_down || !self.provider.is_available() {
                if !provider_down {
                    error!(
                        provider = self.provider.name(),
                        remaining = total - stats.processed + 1,
                        "provider unavailable, skipping remaining entities"
                    );
                    provider_down = true;
                }
                stats.failed.push(entity.id.clone());
                continue;
            }

            debug!(
                entity = %entity.id,
                index = stats.processed,
                total,
                "filling"
            );

            if self.fill_one(info) {
                stats.succeeded += 1;
            } else {
                warn!(entity = %entity.id, symbol = %entity.symbol, "nothing persisted");
                stats.failed.push(entity.id.clone());
            }

            if !self.delay.is_zero() {
                std::thread::sleep(self.delay);
            }
        }

        info!(
            processed = stats.processed,
            succeeded = stats.succeeded,
            skipped = stats.skipped,
            "fill stage done"
        );
        stats
    }

    fn fill_one(&self, info: &EntityDateInfo) -> bool {
        let entity = &info.entity;
        let since = match info.last_date.as_deref() {
            None => None,
            Some(raw) => match NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d") {
                Ok(date) => Some(date),
                Err(e) => {
                    warn!(entity = %entity.id, last_date = raw, error = %e, "refetching full history");
                    None
                }
            },
        };

        let bars = self.provider.fetch_historical_bars(&entity.symbol, since);
        let snapshot = self.provider.fetch_current_snapshot(&entity.symbol);

        let mut persisted = false;
        if !bars.is_empty() {
            let outcome = self.store.save_history(&entity.id, &bars);
            debug!(entity = %entity.id, new_rows = bars.len(), ?outcome, "history saved");
            persisted |= outcome.is_persisted();
        }
        if let Some(snapshot) = snapshot {
            let outcome = self.store.save_metrics(&entity.id, std::slice::from_ref(&snapshot));
            debug!(entity = %entity.id, ?outcome, "snapshot saved");
            persisted |= outcome.is_persisted();
        }
        persisted
    }
}
