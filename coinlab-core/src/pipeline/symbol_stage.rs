//! Symbol stage: decide which entities the run tracks.

use super::PipelineError;
use crate::data::{DatasetStore, SymbolCatalog};
use crate::domain::{CatalogEntry, Entity};
use std::collections::HashSet;
use tracing::{error, info, warn};

/// Thresholds an entity must meet to be tracked.
#[derive(Debug, Clone)]
pub struct ValidityFilter {
    pub min_market_cap: f64,
    pub min_volume: f64,
    /// Lowercase symbol substrings that exclude an entity.
    pub denylist: Vec<String>,
    /// Stop once this many entities have been accepted.
    pub target: usize,
}

impl ValidityFilter {
    /// Keep entries with an id and symbol, market cap and volume at or above
    /// the thresholds, and no denylisted substring in the symbol. The first
    /// occurrence of each uppercase symbol wins.
    pub fn apply(&self, entries: &[CatalogEntry]) -> Vec<Entity> {
        let mut seen = HashSet::new();
        let mut kept = Vec::new();

        for entry in entries {
            if kept.len() >= self.target {
                break;
            }
            let Some(entity) = self.validate(entry) else {
                continue;
            };
            if seen.insert(entity.symbol.clone()) {
                kept.push(entity);
            }
        }
        kept
    }

    fn validate(&self, entry: &CatalogEntry) -> Option<Entity> {
        let id = entry.id.as_deref().filter(|s| !s.is_empty())?;
        let symbol = entry.symbol.as_deref().filter(|s| !s.is_empty())?;
        if !entry.market_cap.is_some_and(|m| m >= self.min_market_cap) {
            return None;
        }
        if !entry.total_volume.is_some_and(|v| v >= self.min_volume) {
            return None;
        }
        let lower = symbol.to_lowercase();
        if self
            .denylist
            .iter()
            .any(|d| lower.contains(d.to_lowercase().as_str()))
        {
            return None;
        }

        Some(Entity {
            id: id.to_string(),
            symbol: symbol.to_uppercase(),
            name: entry
                .name
                .clone()
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| id.to_string()),
            market_cap_rank: entry.market_cap_rank,
            current_price: entry.current_price,
            market_cap: entry.market_cap,
            total_volume: entry.total_volume,
            price_change_pct_24h: entry.price_change_percentage_24h,
            last_updated: entry.last_updated.clone(),
        })
    }
}

pub struct SymbolStage<'a> {
    catalog: &'a dyn SymbolCatalog,
    store: &'a DatasetStore,
    filter: ValidityFilter,
}

impl<'a> SymbolStage<'a> {
    pub fn new(catalog: &'a dyn SymbolCatalog, store: &'a DatasetStore, filter: ValidityFilter) -> Self {
        Self {
            catalog,
            store,
            filter,
        }
    }

    /// Cached list if it already covers the target; otherwise fetch, filter
    /// and persist. Falls back to any cached list when fetching fails.
    pub fn run(&self) -> Result<Vec<Entity>, PipelineError> {
        let target = self.filter.target;
        let mut cached = match self.store.load_entities() {
            Ok(entities) => entities,
            Err(e) => {
                warn!(error = %e, "cached entity list unreadable");
                Vec::new()
            }
        };

        if !cached.is_empty() && cached.len() >= target {
            info!(cached = cached.len(), target, "using cached entity list");
            cached.truncate(target);
            return Ok(cached);
        }

        let failure = match self.catalog.fetch_symbol_universe() {
            Ok(entries) => {
                let entities = self.filter.apply(&entries);
                info!(
                    catalog = self.catalog.name(),
                    candidates = entries.len(),
                    kept = entities.len(),
                    "symbol universe filtered"
                );
                if !entities.is_empty() {
                    let outcome = self.store.save_entities(&entities);
                    if !outcome.is_persisted() {
                        warn!(?outcome, "entity list not persisted");
                    }
                    return Ok(entities);
                }
                "no entity passed the validity filter".to_string()
            }
            Err(e) => e.to_string(),
        };

        if cached.is_empty() {
            error!(reason = %failure, "symbol universe unavailable and nothing cached");
            return Err(PipelineError::SymbolUniverseUnavailable(failure));
        }
        warn!(reason = %failure, cached = cached.len(), "falling back to cached entity list");
        Ok(cached)
    }
}
