//! Read-side queries over persisted datasets.

use crate::data::DatasetStore;
use crate::domain::{Entity, HistoricalBar, MetricSnapshot};
use serde::Serialize;
use tracing::warn;

#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub entity: Entity,
    pub history_rows: usize,
    pub metrics_rows: usize,
}

/// The latest entity snapshot, loaded once, plus access to each entity's
/// series.
pub struct Catalog<'a> {
    store: &'a DatasetStore,
    entities: Vec<Entity>,
}

impl<'a> Catalog<'a> {
    /// Load the latest entity snapshot. An unreadable snapshot is an empty catalog.
    pub fn open(store: &'a DatasetStore) -> Self {
        let entities = store.load_entities().unwrap_or_else(|e| {
            warn!(error = %e, "entity snapshot unreadable");
            Vec::new()
        });
        Self { store, entities }
    }

    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    pub fn entity(&self, id: &str) -> Option<&Entity> {
        self.entities.iter().find(|e| e.id == id)
    }

    /// Entities whose id, symbol or name contains `term`, case-insensitively.
    pub fn search(&self, term: &str) -> Vec<SearchHit> {
        self.entities
            .iter()
            .filter(|e| e.matches(term))
            .map(|e| SearchHit {
                entity: e.clone(),
                history_rows: self.history(&e.id).len(),
                metrics_rows: self.metrics(&e.id).len(),
            })
            .collect()
    }

    pub fn history(&self, id: &str) -> Vec<HistoricalBar> {
        self.store.load_history(id).unwrap_or_else(|e| {
            warn!(entity = id, error = %e, "history unreadable");
            Vec::new()
        })
    }

    pub fn metrics(&self, id: &str) -> Vec<MetricSnapshot> {
        self.store.load_metrics(id).unwrap_or_else(|e| {
            warn!(entity = id, error = %e, "metrics unreadable");
            Vec::new()
        })
    }
}
