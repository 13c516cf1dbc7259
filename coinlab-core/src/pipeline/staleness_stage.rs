//! Staleness stage: annotate each entity with its last date and update need.

use crate::data::DatasetStore;
use crate::domain::{Entity, EntityDateInfo};
use crate::policy::UpdatePolicy;

pub struct StalenessStage<'a> {
    store: &'a DatasetStore,
    policy: &'a dyn UpdatePolicy,
}

impl<'a> StalenessStage<'a> {
    pub fn new(store: &'a DatasetStore, policy: &'a dyn UpdatePolicy) -> Self {
        Self { store, policy }
    }

    pub fn run(&self, entities: &[Entity]) -> Vec<EntityDateInfo> {
        entities
            .iter()
            .map(|entity| {
                let last_date = self.store.last_key(&entity.id);
                let needs_update = self.policy.needs_update(last_date.as_deref());
                EntityDateInfo {
                    entity: entity.clone(),
                    last_date,
                    needs_update,
                }
            })
            .collect()
    }
}
