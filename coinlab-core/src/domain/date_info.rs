//! Staleness annotation passed from the staleness stage to the fill stage.

use super::entity::Entity;

/// An entity together with the last persisted date of its history and
/// whether the update policy wants it refreshed. Never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityDateInfo {
    pub entity: Entity,
    /// Raw date key as found in the historical file, if any.
    pub last_date: Option<String>,
    pub needs_update: bool,
}
