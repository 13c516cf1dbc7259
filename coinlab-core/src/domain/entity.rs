//! Entities: the tracked crypto assets.
//!
//! `CatalogEntry` is a row exactly as the remote catalog ranks it, with every
//! field optional. `Entity` is what survives validity filtering and gets
//! written to the snapshot file.

use serde::{Deserialize, Serialize};

/// One row of the remote ranked catalog, before validation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub id: Option<String>,
    pub symbol: Option<String>,
    pub name: Option<String>,
    pub market_cap_rank: Option<u32>,
    pub current_price: Option<f64>,
    pub market_cap: Option<f64>,
    pub total_volume: Option<f64>,
    pub price_change_percentage_24h: Option<f64>,
    pub last_updated: Option<String>,
}

/// A validated, tracked entity.
///
/// `id` is the stable catalog key and names the entity's series files;
/// `symbol` is always stored uppercase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: String,
    pub symbol: String,
    pub name: String,
    pub market_cap_rank: Option<u32>,
    pub current_price: Option<f64>,
    pub market_cap: Option<f64>,
    pub total_volume: Option<f64>,
    pub price_change_pct_24h: Option<f64>,
    pub last_updated: Option<String>,
}

impl Entity {
    /// Case-insensitive substring match against id, symbol or name.
    pub fn matches(&self, term: &str) -> bool {
        let needle = term.to_lowercase();
        self.id.to_lowercase().contains(&needle)
            || self.symbol.to_lowercase().contains(&needle)
            || self.name.to_lowercase().contains(&needle)
    }
}
