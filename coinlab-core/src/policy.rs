//! Update-need policies: decide whether an entity's history is stale.

use chrono::{NaiveDate, Utc};
use tracing::error;

pub trait UpdatePolicy: Send + Sync {
    /// True if an entity whose history ends at `last_date` should be refreshed.
    /// Never fails; undecidable input means "refresh".
    fn needs_update(&self, last_date: Option<&str>) -> bool;
}

/// Refresh when there is no history or the last row is more than one whole
/// day old. Unparseable dates are logged and treated as stale.
#[derive(Debug, Clone, Copy, Default)]
pub struct DailyUpdatePolicy {
    today: Option<NaiveDate>,
}

impl DailyUpdatePolicy {
    /// Policy evaluated against the current UTC date.
    pub fn new() -> Self {
        Self { today: None }
    }

    /// Policy evaluated against a fixed "today".
    pub fn as_of(today: NaiveDate) -> Self {
        Self { today: Some(today) }
    }

    fn today(&self) -> NaiveDate {
        self.today.unwrap_or_else(|| Utc::now().date_naive())
    }
}

impl UpdatePolicy for DailyUpdatePolicy {
    fn needs_update(&self, last_date: Option<&str>) -> bool {
        let Some(raw) = last_date else {
            return true;
        };
        match NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d") {
            Ok(last) => (self.today() - last).num_days() > 1,
            Err(e) => {
                error!(last_date = raw, error = %e, "unparseable last date, refreshing");
                true
            }
        }
    }
}

/// Refresh everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct ForceRefreshPolicy;

impl UpdatePolicy for ForceRefreshPolicy {
    fn needs_update(&self, _last_date: Option<&str>) -> bool {
        true
    }
}
