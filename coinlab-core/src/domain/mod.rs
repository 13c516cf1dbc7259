//! Domain types for tracked entities and their persisted series.

pub mod bar;
pub mod date_info;
pub mod entity;
pub mod metric;

pub use bar::HistoricalBar;
pub use date_info::EntityDateInfo;
pub use entity::{CatalogEntry, Entity};
pub use metric::MetricSnapshot;
