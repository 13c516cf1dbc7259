//! End-to-end pipeline tests with in-memory fetch strategies.

use chrono::{Duration, NaiveDate, Utc};
use coinlab_core::pipeline::{FillStage, StalenessStage};
use coinlab_core::{
    CatalogEntry, DailyUpdatePolicy, DataError, DatasetStore, Entity, ForceRefreshPolicy,
    HistoricalBar, MarketDataProvider, MetricSnapshot, Pipeline, PipelineConfig, PipelineError,
    SymbolCatalog,
};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

// ── Mocks ────────────────────────────────────────────────────────────

#[derive(Default)]
struct CallLog {
    catalog: AtomicUsize,
    history: AtomicUsize,
    snapshot: AtomicUsize,
    symbols: Mutex<Vec<String>>,
}

struct MockCatalog {
    log: Arc<CallLog>,
    entries: Option<Vec<CatalogEntry>>,
}

impl SymbolCatalog for MockCatalog {
    fn name(&self) -> &str {
        "mock"
    }

    fn fetch_symbol_universe(&self) -> Result<Vec<CatalogEntry>, DataError> {
        self.log.catalog.fetch_add(1, Ordering::SeqCst);
        self.entries
            .clone()
            .ok_or_else(|| DataError::NetworkUnreachable("offline".into()))
    }
}

struct MockProvider {
    log: Arc<CallLog>,
    /// Symbols for which the provider has nothing at all.
    dead: HashSet<String>,
}

impl MarketDataProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    fn fetch_historical_bars(&self, symbol: &str, since: Option<NaiveDate>) -> Vec<HistoricalBar> {
        self.log.history.fetch_add(1, Ordering::SeqCst);
        self.log.symbols.lock().unwrap().push(symbol.to_string());
        if self.dead.contains(symbol) {
            return Vec::new();
        }
        let today = Utc::now().date_naive();
        let start = since.map(|d| d + Duration::days(1)).unwrap_or(today - Duration::days(9));
        start
            .iter_days()
            .take_while(|d| *d <= today)
            .map(|date| bar(date, 100.0))
            .collect()
    }

    fn fetch_current_snapshot(&self, symbol: &str) -> Option<MetricSnapshot> {
        self.log.snapshot.fetch_add(1, Ordering::SeqCst);
        if self.dead.contains(symbol) {
            return None;
        }
        Some(MetricSnapshot {
            date: Utc::now().date_naive(),
            price: Some(100.0),
            volume_24h: Some(5e6),
            high_24h: None,
            low_24h: None,
            market_cap: Some(1e9),
        })
    }
}

// ── Helpers ──────────────────────────────────────────────────────────

fn bar(date: NaiveDate, close: f64) -> HistoricalBar {
    HistoricalBar {
        date,
        open: close,
        high: close + 1.0,
        low: close - 1.0,
        close,
        volume: 1000.0,
    }
}

fn entity(id: &str, symbol: &str) -> Entity {
    Entity {
        id: id.into(),
        symbol: symbol.into(),
        name: id.into(),
        market_cap_rank: None,
        current_price: Some(1.0),
        market_cap: Some(1e9),
        total_volume: Some(1e7),
        price_change_pct_24h: None,
        last_updated: None,
    }
}

fn entry(id: &str, symbol: &str) -> CatalogEntry {
    CatalogEntry {
        id: Some(id.into()),
        symbol: Some(symbol.into()),
        name: Some(id.into()),
        market_cap: Some(1e9),
        total_volume: Some(1e7),
        ..Default::default()
    }
}

fn config(dir: &std::path::Path, max_entities: usize) -> PipelineConfig {
    PipelineConfig {
        data_dir: dir.to_path_buf(),
        max_entities,
        rate_limit_delay_ms: 0,
        page_delay_ms: 0,
        ..PipelineConfig::default()
    }
}

fn pipeline(
    config: PipelineConfig,
    log: &Arc<CallLog>,
    entries: Option<Vec<CatalogEntry>>,
    dead: &[&str],
) -> Pipeline {
    Pipeline::new(
        config,
        Box::new(MockCatalog {
            log: Arc::clone(log),
            entries,
        }),
        Box::new(MockProvider {
            log: Arc::clone(log),
            dead: dead.iter().map(|s| s.to_string()).collect(),
        }),
    )
}

// ── Symbol stage ─────────────────────────────────────────────────────

#[test]
fn cache_hit_makes_no_network_calls() {
    let dir = tempfile::tempdir().unwrap();
    let store = DatasetStore::new(dir.path());
    let cached = vec![entity("bitcoin", "BTC"), entity("ethereum", "ETH"), entity("solana", "SOL")];
    store.save_entities(&cached);
    let today = Utc::now().date_naive();
    for e in &cached {
        store.save_history(&e.id, &[bar(today, 10.0)]);
    }

    let log = Arc::new(CallLog::default());
    let report = pipeline(config(dir.path(), 3), &log, Some(vec![entry("x", "X")]), &[])
        .run()
        .unwrap();

    assert_eq!(log.catalog.load(Ordering::SeqCst), 0);
    assert_eq!(log.history.load(Ordering::SeqCst), 0);
    assert_eq!(report.total_symbols, 3);
    assert_eq!(report.needs_update, 0);
    assert_eq!(report.processed, 0);
    assert_eq!(report.skipped, 3);
}

#[test]
fn oversized_cache_is_truncated_to_target() {
    let dir = tempfile::tempdir().unwrap();
    let store = DatasetStore::new(dir.path());
    store.save_entities(&[entity("a", "A"), entity("b", "B"), entity("c", "C")]);

    let log = Arc::new(CallLog::default());
    let report = pipeline(config(dir.path(), 2), &log, None, &[]).run().unwrap();

    assert_eq!(log.catalog.load(Ordering::SeqCst), 0);
    assert_eq!(report.total_symbols, 2);
}

#[test]
fn fetched_universe_is_filtered_and_persisted() {
    let dir = tempfile::tempdir().unwrap();
    let log = Arc::new(CallLog::default());
    let entries = vec![entry("bitcoin", "btc"), entry("tether", "usdt"), entry("ethereum", "eth")];

    let p = pipeline(config(dir.path(), 5), &log, Some(entries), &[]);
    let report = p.run().unwrap();

    assert_eq!(log.catalog.load(Ordering::SeqCst), 1);
    assert_eq!(report.total_symbols, 2);
    let saved = p.store().load_entities().unwrap();
    let symbols: Vec<_> = saved.iter().map(|e| e.symbol.as_str()).collect();
    assert_eq!(symbols, vec!["BTC", "ETH"]);
}

#[test]
fn catalog_failure_without_cache_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let log = Arc::new(CallLog::default());
    let err = pipeline(config(dir.path(), 3), &log, None, &[]).run().unwrap_err();

    assert!(matches!(err, PipelineError::SymbolUniverseUnavailable(_)));
    assert_eq!(log.history.load(Ordering::SeqCst), 0);
}

#[test]
fn empty_filter_result_without_cache_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let log = Arc::new(CallLog::default());
    let only_stables = vec![entry("tether", "usdt"), entry("usd-coin", "usdc")];
    let err = pipeline(config(dir.path(), 3), &log, Some(only_stables), &[])
        .run()
        .unwrap_err();
    assert!(matches!(err, PipelineError::SymbolUniverseUnavailable(_)));
}

#[test]
fn catalog_failure_falls_back_to_short_cache() {
    let dir = tempfile::tempdir().unwrap();
    DatasetStore::new(dir.path()).save_entities(&[entity("bitcoin", "BTC")]);

    let log = Arc::new(CallLog::default());
    let report = pipeline(config(dir.path(), 3), &log, None, &[]).run().unwrap();

    assert_eq!(log.catalog.load(Ordering::SeqCst), 1);
    assert_eq!(report.total_symbols, 1);
    assert_eq!(report.succeeded, 1);
}

// ── Staleness + fill ─────────────────────────────────────────────────

#[test]
fn only_stale_entities_are_fetched() {
    let dir = tempfile::tempdir().unwrap();
    let store = DatasetStore::new(dir.path());
    let today = Utc::now().date_naive();
    let entities = vec![
        entity("fresh-a", "FA"),
        entity("stale-b", "SB"),
        entity("fresh-c", "FC"),
        entity("new-d", "ND"),
    ];
    store.save_entities(&entities);
    store.save_history("fresh-a", &[bar(today, 1.0)]);
    store.save_history("fresh-c", &[bar(today - Duration::days(1), 1.0)]);
    store.save_history("stale-b", &[bar(today - Duration::days(5), 1.0)]);

    let log = Arc::new(CallLog::default());
    let report = pipeline(config(dir.path(), 4), &log, None, &[]).run().unwrap();

    assert_eq!(log.history.load(Ordering::SeqCst), 2);
    assert_eq!(log.snapshot.load(Ordering::SeqCst), 2);
    assert_eq!(report.needs_update, 2);
    assert_eq!(report.processed, 2);
    assert_eq!(report.skipped, 2);
    assert_eq!(report.succeeded, 2);

    // stale-b was topped up from the day after its last row.
    let history = store.load_history("stale-b").unwrap();
    assert_eq!(history.len(), 6);
    assert_eq!(store.last_key("stale-b"), Some(today.format("%Y-%m-%d").to_string()));
    assert_eq!(store.load_metrics("new-d").unwrap().len(), 1);
}

#[test]
fn one_dead_entity_does_not_block_others() {
    let dir = tempfile::tempdir().unwrap();
    let store = DatasetStore::new(dir.path());
    let entities = vec![entity("alive", "ALV"), entity("ghost", "GST"), entity("also", "ALS")];

    let log = Arc::new(CallLog::default());
    let provider = MockProvider {
        log: Arc::clone(&log),
        dead: ["GST".to_string()].into_iter().collect(),
    };
    let infos = StalenessStage::new(&store, &ForceRefreshPolicy).run(&entities);
    let stats = FillStage::new(&provider, &store, std::time::Duration::ZERO).run(&infos);

    assert_eq!(stats.processed, 3);
    assert_eq!(stats.succeeded, 2);
    assert_eq!(stats.failed, vec!["ghost".to_string()]);
    assert!(store.exists("alive"));
    assert!(store.exists("also"));
    assert!(!store.exists("ghost"));
    assert_eq!(
        *log.symbols.lock().unwrap(),
        vec!["ALV".to_string(), "GST".to_string(), "ALS".to_string()]
    );
}

#[test]
fn staleness_reports_last_dates() {
    let dir = tempfile::tempdir().unwrap();
    let store = DatasetStore::new(dir.path());
    let day = NaiveDate::from_ymd_opt(2024, 6, 10).unwrap();
    store.save_history("btc", &[bar(day, 1.0)]);

    let policy = DailyUpdatePolicy::as_of(NaiveDate::from_ymd_opt(2024, 6, 11).unwrap());
    let infos = StalenessStage::new(&store, &policy).run(&[entity("btc", "BTC"), entity("eth", "ETH")]);

    assert_eq!(infos[0].last_date.as_deref(), Some("2024-06-10"));
    assert!(!infos[0].needs_update);
    assert_eq!(infos[1].last_date, None);
    assert!(infos[1].needs_update);
}

#[test]
fn pipeline_records_stage_timings() {
    let dir = tempfile::tempdir().unwrap();
    let log = Arc::new(CallLog::default());
    let p = pipeline(config(dir.path(), 1), &log, Some(vec![entry("bitcoin", "btc")]), &[])
        .with_policy(Box::new(ForceRefreshPolicy));
    let report = p.run().unwrap();

    assert_eq!(report.processed, 1);
    for stage in ["symbol_stage", "staleness_stage", "fill_stage", "pipeline"] {
        assert!(p.timer().last(stage).is_some(), "{stage} not timed");
    }
}
