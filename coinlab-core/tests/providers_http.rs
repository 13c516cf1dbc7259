//! HTTP-level tests for the CoinGecko catalog and CryptoCompare provider.

use chrono::NaiveDate;
use coinlab_core::data::{CoinGeckoCatalog, CryptoCompareProvider};
use coinlab_core::{DataError, MarketDataProvider, PipelineConfig, SymbolCatalog};
use coinlab_core::pipeline::FillStage;
use coinlab_core::{DatasetStore, Entity, EntityDateInfo};
use mockito::{Matcher, Server};
use std::time::{Duration, Instant};
use tempfile::TempDir;

// ── Helpers ──────────────────────────────────────────────────────────

fn config(server: &Server, max_entities: usize, page_size: u32) -> PipelineConfig {
    PipelineConfig {
        max_entities,
        page_size,
        page_delay_ms: 0,
        rate_limit_delay_ms: 0,
        request_timeout_secs: 5,
        max_retries: 0,
        catalog_url: server.url(),
        market_data_url: server.url(),
        ..PipelineConfig::default()
    }
}

fn market_page(ids: &[&str]) -> String {
    let rows: Vec<String> = ids
        .iter()
        .map(|id| {
            format!(
                r#"{{"id":"{id}","symbol":"{id}","name":"{id}","market_cap_rank":1,
                    "current_price":1.5,"market_cap":2000000,"total_volume":50000,
                    "price_change_percentage_24h":null,"last_updated":"2024-06-01T00:00:00Z"}}"#
            )
        })
        .collect();
    format!("[{}]", rows.join(","))
}

fn page_mock(server: &mut Server, page: u32, body: String) -> mockito::Mock {
    server
        .mock("GET", "/coins/markets")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("page".into(), page.to_string()),
            Matcher::UrlEncoded("order".into(), "market_cap_desc".into()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(body)
        .create()
}

// 2024-01-01, 2024-01-02, 2024-01-03 at 00:00 UTC
const HISTODAY_OK: &str = r#"{
    "Response": "Success",
    "Message": "",
    "Data": {
        "Data": [
            {"time": 1704067200, "open": 1.0, "high": 2.0, "low": 0.5, "close": 1.5, "volumefrom": 100.0, "volumeto": 150.0},
            {"time": 1704153600, "open": 1.5, "high": 2.5, "low": 1.0, "close": 2.0, "volumefrom": 200.0, "volumeto": 400.0},
            {"time": 1704240000, "open": 2.0, "high": 3.0, "low": 1.5, "close": 2.5, "volumefrom": 300.0, "volumeto": 750.0}
        ]
    }
}"#;

// ── CoinGecko ────────────────────────────────────────────────────────

#[test]
fn catalog_pages_until_empty_page() {
    let mut server = Server::new();
    let p1 = page_mock(&mut server, 1, market_page(&["a", "b"]));
    let p2 = page_mock(&mut server, 2, market_page(&["c", "d"]));
    let p3 = page_mock(&mut server, 3, "[]".into());

    let catalog = CoinGeckoCatalog::new(&config(&server, 10, 2));
    let entries = catalog.fetch_symbol_universe().unwrap();

    assert_eq!(entries.len(), 4);
    assert_eq!(entries[2].id.as_deref(), Some("c"));
    assert_eq!(entries[0].market_cap, Some(2_000_000.0));
    assert_eq!(entries[0].price_change_percentage_24h, None);
    p1.assert();
    p2.assert();
    p3.assert();
}

#[test]
fn catalog_stops_once_max_reached() {
    let mut server = Server::new();
    page_mock(&mut server, 1, market_page(&["a", "b"]));
    page_mock(&mut server, 2, market_page(&["c", "d"]));
    let p3 = page_mock(&mut server, 3, market_page(&["e", "f"])).expect(0);

    let catalog = CoinGeckoCatalog::new(&config(&server, 3, 2));
    let entries = catalog.fetch_symbol_universe().unwrap();

    assert_eq!(entries.len(), 4);
    p3.assert();
}

#[test]
fn catalog_truncates_to_twice_max() {
    let mut server = Server::new();
    page_mock(&mut server, 1, market_page(&["a", "b", "c", "d", "e"]));

    let catalog = CoinGeckoCatalog::new(&config(&server, 2, 5));
    assert_eq!(catalog.fetch_symbol_universe().unwrap().len(), 4);
}

#[test]
fn catalog_first_page_failure_is_an_error() {
    let mut server = Server::new();
    server
        .mock("GET", "/coins/markets")
        .match_query(Matcher::Any)
        .with_status(500)
        .create();

    let catalog = CoinGeckoCatalog::new(&config(&server, 10, 2));
    let err = catalog.fetch_symbol_universe().unwrap_err();
    assert!(matches!(err, DataError::HttpStatus { status: 500, .. }));
}

#[test]
fn catalog_later_page_failure_keeps_accumulated() {
    let mut server = Server::new();
    page_mock(&mut server, 1, market_page(&["a", "b"]));
    server
        .mock("GET", "/coins/markets")
        .match_query(Matcher::UrlEncoded("page".into(), "2".into()))
        .with_status(503)
        .create();

    let catalog = CoinGeckoCatalog::new(&config(&server, 10, 2));
    assert_eq!(catalog.fetch_symbol_universe().unwrap().len(), 2);
}

// ── CryptoCompare ────────────────────────────────────────────────────

#[test]
fn history_maps_rows_and_drops_covered_dates() {
    let mut server = Server::new();
    let mock = server
        .mock("GET", "/v2/histoday")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("fsym".into(), "BTC".into()),
            Matcher::UrlEncoded("tsym".into(), "USD".into()),
            Matcher::UrlEncoded("limit".into(), "2000".into()),
        ]))
        .with_status(200)
        .with_body(HISTODAY_OK)
        .expect(2)
        .create();

    let provider = CryptoCompareProvider::new(&config(&server, 10, 2));

    let all = provider.fetch_historical_bars("btc", None);
    assert_eq!(all.len(), 3);
    assert_eq!(all[0].date, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
    assert_eq!(all[2].volume, 300.0);

    let since = NaiveDate::from_ymd_opt(2024, 1, 2);
    let newer = provider.fetch_historical_bars("BTC", since);
    assert_eq!(newer.len(), 1);
    assert_eq!(newer[0].close, 2.5);
    mock.assert();
}

#[test]
fn history_error_response_is_empty() {
    let mut server = Server::new();
    server
        .mock("GET", "/v2/histoday")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(r#"{"Response":"Error","Message":"market does not exist","Data":{}}"#)
        .create();

    let provider = CryptoCompareProvider::new(&config(&server, 10, 2));
    assert!(provider.fetch_historical_bars("NOPE", None).is_empty());
    assert!(provider.is_available());
}

#[test]
fn server_errors_never_open_the_breaker() {
    let mut server = Server::new();
    let mock = server
        .mock("GET", "/v2/histoday")
        .match_query(Matcher::Any)
        .with_status(502)
        .expect(4)
        .create();

    let provider = CryptoCompareProvider::new(&config(&server, 10, 2));
    for _ in 0..4 {
        assert!(provider.fetch_historical_bars("BTC", None).is_empty());
    }
    assert!(provider.is_available());
    // Every call reached the server.
    mock.assert();
}

#[test]
fn rate_limit_waits_for_retry_after() {
    let mut server = Server::new();
    let mock = server
        .mock("GET", "/pricemultifull")
        .match_query(Matcher::Any)
        .with_status(429)
        .with_header("retry-after", "1")
        .expect(2)
        .create();

    let cfg = PipelineConfig {
        max_retries: 1,
        retry_base_delay_ms: 0,
        ..config(&server, 10, 2)
    };
    let provider = CryptoCompareProvider::new(&cfg);

    let started = Instant::now();
    assert!(provider.fetch_current_snapshot("BTC").is_none());
    assert!(started.elapsed() >= Duration::from_secs(1));
    assert!(provider.is_available());
    mock.assert();
}

#[test]
fn forbidden_trips_immediately() {
    let mut server = Server::new();
    server
        .mock("GET", "/pricemultifull")
        .match_query(Matcher::Any)
        .with_status(403)
        .create();

    let provider = CryptoCompareProvider::new(&config(&server, 10, 2));
    assert!(provider.fetch_current_snapshot("BTC").is_none());
    assert!(!provider.is_available());
}

#[test]
fn snapshot_reads_raw_quote() {
    let mut server = Server::new();
    server
        .mock("GET", "/pricemultifull")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("fsyms".into(), "ETH".into()),
            Matcher::UrlEncoded("tsyms".into(), "USD".into()),
        ]))
        .with_status(200)
        .with_body(
            r#"{"RAW":{"ETH":{"USD":{"PRICE":3000.5,"TOTALVOLUME24H":12345.0,
                "HIGH24HOUR":3100.0,"LOW24HOUR":2900.0,"MKTCAP":360000000000}}},
                "DISPLAY":{}}"#,
        )
        .create();

    let provider = CryptoCompareProvider::new(&config(&server, 10, 2));
    let snap = provider.fetch_current_snapshot("eth").unwrap();
    assert_eq!(snap.price, Some(3000.5));
    assert_eq!(snap.volume_24h, Some(12345.0));
    assert_eq!(snap.market_cap, Some(3.6e11));
    assert_eq!(snap.date, chrono::Utc::now().date_naive());
}

#[test]
fn snapshot_missing_symbol_is_unavailable() {
    let mut server = Server::new();
    server
        .mock("GET", "/pricemultifull")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(r#"{"Response":"Error","Message":"no data"}"#)
        .create();

    let provider = CryptoCompareProvider::new(&config(&server, 10, 2));
    assert!(provider.fetch_current_snapshot("ZZZ").is_none());
}

// ── Fill isolation ───────────────────────────────────────────────────

fn stale(id: &str, symbol: &str) -> EntityDateInfo {
    EntityDateInfo {
        entity: Entity {
            id: id.into(),
            symbol: symbol.into(),
            name: id.into(),
            market_cap_rank: None,
            current_price: None,
            market_cap: None,
            total_volume: None,
            price_change_pct_24h: None,
            last_updated: None,
        },
        last_date: None,
        needs_update: true,
    }
}

fn histoday_for(server: &mut Server, symbol: &str, status: usize, body: &str) -> mockito::Mock {
    server
        .mock("GET", "/v2/histoday")
        .match_query(Matcher::UrlEncoded("fsym".into(), symbol.into()))
        .with_status(status)
        .with_body(body)
        .create()
}

fn quote_for(server: &mut Server, symbol: &str, status: usize) -> mockito::Mock {
    server
        .mock("GET", "/pricemultifull")
        .match_query(Matcher::UrlEncoded("fsyms".into(), symbol.into()))
        .with_status(status)
        .with_body(format!(r#"{{"RAW":{{"{symbol}":{{"USD":{{"PRICE":1.0}}}}}}}}"#))
        .create()
}

#[test]
fn failing_entity_does_not_block_the_next() {
    let mut server = Server::new();
    histoday_for(&mut server, "BAD", 502, "");
    quote_for(&mut server, "BAD", 502);
    let good_history = histoday_for(&mut server, "GOOD", 200, HISTODAY_OK);
    quote_for(&mut server, "GOOD", 200);

    let cfg = PipelineConfig {
        max_retries: 1,
        retry_base_delay_ms: 0,
        ..config(&server, 10, 2)
    };
    let provider = CryptoCompareProvider::new(&cfg);
    let dir = TempDir::new().unwrap();
    let store = DatasetStore::new(dir.path());

    let stats = FillStage::new(&provider, &store, Duration::ZERO)
        .run(&[stale("bad", "BAD"), stale("good", "GOOD")]);

    assert_eq!(stats.processed, 2);
    assert_eq!(stats.succeeded, 1);
    assert_eq!(stats.failed, vec!["bad".to_string()]);
    assert!(store.exists("good"));
    assert_eq!(store.load_history("good").unwrap().len(), 3);
    good_history.assert();
}

#[test]
fn access_ban_stops_the_remaining_fill() {
    let mut server = Server::new();
    histoday_for(&mut server, "FIRST", 403, "");
    let later = server
        .mock("GET", "/v2/histoday")
        .match_query(Matcher::UrlEncoded("fsym".into(), "LATER".into()))
        .expect(0)
        .create();

    let provider = CryptoCompareProvider::new(&config(&server, 10, 2));
    let dir = TempDir::new().unwrap();
    let store = DatasetStore::new(dir.path());

    let stats = FillStage::new(&provider, &store, Duration::ZERO)
        .run(&[stale("first", "FIRST"), stale("later", "LATER")]);

    assert_eq!(stats.processed, 2);
    assert_eq!(stats.succeeded, 0);
    assert_eq!(stats.failed, vec!["first".to_string(), "later".to_string()]);
    assert!(!provider.is_available());
    later.assert();
}
