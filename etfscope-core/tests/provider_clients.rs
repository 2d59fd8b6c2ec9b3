//! Provider clients against a local mock server.
//!
//! Endpoints come from `ProviderSettings`, so every test points the relevant
//! URL at mockito and serves a captured response body.

use chrono::NaiveDate;
use etfscope_core::domain::{FundType, Provider, SecurityListing};
use etfscope_core::listings::ListingDirectory;
use etfscope_core::providers::{ProviderRegistry, ProviderSettings};
use etfscope_core::{Classify, ErrorClass, EtfScraper, FetchError, HoldingsSource};
use mockito::Matcher;

const IVV: &str = include_str!("fixtures/ishares_ivv_20221230.csv");
const QQQ: &str = include_str!("fixtures/invesco_qqq_20230113.csv");
const VOO: &str = include_str!("fixtures/vanguard_voo_20221130.json");
#[cfg(feature = "xlsx")]
const SPY: &[u8] = include_bytes!("fixtures/ssga_spy_20230110.xlsx");
#[cfg(feature = "xlsx")]
const SSGA_PRODUCT_DATA: &[u8] = include_bytes!("fixtures/ssga_product_data_20230110.xlsx");

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

fn settings(base: &str) -> ProviderSettings {
    ProviderSettings {
        timeout_secs: 5,
        ishares_host: base.to_string(),
        invesco_holdings_url: format!("{base}/invesco/holdings?ticker={{ticker}}"),
        vanguard_holdings_url: format!("{base}/vanguard/{{product_id}}.json"),
        ssga_host: base.to_string(),
        ssga_fund_finder_url: format!("{base}/ssga/fundfinder"),
        ssga_product_data_url: format!("{base}/ssga/spdr-product-data-us-en.xlsx"),
        ssga_holdings_url: format!("{base}/ssga/holdings-daily-us-en-{{ticker}}.xlsx"),
        ..ProviderSettings::default()
    }
}

fn ivv_listing(base: &str) -> SecurityListing {
    SecurityListing::new("IVV", Provider::IShares)
        .with_fund_type(FundType::ETF)
        .with_asset_class("Equity")
        .with_product_url(format!("{base}/us/products/239726/ishares-core-sp-500-etf"))
}

fn scraper(base: &str) -> EtfScraper {
    let directory = ListingDirectory::new(vec![
        ivv_listing(base),
        SecurityListing::new("QQQ", Provider::Invesco).with_fund_type(FundType::ETF),
        SecurityListing::new("VOO", Provider::Vanguard)
            .with_fund_type(FundType::ETF)
            .with_product_id("0968"),
        SecurityListing::new("SPY", Provider::SSGA).with_fund_type(FundType::ETF),
        SecurityListing::new("SPYMF", Provider::SSGA).with_fund_type(FundType::MF),
    ]);
    let registry = ProviderRegistry::with_settings(&settings(base)).unwrap();
    EtfScraper::new(directory, registry)
}

// ── iShares ──

#[test]
fn ishares_dated_query() {
    let mut server = mockito::Server::new();
    let mock = server
        .mock("GET", "/us/products/239726/ishares-core-sp-500-etf/1467271812596.ajax")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("fileType".into(), "csv".into()),
            Matcher::UrlEncoded("fileName".into(), "IVV_holdings".into()),
            Matcher::UrlEncoded("asOfDate".into(), "20221230".into()),
        ]))
        .with_body(IVV)
        .create();

    let table = scraper(&server.url())
        .query_holdings("IVV", Some(d(2022, 12, 30)))
        .unwrap();
    mock.assert();
    assert_eq!(table.as_of_date, d(2022, 12, 30));
    assert_eq!(table.len(), 6);
}

#[test]
fn ishares_date_disagreement_is_integrity_error() {
    let mut server = mockito::Server::new();
    server
        .mock("GET", "/us/products/239726/ishares-core-sp-500-etf/1467271812596.ajax")
        .match_query(Matcher::Any)
        .with_body(IVV)
        .create();

    let err = scraper(&server.url())
        .query_holdings("IVV", Some(d(2022, 12, 29)))
        .unwrap_err();
    assert_eq!(err.error_class(), ErrorClass::DataIntegrity);
    assert_eq!(err.kind(), "DataMismatch");
    assert!(!err.is_retryable());
}

#[test]
fn ishares_server_error_is_transient() {
    let mut server = mockito::Server::new();
    server
        .mock("GET", "/us/products/239726/ishares-core-sp-500-etf/1467271812596.ajax")
        .match_query(Matcher::Any)
        .with_status(503)
        .create();

    let err = scraper(&server.url()).query_holdings("IVV", None).unwrap_err();
    assert!(matches!(err, FetchError::HttpStatus { status: 503, .. }));
    assert!(err.is_retryable());
}

// ── Invesco ──

#[test]
fn invesco_latest_query() {
    let mut server = mockito::Server::new();
    let mock = server
        .mock("GET", "/invesco/holdings")
        .match_query(Matcher::UrlEncoded("ticker".into(), "QQQ".into()))
        .with_body(QQQ)
        .create();

    let table = scraper(&server.url()).query_holdings("QQQ", None).unwrap();
    mock.assert();
    assert_eq!(table.as_of_date, d(2023, 1, 13));
    assert_eq!(table.first_ticker(), Some("AAPL"));
}

#[test]
fn invesco_historical_query_fails_before_io() {
    let mut server = mockito::Server::new();
    let mock = server
        .mock("GET", Matcher::Any)
        .expect(0)
        .create();

    let err = scraper(&server.url())
        .query_holdings("QQQ", Some(d(2023, 1, 13)))
        .unwrap_err();
    mock.assert();
    assert!(matches!(err, FetchError::UnsupportedQuery { provider: Provider::Invesco, .. }));
    assert_eq!(err.error_class(), ErrorClass::InvalidParameter);
}

// ── Vanguard ──

#[test]
fn vanguard_dated_query_sends_product_id_and_date() {
    let mut server = mockito::Server::new();
    let mock = server
        .mock("GET", "/vanguard/0968.json")
        .match_query(Matcher::UrlEncoded("as-of-date".into(), "2022-11-30".into()))
        .with_body(VOO)
        .create();

    let table = scraper(&server.url())
        .query_holdings("VOO", Some(d(2022, 11, 30)))
        .unwrap();
    mock.assert();
    assert_eq!(table.fund_ticker, "VOO");
    assert_eq!(table.as_of_date, d(2022, 11, 30));
}

#[test]
fn vanguard_empty_response_is_no_data() {
    let mut server = mockito::Server::new();
    server
        .mock("GET", "/vanguard/0968.json")
        .match_query(Matcher::Any)
        .with_body("[]")
        .create();

    let err = scraper(&server.url())
        .query_holdings("VOO", Some(d(2022, 11, 30)))
        .unwrap_err();
    assert_eq!(err.error_class(), ErrorClass::NoData);
    assert_eq!(err.kind(), "NoDataReturned");
}

// ── SSGA ──

#[test]
fn ssga_rejects_historical_and_mutual_fund_queries() {
    let mut server = mockito::Server::new();
    let mock = server.mock("GET", Matcher::Any).expect(0).create();
    let s = scraper(&server.url());

    let err = s.query_holdings("SPY", Some(d(2023, 1, 10))).unwrap_err();
    assert!(matches!(err, FetchError::UnsupportedQuery { provider: Provider::SSGA, .. }));

    let err = s.query_holdings("SPYMF", None).unwrap_err();
    assert!(matches!(err, FetchError::UnsupportedFundType { .. }));
    assert!(!err.is_retryable());
    mock.assert();
}

#[cfg(feature = "xlsx")]
#[test]
fn ssga_latest_workbook_query() {
    let mut server = mockito::Server::new();
    let mock = server
        .mock("GET", "/ssga/holdings-daily-us-en-spy.xlsx")
        .with_header(
            "content-type",
            "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        )
        .with_body(SPY)
        .create();

    let table = scraper(&server.url()).query_holdings("SPY", None).unwrap();
    mock.assert();
    assert_eq!(table.fund_ticker, "SPY");
    assert_eq!(table.as_of_date, d(2023, 1, 10));
    assert_eq!(table.len(), 7);
    assert_eq!(table.first_ticker(), Some("AAPL"));
    assert_eq!(table.last_ticker(), Some("NWS"));
}

#[cfg(feature = "xlsx")]
#[test]
fn ssga_listings_merge_product_workbook() {
    let mut server = mockito::Server::new();
    server
        .mock("GET", "/ssga/fundfinder")
        .with_body(
            r#"{"data": {"funds": {
                "etfs": {"datas": [
                    {"fundName": "SPDR S&P 500 ETF Trust", "fundTicker": "SPY", "fundUri": "/us/en/intermediary/etfs/spy",
                     "inceptionDate": ["Jan 22 1993", "1993-01-22"], "aum": ["$371,512.04 M", "371512.04"]},
                    {"fundName": "SPDR Portfolio S&P 500 ETF", "fundTicker": "SPLG", "fundUri": "/us/en/intermediary/etfs/splg"}
                ]},
                "mf": {"datas": [{"fundTicker": "SSSYX", "fundUri": "/us/en/intermediary/mf/sssyx"}]}
            }}}"#,
        )
        .create();
    server
        .mock("GET", "/ssga/spdr-product-data-us-en.xlsx")
        .with_body(SSGA_PRODUCT_DATA)
        .create();

    let base = server.url();
    let listings = scraper(&base).fetch_listings(Provider::SSGA).unwrap();
    assert_eq!(listings.len(), 3);

    let spy = &listings[0];
    assert_eq!(spy.ticker, "SPY");
    assert_eq!(spy.fund_type, Some(FundType::ETF));
    assert_eq!(spy.asset_class.as_deref(), Some("Equity"));
    assert_eq!(spy.isin.as_deref(), Some("US78462F1030"));
    assert_eq!(spy.benchmark.as_deref(), Some("S&P 500 Index"));
    assert_eq!(
        spy.product_url.as_deref(),
        Some(format!("{base}/us/en/intermediary/etfs/spy").as_str())
    );
    // not in the product workbook
    assert_eq!(listings[1].ticker, "SPLG");
    assert_eq!(listings[1].asset_class, None);
    assert_eq!(listings[2].fund_type, Some(FundType::MF));
}

#[test]
fn ssga_rate_limit_is_retryable() {
    let mut server = mockito::Server::new();
    server
        .mock("GET", "/ssga/holdings-daily-us-en-spy.xlsx")
        .with_status(429)
        .with_header("retry-after", "7")
        .create();

    let err = scraper(&server.url()).query_holdings("SPY", None).unwrap_err();
    assert!(matches!(err, FetchError::RateLimited { retry_after_secs: 7 }));
    assert!(err.is_retryable());
}

// ── Directory routing ──

#[test]
fn unknown_ticker_never_hits_the_network() {
    let server = mockito::Server::new();
    let err = scraper(&server.url()).query_holdings("ZZZZ", None).unwrap_err();
    assert!(matches!(err, FetchError::UnknownTicker { .. }));
    assert_eq!(err.error_class(), ErrorClass::InvalidParameter);
}
