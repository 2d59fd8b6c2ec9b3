//! Parser tests against captured provider responses.
//!
//! For each provider the checks are the same: resolved as-of date, exact total
//! of `amount`, weight total within rounding, first/last ticker in the
//! provider's native order.

use chrono::NaiveDate;
use etfscope_core::domain::HoldingsTable;
use etfscope_core::parse::{invesco, ishares, vanguard, ParseError};
#[cfg(feature = "xlsx")]
use etfscope_core::parse::{listings, sheet, ssga};

const IVV: &str = include_str!("fixtures/ishares_ivv_20221230.csv");
const HEWU_DUPLICATED: &str = include_str!("fixtures/ishares_hewu_20230120_duplicated.csv");
const AGG: &str = include_str!("fixtures/ishares_agg_20221230.csv");
const QQQ: &str = include_str!("fixtures/invesco_qqq_20230113.csv");
const BSCQ: &str = include_str!("fixtures/invesco_bscq_20230113.csv");
const VOO: &str = include_str!("fixtures/vanguard_voo_20221130.json");
#[cfg(feature = "xlsx")]
const SPY: &[u8] = include_bytes!("fixtures/ssga_spy_20230110.xlsx");
#[cfg(feature = "xlsx")]
const SSGA_PRODUCT_DATA: &[u8] = include_bytes!("fixtures/ssga_product_data_20230110.xlsx");

// ──────────────────────────────────────────────
// Helpers
// ──────────────────────────────────────────────

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

fn check_table(
    table: &HoldingsTable,
    total_amount: f64,
    total_weight: f64,
    first: Option<&str>,
    last: Option<&str>,
) {
    // amounts are whole shares/par, so equality is exact
    assert_eq!(table.total_amount(), total_amount);
    assert!(
        (table.total_weight() - total_weight).abs() < 1e-6,
        "weight total {} != {}",
        table.total_weight(),
        total_weight
    );
    if first.is_some() {
        assert_eq!(table.first_ticker(), first);
    }
    if last.is_some() {
        assert_eq!(table.last_ticker(), last);
    }
}

// ──────────────────────────────────────────────
// iShares
// ──────────────────────────────────────────────

#[test]
fn ishares_equity_response() {
    let parsed = ishares::parse_holdings("IVV", IVV, Some("Equity")).unwrap();
    let t = &parsed.table;

    assert_eq!(t.as_of_date, d(2022, 12, 30));
    assert_eq!(t.len(), 6);
    check_table(t, 1_764_500.0, 100.02, Some("AAPL"), Some("ETD_USD"));
    assert!(t.iter().all(|h| h.fund_ticker == "IVV" && h.as_of_date == d(2022, 12, 30)));

    let aapl = &t.holdings[0];
    assert_eq!(aapl.market_value, Some(129_930_000.0));
    assert_eq!(aapl.price, Some(129.93));
    assert_eq!(aapl.exchange.as_deref(), Some("NASDAQ"));
    // "-" placeholders become empty values
    assert_eq!(t.holdings[5].exchange, None);
    assert_eq!(parsed.reported_ticker, None);
}

#[test]
fn ishares_duplicated_block_is_cut() {
    let parsed = ishares::parse_holdings("HEWU", HEWU_DUPLICATED, None).unwrap();
    let t = &parsed.table;

    assert_eq!(t.as_of_date, d(2023, 1, 20));
    assert_eq!(t.len(), 3);
    check_table(t, 275_600.0, 100.0, Some("EWU"), Some("GBP"));
    assert_eq!(t.holdings[2].amount, Some(-103_000.0));
}

#[test]
fn ishares_doubled_response_matches_single() {
    let single = ishares::parse_holdings("IVV", IVV, None).unwrap();
    let doubled = ishares::parse_holdings("IVV", &format!("{IVV}{IVV}"), None).unwrap();
    assert_eq!(doubled.table.len(), single.table.len());
    assert_eq!(doubled.table, single.table);
}

#[test]
fn ishares_fixed_income_response() {
    let parsed = ishares::parse_holdings("AGG", AGG, Some("Fixed Income")).unwrap();
    let t = &parsed.table;

    assert_eq!(t.as_of_date, d(2022, 12, 30));
    check_table(t, 104_500_000.0, 100.0, Some("XTSLA"), Some("FNCL"));

    let note = &t.holdings[1];
    assert_eq!(note.cusip.as_deref(), Some("91282CCB5"));
    assert_eq!(note.maturity, Some(d(2031, 5, 15)));
    assert_eq!(note.accrual_date, Some(d(2022, 11, 15)));
    assert_eq!(note.effective_date, None);
    assert_eq!(note.coupon, Some(1.63));
    assert_eq!(note.modified_duration, Some(6.87));
    assert_eq!(t.holdings[0].maturity, None);
}

#[test]
fn ishares_equity_layout_rejects_bond_file() {
    let err = ishares::parse_holdings("AGG", AGG, Some("Equity")).unwrap_err();
    match err {
        ParseError::MissingColumns { missing } => assert_eq!(missing, vec!["Shares"]),
        other => panic!("unexpected error: {other:?}"),
    }
}

// ──────────────────────────────────────────────
// Invesco
// ──────────────────────────────────────────────

#[test]
fn invesco_equity_response() {
    let parsed = invesco::parse_holdings("QQQ", QQQ).unwrap();
    let t = &parsed.table;

    assert_eq!(t.as_of_date, d(2023, 1, 13));
    assert_eq!(parsed.reported_ticker.as_deref(), Some("QQQ"));
    check_table(t, 1_099_512_345.0, 100.004, Some("AAPL"), Some("AMGN"));
    assert_eq!(t.holdings[3].cusip.as_deref(), Some("30303M102"));
}

#[test]
fn invesco_bond_layout() {
    let parsed = invesco::parse_holdings("BSCQ", BSCQ).unwrap();
    let t = &parsed.table;

    assert_eq!(t.as_of_date, d(2023, 1, 13));
    check_table(t, 9_800_000.0, 100.0, Some("AAPL"), Some("MSFT"));
    assert_eq!(t.holdings[0].cusip.as_deref(), Some("037833DX5"));
    assert_eq!(t.holdings[0].security_type.as_deref(), Some("Corporate Bond"));
}

#[test]
fn invesco_ticker_mismatch_only_warns() {
    let parsed = invesco::parse_holdings("QQQM", QQQ).unwrap();
    assert_eq!(parsed.table.fund_ticker, "QQQM");
    assert_eq!(parsed.reported_ticker.as_deref(), Some("QQQ"));
}

#[test]
fn invesco_multiple_dates_rejected() {
    let body = QQQ.replacen("01/13/2023", "01/12/2023", 1);
    let err = invesco::parse_holdings("QQQ", &body).unwrap_err();
    assert!(matches!(err, ParseError::MultipleValues { field: "holdings date", .. }));
}

// ──────────────────────────────────────────────
// Vanguard
// ──────────────────────────────────────────────

#[test]
fn vanguard_month_end_response() {
    let parsed = vanguard::parse_holdings("VOO", "0968", d(2022, 11, 30), VOO).unwrap();
    assert_eq!(parsed.reported_product_id.as_deref(), Some("0968"));

    let t = &parsed.table;
    assert_eq!(t.as_of_date, d(2022, 11, 30));
    assert_eq!(t.len(), 5);
    check_table(t, 251_502_500.0, 100.0, Some("AAPL"), None);

    // futures and short-term reserves carry no ticker
    let equities: Vec<_> = t
        .iter()
        .filter(|h| h.ticker.is_some() && h.security_type.as_deref() == Some("Equity"))
        .collect();
    assert_eq!(equities.len(), 3);
    let amount: f64 = equities.iter().filter_map(|h| h.amount).sum();
    assert_eq!(amount, 250_000_000.0);
    let mv: f64 = equities.iter().filter_map(|h| h.market_value).sum();
    assert!((mv - 42_966_600_000.0).abs() < 1e-3);
}

#[test]
fn vanguard_wrong_month_is_a_mismatch() {
    let err = vanguard::parse_holdings("VOO", "0968", d(2022, 10, 31), VOO).unwrap_err();
    assert!(matches!(err, ParseError::DataMismatch { field: "holdings date", .. }));
}

// ──────────────────────────────────────────────
// SSGA
// ──────────────────────────────────────────────

#[cfg(feature = "xlsx")]
#[test]
fn ssga_workbook_response() {
    let parsed = ssga::parse_holdings("spy", SPY).unwrap();
    assert_eq!(parsed.reported_ticker.as_deref(), Some("SPY"));

    let t = &parsed.table;
    assert_eq!(t.fund_ticker, "spy");
    assert_eq!(t.as_of_date, d(2023, 1, 10));
    // footer and blank rows have no ticker
    assert_eq!(t.len(), 7);
    check_table(t, 4_260_000.0, 99.999959, Some("AAPL"), Some("NWS"));

    let aapl = &t.holdings[0];
    assert_eq!(aapl.cusip.as_deref(), Some("037833100"));
    assert_eq!(aapl.sedol.as_deref(), Some("2046251"));
    assert_eq!(aapl.amount, Some(1_698_000.0));
    assert_eq!(aapl.sector.as_deref(), Some("Information Technology"));

    let cash = &t.holdings[5];
    assert_eq!(cash.ticker.as_deref(), Some("CASH_USD"));
    assert_eq!(cash.amount, None);
    assert_eq!(cash.cusip, None);
    assert_eq!(cash.sector, None);
    assert_eq!(cash.weight, Some(0.02));
    assert_eq!(cash.currency.as_deref(), Some("USD"));

    assert_eq!(t.holdings[3].ticker.as_deref(), Some("BRK.B"));
}

#[cfg(feature = "xlsx")]
#[test]
fn ssga_workbook_for_another_fund_is_rejected() {
    let err = ssga::parse_holdings("SPYG", SPY).unwrap_err();
    match err {
        ParseError::TickerMismatch { requested, returned } => {
            assert_eq!(requested, "SPYG");
            assert_eq!(returned, "SPY");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[cfg(feature = "xlsx")]
#[test]
fn ssga_product_data_workbook() {
    let grid = sheet::read_first_sheet(SSGA_PRODUCT_DATA).unwrap();
    let doc = listings::ssga_product_data(&grid).unwrap();

    let spy = &doc["SPY"];
    assert_eq!(spy.asset_class.as_deref(), Some("Equity"));
    assert_eq!(spy.cusip.as_deref(), Some("78462F103"));
    assert_eq!(spy.isin.as_deref(), Some("US78462F1030"));
    assert_eq!(spy.benchmark.as_deref(), Some("S&P 500 Index"));
    assert_eq!(doc["GLD"].asset_class.as_deref(), Some("Commodity"));
    assert_eq!(doc["BIL"].asset_class.as_deref(), Some("Fixed Income"));
}
