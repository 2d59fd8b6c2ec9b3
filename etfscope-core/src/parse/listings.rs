//! Listing endpoint parsers: provider fund directories → [`SecurityListing`]s.
//!
//! Optional fields that a provider leaves out are logged once per response and
//! left empty. A missing ticker (or product URL, where the holdings fetch needs
//! it) fails the whole response with [`ParseError::MissingColumns`].

use super::{ParseError, RawTable, SheetCell};
use crate::domain::{FundType, Provider, SecurityListing};
use crate::schema::clean_text;
use chrono::NaiveDate;
use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, warn};

/// Join a host and a path regardless of leading/trailing slashes.
pub fn join_url(host: &str, path: &str) -> String {
    if path.starts_with("http://") || path.starts_with("https://") {
        return path.to_string();
    }
    format!("{}/{}", host.trim_end_matches('/'), path.trim_start_matches('/'))
}

fn json_string(v: Option<&Value>) -> Option<String> {
    match v? {
        Value::String(s) => clean_text(Some(s)).map(str::to_string),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn json_f64(v: Option<&Value>) -> Option<f64> {
    match v? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.replace(',', "").trim().parse().ok(),
        _ => None,
    }
}

/// `{"r": raw, "d": display}` wrappers carry the machine value under `r`.
fn raw_field(v: Option<&Value>) -> Option<&Value> {
    v?.get("r")
}

/// Last element of a list-valued field, or the field itself.
fn last_of(v: Option<&Value>) -> Option<&Value> {
    match v? {
        Value::Array(items) => items.last(),
        other => Some(other),
    }
}

fn warn_missing(provider: Provider, seen: &HashMap<&'static str, usize>, total: usize) {
    let missing: Vec<&str> = seen
        .iter()
        .filter(|(_, n)| **n == 0)
        .map(|(k, _)| *k)
        .collect();
    if total > 0 && !missing.is_empty() {
        warn!(%provider, ?missing, "listing response lacks optional fields");
    }
}

// ── iShares ──

const ISHARES_FIELDS: &[&str] = &[
    "fundName",
    "inceptionDate",
    "cusip",
    "isin",
    "aladdinAssetClass",
    "aladdinSubAssetClass",
    "aladdinCountry",
    "aladdinRegion",
    "portfolioId",
    "totalNetAssets",
    "productView",
];

/// Product screener JSON: an object keyed by portfolio id.
pub fn ishares_listings(body: &str, host: &str) -> Result<Vec<SecurityListing>, ParseError> {
    let value: Value = serde_json::from_str(body)?;
    let funds = value
        .as_object()
        .ok_or_else(|| ParseError::UnexpectedShape("expected an object keyed by portfolio id".into()))?;

    let mut seen: HashMap<&'static str, usize> = ISHARES_FIELDS.iter().map(|k| (*k, 0)).collect();
    let mut out = Vec::with_capacity(funds.len());
    let mut missing_required = false;

    for fund in funds.values() {
        for (k, n) in seen.iter_mut() {
            if fund.get(*k).is_some() {
                *n += 1;
            }
        }
        let (Some(ticker), Some(url)) = (
            json_string(fund.get("localExchangeTicker")),
            json_string(fund.get("productPageUrl")),
        ) else {
            missing_required = true;
            continue;
        };

        let mut l = SecurityListing::new(ticker, Provider::IShares).with_product_url(join_url(host, &url));
        l.fund_name = json_string(fund.get("fundName"));
        l.cusip = json_string(fund.get("cusip"));
        l.isin = json_string(fund.get("isin"));
        l.asset_class = json_string(fund.get("aladdinAssetClass"));
        l.subasset_class = json_string(fund.get("aladdinSubAssetClass"));
        l.country = json_string(fund.get("aladdinCountry"));
        l.region = json_string(fund.get("aladdinRegion"));
        l.product_id = json_string(fund.get("portfolioId"));
        l.inception_date = json_string(raw_field(fund.get("inceptionDate")))
            .and_then(|s| NaiveDate::parse_from_str(&s, "%Y%m%d").ok());
        l.net_assets = json_f64(raw_field(fund.get("totalNetAssets")));
        l.fund_type = fund
            .get("productView")
            .and_then(|v| v.as_array())
            .and_then(|v| v.first())
            .and_then(Value::as_str)
            .and_then(|v| match v.to_ascii_lowercase().as_str() {
                "etf" => Some(FundType::ETF),
                "mutualfund" => Some(FundType::MF),
                _ => None,
            });
        out.push(l);
    }

    if out.is_empty() && missing_required {
        return Err(ParseError::missing_columns(["localExchangeTicker", "productPageUrl"]));
    }
    warn_missing(Provider::IShares, &seen, funds.len());
    debug!(count = out.len(), "parsed iShares listings");
    Ok(out)
}

// ── SSGA ──

/// Fund-finder JSON: `data.funds.{etfs,mf}.datas[]`.
pub fn ssga_fund_finder(body: &str, host: &str) -> Result<Vec<SecurityListing>, ParseError> {
    let value: Value = serde_json::from_str(body)?;
    let funds = value
        .pointer("/data/funds")
        .ok_or_else(|| ParseError::UnexpectedShape("missing data.funds".into()))?;

    let mut out = Vec::new();
    for (section, fund_type) in [("etfs", FundType::ETF), ("mf", FundType::MF)] {
        let Some(datas) = funds.get(section).and_then(|s| s.get("datas")).and_then(Value::as_array) else {
            warn!(section, "SSGA fund finder section missing");
            continue;
        };
        for fund in datas {
            let (Some(ticker), Some(uri)) = (
                json_string(fund.get("fundTicker")),
                json_string(fund.get("fundUri")),
            ) else {
                return Err(ParseError::missing_columns(["fundTicker", "fundUri"]));
            };
            let mut l = SecurityListing::new(ticker, Provider::SSGA)
                .with_fund_type(fund_type)
                .with_product_url(join_url(host, &uri));
            l.fund_name = json_string(fund.get("fundName"));
            l.region = json_string(fund.get("domicile"));
            l.exchange = json_string(fund.get("primaryExchange"));
            l.inception_date = json_string(last_of(fund.get("inceptionDate")))
                .and_then(|s| NaiveDate::parse_from_str(&s, "%Y-%m-%d").ok());
            // reported in millions
            l.net_assets = json_f64(last_of(fund.get("aum"))).map(|m| m * 1e6);
            out.push(l);
        }
    }
    debug!(count = out.len(), "parsed SSGA fund finder");
    Ok(out)
}

/// Reference fields taken from the SSGA product-data spreadsheet.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SsgaProductData {
    pub asset_class: Option<String>,
    pub cusip: Option<String>,
    pub isin: Option<String>,
    pub benchmark: Option<String>,
}

/// Product-data workbook: a title row, then a header row containing `Ticker`.
pub fn ssga_product_data(
    grid: &[Vec<SheetCell>],
) -> Result<HashMap<String, SsgaProductData>, ParseError> {
    let header_row = grid
        .iter()
        .take(5)
        .position(|r| r.iter().any(|c| matches!(c, SheetCell::Text(s) if s.trim() == "Ticker")))
        .ok_or_else(|| ParseError::missing_columns(["Ticker"]))?;
    let header: Vec<String> = grid[header_row]
        .iter()
        .map(|c| c.as_string().unwrap_or_default())
        .collect();
    let rows = grid[header_row + 1..]
        .iter()
        .map(|r| r.iter().map(SheetCell::as_string).collect())
        .collect();
    let table = RawTable::new(header, rows);

    let col = |t: &str| table.column(t);
    let Some(ticker_col) = col("Ticker") else {
        return Err(ParseError::missing_columns(["Ticker"]));
    };
    if col("Asset Class").is_none() {
        warn!("SSGA product data lacks 'Asset Class'");
    }
    let (asset_col, cusip_col, isin_col, bench_col) =
        (col("Asset Class"), col("CUSIP"), col("ISIN"), col("Primary Index"));

    let get = |row: usize, c: Option<usize>| c.and_then(|c| table.cell(row, c)).map(str::to_string);
    let mut out = HashMap::new();
    for row in 0..table.len() {
        let Some(ticker) = table.cell(row, ticker_col) else {
            continue;
        };
        out.insert(
            ticker.trim().to_string(),
            SsgaProductData {
                asset_class: get(row, asset_col),
                cusip: get(row, cusip_col),
                isin: get(row, isin_col),
                benchmark: get(row, bench_col),
            },
        );
    }
    Ok(out)
}

/// Left-join product data onto the fund-finder listings by ticker.
pub fn merge_ssga(
    mut listings: Vec<SecurityListing>,
    product_data: &HashMap<String, SsgaProductData>,
) -> Vec<SecurityListing> {
    for l in &mut listings {
        if let Some(p) = product_data.get(&l.ticker) {
            l.asset_class = p.asset_class.clone();
            l.cusip = p.cusip.clone();
            l.isin = p.isin.clone();
            l.benchmark = p.benchmark.clone();
        }
    }
    listings
}

// ── Vanguard ──

/// Fund-detail JSON: `fund.entity[].profile`. Entries without a ticker are dropped.
pub fn vanguard_listings(body: &str, fund_url: &str) -> Result<Vec<SecurityListing>, ParseError> {
    let value: Value = serde_json::from_str(body)?;
    let entities = value
        .pointer("/fund/entity")
        .and_then(Value::as_array)
        .ok_or_else(|| ParseError::UnexpectedShape("missing fund.entity list".into()))?;

    let mut out = Vec::with_capacity(entities.len());
    let mut dropped = 0usize;
    for entity in entities {
        let Some(profile) = entity.get("profile") else {
            dropped += 1;
            continue;
        };
        let Some(ticker) = json_string(profile.get("ticker")) else {
            dropped += 1;
            continue;
        };
        let mut l = SecurityListing::new(ticker.clone(), Provider::Vanguard)
            .with_product_url(join_url(fund_url, &ticker.to_uppercase()));
        l.cusip = json_string(profile.get("cusip"));
        l.fund_name = json_string(profile.get("longName"));
        l.product_id = json_string(profile.get("fundId"));
        l.asset_class = json_string(profile.get("style"));
        l.subasset_class = json_string(profile.get("type"));
        l.inception_date = json_string(profile.get("inceptionDate"))
            .and_then(|s| crate::schema::parse_date(&s, "%Y-%m-%d").ok());
        let flag = |k: &str| profile.get(k).and_then(Value::as_bool).unwrap_or(false);
        l.fund_type = if flag("isETF") {
            Some(FundType::ETF)
        } else if flag("isMutualFund") {
            Some(FundType::MF)
        } else {
            None
        };
        out.push(l);
    }

    if out.is_empty() && dropped > 0 {
        return Err(ParseError::missing_columns(["ticker"]));
    }
    debug!(count = out.len(), dropped, "parsed Vanguard listings");
    Ok(out)
}

// ── Invesco ──

pub const INVESCO_LISTING_PREAMBLE: usize = 5;

/// Product list CSV after a fixed preamble. Every row is an ETF.
pub fn invesco_listings(body: &str, item_url: &str) -> Result<Vec<SecurityListing>, ParseError> {
    let body = body.trim_start_matches('\u{feff}');
    let csv_body = body
        .splitn(INVESCO_LISTING_PREAMBLE + 1, '\n')
        .nth(INVESCO_LISTING_PREAMBLE)
        .ok_or_else(|| ParseError::UnexpectedShape("listing file shorter than its preamble".into()))?;
    let table = RawTable::from_csv(csv_body)?;

    let Some(ticker_col) = table.column("Ticker") else {
        return Err(ParseError::missing_columns(["Ticker"]));
    };
    let optional = ["Name", "Inception_Date", "Index_Ticker", "CUSIP", "ISIN", "Exchange"];
    let missing: Vec<&str> = optional
        .iter()
        .copied()
        .filter(|c| table.column(c).is_none())
        .collect();
    if !missing.is_empty() {
        warn!(provider = %Provider::Invesco, ?missing, "listing response lacks optional fields");
    }

    let get = |row: usize, title: &str| {
        table
            .column(title)
            .and_then(|c| table.cell(row, c))
            .and_then(|v| clean_text(Some(v)))
            .map(str::to_string)
    };

    let mut out = Vec::with_capacity(table.len());
    for row in 0..table.len() {
        let Some(ticker) = table.cell(row, ticker_col).and_then(|v| clean_text(Some(v))) else {
            continue;
        };
        let mut l = SecurityListing::new(ticker, Provider::Invesco)
            .with_fund_type(FundType::ETF)
            .with_product_url(item_url.replace("{ticker}", ticker));
        l.fund_name = get(row, "Name");
        l.benchmark = get(row, "Index_Ticker");
        l.cusip = get(row, "CUSIP");
        l.isin = get(row, "ISIN");
        l.exchange = get(row, "Exchange");
        l.inception_date = match get(row, "Inception_Date") {
            Some(s) => Some(crate::schema::parse_date(&s, "%m/%d/%Y")?),
            None => None,
        };
        out.push(l);
    }
    debug!(count = out.len(), "parsed Invesco listings");
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_url_normalizes_slashes() {
        assert_eq!(join_url("https://a.com/", "/x/y"), "https://a.com/x/y");
        assert_eq!(join_url("https://a.com", "x"), "https://a.com/x");
        assert_eq!(join_url("https://a.com", "https://b.com/z"), "https://b.com/z");
    }

    #[test]
    fn ishares_listing_fields() {
        let body = r#"{
            "239726": {
                "fundName": "iShares Core S&P 500 ETF",
                "localExchangeTicker": "IVV",
                "productPageUrl": "/us/products/239726/ishares-core-sp-500-etf",
                "portfolioId": 239726,
                "inceptionDate": {"d": "May 15, 2000", "r": 20000515},
                "totalNetAssets": {"d": "300B", "r": 300000000000.0},
                "aladdinAssetClass": "Equity",
                "productView": ["etf", "ishares"]
            },
            "999": {"fundName": "no ticker"}
        }"#;
        let ls = ishares_listings(body, "https://www.ishares.com").unwrap();
        assert_eq!(ls.len(), 1);
        let l = &ls[0];
        assert_eq!(l.ticker, "IVV");
        assert_eq!(l.product_id.as_deref(), Some("239726"));
        assert_eq!(
            l.product_url.as_deref(),
            Some("https://www.ishares.com/us/products/239726/ishares-core-sp-500-etf")
        );
        assert_eq!(l.inception_date, NaiveDate::from_ymd_opt(2000, 5, 15));
        assert_eq!(l.net_assets, Some(3e11));
        assert_eq!(l.fund_type, Some(FundType::ETF));
        assert_eq!(l.asset_class.as_deref(), Some("Equity"));
    }

    #[test]
    fn ssga_fund_finder_and_merge() {
        let body = r#"{"data": {"funds": {
            "etfs": {"datas": [{"fundName": "SPDR S&P 500", "fundTicker": "SPY", "fundUri": "/us/en/etfs/spy",
                                "inceptionDate": ["Jan 22 1993", "1993-01-22"], "aum": ["$383,551.72 M", "383551.72"],
                                "domicile": "United States", "primaryExchange": "NYSE Arca"}]},
            "mf": {"datas": [{"fundTicker": "SSSYX", "fundUri": "/us/en/mf/sssyx"}]}
        }}}"#;
        let ls = ssga_fund_finder(body, "https://www.ssga.com").unwrap();
        assert_eq!(ls.len(), 2);
        assert_eq!(ls[0].fund_type, Some(FundType::ETF));
        assert_eq!(ls[1].fund_type, Some(FundType::MF));
        assert_eq!(ls[0].inception_date, NaiveDate::from_ymd_opt(1993, 1, 22));
        assert!((ls[0].net_assets.unwrap() - 383_551.72e6).abs() < 1.0);

        let grid = vec![
            vec![SheetCell::text("SPDR product data")],
            vec![
                SheetCell::text("Ticker"),
                SheetCell::text("Name"),
                SheetCell::text("Asset Class"),
                SheetCell::text("CUSIP"),
                SheetCell::text("Primary Index"),
            ],
            vec![
                SheetCell::text("SPY"),
                SheetCell::text("SPDR S&P 500"),
                SheetCell::text("Equity"),
                SheetCell::text("78462F103"),
                SheetCell::text("S&P 500 Index"),
            ],
        ];
        let doc = ssga_product_data(&grid).unwrap();
        let merged = merge_ssga(ls, &doc);
        assert_eq!(merged[0].asset_class.as_deref(), Some("Equity"));
        assert_eq!(merged[0].benchmark.as_deref(), Some("S&P 500 Index"));
        assert_eq!(merged[1].asset_class, None);
    }

    #[test]
    fn vanguard_drops_tickerless_profiles() {
        let body = r#"{"fund": {"entity": [
            {"profile": {"ticker": "voo", "fundId": "0968", "longName": "Vanguard 500 Index ETF",
                         "inceptionDate": "2010-09-07T00:00:00-04:00", "style": "Stock - Large", "isETF": true}},
            {"profile": {"ticker": null, "fundId": "0001"}}
        ]}}"#;
        let ls = vanguard_listings(body, "https://advisors.vanguard.com/investments/products/").unwrap();
        assert_eq!(ls.len(), 1);
        assert_eq!(ls[0].product_key(), "0968");
        assert_eq!(
            ls[0].product_url.as_deref(),
            Some("https://advisors.vanguard.com/investments/products/VOO")
        );
        assert_eq!(ls[0].inception_date, NaiveDate::from_ymd_opt(2010, 9, 7));
        assert_eq!(ls[0].fund_type, Some(FundType::ETF));
    }

    #[test]
    fn invesco_skips_preamble() {
        let body = "Invesco ETFs\nAs of 01/10/2023\n\n\nDisclaimer\n\
                    Name,Ticker,Inception_Date,Index_Ticker,CUSIP,ISIN,Exchange\n\
                    Invesco QQQ Trust,QQQ,03/10/1999,NDX,46090E103,US46090E1038,NASDAQ\n";
        let ls = invesco_listings(body, "https://www.invesco.com/etfs/product-detail?ticker={ticker}").unwrap();
        assert_eq!(ls.len(), 1);
        assert_eq!(ls[0].ticker, "QQQ");
        assert_eq!(ls[0].inception_date, NaiveDate::from_ymd_opt(1999, 3, 10));
        assert_eq!(
            ls[0].product_url.as_deref(),
            Some("https://www.invesco.com/etfs/product-detail?ticker=QQQ")
        );
    }
}
