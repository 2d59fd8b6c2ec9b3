//! Trading calendars.
//!
//! [`TradingCalendar`] is the seam the date planner depends on. The bundled
//! [`UsEquityCalendar`] derives NYSE/NASDAQ full-day closures from the holiday
//! rules plus a table of unscheduled closures; early closes count as trading days.

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CalendarError {
    #[error("unknown exchange '{0}'")]
    UnknownExchange(String),
}

pub trait TradingCalendar: Send + Sync {
    /// Whether `exchange` holds a regular session on `date`.
    fn is_trading_day(&self, exchange: &str, date: NaiveDate) -> Result<bool, CalendarError>;

    /// Ordered trading days in `[start, end]`.
    fn trading_days(
        &self,
        exchange: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<NaiveDate>, CalendarError> {
        let mut out = Vec::new();
        let mut d = start;
        while d <= end {
            if self.is_trading_day(exchange, d)? {
                out.push(d);
            }
            d += Duration::days(1);
        }
        Ok(out)
    }
}

/// Rule-based calendar shared by the US equity exchanges.
#[derive(Debug, Clone, Copy, Default)]
pub struct UsEquityCalendar;

const EXCHANGES: &[&str] = &["NYSE", "XNYS", "NASDAQ", "XNAS", "NYSEARCA", "ARCX", "US"];

/// Full-day closures not produced by the holiday rules.
const UNSCHEDULED_CLOSURES: &[(i32, u32, u32)] = &[
    (2001, 9, 11),
    (2001, 9, 12),
    (2001, 9, 13),
    (2001, 9, 14),
    (2004, 6, 11),
    (2007, 1, 2),
    (2012, 10, 29),
    (2012, 10, 30),
    (2018, 12, 5),
    (2025, 1, 9),
];

impl UsEquityCalendar {
    pub fn supports(exchange: &str) -> bool {
        EXCHANGES.iter().any(|e| e.eq_ignore_ascii_case(exchange.trim()))
    }

    pub fn is_holiday(date: NaiveDate) -> bool {
        let year = date.year();
        let observed = |m: u32, d: u32| NaiveDate::from_ymd_opt(year, m, d).map(observe);
        let nth = |m: u32, wd: Weekday, n: u8| NaiveDate::from_weekday_of_month_opt(year, m, wd, n);

        // Sunday New Year's Day moves to Monday; a Saturday one is not observed.
        let new_year = NaiveDate::from_ymd_opt(year, 1, 1).map(|d| match d.weekday() {
            Weekday::Sun => d + Duration::days(1),
            _ => d,
        });

        let mut holidays = vec![
            new_year,
            nth(2, Weekday::Mon, 3),
            easter_sunday(year).map(|e| e - Duration::days(2)),
            last_weekday_of_month(year, 5, Weekday::Mon),
            observed(7, 4),
            nth(9, Weekday::Mon, 1),
            nth(11, Weekday::Thu, 4),
            observed(12, 25),
        ];
        if year >= 1998 {
            holidays.push(nth(1, Weekday::Mon, 3));
        }
        if year >= 2022 {
            holidays.push(observed(6, 19));
        }

        holidays.into_iter().flatten().any(|h| h == date)
            || UNSCHEDULED_CLOSURES
                .iter()
                .any(|&(y, m, d)| NaiveDate::from_ymd_opt(y, m, d) == Some(date))
    }
}

impl TradingCalendar for UsEquityCalendar {
    fn is_trading_day(&self, exchange: &str, date: NaiveDate) -> Result<bool, CalendarError> {
        if !Self::supports(exchange) {
            return Err(CalendarError::UnknownExchange(exchange.to_string()));
        }
        Ok(is_business_day(date) && !Self::is_holiday(date))
    }
}

/// Monday to Friday.
pub fn is_business_day(date: NaiveDate) -> bool {
    !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// Saturday holidays are observed on Friday, Sunday ones on Monday.
fn observe(date: NaiveDate) -> NaiveDate {
    match date.weekday() {
        Weekday::Sat => date - Duration::days(1),
        Weekday::Sun => date + Duration::days(1),
        _ => date,
    }
}

fn last_weekday_of_month(year: i32, month: u32, weekday: Weekday) -> Option<NaiveDate> {
    let mut d = last_day_of_month(year, month)?;
    while d.weekday() != weekday {
        d -= Duration::days(1);
    }
    Some(d)
}

pub fn last_day_of_month(year: i32, month: u32) -> Option<NaiveDate> {
    let (ny, nm) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    NaiveDate::from_ymd_opt(ny, nm, 1).map(|d| d - Duration::days(1))
}

/// Anonymous Gregorian computus.
fn easter_sunday(year: i32) -> Option<NaiveDate> {
    let a = year % 19;
    let b = year / 100;
    let c = year % 100;
    let d = b / 4;
    let e = b % 4;
    let f = (b + 8) / 25;
    let g = (b - f + 1) / 3;
    let h = (19 * a + b - d - g + 15) % 30;
    let i = c / 4;
    let k = c % 4;
    let l = (32 + 2 * e + 2 * i - h - k) % 7;
    let m = (a + 11 * h + 22 * l) / 451;
    let month = (h + l - 7 * m + 114) / 31;
    let day = (h + l - 7 * m + 114) % 31 + 1;
    NaiveDate::from_ymd_opt(year, month as u32, day as u32)
}
