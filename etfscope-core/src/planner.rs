//! Date-Range Planner: expands a start/end pair and flags into query dates.
//!
//! | month_ends | trading_days | result                                      |
//! |------------|--------------|---------------------------------------------|
//! | no         | no           | every business day (Mon–Fri)                |
//! | yes        | no           | last business day of each month in range    |
//! | no         | yes          | every exchange trading day                  |
//! | yes        | yes          | last trading day of each month in range     |
//!
//! An empty plan is a normal outcome meaning there is nothing to fetch.

use crate::calendar::{is_business_day, last_day_of_month, CalendarError, TradingCalendar};
use chrono::{Datelike, Duration, NaiveDate};
use tracing::debug;

/// Upper bound on how far past `end` the month-end buffer may walk.
const MAX_BUFFER_DAYS: i64 = 31;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlanOptions {
    pub month_ends: bool,
    pub trading_days: bool,
}

/// Ordered, deduplicated query dates in `[start, end]`.
pub fn plan_dates(
    start: NaiveDate,
    end: NaiveDate,
    options: PlanOptions,
    exchange: &str,
    calendar: &dyn TradingCalendar,
) -> Result<Vec<NaiveDate>, CalendarError> {
    if start > end {
        return Ok(Vec::new());
    }

    let dates = match (options.month_ends, options.trading_days) {
        (false, false) => business_days(start, end),
        (true, false) => business_month_ends(start, end),
        (false, true) => calendar.trading_days(exchange, start, end)?,
        (true, true) => trading_month_ends(start, end, exchange, calendar)?,
    };
    debug!(%start, %end, ?options, exchange, count = dates.len(), "planned query dates");
    Ok(dates)
}

pub fn business_days(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    start
        .iter_days()
        .take_while(|d| *d <= end)
        .filter(|d| is_business_day(*d))
        .collect()
}

/// Last Mon–Fri day of the month containing `date`.
pub fn last_business_day_of_month(date: NaiveDate) -> Option<NaiveDate> {
    let mut d = last_day_of_month(date.year(), date.month())?;
    while !is_business_day(d) {
        d -= Duration::days(1);
    }
    Some(d)
}

fn business_month_ends(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    let mut out = Vec::new();
    let mut cursor = start.with_day(1);
    while let Some(first) = cursor.filter(|d| *d <= end) {
        if let Some(me) = last_business_day_of_month(first) {
            if me >= start && me <= end {
                out.push(me);
            }
        }
        cursor = last_day_of_month(first.year(), first.month()).map(|d| d + Duration::days(1));
    }
    out
}

/// Trading days are taken over a window extended past `end` until it reaches a
/// trading day, so a month whose true last session lies after `end` never
/// reports an earlier session as its month-end.
fn trading_month_ends(
    start: NaiveDate,
    end: NaiveDate,
    exchange: &str,
    calendar: &dyn TradingCalendar,
) -> Result<Vec<NaiveDate>, CalendarError> {
    let mut buffered = next_business_day(end);
    while !calendar.is_trading_day(exchange, buffered)? {
        if (buffered - end).num_days() > MAX_BUFFER_DAYS {
            break;
        }
        buffered = next_business_day(buffered);
    }

    let days = calendar.trading_days(exchange, start, buffered)?;
    let mut month_ends: Vec<NaiveDate> = Vec::new();
    for d in days {
        match month_ends.last_mut() {
            Some(last) if (last.year(), last.month()) == (d.year(), d.month()) => *last = d,
            _ => month_ends.push(d),
        }
    }
    month_ends.retain(|d| *d >= start && *d <= end);
    Ok(month_ends)
}

fn next_business_day(date: NaiveDate) -> NaiveDate {
    let mut d = date + Duration::days(1);
    while !is_business_day(d) {
        d += Duration::days(1);
    }
    d
}

/// Most recent month-end (last business day of a month) strictly before `today`.
pub fn previous_month_end(today: NaiveDate) -> NaiveDate {
    match last_business_day_of_month(today) {
        Some(me) if me < today => me,
        _ => {
            let prev = today.with_day(1).unwrap_or(today) - Duration::days(1);
            last_business_day_of_month(prev).unwrap_or(prev)
        }
    }
}
