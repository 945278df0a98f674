use crate::error::{LedgerError, Result};
use chrono::{Datelike, Days, NaiveDate};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

pub fn last_day_of_month(year: i32, month: u32) -> NaiveDate {
    let next_month = if month == 12 { 1 } else { month + 1 };
    let next_year = if month == 12 { year + 1 } else { year };

    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|d| d.checked_sub_days(Days::new(1)))
        .unwrap_or(NaiveDate::MAX)
}

pub fn month_end(date: NaiveDate) -> NaiveDate {
    last_day_of_month(date.year(), date.month())
}

/// ISO month key, e.g. "2024-02".
pub fn month_key(date: NaiveDate) -> String {
    date.format("%Y-%m").to_string()
}

pub fn iso_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

pub fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Exact decimal form of a stored amount, read from its shortest printed
/// representation so 1000.005 stays 1000.005.
pub fn to_decimal(value: f64) -> Result<Decimal> {
    if !value.is_finite() {
        return Err(LedgerError::InvalidAmount {
            context: "money value".to_string(),
            amount: value,
        });
    }
    value
        .to_string()
        .parse::<Decimal>()
        .map_err(|_| LedgerError::InvalidAmount {
            context: "money value out of range".to_string(),
            amount: value,
        })
}

pub fn from_decimal(value: Decimal) -> f64 {
    value.to_f64().unwrap_or_default()
}

/// Adds two amounts without binary drift.
pub fn add_money(a: f64, b: f64) -> Result<f64> {
    Ok(from_decimal(to_decimal(a)? + to_decimal(b)?))
}

pub fn approx_eq(a: f64, b: f64, tolerance: f64) -> bool {
    (a - b).abs() <= tolerance
}

/// Parses a period string in the format "YYYY-MM" or "YYYY-MM:YYYY-MM"
/// Returns (start_date, end_date)
pub fn parse_period_string(period: &str) -> Result<(NaiveDate, NaiveDate)> {
    let parts: Vec<&str> = period.split(':').collect();

    match parts.len() {
        1 => {
            let start = parse_month_start(parts[0])?;
            Ok((start, month_end(start)))
        }
        2 => {
            let start = parse_month_start(parts[0])?;
            let end = month_end(parse_month_start(parts[1])?);
            if end < start {
                return Err(LedgerError::DateError(format!(
                    "Period {} ends before it starts",
                    period
                )));
            }
            Ok((start, end))
        }
        _ => Err(LedgerError::DateError(format!(
            "Invalid period format: {}. Expected 'YYYY-MM' or 'YYYY-MM:YYYY-MM'",
            period
        ))),
    }
}

fn parse_month_start(month: &str) -> Result<NaiveDate> {
    let start_str = format!("{}-01", month.trim());
    NaiveDate::parse_from_str(&start_str, "%Y-%m-%d").map_err(|_| {
        LedgerError::DateError(format!(
            "Invalid date format in period: {}. Expected YYYY-MM",
            month
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_last_day_of_month() {
        assert_eq!(
            last_day_of_month(2023, 2),
            NaiveDate::from_ymd_opt(2023, 2, 28).unwrap()
        );
        assert_eq!(
            last_day_of_month(2024, 2),
            NaiveDate::from_ymd_opt(2024, 2, 29).unwrap()
        );
        assert_eq!(
            last_day_of_month(2023, 12),
            NaiveDate::from_ymd_opt(2023, 12, 31).unwrap()
        );
    }

    #[test]
    fn test_month_key() {
        let date = NaiveDate::from_ymd_opt(2024, 2, 9).unwrap();
        assert_eq!(month_key(date), "2024-02");
        assert_eq!(iso_date(date), "2024-02-09");
    }

    #[test]
    fn test_round_cents() {
        assert_eq!(round_cents(33.333333), 33.33);
        assert_eq!(round_cents(-0.004), 0.0);
        assert!(approx_eq(0.1 + 0.2, 0.3, 1e-9));
    }

    #[test]
    fn test_decimal_money_is_exact() {
        assert_eq!(to_decimal(1000.005).unwrap().to_string(), "1000.005");
        assert_eq!(add_money(0.1, 0.2).unwrap(), 0.3);
        assert_eq!(add_money(add_money(1000.005, -10.0).unwrap(), 10.0).unwrap(), 1000.005);
        assert!(to_decimal(f64::NAN).is_err());
        assert!(to_decimal(1e30).is_err());
    }

    #[test]
    fn test_parse_period_string_month_and_range() {
        let (start, end) = parse_period_string("2023-02").unwrap();
        assert_eq!(start, NaiveDate::from_ymd_opt(2023, 2, 1).unwrap());
        assert_eq!(end, NaiveDate::from_ymd_opt(2023, 2, 28).unwrap());

        let (start, end) = parse_period_string("2023-01:2023-03").unwrap();
        assert_eq!(start, NaiveDate::from_ymd_opt(2023, 1, 1).unwrap());
        assert_eq!(end, NaiveDate::from_ymd_opt(2023, 3, 31).unwrap());

        assert!(parse_period_string("2023-03:2023-01").is_err());
        assert!(parse_period_string("March").is_err());
    }
}
