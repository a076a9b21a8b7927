//! Campaign date handling. Calendar dates only, no time component.

use chrono::NaiveDate;

use crate::error::Error;
use crate::MAX_RANGE_DAYS;

pub fn parse_date(s: &str) -> Result<NaiveDate, Error> {
    let s = s.trim();
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|_| Error::InvalidInput(format!("'{s}' is not YYYY-MM-DD")))
}

/// Inclusive range, at most `MAX_RANGE_DAYS` long
pub fn expand_range(from: NaiveDate, to: NaiveDate) -> Result<Vec<NaiveDate>, Error> {
    if from > to {
        let msg = format!("range starts after it ends: {from}..{to}");
        return Err(Error::InvalidInput(msg));
    }
    let span = (to - from).num_days() + 1;
    if span > MAX_RANGE_DAYS {
        return Err(Error::InvalidInput(format!(
            "range of {} days exceeds {} days",
            span, MAX_RANGE_DAYS
        )));
    }
    Ok(from.iter_days().take(span as usize).collect())
}

/// Sorted, deduplicated
pub fn normalize(dates: &[NaiveDate]) -> Vec<NaiveDate> {
    let mut out = dates.to_vec();
    out.sort();
    out.dedup();
    out
}

/// Parses a list of ISO strings. Empty lists are rejected.
pub fn parse_dates<S: AsRef<str>>(dates: &[S]) -> Result<Vec<NaiveDate>, Error> {
    if dates.is_empty() {
        return Err(Error::InvalidInput("at least one date is required".into()));
    }
    let parsed = dates
        .iter()
        .map(|d| parse_date(d.as_ref()))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(normalize(&parsed))
}

/// CLI form: `2025-06-01,2025-06-03` or `2025-06-01..2025-06-07`
pub fn parse_date_arg(arg: &str) -> Result<Vec<NaiveDate>, Error> {
    if let Some((from, to)) = arg.split_once("..") {
        return expand_range(parse_date(from)?, parse_date(to)?);
    }
    let parts: Vec<&str> = arg.split(',').filter(|s| !s.trim().is_empty()).collect();
    parse_dates(&parts)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        parse_date(s).unwrap()
    }

    #[test]
    fn parses_lists_and_ranges() {
        let arg = "2025-06-03, 2025-06-01,2025-06-03";
        let listed = parse_date_arg(arg).unwrap();
        assert_eq!(listed, vec![d("2025-06-01"), d("2025-06-03")]);
        let week = parse_date_arg("2025-06-28..2025-07-02").unwrap();
        assert_eq!(week.len(), 5);
        assert_eq!(week[4], d("2025-07-02"));
    }

    #[test]
    fn rejects_bad_input() {
        assert!(parse_date("2025-6-1x").is_err());
        assert!(parse_date("2025-02-30").is_err());
        assert!(parse_date_arg("").is_err());
        assert!(parse_date_arg("2025-06-05..2025-06-01").is_err());
        assert!(parse_dates::<&str>(&[]).is_err());
        assert!(expand_range(d("2024-01-01"), d("2025-01-01")).is_err());
        let leap_year = expand_range(d("2024-01-01"), d("2024-12-31")).unwrap();
        assert_eq!(leap_year.len(), 366);
    }
}
