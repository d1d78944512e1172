use chrono::{Days, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::candidate::FailedRow;

/// Field order of a date string. A parse mode, not a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DateFormat {
    #[default]
    #[serde(rename = "YYYY-MM-DD", alias = "ymd")]
    Ymd,
    #[serde(rename = "DD-MM-YYYY", alias = "dmy")]
    Dmy,
    #[serde(rename = "MM-DD-YYYY", alias = "mdy")]
    Mdy,
}

impl DateFormat {
    /// Order in which alternatives are offered when scores tie.
    pub const ALL: [DateFormat; 3] = [DateFormat::Dmy, DateFormat::Mdy, DateFormat::Ymd];

    pub fn label(self) -> &'static str {
        match self {
            DateFormat::Ymd => "YYYY-MM-DD",
            DateFormat::Dmy => "DD-MM-YYYY",
            DateFormat::Mdy => "MM-DD-YYYY",
        }
    }
}

impl fmt::Display for DateFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl std::str::FromStr for DateFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ymd" | "yyyy-mm-dd" => Ok(DateFormat::Ymd),
            "dmy" | "dd-mm-yyyy" => Ok(DateFormat::Dmy),
            "mdy" | "mm-dd-yyyy" => Ok(DateFormat::Mdy),
            other => Err(format!("Unknown date format: '{other}'")),
        }
    }
}

/// Parses `raw` under exactly one field order.
///
/// Only the leading date token is read, so `2024-01-15 08:30` and
/// `2024-01-15T08:30:00Z` are accepted. The token must split on `.`, `-` or
/// `/` into three all-digit parts with month in 1..=12, day in 1..=31 and a
/// year in 2000..=2100 once two-digit years are lifted by 2000. Days past the
/// end of the month are not rejected; they roll into the following month.
///
/// The result sits at 12:00 local time so later UTC conversion cannot move it
/// to the previous day.
pub fn parse_strict(raw: &str, format: DateFormat) -> Option<NaiveDateTime> {
    let token = raw
        .trim()
        .split(|c: char| c.is_whitespace() || c == 'T')
        .next()?;
    let parts: Vec<&str> = token.split(['.', '-', '/']).collect();
    if parts.len() != 3 {
        return None;
    }
    let mut nums = [0u32; 3];
    for (slot, part) in nums.iter_mut().zip(&parts) {
        if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        *slot = part.parse().ok()?;
    }

    let (day, month, year) = match format {
        DateFormat::Ymd => (nums[2], nums[1], nums[0]),
        DateFormat::Dmy => (nums[0], nums[1], nums[2]),
        DateFormat::Mdy => (nums[1], nums[0], nums[2]),
    };
    if !(1..=12).contains(&month) || !(1..=31).contains(&day) {
        return None;
    }
    let year = if year < 100 { year + 2000 } else { year };
    if !(2000..=2100).contains(&year) {
        return None;
    }

    let first = NaiveDate::from_ymd_opt(i32::try_from(year).ok()?, month, 1)?;
    first
        .checked_add_days(Days::new(u64::from(day - 1)))?
        .and_hms_opt(12, 0, 0)
}

/// The alternative to `primary` that rescues the most failed rows.
pub fn propose_secondary(primary: DateFormat, failed: &[FailedRow]) -> DateFormat {
    let mut best: Option<(DateFormat, usize)> = None;
    for format in DateFormat::ALL.into_iter().filter(|f| *f != primary) {
        let score = failed
            .iter()
            .filter(|row| parse_strict(&row.candidate.date_str, format).is_some())
            .count();
        if best.map_or(true, |(_, s)| score > s) {
            best = Some((format, score));
        }
    }
    best.map(|(f, _)| f).unwrap_or(DateFormat::Dmy)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatePreview {
    pub source_row: usize,
    pub raw: String,
    pub parsed: Option<NaiveDateTime>,
}

/// Re-parses the first `limit` failed rows under `format`.
pub fn preview(failed: &[FailedRow], format: DateFormat, limit: usize) -> Vec<DatePreview> {
    failed
        .iter()
        .take(limit)
        .map(|row| DatePreview {
            source_row: row.candidate.source_row,
            raw: row.candidate.date_str.clone(),
            parsed: parse_strict(&row.candidate.date_str, format),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candidate::ParsedCandidate;
    use chrono::{Datelike, Timelike};
    use rust_decimal::Decimal;

    fn ymd(raw: &str, format: DateFormat) -> Option<(i32, u32, u32)> {
        parse_strict(raw, format).map(|d| (d.year(), d.month(), d.day()))
    }

    fn failed(date: &str, row: usize) -> FailedRow {
        FailedRow {
            candidate: ParsedCandidate {
                source_row: row,
                date_str: date.to_string(),
                signed_amount: Decimal::ONE,
                description: String::new(),
                category_raw: String::new(),
            },
        }
    }

    // ── parse_strict ──────────────────────────────────────────────────────────

    #[test]
    fn iso_round_trips() {
        assert_eq!(ymd("2024-01-31", DateFormat::Ymd), Some((2024, 1, 31)));
    }

    #[test]
    fn day_first_and_month_first() {
        assert_eq!(ymd("31-01-2024", DateFormat::Dmy), Some((2024, 1, 31)));
        assert_eq!(ymd("01/31/2024", DateFormat::Mdy), Some((2024, 1, 31)));
        assert_eq!(ymd("15.03.2024", DateFormat::Dmy), Some((2024, 3, 15)));
    }

    #[test]
    fn every_format_round_trips() {
        let years: Vec<i32> = (2000..=2100).step_by(7).chain([2100]).collect();
        for format in DateFormat::ALL {
            for &y in &years {
                for m in 1..=12u32 {
                    for d in 1..=28u32 {
                        let raw = match format {
                            DateFormat::Ymd => format!("{y:04}-{m:02}-{d:02}"),
                            DateFormat::Dmy => format!("{d:02}.{m:02}.{y:04}"),
                            DateFormat::Mdy => format!("{m:02}/{d:02}/{y:04}"),
                        };
                        assert_eq!(ymd(&raw, format), Some((y, m, d)), "{raw} under {format}");
                    }
                }
            }
        }
    }

    #[test]
    fn result_is_at_noon() {
        let d = parse_strict("2024-06-01", DateFormat::Ymd).unwrap();
        assert_eq!((d.hour(), d.minute(), d.second()), (12, 0, 0));
    }

    #[test]
    fn day_first_string_fails_under_iso() {
        // year 31 → 2031, day 2024 → out of range
        assert_eq!(parse_strict("31-01-2024", DateFormat::Ymd), None);
    }

    #[test]
    fn two_digit_years_are_lifted() {
        assert_eq!(ymd("05/02/24", DateFormat::Dmy), Some((2024, 2, 5)));
    }

    #[test]
    fn year_range_enforced() {
        assert_eq!(parse_strict("1999-12-31", DateFormat::Ymd), None);
        assert_eq!(parse_strict("2101-01-01", DateFormat::Ymd), None);
        assert!(parse_strict("2100-12-31", DateFormat::Ymd).is_some());
    }

    #[test]
    fn month_and_day_ranges_enforced() {
        assert_eq!(parse_strict("2024-13-01", DateFormat::Ymd), None);
        assert_eq!(parse_strict("2024-00-10", DateFormat::Ymd), None);
        assert_eq!(parse_strict("2024-01-32", DateFormat::Ymd), None);
        assert_eq!(parse_strict("2024-01-00", DateFormat::Ymd), None);
    }

    #[test]
    fn day_past_month_end_rolls_forward() {
        assert_eq!(ymd("31-04-2024", DateFormat::Dmy), Some((2024, 5, 1)));
        assert_eq!(ymd("2023-02-30", DateFormat::Ymd), Some((2023, 3, 2)));
    }

    #[test]
    fn time_suffix_is_ignored() {
        assert_eq!(ymd("2024-01-15 08:30", DateFormat::Ymd), Some((2024, 1, 15)));
        assert_eq!(ymd("2024-01-15T08:30:00Z", DateFormat::Ymd), Some((2024, 1, 15)));
    }

    #[test]
    fn garbage_is_none_not_panic() {
        for raw in [
            "", " ", "abc", "2024-01", "2024-01-15-01", "2024--15", "20a4-01-15", "-1-01-2024",
            "99999999999999999999-01-01", "💸-01-01", "T", "2024/1/", "+5-01-2024",
        ] {
            for format in DateFormat::ALL {
                assert_eq!(parse_strict(raw, format), None, "{raw:?} under {format}");
            }
        }
    }

    // ── secondary format ──────────────────────────────────────────────────────

    #[test]
    fn proposes_format_that_rescues_most_rows() {
        let rows = vec![failed("31-01-2024", 0), failed("13-02-2024", 1)];
        assert_eq!(propose_secondary(DateFormat::Ymd, &rows), DateFormat::Dmy);

        let rows = vec![failed("01-31-2024", 0), failed("02-13-2024", 1)];
        assert_eq!(propose_secondary(DateFormat::Ymd, &rows), DateFormat::Mdy);
    }

    #[test]
    fn proposal_never_repeats_primary() {
        let rows = vec![failed("garbage", 0)];
        assert_eq!(propose_secondary(DateFormat::Dmy, &rows), DateFormat::Mdy);
        assert_eq!(propose_secondary(DateFormat::Ymd, &rows), DateFormat::Dmy);
    }

    #[test]
    fn preview_is_limited_and_reparsed() {
        let rows = vec![
            failed("31-01-2024", 4),
            failed("nope", 5),
            failed("01-02-2024", 6),
            failed("02-02-2024", 7),
        ];
        let p = preview(&rows, DateFormat::Dmy, 3);
        assert_eq!(p.len(), 3);
        assert_eq!(p[0].source_row, 4);
        assert!(p[0].parsed.is_some());
        assert!(p[1].parsed.is_none());

        let p = preview(&rows, DateFormat::Ymd, 3);
        assert!(p.iter().all(|row| row.parsed.is_none()));
    }

    #[test]
    fn format_parses_from_cli_names() {
        assert_eq!("dmy".parse::<DateFormat>().unwrap(), DateFormat::Dmy);
        assert_eq!("YYYY-MM-DD".parse::<DateFormat>().unwrap(), DateFormat::Ymd);
        assert!("yyyy".parse::<DateFormat>().is_err());
    }
}
