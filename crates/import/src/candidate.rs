use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::Serialize;
use std::str::FromStr;

use pocketbook_core::{Money, TransactionType};

use crate::classify::{ColumnMapping, ColumnRole};
use crate::date::{parse_strict, DateFormat};
use crate::ingest::RawRow;
use crate::rules::CategoryNamer;

/// One source row read through a confirmed mapping, before its date is checked.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParsedCandidate {
    /// Index of the row in the ingested table (header included).
    pub source_row: usize,
    pub date_str: String,
    pub signed_amount: Decimal,
    pub description: String,
    pub category_raw: String,
}

impl ParsedCandidate {
    pub fn from_row(row: &RawRow, source_row: usize, mapping: &ColumnMapping) -> Self {
        let cell = |role: ColumnRole| -> String {
            mapping
                .column_for(role)
                .and_then(|col| row.get(col))
                .map(|s| s.trim().to_string())
                .unwrap_or_default()
        };
        Self {
            source_row,
            date_str: cell(ColumnRole::Date),
            signed_amount: parse_amount(&cell(ColumnRole::Amount)).unwrap_or(Decimal::ZERO),
            description: cell(ColumnRole::Description),
            category_raw: cell(ColumnRole::Category),
        }
    }

    /// Zero amount and no date: a spacer or summary line, not a transaction.
    pub fn is_blank(&self) -> bool {
        self.signed_amount.is_zero() && self.date_str.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidItem {
    pub candidate: ParsedCandidate,
    pub date: NaiveDateTime,
    pub kind: TransactionType,
    pub amount: Money,
    pub category_name: String,
    pub subcategory_name: Option<String>,
}

impl ValidItem {
    pub fn new(candidate: ParsedCandidate, date: NaiveDateTime, namer: &CategoryNamer) -> Self {
        let kind = TransactionType::from_signed(candidate.signed_amount);
        let category_name = namer.name_for(&candidate.category_raw, &candidate.description, kind);
        Self {
            amount: Money::from_decimal(candidate.signed_amount).abs(),
            candidate,
            date,
            kind,
            category_name,
            subcategory_name: None,
        }
    }

    pub fn source_row(&self) -> usize {
        self.candidate.source_row
    }

    pub fn description(&self) -> &str {
        &self.candidate.description
    }
}

/// A row whose date did not parse under the primary format.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailedRow {
    pub candidate: ParsedCandidate,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Partition {
    pub valid: Vec<ValidItem>,
    pub failed: Vec<FailedRow>,
    pub blank: usize,
}

/// Splits every data row into valid, failed or blank. Rows before
/// `first_data_row` (the header) are not read.
pub fn partition(
    rows: &[RawRow],
    first_data_row: usize,
    mapping: &ColumnMapping,
    format: DateFormat,
    namer: &CategoryNamer,
) -> Partition {
    let mut out = Partition::default();
    for (idx, row) in rows.iter().enumerate().skip(first_data_row) {
        let candidate = ParsedCandidate::from_row(row, idx, mapping);
        if candidate.is_blank() {
            out.blank += 1;
            continue;
        }
        match parse_strict(&candidate.date_str, format) {
            Some(date) => out.valid.push(ValidItem::new(candidate, date, namer)),
            None => out.failed.push(FailedRow { candidate }),
        }
    }
    out
}

/// Lenient amount parser for bank exports.
///
/// Handles currency symbols and codes, accounting parentheses, and both
/// `1,234.56` and `1.234,56` separator styles. A lone comma followed by one
/// or two digits is a decimal comma.
pub fn parse_amount(s: &str) -> Option<Decimal> {
    let s = s.trim();
    let (negative, s) = match s.strip_prefix('(').and_then(|v| v.strip_suffix(')')) {
        Some(inner) => (true, inner),
        None => (false, s),
    };
    let cleaned: String = s
        .chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, '.' | ',' | '-' | '+'))
        .collect();
    let (trailing_minus, cleaned) = match cleaned.strip_suffix('-') {
        Some(rest) => (true, rest.to_string()),
        None => (false, cleaned),
    };

    let normalized = match (cleaned.rfind('.'), cleaned.rfind(',')) {
        (Some(dot), Some(comma)) if comma > dot => cleaned.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => cleaned.replace(',', ""),
        (None, Some(comma)) => {
            let decimals = cleaned.len() - comma - 1;
            if cleaned.matches(',').count() == 1 && (1..=2).contains(&decimals) {
                cleaned.replace(',', ".")
            } else {
                cleaned.replace(',', "")
            }
        }
        _ => cleaned,
    };
    let normalized = normalized.strip_prefix('+').unwrap_or(&normalized);
    if normalized.is_empty() {
        return None;
    }

    let mut dec = Decimal::from_str(normalized).ok()?;
    if negative || trailing_minus {
        dec = -dec;
    }
    Some(dec)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ImportConfig;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn row(cells: &[&str]) -> RawRow {
        cells.iter().map(|s| s.to_string()).collect()
    }

    fn mapping() -> ColumnMapping {
        ColumnMapping::from_roles(vec![
            ColumnRole::Date,
            ColumnRole::Description,
            ColumnRole::Amount,
        ])
    }

    fn namer() -> CategoryNamer {
        CategoryNamer::from_config(&ImportConfig::default()).unwrap()
    }

    // ── parse_amount ──────────────────────────────────────────────────────────

    #[test]
    fn parse_amount_plain() {
        assert_eq!(parse_amount("123.45"), Some(dec("123.45")));
        assert_eq!(parse_amount("-45.50"), Some(dec("-45.50")));
        assert_eq!(parse_amount("+10"), Some(dec("10")));
    }

    #[test]
    fn parse_amount_with_currency() {
        assert_eq!(parse_amount("$99.99"), Some(dec("99.99")));
        assert_eq!(parse_amount("12,50 €"), Some(dec("12.50")));
        assert_eq!(parse_amount("EUR -3.20"), Some(dec("-3.20")));
    }

    #[test]
    fn parse_amount_separators() {
        assert_eq!(parse_amount("1,234.56"), Some(dec("1234.56")));
        assert_eq!(parse_amount("1.234,56"), Some(dec("1234.56")));
        assert_eq!(parse_amount("1,234"), Some(dec("1234")));
        assert_eq!(parse_amount("1,234,567"), Some(dec("1234567")));
    }

    #[test]
    fn parse_amount_negative_forms() {
        assert_eq!(parse_amount("(75.25)"), Some(dec("-75.25")));
        assert_eq!(parse_amount("75.25-"), Some(dec("-75.25")));
    }

    #[test]
    fn parse_amount_invalid() {
        assert_eq!(parse_amount(""), None);
        assert_eq!(parse_amount("n/a"), None);
        assert_eq!(parse_amount("1.2.3"), None);
    }

    // ── rows ──────────────────────────────────────────────────────────────────

    #[test]
    fn candidate_reads_mapped_cells() {
        let c = ParsedCandidate::from_row(&row(&["2024-01-15", " Salary ", "3000.00"]), 1, &mapping());
        assert_eq!(c.date_str, "2024-01-15");
        assert_eq!(c.description, "Salary");
        assert_eq!(c.signed_amount, dec("3000.00"));
        assert_eq!(c.category_raw, "");
        assert_eq!(c.source_row, 1);
    }

    #[test]
    fn short_rows_read_as_empty() {
        let c = ParsedCandidate::from_row(&row(&["2024-01-15"]), 3, &mapping());
        assert_eq!(c.description, "");
        assert!(c.signed_amount.is_zero());
        assert!(!c.is_blank());
    }

    #[test]
    fn valid_item_derives_type_and_abs_amount() {
        let c = ParsedCandidate::from_row(&row(&["2024-01-20", "Grocery Store", "-45.50"]), 2, &mapping());
        let date = parse_strict("2024-01-20", DateFormat::Ymd).unwrap();
        let v = ValidItem::new(c, date, &namer());
        assert_eq!(v.kind, TransactionType::Expense);
        assert_eq!(v.amount, Money::from_cents(4550));
        assert_eq!(v.category_name, "Groceries");
        assert_eq!(v.subcategory_name, None);
    }

    #[test]
    fn partition_is_exclusive() {
        let rows = vec![
            row(&["Date", "Desc", "Amount"]),
            row(&["2024-01-15", "Salary", "3000.00"]),
            row(&["31-01-2024", "Rent", "-900"]),
            row(&["", "Balance carried", "0.00"]),
            row(&["", "", ""]),
            row(&["2024-01-20", "Grocery Store", "-45.50"]),
        ];
        let p = partition(&rows, 1, &mapping(), DateFormat::Ymd, &namer());
        assert_eq!(p.valid.len(), 2);
        assert_eq!(p.failed.len(), 1);
        assert_eq!(p.blank, 2);
        assert_eq!(p.valid.len() + p.failed.len() + p.blank, rows.len() - 1);
        assert_eq!(p.failed[0].candidate.source_row, 2);
    }

    #[test]
    fn zero_amount_with_date_is_not_blank() {
        let rows = vec![row(&["2024-01-15", "Fee waived", "0"])];
        let p = partition(&rows, 0, &mapping(), DateFormat::Ymd, &namer());
        assert_eq!(p.valid.len(), 1);
        assert_eq!(p.valid[0].kind, TransactionType::Expense);
    }
}
