use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

use crate::config::ImportConfig;
use crate::ingest::RawTable;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnRole {
    Date,
    Amount,
    Description,
    Category,
    Skip,
}

impl fmt::Display for ColumnRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ColumnRole::Date => "date",
            ColumnRole::Amount => "amount",
            ColumnRole::Description => "description",
            ColumnRole::Category => "category",
            ColumnRole::Skip => "skip",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for ColumnRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "date" => Ok(ColumnRole::Date),
            "amount" => Ok(ColumnRole::Amount),
            "description" | "desc" => Ok(ColumnRole::Description),
            "category" => Ok(ColumnRole::Category),
            "skip" => Ok(ColumnRole::Skip),
            other => Err(format!("Unknown column role: '{other}'")),
        }
    }
}

/// A role for every column of the table, `Skip` unless stated otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMapping {
    roles: Vec<ColumnRole>,
}

impl ColumnMapping {
    pub fn all_skip(columns: usize) -> Self {
        Self { roles: vec![ColumnRole::Skip; columns] }
    }

    pub fn from_roles(roles: Vec<ColumnRole>) -> Self {
        Self { roles }
    }

    pub fn len(&self) -> usize {
        self.roles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }

    pub fn roles(&self) -> &[ColumnRole] {
        &self.roles
    }

    pub fn role(&self, column: usize) -> ColumnRole {
        self.roles.get(column).copied().unwrap_or(ColumnRole::Skip)
    }

    /// Returns false when `column` is outside the table.
    pub fn set(&mut self, column: usize, role: ColumnRole) -> bool {
        match self.roles.get_mut(column) {
            Some(slot) => {
                *slot = role;
                true
            }
            None => false,
        }
    }

    /// First column carrying `role`.
    pub fn column_for(&self, role: ColumnRole) -> Option<usize> {
        self.roles.iter().position(|r| *r == role)
    }
}

// ── Cell shapes ───────────────────────────────────────────────────────────────

macro_rules! re {
    ($name:ident, $pat:expr) => {
        fn $name() -> &'static Regex {
            static R: OnceLock<Regex> = OnceLock::new();
            R.get_or_init(|| Regex::new($pat).expect("invalid regex"))
        }
    };
}

re!(re_date_year_first, r"^\d{4}[-./]\d{1,2}[-./]\d{1,2}");
re!(re_date_day_first, r"^\d{1,2}[-./]\d{1,2}[-./]\d{2,4}");
re!(re_digits, r"^\d+$");
re!(re_amount,
    r"^\(?[-+]?\s*(?:[A-Z]{3}\s*|[$€£¥₹])?\s*[-+]?\d[\d.,' ]*(?:\s*(?:[A-Z]{3}|[$€£¥₹]))?-?\)?$");

fn is_date_shaped(cell: &str) -> bool {
    re_date_year_first().is_match(cell) || re_date_day_first().is_match(cell)
}

fn is_amount_shaped(cell: &str, max_len: usize) -> bool {
    cell.chars().count() <= max_len && re_amount().is_match(cell)
}

/// Suggests a role per column from a few sampled rows.
pub struct ColumnClassifier<'a> {
    config: &'a ImportConfig,
}

impl<'a> ColumnClassifier<'a> {
    pub fn new(config: &'a ImportConfig) -> Self {
        Self { config }
    }

    /// Never fails: columns nothing claims stay `Skip`, and the result always
    /// has one entry per column of the widest sampled row.
    pub fn classify(&self, table: &RawTable, has_header: bool) -> ColumnMapping {
        let columns = table.column_count();
        let mut mapping = ColumnMapping::all_skip(columns);

        let header = if has_header { table.rows.first() } else { None };
        let data_start = usize::from(has_header);
        let sample: Vec<_> = table
            .rows
            .iter()
            .skip(data_start)
            .take(self.config.sample_rows)
            .collect();

        let mut longest: Option<(usize, usize)> = None;
        for col in 0..columns {
            let cell = sample
                .iter()
                .filter_map(|row| row.get(col))
                .map(|c| c.trim())
                .find(|c| !c.is_empty())
                .unwrap_or("");
            let header_text = header
                .and_then(|h| h.get(col))
                .map(|h| h.trim().to_lowercase())
                .unwrap_or_default();

            let role = if cell.is_empty() {
                None
            } else if is_date_shaped(cell) {
                Some(ColumnRole::Date)
            } else if re_digits().is_match(cell) {
                Some(ColumnRole::Skip)
            } else if is_amount_shaped(cell, self.config.amount_max_len) {
                Some(ColumnRole::Amount)
            } else {
                None
            };
            let role = role.or_else(|| {
                self.is_category_header(&header_text).then_some(ColumnRole::Category)
            });

            match role {
                Some(role) => {
                    mapping.set(col, role);
                }
                None => {
                    let len = cell.chars().count();
                    if len > 0 && longest.map_or(true, |(_, best)| len > best) {
                        longest = Some((col, len));
                    }
                }
            }
        }

        if let Some((col, _)) = longest {
            mapping.set(col, ColumnRole::Description);
        }
        tracing::debug!(roles = ?mapping.roles(), "suggested column mapping");
        mapping
    }

    fn is_category_header(&self, header: &str) -> bool {
        !header.is_empty()
            && self
                .config
                .category_header_synonyms
                .iter()
                .any(|s| header.contains(&s.to_lowercase()))
    }
}

/// Guess whether the first row is a header: it has cells, and none of them
/// looks like a date or an amount.
pub fn looks_like_header(row: &[String], config: &ImportConfig) -> bool {
    let cells: Vec<&str> = row.iter().map(|c| c.trim()).filter(|c| !c.is_empty()).collect();
    !cells.is_empty()
        && cells.iter().all(|c| {
            !is_date_shaped(c) && !re_digits().is_match(c) && !is_amount_shaped(c, config.amount_max_len)
        })
}
