use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::money::Money;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    Income,
    Expense,
}

impl TransactionType {
    /// Positive amounts are income; zero and negative amounts are expenses.
    pub fn from_signed(amount: Decimal) -> Self {
        if amount > Decimal::ZERO {
            TransactionType::Income
        } else {
            TransactionType::Expense
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionType::Income => write!(f, "INCOME"),
            TransactionType::Expense => write!(f, "EXPENSE"),
        }
    }
}

/// A normalized transaction as handed to the persistence layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: String,
    /// Local date-time, always at noon for imported rows.
    pub date: NaiveDateTime,
    /// Never negative; direction is carried by `kind`.
    pub amount: Money,
    pub description: String,
    #[serde(rename = "type")]
    pub kind: TransactionType,
    pub category_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subcategory_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn noon(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d).unwrap().and_hms_opt(12, 0, 0).unwrap()
    }

    #[test]
    fn type_from_signed_amount() {
        assert_eq!(TransactionType::from_signed(Decimal::new(300000, 2)), TransactionType::Income);
        assert_eq!(TransactionType::from_signed(Decimal::new(-4550, 2)), TransactionType::Expense);
        assert_eq!(TransactionType::from_signed(Decimal::ZERO), TransactionType::Expense);
    }

    #[test]
    fn serializes_with_external_field_names() {
        let tx = Transaction {
            id: "t-1".to_string(),
            date: noon(2024, 1, 20),
            amount: Money::from_cents(4550),
            description: "Grocery Store".to_string(),
            kind: TransactionType::Expense,
            category_id: "c-1".to_string(),
            subcategory_id: None,
        };
        let value = serde_json::to_value(&tx).unwrap();
        assert_eq!(value["date"], "2024-01-20T12:00:00");
        assert_eq!(value["amount"], 45.5);
        assert_eq!(value["type"], "EXPENSE");
        assert_eq!(value["categoryId"], "c-1");
        assert!(value.get("subcategoryId").is_none());
    }

    #[test]
    fn display_matches_wire_names() {
        assert_eq!(TransactionType::Income.to_string(), "INCOME");
        assert_eq!(TransactionType::Expense.to_string(), "EXPENSE");
    }
}
