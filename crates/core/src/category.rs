use serde::{Deserialize, Serialize};

use super::transaction::TransactionType;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subcategory {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryItem {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: TransactionType,
    pub color: String,
    #[serde(default)]
    pub is_system: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_included_in_savings: Option<bool>,
    #[serde(default)]
    pub subcategories: Vec<Subcategory>,
}

impl CategoryItem {
    /// Case-insensitive identity of this category.
    pub fn key(&self) -> String {
        name_key(&self.name)
    }

    pub fn find_subcategory(&self, name: &str) -> Option<&Subcategory> {
        let key = name_key(name);
        self.subcategories.iter().find(|s| name_key(&s.name) == key)
    }
}

/// Lookup key for category and subcategory names: trimmed and lower-cased.
pub fn name_key(name: &str) -> String {
    name.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn food() -> CategoryItem {
        CategoryItem {
            id: "c-1".to_string(),
            name: "Food".to_string(),
            kind: TransactionType::Expense,
            color: "#ef4444".to_string(),
            is_system: false,
            is_included_in_savings: None,
            subcategories: vec![Subcategory { id: "s-1".to_string(), name: "Groceries".to_string() }],
        }
    }

    #[test]
    fn key_ignores_case_and_padding() {
        assert_eq!(name_key("  Food "), "food");
        assert_eq!(food().key(), name_key("FOOD"));
    }

    #[test]
    fn find_subcategory_case_insensitive() {
        let c = food();
        assert_eq!(c.find_subcategory(" groceries").map(|s| s.id.as_str()), Some("s-1"));
        assert!(c.find_subcategory("Dining").is_none());
    }

    #[test]
    fn deserializes_camel_case_with_defaults() {
        let json = r##"{"id":"c-9","name":"Salary","type":"INCOME","color":"#22c55e","isIncludedInSavings":true}"##;
        let c: CategoryItem = serde_json::from_str(json).unwrap();
        assert_eq!(c.kind, TransactionType::Income);
        assert!(!c.is_system);
        assert_eq!(c.is_included_in_savings, Some(true));
        assert!(c.subcategories.is_empty());
    }
}
