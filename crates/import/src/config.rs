use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::date::DateFormat;
use crate::rules::{KeywordRule, KeywordRuleEngine};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to parse TOML: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Invalid rule pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
    #[error("Invalid setting: {0}")]
    Invalid(String),
}

/// Static tables and knobs for one import run. Every field has a default, so
/// a TOML file only needs to name what it overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportConfig {
    /// Date order tried first for every row.
    pub primary_format: DateFormat,
    /// Data rows inspected by the column classifier.
    pub sample_rows: usize,
    /// Failed rows shown in the correction preview.
    pub preview_rows: usize,
    /// Longest cell still considered an amount.
    pub amount_max_len: usize,
    pub income_category: String,
    pub fallback_category: String,
    pub default_subcategory: String,
    pub category_header_synonyms: Vec<String>,
    pub noise_prefixes: Vec<String>,
    pub placeholder_descriptions: Vec<String>,
    pub palette: Vec<String>,
    pub rules: Vec<KeywordRule>,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            primary_format: DateFormat::Ymd,
            sample_rows: 5,
            preview_rows: 3,
            amount_max_len: 20,
            income_category: "Salary".to_string(),
            fallback_category: "Other".to_string(),
            default_subcategory: "Other".to_string(),
            category_header_synonyms: strings(&[
                "category", "categoria", "kategorie", "catégorie", "type", "tipo", "typ",
            ]),
            noise_prefixes: strings(&[
                "payment", "pmt", "card", "purchase", "pos", "transaction", "trx", "transfer",
                "tfr", "debit", "credit", "direct", "online", "contactless", "sepa", "visa",
                "mastercard",
            ]),
            placeholder_descriptions: strings(&[
                "-", "n/a", "na", "none", "unknown", "no description", "description",
            ]),
            palette: strings(&[
                "#ef4444", "#f97316", "#eab308", "#22c55e", "#14b8a6", "#3b82f6", "#8b5cf6",
                "#ec4899", "#64748b",
            ]),
            rules: default_rules(),
        }
    }
}

impl ImportConfig {
    pub fn from_toml(toml_content: &str) -> Result<Self, ConfigError> {
        let config: ImportConfig = toml::from_str(toml_content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.fallback_category.trim().is_empty() {
            return Err(ConfigError::Invalid("fallback_category must not be blank".into()));
        }
        if self.income_category.trim().is_empty() {
            return Err(ConfigError::Invalid("income_category must not be blank".into()));
        }
        if self.default_subcategory.trim().is_empty() {
            return Err(ConfigError::Invalid("default_subcategory must not be blank".into()));
        }
        if self.sample_rows == 0 {
            return Err(ConfigError::Invalid("sample_rows must be at least 1".into()));
        }
        KeywordRuleEngine::new(self.rules.clone())?;
        Ok(())
    }

    pub fn is_placeholder(&self, description: &str) -> bool {
        let d = description.trim().to_lowercase();
        self.placeholder_descriptions.iter().any(|p| p.to_lowercase() == d)
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn default_rules() -> Vec<KeywordRule> {
    [
        ("supermarket", "Groceries"),
        ("grocery", "Groceries"),
        ("bakery", "Groceries"),
        ("restaurant", "Dining"),
        ("cafe", "Dining"),
        ("coffee", "Dining"),
        ("pizza", "Dining"),
        ("mortgage", "Housing"),
        ("landlord", "Housing"),
        ("electricity", "Utilities"),
        ("internet", "Utilities"),
        ("mobile", "Utilities"),
        ("fuel", "Transport"),
        ("petrol", "Transport"),
        ("parking", "Transport"),
        ("railway", "Transport"),
        ("pharmacy", "Health"),
        ("dentist", "Health"),
        ("netflix", "Subscriptions"),
        ("spotify", "Subscriptions"),
        ("cinema", "Entertainment"),
        ("insurance", "Insurance"),
    ]
    .into_iter()
    .map(|(keyword, category)| KeywordRule::contains(keyword, category))
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::MatchType;

    #[test]
    fn defaults_are_valid() {
        let c = ImportConfig::default();
        assert!(c.validate().is_ok());
        assert_eq!(c.primary_format, DateFormat::Ymd);
        assert_eq!(c.sample_rows, 5);
        assert_eq!(c.preview_rows, 3);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let c = ImportConfig::from_toml(
            r#"
            primary_format = "DD-MM-YYYY"
            fallback_category = "Uncategorized"
            "#,
        )
        .unwrap();
        assert_eq!(c.primary_format, DateFormat::Dmy);
        assert_eq!(c.fallback_category, "Uncategorized");
        assert_eq!(c.income_category, "Salary");
        assert!(!c.rules.is_empty());
    }

    #[test]
    fn toml_rules_replace_the_table() {
        let c = ImportConfig::from_toml(
            r#"
            [[rules]]
            keyword = "uber"
            category = "Transport"

            [[rules]]
            keyword = "^amzn"
            category = "Shopping"
            match_type = "regex"
            "#,
        )
        .unwrap();
        assert_eq!(c.rules.len(), 2);
        assert_eq!(c.rules[0].match_type, MatchType::Contains);
        assert_eq!(c.rules[1].match_type, MatchType::Regex);
    }

    #[test]
    fn invalid_regex_rule_is_an_error() {
        let result = ImportConfig::from_toml(
            r#"
            [[rules]]
            keyword = "(oops"
            category = "X"
            match_type = "regex"
            "#,
        );
        assert!(matches!(result, Err(ConfigError::InvalidPattern { .. })));
    }

    #[test]
    fn blank_fallback_is_rejected() {
        let result = ImportConfig::from_toml(r#"fallback_category = "  ""#);
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn malformed_toml_is_an_error() {
        assert!(matches!(ImportConfig::from_toml("sample_rows = ["), Err(ConfigError::Toml(_))));
    }

    #[test]
    fn placeholder_check_is_case_insensitive() {
        let c = ImportConfig::default();
        assert!(c.is_placeholder(" N/A "));
        assert!(c.is_placeholder("-"));
        assert!(!c.is_placeholder("Uber trip"));
    }
}
