use serde::{Deserialize, Serialize};

use pocketbook_core::TransactionType;

use crate::config::{ConfigError, ImportConfig};

/// One row of the keyword → category table. Rules are tried in table order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordRule {
    pub keyword: String,
    pub category: String,
    #[serde(default)]
    pub match_type: MatchType,
}

impl KeywordRule {
    pub fn contains(keyword: &str, category: &str) -> Self {
        Self {
            keyword: keyword.to_string(),
            category: category.to_string(),
            match_type: MatchType::Contains,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    #[default]
    Contains,
    Exact,
    Regex,
}

impl std::str::FromStr for MatchType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "contains" => Ok(MatchType::Contains),
            "exact" => Ok(MatchType::Exact),
            "regex" => Ok(MatchType::Regex),
            other => Err(format!("Unknown match type: '{other}'")),
        }
    }
}

/// Internal pairing of a rule with its precompiled regex (if applicable).
struct CompiledRule {
    rule: KeywordRule,
    compiled_regex: Option<regex::Regex>,
}

pub struct KeywordRuleEngine {
    rules: Vec<CompiledRule>,
}

impl KeywordRuleEngine {
    pub fn new(rules: Vec<KeywordRule>) -> Result<Self, ConfigError> {
        let rules = rules
            .into_iter()
            .map(|rule| {
                let compiled_regex = match rule.match_type {
                    MatchType::Regex => Some(
                        regex::RegexBuilder::new(&rule.keyword)
                            .case_insensitive(true)
                            .build()
                            .map_err(|source| ConfigError::InvalidPattern {
                                pattern: rule.keyword.clone(),
                                source,
                            })?,
                    ),
                    _ => None,
                };
                Ok(CompiledRule { rule, compiled_regex })
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;
        Ok(Self { rules })
    }

    /// First rule in table order whose keyword matches `description`.
    pub fn find_matching_rule(&self, description: &str) -> Option<&KeywordRule> {
        let text = description.to_lowercase();
        self.rules
            .iter()
            .find(|cr| rule_matches(cr, &text, description))
            .map(|cr| &cr.rule)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

fn rule_matches(cr: &CompiledRule, lowered: &str, original: &str) -> bool {
    let pattern = cr.rule.keyword.to_lowercase();
    if pattern.is_empty() {
        return false;
    }
    match cr.rule.match_type {
        MatchType::Contains => lowered.contains(&pattern),
        MatchType::Exact => lowered.trim() == pattern.trim(),
        MatchType::Regex => cr
            .compiled_regex
            .as_ref()
            .is_some_and(|re| re.is_match(original)),
    }
}

/// Picks the category name for a row before any category records exist.
pub struct CategoryNamer {
    engine: KeywordRuleEngine,
    income_category: String,
    fallback_category: String,
}

impl CategoryNamer {
    pub fn from_config(config: &ImportConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            engine: KeywordRuleEngine::new(config.rules.clone())?,
            income_category: config.income_category.clone(),
            fallback_category: config.fallback_category.clone(),
        })
    }

    /// An explicit category cell always wins. Without one, income goes to the
    /// salary-like default and expenses go through the keyword table.
    pub fn name_for(&self, category_raw: &str, description: &str, kind: TransactionType) -> String {
        let explicit = category_raw.trim();
        if !explicit.is_empty() {
            return explicit.to_string();
        }
        match kind {
            TransactionType::Income => self.income_category.clone(),
            TransactionType::Expense => self
                .engine
                .find_matching_rule(description)
                .map(|r| r.category.clone())
                .unwrap_or_else(|| self.fallback_category.clone()),
        }
    }

    pub fn fallback_category(&self) -> &str {
        &self.fallback_category
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_rule(keyword: &str, match_type: MatchType, category: &str) -> KeywordRule {
        KeywordRule {
            keyword: keyword.to_string(),
            category: category.to_string(),
            match_type,
        }
    }

    fn engine(rules: Vec<KeywordRule>) -> KeywordRuleEngine {
        KeywordRuleEngine::new(rules).unwrap()
    }

    // ── KeywordRuleEngine ─────────────────────────────────────────────────────

    #[test]
    fn contains_match_case_insensitive() {
        let e = engine(vec![make_rule("whole foods", MatchType::Contains, "Groceries")]);
        assert!(e.find_matching_rule("WHOLE FOODS MARKET 123").is_some());
        assert!(e.find_matching_rule("STARBUCKS").is_none());
    }

    #[test]
    fn exact_match() {
        let e = engine(vec![make_rule("starbucks", MatchType::Exact, "Dining")]);
        assert!(e.find_matching_rule("STARBUCKS").is_some());
        assert!(e.find_matching_rule("STARBUCKS RESERVE").is_none());
    }

    #[test]
    fn regex_match() {
        let e = engine(vec![make_rule(r"^amzn|amazon", MatchType::Regex, "Shopping")]);
        assert!(e.find_matching_rule("AMAZON MARKETPLACE").is_some());
        assert!(e.find_matching_rule("AMZN*PRIME").is_some());
        assert!(e.find_matching_rule("WHOLE FOODS").is_none());
    }

    #[test]
    fn invalid_regex_is_rejected() {
        let result = KeywordRuleEngine::new(vec![make_rule("(unclosed", MatchType::Regex, "X")]);
        assert!(matches!(result, Err(ConfigError::InvalidPattern { .. })));
    }

    #[test]
    fn first_rule_in_table_order_wins() {
        let e = engine(vec![
            make_rule("store", MatchType::Contains, "Shopping"),
            make_rule("grocery", MatchType::Contains, "Groceries"),
        ]);
        let rule = e.find_matching_rule("Grocery Store").unwrap();
        assert_eq!(rule.category, "Shopping");
    }

    #[test]
    fn empty_keyword_never_matches() {
        let e = engine(vec![make_rule("", MatchType::Contains, "Everything")]);
        assert!(e.find_matching_rule("anything").is_none());
    }

    #[test]
    fn match_type_from_str() {
        assert_eq!("Regex".parse::<MatchType>().unwrap(), MatchType::Regex);
        assert!("fuzzy".parse::<MatchType>().is_err());
    }

    // ── CategoryNamer ─────────────────────────────────────────────────────────

    fn namer() -> CategoryNamer {
        CategoryNamer::from_config(&ImportConfig::default()).unwrap()
    }

    #[test]
    fn explicit_category_wins() {
        let n = namer();
        assert_eq!(n.name_for("  Travel ", "Grocery Store", TransactionType::Expense), "Travel");
        assert_eq!(n.name_for("Bonus", "", TransactionType::Income), "Bonus");
    }

    #[test]
    fn income_defaults_to_salary() {
        assert_eq!(namer().name_for("", "ACME PAYROLL", TransactionType::Income), "Salary");
    }

    #[test]
    fn expense_uses_keyword_table_then_fallback() {
        let n = namer();
        assert_eq!(n.name_for("", "Grocery Store", TransactionType::Expense), "Groceries");
        assert_eq!(n.name_for("", "UBER TRIP #123", TransactionType::Expense), "Other");
        assert_eq!(n.fallback_category(), "Other");
    }
}
