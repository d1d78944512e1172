use serde::Serialize;
use std::collections::HashMap;

use pocketbook_core::{name_key, TransactionType};

use crate::candidate::ValidItem;
use crate::config::ImportConfig;

/// Uncategorized expenses that share a description signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupedTransaction {
    pub signature: String,
    pub example_description: String,
    /// Source rows of the members.
    pub member_ids: Vec<usize>,
    pub proposed_category_name: String,
    pub proposed_subcategory_name: Option<String>,
    pub enabled: bool,
}

impl GroupedTransaction {
    pub fn count(&self) -> usize {
        self.member_ids.len()
    }
}

pub struct PatternGrouper<'a> {
    config: &'a ImportConfig,
}

impl<'a> PatternGrouper<'a> {
    pub fn new(config: &'a ImportConfig) -> Self {
        Self { config }
    }

    /// Two leading meaningful words of a description, or `None` when the
    /// result is shorter than three characters.
    pub fn signature(&self, description: &str) -> Option<String> {
        let normalized: String = description
            .to_lowercase()
            .chars()
            .map(|c| if c.is_alphanumeric() || c.is_whitespace() { c } else { ' ' })
            .collect();
        let tokens: Vec<&str> = normalized
            .split_whitespace()
            .skip_while(|t| self.is_noise(t))
            .take(2)
            .collect();
        let signature = tokens.join(" ");
        (signature.chars().count() >= 3).then_some(signature)
    }

    /// Groups with more than one member, largest first.
    pub fn detect(&self, items: &[ValidItem]) -> Vec<GroupedTransaction> {
        let fallback = name_key(&self.config.fallback_category);
        let mut groups: Vec<GroupedTransaction> = Vec::new();
        let mut by_signature: HashMap<String, usize> = HashMap::new();

        for item in items {
            if item.kind != TransactionType::Expense || name_key(&item.category_name) != fallback {
                continue;
            }
            let description = item.description().trim();
            if description.is_empty() || self.config.is_placeholder(description) {
                continue;
            }
            let Some(signature) = self.signature(description) else {
                continue;
            };
            match by_signature.get(&signature) {
                Some(&idx) => groups[idx].member_ids.push(item.source_row()),
                None => {
                    by_signature.insert(signature.clone(), groups.len());
                    groups.push(GroupedTransaction {
                        signature,
                        example_description: description.to_string(),
                        member_ids: vec![item.source_row()],
                        proposed_category_name: self.config.fallback_category.clone(),
                        proposed_subcategory_name: None,
                        enabled: true,
                    });
                }
            }
        }

        groups.retain(|g| g.count() > 1);
        groups.sort_by(|a, b| b.count().cmp(&a.count()));
        tracing::debug!(groups = groups.len(), "detected repeated descriptions");
        groups
    }

    fn is_noise(&self, token: &str) -> bool {
        token.chars().all(|c| c.is_ascii_digit())
            || self.config.noise_prefixes.iter().any(|p| p.eq_ignore_ascii_case(token))
    }
}

/// Moves members of enabled groups to the group's category. Returns how many
/// items changed hands. Disabled groups are ignored entirely.
pub fn apply_groups(items: &mut [ValidItem], groups: &[GroupedTransaction]) -> usize {
    let by_row: HashMap<usize, usize> = items
        .iter()
        .enumerate()
        .map(|(idx, item)| (item.source_row(), idx))
        .collect();
    let mut moved = 0;
    for group in groups.iter().filter(|g| g.enabled) {
        let category = group.proposed_category_name.trim();
        if category.is_empty() {
            continue;
        }
        let subcategory = group
            .proposed_subcategory_name
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        for row in &group.member_ids {
            if let Some(&idx) = by_row.get(row) {
                items[idx].category_name = category.to_string();
                items[idx].subcategory_name = subcategory.clone();
                moved += 1;
            }
        }
    }
    moved
}
