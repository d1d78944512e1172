use std::collections::HashMap;

use pocketbook_core::{name_key, CategoryItem, IdGenerator, Subcategory, TransactionType};

use crate::config::ImportConfig;

const FALLBACK_COLOR: &str = "#64748b";

/// Copy-on-write view over the existing categories for one import run.
///
/// Existing categories are only read. The first time a run touches one, a
/// clone is stored in the run map and every later lookup (and every new
/// subcategory) goes to that clone. Unknown names become new categories.
pub struct CategoryResolver<'a> {
    existing: &'a [CategoryItem],
    config: &'a ImportConfig,
    materialized: Vec<CategoryItem>,
    index: HashMap<String, usize>,
}

impl<'a> CategoryResolver<'a> {
    pub fn new(existing: &'a [CategoryItem], config: &'a ImportConfig) -> Self {
        Self {
            existing,
            config,
            materialized: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Blank names resolve to the fallback category.
    pub fn resolve<G: IdGenerator>(
        &mut self,
        raw_name: &str,
        kind: TransactionType,
        ids: &mut G,
    ) -> &CategoryItem {
        let idx = self.resolve_index(raw_name, kind, ids);
        &self.materialized[idx]
    }

    /// Resolves the category, then the named subcategory inside it. Returns
    /// `None` for a blank subcategory name.
    pub fn resolve_subcategory<G: IdGenerator>(
        &mut self,
        category_name: &str,
        kind: TransactionType,
        raw_sub: &str,
        ids: &mut G,
    ) -> Option<&Subcategory> {
        let idx = self.resolve_index(category_name, kind, ids);
        let sub_name = raw_sub.trim();
        if sub_name.is_empty() {
            return None;
        }
        let key = name_key(sub_name);
        let category = &mut self.materialized[idx];
        let pos = match category.subcategories.iter().position(|s| name_key(&s.name) == key) {
            Some(pos) => pos,
            None => {
                tracing::debug!(category = %category.name, subcategory = sub_name, "creating subcategory");
                category.subcategories.push(Subcategory {
                    id: ids.next_id(),
                    name: sub_name.to_string(),
                });
                category.subcategories.len() - 1
            }
        };
        category.subcategories.get(pos)
    }

    /// Categories touched during this run, in first-touch order.
    pub fn materialized(&self) -> &[CategoryItem] {
        &self.materialized
    }

    pub fn into_deltas(self) -> Vec<CategoryItem> {
        self.materialized
    }

    fn resolve_index<G: IdGenerator>(&mut self, raw_name: &str, kind: TransactionType, ids: &mut G) -> usize {
        let trimmed = raw_name.trim();
        let name = if trimmed.is_empty() {
            self.config.fallback_category.trim()
        } else {
            trimmed
        };
        let key = name_key(name);
        if let Some(&idx) = self.index.get(&key) {
            return idx;
        }

        let item = match self.existing.iter().find(|c| c.key() == key) {
            Some(found) => {
                tracing::debug!(category = %found.name, id = %found.id, "cloning existing category");
                found.clone()
            }
            None => {
                tracing::debug!(category = name, %kind, "creating category");
                CategoryItem {
                    id: ids.next_id(),
                    name: name.to_string(),
                    kind,
                    color: self.pick_color(&key),
                    is_system: false,
                    is_included_in_savings: None,
                    subcategories: vec![Subcategory {
                        id: ids.next_id(),
                        name: self.config.default_subcategory.clone(),
                    }],
                }
            }
        };
        self.materialized.push(item);
        let idx = self.materialized.len() - 1;
        self.index.insert(key, idx);
        idx
    }

    fn pick_color(&self, key: &str) -> String {
        if self.config.palette.is_empty() {
            return FALLBACK_COLOR.to_string();
        }
        let hash = key.bytes().fold(0usize, |acc, b| acc.wrapping_mul(31).wrapping_add(b as usize));
        self.config.palette[hash % self.config.palette.len()].clone()
    }
}
