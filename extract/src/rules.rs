use crate::category::Category;
use crate::tags::{split_values, TagSet};
use log::debug;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Condition {
    Always,
    HasKey(String),
    HasValue(String, String),
}

impl Condition {
    pub fn new(key: Option<String>, value: Option<String>) -> Self {
        match (key, value) {
            (Some(key), Some(value)) => Self::HasValue(key, value),
            (Some(key), None) => Self::HasKey(key),
            _ => Self::Always,
        }
    }

    fn passes(&self, tags: &TagSet) -> bool {
        match self {
            Self::Always => true,
            Self::HasKey(key) => tags.contains_key(key),
            Self::HasValue(key, value) => tags
                .get(key)
                .map(|present| split_values(present).contains(&value.as_str()))
                .unwrap_or(false),
        }
    }
}

#[derive(Debug)]
pub struct RuleNode {
    condition: Condition,
    mappings: HashMap<String, HashMap<String, Arc<Category>>>,
    children: Vec<RuleNode>,
}

impl RuleNode {
    pub fn root() -> Self {
        Self::new(Condition::Always)
    }

    pub fn new(condition: Condition) -> Self {
        Self {
            condition,
            mappings: HashMap::new(),
            children: Vec::new(),
        }
    }

    pub fn condition(&self) -> &Condition {
        &self.condition
    }

    /// Map `key=value` to `category` at this node. A later mapping of the
    /// same pair replaces the earlier one.
    pub fn add_mapping(&mut self, key: &str, value: &str, category: Arc<Category>) {
        self.mappings
            .entry(key.to_string())
            .or_default()
            .insert(value.to_string(), category);
    }

    pub fn add_child(&mut self, child: RuleNode) {
        self.children.push(child);
    }

    pub fn children(&self) -> &[RuleNode] {
        &self.children
    }

    pub fn evaluate(&self, tags: &TagSet) -> BTreeSet<Arc<Category>> {
        if !self.condition.passes(tags) {
            return BTreeSet::new();
        }

        let mut found = self.apply_mappings(tags);
        for child in &self.children {
            found.extend(child.evaluate(tags));
        }
        found
    }

    fn apply_mappings(&self, tags: &TagSet) -> BTreeSet<Arc<Category>> {
        let mut found = BTreeSet::new();
        let mut multiple = false;
        for (key, value) in tags {
            let Some(mapping) = self.mappings.get(key) else {
                continue;
            };
            let values = split_values(value);
            if values.len() > 1 {
                multiple = true;
            }
            for value in values {
                let Some(category) = mapping.get(value) else {
                    continue;
                };
                if category.requires_name() && !has_name(category, tags) {
                    continue;
                }
                found.insert(Arc::clone(category));
            }
        }
        if multiple {
            debug!("multiple values: {tags:?}");
        }
        found
    }
}

fn has_name(category: &Category, tags: &TagSet) -> bool {
    category
        .name_keys()
        .into_iter()
        .any(|key| tags.contains_key(key))
}
