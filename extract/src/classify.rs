use crate::category::{Category, CategoryRegistry, OTHER, OTHER_SHOPS};
use crate::config::PoiConfig;
use crate::ignore::IgnorePolicy;
use crate::rules::RuleNode;
use crate::tags::TagSet;
use log::warn;
use std::collections::BTreeSet;
use std::sync::Arc;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MappingResult {
    name: Option<String>,
    categories: BTreeSet<Arc<Category>>,
}

impl MappingResult {
    fn new(name: Option<String>, categories: BTreeSet<Arc<Category>>) -> Self {
        Self { name, categories }
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    #[cfg(test)]
    pub(crate) fn identifiers(&self) -> Vec<&str> {
        self.categories
            .iter()
            .map(|category| category.identifier())
            .collect()
    }

    pub fn is_fallback(&self) -> bool {
        self.categories
            .iter()
            .all(|category| matches!(category.identifier(), OTHER | OTHER_SHOPS))
    }

    #[cfg(test)]
    pub(crate) fn uses_name(&self) -> bool {
        self.categories.iter().any(|category| category.uses_name())
    }

    pub fn into_parts(self) -> (Option<String>, BTreeSet<Arc<Category>>) {
        (self.name, self.categories)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Fallback {
    Shop,
    Leisure,
    Building,
    Generic,
}

pub struct Classifier {
    registry: CategoryRegistry,
    root: RuleNode,
    ignore: IgnorePolicy,
    other: Arc<Category>,
    other_shops: Arc<Category>,
}

impl Classifier {
    pub fn new(config: PoiConfig) -> Self {
        let (registry, root, ignore) = config.into_parts();
        let other = registry.fallback(OTHER);
        let other_shops = registry.fallback(OTHER_SHOPS);
        Self {
            registry,
            root,
            ignore,
            other,
            other_shops,
        }
    }

    pub fn registry(&self) -> &CategoryRegistry {
        &self.registry
    }

    pub fn classify(&self, tags: &TagSet) -> Vec<MappingResult> {
        let found = self.root.evaluate(tags);
        if found.is_empty() {
            return self.fallback(tags).into_iter().collect();
        }

        split_single(found)
            .into_iter()
            .map(|group| {
                let name = resolve_name(&group, tags);
                MappingResult::new(name, group)
            })
            .collect()
    }

    pub fn fallback_branch(&self, tags: &TagSet) -> Option<Fallback> {
        if tags.contains_key("shop") {
            Some(Fallback::Shop)
        } else if tags.contains_key("leisure") {
            Some(Fallback::Leisure)
        } else if tags.contains_key("building") {
            Some(Fallback::Building)
        } else if !self.ignore.should_ignore(tags) {
            Some(Fallback::Generic)
        } else {
            None
        }
    }

    fn fallback(&self, tags: &TagSet) -> Option<MappingResult> {
        let category = match self.fallback_branch(tags)? {
            Fallback::Shop => Arc::clone(&self.other_shops),
            Fallback::Leisure | Fallback::Building | Fallback::Generic => {
                Arc::clone(&self.other)
            }
        };
        let name = tags.get("name").cloned();
        if name.is_none() && category.requires_name() {
            return None;
        }
        Some(MappingResult::new(name, BTreeSet::from([category])))
    }
}

/// One group per force-single category, then one group with the rest.
fn split_single(found: BTreeSet<Arc<Category>>) -> Vec<BTreeSet<Arc<Category>>> {
    let (single, rest): (BTreeSet<_>, BTreeSet<_>) = found
        .into_iter()
        .partition(|category| category.is_force_single());

    let mut groups: Vec<BTreeSet<Arc<Category>>> = single
        .into_iter()
        .map(|category| BTreeSet::from([category]))
        .collect();
    if !rest.is_empty() {
        groups.push(rest);
    }
    groups
}

fn resolve_name(group: &BTreeSet<Arc<Category>>, tags: &TagSet) -> Option<String> {
    let mut custom = group
        .iter()
        .filter_map(|category| category.custom_name_keys().map(|keys| (category, keys)));

    // Groups iterate in identifier order, so the smallest identifier wins.
    let keys: Vec<&str> = match custom.next() {
        Some((first, keys)) => {
            if custom.any(|(_, other)| other != keys) {
                warn!(
                    "conflicting name keys in {:?}, using those of {}",
                    group
                        .iter()
                        .map(|category| category.identifier())
                        .collect::<Vec<_>>(),
                    first.identifier()
                );
            }
            keys.iter().map(|key| key.as_str()).collect()
        }
        None => vec!["name"],
    };

    keys.into_iter()
        .find_map(|key| tags.get(key))
        .cloned()
}
