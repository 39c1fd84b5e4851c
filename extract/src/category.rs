use log::{debug, info};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

pub const OTHER: &str = "other";
pub const OTHER_SHOPS: &str = "other-shops";

const DEFAULT_NAME_KEYS: [&str; 1] = ["name"];

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum NameRequirement {
    NoName,
    Optional,
    Required,
}

impl NameRequirement {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "none" => Some(Self::NoName),
            "maybe" => Some(Self::Optional),
            "required" => Some(Self::Required),
            _ => None,
        }
    }
}

/// A POI category. Two categories are the same category iff their
/// identifiers are equal.
#[derive(Clone, Debug)]
pub struct Category {
    identifier: String,
    name_requirement: NameRequirement,
    name_keys: Option<Vec<String>>,
    force_single: bool,
}

impl Category {
    pub fn new(
        identifier: impl Into<String>,
        name_requirement: NameRequirement,
        name_keys: Option<Vec<String>>,
        force_single: bool,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            name_requirement,
            name_keys,
            force_single,
        }
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn name_requirement(&self) -> NameRequirement {
        self.name_requirement
    }

    pub fn uses_name(&self) -> bool {
        self.name_requirement != NameRequirement::NoName
    }

    pub fn requires_name(&self) -> bool {
        self.name_requirement == NameRequirement::Required
    }

    pub fn is_force_single(&self) -> bool {
        self.force_single
    }

    pub fn custom_name_keys(&self) -> Option<&[String]> {
        self.name_keys.as_deref()
    }

    pub fn name_keys(&self) -> Vec<&str> {
        match &self.name_keys {
            Some(keys) => keys.iter().map(|key| key.as_str()).collect(),
            None => DEFAULT_NAME_KEYS.to_vec(),
        }
    }

    fn same_definition(&self, other: &Category) -> bool {
        self.name_requirement == other.name_requirement
            && self.name_keys == other.name_keys
            && self.force_single == other.force_single
    }
}

impl PartialEq for Category {
    fn eq(&self, other: &Self) -> bool {
        self.identifier == other.identifier
    }
}

impl Eq for Category {}

impl Hash for Category {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.identifier.hash(state);
    }
}

impl PartialOrd for Category {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Category {
    fn cmp(&self, other: &Self) -> Ordering {
        self.identifier.cmp(&other.identifier)
    }
}

/// Interns categories by identifier. Rules and results only ever hold the
/// instance stored here.
#[derive(Debug)]
pub struct CategoryRegistry {
    by_identifier: BTreeMap<String, Arc<Category>>,
    extra: Vec<String>,
}

impl Default for CategoryRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl CategoryRegistry {
    pub fn new() -> Self {
        let mut registry = Self {
            by_identifier: BTreeMap::new(),
            extra: Vec::new(),
        };
        registry.ensure_fallback(OTHER_SHOPS);
        registry.ensure_fallback(OTHER);
        registry
    }

    fn ensure_fallback(&mut self, identifier: &str) {
        if self.by_identifier.contains_key(identifier) {
            return;
        }
        info!("adding fallback category: {identifier}");
        let category = Category::new(identifier, NameRequirement::Optional, None, false);
        self.by_identifier
            .insert(identifier.to_string(), Arc::new(category));
        self.extra.push(identifier.to_string());
    }

    /// A configured definition replaces a fallback placeholder.
    pub fn register(&mut self, category: Category) -> Arc<Category> {
        if let Some(position) = self
            .extra
            .iter()
            .position(|identifier| identifier == category.identifier())
        {
            self.extra.remove(position);
            debug!("configured category {} replaces fallback", category.identifier());
            let category = Arc::new(category);
            self.by_identifier
                .insert(category.identifier().to_string(), Arc::clone(&category));
            return category;
        }
        if let Some(existing) = self.by_identifier.get(category.identifier()) {
            if !existing.same_definition(&category) {
                debug!(
                    "category {} redefined with different settings, keeping first definition",
                    category.identifier()
                );
            }
            return Arc::clone(existing);
        }
        let category = Arc::new(category);
        self.by_identifier
            .insert(category.identifier().to_string(), Arc::clone(&category));
        category
    }

    pub fn get(&self, identifier: &str) -> Option<Arc<Category>> {
        self.by_identifier.get(identifier).cloned()
    }

    pub fn fallback(&self, identifier: &str) -> Arc<Category> {
        match self.by_identifier.get(identifier) {
            Some(category) => Arc::clone(category),
            None => Arc::new(Category::new(
                identifier,
                NameRequirement::Optional,
                None,
                false,
            )),
        }
    }

    pub fn len(&self) -> usize {
        self.by_identifier.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_categories_always_exist() {
        let registry = CategoryRegistry::new();
        let other = registry.get(OTHER).unwrap();
        let shops = registry.get(OTHER_SHOPS).unwrap();
        assert_eq!(other.name_requirement(), NameRequirement::Optional);
        assert_eq!(shops.name_requirement(), NameRequirement::Optional);
        assert_eq!(registry.extra, vec!["other-shops", "other"]);
    }

    #[test]
    fn register_is_idempotent_by_identifier() {
        let mut registry = CategoryRegistry::new();
        let first = registry.register(Category::new(
            "restaurant",
            NameRequirement::Optional,
            None,
            false,
        ));
        let second = registry.register(Category::new(
            "restaurant",
            NameRequirement::Required,
            Some(vec!["brand".to_string()]),
            true,
        ));
        assert!(Arc::ptr_eq(&first, &second));
        assert!(!second.requires_name());
        assert!(Arc::ptr_eq(&first, &registry.get("restaurant").unwrap()));
    }

    #[test]
    fn configured_other_replaces_placeholder() {
        let mut registry = CategoryRegistry::new();
        let placeholder = registry.get(OTHER).unwrap();
        let configured =
            registry.register(Category::new(OTHER, NameRequirement::Required, None, true));
        assert_eq!(registry.extra, vec!["other-shops"]);
        assert!(!Arc::ptr_eq(&placeholder, &configured));
        assert!(registry.get(OTHER).unwrap().requires_name());
        assert!(registry.fallback(OTHER).is_force_single());

        let again = registry.register(Category::new(OTHER, NameRequirement::NoName, None, false));
        assert!(Arc::ptr_eq(&configured, &again));
        assert!(again.requires_name());
    }

    #[test]
    fn default_name_keys() {
        let plain = Category::new("cafe", NameRequirement::Optional, None, false);
        assert_eq!(plain.name_keys(), vec!["name"]);
        assert!(plain.custom_name_keys().is_none());

        let stop = Category::new(
            "bus-stop",
            NameRequirement::Required,
            Some(vec!["name".to_string(), "ref".to_string()]),
            false,
        );
        assert_eq!(stop.name_keys(), vec!["name", "ref"]);
        assert_eq!(NameRequirement::parse("none"), Some(NameRequirement::NoName));
        assert_eq!(NameRequirement::parse("bogus"), None);
    }
}
