use crate::tags::TagSet;
use regex::Regex;
use std::collections::{HashMap, HashSet};

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum IgnoreMode {
    #[default]
    OnMatch,
    /// Ignore every tag set. Matches the legacy importer.
    Always,
}

impl IgnoreMode {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "on-match" => Some(Self::OnMatch),
            "always" => Some(Self::Always),
            _ => None,
        }
    }
}

#[derive(Debug, Default)]
struct IgnoreEntry {
    exact: HashSet<String>,
    folded: HashSet<String>,
    patterns: Vec<Regex>,
}

impl IgnoreEntry {
    fn matches(&self, value: &str) -> bool {
        if self.exact.contains(value) {
            return true;
        }
        if self.folded.contains(&value.to_lowercase()) {
            return true;
        }
        self.patterns.iter().any(|pattern| pattern.is_match(value))
    }
}

#[derive(Debug, Default)]
pub struct IgnorePolicy {
    entries: HashMap<String, IgnoreEntry>,
    mode: IgnoreMode,
}

impl IgnorePolicy {
    pub fn new(mode: IgnoreMode) -> Self {
        Self {
            entries: HashMap::new(),
            mode,
        }
    }

    pub fn mode(&self) -> IgnoreMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: IgnoreMode) {
        self.mode = mode;
    }

    pub fn add_value(&mut self, key: &str, value: &str, case_insensitive: bool) {
        let entry = self.entries.entry(key.to_string()).or_default();
        if case_insensitive {
            entry.folded.insert(value.to_lowercase());
        } else {
            entry.exact.insert(value.to_string());
        }
    }

    pub fn add_pattern(&mut self, key: &str, pattern: &str) -> Result<(), regex::Error> {
        let regex = Regex::new(&format!("^(?:{pattern})$"))?;
        self.entries
            .entry(key.to_string())
            .or_default()
            .patterns
            .push(regex);
        Ok(())
    }

    pub fn matches(&self, key: &str, value: &str) -> bool {
        self.entries
            .get(key)
            .map(|entry| entry.matches(value))
            .unwrap_or(false)
    }

    pub fn should_ignore(&self, tags: &TagSet) -> bool {
        let matched = tags.iter().any(|(key, value)| self.matches(key, value));
        match self.mode {
            IgnoreMode::OnMatch => matched,
            IgnoreMode::Always => true,
        }
    }
}
