use std::collections::BTreeMap;

pub type TagSet = BTreeMap<String, String>;

/// Split a multi-valued tag (`cafe;bar`) into its trimmed parts.
pub fn split_values(value: &str) -> Vec<&str> {
    let mut parts: Vec<&str> = value.split(';').map(|part| part.trim()).collect();
    parts.sort_unstable();
    parts.dedup();
    parts
}

pub fn has_value(tags: &TagSet, key: &str, value: &str) -> bool {
    tags.get(key)
        .map(|present| split_values(present).contains(&value))
        .unwrap_or(false)
}

pub fn has_tag(tags: &TagSet, key: &str) -> bool {
    tags.get(key).map(|value| !value.is_empty()).unwrap_or(false)
}

#[cfg(test)]
pub(crate) fn tags_from_pairs<'a, I>(pairs: I) -> TagSet
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    pairs
        .into_iter()
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect()
}
