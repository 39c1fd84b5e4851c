use log::{debug, info};
use std::borrow::Cow;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

pub const DEFAULT_NAME_MAX_LENGTH: usize = 100;

/// Search form of a name: decomposed, with combining marks removed.
pub fn simplify(name: &str) -> String {
    let simple: String = name.nfd().filter(|c| !is_combining_mark(*c)).collect();
    if simple != name {
        debug!("{name} -> {simple}");
    }
    simple
}

/// Cut `name` to `max_length` characters and mark the cut with an ellipsis.
pub fn truncate(name: &str, max_length: usize) -> Cow<'_, str> {
    if name.chars().count() <= max_length {
        return Cow::Borrowed(name);
    }
    let mut truncated: String = name.chars().take(max_length).collect();
    truncated.push('…');
    info!("truncating long name '{name}' to '{truncated}'");
    Cow::Owned(truncated)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_diacritics() {
        assert_eq!(simplify("Café Müller"), "Cafe Muller");
        assert_eq!(simplify("Łódź"), "Łodz");
        assert_eq!(simplify("Straße"), "Straße");
        assert_eq!(simplify("Oak Street"), "Oak Street");
    }

    #[test]
    fn truncates_by_characters() {
        assert_eq!(truncate("Gold Star", 100), "Gold Star");
        assert_eq!(truncate("Gold Star", 9), "Gold Star");
        assert_eq!(truncate("Gold Star", 4), "Gold…");
        assert_eq!(truncate("Ärztehaus", 3), "Ärz…");
        assert!(matches!(truncate("Kiosk", 5), Cow::Borrowed(_)));
    }
}
