//! Name normalization shared by the alias index and the matcher.

/// Endings where a trailing "s" is part of the word, not a plural marker.
const NON_PLURAL_ENDINGS: &[&str] = &["ss", "us"];

/// A singular stem must keep strictly more than this many characters.
const MIN_STEM_CHARS: usize = 3;

/// Lowercases, trims and collapses internal whitespace to single spaces.
pub fn normalize_name(raw: &str) -> String {
    raw.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Drops a trailing plural "s" from an already normalized name.
///
/// Returns `None` when the name does not look like a plural: it doesn't end
/// in "s", it ends in one of [`NON_PLURAL_ENDINGS`] ("hummus", "glass"), or
/// the whole stem would be left with 3 characters or fewer ("eggs").
pub fn singular_form(normalized: &str) -> Option<&str> {
    let stem = normalized.strip_suffix('s')?;
    if NON_PLURAL_ENDINGS.iter().any(|ending| normalized.ends_with(ending)) {
        return None;
    }
    if stem.chars().count() <= MIN_STEM_CHARS {
        return None;
    }
    Some(stem)
}

/// The forms a normalized name is matched under, most literal first.
pub fn name_forms(normalized: &str) -> Vec<&str> {
    let mut forms = vec![normalized];
    if let Some(stem) = singular_form(normalized) {
        forms.push(stem);
    }
    forms
}

/// Alias derived from a canonical key, e.g. `chicken_breast` -> `chicken breast`.
pub fn key_as_phrase(key: &str) -> String {
    normalize_name(&key.replace('_', " "))
}
