use crate::config::{self, MAX_KEY_LEN};
use deunicode::deunicode;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

/// Runs of characters outside the allowed set collapse to one separator.
/// Whitespace is deliberately excluded from the allowed set so that titles
/// differing only in separator style land on the same key.
static CLEANER: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^A-Za-z0-9()_.\-]+").unwrap());

/// A key must lead with an alphanumeric character or the separator.
static LEADING: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[^A-Za-z0-9]").unwrap());

/// Case-insensitive table of names that may not be used as cache keys
/// (OS-reserved file names). Matching keys are substituted wholesale.
#[derive(Debug, Clone)]
pub struct DisallowedNames {
    map: HashMap<String, String>,
}

impl DisallowedNames {
    /// Table entries are matched against already-folded keys, so the names
    /// are lowercased on the way in. Substitutes should themselves be valid
    /// keys or re-normalization will not be a fixed point.
    pub fn new(map: HashMap<String, String>) -> Self {
        Self {
            map: map
                .into_iter()
                .map(|(name, sub)| (name.to_lowercase(), sub))
                .collect(),
        }
    }

    pub fn substitute(&self, key: String) -> String {
        match self.map.get(&key) {
            Some(replacement) => replacement.clone(),
            None => key,
        }
    }
}

impl Default for DisallowedNames {
    fn default() -> Self {
        Self::new(config::default_disallowed_names())
    }
}

/// Maps an arbitrary title to its filesystem-safe cache key.
///
/// Transliterates to ASCII, trims, collapses disallowed runs to `_`, forces
/// a `_` lead when the first character is not alphanumeric, truncates to
/// [`MAX_KEY_LEN`], folds to lowercase, then substitutes reserved names.
/// Never fails; degenerate input maps to `"_"`. Idempotent.
pub fn normalize_title(title: &str, disallowed: &DisallowedNames) -> String {
    let ascii = deunicode(title);
    let cleaned = CLEANER.replace_all(ascii.trim(), "_");
    let cleaned = LEADING.replace(&cleaned, "_");

    let mut key: String = cleaned.chars().take(MAX_KEY_LEN).collect();
    key.make_ascii_lowercase();

    if key.is_empty() {
        return "_".to_string();
    }
    disallowed.substitute(key)
}
