use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

/// Extension for cached raw page markup
pub const RAW_MARKUP_EXT: &str = "wtxt";

/// Extension for cached derived structured data
pub const STRUCTURED_DATA_EXT: &str = "json";

/// Maximum length of a normalized cache key, in characters
pub const MAX_KEY_LEN: usize = 200;

/// Default directory branching depth under the cache root
pub const DEFAULT_DIR_NESTING: usize = 3;

/// Maximum progress redraws per second during a split run
pub const PROGRESS_HZ: u8 = 10;

/// File name of the sealed index artifact inside the cache root
pub const INDEX_FILE_NAME: &str = "index.csv";

/// Windows reserved device names that may not be used as file names.
/// Each maps to its substitute key.
const RESERVED_NAMES: [&str; 22] = [
    "con", "prn", "aux", "nul", "com1", "com2", "com3", "com4", "com5", "com6", "com7", "com8",
    "com9", "lpt1", "lpt2", "lpt3", "lpt4", "lpt5", "lpt6", "lpt7", "lpt8", "lpt9",
];

/// Runtime settings, loadable from a JSON file. Every field has a default so
/// a missing or partial file still yields a usable configuration; CLI flags
/// override whatever is loaded.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Root directory of the page cache
    pub cache_dir: String,
    /// Directory branching depth under the cache root
    pub dir_nesting: usize,
    /// Reserved file names and their substitute keys
    pub disallowed_file_names: HashMap<String, String>,
    /// Write fetched raw markup and converted structured data back through
    /// the cache
    pub cache_pulls: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            cache_dir: "./wikipedia".to_string(),
            dir_nesting: DEFAULT_DIR_NESTING,
            disallowed_file_names: default_disallowed_names(),
            cache_pulls: true,
        }
    }
}

impl Settings {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file: {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse settings file: {}", path.display()))
    }
}

/// Reserved names substitute to `<name>_`, which is itself a stable key.
pub fn default_disallowed_names() -> HashMap<String, String> {
    RESERVED_NAMES
        .iter()
        .map(|name| (name.to_string(), format!("{name}_")))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn defaults_are_usable() {
        let settings = Settings::default();
        assert_eq!(settings.dir_nesting, DEFAULT_DIR_NESTING);
        assert!(settings.disallowed_file_names.contains_key("con"));
        assert_eq!(settings.disallowed_file_names["nul"], "nul_");
    }

    #[test]
    fn load_merges_partial_file_over_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"cache_dir": "/data/pages", "dir_nesting": 2}}"#).unwrap();
        let settings = Settings::load(file.path()).unwrap();
        assert_eq!(settings.cache_dir, "/data/pages");
        assert_eq!(settings.dir_nesting, 2);
        // untouched fields keep their defaults
        assert!(settings.cache_pulls);
        assert!(settings.disallowed_file_names.contains_key("com1"));
    }

    #[test]
    fn load_fails_for_missing_file() {
        assert!(Settings::load(Path::new("/nonexistent/settings.json")).is_err());
    }

    #[test]
    fn load_fails_for_invalid_json() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert!(Settings::load(file.path()).is_err());
    }
}
