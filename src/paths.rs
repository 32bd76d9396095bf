use std::path::{Path, PathBuf};

/// Directory segments for a normalized key: its first `depth` alphanumeric
/// characters, uppercased, one directory level per character. Keys with
/// fewer alphanumeric characters shard shallower, never error.
pub fn shard_segments(key: &str, depth: usize) -> Vec<String> {
    key.chars()
        .filter(char::is_ascii_alphanumeric)
        .take(depth)
        .map(|c| c.to_ascii_uppercase().to_string())
        .collect()
}

/// Full artifact path: `root/<SEG>/.../<key>.<ext>`. Pure; does not consult
/// the filesystem.
pub fn resolve(root: &Path, key: &str, depth: usize, ext: &str) -> PathBuf {
    let mut path = root.to_path_buf();
    for segment in shard_segments(key, depth) {
        path.push(segment);
    }
    path.push(format!("{key}.{ext}"));
    path
}
