/// Counters collected over one split run. The pipeline is single-threaded,
/// so these are plain fields updated in place by the driver.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SplitStats {
    /// Records pulled from the stream (after redirect filtering)
    pub records_seen: u64,
    /// Pages whose markup was physically written
    pub pages_written: u64,
    /// Writes skipped because the target already existed
    pub pages_skipped_existing: u64,
    /// Records carrying no revision text, skipped without writing
    pub pages_missing_text: u64,
    /// Per-record write failures that were logged and skipped
    pub write_failures: u64,
    /// Records whose title had to be synthesized
    pub unknown_titles: u64,
}
