use crate::cache::PageCache;
use crate::config::PROGRESS_HZ;
use crate::models::{ArtifactKind, WriteOutcome};
use crate::parser::{DumpFormat, DumpReader};
use crate::stats::SplitStats;
use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::path::Path;
use tracing::{info, warn};

/// Options for one split run.
#[derive(Debug, Clone)]
pub struct SplitOptions {
    pub format: DumpFormat,
    /// Overwrite pages that already exist in the cache
    pub overwrite: bool,
    /// Drop redirect records instead of caching them
    pub skip_redirects: bool,
    /// Stop after this many records (testing aid)
    pub limit: Option<u64>,
}

impl Default for SplitOptions {
    fn default() -> Self {
        Self {
            format: DumpFormat::Bzip2,
            overwrite: false,
            skip_redirects: false,
            limit: None,
        }
    }
}

/// Streams a dump into the cache, one record at a time.
///
/// Opens an index session up front and seals it on every exit path: normal
/// exhaustion, record limit, and fatal stream errors all leave a sealed
/// (possibly incomplete) index behind. Per-record write failures are logged
/// and skipped; only stream-level failures abort the run.
pub fn run_split(input: &Path, cache: &mut PageCache, opts: &SplitOptions) -> Result<SplitStats> {
    let mut reader = DumpReader::open(input, opts.format, opts.skip_redirects)
        .with_context(|| format!("Failed to open dump at: {}", input.display()))?;

    cache
        .start_index_session()
        .context("Failed to open index session")?;

    let pb = ProgressBar::new_spinner().with_style(
        ProgressStyle::with_template("{spinner} {pos} {wide_msg}").expect("valid progress template"),
    );
    pb.set_draw_target(ProgressDrawTarget::stderr_with_hz(PROGRESS_HZ));

    info!(input = %input.display(), "Splitting dump into page cache");

    let mut stats = SplitStats::default();
    let mut stream_error = None;

    for result in reader.by_ref() {
        let record = match result {
            Ok(record) => record,
            Err(e) => {
                stream_error = Some(e);
                break;
            }
        };

        stats.records_seen += 1;
        pb.set_message(record.title.chars().take(79).collect::<String>());
        pb.inc(1);

        let Some(text) = record.text else {
            stats.pages_missing_text += 1;
            continue;
        };

        match cache.write(
            &record.title,
            ArtifactKind::RawMarkup,
            text.as_bytes(),
            opts.overwrite,
        ) {
            Ok(WriteOutcome::Written) => stats.pages_written += 1,
            Ok(WriteOutcome::AlreadyExists) => stats.pages_skipped_existing += 1,
            Err(e) => {
                warn!(title = %record.title, error = %e, "Failed to write page, skipping");
                stats.write_failures += 1;
            }
        }

        if opts.limit.is_some_and(|limit| stats.records_seen >= limit) {
            info!(limit = stats.records_seen, "Record limit reached");
            break;
        }
    }

    stats.unknown_titles = reader.unknown_titles();
    pb.finish_and_clear();

    if let Some(e) = stream_error {
        // seal whatever was recorded before propagating the fatal error
        if let Err(seal_error) = cache.finish_index_session() {
            warn!(error = %seal_error, "Failed to seal index after stream error");
        }
        return Err(e).with_context(|| format!("Dump stream failed: {}", input.display()));
    }

    cache
        .finish_index_session()
        .context("Failed to seal index session")?;

    info!(
        records = stats.records_seen,
        written = stats.pages_written,
        skipped = stats.pages_skipped_existing,
        "Split complete"
    );

    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::DisallowedNames;
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};

    fn write_xml(xml: &str) -> NamedTempFile {
        let mut tmp = tempfile::Builder::new().suffix(".xml").tempfile().unwrap();
        tmp.write_all(xml.as_bytes()).unwrap();
        tmp.flush().unwrap();
        tmp
    }

    fn make_cache(dir: &TempDir) -> PageCache {
        PageCache::new(dir.path(), 2, DisallowedNames::default())
    }

    fn options() -> SplitOptions {
        SplitOptions {
            format: DumpFormat::Plain,
            ..SplitOptions::default()
        }
    }

    const XML: &str = r#"<mediawiki>
      <page><title>One</title><revision><text>first body</text></revision></page>
      <page><title>Two</title><revision><text>second body</text></revision></page>
      <page><title>Empty</title><revision><id>9</id></revision></page>
    </mediawiki>"#;

    #[test]
    fn writes_pages_and_counts_outcomes() {
        let tmp = write_xml(XML);
        let dir = TempDir::new().unwrap();
        let mut cache = make_cache(&dir);

        let stats = run_split(tmp.path(), &mut cache, &options()).unwrap();

        assert_eq!(stats.records_seen, 3);
        assert_eq!(stats.pages_written, 2);
        assert_eq!(stats.pages_missing_text, 1);
        assert_eq!(stats.write_failures, 0);
        assert_eq!(
            cache.read("One", ArtifactKind::RawMarkup).unwrap().as_deref(),
            Some(&b"first body"[..])
        );
    }

    #[test]
    fn rerun_without_overwrite_is_a_no_op() {
        let tmp = write_xml(XML);
        let dir = TempDir::new().unwrap();
        let mut cache = make_cache(&dir);

        run_split(tmp.path(), &mut cache, &options()).unwrap();
        let stats = run_split(tmp.path(), &mut cache, &options()).unwrap();

        assert_eq!(stats.pages_written, 0);
        assert_eq!(stats.pages_skipped_existing, 2);
    }

    #[test]
    fn limit_stops_the_run_early() {
        let tmp = write_xml(XML);
        let dir = TempDir::new().unwrap();
        let mut cache = make_cache(&dir);

        let stats = run_split(
            tmp.path(),
            &mut cache,
            &SplitOptions {
                limit: Some(1),
                ..options()
            },
        )
        .unwrap();

        assert_eq!(stats.records_seen, 1);
        assert_eq!(stats.pages_written, 1);
        // the session still seals
        assert!(cache.index_path().is_file());
    }

    #[test]
    fn session_is_sealed_after_normal_run() {
        let tmp = write_xml(XML);
        let dir = TempDir::new().unwrap();
        let mut cache = make_cache(&dir);

        run_split(tmp.path(), &mut cache, &options()).unwrap();

        assert!(!cache.index_session_open());
        assert!(cache.index_path().is_file());
        assert!(!dir.path().join("index.csv.tmp").exists());
    }

    #[test]
    fn stream_failure_seals_index_and_propagates() {
        let tmp = write_xml(
            r#"<mediawiki>
              <page><title>Whole</title><revision><text>kept</text></revision></page>
              <page><title>Torn"#,
        );
        let dir = TempDir::new().unwrap();
        let mut cache = make_cache(&dir);

        let result = run_split(tmp.path(), &mut cache, &options());

        assert!(result.is_err());
        // the record completed before the failure is cached and indexed
        assert!(cache.exists("Whole", ArtifactKind::RawMarkup));
        assert!(cache.index_path().is_file());
        let mut reader = csv::Reader::from_path(cache.index_path()).unwrap();
        assert_eq!(reader.records().count(), 1);
    }

    #[test]
    fn counts_synthesized_titles() {
        let tmp = write_xml(
            r#"<mediawiki>
              <page><title>Named</title><revision><text>a</text></revision></page>
              <page><revision><text>b</text></revision></page>
            </mediawiki>"#,
        );
        let dir = TempDir::new().unwrap();
        let mut cache = make_cache(&dir);

        let stats = run_split(tmp.path(), &mut cache, &options()).unwrap();

        assert_eq!(stats.unknown_titles, 1);
        assert!(cache.exists("UNKNOWN_1", ArtifactKind::RawMarkup));
    }
}
