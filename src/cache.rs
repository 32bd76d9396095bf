use crate::config::{Settings, INDEX_FILE_NAME};
use crate::errors::CacheError;
use crate::models::{ArtifactKind, WriteOutcome};
use crate::normalize::{normalize_title, DisallowedNames};
use crate::paths;
use rustc_hash::FxHashSet;
use std::fs::{self, File};
use std::io::{BufWriter, ErrorKind};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Title-addressed artifact cache over a sharded directory tree.
///
/// Writes are atomic from a reader's point of view (temp file + rename) and
/// optionally recorded into an append-only index session that seals into a
/// single durable artifact. Directory creation is lazy, with a process-local
/// set of known directories to skip redundant syscalls; the set is a pure
/// optimization and losing it only costs extra `create_dir_all` calls.
pub struct PageCache {
    root: PathBuf,
    depth: usize,
    disallowed: DisallowedNames,
    known_dirs: FxHashSet<PathBuf>,
    recorder: Option<IndexRecorder>,
}

impl PageCache {
    pub fn new(root: impl Into<PathBuf>, depth: usize, disallowed: DisallowedNames) -> Self {
        Self {
            root: root.into(),
            depth,
            disallowed,
            known_dirs: FxHashSet::default(),
            recorder: None,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            &settings.cache_dir,
            settings.dir_nesting,
            DisallowedNames::new(settings.disallowed_file_names.clone()),
        )
    }

    /// Normalized cache key for a title.
    pub fn key(&self, title: &str) -> String {
        normalize_title(title, &self.disallowed)
    }

    /// Resolved on-disk path for a (title, kind) pair.
    pub fn artifact_path(&self, title: &str, kind: ArtifactKind) -> PathBuf {
        let key = self.key(title);
        paths::resolve(&self.root, &key, self.depth, kind.extension())
    }

    /// Path of the sealed index artifact.
    pub fn index_path(&self) -> PathBuf {
        self.root.join(INDEX_FILE_NAME)
    }

    pub fn index_session_open(&self) -> bool {
        self.recorder.is_some()
    }

    /// Writes an artifact. When `overwrite` is false and the target exists,
    /// the call is a silent no-op reported as `AlreadyExists` -- incremental
    /// re-ingestion is expected to hit this constantly. Performed writes are
    /// appended to the open index session, if any, only after the artifact
    /// has been renamed into place, so the sealed index never references a
    /// missing file.
    pub fn write(
        &mut self,
        title: &str,
        kind: ArtifactKind,
        content: &[u8],
        overwrite: bool,
    ) -> Result<WriteOutcome, CacheError> {
        let path = self.artifact_path(title, kind);

        if !overwrite && path.is_file() {
            debug!(title = title, path = %path.display(), "Target exists, skipping write");
            return Ok(WriteOutcome::AlreadyExists);
        }

        if let Some(parent) = path.parent() {
            self.ensure_dir(parent)?;
        }

        let tmp_path = path.with_extension(format!("{}.tmp", kind.extension()));
        fs::write(&tmp_path, content).map_err(|source| CacheError::Write {
            path: path.clone(),
            source,
        })?;
        fs::rename(&tmp_path, &path).map_err(|source| CacheError::Write {
            path: path.clone(),
            source,
        })?;

        if let Some(recorder) = &mut self.recorder {
            recorder.append(title, &path)?;
        }

        debug!(title = title, path = %path.display(), "Wrote artifact");
        Ok(WriteOutcome::Written)
    }

    /// Returns the artifact bytes, or `Ok(None)` when no entry exists.
    pub fn read(&self, title: &str, kind: ArtifactKind) -> Result<Option<Vec<u8>>, CacheError> {
        let path = self.artifact_path(title, kind);
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(source) if source.kind() == ErrorKind::NotFound => Ok(None),
            Err(source) => Err(CacheError::Read { path, source }),
        }
    }

    pub fn exists(&self, title: &str, kind: ArtifactKind) -> bool {
        self.artifact_path(title, kind).is_file()
    }

    /// Lazily lists cached keys starting with the normalized partial title.
    /// Only the partial's own shard directory is enumerated -- no recursion
    /// -- and no order is guaranteed beyond filesystem enumeration order.
    pub fn list_candidates(&self, partial_title: &str) -> impl Iterator<Item = String> {
        let prefix = self.key(partial_title);
        let mut dir = self.root.clone();
        for segment in paths::shard_segments(&prefix, self.depth) {
            dir.push(segment);
        }
        fs::read_dir(dir)
            .ok()
            .into_iter()
            .flatten()
            .filter_map(Result::ok)
            .filter_map(move |entry| {
                let path = entry.path();
                if !path.is_file() {
                    return None;
                }
                let stem = path.file_stem()?.to_str()?;
                stem.starts_with(&prefix).then(|| stem.to_string())
            })
    }

    /// Deletes every artifact kind cached for a title, forcing re-derivation
    /// on next access. Missing files are fine.
    pub fn reset(&mut self, title: &str) -> Result<(), CacheError> {
        for kind in ArtifactKind::ALL {
            let path = self.artifact_path(title, kind);
            match fs::remove_file(&path) {
                Ok(()) => debug!(path = %path.display(), "Removed artifact"),
                Err(source) if source.kind() == ErrorKind::NotFound => {}
                Err(source) => return Err(CacheError::Write { path, source }),
            }
        }
        Ok(())
    }

    /// Opens an index-recording session for a bulk write run. An already
    /// open session is sealed first.
    pub fn start_index_session(&mut self) -> Result<(), CacheError> {
        if self.recorder.is_some() {
            warn!("Index session already open; sealing it before starting a new one");
            self.finish_index_session()?;
        }
        let root = self.root.clone();
        self.ensure_dir(&root)?;
        self.recorder = Some(IndexRecorder::open(&root)?);
        Ok(())
    }

    /// Seals the open session into the durable index artifact. Safe to call
    /// with no session open, and valid for sessions with zero writes.
    pub fn finish_index_session(&mut self) -> Result<(), CacheError> {
        if let Some(mut recorder) = self.recorder.take() {
            recorder.seal()?;
        }
        Ok(())
    }

    fn ensure_dir(&mut self, dir: &Path) -> Result<(), CacheError> {
        if self.known_dirs.contains(dir) {
            return Ok(());
        }
        // create_dir_all treats "already exists" as success, so concurrent
        // creators racing on the same shard directory are tolerated.
        fs::create_dir_all(dir).map_err(|source| CacheError::Write {
            path: dir.to_path_buf(),
            source,
        })?;
        self.known_dirs.insert(dir.to_path_buf());
        Ok(())
    }
}

/// Append-only recorder for one bulk-write session.
///
/// Records accumulate in a working file beside the sealed artifact; sealing
/// flushes and renames it into place, so the sealed index exists either not
/// at all or complete. An unsealed recorder seals itself when dropped,
/// covering early returns and unwinds.
struct IndexRecorder {
    writer: Option<csv::Writer<BufWriter<File>>>,
    next_seq: u64,
    tmp_path: PathBuf,
    final_path: PathBuf,
    sealed: bool,
}

impl IndexRecorder {
    fn open(root: &Path) -> Result<Self, CacheError> {
        let final_path = root.join(INDEX_FILE_NAME);
        let tmp_path = root.join(format!("{INDEX_FILE_NAME}.tmp"));

        let file = File::create(&tmp_path).map_err(|source| CacheError::Index {
            path: tmp_path.clone(),
            reason: format!("failed to create working file: {source}"),
        })?;
        let mut writer = csv::Writer::from_writer(BufWriter::with_capacity(128 * 1024, file));
        writer
            .write_record(["seq", "title", "path"])
            .map_err(|source| CacheError::Index {
                path: tmp_path.clone(),
                reason: format!("failed to write header: {source}"),
            })?;

        Ok(Self {
            writer: Some(writer),
            next_seq: 1,
            tmp_path,
            final_path,
            sealed: false,
        })
    }

    fn append(&mut self, title: &str, path: &Path) -> Result<(), CacheError> {
        let writer = self.writer.as_mut().ok_or_else(|| CacheError::Index {
            path: self.tmp_path.clone(),
            reason: "session already sealed".to_string(),
        })?;
        writer
            .write_record([
                self.next_seq.to_string().as_str(),
                title,
                &path.display().to_string(),
            ])
            .map_err(|source| CacheError::Index {
                path: self.tmp_path.clone(),
                reason: format!("failed to append record: {source}"),
            })?;
        self.next_seq += 1;
        Ok(())
    }

    fn seal(&mut self) -> Result<(), CacheError> {
        if self.sealed {
            return Ok(());
        }
        if let Some(mut writer) = self.writer.take() {
            // csv's flush pushes through the BufWriter underneath as well
            writer.flush().map_err(|source| CacheError::Index {
                path: self.tmp_path.clone(),
                reason: format!("failed to flush records: {source}"),
            })?;
        }
        fs::rename(&self.tmp_path, &self.final_path).map_err(|source| CacheError::Index {
            path: self.final_path.clone(),
            reason: format!("failed to seal index: {source}"),
        })?;
        self.sealed = true;
        Ok(())
    }
}

impl Drop for IndexRecorder {
    fn drop(&mut self) {
        if !self.sealed {
            if let Err(e) = self.seal() {
                warn!(error = %e, "Failed to seal index session during teardown");
            }
        }
    }
}
