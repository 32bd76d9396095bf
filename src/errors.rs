use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Filesystem-level cache failures. A plain miss is not an error: reads
/// return `Ok(None)` for absent entries so callers can run fallback chains.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("failed to write cache entry at {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to read cache entry at {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("index session failure at {path}: {reason}")]
    Index { path: PathBuf, reason: String },
}

/// Fatal dump-stream failures: a broken decompression layer or malformed
/// XML. These abort the whole run; there is no per-record recovery.
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("IO error reading dump stream: {0}")]
    Io(#[from] io::Error),
    #[error("XML parse error: {0}")]
    Xml(#[from] quick_xml::Error),
}
