//! Wikistash: streaming MediaWiki dump splitter and page cache
//!
//! This crate unpacks multi-gigabyte compressed Wikipedia exports into one
//! file per page, addressed by a normalized title, so that individual pages
//! can be read back (or re-derived) without touching the dump again:
//!
//! 1. **Split Pass** -- Stream the compressed XML dump, pulling out each
//!    page's title and latest-revision markup without ever materializing the
//!    document tree
//! 2. **Cache Layer** -- Map titles to filesystem-safe keys, shard them
//!    across a bounded directory tree, and write each artifact atomically
//! 3. **Index Session** -- Record every performed write into an append-only
//!    session that seals into a single lookup file
//! 4. **Read-Through** -- Serve raw markup and derived structured data from
//!    the cache, falling back to an injected fetcher/converter on miss
//!
//! # Architecture
//!
//! The pipeline is a single-threaded, forward-only pull loop; throughput is
//! bounded by decompression and filesystem writes, not CPU:
//!
//! - **Streaming XML parsing** -- Event-based parsing over bz2/gzip/plain
//!   input with one reusable buffer; peak memory is one record
//! - **Deterministic addressing** -- Title normalization and shard paths are
//!   pure functions, so cache addressing never depends on filesystem state
//! - **Atomic artifacts** -- Temp-file-plus-rename writes; a reader never
//!   observes a partially written page
//! - **Crash-safe indexing** -- The index working file is renamed into place
//!   only at session end, and sealing also runs on teardown
//!
//! # Key Modules
//!
//! - [`parser`] -- Streaming dump reader with BZ2/gzip decompression
//! - [`cache`] -- Sharded page cache and index session recorder
//! - [`splitter`] -- Dump-to-cache driver loop
//! - [`normalize`] -- Title-to-key normalization with reserved-name handling
//! - [`paths`] -- Shard segment derivation and path resolution
//! - [`convert`] -- Fetcher/converter seams and the read-through gateway
//! - [`models`] -- Core data types (PageRecord, ArtifactKind, WriteOutcome)
//! - [`stats`] -- Per-run counters
//! - [`errors`] -- Cache and stream failure taxonomy
//! - [`config`] -- Constants and JSON-loadable settings
//!
//! # Example Usage
//!
//! ```bash
//! # Split a dump into the cache, skipping redirect pages
//! wikistash split enwiki-latest-pages-articles.xml.bz2 -o cache/ -r
//!
//! # Re-run after an interrupted split; existing pages are skipped
//! wikistash split enwiki-latest-pages-articles.xml.bz2 -o cache/
//!
//! # Read one page's markup back out
//! wikistash get "Rust (programming language)" -o cache/
//! ```

pub mod cache;
pub mod config;
pub mod convert;
pub mod errors;
pub mod models;
pub mod normalize;
pub mod parser;
pub mod paths;
pub mod splitter;
pub mod stats;
