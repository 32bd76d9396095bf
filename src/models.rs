use crate::config::{RAW_MARKUP_EXT, STRUCTURED_DATA_EXT};

/// The two artifact families cached per title.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    /// Raw page markup as extracted from the dump
    RawMarkup,
    /// Structured representation derived by the external converter
    StructuredData,
}

impl ArtifactKind {
    pub const ALL: [ArtifactKind; 2] = [ArtifactKind::RawMarkup, ArtifactKind::StructuredData];

    pub fn extension(self) -> &'static str {
        match self {
            ArtifactKind::RawMarkup => RAW_MARKUP_EXT,
            ArtifactKind::StructuredData => STRUCTURED_DATA_EXT,
        }
    }
}

/// One page record pulled from the dump stream.
#[derive(Debug, Clone)]
pub struct PageRecord {
    pub title: String,
    /// Text of the most recent revision; `None` when the record carries no
    /// revision text at all.
    pub text: Option<String>,
    /// A `redirect` element was present directly under the page element.
    /// Its target is not inspected here.
    pub redirect: bool,
    /// The title was synthesized because the record had no title element.
    pub synthesized_title: bool,
}

/// Outcome of a cache write attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Written,
    /// The target already existed and overwriting was not requested.
    /// Expected during incremental re-ingestion; not an error.
    AlreadyExists,
}
