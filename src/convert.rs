use crate::cache::PageCache;
use crate::models::ArtifactKind;
use anyhow::{Context, Result};
use once_cell::unsync::OnceCell;
use tracing::debug;

/// Converts raw page markup into the derived structured representation.
/// Implementations typically drive an external converter process; this layer
/// only sees the resulting string.
pub trait MarkupConverter {
    fn convert(&self, raw_markup: &str) -> Result<String>;
}

/// Best-effort source for raw markup the cache does not hold. A single
/// attempt is made per call; an absent result is a miss, not an error.
pub trait RawFetcher {
    fn fetch(&self, title: &str) -> Result<Option<String>>;
}

type ConverterFactory = Box<dyn Fn() -> Result<Box<dyn MarkupConverter>>>;

/// Read-through gateway over the page cache: cached artifact first, then the
/// fetcher, then the converter.
///
/// The converter handle is owned here and initialized on first use via the
/// injected factory, so runs that never miss the structured cache never pay
/// for converter startup. Dropping the gateway drops the handle.
pub struct ContentGateway {
    converter: OnceCell<Box<dyn MarkupConverter>>,
    factory: ConverterFactory,
    fetcher: Option<Box<dyn RawFetcher>>,
    cache_pulls: bool,
}

impl ContentGateway {
    pub fn new(factory: ConverterFactory) -> Self {
        Self {
            converter: OnceCell::new(),
            factory,
            fetcher: None,
            cache_pulls: true,
        }
    }

    pub fn with_fetcher(mut self, fetcher: Box<dyn RawFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    /// Whether fetched markup and converted results are written back through
    /// the cache.
    pub fn with_cache_pulls(mut self, cache_pulls: bool) -> Self {
        self.cache_pulls = cache_pulls;
        self
    }

    fn converter(&self) -> Result<&dyn MarkupConverter> {
        let converter = self
            .converter
            .get_or_try_init(|| (self.factory)().context("Failed to initialize converter"))?;
        Ok(converter.as_ref())
    }

    /// Raw markup for a title: cache, then one fetch attempt.
    pub fn read_raw(&self, cache: &mut PageCache, title: &str) -> Result<Option<String>> {
        if let Some(bytes) = cache.read(title, ArtifactKind::RawMarkup)? {
            let text = String::from_utf8(bytes)
                .with_context(|| format!("Cached markup for '{title}' is not valid UTF-8"))?;
            return Ok(Some(text));
        }

        let Some(fetcher) = &self.fetcher else {
            return Ok(None);
        };
        let Some(markup) = fetcher.fetch(title)? else {
            debug!(title = title, "Fetch attempt found nothing");
            return Ok(None);
        };
        if self.cache_pulls {
            cache.write(title, ArtifactKind::RawMarkup, markup.as_bytes(), false)?;
        }
        Ok(Some(markup))
    }

    /// Structured data for a title: cache, then derive from raw markup via
    /// the converter. Returns `Ok(None)` only when no raw markup can be had.
    pub fn read_structured(&self, cache: &mut PageCache, title: &str) -> Result<Option<String>> {
        if let Some(bytes) = cache.read(title, ArtifactKind::StructuredData)? {
            let text = String::from_utf8(bytes).with_context(|| {
                format!("Cached structured data for '{title}' is not valid UTF-8")
            })?;
            return Ok(Some(text));
        }

        let Some(raw) = self.read_raw(cache, title)? else {
            return Ok(None);
        };
        let structured = self
            .converter()?
            .convert(&raw)
            .with_context(|| format!("Failed to convert markup for '{title}'"))?;
        if self.cache_pulls {
            cache.write(
                title,
                ArtifactKind::StructuredData,
                structured.as_bytes(),
                false,
            )?;
        }
        Ok(Some(structured))
    }
}
