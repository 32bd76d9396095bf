use crate::errors::StreamError;
use crate::models::PageRecord;
use bzip2::read::BzDecoder;
use flate2::read::GzDecoder;
use quick_xml::events::Event;
use quick_xml::reader::Reader;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

const READ_BUF_SIZE: usize = 1024 * 1024;

/// Compression applied to the dump before the XML layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DumpFormat {
    Plain,
    Bzip2,
    Gzip,
}

impl DumpFormat {
    /// Guesses from the file extension. Unknown extensions fall back to
    /// bzip2, the format Wikimedia ships its dumps in.
    pub fn detect(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("xml") => DumpFormat::Plain,
            Some("gz") => DumpFormat::Gzip,
            _ => DumpFormat::Bzip2,
        }
    }
}

/// XML reader over the supported decompression layers.
enum DumpInput {
    Plain(Reader<BufReader<File>>),
    Bzip2(Reader<BufReader<BzDecoder<File>>>),
    Gzip(Reader<BufReader<GzDecoder<File>>>),
}

impl DumpInput {
    fn read_event<'b>(&mut self, buf: &'b mut Vec<u8>) -> Result<Event<'b>, quick_xml::Error> {
        buf.clear();
        match self {
            DumpInput::Plain(reader) => reader.read_event_into(buf),
            DumpInput::Bzip2(reader) => reader.read_event_into(buf),
            DumpInput::Gzip(reader) => reader.read_event_into(buf),
        }
    }
}

enum Capture {
    Title,
    Text,
}

/// Incremental reader over a MediaWiki dump stream.
///
/// Yields one [`PageRecord`] per `page` element in a single forward pass.
/// No document tree is built: the event buffer is reused across events and
/// each record's strings are moved out to the caller, so peak memory stays
/// at roughly one record regardless of stream size. Not restartable;
/// re-driving the stream requires a fresh reader.
///
/// Structural tags (`page`, `title`, `revision`, `text`, `redirect`) are
/// matched on their local name, ignoring namespace prefixes and ASCII case.
pub struct DumpReader {
    input: DumpInput,
    buf: Vec<u8>,
    skip_redirects: bool,
    unknown_titles: u64,
    done: bool,
}

impl DumpReader {
    pub fn open(
        path: &Path,
        format: DumpFormat,
        skip_redirects: bool,
    ) -> Result<Self, StreamError> {
        let file = File::open(path)?;
        let input = match format {
            DumpFormat::Plain => {
                DumpInput::Plain(Reader::from_reader(BufReader::with_capacity(
                    READ_BUF_SIZE,
                    file,
                )))
            }
            DumpFormat::Bzip2 => DumpInput::Bzip2(Reader::from_reader(BufReader::with_capacity(
                READ_BUF_SIZE,
                BzDecoder::new(file),
            ))),
            DumpFormat::Gzip => DumpInput::Gzip(Reader::from_reader(BufReader::with_capacity(
                READ_BUF_SIZE,
                GzDecoder::new(file),
            ))),
        };
        Ok(Self {
            input,
            buf: Vec::with_capacity(8 * 1024),
            skip_redirects,
            unknown_titles: 0,
            done: false,
        })
    }

    /// Count of records whose title had to be synthesized so far.
    pub fn unknown_titles(&self) -> u64 {
        self.unknown_titles
    }

    /// Parses forward until the next complete `page` element, or `Ok(None)`
    /// at end of stream. EOF inside an open page is a truncated dump and
    /// therefore fatal.
    fn next_record(&mut self) -> Result<Option<PageRecord>, StreamError> {
        let mut in_page = false;
        let mut in_revision = false;
        let mut capture: Option<Capture> = None;
        let mut text_buf = String::new();
        let mut title: Option<String> = None;
        let mut revision_text: Option<String> = None;
        let mut pending_text: Option<String> = None;
        let mut redirect = false;

        loop {
            match self.input.read_event(&mut self.buf)? {
                Event::Start(e) => {
                    let name = e.name();
                    let local = name.local_name().into_inner();
                    if !in_page {
                        if local.eq_ignore_ascii_case(b"page") {
                            in_page = true;
                        }
                    } else if local.eq_ignore_ascii_case(b"revision") {
                        in_revision = true;
                        pending_text = None;
                    } else if in_revision && local.eq_ignore_ascii_case(b"text") {
                        capture = Some(Capture::Text);
                        text_buf.clear();
                    } else if !in_revision && local.eq_ignore_ascii_case(b"title") {
                        capture = Some(Capture::Title);
                        text_buf.clear();
                    } else if !in_revision && local.eq_ignore_ascii_case(b"redirect") {
                        redirect = true;
                    }
                }
                Event::Empty(e) => {
                    let name = e.name();
                    let local = name.local_name().into_inner();
                    if in_page {
                        if !in_revision && local.eq_ignore_ascii_case(b"redirect") {
                            redirect = true;
                        } else if in_revision && local.eq_ignore_ascii_case(b"text") {
                            pending_text = Some(String::new());
                        } else if !in_revision && local.eq_ignore_ascii_case(b"title") {
                            title = Some(String::new());
                        }
                    } else if local.eq_ignore_ascii_case(b"page") {
                        return Ok(Some(self.complete_page(None, None, false)));
                    }
                }
                Event::Text(e) => {
                    if capture.is_some() {
                        if let Ok(text) = e.unescape() {
                            text_buf.push_str(&text);
                        }
                    }
                }
                Event::CData(e) => {
                    if capture.is_some() {
                        text_buf.push_str(&String::from_utf8_lossy(&e));
                    }
                }
                Event::End(e) => {
                    let name = e.name();
                    let local = name.local_name().into_inner();
                    if local.eq_ignore_ascii_case(b"title") {
                        if matches!(capture, Some(Capture::Title)) {
                            title = Some(std::mem::take(&mut text_buf));
                            capture = None;
                        }
                    } else if local.eq_ignore_ascii_case(b"text") {
                        if matches!(capture, Some(Capture::Text)) {
                            pending_text = Some(std::mem::take(&mut text_buf));
                            capture = None;
                        }
                    } else if local.eq_ignore_ascii_case(b"revision") {
                        // the most recent revision wins, even when it has no text
                        in_revision = false;
                        revision_text = pending_text.take();
                    } else if in_page && local.eq_ignore_ascii_case(b"page") {
                        return Ok(Some(self.complete_page(title, revision_text, redirect)));
                    }
                }
                Event::Eof => {
                    if in_page {
                        return Err(StreamError::Xml(quick_xml::Error::UnexpectedEof(
                            "page".to_string(),
                        )));
                    }
                    return Ok(None);
                }
                _ => {}
            }
        }
    }

    fn complete_page(
        &mut self,
        title: Option<String>,
        text: Option<String>,
        redirect: bool,
    ) -> PageRecord {
        let (title, synthesized_title) = match title {
            Some(title) => (title, false),
            None => {
                self.unknown_titles += 1;
                (format!("UNKNOWN_{}", self.unknown_titles), true)
            }
        };
        PageRecord {
            title,
            text,
            redirect,
            synthesized_title,
        }
    }
}

impl Iterator for DumpReader {
    type Item = Result<PageRecord, StreamError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        loop {
            match self.next_record() {
                Ok(Some(record)) => {
                    if self.skip_redirects && record.redirect {
                        continue;
                    }
                    return Some(Ok(record));
                }
                Ok(None) => {
                    self.done = true;
                    return None;
                }
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        }
    }
}
