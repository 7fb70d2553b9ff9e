//! Token sources feeding the deserializer.
//!
//! [`XmlTokenizer`] adapts a quick-xml `Reader` into the open/close/text/cdata
//! events the deserializer consumes. Empty elements are expanded into an
//! open/close pair, entity references are resolved, and adjacent text pieces
//! are coalesced so that one text node arrives as a single token.

use std::collections::VecDeque;
use std::io::BufRead;

use quick_xml::Reader;
use quick_xml::events::{BytesRef, BytesStart, Event};

use crate::error::{Result, SoapError};

/// One parse event.
#[derive(Debug, Clone, PartialEq)]
pub enum XmlToken {
    Open {
        name: String,
        attributes: Vec<(String, String)>,
    },
    Close {
        name: String,
    },
    Text(String),
    CData(String),
    /// End of input. Sources keep returning `End` once reached.
    End,
}

/// A pull-based supplier of [`XmlToken`]s.
pub trait TokenSource {
    fn next_token(&mut self) -> Result<XmlToken>;
}

/// Pre-tokenized input.
impl TokenSource for VecDeque<XmlToken> {
    fn next_token(&mut self) -> Result<XmlToken> {
        Ok(self.pop_front().unwrap_or(XmlToken::End))
    }
}

/// Tokenizer over a complete string or any buffered reader.
pub struct XmlTokenizer<R> {
    reader: Reader<R>,
    buf: Vec<u8>,
    queue: TokenQueue,
}

impl<'a> XmlTokenizer<&'a [u8]> {
    pub fn from_str(xml: &'a str) -> Self {
        Self::new(Reader::from_str(xml))
    }
}

impl<R: BufRead> XmlTokenizer<R> {
    pub fn from_reader(reader: R) -> Self {
        Self::new(Reader::from_reader(reader))
    }
}

impl<R> XmlTokenizer<R> {
    fn new(mut reader: Reader<R>) -> Self {
        reader.config_mut().expand_empty_elements = true;
        Self {
            reader,
            buf: Vec::new(),
            queue: TokenQueue::default(),
        }
    }
}

impl<R: BufRead> TokenSource for XmlTokenizer<R> {
    fn next_token(&mut self) -> Result<XmlToken> {
        loop {
            if let Some(token) = self.queue.pop() {
                return Ok(token);
            }
            self.buf.clear();
            let event = self
                .reader
                .read_event_into(&mut self.buf)
                .map_err(SoapError::tokenizer)?;
            let piece = translate(event)?;
            self.queue.accept(piece);
        }
    }
}

/// Tokenizer over an asynchronous byte stream.
///
/// `next_token` suspends only while the underlying reader is waiting for
/// input.
#[cfg(feature = "async")]
pub struct AsyncXmlTokenizer<R> {
    reader: Reader<R>,
    buf: Vec<u8>,
    queue: TokenQueue,
}

#[cfg(feature = "async")]
impl<R: tokio::io::AsyncBufRead + Unpin> AsyncXmlTokenizer<R> {
    pub fn from_reader(reader: R) -> Self {
        let mut reader = Reader::from_reader(reader);
        reader.config_mut().expand_empty_elements = true;
        Self {
            reader,
            buf: Vec::new(),
            queue: TokenQueue::default(),
        }
    }

    pub async fn next_token(&mut self) -> Result<XmlToken> {
        loop {
            if let Some(token) = self.queue.pop() {
                return Ok(token);
            }
            self.buf.clear();
            let event = self
                .reader
                .read_event_into_async(&mut self.buf)
                .await
                .map_err(SoapError::tokenizer)?;
            let piece = translate(event)?;
            self.queue.accept(piece);
        }
    }
}

/// A reader event after translation.
enum Piece {
    Token(XmlToken),
    Text(String),
    Skip,
    Eof,
}

/// Buffers text until the next structural event so it can be coalesced.
#[derive(Default)]
struct TokenQueue {
    text: Option<String>,
    queued: VecDeque<XmlToken>,
    finished: bool,
}

impl TokenQueue {
    fn pop(&mut self) -> Option<XmlToken> {
        match self.queued.pop_front() {
            Some(token) => Some(token),
            None if self.finished => Some(XmlToken::End),
            None => None,
        }
    }

    fn accept(&mut self, piece: Piece) {
        match piece {
            Piece::Text(text) => self.text.get_or_insert_with(String::new).push_str(&text),
            Piece::Skip => {}
            Piece::Token(token) => {
                self.flush_text();
                self.queued.push_back(token);
            }
            Piece::Eof => {
                self.flush_text();
                self.finished = true;
            }
        }
    }

    fn flush_text(&mut self) {
        if let Some(text) = self.text.take() {
            self.queued.push_back(XmlToken::Text(text));
        }
    }
}

fn translate(event: Event<'_>) -> Result<Piece> {
    let piece = match event {
        Event::Start(start) => Piece::Token(XmlToken::Open {
            name: String::from_utf8_lossy(start.name().as_ref()).into_owned(),
            attributes: read_attributes(&start)?,
        }),
        Event::End(end) => Piece::Token(XmlToken::Close {
            name: String::from_utf8_lossy(end.name().as_ref()).into_owned(),
        }),
        Event::Text(text) => Piece::Text(String::from_utf8_lossy(&text).into_owned()),
        Event::GeneralRef(reference) => Piece::Text(resolve_reference(&reference)?),
        Event::CData(cdata) => {
            Piece::Token(XmlToken::CData(String::from_utf8_lossy(&cdata).into_owned()))
        }
        Event::Eof => Piece::Eof,
        // Expanded by the reader configuration; kept for completeness.
        Event::Empty(start) => {
            return Err(SoapError::Tokenizer(format!(
                "unexpected unexpanded empty element <{}>",
                String::from_utf8_lossy(start.name().as_ref())
            )));
        }
        // Comments, declarations, processing instructions, doctypes.
        _ => Piece::Skip,
    };
    Ok(piece)
}

fn read_attributes(start: &BytesStart<'_>) -> Result<Vec<(String, String)>> {
    let mut attributes = Vec::new();
    for attr in start.attributes() {
        let attr = attr.map_err(SoapError::tokenizer)?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(SoapError::tokenizer)?
            .into_owned();
        attributes.push((key, value));
    }
    Ok(attributes)
}

/// Resolves `&name;` and `&#...;` references to their text.
fn resolve_reference(reference: &BytesRef<'_>) -> Result<String> {
    let name = String::from_utf8_lossy(reference);
    if let Some(code) = name.strip_prefix('#') {
        let parsed = match code.strip_prefix('x').or_else(|| code.strip_prefix('X')) {
            Some(hex) => u32::from_str_radix(hex, 16),
            None => code.parse::<u32>(),
        };
        return parsed
            .ok()
            .and_then(char::from_u32)
            .map(String::from)
            .ok_or_else(|| SoapError::Tokenizer(format!("invalid character reference &{};", name)));
    }
    quick_xml::escape::resolve_predefined_entity(&name)
        .map(str::to_string)
        .ok_or_else(|| SoapError::Tokenizer(format!("unknown entity &{};", name)))
}
