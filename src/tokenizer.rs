//! Incremental XML tokenizer
//!
//! Turns schema document bytes into the flat event sequence the schema
//! parser consumes: tag-open (with raw attributes), tag-close and text.
//! Built on `quick-xml`'s pull reader, so a document is never materialised
//! as a tree.

use crate::error::{Error, Result};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

/// One tokenizer event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XmlEvent {
    /// Start tag (empty elements produce an `Open` followed by a `Close`)
    Open {
        /// Raw tag name, possibly prefixed
        name: String,
        /// Raw attributes in document order, values unescaped
        attributes: Vec<(String, String)>,
    },
    /// End tag
    Close {
        /// Raw tag name, possibly prefixed
        name: String,
    },
    /// Character data (text or CDATA), trimmed of surrounding whitespace
    Text(String),
}

/// Pull tokenizer over an in-memory document
pub struct Tokenizer<'a> {
    reader: Reader<&'a [u8]>,
    input: &'a [u8],
    buf: Vec<u8>,
    pending_close: Option<String>,
    line: usize,
    counted_to: usize,
    finished: bool,
}

impl<'a> Tokenizer<'a> {
    /// Create a tokenizer over `input`
    pub fn new(input: &'a [u8]) -> Self {
        let mut reader = Reader::from_reader(input);
        reader.trim_text(true);

        Self {
            reader,
            input,
            buf: Vec::new(),
            pending_close: None,
            line: 1,
            counted_to: 0,
            finished: false,
        }
    }

    /// 1-based line of the most recent tag or text
    pub fn line(&self) -> usize {
        self.line
    }

    fn advance_line_to(&mut self, pos: usize) {
        let pos = pos.min(self.input.len());
        if pos > self.counted_to {
            self.line += self.input[self.counted_to..pos]
                .iter()
                .filter(|&&b| b == b'\n')
                .count();
            self.counted_to = pos;
        }
    }

    /// Move the line counter to the first `<` at or after `from`
    fn mark_tag_start(&mut self, from: usize) {
        let end = self.reader.buffer_position().min(self.input.len());
        let start = self.input[from.min(end)..end]
            .iter()
            .position(|&b| b == b'<')
            .map(|offset| from + offset)
            .unwrap_or(end);
        self.advance_line_to(start);
    }

    fn xml_error(&self, message: impl std::fmt::Display) -> Error {
        Error::Xml(format!("{} at line {}", message, self.line))
    }

    /// Read the next event, or `None` at end of stream
    pub fn next_event(&mut self) -> Result<Option<XmlEvent>> {
        if let Some(name) = self.pending_close.take() {
            return Ok(Some(XmlEvent::Close { name }));
        }

        loop {
            if self.finished {
                return Ok(None);
            }

            let before = self.reader.buffer_position();
            self.buf.clear();
            let result = self
                .reader
                .read_event_into(&mut self.buf)
                .map(|event| event.into_owned());
            let event = match result {
                Ok(event) => event,
                Err(e) => {
                    let pos = self.reader.buffer_position();
                    self.advance_line_to(pos);
                    self.finished = true;
                    return Err(self.xml_error(e));
                }
            };

            match event {
                Event::Start(e) => {
                    self.mark_tag_start(before);
                    let (name, attributes) = self.parse_start(&e)?;
                    return Ok(Some(XmlEvent::Open { name, attributes }));
                }
                Event::Empty(e) => {
                    self.mark_tag_start(before);
                    let (name, attributes) = self.parse_start(&e)?;
                    self.pending_close = Some(name.clone());
                    return Ok(Some(XmlEvent::Open { name, attributes }));
                }
                Event::End(e) => {
                    self.mark_tag_start(before);
                    let name = std::str::from_utf8(e.name().as_ref())
                        .map_err(|e| self.xml_error(format!("Invalid element name: {}", e)))?
                        .to_string();
                    return Ok(Some(XmlEvent::Close { name }));
                }
                Event::Text(e) => {
                    self.advance_line_to(before);
                    let text = e
                        .unescape()
                        .map_err(|e| self.xml_error(format!("Failed to unescape text: {}", e)))?
                        .to_string();
                    if !text.trim().is_empty() {
                        return Ok(Some(XmlEvent::Text(text)));
                    }
                }
                Event::CData(e) => {
                    self.advance_line_to(before);
                    let raw = e.into_inner();
                    let text = std::str::from_utf8(&raw)
                        .map_err(|e| self.xml_error(format!("Invalid CDATA: {}", e)))?
                        .to_string();
                    if !text.trim().is_empty() {
                        return Ok(Some(XmlEvent::Text(text)));
                    }
                }
                Event::Eof => {
                    self.finished = true;
                    return Ok(None);
                }
                _ => {} // Ignore other events (comments, processing instructions, etc.)
            }
        }
    }

    fn parse_start(&self, start: &BytesStart) -> Result<(String, Vec<(String, String)>)> {
        let name = std::str::from_utf8(start.name().as_ref())
            .map_err(|e| self.xml_error(format!("Invalid element name: {}", e)))?
            .to_string();

        let mut attributes = Vec::new();
        for attr_result in start.attributes() {
            let attr = attr_result
                .map_err(|e| self.xml_error(format!("Failed to parse attribute: {}", e)))?;

            let attr_name = std::str::from_utf8(attr.key.as_ref())
                .map_err(|e| self.xml_error(format!("Invalid attribute name: {}", e)))?
                .to_string();

            let attr_value = attr
                .unescape_value()
                .map_err(|e| self.xml_error(format!("Failed to unescape attribute value: {}", e)))?
                .to_string();

            attributes.push((attr_name, attr_value));
        }

        Ok((name, attributes))
    }
}

impl<'a> Iterator for Tokenizer<'a> {
    type Item = Result<XmlEvent>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_event().transpose()
    }
}
