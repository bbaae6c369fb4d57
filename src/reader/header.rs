//! File header: everything before the first timeline
//!
//! The header ends with the `<TimelineList>` opening tag. Its `<Head>`
//! element holds named metadata children (`Description`, `DataSource`,
//! `Created`, ...) which are exposed as plain text.

use std::io::Read;

use log::warn;
use quick_xml::Reader;
use quick_xml::events::Event;
use rustc_hash::FxHashMap;

use crate::error::{Result, TdfError};

/// Closing text of every TDF file
pub const FOOTER: &str = "</TimelineList>\n</TDF>\n";

/// Bytes read per step while looking for the end of the header
const HEADER_CHUNK: usize = 4096;

/// Parsed header of a TDF file
#[derive(Debug, Clone, Default)]
pub struct TdfHeader {
    raw: String,
    /// `<Head>` children keyed by lower-cased element name
    fields: FxHashMap<String, String>,
    body_offset: u64,
}

/// Case-insensitive byte search
pub(crate) fn find_ignore_case(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack
        .windows(needle.len())
        .position(|window| window.eq_ignore_ascii_case(needle))
}

/// Offset just past the `>` of the `<TimelineList ...>` tag
fn timeline_list_end(bytes: &[u8]) -> Option<usize> {
    let start = find_ignore_case(bytes, b"<timelinelist")?;
    let close = bytes[start..].iter().position(|&b| b == b'>')?;
    Some(start + close + 1)
}

impl TdfHeader {
    /// Read the header from the start of a stream
    ///
    /// # Errors
    /// Returns `MalformedHeader` when no `<TimelineList>` tag appears within
    /// `max_bytes`, and `MissingElement` when the header has no `<Head>`.
    pub fn read<R: Read>(mut reader: R, max_bytes: usize) -> Result<Self> {
        let mut bytes = Vec::with_capacity(HEADER_CHUNK);
        let mut chunk = [0u8; HEADER_CHUNK];

        let end = loop {
            if let Some(end) = timeline_list_end(&bytes) {
                break end;
            }
            if bytes.len() >= max_bytes {
                return Err(TdfError::MalformedHeader(format!(
                    "no <TimelineList> within the first {max_bytes} bytes"
                )));
            }
            let read = reader.read(&mut chunk)?;
            if read == 0 {
                return Err(TdfError::MalformedHeader(
                    "stream ended before <TimelineList>".to_string(),
                ));
            }
            bytes.extend_from_slice(&chunk[..read]);
        };

        bytes.truncate(end);
        let raw = match String::from_utf8(bytes) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Header is not valid UTF-8; decoding lossily");
                String::from_utf8_lossy(e.as_bytes()).into_owned()
            }
        };
        Self::parse(raw)
    }

    /// Parse header text ending in `<TimelineList>`
    pub fn parse(raw: String) -> Result<Self> {
        let bytes = raw.as_bytes();
        let body_offset = timeline_list_end(bytes).ok_or_else(|| {
            TdfError::MalformedHeader("no <TimelineList> tag".to_string())
        })?;

        let head_start = find_ignore_case(bytes, b"<head")
            .filter(|&i| {
                bytes
                    .get(i + 5)
                    .is_some_and(|&b| b == b'>' || b.is_ascii_whitespace())
            })
            .ok_or_else(|| TdfError::MissingElement("Head".to_string()))?;
        let head_end = find_ignore_case(&bytes[head_start..], b"</head>")
            .map(|i| head_start + i + "</head>".len())
            .ok_or_else(|| TdfError::MalformedHeader("<Head> is never closed".to_string()))?;

        let fields = parse_head(&raw[head_start..head_end])?;
        log::debug!("Read header with {} fields", fields.len());

        Ok(Self {
            fields,
            body_offset: body_offset as u64,
            raw,
        })
    }

    /// Header text, ending in the `<TimelineList>` tag
    #[must_use]
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Text of a named `<Head>` child, matched without regard to case
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Byte offset where the timeline list body begins
    #[must_use]
    pub const fn body_offset(&self) -> u64 {
        self.body_offset
    }
}

fn parse_head(xml: &str) -> Result<FxHashMap<String, String>> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut fields = FxHashMap::default();
    let mut depth = 0usize;
    let mut current: Option<String> = None;

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                depth += 1;
                if depth == 2 {
                    let name = String::from_utf8_lossy(e.local_name().as_ref()).to_ascii_lowercase();
                    fields.entry(name.clone()).or_insert_with(String::new);
                    current = Some(name);
                }
            }
            Event::Empty(e) if depth == 1 => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).to_ascii_lowercase();
                fields.entry(name).or_insert_with(String::new);
            }
            Event::Text(t) => {
                if let Some(field) = current.as_ref().and_then(|name| fields.get_mut(name)) {
                    field.push_str(&t.unescape()?);
                }
            }
            Event::CData(c) => {
                if let Some(field) = current.as_ref().and_then(|name| fields.get_mut(name)) {
                    field.push_str(&String::from_utf8_lossy(&c));
                }
            }
            Event::End(_) => {
                if depth == 2 {
                    current = None;
                }
                depth = depth.saturating_sub(1);
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(fields)
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<TDF version="0.1" xmlns="http://www.dawsondean.com/ns/TDF/">
<Head>
    <Vocabulary>Medicine</Vocabulary>
    <Description>Test &amp; sample</Description>
    <DataSource>Synthetic</DataSource>
    <TLLocationIndex></TLLocationIndex>
    <Padding/>
</Head>

<TimelineList>
<TL id="1" gender="M" race="W"></TL>"#;

    /// Test header fields and the body offset
    #[test]
    fn test_read_header() {
        let header = TdfHeader::read(HEADER.as_bytes(), 1 << 20).unwrap();
        assert_eq!(header.field("Description"), Some("Test & sample"));
        assert_eq!(header.field("datasource"), Some("Synthetic"));
        assert_eq!(header.field("TLLocationIndex"), Some(""));
        assert_eq!(header.field("Padding"), Some(""));
        assert_eq!(header.field("Created"), None);
        assert!(header.raw().ends_with("<TimelineList>"));
        assert_eq!(&HEADER[header.body_offset() as usize..], "\n<TL id=\"1\" gender=\"M\" race=\"W\"></TL>");
    }

    /// Test the header scan is bounded
    #[test]
    fn test_header_limit() {
        let padded = format!("<TDF><Head></Head>{}<TimelineList>", " ".repeat(10_000));
        assert!(matches!(
            TdfHeader::read(padded.as_bytes(), 4096),
            Err(TdfError::MalformedHeader(_))
        ));
        assert!(TdfHeader::read(padded.as_bytes(), 1 << 20).is_ok());
    }

    /// Test a header without a Head element is rejected
    #[test]
    fn test_missing_head() {
        let text = "<TDF><TimelineList>".to_string();
        assert!(matches!(
            TdfHeader::parse(text),
            Err(TdfError::MissingElement(_))
        ));
    }
}
