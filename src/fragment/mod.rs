//! Timeline fragment parsing
//!
//! A fragment is the raw XML of one `<TL>` element as located by the reader.
//! This module turns it into the subject's demographics plus the ordered
//! child nodes the compiler consumes. Element names are matched without
//! regard to case; elements outside the TDF node vocabulary are skipped.

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use crate::error::{Result, TdfError};
use crate::timeline::Demographics;

/// Race code assumed when the timeline element carries none
const DEFAULT_RACE: &str = "w";

/// An `<E>` node
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventNode {
    /// Event class (`Admit`, `Discharge`, `IMed`, ...)
    pub class: String,
    pub timestamp: Option<String>,
    /// Class-specific value string (`V`)
    pub value: String,
    /// Optional detail string (`D`)
    pub detail: String,
}

/// A `<D>` node
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DataNode {
    /// Data class (`L` labs, `V` vitals, `D` diagnoses)
    pub class: String,
    pub timestamp: Option<String>,
    pub options: String,
    /// Comma-separated `name=value` list
    pub text: String,
}

/// An `<OC>` node
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutcomeNode {
    pub scope: String,
    /// `;`-separated `name=value` list
    pub text: String,
}

/// A `<Text>` node; the body is opaque
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextNode {
    pub class: String,
    pub timestamp: Option<String>,
    pub text: String,
}

/// One child node of a timeline, in document order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Event(EventNode),
    Data(DataNode),
    Outcome(OutcomeNode),
    Text(TextNode),
}

impl Node {
    /// Raw timestamp attribute, if the node kind carries one
    #[must_use]
    pub fn timestamp(&self) -> Option<&str> {
        match self {
            Self::Event(e) => e.timestamp.as_deref(),
            Self::Data(d) => d.timestamp.as_deref(),
            Self::Text(t) => t.timestamp.as_deref(),
            Self::Outcome(_) => None,
        }
    }

    fn push_text(&mut self, chunk: &str) {
        let body = match self {
            Self::Event(_) => return,
            Self::Data(d) => &mut d.text,
            Self::Outcome(o) => &mut o.text,
            Self::Text(t) => &mut t.text,
        };
        body.push_str(chunk);
    }
}

/// A parsed `<TL>` element
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimelineFragment {
    pub demographics: Demographics,
    pub nodes: Vec<Node>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ElementKind {
    Timeline,
    Event,
    Data,
    Outcome,
    Text,
    Other,
}

impl ElementKind {
    fn of(name: &[u8]) -> Self {
        if name.eq_ignore_ascii_case(b"tl") {
            Self::Timeline
        } else if name.eq_ignore_ascii_case(b"e") {
            Self::Event
        } else if name.eq_ignore_ascii_case(b"d") {
            Self::Data
        } else if name.eq_ignore_ascii_case(b"oc") {
            Self::Outcome
        } else if name.eq_ignore_ascii_case(b"text") {
            Self::Text
        } else {
            Self::Other
        }
    }
}

/// Parse the XML of one timeline
///
/// # Errors
/// Returns `MissingElement` when the text holds no `TL` element, and an XML
/// error when the fragment is not well formed.
pub fn parse_fragment(xml: &str) -> Result<TimelineFragment> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut demographics = None;
    let mut nodes = Vec::new();
    // Node whose text body is being collected, and the element depth it opened at
    let mut open: Option<(Node, usize)> = None;
    let mut depth = 0usize;

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                depth += 1;
                match ElementKind::of(e.local_name().as_ref()) {
                    ElementKind::Timeline => demographics = Some(read_demographics(&e)?),
                    kind if demographics.is_some() && open.is_none() => {
                        if let Some(node) = read_node(kind, &e)? {
                            open = Some((node, depth));
                        }
                    }
                    _ => {}
                }
            }
            Event::Empty(e) => match ElementKind::of(e.local_name().as_ref()) {
                ElementKind::Timeline => demographics = Some(read_demographics(&e)?),
                kind if demographics.is_some() && open.is_none() => {
                    if let Some(node) = read_node(kind, &e)? {
                        nodes.push(node);
                    }
                }
                _ => {}
            },
            Event::Text(t) => {
                if let Some((node, _)) = open.as_mut() {
                    node.push_text(&t.unescape()?);
                }
            }
            Event::CData(c) => {
                if let Some((node, _)) = open.as_mut() {
                    node.push_text(&String::from_utf8_lossy(&c));
                }
            }
            Event::End(_) => {
                if open.as_ref().is_some_and(|(_, at)| *at == depth) {
                    if let Some((node, _)) = open.take() {
                        nodes.push(node);
                    }
                }
                depth = depth.saturating_sub(1);
            }
            Event::Eof => break,
            _ => {}
        }
    }

    let demographics = demographics.ok_or_else(|| TdfError::MissingElement("TL".to_string()))?;
    Ok(TimelineFragment {
        demographics,
        nodes,
    })
}

fn attribute(element: &BytesStart<'_>, key: &str) -> Result<Option<String>> {
    match element.try_get_attribute(key)? {
        Some(attr) => Ok(Some(attr.unescape_value()?.into_owned())),
        None => Ok(None),
    }
}

fn attribute_or_empty(element: &BytesStart<'_>, key: &str) -> Result<String> {
    Ok(attribute(element, key)?.unwrap_or_default())
}

fn read_demographics(element: &BytesStart<'_>) -> Result<Demographics> {
    let race = attribute_or_empty(element, "race")?.trim().to_lowercase();
    Ok(Demographics {
        subject_id: attribute_or_empty(element, "id")?,
        is_male: attribute(element, "gender")?.is_some_and(|g| g.trim() == "M"),
        race: if race.is_empty() { DEFAULT_RACE.to_string() } else { race },
        weight_kg: attribute(element, "wt")?
            .and_then(|w| w.trim().parse::<f64>().ok())
            .map(f64::trunc),
    })
}

fn read_node(kind: ElementKind, element: &BytesStart<'_>) -> Result<Option<Node>> {
    let node = match kind {
        ElementKind::Event => Node::Event(EventNode {
            class: attribute_or_empty(element, "C")?,
            timestamp: attribute(element, "T")?,
            value: attribute_or_empty(element, "V")?,
            detail: attribute_or_empty(element, "D")?,
        }),
        ElementKind::Data => Node::Data(DataNode {
            class: attribute_or_empty(element, "C")?,
            timestamp: attribute(element, "T")?,
            options: attribute_or_empty(element, "O")?,
            text: String::new(),
        }),
        ElementKind::Outcome => Node::Outcome(OutcomeNode {
            scope: attribute_or_empty(element, "scope")?,
            text: String::new(),
        }),
        ElementKind::Text => Node::Text(TextNode {
            class: attribute_or_empty(element, "C")?,
            timestamp: attribute(element, "T")?,
            text: String::new(),
        }),
        ElementKind::Timeline | ElementKind::Other => return Ok(None),
    };
    Ok(Some(node))
}
